//! Per-database key space: key -> [`Value`] plus a parallel expiry index,
//! lazy expiration on access, and the probabilistic TTL sweep.

use std::collections::HashMap;

use bytes::Bytes;
use rand::seq::IteratorRandom;

use crate::value::Value;

/// One logical database: a key space plus its expiry index.
///
/// A key is either absent or has exactly one [`Value`]; an expiry entry
/// exists only while its key is present. Both invariants are maintained by
/// construction: every mutator that removes a key also removes its expiry.
#[derive(Default)]
pub struct Database {
    data: HashMap<Bytes, Value>,
    expires_at_millis: HashMap<Bytes, u64>,
}

impl Database {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and deletes the key if it has expired by `now`.
    ///
    /// This is the lazy-eviction hook: called at the top of every read and
    /// write path before the key is looked up, so callers never observe an
    /// expired key as present.
    fn expire_if_due(&mut self, key: &[u8], now_millis: u64) -> bool {
        let Some(&expiry) = self.expires_at_millis.get(key) else {
            return false;
        };
        if expiry <= now_millis {
            self.data.remove(key);
            self.expires_at_millis.remove(key);
            true
        } else {
            false
        }
    }

    /// Returns a reference to the value at `key`, evicting it first if it
    /// has expired.
    #[must_use]
    pub fn get(&mut self, key: &[u8], now_millis: u64) -> Option<&Value> {
        self.expire_if_due(key, now_millis);
        self.data.get(key)
    }

    /// Returns a mutable reference to the value at `key`, evicting it first
    /// if it has expired.
    pub fn get_mut(&mut self, key: &[u8], now_millis: u64) -> Option<&mut Value> {
        self.expire_if_due(key, now_millis);
        self.data.get_mut(key)
    }

    /// Whether `key` is present (after lazy expiry).
    #[must_use]
    pub fn contains_key(&mut self, key: &[u8], now_millis: u64) -> bool {
        self.get(key, now_millis).is_some()
    }

    /// Inserts `value` at `key`, clearing any prior TTL (matching `SET`'s
    /// behavior of dropping the old expiry unless the command says
    /// otherwise).
    pub fn set(&mut self, key: Bytes, value: Value) {
        self.expires_at_millis.remove(&key);
        self.data.insert(key, value);
    }

    /// Inserts `value` at `key` only if absent or expired. Returns `true` if
    /// the insertion happened.
    pub fn set_if_absent(&mut self, key: Bytes, value: Value, now_millis: u64) -> bool {
        self.expire_if_due(&key, now_millis);
        if self.data.contains_key(&key) {
            false
        } else {
            self.data.insert(key, value);
            true
        }
    }

    /// Fetches-and-replaces the value at `key`. Returns the prior value
    /// (after lazy expiry), if any.
    pub fn getset(&mut self, key: Bytes, value: Value, now_millis: u64) -> Option<Value> {
        self.expire_if_due(&key, now_millis);
        self.data.insert(key, value)
    }

    /// Gets a value, inserting a fresh default if absent or expired.
    /// Used by type-specific write operations (`LPUSH` on a missing key).
    pub fn get_or_insert_with(
        &mut self,
        key: Bytes,
        now_millis: u64,
        default: impl FnOnce() -> Value,
    ) -> &mut Value {
        self.expire_if_due(&key, now_millis);
        self.data.entry(key).or_insert_with(default)
    }

    /// `DEL`: removes `key` (and its expiry). Returns `true` if it existed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.expires_at_millis.remove(key);
        self.data.remove(key).is_some()
    }

    /// `EXPIRE`/`PEXPIRE`: sets `key`'s absolute expiry, in milliseconds
    /// since the epoch. Returns `true` if the key exists.
    pub fn set_expiry(&mut self, key: &[u8], expires_at_millis: u64, now_millis: u64) -> bool {
        if !self.contains_key(key, now_millis) {
            return false;
        }
        self.expires_at_millis.insert(Bytes::copy_from_slice(key), expires_at_millis);
        true
    }

    /// `PERSIST`: clears `key`'s expiry. Returns `true` if an expiry was
    /// removed.
    pub fn clear_expiry(&mut self, key: &[u8]) -> bool {
        self.expires_at_millis.remove(key).is_some()
    }

    /// `TTL`/`PTTL`: remaining lifetime in milliseconds, or `None` if the
    /// key has no expiry (or does not exist).
    pub fn ttl_millis(&mut self, key: &[u8], now_millis: u64) -> Option<u64> {
        if !self.contains_key(key, now_millis) {
            return None;
        }
        self.expires_at_millis
            .get(key)
            .map(|&expiry| expiry.saturating_sub(now_millis))
    }

    /// `DBSIZE`: the number of live (non-expired) keys.
    ///
    /// This is an O(n) scan against the expiry index rather than
    /// `self.data.len()`, since lazy eviction only fires on access: a key
    /// can be logically expired yet still physically present.
    #[must_use]
    pub fn len(&self, now_millis: u64) -> usize {
        self.data
            .keys()
            .filter(|k| !matches!(self.expires_at_millis.get(*k), Some(&e) if e <= now_millis))
            .count()
    }

    /// Whether the database has no live keys.
    #[must_use]
    pub fn is_empty(&self, now_millis: u64) -> bool {
        self.len(now_millis) == 0
    }

    /// `KEYS`: all live key names. Unbounded; matches the reference
    /// command's behavior of scanning the whole key space.
    #[must_use]
    pub fn keys(&self, now_millis: u64) -> Vec<Bytes> {
        self.data
            .keys()
            .filter(|k| !matches!(self.expires_at_millis.get(*k), Some(&e) if e <= now_millis))
            .cloned()
            .collect()
    }

    /// `FLUSHDB`: removes every key and expiry.
    pub fn flush(&mut self) {
        self.data.clear();
        self.expires_at_millis.clear();
    }

    /// Iterates all live `(key, value)` pairs, for snapshotting. Expired
    /// keys are filtered out but not evicted (the caller is read-only).
    pub fn iter_live(&self, now_millis: u64) -> impl Iterator<Item = (&Bytes, &Value, Option<u64>)> {
        self.data.iter().filter_map(move |(k, v)| {
            match self.expires_at_millis.get(k) {
                Some(&expiry) if expiry <= now_millis => None,
                expiry => Some((k, v, expiry.copied())),
            }
        })
    }

    /// Restores a key directly, bypassing the write-path defaults. Used by
    /// snapshot load and append-log replay.
    pub fn restore(&mut self, key: Bytes, value: Value, expires_at_millis: Option<u64>) {
        if let Some(expiry) = expires_at_millis {
            self.expires_at_millis.insert(key.clone(), expiry);
        }
        self.data.insert(key, value);
    }

    /// The probabilistic TTL sweep: samples up to `sample_n` keys
    /// uniformly from the expiry index, evicts any whose expiry has
    /// passed, and returns the number evicted.
    pub fn clean_ttl(&mut self, sample_n: usize, now_millis: u64) -> usize {
        let mut rng = rand::rng();
        let sample: Vec<Bytes> = self.expires_at_millis.iter().map(|(k, _)| k.clone()).choose_multiple(&mut rng, sample_n);
        let expired: Vec<Bytes> = sample
            .into_iter()
            .filter(|k| matches!(self.expires_at_millis.get(k), Some(&expiry) if expiry <= now_millis))
            .collect();
        for key in &expired {
            self.data.remove(key);
            self.expires_at_millis.remove(key);
        }
        expired.len()
    }
}
