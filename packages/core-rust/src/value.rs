//! The value model: the five data types a key can hold, plus the
//! type-specific operations each command family needs.

use std::collections::{HashMap, HashSet, VecDeque};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::zset::OrderedSet;

/// A value stored at a key.
///
/// Every variant maps directly onto one of the reference server's data
/// types; commands check the variant they need and return
/// [`CoreError::WrongType`] without mutating anything when it doesn't
/// match, matching Redis's `WRONGTYPE` semantics.
#[derive(Serialize, Deserialize, Clone)]
pub enum Value {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    ZSet(OrderedSet),
}

impl Value {
    /// The lowercase type name reported by the `TYPE` command.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Hash(_) => "hash",
            Value::ZSet(_) => "zset",
        }
    }

    fn as_str(&self) -> Result<&Bytes, CoreError> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(CoreError::WrongType),
        }
    }

    fn as_list_mut(&mut self) -> Result<&mut VecDeque<Bytes>, CoreError> {
        match self {
            Value::List(l) => Ok(l),
            _ => Err(CoreError::WrongType),
        }
    }

    fn as_list(&self) -> Result<&VecDeque<Bytes>, CoreError> {
        match self {
            Value::List(l) => Ok(l),
            _ => Err(CoreError::WrongType),
        }
    }

    fn as_set_mut(&mut self) -> Result<&mut HashSet<Bytes>, CoreError> {
        match self {
            Value::Set(s) => Ok(s),
            _ => Err(CoreError::WrongType),
        }
    }

    fn as_set(&self) -> Result<&HashSet<Bytes>, CoreError> {
        match self {
            Value::Set(s) => Ok(s),
            _ => Err(CoreError::WrongType),
        }
    }

    fn as_hash_mut(&mut self) -> Result<&mut HashMap<Bytes, Bytes>, CoreError> {
        match self {
            Value::Hash(h) => Ok(h),
            _ => Err(CoreError::WrongType),
        }
    }

    fn as_hash(&self) -> Result<&HashMap<Bytes, Bytes>, CoreError> {
        match self {
            Value::Hash(h) => Ok(h),
            _ => Err(CoreError::WrongType),
        }
    }

    fn as_zset_mut(&mut self) -> Result<&mut OrderedSet, CoreError> {
        match self {
            Value::ZSet(z) => Ok(z),
            _ => Err(CoreError::WrongType),
        }
    }

    fn as_zset(&self) -> Result<&OrderedSet, CoreError> {
        match self {
            Value::ZSet(z) => Ok(z),
            _ => Err(CoreError::WrongType),
        }
    }

    // -- string ----------------------------------------------------------

    /// `GET`: returns the stored bytes.
    pub fn str_get(&self) -> Result<Bytes, CoreError> {
        self.as_str().cloned()
    }

    /// `APPEND`: appends `suffix` and returns the new length.
    pub fn str_append(&mut self, suffix: &[u8]) -> Result<usize, CoreError> {
        match self {
            Value::Str(s) => {
                let mut buf = s.to_vec();
                buf.extend_from_slice(suffix);
                *s = Bytes::from(buf);
                Ok(s.len())
            }
            _ => Err(CoreError::WrongType),
        }
    }

    /// `STRLEN`.
    pub fn str_len(&self) -> Result<usize, CoreError> {
        Ok(self.as_str()?.len())
    }

    /// `INCRBY`: parses the stored value as a base-10 integer, adds `delta`,
    /// and stores the result back as its decimal text form.
    pub fn str_incr_by(&mut self, delta: i64) -> Result<i64, CoreError> {
        let current = parse_integer(self.as_str()?)?;
        let updated = current.checked_add(delta).ok_or(CoreError::Overflow)?;
        *self = Value::Str(Bytes::from(updated.to_string()));
        Ok(updated)
    }

    /// `INCRBYFLOAT`.
    pub fn str_incr_by_float(&mut self, delta: f64) -> Result<f64, CoreError> {
        let current = parse_float(self.as_str()?)?;
        let updated = current + delta;
        *self = Value::Str(Bytes::from(format_float(updated)));
        Ok(updated)
    }

    // -- list --------------------------------------------------------------

    /// `LPUSH`: pushes `items` one at a time onto the head, in argument
    /// order (so the last pushed argument ends up at the front), returning
    /// the new length.
    pub fn list_push_left(&mut self, items: impl IntoIterator<Item = Bytes>) -> Result<usize, CoreError> {
        let list = self.as_list_mut()?;
        for item in items {
            list.push_front(item);
        }
        Ok(list.len())
    }

    /// `RPUSH`.
    pub fn list_push_right(&mut self, items: impl IntoIterator<Item = Bytes>) -> Result<usize, CoreError> {
        let list = self.as_list_mut()?;
        for item in items {
            list.push_back(item);
        }
        Ok(list.len())
    }

    /// `LPOP`.
    pub fn list_pop_left(&mut self) -> Result<Option<Bytes>, CoreError> {
        Ok(self.as_list_mut()?.pop_front())
    }

    /// `RPOP`.
    pub fn list_pop_right(&mut self) -> Result<Option<Bytes>, CoreError> {
        Ok(self.as_list_mut()?.pop_back())
    }

    /// `LLEN`.
    pub fn list_len(&self) -> Result<usize, CoreError> {
        Ok(self.as_list()?.len())
    }

    /// `LRANGE`: negative indices count from the end, as in Redis.
    pub fn list_range(&self, start: i64, stop: i64) -> Result<Vec<Bytes>, CoreError> {
        let list = self.as_list()?;
        let len = list.len() as i64;
        let (start, stop) = normalize_range(start, stop, len);
        match (start, stop) {
            (Some(s), Some(e)) if s <= e => list.iter().skip(s).take(e - s + 1).cloned().collect::<Vec<_>>(),
            _ => Vec::new(),
        }
        .pipe(Ok)
    }

    /// `LINDEX`: negative indices count from the end.
    pub fn list_index(&self, index: i64) -> Result<Option<Bytes>, CoreError> {
        let list = self.as_list()?;
        let len = list.len() as i64;
        let idx = if index < 0 { len + index } else { index };
        if idx < 0 || idx >= len {
            return Ok(None);
        }
        Ok(list.get(idx as usize).cloned())
    }

    // -- set -----------------------------------------------------------

    /// `SADD`: returns the number of members newly added.
    pub fn set_add(&mut self, members: impl IntoIterator<Item = Bytes>) -> Result<usize, CoreError> {
        let set = self.as_set_mut()?;
        let mut added = 0;
        for member in members {
            if set.insert(member) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// `SREM`: returns the number of members removed.
    pub fn set_remove(&mut self, members: impl IntoIterator<Item = Bytes>) -> Result<usize, CoreError> {
        let set = self.as_set_mut()?;
        let mut removed = 0;
        for member in members {
            if set.remove(&member) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// `SISMEMBER`.
    pub fn set_contains(&self, member: &[u8]) -> Result<bool, CoreError> {
        Ok(self.as_set()?.contains(member))
    }

    /// `SMEMBERS`.
    pub fn set_members(&self) -> Result<Vec<Bytes>, CoreError> {
        Ok(self.as_set()?.iter().cloned().collect())
    }

    /// `SCARD`.
    pub fn set_len(&self) -> Result<usize, CoreError> {
        Ok(self.as_set()?.len())
    }

    // -- hash ----------------------------------------------------------

    /// `HSET` for one field; returns `true` if the field was newly created.
    pub fn hash_set(&mut self, field: Bytes, value: Bytes) -> Result<bool, CoreError> {
        Ok(self.as_hash_mut()?.insert(field, value).is_none())
    }

    /// `HGET`.
    pub fn hash_get(&self, field: &[u8]) -> Result<Option<Bytes>, CoreError> {
        Ok(self.as_hash()?.get(field).cloned())
    }

    /// `HDEL`: returns the number of fields removed.
    pub fn hash_del(&mut self, fields: impl IntoIterator<Item = Bytes>) -> Result<usize, CoreError> {
        let hash = self.as_hash_mut()?;
        let mut removed = 0;
        for field in fields {
            if hash.remove(&field).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// `HGETALL`.
    pub fn hash_get_all(&self) -> Result<Vec<(Bytes, Bytes)>, CoreError> {
        Ok(self.as_hash()?.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// `HLEN`.
    pub fn hash_len(&self) -> Result<usize, CoreError> {
        Ok(self.as_hash()?.len())
    }

    /// `HEXISTS`.
    pub fn hash_exists(&self, field: &[u8]) -> Result<bool, CoreError> {
        Ok(self.as_hash()?.contains_key(field))
    }

    // -- zset ----------------------------------------------------------

    /// `ZADD` for one member; returns `true` if the member is new.
    pub fn zset_add(&mut self, member: Bytes, score: f64) -> Result<bool, CoreError> {
        Ok(self.as_zset_mut()?.add(member, score))
    }

    /// `ZINCRBY`.
    pub fn zset_incr_by(&mut self, member: Bytes, delta: f64) -> Result<f64, CoreError> {
        Ok(self.as_zset_mut()?.incr_by(member, delta))
    }

    /// `ZSCORE`.
    pub fn zset_score(&self, member: &Bytes) -> Result<Option<f64>, CoreError> {
        Ok(self.as_zset()?.score(member))
    }

    /// `ZREM`: returns the number of members removed.
    pub fn zset_remove(&mut self, members: impl IntoIterator<Item = Bytes>) -> Result<usize, CoreError> {
        let zset = self.as_zset_mut()?;
        let mut removed = 0;
        for member in members {
            if zset.remove(&member).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// `ZCARD`.
    pub fn zset_len(&self) -> Result<usize, CoreError> {
        Ok(self.as_zset()?.len())
    }

    /// `ZRANK`.
    pub fn zset_rank(&self, member: &Bytes) -> Result<Option<usize>, CoreError> {
        Ok(self.as_zset()?.rank(member))
    }

    /// `ZRANGE` (ascending, rank-based).
    pub fn zset_range_by_rank(&self, start: i64, stop: i64) -> Result<Vec<(Bytes, f64)>, CoreError> {
        let zset = self.as_zset()?;
        let len = zset.len() as i64;
        let (start, stop) = normalize_range(start, stop, len);
        match (start, stop) {
            (Some(s), Some(e)) if s <= e => Ok(zset.range_by_rank(s, e)),
            _ => Ok(Vec::new()),
        }
    }

    /// `ZRANGEBYSCORE`.
    pub fn zset_range_by_score(&self, min: f64, max: f64) -> Result<Vec<(Bytes, f64)>, CoreError> {
        Ok(self
            .as_zset()?
            .range_by_score(min, max)
            .map(|(m, s)| (m.clone(), s))
            .collect())
    }
}

/// Maps `(start, stop)` possibly-negative Redis-style indices against a
/// known `len`, clamping to `[0, len)`. Returns `(None, _)` when the
/// resulting range is empty.
fn normalize_range(start: i64, stop: i64, len: i64) -> (Option<usize>, Option<usize>) {
    if len == 0 {
        return (None, None);
    }
    let norm = |i: i64| -> i64 {
        if i < 0 {
            (len + i).max(0)
        } else {
            i
        }
    };
    let start = norm(start);
    if start >= len {
        return (None, None);
    }
    let stop = norm(stop).min(len - 1);
    if start > stop {
        (None, None)
    } else {
        (Some(start as usize), Some(stop as usize))
    }
}

fn parse_integer(bytes: &[u8]) -> Result<i64, CoreError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CoreError::NotAnInteger)
}

fn parse_float(bytes: &[u8]) -> Result<f64, CoreError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or(CoreError::NotAFloat)
}

fn format_float(value: f64) -> String {
    let mut s = format!("{value:.17}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

trait Pipe: Sized {
    fn pipe<R>(self, f: impl FnOnce(Self) -> R) -> R {
        f(self)
    }
}
impl<T> Pipe for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn wrong_type_does_not_mutate() {
        let mut v = Value::Str(b("hello"));
        assert_eq!(v.list_push_left([b("x")]), Err(CoreError::WrongType));
        assert_eq!(v.str_get().unwrap(), b("hello"));
    }

    #[test]
    fn string_incr_roundtrip() {
        let mut v = Value::Str(Bytes::from("10"));
        assert_eq!(v.str_incr_by(5).unwrap(), 15);
        assert_eq!(v.str_get().unwrap(), Bytes::from("15"));
    }

    #[test]
    fn string_incr_rejects_non_integer() {
        let mut v = Value::Str(b("abc"));
        assert_eq!(v.str_incr_by(1), Err(CoreError::NotAnInteger));
    }

    #[test]
    fn string_incr_overflow() {
        let mut v = Value::Str(Bytes::from(i64::MAX.to_string()));
        assert_eq!(v.str_incr_by(1), Err(CoreError::Overflow));
    }

    #[test]
    fn list_push_and_range() {
        let mut v = Value::List(VecDeque::new());
        v.list_push_right([b("a"), b("b"), b("c")]).unwrap();
        assert_eq!(v.list_range(0, -1).unwrap(), vec![b("a"), b("b"), b("c")]);
        assert_eq!(v.list_range(-2, -1).unwrap(), vec![b("b"), b("c")]);
    }

    #[test]
    fn list_range_start_past_end_is_empty() {
        let mut v = Value::List(VecDeque::new());
        v.list_push_right([b("a"), b("b"), b("c")]).unwrap();
        assert_eq!(v.list_range(5, 10).unwrap(), Vec::<Bytes>::new());
    }

    #[test]
    fn list_push_left_reverses_arg_order() {
        let mut v = Value::List(VecDeque::new());
        v.list_push_left([b("a"), b("b")]).unwrap();
        assert_eq!(v.list_range(0, -1).unwrap(), vec![b("b"), b("a")]);
    }

    #[test]
    fn set_add_dedups() {
        let mut v = Value::Set(HashSet::new());
        assert_eq!(v.set_add([b("a"), b("a"), b("b")]).unwrap(), 2);
        assert_eq!(v.set_len().unwrap(), 2);
    }

    #[test]
    fn hash_set_reports_new_vs_update() {
        let mut v = Value::Hash(HashMap::new());
        assert!(v.hash_set(b("f"), b("1")).unwrap());
        assert!(!v.hash_set(b("f"), b("2")).unwrap());
        assert_eq!(v.hash_get(b"f").unwrap(), Some(b("2")));
    }

    #[test]
    fn zset_basic_operations() {
        let mut v = Value::ZSet(OrderedSet::new());
        assert!(v.zset_add(b("a"), 1.0).unwrap());
        assert!(!v.zset_add(b("a"), 2.0).unwrap());
        assert_eq!(v.zset_score(&b("a")).unwrap(), Some(2.0));
        assert_eq!(v.zset_len().unwrap(), 1);
    }

    #[test]
    fn kind_names_match_redis() {
        assert_eq!(Value::Str(Bytes::new()).kind(), "string");
        assert_eq!(Value::List(VecDeque::new()).kind(), "list");
        assert_eq!(Value::Set(HashSet::new()).kind(), "set");
        assert_eq!(Value::Hash(HashMap::new()).kind(), "hash");
        assert_eq!(Value::ZSet(OrderedSet::new()).kind(), "zset");
    }
}
