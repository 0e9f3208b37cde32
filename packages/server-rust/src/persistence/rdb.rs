//! Point-in-time snapshot writer and loader.
//!
//! The on-disk layout is a small versioned envelope around an
//! `rmp-serde`-encoded body (magic bytes, format version, MessagePack
//! payload, CRC-64 trailer), rather than a hand-rolled binary format --
//! reusing an existing serialization crate for the payload, per the
//! reference codebase's preference for `rmp-serde` over bespoke encoders.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use ferrite_core::Value;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

const MAGIC: &[u8; 8] = b"FERRITE1";
const FORMAT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: Bytes,
    value: Value,
    expires_at_millis: Option<u64>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotDatabase {
    index: usize,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize, Default)]
struct SnapshotBody {
    databases: Vec<SnapshotDatabase>,
}

/// One logical database's live contents, as handed to the snapshot writer.
///
/// The loop takes this owned copy synchronously (freeze-then-copy, see
/// DESIGN.md) before handing it to a background task to encode and write,
/// so the writer itself never touches live server state.
pub struct DatabaseSnapshotView {
    pub index: usize,
    pub entries: Vec<(Bytes, Value, Option<u64>)>,
}

/// Serializes `views` to `path` via a temp file + atomic rename.
pub fn write_snapshot(path: &Path, views: Vec<DatabaseSnapshotView>) -> Result<(), PersistenceError> {
    let body = SnapshotBody {
        databases: views
            .into_iter()
            .map(|v| SnapshotDatabase {
                index: v.index,
                entries: v
                    .entries
                    .into_iter()
                    .map(|(key, value, expires_at_millis)| SnapshotEntry { key, value, expires_at_millis })
                    .collect(),
            })
            .collect(),
    };
    let payload = rmp_serde::to_vec(&body)?;
    let checksum = crc64(&payload);

    let mut buf = Vec::with_capacity(MAGIC.len() + 1 + payload.len() + 8);
    buf.extend_from_slice(MAGIC);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&checksum.to_le_bytes());

    let tmp_path = temp_path_for(path);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let file_name = tmp.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    tmp.set_file_name(format!("{file_name}.tmp"));
    tmp
}

/// Loads a snapshot previously written by [`write_snapshot`].
pub fn load_snapshot(path: &Path) -> Result<Vec<(usize, Vec<(Bytes, Value, Option<u64>)>)>, PersistenceError> {
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;

    if raw.len() < MAGIC.len() + 1 + 8 || &raw[..MAGIC.len()] != MAGIC {
        return Err(PersistenceError::UnsupportedVersion(0));
    }
    let version = raw[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(version));
    }
    let payload_end = raw.len() - 8;
    let payload = &raw[MAGIC.len() + 1..payload_end];
    let stored_checksum = u64::from_le_bytes(raw[payload_end..].try_into().expect("8-byte trailer"));
    if crc64(payload) != stored_checksum {
        return Err(PersistenceError::ChecksumMismatch);
    }

    let body: SnapshotBody = rmp_serde::from_slice(payload)?;
    Ok(body
        .databases
        .into_iter()
        .map(|db| {
            (
                db.index,
                db.entries.into_iter().map(|e| (e.key, e.value, e.expires_at_millis)).collect(),
            )
        })
        .collect())
}

/// Coalescing state for background snapshot generation: a concurrent
/// `BGSAVE` request while one is already running is a silent no-op.
#[derive(Clone, Default)]
pub struct RdbStatus {
    running: Arc<AtomicBool>,
}

impl RdbStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to transition `IDLE -> RUNNING`. Returns `true` if this
    /// caller won the race and should proceed with the snapshot.
    pub fn try_start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Transitions back to `IDLE` once the snapshot (successfully or not)
    /// has finished.
    pub fn finish(&self) {
        self.running.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// CRC-64/XZ, computed bit-by-bit (no lookup table) since the snapshot
/// writer only runs a handful of times per minute -- the table's build
/// cost would outweigh the cycles it saves at this call rate.
fn crc64(data: &[u8]) -> u64 {
    const POLY: u64 = 0xC96C_5795_D787_0F42;
    let mut crc: u64 = !0;
    for &byte in data {
        crc ^= u64::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc64_is_deterministic_and_sensitive() {
        let a = crc64(b"hello world");
        let b = crc64(b"hello world");
        let c = crc64(b"hello worlD");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.fdb");

        let views = vec![DatabaseSnapshotView {
            index: 0,
            entries: vec![
                (Bytes::from_static(b"a"), Value::Str(Bytes::from_static(b"1")), None),
                (Bytes::from_static(b"b"), Value::Str(Bytes::from_static(b"2")), Some(12345)),
            ],
        }];
        write_snapshot(&path, views).unwrap();

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, 0);
        assert_eq!(loaded[0].1.len(), 2);
        assert_eq!(loaded[0].1[1].2, Some(12345));
    }

    #[test]
    fn corrupted_file_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.fdb");
        write_snapshot(&path, vec![DatabaseSnapshotView { index: 0, entries: vec![] }]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(load_snapshot(&path), Err(PersistenceError::ChecksumMismatch)));
    }

    #[test]
    fn rdb_status_coalesces_concurrent_requests() {
        let status = RdbStatus::new();
        assert!(status.try_start());
        assert!(!status.try_start());
        status.finish();
        assert!(status.try_start());
    }
}
