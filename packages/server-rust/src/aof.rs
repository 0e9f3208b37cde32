//! Append-only log: a buffered journal of write commands, flushed to disk
//! periodically and replayed in full at startup.
//!
//! Mirrors the reference server's `AOFBuffer`: writes accumulate in memory
//! (`append` never touches the filesystem) and a periodic timer transfers
//! the buffer to the OS (`flush`), so the event loop's only synchronous
//! I/O is the occasional bounded `write_all`, never a per-command `fsync`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use ferrite_core::tokenize_frame;

/// A buffered append-only log writer.
pub struct AofLog {
    path: PathBuf,
    file: File,
    buffer: BytesMut,
}

impl AofLog {
    /// Opens (creating if absent) the log file at `path` in append mode.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            buffer: BytesMut::new(),
        })
    }

    /// Queues an already RESP-encoded command for the next flush.
    pub fn append(&mut self, encoded: &Bytes) {
        self.buffer.extend_from_slice(encoded);
    }

    /// Whether there is buffered data awaiting a flush.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Transfers the buffer to the OS. A no-op if nothing is pending.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file.write_all(&self.buffer)?;
        self.file.flush()?;
        self.buffer.clear();
        Ok(())
    }

    /// The log file's path, for logging.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads every framed command out of the append log at `path`, in the
/// order they were written. Returns an empty vector if the file does not
/// exist (nothing to recover).
pub fn read_all_commands(path: &Path) -> io::Result<Vec<Vec<Bytes>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;
    Ok(split_commands(&raw))
}

/// Splits a contiguous buffer of back-to-back RESP arrays (the append
/// log's on-disk shape: "a newline-less sequence of array-encoded write
/// commands") into individual tokenized commands.
///
/// Malformed trailing data (a partially-written command from a crash
/// mid-append) is dropped rather than treated as fatal, matching the
/// reference recovery path's "ignore errors on individual records".
fn split_commands(data: &[u8]) -> Vec<Vec<Bytes>> {
    let mut commands = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        match frame_len_at(&data[offset..]) {
            Some(len) if len > 0 => {
                let frame = &data[offset..offset + len];
                if let Ok(args) = tokenize_frame(frame) {
                    commands.push(args);
                }
                offset += len;
            }
            _ => break,
        }
    }
    commands
}

/// Determines the byte length of one RESP array frame starting at the
/// front of `data`, without requiring a pre-split buffer. Returns `None`
/// if `data` does not begin with a complete frame.
fn frame_len_at(data: &[u8]) -> Option<usize> {
    if data.first() != Some(&b'*') {
        return None;
    }
    let header_end = find(data, b"\r\n", 0)?;
    let count: i64 = std::str::from_utf8(&data[1..header_end]).ok()?.parse().ok()?;
    let mut cursor = header_end + 2;
    if count < 0 {
        return Some(cursor);
    }
    for _ in 0..count {
        if data.get(cursor) != Some(&b'$') {
            return None;
        }
        let len_end = find(data, b"\r\n", cursor)?;
        let len: usize = std::str::from_utf8(&data[cursor + 1..len_end]).ok()?.parse().ok()?;
        cursor = len_end + 2 + len + 2;
        if cursor > data.len() {
            return None;
        }
    }
    Some(cursor)
}

fn find(data: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    data[from..].windows(needle.len()).position(|w| w == needle).map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_core::encode_command;

    fn cmd(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())).collect()
    }

    #[test]
    fn append_then_flush_then_reload_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");
        {
            let mut log = AofLog::open(&path).unwrap();
            log.append(&encode_command(&cmd(&["SET", "a", "1"])));
            log.append(&encode_command(&cmd(&["INCR", "a"])));
            assert!(log.has_pending());
            log.flush().unwrap();
            assert!(!log.has_pending());
        }
        let commands = read_all_commands(&path).unwrap();
        assert_eq!(commands, vec![cmd(&["SET", "a", "1"]), cmd(&["INCR", "a"])]);
    }

    #[test]
    fn missing_file_recovers_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");
        assert_eq!(read_all_commands(&path).unwrap(), Vec::<Vec<Bytes>>::new());
    }

    #[test]
    fn truncated_trailing_record_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appendonly.aof");
        {
            let mut log = AofLog::open(&path).unwrap();
            log.append(&encode_command(&cmd(&["SET", "a", "1"])));
            log.flush().unwrap();
        }
        let mut raw = std::fs::read(&path).unwrap();
        raw.extend_from_slice(b"*2\r\n$3\r\nDEL\r\n$1\r\n");
        std::fs::write(&path, &raw).unwrap();

        let commands = read_all_commands(&path).unwrap();
        assert_eq!(commands, vec![cmd(&["SET", "a", "1"])]);
    }
}
