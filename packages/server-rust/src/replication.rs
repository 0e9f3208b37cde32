//! Replication driver: propagates executed write commands to connected
//! follower sockets.
//!
//! Followers are buffered, not written synchronously: `propagate` only
//! extends an in-memory byte buffer per follower, and the 200ms
//! replication-heartbeat timer (`4.10`/`4.4`) drains each buffer with a
//! non-blocking `try_write`, so the event loop never awaits socket I/O.
//! A partial write leaves the unwritten suffix in the buffer for the next
//! tick, matching the reference driver's "flush what the socket will
//! currently take" behavior.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::Interest;
use tokio::net::tcp::OwnedWriteHalf;

use crate::session::ClientId;

/// One connected follower: its half of the replication socket, a pending
/// write buffer, and the last offset it acknowledged via `REPLCONF ACK`.
struct Follower {
    write_half: OwnedWriteHalf,
    buffer: BytesMut,
    acked_offset: u64,
}

/// Tracks every connected follower and the global replication offset.
///
/// The offset advances once per propagated write command, regardless of
/// follower count; it is the single source of truth for "how much of the
/// write history has this follower seen" via `acked_offset`.
#[derive(Default)]
pub struct ReplicationDriver {
    followers: HashMap<ClientId, Follower>,
    offset: u64,
}

impl ReplicationDriver {
    /// Creates a driver with no followers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new follower, taking ownership of its socket's write
    /// half (handed over by the connection task on `PSYNC`, see
    /// `net::handle_connection`).
    pub fn add_follower(&mut self, client_id: ClientId, write_half: OwnedWriteHalf) {
        self.followers.insert(
            client_id,
            Follower { write_half, buffer: BytesMut::new(), acked_offset: 0 },
        );
    }

    /// Drops a follower, e.g. on disconnect.
    pub fn remove_follower(&mut self, client_id: ClientId) {
        self.followers.remove(&client_id);
    }

    /// Number of connected followers.
    #[must_use]
    pub fn follower_count(&self) -> usize {
        self.followers.len()
    }

    /// The current global replication offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Appends `encoded` (an already RESP-encoded write command) to every
    /// follower's buffer and advances the global offset. Called once per
    /// successfully executed write command.
    pub fn propagate(&mut self, encoded: &Bytes) {
        if self.followers.is_empty() {
            return;
        }
        self.offset += 1;
        for follower in self.followers.values_mut() {
            follower.buffer.extend_from_slice(encoded);
        }
    }

    /// Records a follower's acknowledged offset from a `REPLCONF ACK`.
    pub fn record_ack(&mut self, client_id: ClientId, offset: u64) {
        if let Some(follower) = self.followers.get_mut(&client_id) {
            follower.acked_offset = offset;
        }
    }

    /// Queues `bytes` for one specific follower, e.g. the `+FULLRESYNC`
    /// handshake reply, which must go out ahead of any propagated writes
    /// but has nowhere else to be written once the connection task has
    /// handed off its write half.
    pub fn queue(&mut self, client_id: ClientId, bytes: &Bytes) {
        if let Some(follower) = self.followers.get_mut(&client_id) {
            follower.buffer.extend_from_slice(bytes);
        }
    }

    /// Non-blocking flush of every follower's pending buffer. Followers
    /// whose socket has gone away are dropped. Returns the ids of
    /// followers removed this tick.
    pub fn flush_all(&mut self) -> Vec<ClientId> {
        let mut dead = Vec::new();
        for (&client_id, follower) in &mut self.followers {
            if follower.buffer.is_empty() {
                continue;
            }
            match follower.write_half.try_io(Interest::WRITABLE, || {
                std::io::Write::write(&mut FollowerSocketAdapter(&follower.write_half), &follower.buffer)
            }) {
                Ok(written) => {
                    let _ = follower.buffer.split_to(written.min(follower.buffer.len()));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(_) => dead.push(client_id),
            }
        }
        for id in &dead {
            self.followers.remove(id);
        }
        dead
    }
}

/// Adapts `OwnedWriteHalf`'s `try_write` into the `std::io::Write`
/// interface `try_io`'s closure expects.
struct FollowerSocketAdapter<'a>(&'a OwnedWriteHalf);

impl std::io::Write for FollowerSocketAdapter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.try_write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagate_is_noop_with_no_followers() {
        let mut driver = ReplicationDriver::new();
        driver.propagate(&Bytes::from_static(b"*1\r\n$4\r\nPING\r\n"));
        assert_eq!(driver.offset(), 0);
    }

    #[tokio::test]
    async fn propagate_then_flush_delivers_bytes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        let (mut client_read, _client_write) = client.into_split();
        let (_server_read, server_write) = server_side.into_split();

        let mut driver = ReplicationDriver::new();
        driver.add_follower(1, server_write);
        assert_eq!(driver.follower_count(), 1);

        let payload = Bytes::from_static(b"*1\r\n$4\r\nPING\r\n");
        driver.propagate(&payload);
        assert_eq!(driver.offset(), 1);

        // May need a couple of ticks if the socket isn't immediately writable.
        for _ in 0..10 {
            driver.flush_all();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let mut buf = vec![0u8; payload.len()];
        tokio::time::timeout(std::time::Duration::from_secs(1), tokio::io::AsyncReadExt::read_exact(&mut client_read, &mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf, payload.as_ref());
    }

    #[test]
    fn record_ack_updates_known_follower_only() {
        let mut driver = ReplicationDriver::new();
        driver.record_ack(1, 42);
        assert!(driver.followers.is_empty());
    }
}
