//! TCP front door: the accept loop and the per-connection task.
//!
//! One task per connection reads and frames RESP requests and forwards
//! them to the single-writer event loop over a bounded channel; it never
//! touches shared server state itself. This mirrors the reference
//! server's accept-loop/connection-handler split, with the loop's
//! `max_clients` check done here rather than inside the loop, since a
//! rejected connection never needs to occupy a session slot at all.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use ferrite_core::{tokenize_frame, ClockSource, SystemClock};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::session::{ClientId, SharedClientRegistry};
use crate::shutdown::ShutdownController;

/// One unit of work handed from a connection task to the event loop.
pub enum LoopMessage {
    /// A tokenized command awaiting execution. The loop replies on
    /// `reply_tx` with the already RESP-encoded response. `raw` is the
    /// frame exactly as received off the wire; `pipelined` marks it as an
    /// inline (whitespace-tokenized) request rather than a proper
    /// multibulk array -- the append log and replication stream re-encode
    /// from `args` only when `pipelined` is set, and otherwise forward
    /// `raw` untouched (see `server::ServerState::write_bytes`).
    Request { client_id: ClientId, args: Vec<Bytes>, raw: Bytes, pipelined: bool, reply_tx: oneshot::Sender<Bytes> },
    /// A client issued `PSYNC` and has handed over its socket's write
    /// half; the loop now owns replication delivery to it via
    /// [`crate::replication::ReplicationDriver`].
    BecomeFollower { client_id: ClientId, write_half: OwnedWriteHalf },
    /// The connection closed or errored; the loop should drop the
    /// session and any replication/pubsub state tied to it.
    Closed { client_id: ClientId },
}

pub type InboundSender = mpsc::Sender<LoopMessage>;

/// Runs the accept loop until shutdown is triggered.
///
/// New connections beyond `max_clients` are closed immediately without a
/// reply, matching the reference server's silent-drop behavior for
/// over-limit accepts (see `DESIGN.md` for why this was kept rather than
/// upgraded to an explicit `ERR max clients reached` reply).
pub async fn run_accept_loop(
    listener: TcpListener,
    inbound_tx: InboundSender,
    registry: SharedClientRegistry,
    max_clients: usize,
    shutdown: Arc<ShutdownController>,
) {
    let mut shutdown_rx = shutdown.shutdown_receiver();
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                info!("accept loop shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                if registry.len() >= max_clients {
                    debug!(%peer_addr, "max clients reached, dropping connection");
                    drop(stream);
                    continue;
                }
                let _ = stream.set_nodelay(true);
                let now_millis = SystemClock.now_millis();
                let (client_id, handles) = registry.register(now_millis);
                let guard = shutdown.in_flight_guard();
                let inbound_tx = inbound_tx.clone();
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let _guard = guard;
                    handle_connection(stream, client_id, inbound_tx, handles).await;
                    registry.remove(client_id);
                });
            }
        }
    }
}

/// Services one connection until it closes, errors, or is handed off to
/// replication via `PSYNC`.
async fn handle_connection(
    stream: TcpStream,
    client_id: ClientId,
    inbound_tx: InboundSender,
    handles: crate::session::ConnectionHandles,
) {
    let crate::session::ConnectionHandles { mut push_rx, mut exit_rx } = handles;
    let (mut read_half, mut write_half) = stream.into_split();
    let mut buf = BytesMut::with_capacity(4096);
    let mut is_follower = false;

    loop {
        tokio::select! {
            biased;
            _ = &mut exit_rx => {
                break;
            }
            frame = read_frame(&mut read_half, &mut buf) => {
                match frame {
                    Ok(None) => break,
                    Ok(Some(raw)) => {
                        let args = match tokenize_frame(&raw) {
                            Ok(args) => args,
                            Err(e) => {
                                let err = ConnectionError::from(e);
                                debug!(%client_id, error = %err, "frame error, closing connection");
                                break;
                            }
                        };
                        if args.is_empty() {
                            continue;
                        }
                        // Only inline (non-`*`-prefixed) frames are
                        // "pipelined" in the reference server's sense; a
                        // proper multibulk array's raw bytes are forwarded
                        // to the append log/replicas untouched.
                        let pipelined = raw.first() != Some(&b'*');
                        if !is_follower && args[0].eq_ignore_ascii_case(b"PSYNC") {
                            is_follower = true;
                            if inbound_tx
                                .send(LoopMessage::BecomeFollower { client_id, write_half })
                                .await
                                .is_err()
                            {
                                break;
                            }
                            // The loop now owns the socket's write half; this
                            // task keeps only its read half, forwarding any
                            // further input (REPLCONF ACK) as ordinary
                            // requests whose replies go nowhere.
                            let (reply_tx, _reply_rx) = oneshot::channel();
                            let _ = inbound_tx.send(LoopMessage::Request { client_id, args, raw, pipelined, reply_tx }).await;
                            continue;
                        }

                        let (reply_tx, reply_rx) = oneshot::channel();
                        if inbound_tx.send(LoopMessage::Request { client_id, args, raw, pipelined, reply_tx }).await.is_err() {
                            break;
                        }
                        match reply_rx.await {
                            Ok(encoded) if !is_follower => {
                                if write_half.write_all(&encoded).await.is_err() {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(_) => break,
                        }
                    }
                    Err(e) => {
                        debug!(%client_id, error = %e, "connection io error");
                        break;
                    }
                }
            }
            Some(push) = push_rx.recv(), if !is_follower => {
                if write_half.write_all(&push).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = inbound_tx.send(LoopMessage::Closed { client_id }).await;
}

/// Reads one complete RESP frame (inline or multibulk array) from `read`,
/// buffering partial reads in `buf` across calls. Returns `Ok(None)` on a
/// clean EOF with no partial frame pending.
async fn read_frame(read: &mut OwnedReadHalf, buf: &mut BytesMut) -> Result<Option<Bytes>, ConnectionError> {
    use tokio::io::AsyncReadExt;
    loop {
        if let Some(len) = frame_len(buf) {
            let frame = buf.split_to(len).freeze();
            return Ok(Some(frame));
        }
        let mut chunk = [0u8; 4096];
        let n = read.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Returns the byte length of one complete frame at the front of `buf`, if
/// one is present yet. `*`-prefixed frames are multibulk arrays (length
/// computed from each `$len` header); anything else is an inline command
/// terminated by `\n`.
fn frame_len(buf: &[u8]) -> Option<usize> {
    if buf.first() == Some(&b'*') {
        multibulk_len(buf)
    } else {
        buf.iter().position(|&b| b == b'\n').map(|i| i + 1)
    }
}

fn multibulk_len(buf: &[u8]) -> Option<usize> {
    let header_end = find(buf, b"\r\n", 0)?;
    let count: i64 = std::str::from_utf8(&buf[1..header_end]).ok()?.parse().ok()?;
    let mut cursor = header_end + 2;
    if count <= 0 {
        return Some(cursor);
    }
    for _ in 0..count {
        if buf.get(cursor) != Some(&b'$') {
            return None;
        }
        let len_end = find(buf, b"\r\n", cursor)?;
        let len: usize = std::str::from_utf8(&buf[cursor + 1..len_end]).ok()?.parse().ok()?;
        cursor = len_end + 2 + len + 2;
        if cursor > buf.len() {
            return None;
        }
    }
    Some(cursor)
}

fn find(data: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > data.len() {
        return None;
    }
    data[from..].windows(needle.len()).position(|w| w == needle).map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_len_inline() {
        assert_eq!(frame_len(b"PING\r\n"), Some(6));
        assert_eq!(frame_len(b"PING\r\nextra"), Some(6));
        assert_eq!(frame_len(b"PING"), None);
    }

    #[test]
    fn frame_len_multibulk() {
        let frame = b"*1\r\n$4\r\nPING\r\n";
        assert_eq!(frame_len(frame), Some(frame.len()));
    }

    #[test]
    fn frame_len_multibulk_incomplete() {
        assert_eq!(frame_len(b"*1\r\n$4\r\nPI"), None);
    }

    #[tokio::test]
    async fn read_frame_across_partial_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        let (mut read_half, _write_half) = server_side.into_split();

        client.write_all(b"*1\r\n$4\r\nPI").await.unwrap();
        client.write_all(b"NG\r\n").await.unwrap();

        let mut buf = BytesMut::new();
        let frame = read_frame(&mut read_half, &mut buf).await.unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"*1\r\n$4\r\nPING\r\n");
    }
}
