//! Ferrite server — networking, the single-writer event loop, persistence,
//! and replication for the Ferrite in-memory data store.
//!
//! - **Networking** ([`net`]): the TCP accept loop and per-connection frame
//!   reader, forwarding tokenized commands to the event loop.
//! - **Event loop** ([`server`]): [`server::ServerState`] and [`server::run`],
//!   the single task that owns every database, the client registry, and
//!   the persistence/replication subsystems.
//! - **Sessions** ([`session`]): the client registry and per-client state.
//! - **Pub/sub** ([`pubsub`]): channel subscription bookkeeping.
//! - **Persistence** ([`persistence`]): the point-in-time snapshot writer.
//! - **Append log** ([`aof`]): the write-ahead journal and its replay.
//! - **Replication** ([`replication`]): buffered propagation to followers.
//! - **Configuration** ([`config`]): CLI/env server configuration.
//! - **Shutdown** ([`shutdown`]): graceful-drain coordination.

pub mod aof;
pub mod config;
pub mod error;
pub mod net;
pub mod persistence;
pub mod pubsub;
pub mod replication;
pub mod server;
pub mod session;
pub mod shutdown;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use clap::Parser;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::config::ServerConfig;
    use crate::session::ClientRegistry;
    use crate::shutdown::ShutdownController;

    /// Brings up a full loop (accept loop + event loop) on an ephemeral
    /// port, issues a handful of commands over a real TCP socket, and
    /// checks the replies -- the same end-to-end path a real client uses.
    #[tokio::test]
    async fn roundtrip_set_get_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().into_owned();
        let config = ServerConfig::parse_from(["ferrite-server", "--data-dir", &data_dir]);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let clients = Arc::new(ClientRegistry::new(config.push_slot_capacity()));
        let (state, inbound_rx, inbound_tx) = crate::server::build(config.clone(), Arc::clone(&clients)).unwrap();
        let shutdown = Arc::new(ShutdownController::new());

        let loop_handle = tokio::spawn(crate::server::run(state, inbound_rx, Arc::clone(&shutdown)));
        let accept_handle = tokio::spawn(crate::net::run_accept_loop(
            listener,
            inbound_tx,
            Arc::clone(&clients),
            config.max_clients,
            Arc::clone(&shutdown),
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+OK\r\n");

        stream.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$1\r\nv\r\n");

        drop(stream);
        shutdown.trigger_shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(1), accept_handle).await;
        let _ = tokio::time::timeout(Duration::from_secs(1), loop_handle).await;
    }

    #[tokio::test]
    async fn connection_over_max_clients_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().into_owned();
        let mut config = ServerConfig::parse_from(["ferrite-server", "--data-dir", &data_dir]);
        config.max_clients = 0;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let clients = Arc::new(ClientRegistry::new(config.push_slot_capacity()));
        let (_state, _inbound_rx, inbound_tx) = crate::server::build(config.clone(), Arc::clone(&clients)).unwrap();
        let shutdown = Arc::new(ShutdownController::new());

        let accept_handle = tokio::spawn(crate::net::run_accept_loop(
            listener,
            inbound_tx,
            Arc::clone(&clients),
            config.max_clients,
            Arc::clone(&shutdown),
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_millis(200), stream.read(&mut buf)).await;
        // Either the read times out waiting on a closed-but-unacknowledged
        // socket, or it observes EOF (`Ok(Ok(0))`) -- never a reply.
        match read {
            Ok(Ok(n)) => assert_eq!(n, 0),
            Ok(Err(_)) | Err(_) => {}
        }

        shutdown.trigger_shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(1), accept_handle).await;
    }
}
