//! Server configuration: CLI flags and environment variables, parsed with
//! `clap`'s derive API, producing a single `ServerConfig` with documented
//! defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Ferrite server configuration.
///
/// Mirrors the `NetworkConfig`/`ConnectionConfig` split of network-level
/// vs. per-connection settings: `listen_*`/`databases`/`max_clients` are
/// server-wide, `client_timeout_secs` and `inbound_channel_capacity` shape
/// per-connection backpressure.
#[derive(Parser, Debug, Clone)]
#[command(name = "ferrite-server", about = "A Redis-compatible in-memory data store")]
pub struct ServerConfig {
    /// Address to bind the TCP listener to.
    #[arg(long, env = "FERRITE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "FERRITE_PORT", default_value_t = 6380)]
    pub port: u16,

    /// Directory for the append-only log and snapshot files.
    #[arg(long, env = "FERRITE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Number of logical databases.
    #[arg(long, env = "FERRITE_DATABASES", default_value_t = 16)]
    pub databases: usize,

    /// Maximum concurrent client connections.
    #[arg(long, env = "FERRITE_MAX_CLIENTS", default_value_t = 10_000)]
    pub max_clients: usize,

    /// Idle-client timeout in seconds. A negative value disables reaping.
    #[arg(long, env = "FERRITE_CLIENT_TIMEOUT_SECS", default_value_t = -1)]
    pub client_timeout_secs: i64,

    /// Whether the append-only log is enabled.
    #[arg(long, env = "FERRITE_APPENDONLY", default_value_t = false)]
    pub appendonly: bool,

    /// Snapshot file name, relative to `data_dir`.
    #[arg(long, env = "FERRITE_SNAPSHOT_FILE", default_value = "dump.fdb")]
    pub snapshot_file: String,

    /// Size of the dedicated connection worker pool. `0` disables the
    /// pool: each connection gets its own `tokio::spawn`ed task, which is
    /// already how tokio multiplexes onto OS threads.
    #[arg(long, env = "FERRITE_WORKER_POOL_SIZE", default_value_t = 0)]
    pub worker_pool_size: usize,

    /// `tracing-subscriber` `EnvFilter` directive string, e.g. `info` or
    /// `ferrite_server=debug,ferrite_core=info`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

impl ServerConfig {
    /// The bounded channel capacity for the loop's inbound command
    /// channel: a few multiples of `max_clients`, per the documented
    /// intentional-backpressure policy.
    #[must_use]
    pub fn inbound_channel_capacity(&self) -> usize {
        (self.max_clients * 4).max(1024).min(10_000)
    }

    /// Per-connection outbound push-slot capacity (pub/sub messages).
    #[must_use]
    pub fn push_slot_capacity(&self) -> usize {
        256
    }

    /// Idle timeout as a `Duration`, or `None` if reaping is disabled.
    #[must_use]
    pub fn client_idle_timeout(&self) -> Option<Duration> {
        if self.client_timeout_secs < 0 {
            None
        } else {
            Some(Duration::from_secs(self.client_timeout_secs as u64))
        }
    }

    /// Full path to the append-only log file.
    #[must_use]
    pub fn appendonly_path(&self) -> PathBuf {
        self.data_dir.join("appendonly.aof")
    }

    /// Full path to the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }
}
