//! Error types for the networking and persistence layers.
//!
//! Library-internal errors use `thiserror`; the CLI binary wraps startup
//! failures in `anyhow::Context` instead (see `src/bin/ferrite_server.rs`).

use thiserror::Error;

/// Errors raised while accepting or servicing a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Frame(#[from] ferrite_core::FrameError),
}

/// Errors raised by the persistence subsystem.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("snapshot decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error("unsupported snapshot format version: {0}")]
    UnsupportedVersion(u8),
}
