//! Error types shared by the core data model.

use thiserror::Error;

/// Errors raised while operating on a [`crate::value::Value`] or a
/// [`crate::database::Database`].
///
/// These map 1:1 onto the wire-level error prefixes (`WRONGTYPE`, `ERR`)
/// that the server layer turns into [`crate::command::ReplyValue::Error`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The command requires a different value type than the one stored at the key.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The stored string value is not a valid base-10 integer.
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    /// A numeric argument would overflow on increment/decrement.
    #[error("ERR increment or decrement would overflow")]
    Overflow,

    /// A numeric argument supplied by the client is not a valid float.
    #[error("ERR value is not a valid float")]
    NotAFloat,
}
