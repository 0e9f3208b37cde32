//! The command table: name -> handler dispatch, and the reply sum type
//! every handler returns.

use std::collections::HashMap;

use bytes::Bytes;

use crate::database::Database;

/// A reply value: the sum type every command handler returns, mirroring
/// RESP's own shape (simple string, error, integer, bulk string, array,
/// null bulk, null array).
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyValue {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    NullBulk,
    NullArray,
    Array(Vec<ReplyValue>),
}

impl ReplyValue {
    /// Shorthand for the common `+OK\r\n` reply.
    #[must_use]
    pub fn ok() -> Self {
        ReplyValue::Simple("OK".to_string())
    }

    /// Whether this reply represents an error (used to gate journaling and
    /// replication: only non-error writes advance dirty/log/replication).
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ReplyValue::Error(_))
    }

    /// Builds a bulk reply from an optional byte string, mapping `None` to
    /// the RESP null bulk reply (`GET` on a missing key, etc.).
    #[must_use]
    pub fn bulk_or_null(value: Option<Bytes>) -> Self {
        match value {
            Some(bytes) => ReplyValue::Bulk(bytes),
            None => ReplyValue::NullBulk,
        }
    }
}

/// Context a handler needs to execute: the client's selected database.
/// Handlers that touch cross-database state (pub/sub, replication,
/// `SELECT` itself) are given wider context by the server-layer dispatcher
/// that wraps the command table; the table only knows about the database.
pub struct CommandContext<'a> {
    pub db: &'a mut Database,
    pub now_millis: u64,
    pub args: &'a [Bytes],
}

/// A command handler: takes the execution context, returns a reply.
pub type CommandHandler = fn(&mut CommandContext<'_>) -> ReplyValue;

/// Static metadata about one registered command.
pub struct CommandSpec {
    pub name: &'static str,
    pub handler: CommandHandler,
    pub is_write: bool,
    pub min_arity: usize,
}

/// Process-wide mapping from uppercase command name to its spec.
///
/// Populated once via [`register_builtin_commands`], called from the
/// server constructor, rather than relying on hidden process-wide
/// initialization order.
#[derive(Default)]
pub struct CommandTable {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one command. Panics on duplicate registration, since that
    /// can only happen from a programming error in the registration
    /// function itself.
    pub fn register(&mut self, spec: CommandSpec) {
        let name = spec.name;
        if self.commands.insert(name, spec).is_some() {
            panic!("duplicate command registration for {name}");
        }
    }

    /// Looks up a command spec by name, case-insensitively.
    #[must_use]
    pub fn lookup(&self, name: &[u8]) -> Option<&CommandSpec> {
        let upper = String::from_utf8_lossy(name).to_ascii_uppercase();
        self.commands.get(upper.as_str())
    }

    /// Dispatches a tokenized command.
    ///
    /// Returns `(reply, is_write)`; the caller (the event loop) decides
    /// whether to journal/replicate based on `is_write && !reply.is_error()`.
    pub fn dispatch(&self, db: &mut Database, now_millis: u64, args: &[Bytes]) -> (ReplyValue, bool) {
        let Some(name) = args.first() else {
            return (ReplyValue::Error("ERR empty command".to_string()), false);
        };
        let Some(spec) = self.lookup(name) else {
            return (ReplyValue::Error("ERR unsupported command".to_string()), false);
        };
        if args.len() < spec.min_arity {
            return (
                ReplyValue::Error(format!(
                    "ERR wrong number of arguments for '{}' command",
                    spec.name.to_ascii_lowercase()
                )),
                false,
            );
        }
        let mut ctx = CommandContext { db, now_millis, args };
        let reply = (spec.handler)(&mut ctx);
        (reply, spec.is_write)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the table has no registered commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
