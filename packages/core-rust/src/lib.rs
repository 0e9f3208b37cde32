//! Ferrite core -- the in-memory value model, skip-list index, wire codec,
//! and command table shared by the Ferrite server.
//!
//! - **Value model** ([`value`]): the tagged `Value` enum over string,
//!   list, set, hash, and ordered-set types.
//! - **Skip list** ([`skiplist`]): probabilistic ordered map backing
//!   ordered-set values.
//! - **Ordered sets** ([`zset`]): `OrderedSet`, built on the skip list.
//! - **Database** ([`database`]): per-database key space with lazy TTL
//!   expiry and the probabilistic sweep.
//! - **Timers** ([`timer`]): the scheduled/periodic callback list.
//! - **Wire codec** ([`resp`]): RESP encoding and frame tokenization.
//! - **Command table** ([`command`], [`builtin`]): name -> handler
//!   dispatch.
//! - **Clock** ([`clock`]): wall-clock abstraction for deterministic tests.

pub mod builtin;
pub mod clock;
pub mod command;
pub mod database;
pub mod error;
pub mod resp;
pub mod skiplist;
pub mod timer;
pub mod value;
pub mod zset;

pub use builtin::register_builtin_commands;
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use command::{CommandContext, CommandHandler, CommandSpec, CommandTable, ReplyValue};
pub use database::Database;
pub use error::CoreError;
pub use resp::{encode_command, encode_reply, tokenize_frame, FrameError};
pub use skiplist::SkipList;
pub use timer::{TimerEntry, TimerList};
pub use value::Value;
pub use zset::OrderedSet;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        let mut table = CommandTable::new();
        register_builtin_commands(&mut table);
        assert!(table.len() > 20);
    }
}
