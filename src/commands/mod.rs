//! The command layer: binding parsed arrays to cache operations.
//!
//! Sits between the RESP parser and the cache engine. Validation (name,
//! arity, integer arguments) happens at bind time, execution at apply time;
//! only the latter needs the cache lock.

pub mod command;

pub use command::{Command, CommandError};
