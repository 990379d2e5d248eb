//! Command binding and execution.
//!
//! A parsed RESP array becomes a [`Command`] in two steps: [`Command::bind`]
//! matches the (case-insensitive) name against the command table and checks
//! arity and argument shape, then [`Command::apply`] runs the operation
//! against the cache. Binding happens *before* the cache mutex is taken, so
//! a malformed command never holds the lock at all.
//!
//! ## Command table
//!
//! | Name     | Arity | Reply |
//! |----------|-------|-------|
//! | `SET`    | 3     | Null  |
//! | `GET`    | 2     | Bulk  |
//! | `LPUSH`  | ≥ 3   | Null  |
//! | `RPUSH`  | ≥ 3   | Null  |
//! | `LPOP`   | 2     | Bulk  |
//! | `RPOP`   | 2     | Bulk  |
//! | `LINDEX` | 3     | Bulk  |
//!
//! The variadic pushes apply their values left to right; a multi-value push
//! still acknowledges with a single Null.

use crate::protocol::{CommandArgs, Reply};
use crate::storage::{Cache, CacheError};
use bytes::Bytes;
use thiserror::Error;

/// Failures from binding or executing a command. Every variant renders as a
/// RESP simple error; none of them are fatal to the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// `args[0]` names no known command. Covers the empty (`*0`) command.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The argument count does not match the command's arity.
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    /// An argument that must be an integer is not one.
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The cache rejected the operation.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A validated cache operation, ready to run under the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: Bytes, value: Bytes },
    Get { key: Bytes },
    LPush { key: Bytes, values: Vec<Bytes> },
    RPush { key: Bytes, values: Vec<Bytes> },
    LPop { key: Bytes },
    RPop { key: Bytes },
    LIndex { key: Bytes, index: i64 },
}

impl Command {
    /// Binds a parsed array to a command, validating name, arity, and
    /// argument shape. Does not touch the cache.
    pub fn bind(mut args: CommandArgs) -> Result<Command, CommandError> {
        let Some(name) = args.first() else {
            return Err(CommandError::UnknownCommand(String::new()));
        };
        let name = String::from_utf8_lossy(name).to_uppercase();

        let command = match name.as_str() {
            "SET" => {
                let [_, key, value] = take_exact(args, "SET")?;
                Command::Set { key, value }
            }
            "GET" => {
                let [_, key] = take_exact(args, "GET")?;
                Command::Get { key }
            }
            "LPUSH" => {
                if args.len() < 3 {
                    return Err(CommandError::WrongArity("LPUSH"));
                }
                let values = args.split_off(2);
                Command::LPush { key: args.swap_remove(1), values }
            }
            "RPUSH" => {
                if args.len() < 3 {
                    return Err(CommandError::WrongArity("RPUSH"));
                }
                let values = args.split_off(2);
                Command::RPush { key: args.swap_remove(1), values }
            }
            "LPOP" => {
                let [_, key] = take_exact(args, "LPOP")?;
                Command::LPop { key }
            }
            "RPOP" => {
                let [_, key] = take_exact(args, "RPOP")?;
                Command::RPop { key }
            }
            "LINDEX" => {
                let [_, key, raw] = take_exact(args, "LINDEX")?;
                Command::LIndex { key, index: parse_index(&raw)? }
            }
            _ => return Err(CommandError::UnknownCommand(name)),
        };

        Ok(command)
    }

    /// Executes the command. The caller holds the cache mutex for the whole
    /// call, which keeps a variadic push atomic.
    pub fn apply(self, cache: &mut Cache) -> Result<Reply, CommandError> {
        let reply = match self {
            Command::Set { key, value } => {
                cache.set(key, value);
                Reply::Null
            }
            Command::Get { key } => Reply::Bulk(cache.get(&key)?),
            Command::LPush { key, values } => {
                for value in values {
                    cache.lpush(key.clone(), value)?;
                }
                Reply::Null
            }
            Command::RPush { key, values } => {
                for value in values {
                    cache.rpush(key.clone(), value)?;
                }
                Reply::Null
            }
            Command::LPop { key } => Reply::Bulk(cache.lpop(&key)?),
            Command::RPop { key } => Reply::Bulk(cache.rpop(&key)?),
            Command::LIndex { key, index } => Reply::Bulk(cache.lindex(&key, index)?),
        };
        Ok(reply)
    }
}

/// Destructures an argument vector into exactly `N` elements.
fn take_exact<const N: usize>(
    args: CommandArgs,
    name: &'static str,
) -> Result<[Bytes; N], CommandError> {
    <[Bytes; N]>::try_from(args).map_err(|_| CommandError::WrongArity(name))
}

/// Parses a decimal list index. Sign is accepted here; range checking is the
/// cache's call.
fn parse_index(raw: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotAnInteger)
}
