//! RESP wire protocol: incremental command parsing and reply encoding.
//!
//! Inbound traffic is restricted to the command subset of RESP - arrays of
//! bulk strings - decoded by a resumable state machine that tolerates
//! arbitrary fragmentation across socket reads. Outbound traffic is one of
//! three reply types (null, bulk string, simple error).
//!
//! - `parser`: the bounded, resumable command decoder
//! - `types`: the [`Reply`] value type and its serialization

pub mod parser;
pub mod types;

pub use parser::{CommandArgs, ParseError, RespParser, DEFAULT_MAX_COMMAND_SIZE};
pub use types::Reply;
