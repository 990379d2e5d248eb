//! Incremental RESP command parser.
//!
//! This module implements a resumable, byte-level parser for the command
//! subset of RESP:
//!
//! ```text
//! command := '*' <int N> CRLF bulk{N}
//! bulk    := '$' <int L> CRLF <L bytes> CRLF
//! ```
//!
//! TCP is a stream protocol: a command may arrive split at any byte boundary,
//! and one segment may carry many commands. The parser therefore keeps its
//! position *between* calls - the current state, the partially-decoded
//! integer, the element index, and the arguments accumulated so far - and
//! picks up exactly where the previous call stopped.
//!
//! ## Read/parse contract
//!
//! The driver loop alternates two calls:
//!
//! 1. [`RespParser::read_from`] pulls bytes from the connection into the
//!    accumulator, never past `max_command_size` total occupancy.
//! 2. [`RespParser::parse_command`] decodes as many complete commands as the
//!    accumulator holds. Three outcomes matter to the driver:
//!    - `Err(ParseError::BufferExhausted)`: a frame is still in flight.
//!      Not a failure - go back to reading.
//!    - `Ok(commands)`: one or more complete commands; any trailing partial
//!      frame stays buffered for the next round.
//!    - any other error: the client broke the protocol or outgrew the size
//!      bound; the driver decides whether the connection survives.
//!
//! ## Size enforcement
//!
//! A single command must fit in `max_command_size` bytes of accumulator
//! occupancy. The accumulator is recycled only once everything in it has been
//! consumed; while a frame is in flight, the bytes of commands already
//! handed out still count against the bound. When the in-flight frame can no
//! longer complete within the bound, [`ParseError::ExceededMaxSize`] is
//! returned and the whole accumulation run is abandoned by the driver.

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default bound on the framed size of a single command.
pub const DEFAULT_MAX_COMMAND_SIZE: usize = 10 * 1024;

/// A parsed command: the raw arguments of one RESP array, `args[0]` being the
/// command name.
pub type CommandArgs = Vec<Bytes>;

/// Errors surfaced by [`RespParser`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// The socket failed under the parser.
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed its write side.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A command cannot fit within the configured size bound.
    #[error("Call exceeded size allowed")]
    ExceededMaxSize,

    /// A frame is incomplete; more bytes are required. Not a real failure.
    #[error("incomplete frame, more bytes required")]
    BufferExhausted,

    /// A byte other than the expected frame marker was found.
    #[error("expected '{expected}', found {found:#04x}")]
    UnexpectedByte { expected: char, found: u8 },

    /// A length field held something other than an ASCII decimal digit.
    #[error("expected a decimal digit, found {0:#04x}")]
    InvalidDigit(u8),

    /// A CRLF terminator was missing where the grammar requires one.
    #[error("missing CRLF terminator")]
    MissingCrlf,

    /// A declared length does not fit in memory.
    #[error("declared length is too large")]
    LengthOverflow,
}

impl ParseError {
    /// True for errors that mean the connection itself is gone. The driver
    /// closes silently on these instead of attempting an error reply.
    pub fn is_connection_related(&self) -> bool {
        matches!(self, ParseError::Io(_) | ParseError::ConnectionClosed)
    }
}

/// Which byte class the state machine expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ExpectStar,
    ReadArrayLen,
    ExpectDollar,
    ReadBulkLen,
    ReadBulkBody,
    ReadBulkTrailCr,
    ReadBulkTrailLf,
}

/// A resumable RESP command parser over a bounded accumulator.
///
/// One parser serves one connection at a time; call [`RespParser::reset`]
/// when a new connection is accepted.
#[derive(Debug)]
pub struct RespParser {
    /// Accumulated, not-yet-recycled bytes from the connection.
    buf: BytesMut,
    /// Bound on accumulator occupancy, and so on framed command size.
    max_command_size: usize,
    /// Scan position within `buf`. Bytes before it have been decoded.
    pos: usize,
    state: State,
    /// Partially-decoded length field.
    int_acc: usize,
    have_digit: bool,
    /// Bulk strings still expected for the current array.
    remaining_elems: usize,
    /// Declared length of the bulk string being read.
    bulk_len: usize,
    /// Arguments decoded so far for the in-flight command.
    args: Vec<Bytes>,
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMMAND_SIZE)
    }
}

impl RespParser {
    /// Creates a parser enforcing the given per-command size bound.
    pub fn new(max_command_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_command_size.min(4096)),
            max_command_size,
            pos: 0,
            state: State::ExpectStar,
            int_acc: 0,
            have_digit: false,
            remaining_elems: 0,
            bulk_len: 0,
            args: Vec::new(),
        }
    }

    /// Discards the accumulator and all cursor state.
    ///
    /// Called when a new connection takes over the parser, and after an
    /// oversize command is rejected.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.state = State::ExpectStar;
        self.int_acc = 0;
        self.have_digit = false;
        self.remaining_elems = 0;
        self.bulk_len = 0;
        self.args.clear();
    }

    /// Number of bytes currently held in the accumulator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The configured per-command size bound.
    pub fn max_command_size(&self) -> usize {
        self.max_command_size
    }

    /// Pulls bytes from `conn` into the accumulator, up to the remaining
    /// size budget.
    ///
    /// Returns the number of bytes read. Fails with a connection-related
    /// error on any socket error or EOF, and with
    /// [`ParseError::ExceededMaxSize`] when the accumulator is already at
    /// capacity so no forward progress is possible.
    pub async fn read_from<C>(&mut self, conn: &mut C) -> Result<usize, ParseError>
    where
        C: AsyncRead + Unpin,
    {
        let budget = self.max_command_size - self.buf.len();
        if budget == 0 {
            return Err(ParseError::ExceededMaxSize);
        }

        let mut limited = (&mut self.buf).limit(budget);
        match conn.read_buf(&mut limited).await {
            Ok(0) => Err(ParseError::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(e) => Err(ParseError::Io(e)),
        }
    }

    /// Appends bytes to the accumulator without touching a socket, up to the
    /// remaining size budget. Returns how many bytes were accepted.
    ///
    /// This is the synchronous twin of [`RespParser::read_from`], for
    /// embedding the parser outside a connection.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let budget = self.max_command_size - self.buf.len();
        let n = budget.min(bytes.len());
        self.buf.extend_from_slice(&bytes[..n]);
        n
    }

    /// Decodes every complete command currently in the accumulator.
    ///
    /// - `Ok(commands)` - at least one complete command; a trailing partial
    ///   frame, if any, stays buffered.
    /// - `Err(BufferExhausted)` - no complete command yet; read more.
    /// - `Err(ExceededMaxSize)` - the in-flight frame can never complete
    ///   within the size bound. Nothing is surfaced from this accumulation
    ///   run; the caller is expected to [`reset`](RespParser::reset).
    /// - other errors - the frame is malformed. If previous commands in the
    ///   same accumulator completed first they are returned now, and the
    ///   error is reported by the next call instead.
    pub fn parse_command(&mut self) -> Result<Vec<CommandArgs>, ParseError> {
        let mut commands = Vec::new();

        loop {
            match self.advance() {
                Ok(Some(command)) => commands.push(command),
                Ok(None) => break,
                Err(e) => {
                    if commands.is_empty() {
                        return Err(e);
                    }
                    // The cursor still points at the offending byte, so the
                    // next call reproduces the error with an empty batch.
                    return Ok(commands);
                }
            }
        }

        if self.state == State::ExpectStar && self.pos == self.buf.len() {
            // Everything consumed: recycle the accumulator.
            self.buf.clear();
            self.pos = 0;
        } else if self.buf.len() >= self.max_command_size {
            // A frame is in flight and the accumulator cannot grow.
            return Err(ParseError::ExceededMaxSize);
        }

        if commands.is_empty() {
            Err(ParseError::BufferExhausted)
        } else {
            Ok(commands)
        }
    }

    /// Runs the state machine until one command completes, input runs dry
    /// (`Ok(None)`), or the frame turns out malformed.
    fn advance(&mut self) -> Result<Option<CommandArgs>, ParseError> {
        loop {
            match self.state {
                State::ExpectStar => {
                    let Some(&b) = self.buf.get(self.pos) else {
                        return Ok(None);
                    };
                    if b != b'*' {
                        return Err(ParseError::UnexpectedByte {
                            expected: '*',
                            found: b,
                        });
                    }
                    self.pos += 1;
                    self.int_acc = 0;
                    self.have_digit = false;
                    self.state = State::ReadArrayLen;
                }
                State::ReadArrayLen => {
                    let Some(count) = self.read_length()? else {
                        return Ok(None);
                    };
                    // Each element costs at least six bytes on the wire, so
                    // a count past this can never fit the size bound. Bail
                    // before reserving space for it.
                    if count > self.max_command_size / 6 {
                        return Err(ParseError::ExceededMaxSize);
                    }
                    self.remaining_elems = count;
                    self.args = Vec::with_capacity(count);
                    if count == 0 {
                        // An empty array is a complete (empty) command; the
                        // interpreter rejects it downstream.
                        self.state = State::ExpectStar;
                        return Ok(Some(Vec::new()));
                    }
                    self.state = State::ExpectDollar;
                }
                State::ExpectDollar => {
                    let Some(&b) = self.buf.get(self.pos) else {
                        return Ok(None);
                    };
                    if b != b'$' {
                        return Err(ParseError::UnexpectedByte {
                            expected: '$',
                            found: b,
                        });
                    }
                    self.pos += 1;
                    self.int_acc = 0;
                    self.have_digit = false;
                    self.state = State::ReadBulkLen;
                }
                State::ReadBulkLen => {
                    let Some(len) = self.read_length()? else {
                        return Ok(None);
                    };
                    self.bulk_len = len;
                    self.state = State::ReadBulkBody;
                }
                State::ReadBulkBody => {
                    if self.buf.len() - self.pos < self.bulk_len {
                        return Ok(None);
                    }
                    let body = Bytes::copy_from_slice(&self.buf[self.pos..self.pos + self.bulk_len]);
                    self.args.push(body);
                    self.pos += self.bulk_len;
                    self.state = State::ReadBulkTrailCr;
                }
                State::ReadBulkTrailCr => {
                    let Some(&b) = self.buf.get(self.pos) else {
                        return Ok(None);
                    };
                    if b != b'\r' {
                        return Err(ParseError::MissingCrlf);
                    }
                    self.pos += 1;
                    self.state = State::ReadBulkTrailLf;
                }
                State::ReadBulkTrailLf => {
                    let Some(&b) = self.buf.get(self.pos) else {
                        return Ok(None);
                    };
                    if b != b'\n' {
                        return Err(ParseError::MissingCrlf);
                    }
                    self.pos += 1;
                    self.remaining_elems -= 1;
                    if self.remaining_elems == 0 {
                        self.state = State::ExpectStar;
                        return Ok(Some(std::mem::take(&mut self.args)));
                    }
                    self.state = State::ExpectDollar;
                }
            }
        }
    }

    /// Reads a non-negative ASCII decimal length followed by CRLF, one byte
    /// at a time so the field may be split across reads. `Ok(None)` means
    /// the field is still incomplete.
    ///
    /// The terminating `\r` is only consumed together with its `\n`; until
    /// the `\n` arrives the cursor stays on the `\r`.
    fn read_length(&mut self) -> Result<Option<usize>, ParseError> {
        loop {
            let Some(&b) = self.buf.get(self.pos) else {
                return Ok(None);
            };
            match b {
                b'0'..=b'9' => {
                    self.int_acc = self
                        .int_acc
                        .checked_mul(10)
                        .and_then(|v| v.checked_add((b - b'0') as usize))
                        .ok_or(ParseError::LengthOverflow)?;
                    self.have_digit = true;
                    self.pos += 1;
                }
                b'\r' => {
                    if !self.have_digit {
                        return Err(ParseError::InvalidDigit(b));
                    }
                    let Some(&nl) = self.buf.get(self.pos + 1) else {
                        return Ok(None);
                    };
                    if nl != b'\n' {
                        return Err(ParseError::MissingCrlf);
                    }
                    self.pos += 2;
                    return Ok(Some(self.int_acc));
                }
                other => return Err(ParseError::InvalidDigit(other)),
            }
        }
    }
}
