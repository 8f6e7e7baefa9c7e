//! Byte-driven protocol parser.
//!
//! One [`Parser`] per connection. `feed` is called with whatever a socket
//! read produced, however it happened to be chopped up by the kernel, and
//! walks it byte by byte through a state machine that mirrors a classic
//! line-protocol decoder: a run of per-letter states recognizing the verb,
//! then an argument-accumulation state, then (for `PUB`/`MSG`) a payload
//! state sized by the argument line itself.
//!
//! A command split across two `feed` calls is the common case, not an edge
//! case — a slow client can submit one byte per read. `arg_buf`/`msg_buf`
//! only get allocated into when that actually happens; the fast path reads
//! an argument or payload straight out of the caller's slice and copies it
//! exactly once, at the point it's handed to the event callback.

use crate::error::ProtocolError;
use crate::message::{MsgArgs, PubArgs, SubArgs, UnsubArgs};

/// Whether this connection speaks the client dialect or the (identical on
/// the wire, differently authorized) server-to-server dialect. A router
/// connection accepts inbound `MSG` frames; a client connection never
/// originates or receives one addressed with that verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnKind {
    Client,
    Router,
}

/// Callbacks the parser drives as it recognizes complete protocol events.
///
/// Implemented by the connection that owns this parser. Argument structs
/// and payloads are borrowed for the duration of the call only, so the
/// common unfragmented path never allocates beyond the one copy needed to
/// hand ownership to the callback.
pub trait ParserEvents {
    fn on_connect(&mut self, opts: &[u8]) -> Result<(), ProtocolError>;
    fn on_pub(&mut self, args: &PubArgs, payload: &[u8]) -> Result<(), ProtocolError>;
    fn on_sub(&mut self, args: &SubArgs) -> Result<(), ProtocolError>;
    fn on_unsub(&mut self, args: &UnsubArgs) -> Result<(), ProtocolError>;
    fn on_msg(&mut self, args: &MsgArgs, payload: &[u8]) -> Result<(), ProtocolError>;
    fn on_ping(&mut self) -> Result<(), ProtocolError>;
    fn on_pong(&mut self) -> Result<(), ProtocolError>;
    fn on_info(&mut self, raw: &[u8]) -> Result<(), ProtocolError>;
    fn on_ok(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }
    fn on_err(&mut self, raw: &[u8]) -> Result<(), ProtocolError> {
        let _ = raw;
        Ok(())
    }

    /// `CONNECT` is the only verb admitted before this returns `true`.
    fn is_authorized(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OpStart,

    OpC,
    OpCo,
    OpCon,
    OpConn,
    OpConne,
    OpConnec,
    OpConnect,
    ConnectArg,

    OpI,
    OpIn,
    OpInf,
    OpInfo,
    InfoArg,

    OpS,
    OpSu,
    OpSub,
    OpSubSpc,
    SubArg,

    OpU,
    OpUn,
    OpUns,
    OpUnsu,
    OpUnsub,
    OpUnsubSpc,
    UnsubArg,

    OpP,
    OpPu,
    OpPub,
    OpPubSpc,
    PubArg,
    OpPi,
    OpPin,
    OpPing,
    OpPo,
    OpPon,
    OpPong,

    OpM,
    OpMs,
    OpMsg,
    OpMsgSpc,
    MsgArgState,

    MsgPayload,

    OpPlus,
    OpPlusO,
    OpPlusOk,

    OpMinus,
    OpMinusE,
    OpMinusEr,
    OpMinusErr,
    OpMinusErrSpc,
    MinusErrArg,
}

/// Which verb's argument line is currently being accumulated, so a single
/// set of arg-scanning helpers can serve all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKind {
    Connect,
    Info,
    Sub,
    Unsub,
    Pub,
    Msg,
    Err,
}

/// Parsed arguments of a pending `PUB`/`MSG` line, held while the payload
/// that follows it is assembled.
#[derive(Debug, Clone)]
enum Pending {
    Pub(PubArgs),
    Msg(MsgArgs),
}

impl Pending {
    fn size(&self) -> usize {
        match self {
            Pending::Pub(a) => a.size,
            Pending::Msg(a) => a.size,
        }
    }
}

/// One connection's streaming decoder state.
pub struct Parser {
    state: State,
    /// Offset into the *current* `feed` buffer where the in-progress
    /// argument started. Meaningless (and unused) once `arg_buf` holds
    /// anything, since a continuation buffer is read from its own start.
    arg_start: usize,
    /// Trailing `\r` bytes seen before a terminating `\n`, trimmed off the
    /// argument before handing it to the caller.
    drop: usize,
    /// Set once an argument line is found in the current call.
    line_done: bool,
    /// Set once an argument line spans more than one `feed` call; holds
    /// everything accumulated across calls, not counting the current one.
    arg_buf: Option<Vec<u8>>,
    /// Accumulated payload bytes (plus trailing CRLF) once a `PUB`/`MSG`
    /// payload spans more than one `feed` call.
    msg_buf: Option<Vec<u8>>,
    pending: Option<Pending>,
    kind: ConnKind,
    max_control_line: usize,
    max_payload: usize,
}

impl Parser {
    pub fn new(kind: ConnKind, max_control_line: usize, max_payload: usize) -> Parser {
        Parser {
            state: State::OpStart,
            arg_start: 0,
            drop: 0,
            line_done: false,
            arg_buf: None,
            msg_buf: None,
            pending: None,
            kind,
            max_control_line,
            max_payload,
        }
    }

    /// Resets to `OP_START`, discarding any partially parsed command. Used
    /// after a recoverable verb-level error (spec.md §7): the connection
    /// stays open, the next byte is expected to start a fresh command.
    pub fn reset(&mut self) {
        self.state = State::OpStart;
        self.arg_start = 0;
        self.drop = 0;
        self.line_done = false;
        self.arg_buf = None;
        self.msg_buf = None;
        self.pending = None;
    }

    /// Feeds a chunk of socket input through the state machine, invoking
    /// `events` for each complete command recognized. Returns on the first
    /// error; the caller decides (via [`ProtocolError::is_fatal`]) whether
    /// to close the connection or [`Parser::reset`] and keep reading.
    pub fn feed<E: ParserEvents>(&mut self, buf: &[u8], events: &mut E) -> Result<(), ProtocolError> {
        let mut i = 0usize;
        while i < buf.len() {
            let b = buf[i];
            match self.state {
                State::OpStart => {
                    self.drop = 0;
                    match b {
                        b'C' | b'c' => self.state = State::OpC,
                        b'I' | b'i' => self.state = State::OpI,
                        b'S' | b's' => self.state = State::OpS,
                        b'U' | b'u' => self.state = State::OpU,
                        b'P' | b'p' => self.state = State::OpP,
                        b'M' | b'm' if self.kind == ConnKind::Router => self.state = State::OpM,
                        b'+' => self.state = State::OpPlus,
                        b'-' => self.state = State::OpMinus,
                        b'\r' | b'\n' => {}
                        _ => return Err(ProtocolError::UnknownOperation),
                    }
                }

                // ---- CONNECT ----
                State::OpC => self.expect(b, b'O', b'o', State::OpCo)?,
                State::OpCo => self.expect(b, b'N', b'n', State::OpCon)?,
                State::OpCon => self.expect(b, b'N', b'n', State::OpConn)?,
                State::OpConn => self.expect(b, b'E', b'e', State::OpConne)?,
                State::OpConne => self.expect(b, b'C', b'c', State::OpConnec)?,
                State::OpConnec => self.expect(b, b'T', b't', State::OpConnect)?,
                State::OpConnect => match b {
                    b' ' | b'\t' => {}
                    _ => {
                        self.begin_arg(State::ConnectArg, i);
                        i = self.scan_arg(i, buf);
                        self.check_line_len(i, ArgKind::Connect)?;
                        if self.arg_ready() {
                            let arg = self.take_arg(i, buf);
                            self.state = State::OpStart;
                            events.on_connect(&arg)?;
                        }
                    }
                },
                State::ConnectArg => {
                    i = self.scan_arg(i, buf);
                    self.check_line_len(i, ArgKind::Connect)?;
                    if self.arg_ready() {
                        let arg = self.take_arg(i, buf);
                        self.state = State::OpStart;
                        events.on_connect(&arg)?;
                    }
                }

                // ---- INFO ----
                State::OpI => self.expect(b, b'N', b'n', State::OpIn)?,
                State::OpIn => self.expect(b, b'F', b'f', State::OpInf)?,
                State::OpInf => self.expect(b, b'O', b'o', State::OpInfo)?,
                State::OpInfo => match b {
                    b' ' | b'\t' => {}
                    _ => {
                        self.begin_arg(State::InfoArg, i);
                        i = self.scan_arg(i, buf);
                        self.check_line_len(i, ArgKind::Info)?;
                        if self.arg_ready() {
                            let arg = self.take_arg(i, buf);
                            self.state = State::OpStart;
                            events.on_info(&arg)?;
                        }
                    }
                },
                State::InfoArg => {
                    i = self.scan_arg(i, buf);
                    self.check_line_len(i, ArgKind::Info)?;
                    if self.arg_ready() {
                        let arg = self.take_arg(i, buf);
                        self.state = State::OpStart;
                        events.on_info(&arg)?;
                    }
                }

                // ---- SUB ----
                State::OpS => self.expect(b, b'U', b'u', State::OpSu)?,
                State::OpSu => self.expect(b, b'B', b'b', State::OpSub)?,
                State::OpSub => match b {
                    b' ' | b'\t' => self.state = State::OpSubSpc,
                    _ => return Err(ProtocolError::MalformedArguments("SUB")),
                },
                State::OpSubSpc => match b {
                    b' ' | b'\t' => {}
                    _ => {
                        self.begin_arg(State::SubArg, i);
                        i = self.scan_arg(i, buf);
                        self.check_line_len(i, ArgKind::Sub)?;
                        if self.arg_ready() {
                            let raw = self.take_arg(i, buf);
                            let args = parse_sub_args(&raw)?;
                            self.state = State::OpStart;
                            events.on_sub(&args)?;
                        }
                    }
                },
                State::SubArg => {
                    i = self.scan_arg(i, buf);
                    self.check_line_len(i, ArgKind::Sub)?;
                    if self.arg_ready() {
                        let raw = self.take_arg(i, buf);
                        let args = parse_sub_args(&raw)?;
                        self.state = State::OpStart;
                        events.on_sub(&args)?;
                    }
                }

                // ---- UNSUB ----
                State::OpU => self.expect(b, b'N', b'n', State::OpUn)?,
                State::OpUn => self.expect(b, b'S', b's', State::OpUns)?,
                State::OpUns => self.expect(b, b'U', b'u', State::OpUnsu)?,
                State::OpUnsu => self.expect(b, b'B', b'b', State::OpUnsub)?,
                State::OpUnsub => match b {
                    b' ' | b'\t' => self.state = State::OpUnsubSpc,
                    _ => return Err(ProtocolError::MalformedArguments("UNSUB")),
                },
                State::OpUnsubSpc => match b {
                    b' ' | b'\t' => {}
                    _ => {
                        self.begin_arg(State::UnsubArg, i);
                        i = self.scan_arg(i, buf);
                        self.check_line_len(i, ArgKind::Unsub)?;
                        if self.arg_ready() {
                            let raw = self.take_arg(i, buf);
                            let args = parse_unsub_args(&raw)?;
                            self.state = State::OpStart;
                            events.on_unsub(&args)?;
                        }
                    }
                },
                State::UnsubArg => {
                    i = self.scan_arg(i, buf);
                    self.check_line_len(i, ArgKind::Unsub)?;
                    if self.arg_ready() {
                        let raw = self.take_arg(i, buf);
                        let args = parse_unsub_args(&raw)?;
                        self.state = State::OpStart;
                        events.on_unsub(&args)?;
                    }
                }

                // ---- PUB / PING / PONG ----
                State::OpP => match b {
                    b'U' | b'u' => self.state = State::OpPu,
                    b'I' | b'i' => self.state = State::OpPi,
                    b'O' | b'o' => self.state = State::OpPo,
                    _ => return Err(ProtocolError::UnknownOperation),
                },
                State::OpPu => self.expect(b, b'B', b'b', State::OpPub)?,
                State::OpPub => match b {
                    b' ' | b'\t' => self.state = State::OpPubSpc,
                    _ => return Err(ProtocolError::MalformedArguments("PUB")),
                },
                State::OpPubSpc => match b {
                    b' ' | b'\t' => {}
                    _ => {
                        self.begin_arg(State::PubArg, i);
                        i = self.scan_arg(i, buf);
                        self.check_line_len(i, ArgKind::Pub)?;
                        if self.arg_ready() {
                            let raw = self.take_arg(i, buf);
                            let args = parse_pub_args(&raw)?;
                            if args.size > self.max_payload {
                                return Err(ProtocolError::MaxPayloadExceeded);
                            }
                            i = self.enter_payload(Pending::Pub(args), i, buf, events)?;
                        }
                    }
                },
                State::PubArg => {
                    i = self.scan_arg(i, buf);
                    self.check_line_len(i, ArgKind::Pub)?;
                    if self.arg_ready() {
                        let raw = self.take_arg(i, buf);
                        let args = parse_pub_args(&raw)?;
                        if args.size > self.max_payload {
                            return Err(ProtocolError::MaxPayloadExceeded);
                        }
                        i = self.enter_payload(Pending::Pub(args), i, buf, events)?;
                    }
                }

                State::OpPi => self.expect(b, b'N', b'n', State::OpPin)?,
                State::OpPin => self.expect(b, b'G', b'g', State::OpPing)?,
                State::OpPing => match b {
                    b'\r' => {}
                    b'\n' => {
                        self.state = State::OpStart;
                        events.on_ping()?;
                    }
                    _ => return Err(ProtocolError::UnknownOperation),
                },

                State::OpPo => self.expect(b, b'N', b'n', State::OpPon)?,
                State::OpPon => self.expect(b, b'G', b'g', State::OpPong)?,
                State::OpPong => match b {
                    b'\r' => {}
                    b'\n' => {
                        self.state = State::OpStart;
                        events.on_pong()?;
                    }
                    _ => return Err(ProtocolError::UnknownOperation),
                },

                // ---- MSG (router inbound only) ----
                State::OpM => self.expect(b, b'S', b's', State::OpMs)?,
                State::OpMs => self.expect(b, b'G', b'g', State::OpMsg)?,
                State::OpMsg => match b {
                    b' ' | b'\t' => self.state = State::OpMsgSpc,
                    _ => return Err(ProtocolError::MalformedArguments("MSG")),
                },
                State::OpMsgSpc => match b {
                    b' ' | b'\t' => {}
                    _ => {
                        self.begin_arg(State::MsgArgState, i);
                        i = self.scan_arg(i, buf);
                        self.check_line_len(i, ArgKind::Msg)?;
                        if self.arg_ready() {
                            let raw = self.take_arg(i, buf);
                            let args = parse_msg_args(&raw)?;
                            if args.size > self.max_payload {
                                return Err(ProtocolError::MaxPayloadExceeded);
                            }
                            i = self.enter_payload(Pending::Msg(args), i, buf, events)?;
                        }
                    }
                },
                State::MsgArgState => {
                    i = self.scan_arg(i, buf);
                    self.check_line_len(i, ArgKind::Msg)?;
                    if self.arg_ready() {
                        let raw = self.take_arg(i, buf);
                        let args = parse_msg_args(&raw)?;
                        if args.size > self.max_payload {
                            return Err(ProtocolError::MaxPayloadExceeded);
                        }
                        i = self.enter_payload(Pending::Msg(args), i, buf, events)?;
                    }
                }

                State::MsgPayload => {
                    i = self.continue_payload(i, buf, events)?;
                }

                // ---- +OK ----
                State::OpPlus => self.expect(b, b'O', b'o', State::OpPlusO)?,
                State::OpPlusO => self.expect(b, b'K', b'k', State::OpPlusOk)?,
                State::OpPlusOk => match b {
                    b'\r' => {}
                    b'\n' => {
                        self.state = State::OpStart;
                        events.on_ok()?;
                    }
                    _ => return Err(ProtocolError::UnknownOperation),
                },

                // ---- -ERR ----
                State::OpMinus => self.expect(b, b'E', b'e', State::OpMinusE)?,
                State::OpMinusE => self.expect(b, b'R', b'r', State::OpMinusEr)?,
                State::OpMinusEr => self.expect(b, b'R', b'r', State::OpMinusErr)?,
                State::OpMinusErr => match b {
                    b' ' | b'\t' => self.state = State::OpMinusErrSpc,
                    b'\r' => {}
                    b'\n' => {
                        self.state = State::OpStart;
                        events.on_err(b"")?;
                    }
                    _ => return Err(ProtocolError::UnknownOperation),
                },
                State::OpMinusErrSpc => match b {
                    b' ' | b'\t' => {}
                    _ => {
                        self.begin_arg(State::MinusErrArg, i);
                        i = self.scan_arg(i, buf);
                        self.check_line_len(i, ArgKind::Err)?;
                        if self.arg_ready() {
                            let arg = self.take_arg(i, buf);
                            self.state = State::OpStart;
                            events.on_err(&arg)?;
                        }
                    }
                },
                State::MinusErrArg => {
                    i = self.scan_arg(i, buf);
                    self.check_line_len(i, ArgKind::Err)?;
                    if self.arg_ready() {
                        let arg = self.take_arg(i, buf);
                        self.state = State::OpStart;
                        events.on_err(&arg)?;
                    }
                }
            }

            i += 1;
        }
        Ok(())
    }

    /// Advances one of the fixed-letter verb states, case-insensitively.
    fn expect(&mut self, got: u8, upper: u8, lower: u8, next: State) -> Result<(), ProtocolError> {
        if got == upper || got == lower {
            self.state = next;
            Ok(())
        } else {
            Err(ProtocolError::UnknownOperation)
        }
    }

    fn begin_arg(&mut self, state: State, i: usize) {
        self.state = state;
        self.arg_start = i;
        self.drop = 0;
        self.line_done = false;
    }

    /// Scans from `i` to either the `\n` ending the argument line (setting
    /// `line_done`) or the end of `buf` (spilling into `arg_buf` and
    /// waiting for more). Returns the last index examined.
    fn scan_arg(&mut self, mut i: usize, buf: &[u8]) -> usize {
        loop {
            match buf[i] {
                b'\r' => self.drop += 1,
                b'\n' => {
                    self.line_done = true;
                    return i;
                }
                _ => self.drop = 0,
            }
            if i + 1 >= buf.len() {
                let mut acc = self.arg_buf.take().unwrap_or_default();
                acc.extend_from_slice(&buf[self.arg_start..]);
                self.arg_buf = Some(acc);
                self.arg_start = 0;
                return i;
            }
            i += 1;
        }
    }

    fn arg_ready(&self) -> bool {
        self.line_done
    }

    /// Returns the trimmed argument bytes (no trailing `\r`s), draining
    /// `arg_buf` if the line was fragmented, otherwise slicing `buf`
    /// directly.
    fn take_arg(&mut self, i: usize, buf: &[u8]) -> Vec<u8> {
        self.line_done = false;
        if let Some(mut acc) = self.arg_buf.take() {
            acc.extend_from_slice(&buf[0..=i]);
            let end = acc.len() - 1 - self.drop;
            acc.truncate(end);
            acc
        } else {
            let end = i - self.drop;
            buf[self.arg_start..end].to_vec()
        }
    }

    /// Total bytes scanned for the in-progress argument so far, whether or
    /// not it has spilled into `arg_buf`.
    fn current_arg_len(&self, i: usize) -> usize {
        match &self.arg_buf {
            Some(acc) => acc.len(),
            None => i + 1 - self.arg_start,
        }
    }

    /// Enforces the control-line cap unconditionally — called right after
    /// every `scan_arg`, whether or not the line terminated this call, so
    /// an oversized line can't slip through by arriving whole in one read.
    fn check_line_len(&self, i: usize, _kind: ArgKind) -> Result<(), ProtocolError> {
        if self.current_arg_len(i) > self.max_control_line {
            Err(ProtocolError::LineTooLong)
        } else {
            Ok(())
        }
    }

    /// Called the instant a `PUB`/`MSG` argument line is fully parsed.
    /// `i` is the index of that line's terminating `\n`. If the payload
    /// (plus its own trailing CRLF) is already fully present in `buf`,
    /// dispatches immediately with no copy into `msg_buf`; otherwise
    /// buffers what's available and arms `MsgPayload` to finish the job
    /// across subsequent `feed` calls.
    fn enter_payload<E: ParserEvents>(
        &mut self,
        pending: Pending,
        i: usize,
        buf: &[u8],
        events: &mut E,
    ) -> Result<usize, ProtocolError> {
        let size = pending.size();
        let payload_start = i + 1;
        let available = buf.len().saturating_sub(payload_start);
        if available >= size + 2 {
            let payload_end = payload_start + size;
            let payload = &buf[payload_start..payload_end];
            self.state = State::OpStart;
            dispatch(pending, payload, events)?;
            Ok(payload_end + 1)
        } else {
            self.pending = Some(pending);
            self.msg_buf = Some(buf[payload_start..].to_vec());
            self.state = State::MsgPayload;
            Ok(buf.len().saturating_sub(1))
        }
    }

    /// Continues a payload that spilled across a previous `feed` call.
    fn continue_payload<E: ParserEvents>(
        &mut self,
        i: usize,
        buf: &[u8],
        events: &mut E,
    ) -> Result<usize, ProtocolError> {
        let size = self
            .pending
            .as_ref()
            .map(Pending::size)
            .expect("MsgPayload state without pending args");
        let mut acc = self.msg_buf.take().unwrap_or_default();
        let needed = (size + 2).saturating_sub(acc.len());
        let take = needed.min(buf.len() - i);
        acc.extend_from_slice(&buf[i..i + take]);
        if acc.len() >= size + 2 {
            let pending = self.pending.take().expect("checked above");
            let payload = acc[..size].to_vec();
            self.state = State::OpStart;
            dispatch(pending, &payload, events)?;
            Ok(i + take - 1)
        } else {
            self.msg_buf = Some(acc);
            Ok(i + take - 1)
        }
    }
}

fn dispatch<E: ParserEvents>(pending: Pending, payload: &[u8], events: &mut E) -> Result<(), ProtocolError> {
    match pending {
        Pending::Pub(args) => events.on_pub(&args, payload),
        Pending::Msg(args) => events.on_msg(&args, payload),
    }
}

fn split_ws(raw: &[u8]) -> Vec<&[u8]> {
    raw.split(|b| *b == b' ' || *b == b'\t')
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_pub_args(raw: &[u8]) -> Result<PubArgs, ProtocolError> {
    let parts = split_ws(raw);
    match parts.len() {
        2 => Ok(PubArgs {
            subject: parts[0].into(),
            reply: None,
            size: parse_size(parts[1], "PUB")?,
        }),
        3 => Ok(PubArgs {
            subject: parts[0].into(),
            reply: Some(parts[1].into()),
            size: parse_size(parts[2], "PUB")?,
        }),
        _ => Err(ProtocolError::MalformedArguments("PUB")),
    }
}

fn parse_msg_args(raw: &[u8]) -> Result<MsgArgs, ProtocolError> {
    let parts = split_ws(raw);
    match parts.len() {
        3 => Ok(MsgArgs {
            subject: parts[0].into(),
            sid: parts[1].into(),
            reply: None,
            size: parse_size(parts[2], "MSG")?,
        }),
        4 => Ok(MsgArgs {
            subject: parts[0].into(),
            sid: parts[1].into(),
            reply: Some(parts[2].into()),
            size: parse_size(parts[3], "MSG")?,
        }),
        _ => Err(ProtocolError::MalformedArguments("MSG")),
    }
}

fn parse_sub_args(raw: &[u8]) -> Result<SubArgs, ProtocolError> {
    let parts = split_ws(raw);
    match parts.len() {
        2 => Ok(SubArgs {
            subject: parts[0].into(),
            queue: None,
            sid: parts[1].into(),
        }),
        3 => Ok(SubArgs {
            subject: parts[0].into(),
            queue: Some(parts[1].into()),
            sid: parts[2].into(),
        }),
        _ => Err(ProtocolError::MalformedArguments("SUB")),
    }
}

fn parse_unsub_args(raw: &[u8]) -> Result<UnsubArgs, ProtocolError> {
    let parts = split_ws(raw);
    match parts.len() {
        1 => Ok(UnsubArgs {
            sid: parts[0].into(),
            max: None,
        }),
        2 => {
            let max = std::str::from_utf8(parts[1])
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or(ProtocolError::MalformedArguments("UNSUB"))?;
            Ok(UnsubArgs {
                sid: parts[0].into(),
                max: Some(max),
            })
        }
        _ => Err(ProtocolError::MalformedArguments("UNSUB")),
    }
}

fn parse_size(raw: &[u8], verb: &'static str) -> Result<usize, ProtocolError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or(ProtocolError::MalformedArguments(verb))
}
