//! Decoded wire-protocol events handed from the parser to the connection.

use bytes::Bytes;

/// Arguments of a `PUB subject [reply] size` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubArgs {
    pub subject: Box<[u8]>,
    pub reply: Option<Box<[u8]>>,
    pub size: usize,
}

/// Arguments of a `SUB subject [queue] sid` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubArgs {
    pub subject: Box<[u8]>,
    pub queue: Option<Box<[u8]>>,
    pub sid: Box<[u8]>,
}

/// Arguments of an `UNSUB sid [max-msgs]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubArgs {
    pub sid: Box<[u8]>,
    pub max: Option<u64>,
}

/// Arguments of an inbound `MSG subject sid [reply] size` line, used only
/// on router-kind connections (a router relays messages, it does not
/// originate `PUB`s for them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgArgs {
    pub subject: Box<[u8]>,
    pub sid: Box<[u8]>,
    pub reply: Option<Box<[u8]>>,
    pub size: usize,
}

/// One fully decoded protocol event. The parser drives a callback for each
/// of these as it walks the input; `Payload` always immediately follows
/// the `Pub`/`Msg` event whose `size` it satisfies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    Connect(Bytes),
    Pub(PubArgs, Bytes),
    Sub(SubArgs),
    Unsub(UnsubArgs),
    Msg(MsgArgs, Bytes),
    Ping,
    Pong,
    Info(Bytes),
    Ok,
    Err(Box<[u8]>),
}
