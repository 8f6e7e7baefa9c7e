//! Wire-protocol types shared by every crate that speaks to a client or
//! router socket: subjects, the `CONNECT`/`INFO` handshake documents, the
//! decoded-event types, the streaming parser, and the error taxonomy the
//! parser and its callers report through.

pub mod error;
pub mod info;
pub mod message;
pub mod parser;
pub mod subject;

pub use error::{ProtocolError, SubjectErrorWire};
pub use info::{ConnectOpts, ServerInfo, CLIENT_PROTO_INFO};
pub use message::{MsgArgs, ParsedEvent, PubArgs, SubArgs, UnsubArgs};
pub use parser::{ConnKind, Parser, ParserEvents};
pub use subject::{Subject, SubjectError, Token};
