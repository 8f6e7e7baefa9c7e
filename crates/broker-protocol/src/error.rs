use thiserror::Error;

use crate::subject::SubjectError;

/// Errors raised while decoding the wire protocol.
///
/// Mirrors the taxonomy from the design: some variants are fatal (the
/// caller must close the connection after reporting them), others are
/// recoverable verb-level errors that just get `-ERR`'d back to the
/// client. [`ProtocolError::is_fatal`] tells the two apart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown Protocol Operation")]
    UnknownOperation,

    #[error("Invalid Subject")]
    InvalidSubject(#[from] SubjectErrorWire),

    #[error("Maximum Payload Exceeded")]
    MaxPayloadExceeded,

    #[error("Authorization Violation")]
    AuthorizationViolation,

    #[error("Authorization Timeout")]
    AuthorizationTimeout,

    #[error("Permissions Violation")]
    PermissionsViolation,

    #[error("'{0}' malformed arguments")]
    MalformedArguments(&'static str),

    #[error("control line exceeds maximum size")]
    LineTooLong,
}

impl ProtocolError {
    /// Whether the connection must be closed after this error is reported,
    /// per spec.md §7's error taxonomy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownOperation
                | ProtocolError::MaxPayloadExceeded
                | ProtocolError::AuthorizationViolation
                | ProtocolError::AuthorizationTimeout
        )
    }

    /// The exact `-ERR '...'` text to send back to the client.
    pub fn wire_message(&self) -> String {
        match self {
            ProtocolError::InvalidSubject(_) => "-ERR 'Invalid Subject'\r\n".to_string(),
            ProtocolError::MalformedArguments(verb) => {
                format!("-ERR 'Invalid {verb} Arguments'\r\n")
            }
            other => format!("-ERR '{other}'\r\n"),
        }
    }
}

/// Newtype so `SubjectError` (which has no wire-level concept of the
/// connection it arrived on) can implement `From` into `ProtocolError`
/// without the orphan rule getting in the way if `SubjectError` gains
/// its own `From` impls later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectErrorWire(pub SubjectError);

impl From<SubjectError> for ProtocolError {
    fn from(e: SubjectError) -> Self {
        ProtocolError::InvalidSubject(SubjectErrorWire(e))
    }
}

impl std::fmt::Display for SubjectErrorWire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SubjectErrorWire {}
