//! Connection/server-level errors layered on top of the wire-protocol
//! taxonomy in `broker_protocol::ProtocolError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("maximum connections exceeded")]
    MaxConnectionsExceeded,

    #[error(transparent)]
    Protocol(#[from] broker_protocol::ProtocolError),
}
