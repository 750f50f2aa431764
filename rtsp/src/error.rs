//! Engine error taxonomy

use rtsp_io::{ControlError, SocketError};
use rtsp_protocol::{ConnectionState, Method, ProtocolError};
use std::io;
use thiserror::Error;

/// Errors surfaced to the caller of a control operation
///
/// State is never changed when an operation fails.
#[derive(Error, Debug)]
pub enum RtspError {
    /// The control connection or data socket could not be established
    #[error("Failed to establish {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Operation not valid in the current state; nothing was sent
    #[error("{operation} is not valid in state {state}")]
    InvalidState {
        operation: Method,
        state: ConnectionState,
    },

    /// Malformed or unsuccessful control response
    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    /// Transport failure during an otherwise valid exchange
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RtspError {
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, RtspError::InvalidState { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, RtspError::Protocol(_))
    }

    /// Status code of a rejected request, if that is what failed
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RtspError::Protocol(ProtocolError::Status { code, .. }) => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn data_socket(err: SocketError) -> Self {
        let source = match err {
            SocketError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::AddrNotAvailable, other.to_string()),
        };
        RtspError::Connection {
            target: "data socket".to_string(),
            source,
        }
    }
}

impl From<ProtocolError> for RtspError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => RtspError::Io(e),
            other => RtspError::Protocol(other),
        }
    }
}

impl From<ControlError> for RtspError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Connect { target, source } => RtspError::Connection { target, source },
            ControlError::Closed => RtspError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "control channel is closed",
            )),
            ControlError::Io(e) => RtspError::Io(e),
            ControlError::Protocol(e) => RtspError::Protocol(e),
        }
    }
}
