//! Protocol errors

use thiserror::Error;

/// Errors raised while reading or writing ADB framing
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream closed while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },

    #[error("session already finished")]
    SessionClosed,
}

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl ProtocolError {
    pub(crate) fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        ProtocolError::Malformed {
            what,
            detail: detail.into(),
        }
    }

    /// Map an I/O error from `read_exact` into an EOF condition where it is one
    pub(crate) fn from_read(err: std::io::Error, context: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::UnexpectedEof(context)
        } else {
            ProtocolError::Io(err)
        }
    }

    /// Transport-category errors end the session without any reply to the
    /// client. Everything this crate raises falls in that category except a
    /// write attempted on a finished session, which is a programming error.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ProtocolError::SessionClosed)
    }
}
