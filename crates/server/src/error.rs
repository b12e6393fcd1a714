//! Server errors

use fakeadb_core::FakeAdbError;
use fakeadb_device::DeviceError;
use thiserror::Error;

/// Errors raised by the server's lifecycle and control surface
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] FakeAdbError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("server is already running on {0}")]
    AlreadyStarted(std::net::SocketAddr),
}

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;
