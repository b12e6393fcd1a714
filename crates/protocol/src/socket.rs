//! Socket abstraction

use tokio::io::{AsyncRead, AsyncWrite};

/// A duplex byte stream a handler can own for the length of a session.
///
/// Implemented for anything async readable and writable, so handlers run
/// the same over `TcpStream` and `tokio::io::DuplexStream`.
pub trait AdbSocket: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AdbSocket for T where T: AsyncRead + AsyncWrite + Unpin + Send {}
