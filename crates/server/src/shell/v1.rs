//! Legacy shell stream
//!
//! After `OKAY` the socket carries raw bytes both ways. There is no framing
//! and no exit status; the session ends when the server closes the socket.

use async_trait::async_trait;
use bytes::Bytes;
use fakeadb_protocol::{AdbSocket, ProtocolError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::{translate_newlines, ShellIo};

const READ_BUFFER: usize = 4096;

/// [`ShellIo`] over the raw socket of a `shell:` or `exec:` session
pub struct RawShellIo<'a> {
    socket: &'a mut dyn AdbSocket,
    newline: &'static [u8],
    stdin_closed: bool,
}

impl<'a> RawShellIo<'a> {
    /// `newline` replaces every `\n` written; pass `b"\n"` for none
    pub fn new(socket: &'a mut dyn AdbSocket, newline: &'static [u8]) -> Self {
        Self {
            socket,
            newline,
            stdin_closed: false,
        }
    }

    /// Close our side of the stream, which is how the client learns the
    /// command has finished
    pub async fn finish(self) -> Result<(), ProtocolError> {
        if let Err(e) = self.socket.shutdown().await {
            debug!("Shell stream shutdown failed: {}", e);
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let data = translate_newlines(data, self.newline);
        self.socket.write_all(&data).await?;
        self.socket.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ShellIo for RawShellIo<'_> {
    async fn read_stdin(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.stdin_closed {
            return Ok(None);
        }

        let mut buf = [0u8; READ_BUFFER];
        let n = self.socket.read(&mut buf).await?;
        if n == 0 {
            self.stdin_closed = true;
            return Ok(None);
        }
        Ok(Some(Bytes::copy_from_slice(&buf[..n])))
    }

    async fn write_stdout(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.write(data).await
    }

    async fn write_stderr(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.write(data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_output_translated_for_crlf_devices() {
        let mut mock = Builder::new().write(b"a\r\nb").write(b"err\r\n").build();
        let mut io = RawShellIo::new(&mut mock, b"\r\n");
        io.write_stdout(b"a\nb").await.unwrap();
        io.write_stderr(b"err\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_output_untouched_without_pty() {
        let mut mock = Builder::new().write(b"a\nb\n").build();
        let mut io = RawShellIo::new(&mut mock, b"\n");
        io.write_stdout(b"a\nb\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_stdin_until_eof() {
        let mut mock = Builder::new().read(b"abc").read(b"d\n").build();
        let mut io = RawShellIo::new(&mut mock, b"\n");
        assert_eq!(io.read_stdin().await.unwrap().as_deref(), Some(&b"abc"[..]));
        assert_eq!(io.read_stdin().await.unwrap().as_deref(), Some(&b"d\n"[..]));
        assert_eq!(io.read_stdin().await.unwrap(), None);
        assert_eq!(io.read_stdin().await.unwrap(), None);
    }
}
