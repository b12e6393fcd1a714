//! Shell protocol v2 session
//!
//! A session moves `Handshake -> Running -> Closing -> Done`:
//!
//! - `start` writes `OKAY` and enters `Running`
//! - `CLOSE_STDIN` from the client moves to `Closing`; reads return EOF
//! - `finish` writes the `EXIT_CODE` packet and enters `Done`
//!
//! Nothing may be written once the session is `Done`, so `EXIT_CODE` is
//! always the last packet on the wire.

use async_trait::async_trait;
use bytes::Bytes;
use fakeadb_protocol::shell_v2::{self, PacketKind};
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};
use tracing::trace;

use super::{translate_newlines, ShellIo};

/// Lifecycle of a v2 session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake,
    Running,
    /// Client closed stdin; output may still flow
    Closing,
    Done,
}

/// [`ShellIo`] over a framed `shell,v2:` socket
pub struct ShellV2Session<'a> {
    socket: &'a mut dyn AdbSocket,
    state: SessionState,
    max_chunk: usize,
    newline: &'static [u8],
}

impl<'a> ShellV2Session<'a> {
    pub fn new(socket: &'a mut dyn AdbSocket, max_chunk: usize, newline: &'static [u8]) -> Self {
        Self {
            socket,
            state: SessionState::Handshake,
            max_chunk,
            newline,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Accept the request
    pub async fn start(&mut self) -> Result<(), ProtocolError> {
        if self.state != SessionState::Handshake {
            return Err(ProtocolError::SessionClosed);
        }
        wire::write_okay(&mut *self.socket).await?;
        self.state = SessionState::Running;
        Ok(())
    }

    /// Write `EXIT_CODE` and end the session
    pub async fn finish(&mut self, code: u8) -> Result<(), ProtocolError> {
        self.ensure_writable()?;
        self.state = SessionState::Done;
        shell_v2::write_exit_code(&mut *self.socket, code).await
    }

    fn ensure_writable(&self) -> Result<(), ProtocolError> {
        match self.state {
            SessionState::Running | SessionState::Closing => Ok(()),
            SessionState::Handshake | SessionState::Done => Err(ProtocolError::SessionClosed),
        }
    }

    async fn write(&mut self, kind: PacketKind, data: &[u8]) -> Result<(), ProtocolError> {
        self.ensure_writable()?;
        let data = translate_newlines(data, self.newline);
        shell_v2::write_chunked(&mut *self.socket, kind, &data, self.max_chunk).await
    }
}

#[async_trait]
impl ShellIo for ShellV2Session<'_> {
    async fn read_stdin(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        loop {
            match self.state {
                SessionState::Running => {}
                SessionState::Closing | SessionState::Done => return Ok(None),
                SessionState::Handshake => return Err(ProtocolError::SessionClosed),
            }

            let packet = shell_v2::read_packet(&mut *self.socket).await?;
            match packet.kind {
                PacketKind::Stdin if !packet.payload.is_empty() => return Ok(Some(packet.payload)),
                PacketKind::CloseStdin => {
                    self.state = SessionState::Closing;
                    return Ok(None);
                }
                kind => trace!("Ignoring {:?} packet of {} bytes", kind, packet.payload.len()),
            }
        }
    }

    async fn write_stdout(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.write(PacketKind::Stdout, data).await
    }

    async fn write_stderr(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.write(PacketKind::Stderr, data).await
    }
}
