//! Shell v2 packet codec
//!
//! ```text
//! [u8 kind] [u32 LE length] [payload: length bytes]
//! ```
//!
//! Kinds:
//! - `0`: stdin (client → device)
//! - `1`: stdout (device → client)
//! - `2`: stderr (device → client)
//! - `3`: exit code, one byte, last packet of a session
//! - `4`: close stdin (client → device)
//! - `5`: window size change (client → device)
//! - `255`: invalid; any unknown kind byte also decodes to this

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// Size of the packet header on the wire
pub const HEADER_SIZE: usize = 5;

/// Largest payload accepted from a client (16 MB).
pub const MAX_PAYLOAD: u32 = 16 * 1024 * 1024;

/// Shell v2 packet kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Stdin = 0,
    Stdout = 1,
    Stderr = 2,
    ExitCode = 3,
    CloseStdin = 4,
    WindowSizeChange = 5,
    Invalid = 255,
}

impl PacketKind {
    /// Decode a kind byte. Unknown bytes map to [`PacketKind::Invalid`].
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => PacketKind::Stdin,
            1 => PacketKind::Stdout,
            2 => PacketKind::Stderr,
            3 => PacketKind::ExitCode,
            4 => PacketKind::CloseStdin,
            5 => PacketKind::WindowSizeChange,
            _ => PacketKind::Invalid,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A decoded shell v2 packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn stdin(data: impl Into<Bytes>) -> Self {
        Self::new(PacketKind::Stdin, data)
    }

    pub fn stdout(data: impl Into<Bytes>) -> Self {
        Self::new(PacketKind::Stdout, data)
    }

    pub fn stderr(data: impl Into<Bytes>) -> Self {
        Self::new(PacketKind::Stderr, data)
    }

    pub fn close_stdin() -> Self {
        Self::new(PacketKind::CloseStdin, Bytes::new())
    }

    pub fn exit_code(code: u8) -> Self {
        Self::new(PacketKind::ExitCode, Bytes::copy_from_slice(&[code]))
    }

    /// Exit status carried by an EXIT_CODE packet
    pub fn as_exit_code(&self) -> Option<u8> {
        match (self.kind, self.payload.as_ref()) {
            (PacketKind::ExitCode, [code]) => Some(*code),
            _ => None,
        }
    }

    /// Encode into `[kind][u32 LE length][payload]`
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.push(self.kind.code());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Read one packet. Blocks until the full header and payload are in;
/// end of stream anywhere inside a packet is [`ProtocolError::UnexpectedEof`].
pub async fn read_packet<S>(stream: &mut S) -> Result<Packet>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_SIZE];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| ProtocolError::from_read(e, "shell packet header"))?;

    let kind = PacketKind::from_code(header[0]);
    let length = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
    if length > MAX_PAYLOAD {
        return Err(ProtocolError::malformed(
            "shell packet header",
            format!("payload of {} bytes exceeds {}", length, MAX_PAYLOAD),
        ));
    }

    let mut payload = vec![0u8; length as usize];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| ProtocolError::from_read(e, "shell packet payload"))?;

    Ok(Packet {
        kind,
        payload: Bytes::from(payload),
    })
}

/// Write one packet
pub async fn write_packet<S>(stream: &mut S, packet: &Packet) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(&packet.encode()).await?;
    stream.flush().await?;
    Ok(())
}

/// Write `data` as a sequence of `kind` packets of at most `max_chunk`
/// bytes each. Empty data writes nothing.
pub async fn write_chunked<S>(
    stream: &mut S,
    kind: PacketKind,
    data: &[u8],
    max_chunk: usize,
) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    for chunk in data.chunks(max_chunk.max(1)) {
        write_packet(stream, &Packet::new(kind, Bytes::copy_from_slice(chunk))).await?;
    }
    Ok(())
}

/// Write the single-byte EXIT_CODE packet that ends a session
pub async fn write_exit_code<S>(stream: &mut S, code: u8) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    write_packet(stream, &Packet::exit_code(code)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    async fn decode(bytes: &[u8]) -> Result<Packet> {
        let mut stream = Builder::new().read(bytes).build();
        read_packet(&mut stream).await
    }

    #[tokio::test]
    async fn test_round_trip_each_kind() {
        let packets = [
            Packet::stdin(&b"abc"[..]),
            Packet::stdout(&b"hello\n"[..]),
            Packet::stderr(&b"oops"[..]),
            Packet::exit_code(7),
            Packet::close_stdin(),
            Packet::new(PacketKind::WindowSizeChange, &b"24x80,0x0\0"[..]),
        ];
        for packet in packets {
            assert_eq!(decode(&packet.encode()).await.unwrap(), packet);
        }
    }

    #[test]
    fn test_header_layout() {
        let encoded = Packet::stdout(vec![0xAA; 0x0102]).encode();
        assert_eq!(&encoded[..5], &[1, 0x02, 0x01, 0, 0]);
        assert_eq!(encoded.len(), 5 + 0x0102);
    }

    #[tokio::test]
    async fn test_unknown_kind_decodes_to_invalid() {
        let packet = decode(&[42, 1, 0, 0, 0, b'x']).await.unwrap();
        assert_eq!(packet.kind, PacketKind::Invalid);
        assert_eq!(packet.payload.as_ref(), b"x");
    }

    #[tokio::test]
    async fn test_short_reads_are_reassembled() {
        let encoded = Packet::stdin(&b"hello world"[..]).encode();
        let mut builder = Builder::new();
        for byte in &encoded {
            builder.read(std::slice::from_ref(byte));
        }
        let mut stream = builder.build();
        let packet = read_packet(&mut stream).await.unwrap();
        assert_eq!(packet.payload.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_truncated_header_is_eof() {
        assert!(matches!(
            decode(&[0, 3, 0]).await,
            Err(ProtocolError::UnexpectedEof("shell packet header"))
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_eof() {
        assert!(matches!(
            decode(&[0, 4, 0, 0, 0, b'a', b'b']).await,
            Err(ProtocolError::UnexpectedEof("shell packet payload"))
        ));
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let mut header = vec![1];
        header.extend_from_slice(&(MAX_PAYLOAD + 1).to_le_bytes());
        assert!(matches!(
            decode(&header).await,
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_chunking_reproduces_input() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for chunk in [1usize, 7, 80, 999, 1000, 4096] {
            let (mut writer, mut reader) = tokio::io::duplex(64 * 1024);
            write_chunked(&mut writer, PacketKind::Stdout, &data, chunk)
                .await
                .unwrap();
            drop(writer);

            let mut rebuilt = Vec::new();
            while let Ok(packet) = read_packet(&mut reader).await {
                assert_eq!(packet.kind, PacketKind::Stdout);
                assert!(packet.payload.len() <= chunk);
                rebuilt.extend_from_slice(&packet.payload);
            }
            assert_eq!(rebuilt, data, "chunk size {}", chunk);
        }
    }

    #[test]
    fn test_exit_code_accessor() {
        assert_eq!(Packet::exit_code(3).as_exit_code(), Some(3));
        assert_eq!(Packet::stdout(&b"3"[..]).as_exit_code(), None);
    }
}
