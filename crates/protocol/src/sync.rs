//! File sync sub-protocol framing
//!
//! After a `sync:` request is accepted, both sides exchange messages that
//! start with a 4 byte ASCII id and a little-endian u32. The u32 is a length
//! for requests, `DATA`, `FAIL` and `DENT` names, and a value (mtime, zero)
//! otherwise.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// Largest `DATA` chunk either side may send
pub const SYNC_DATA_MAX: usize = 64 * 1024;

/// Largest path accepted in a request
pub const MAX_PATH_LENGTH: u32 = 1024;

/// Sync message ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncId {
    Stat,
    List,
    Send,
    Recv,
    Quit,
    Data,
    Done,
    Dent,
    Okay,
    Fail,
}

impl SyncId {
    pub fn as_bytes(self) -> &'static [u8; 4] {
        match self {
            SyncId::Stat => b"STAT",
            SyncId::List => b"LIST",
            SyncId::Send => b"SEND",
            SyncId::Recv => b"RECV",
            SyncId::Quit => b"QUIT",
            SyncId::Data => b"DATA",
            SyncId::Done => b"DONE",
            SyncId::Dent => b"DENT",
            SyncId::Okay => b"OKAY",
            SyncId::Fail => b"FAIL",
        }
    }

    pub fn from_bytes(bytes: &[u8; 4]) -> Option<Self> {
        match bytes {
            b"STAT" => Some(SyncId::Stat),
            b"LIST" => Some(SyncId::List),
            b"SEND" => Some(SyncId::Send),
            b"RECV" => Some(SyncId::Recv),
            b"QUIT" => Some(SyncId::Quit),
            b"DATA" => Some(SyncId::Data),
            b"DONE" => Some(SyncId::Done),
            b"DENT" => Some(SyncId::Dent),
            b"OKAY" => Some(SyncId::Okay),
            b"FAIL" => Some(SyncId::Fail),
            _ => None,
        }
    }
}

/// File metadata carried by `STAT` and `DENT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStat {
    pub mode: u32,
    pub size: u32,
    pub mtime: u32,
}

/// Read an 8 byte message header
pub async fn read_header<S>(stream: &mut S) -> Result<(SyncId, u32)>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 8];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| ProtocolError::from_read(e, "sync header"))?;

    let mut id = [0u8; 4];
    id.copy_from_slice(&header[..4]);
    let value = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let id = SyncId::from_bytes(&id).ok_or_else(|| {
        ProtocolError::malformed("sync header", String::from_utf8_lossy(&id).into_owned())
    })?;
    Ok((id, value))
}

/// Read a request path of `length` bytes
pub async fn read_path<S>(stream: &mut S, length: u32) -> Result<String>
where
    S: AsyncRead + Unpin + ?Sized,
{
    if length > MAX_PATH_LENGTH {
        return Err(ProtocolError::malformed(
            "sync path",
            format!("{} bytes exceeds {}", length, MAX_PATH_LENGTH),
        ));
    }
    let mut path = vec![0u8; length as usize];
    stream
        .read_exact(&mut path)
        .await
        .map_err(|e| ProtocolError::from_read(e, "sync path"))?;
    String::from_utf8(path).map_err(|e| ProtocolError::malformed("sync path", e.to_string()))
}

/// Read the body of a `DATA` message
pub async fn read_data<S>(stream: &mut S, length: u32) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin + ?Sized,
{
    if length as usize > SYNC_DATA_MAX {
        return Err(ProtocolError::malformed(
            "sync data",
            format!("{} bytes exceeds {}", length, SYNC_DATA_MAX),
        ));
    }
    let mut data = vec![0u8; length as usize];
    stream
        .read_exact(&mut data)
        .await
        .map_err(|e| ProtocolError::from_read(e, "sync data"))?;
    Ok(data)
}

async fn write_message<S>(stream: &mut S, message: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(message).await?;
    stream.flush().await?;
    Ok(())
}

fn header(id: SyncId, value: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    buf.extend_from_slice(id.as_bytes());
    buf.extend_from_slice(&value.to_le_bytes());
    buf
}

/// Client side: write a request such as `STAT /sdcard`
pub async fn write_request<S>(stream: &mut S, id: SyncId, path: &str) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut message = header(id, path.len() as u32);
    message.extend_from_slice(path.as_bytes());
    write_message(stream, &message).await
}

/// `STAT` reply; all zeros for a missing file
pub async fn write_stat<S>(stream: &mut S, stat: SyncStat) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut message = header(SyncId::Stat, stat.mode);
    message.extend_from_slice(&stat.size.to_le_bytes());
    message.extend_from_slice(&stat.mtime.to_le_bytes());
    write_message(stream, &message).await
}

/// One `LIST` entry
pub async fn write_dent<S>(stream: &mut S, stat: SyncStat, name: &str) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut message = header(SyncId::Dent, stat.mode);
    message.extend_from_slice(&stat.size.to_le_bytes());
    message.extend_from_slice(&stat.mtime.to_le_bytes());
    message.extend_from_slice(&(name.len() as u32).to_le_bytes());
    message.extend_from_slice(name.as_bytes());
    write_message(stream, &message).await
}

/// Terminates a `LIST` reply: a `DONE` shaped like an empty `DENT`
pub async fn write_list_done<S>(stream: &mut S) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut message = header(SyncId::Done, 0);
    message.extend_from_slice(&[0u8; 12]);
    write_message(stream, &message).await
}

/// `data` as `DATA` chunks of at most [`SYNC_DATA_MAX`] bytes
pub async fn write_data<S>(stream: &mut S, data: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    for chunk in data.chunks(SYNC_DATA_MAX) {
        let mut message = header(SyncId::Data, chunk.len() as u32);
        message.extend_from_slice(chunk);
        write_message(stream, &message).await?;
    }
    Ok(())
}

/// `DONE` with a value (mtime for SEND, zero for RECV)
pub async fn write_done<S>(stream: &mut S, value: u32) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    write_message(stream, &header(SyncId::Done, value)).await
}

/// `OKAY` acknowledging a completed `SEND`
pub async fn write_okay<S>(stream: &mut S) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    write_message(stream, &header(SyncId::Okay, 0)).await
}

/// `FAIL` with a reason
pub async fn write_fail<S>(stream: &mut S, reason: &str) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut message = header(SyncId::Fail, reason.len() as u32);
    message.extend_from_slice(reason.as_bytes());
    write_message(stream, &message).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_request() {
        let mut stream = Builder::new().read(b"STAT\x07\x00\x00\x00/sdcard").build();
        let (id, len) = read_header(&mut stream).await.unwrap();
        assert_eq!(id, SyncId::Stat);
        assert_eq!(read_path(&mut stream, len).await.unwrap(), "/sdcard");
    }

    #[tokio::test]
    async fn test_unknown_id_rejected() {
        let mut stream = Builder::new().read(b"NOPE\x00\x00\x00\x00").build();
        assert!(matches!(
            read_header(&mut stream).await,
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_stat() {
        let mut stream = Builder::new()
            .write(b"STAT\xa4\x81\x00\x00\x05\x00\x00\x00\x01\x00\x00\x00")
            .build();
        let stat = SyncStat {
            mode: 0o100644,
            size: 5,
            mtime: 1,
        };
        write_stat(&mut stream, stat).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_data_splits_large_payloads() {
        let (mut writer, mut reader) = tokio::io::duplex(256 * 1024);
        let data = vec![7u8; SYNC_DATA_MAX + 10];
        write_data(&mut writer, &data).await.unwrap();

        let (id, len) = read_header(&mut reader).await.unwrap();
        assert_eq!((id, len as usize), (SyncId::Data, SYNC_DATA_MAX));
        read_data(&mut reader, len).await.unwrap();

        let (id, len) = read_header(&mut reader).await.unwrap();
        assert_eq!((id, len), (SyncId::Data, 10));
    }
}
