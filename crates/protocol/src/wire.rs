//! Host wire framing
//!
//! Every request a client sends to the server is a 4 digit hex length
//! followed by that many ASCII bytes. The server answers each accepted
//! request with `OKAY`, or with `FAIL` plus a hex-length-prefixed reason,
//! before any service output.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// Success handshake
pub const OKAY: &[u8; 4] = b"OKAY";

/// Rejection handshake
pub const FAIL: &[u8; 4] = b"FAIL";

/// Largest value a 4 digit hex length can carry
pub const MAX_HEX_PAYLOAD: usize = 0xffff;

/// Handshake status as seen by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Okay,
    Fail(String),
}

impl Status {
    pub fn is_okay(&self) -> bool {
        matches!(self, Status::Okay)
    }
}

/// Encode a 4 digit lowercase hex length prefix
pub fn encode_length(len: usize) -> Result<[u8; 4]> {
    if len > MAX_HEX_PAYLOAD {
        return Err(ProtocolError::malformed(
            "length prefix",
            format!("{} bytes exceeds {}", len, MAX_HEX_PAYLOAD),
        ));
    }
    let mut prefix = [0u8; 4];
    prefix.copy_from_slice(format!("{:04x}", len).as_bytes());
    Ok(prefix)
}

/// Read a 4 digit hex length prefix
pub async fn read_length<S>(stream: &mut S) -> Result<usize>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; 4];
    stream
        .read_exact(&mut prefix)
        .await
        .map_err(|e| ProtocolError::from_read(e, "length prefix"))?;

    let text = std::str::from_utf8(&prefix)
        .map_err(|_| ProtocolError::malformed("length prefix", format!("{:?}", prefix)))?;
    usize::from_str_radix(text, 16)
        .map_err(|_| ProtocolError::malformed("length prefix", text.to_string()))
}

/// Read one client request, e.g. `host:version` or `shell,v2:ls`
pub async fn read_request<S>(stream: &mut S) -> Result<String>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let len = read_length(stream).await?;
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| ProtocolError::from_read(e, "request"))?;

    String::from_utf8(payload).map_err(|e| ProtocolError::malformed("request", e.to_string()))
}

/// Write `OKAY`
pub async fn write_okay<S>(stream: &mut S) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(OKAY).await?;
    stream.flush().await?;
    Ok(())
}

/// Write `FAIL` followed by the hex-length-prefixed reason
pub async fn write_fail<S>(stream: &mut S, reason: &str) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let reason = &reason.as_bytes()[..reason.len().min(MAX_HEX_PAYLOAD)];
    let mut message = Vec::with_capacity(8 + reason.len());
    message.extend_from_slice(FAIL);
    message.extend_from_slice(&encode_length(reason.len())?);
    message.extend_from_slice(reason);
    stream.write_all(&message).await?;
    stream.flush().await?;
    Ok(())
}

/// Write a hex-length-prefixed payload, as used by `host:version`,
/// `host:devices` and friends
pub async fn write_hex_string<S>(stream: &mut S, payload: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut message = Vec::with_capacity(4 + payload.len());
    message.extend_from_slice(&encode_length(payload.len())?);
    message.extend_from_slice(payload);
    stream.write_all(&message).await?;
    stream.flush().await?;
    Ok(())
}

/// Client side: send a request
pub async fn send_request<S>(stream: &mut S, request: &str) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    write_hex_string(stream, request.as_bytes()).await
}

/// Client side: read a hex-length-prefixed payload
pub async fn read_hex_string<S>(stream: &mut S) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let len = read_length(stream).await?;
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| ProtocolError::from_read(e, "payload"))?;
    Ok(payload)
}

/// Client side: read the handshake of a request
pub async fn read_status<S>(stream: &mut S) -> Result<Status>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut status = [0u8; 4];
    stream
        .read_exact(&mut status)
        .await
        .map_err(|e| ProtocolError::from_read(e, "status"))?;

    match &status {
        OKAY => Ok(Status::Okay),
        FAIL => {
            let reason = read_hex_string(stream).await?;
            Ok(Status::Fail(String::from_utf8_lossy(&reason).into_owned()))
        }
        other => Err(ProtocolError::malformed(
            "status",
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}
