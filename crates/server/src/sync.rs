//! `sync:` service
//!
//! Serves `adb push`/`pull`/`ls`-style file access against the device's
//! virtual filesystem. Requests are handled one at a time until `QUIT` or
//! until the client hangs up.

use async_trait::async_trait;
use fakeadb_device::FileStat;
use fakeadb_protocol::sync::{self as framing, SyncId, SyncStat};
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};
use tracing::debug;

use crate::context::ServerContext;
use crate::handler::{DeviceCommandHandler, DeviceContext, SessionOutcome};

/// Mode for a `SEND` without a `,mode` suffix
const DEFAULT_MODE: u32 = 0o644;

fn to_sync_stat(stat: FileStat) -> SyncStat {
    SyncStat {
        mode: stat.mode,
        size: stat.size.min(u32::MAX as u64) as u32,
        mtime: stat.mtime.clamp(0, u32::MAX as i64) as u32,
    }
}

/// Split `SEND`'s `path,mode` argument
fn parse_send_target(target: &str) -> (&str, u32) {
    match target.rsplit_once(',') {
        Some((path, mode)) => (path, mode.parse().unwrap_or(DEFAULT_MODE)),
        None => (target, DEFAULT_MODE),
    }
}

/// Handler for `sync:`
#[derive(Debug, Default)]
pub struct SyncHandler;

impl SyncHandler {
    pub fn new() -> Self {
        Self
    }

    async fn stat(
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
        path: &str,
    ) -> Result<(), ProtocolError> {
        let stat = ctx
            .device
            .with_fs(|fs| fs.stat(path))
            .map(to_sync_stat)
            .unwrap_or_default();
        framing::write_stat(socket, stat).await
    }

    async fn list(
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
        path: &str,
    ) -> Result<(), ProtocolError> {
        let entries = ctx.device.with_fs(|fs| fs.list(path)).unwrap_or_default();
        for (name, stat) in entries {
            framing::write_dent(socket, to_sync_stat(stat), &name).await?;
        }
        framing::write_list_done(socket).await
    }

    async fn recv(
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
        path: &str,
    ) -> Result<(), ProtocolError> {
        match ctx.device.with_fs(|fs| fs.read(path)) {
            Ok(contents) => {
                framing::write_data(socket, &contents).await?;
                framing::write_done(socket, 0).await
            }
            Err(e) => framing::write_fail(socket, &e.to_string()).await,
        }
    }

    /// Receive `DATA` chunks until `DONE`, then store the file
    async fn send(
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
        target: &str,
    ) -> Result<bool, ProtocolError> {
        let (path, mode) = parse_send_target(target);
        let mut contents = Vec::new();

        loop {
            let (id, value) = framing::read_header(socket).await?;
            match id {
                SyncId::Data => contents.extend(framing::read_data(socket, value).await?),
                SyncId::Done => break,
                other => {
                    let reason = format!("unexpected {:?} during SEND", other);
                    framing::write_fail(socket, &reason).await?;
                    return Ok(false);
                }
            }
        }

        let size = contents.len();
        match ctx.device.with_fs_mut(|fs| fs.write(path, contents, mode)) {
            Ok(()) => {
                debug!("Stored {} bytes at {} on {}", size, path, ctx.device.serial());
                framing::write_okay(socket).await?;
            }
            Err(e) => framing::write_fail(socket, &e.to_string()).await?,
        }
        Ok(true)
    }
}

#[async_trait]
impl DeviceCommandHandler for SyncHandler {
    fn claims(&self, _server: &ServerContext, service: &str, _args: &str) -> bool {
        service == "sync"
    }

    async fn run(
        &self,
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        wire::write_okay(socket).await?;

        loop {
            let (id, length) = framing::read_header(socket).await?;
            match id {
                SyncId::Quit => break,
                SyncId::Stat | SyncId::List | SyncId::Recv | SyncId::Send => {
                    let path = framing::read_path(socket, length).await?;
                    debug!("sync {:?} {}", id, path);
                    match id {
                        SyncId::Stat => Self::stat(ctx, socket, &path).await?,
                        SyncId::List => Self::list(ctx, socket, &path).await?,
                        SyncId::Recv => Self::recv(ctx, socket, &path).await?,
                        _ => {
                            if !Self::send(ctx, socket, &path).await? {
                                break;
                            }
                        }
                    }
                }
                other => {
                    framing::write_fail(socket, &format!("unexpected {:?} request", other)).await?;
                    break;
                }
            }
        }

        Ok(SessionOutcome::completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fakeadb_core::{DeviceConfig, ServerConfig};
    use fakeadb_device::DeviceState;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    use crate::registry::HandlerRegistry;

    async fn read_exact<const N: usize>(stream: &mut DuplexStream) -> [u8; N] {
        let mut buf = [0u8; N];
        stream.read_exact(&mut buf).await.unwrap();
        buf
    }

    async fn serve(device: Arc<DeviceState>, mut socket: DuplexStream) -> SessionOutcome {
        let server =
            crate::context::ServerContext::new(ServerConfig::ephemeral(), HandlerRegistry::new());
        let ctx = DeviceContext {
            server: &server,
            device,
            service: "sync",
            args: "",
        };
        SyncHandler.execute(&ctx, &mut socket).await
    }

    fn pixel() -> Arc<DeviceState> {
        let config = DeviceConfig::new("emulator-5554", "Google", "Pixel", "13", 33)
            .with_file("/sdcard/hello.txt", "hello");
        Arc::new(DeviceState::new(&config, 1))
    }

    #[test]
    fn test_parse_send_target() {
        assert_eq!(parse_send_target("/sdcard/a,33188"), ("/sdcard/a", 33188));
        assert_eq!(parse_send_target("/sdcard/a"), ("/sdcard/a", DEFAULT_MODE));
    }

    #[tokio::test]
    async fn test_stat_and_recv() {
        let device = pixel();
        let (mut client, server_side) = duplex(4096);
        let session = tokio::spawn(serve(Arc::clone(&device), server_side));

        assert_eq!(&read_exact::<4>(&mut client).await, b"OKAY");

        framing::write_request(&mut client, SyncId::Stat, "/sdcard/hello.txt").await.unwrap();
        let (id, mode) = framing::read_header(&mut client).await.unwrap();
        assert_eq!(id, SyncId::Stat);
        assert_eq!(mode, 0o100644);
        let rest = read_exact::<8>(&mut client).await;
        assert_eq!(u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]), 5);

        framing::write_request(&mut client, SyncId::Recv, "/sdcard/hello.txt").await.unwrap();
        let (id, len) = framing::read_header(&mut client).await.unwrap();
        assert_eq!(id, SyncId::Data);
        assert_eq!(framing::read_data(&mut client, len).await.unwrap(), b"hello");
        assert_eq!(framing::read_header(&mut client).await.unwrap(), (SyncId::Done, 0));

        framing::write_request(&mut client, SyncId::Quit, "").await.unwrap();
        assert_eq!(session.await.unwrap(), SessionOutcome::completed());
    }

    #[tokio::test]
    async fn test_send_then_list() {
        let device = pixel();
        let (mut client, server_side) = duplex(4096);
        let session = tokio::spawn(serve(Arc::clone(&device), server_side));
        assert_eq!(&read_exact::<4>(&mut client).await, b"OKAY");

        framing::write_request(&mut client, SyncId::Send, "/data/local/tmp/new.txt,33188")
            .await
            .unwrap();
        framing::write_data(&mut client, b"pushed").await.unwrap();
        framing::write_done(&mut client, 1_700_000_000).await.unwrap();
        assert_eq!(framing::read_header(&mut client).await.unwrap(), (SyncId::Okay, 0));
        assert_eq!(
            device.with_fs(|fs| fs.read("/data/local/tmp/new.txt")).unwrap(),
            b"pushed"
        );

        framing::write_request(&mut client, SyncId::List, "/data/local/tmp").await.unwrap();
        let (id, _mode) = framing::read_header(&mut client).await.unwrap();
        assert_eq!(id, SyncId::Dent);
        let rest = read_exact::<12>(&mut client).await;
        let name_len = u32::from_le_bytes([rest[8], rest[9], rest[10], rest[11]]) as usize;
        let mut name = vec![0u8; name_len];
        client.read_exact(&mut name).await.unwrap();
        assert_eq!(name, b"new.txt");
        assert_eq!(framing::read_header(&mut client).await.unwrap(), (SyncId::Done, 0));
        read_exact::<12>(&mut client).await;

        drop(client);
        assert!(matches!(
            session.await.unwrap(),
            SessionOutcome::TransportClosed { .. }
        ));
    }

    #[tokio::test]
    async fn test_recv_missing_file_fails() {
        let (mut client, server_side) = duplex(4096);
        let _session = tokio::spawn(serve(pixel(), server_side));
        assert_eq!(&read_exact::<4>(&mut client).await, b"OKAY");

        framing::write_request(&mut client, SyncId::Recv, "/nope").await.unwrap();
        let (id, len) = framing::read_header(&mut client).await.unwrap();
        assert_eq!(id, SyncId::Fail);
        let reason = framing::read_data(&mut client, len).await.unwrap();
        assert_eq!(reason, b"No such file or directory: /nope");
    }
}
