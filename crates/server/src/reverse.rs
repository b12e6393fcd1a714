//! `reverse:` service
//!
//! `adb reverse` rules live on the device, so the requests arrive as a
//! device service rather than a host one. The service is accepted with
//! `OKAY`, then the result follows as a second status: `OKAY` (plus the
//! listing for `list-forward`) or `FAIL`.

use async_trait::async_trait;
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};
use tracing::debug;

use crate::context::ServerContext;
use crate::handler::{reject, DeviceCommandHandler, DeviceContext, SessionOutcome};
use crate::host::{format_forward_list, ForwardCommand};
use crate::request::split_service;

/// Serves `reverse:forward:…`, `reverse:killforward:…`,
/// `reverse:killforward-all` and `reverse:list-forward`
#[derive(Debug, Default)]
pub struct ReverseHandler;

fn parse(args: &str) -> Option<ForwardCommand<'_>> {
    let (command, rest) = split_service(args);
    ForwardCommand::parse(command, rest)
}

#[async_trait]
impl DeviceCommandHandler for ReverseHandler {
    fn claims(&self, _server: &ServerContext, service: &str, args: &str) -> bool {
        service == "reverse" && parse(args).is_some()
    }

    async fn run(
        &self,
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        let Some(request) = parse(ctx.args) else {
            return reject(socket, format!("unknown command: reverse:{}", ctx.args)).await;
        };
        wire::write_okay(socket).await?;

        if request == ForwardCommand::List {
            let listing = format_forward_list(ctx.device.serial(), &ctx.device.reverses());
            wire::write_okay(socket).await?;
            wire::write_hex_string(socket, listing.as_bytes()).await?;
            return Ok(SessionOutcome::completed());
        }

        if let Err(e) = ctx.device.with_reverses_mut(|table| request.apply(table)) {
            return reject(socket, e.to_string()).await;
        }
        debug!("reverse on {}: {:?}", ctx.device.serial(), request);
        wire::write_okay(socket).await?;
        Ok(SessionOutcome::completed())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fakeadb_core::{DeviceConfig, ServerConfig};
    use fakeadb_device::DeviceState;
    use fakeadb_protocol::Status;
    use tokio::io::{duplex, AsyncReadExt};

    use super::*;
    use crate::registry::HandlerRegistry;

    async fn serve(device: &Arc<DeviceState>, args: &str) -> (SessionOutcome, Vec<u8>) {
        let server = ServerContext::new(ServerConfig::ephemeral(), HandlerRegistry::new());
        let ctx = DeviceContext {
            server: &server,
            device: Arc::clone(device),
            service: "reverse",
            args,
        };
        let (mut client, mut server_side) = duplex(4096);
        let outcome = ReverseHandler.execute(&ctx, &mut server_side).await;
        drop(server_side);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        (outcome, received)
    }

    fn device() -> Arc<DeviceState> {
        let config = DeviceConfig::new("emulator-5554", "Google", "Pixel", "13", 33);
        Arc::new(DeviceState::new(&config, 1))
    }

    #[test]
    fn test_claims_only_forward_requests() {
        let server = ServerContext::new(ServerConfig::ephemeral(), HandlerRegistry::new());
        assert!(ReverseHandler.claims(&server, "reverse", "forward:tcp:8081;tcp:8081"));
        assert!(ReverseHandler.claims(&server, "reverse", "list-forward"));
        assert!(!ReverseHandler.claims(&server, "reverse", "frobnicate"));
        assert!(!ReverseHandler.claims(&server, "shell", "list-forward"));
    }

    #[tokio::test]
    async fn test_reverse_forward_and_list() {
        let device = device();
        let (outcome, received) = serve(&device, "forward:tcp:8081;tcp:8081").await;
        assert_eq!(outcome, SessionOutcome::completed());
        assert_eq!(received, b"OKAYOKAY");
        assert!(device.forwards().is_empty());

        let (_, received) = serve(&device, "list-forward").await;
        let mut stream = &received[..];
        assert_eq!(wire::read_status(&mut stream).await.unwrap(), Status::Okay);
        assert_eq!(wire::read_status(&mut stream).await.unwrap(), Status::Okay);
        assert_eq!(
            wire::read_hex_string(&mut stream).await.unwrap(),
            b"emulator-5554 tcp:8081 tcp:8081\n"
        );
    }

    #[tokio::test]
    async fn test_failure_follows_acceptance() {
        let device = device();
        let (outcome, received) = serve(&device, "killforward:tcp:9").await;
        assert!(outcome.is_rejected());

        let mut stream = &received[..];
        assert_eq!(wire::read_status(&mut stream).await.unwrap(), Status::Okay);
        assert_eq!(
            wire::read_status(&mut stream).await.unwrap(),
            Status::Fail("listener 'tcp:9' not found".into())
        );
    }

    #[tokio::test]
    async fn test_killforward_all() {
        let device = device();
        serve(&device, "forward:tcp:1;tcp:2").await;
        serve(&device, "forward:localabstract:x;tcp:3").await;
        serve(&device, "killforward-all").await;
        assert!(device.reverses().is_empty());
    }
}
