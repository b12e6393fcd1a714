//! Connection dispatcher
//!
//! Drives one accepted socket: read a request, answer host services,
//! remember a transport selection, and hand device requests to the first
//! handler that claims them.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use fakeadb_device::{DeviceError, DeviceState, TransportSelector};
use fakeadb_protocol::{wire, AdbSocket};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::context::ServerContext;
use crate::handler::{absorb, DeviceContext, HostContext, SessionOutcome};
use crate::history::SessionRecord;
use crate::request::{parse_host_request, split_service, HostRequest};

/// Whether the connection carries on after a request
enum Flow {
    /// A transport was selected; the next request goes to that device
    Continue,
    /// The session is over; close the socket
    Close,
}

/// One client connection
pub struct Connection<S> {
    ctx: Arc<ServerContext>,
    socket: S,
    peer: Option<SocketAddr>,
    transport: Option<Arc<DeviceState>>,
}

impl<S: AdbSocket> Connection<S> {
    pub fn new(ctx: Arc<ServerContext>, socket: S, peer: Option<SocketAddr>) -> Self {
        Self {
            ctx,
            socket,
            peer,
            transport: None,
        }
    }

    /// Serve requests until the session ends, then drop the socket
    pub async fn run(mut self) {
        loop {
            let request = match wire::read_request(&mut self.socket).await {
                Ok(request) => request,
                Err(e) => {
                    absorb("request", e);
                    return;
                }
            };
            debug!("Request from {:?}: {}", self.peer, request);

            match self.dispatch(&request).await {
                Flow::Continue => continue,
                Flow::Close => return,
            }
        }
    }

    async fn dispatch(&mut self, request: &str) -> Flow {
        let started_at = Utc::now();
        let (serial, outcome, flow) = match parse_host_request(request) {
            Some(HostRequest::Transport { selector, reply_id }) => {
                self.select_transport(&selector, reply_id).await
            }
            Some(HostRequest::Service {
                selector,
                command,
                args,
            }) => {
                let serial = match &selector {
                    TransportSelector::Serial(serial) => Some(serial.clone()),
                    _ => None,
                };
                (serial, self.host_service(selector, command, args).await, Flow::Close)
            }
            None => {
                let (serial, outcome) = self.device_service(request).await;
                (serial, outcome, Flow::Close)
            }
        };

        if let SessionOutcome::Rejected { reason } = &outcome {
            warn!("Rejected '{}': {}", request, reason);
        }
        self.ctx
            .history()
            .record(SessionRecord::new(serial, request, outcome, started_at));
        flow
    }

    async fn fail(&mut self, reason: String) -> SessionOutcome {
        match wire::write_fail(&mut self.socket, &reason).await {
            Ok(()) => SessionOutcome::Rejected { reason },
            Err(e) => absorb("FAIL", e),
        }
    }

    async fn select_transport(
        &mut self,
        selector: &TransportSelector,
        reply_id: bool) -> (Option<String>, SessionOutcome, Flow,
    ) {
        let device = match self.ctx.devices().select(selector) {
            Ok(device) => device,
            Err(e) => return (None, self.fail(e.to_string()).await, Flow::Close),
        };
        let serial = Some(device.serial().to_string());

        let mut reply = wire::OKAY.to_vec();
        if reply_id {
            reply.extend_from_slice(&device.transport_id().to_le_bytes());
        }
        let written = async {
            self.socket.write_all(&reply).await?;
            self.socket.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                debug!("Connection switched to transport {}", device.transport_id());
                self.transport = Some(device);
                (serial, SessionOutcome::completed(), Flow::Continue)
            }
            Err(e) => (serial, absorb("transport", e.into()), Flow::Close),
        }
    }

    async fn host_service(
        &mut self,
        selector: TransportSelector,
        command: &str,
        args: &str,
    ) -> SessionOutcome {
        let Some(handler) = self.ctx.registry().find_host(command) else {
            return self.fail(format!("unknown host service: {}", command)).await;
        };

        let ctx = HostContext {
            server: &self.ctx,
            selector,
            command,
            args,
        };
        handler.execute(&ctx, &mut self.socket).await
    }

    async fn device_service(&mut self, request: &str) -> (Option<String>, SessionOutcome) {
        let device = match &self.transport {
            Some(device) => Ok(Arc::clone(device)),
            None => self.ctx.devices().select(&TransportSelector::Any),
        };
        let device = match device {
            Ok(device) => device,
            Err(e) => return (None, self.fail(e.to_string()).await),
        };
        let serial = Some(device.serial().to_string());

        let (service, args) = split_service(request);
        let Some(handler) = self.ctx.registry().find_device(&self.ctx, service, args) else {
            return (serial, self.fail(format!("unknown command: {}", request)).await);
        };

        if handler.requires_online(&self.ctx, service, args) && !device.is_online() {
            let reason = DeviceError::Unavailable(device.status().as_str().to_string()).to_string();
            return (serial, self.fail(reason).await);
        }

        let ctx = DeviceContext {
            server: &self.ctx,
            device,
            service,
            args,
        };
        (serial, handler.execute(&ctx, &mut self.socket).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fakeadb_core::{DeviceConfig, DeviceStatus, ServerConfig};
    use fakeadb_protocol::shell_v2::{self, PacketKind};
    use fakeadb_protocol::Status;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    use crate::registry::HandlerRegistry;

    fn context() -> Arc<ServerContext> {
        Arc::new(ServerContext::new(ServerConfig::ephemeral(), HandlerRegistry::with_defaults()))
    }

    fn connect(ctx: &Arc<ServerContext>) -> DuplexStream {
        let (client, server_side) = duplex(16 * 1024);
        tokio::spawn(Connection::new(Arc::clone(ctx), server_side, None).run());
        client
    }

    async fn read_to_end(stream: &mut DuplexStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_host_version() {
        let ctx = context();
        let mut client = connect(&ctx);
        wire::send_request(&mut client, "host:version").await.unwrap();
        assert_eq!(wire::read_status(&mut client).await.unwrap(), Status::Okay);
        assert_eq!(wire::read_hex_string(&mut client).await.unwrap(), b"0029");
        assert!(read_to_end(&mut client).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_request_fails_and_closes() {
        let ctx = context();
        ctx.devices()
            .attach(&DeviceConfig::new("emulator-5554", "Google", "Pixel", "13", 33))
            .unwrap();

        let mut client = connect(&ctx);
        wire::send_request(&mut client, "shell,v2:frobnicate").await.unwrap();
        assert!(matches!(
            wire::read_status(&mut client).await.unwrap(),
            Status::Fail(_)
        ));
        assert!(read_to_end(&mut client).await.is_empty());

        let record = ctx.history().last_matching("shell,v2:").unwrap();
        assert!(record.outcome.is_rejected());
        assert_eq!(record.serial.as_deref(), Some("emulator-5554"));
    }

    #[tokio::test]
    async fn test_device_request_needs_exactly_one_device() {
        let ctx = context();
        let mut client = connect(&ctx);
        wire::send_request(&mut client, "shell:echo hi").await.unwrap();
        assert_eq!(
            wire::read_status(&mut client).await.unwrap(),
            Status::Fail("no devices/emulators found".into())
        );
    }

    #[tokio::test]
    async fn test_transport_then_shell() {
        let ctx = context();
        ctx.devices()
            .attach(&DeviceConfig::new("a", "Google", "Pixel", "13", 33))
            .unwrap();
        ctx.devices()
            .attach(&DeviceConfig::new("b", "Google", "Pixel", "13", 33))
            .unwrap();

        let mut client = connect(&ctx);
        wire::send_request(&mut client, "host:tport:serial:b").await.unwrap();
        assert_eq!(wire::read_status(&mut client).await.unwrap(), Status::Okay);
        let mut id = [0u8; 8];
        client.read_exact(&mut id).await.unwrap();
        assert_eq!(u64::from_le_bytes(id), 2);

        wire::send_request(&mut client, "shell,v2:getprop ro.serialno").await.unwrap();
        assert_eq!(wire::read_status(&mut client).await.unwrap(), Status::Okay);
        let packet = shell_v2::read_packet(&mut client).await.unwrap();
        assert_eq!(packet.kind, PacketKind::Stdout);
        assert_eq!(&packet.payload[..], b"b\n");
        let exit = shell_v2::read_packet(&mut client).await.unwrap();
        assert_eq!(exit.as_exit_code(), Some(0));
    }

    #[tokio::test]
    async fn test_offline_device_refused_except_getprop() {
        let ctx = context();
        ctx.devices()
            .attach(
                &DeviceConfig::new("a", "Google", "Pixel", "13", 33)
                    .with_status(DeviceStatus::Offline),
            )
            .unwrap();

        let mut client = connect(&ctx);
        wire::send_request(&mut client, "shell:echo hi").await.unwrap();
        assert_eq!(
            wire::read_status(&mut client).await.unwrap(),
            Status::Fail("device offline".into())
        );

        let mut client = connect(&ctx);
        wire::send_request(&mut client, "shell:getprop ro.product.model").await.unwrap();
        assert_eq!(wire::read_status(&mut client).await.unwrap(), Status::Okay);
        assert_eq!(read_to_end(&mut client).await, b"Pixel\n");
    }
}
