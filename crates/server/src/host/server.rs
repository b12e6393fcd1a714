use async_trait::async_trait;
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};

use crate::handler::{reject, HostCommandHandler, HostContext, SessionOutcome};

/// `host:version`: the server version as four hex digits
pub struct Version;

#[async_trait]
impl HostCommandHandler for Version {
    fn claims(&self, command: &str) -> bool {
        command == "version"
    }

    async fn run(
        &self,
        ctx: &HostContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        wire::write_okay(socket).await?;
        let version = format!("{:04x}", ctx.server.adb_version());
        wire::write_hex_string(socket, version.as_bytes()).await?;
        Ok(SessionOutcome::completed())
    }
}

/// `host:kill`: acknowledge, then stop the server
pub struct Kill;

#[async_trait]
impl HostCommandHandler for Kill {
    fn claims(&self, command: &str) -> bool {
        command == "kill"
    }

    async fn run(
        &self,
        ctx: &HostContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        wire::write_okay(socket).await?;
        ctx.server.request_shutdown();
        Ok(SessionOutcome::completed())
    }
}

/// `host:host-features` lists the server's features; `host:features` the
/// ones shared by the server and the addressed device
pub struct Features;

#[async_trait]
impl HostCommandHandler for Features {
    fn claims(&self, command: &str) -> bool {
        command == "features" || command == "host-features"
    }

    async fn run(
        &self,
        ctx: &HostContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        let host_features = ctx.server.features();
        let features: Vec<String> = if ctx.command == "host-features" {
            host_features.to_vec()
        } else {
            match ctx.device() {
                Ok(device) => device
                    .features(host_features)
                    .into_iter()
                    .filter(|f| host_features.contains(f))
                    .collect(),
                Err(e) => return reject(socket, e.to_string()).await,
            }
        };

        wire::write_okay(socket).await?;
        wire::write_hex_string(socket, features.join(",").as_bytes()).await?;
        Ok(SessionOutcome::completed())
    }
}
