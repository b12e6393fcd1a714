use async_trait::async_trait;
use fakeadb_device::DeviceState;
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};

use crate::handler::{reject, HostCommandHandler, HostContext, SessionOutcome};

/// Per-device fields exposed as host services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceQuery {
    State,
    SerialNo,
    DevPath,
}

impl DeviceQuery {
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "get-state" => Some(DeviceQuery::State),
            "get-serialno" => Some(DeviceQuery::SerialNo),
            "get-devpath" => Some(DeviceQuery::DevPath),
            _ => None,
        }
    }

    fn answer(self, device: &DeviceState) -> String {
        match self {
            DeviceQuery::State => device.status().as_str().to_string(),
            DeviceQuery::SerialNo => device.serial().to_string(),
            DeviceQuery::DevPath => device.dev_path(),
        }
    }
}

/// `get-state`, `get-serialno` and `get-devpath`
pub struct DeviceInfo;

#[async_trait]
impl HostCommandHandler for DeviceInfo {
    fn claims(&self, command: &str) -> bool {
        DeviceQuery::from_command(command).is_some()
    }

    async fn run(
        &self,
        ctx: &HostContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        let Some(query) = DeviceQuery::from_command(ctx.command) else {
            return reject(socket, format!("unknown host service: {}", ctx.command)).await;
        };
        let device = match ctx.device() {
            Ok(device) => device,
            Err(e) => return reject(socket, e.to_string()).await,
        };

        wire::write_okay(socket).await?;
        wire::write_hex_string(socket, query.answer(&device).as_bytes()).await?;
        Ok(SessionOutcome::completed())
    }
}
