use std::sync::Arc;

use async_trait::async_trait;
use fakeadb_core::{ConnectionKind, DeviceEvent};
use fakeadb_device::DeviceState;
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::handler::{HostCommandHandler, HostContext, SessionOutcome};

/// Body of a `host:devices` reply. The long form adds the bus path,
/// product, model, device name and transport id.
pub fn format_device_list(devices: &[Arc<DeviceState>], long: bool) -> String {
    let mut out = String::new();
    for device in devices {
        if !long {
            out.push_str(&format!("{}\t{}\n", device.serial(), device.status().as_str()));
            continue;
        }

        out.push_str(&format!("{:<22} {}", device.serial(), device.status().as_str()));
        if device.connection() == ConnectionKind::Usb {
            out.push_str(&format!(" {}", device.dev_path()));
        }
        out.push_str(&format!(
            " product:{} model:{} device:{} transport_id:{}\n",
            device.product_name(),
            device.model().replace(' ', "_"),
            device.device_name(),
            device.transport_id()
        ));
    }
    out
}

/// `host:devices` and `host:devices-l`
pub struct ListDevices;

#[async_trait]
impl HostCommandHandler for ListDevices {
    fn claims(&self, command: &str) -> bool {
        command == "devices" || command == "devices-l"
    }

    async fn run(
        &self,
        ctx: &HostContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        let list = format_device_list(&ctx.server.devices().snapshot(), ctx.command == "devices-l");
        wire::write_okay(socket).await?;
        wire::write_hex_string(socket, list.as_bytes()).await?;
        Ok(SessionOutcome::completed())
    }
}

/// `host:track-devices[-l]`: the device list now and again after every
/// change, until the client disconnects or the server stops
pub struct TrackDevices;

#[async_trait]
impl HostCommandHandler for TrackDevices {
    fn claims(&self, command: &str) -> bool {
        command == "track-devices" || command == "track-devices-l"
    }

    async fn run(
        &self,
        ctx: &HostContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError> {
        let long = ctx.command == "track-devices-l";
        let devices = ctx.server.devices();
        // Subscribe before the first snapshot so no change slips between them
        let mut events = ctx.server.events().subscribe();

        wire::write_okay(socket).await?;
        let mut last = format_device_list(&devices.snapshot(), long);
        wire::write_hex_string(socket, last.as_bytes()).await?;

        let (mut reader, mut writer) = tokio::io::split(socket);
        let mut scratch = [0u8; 64];
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    None | Some(DeviceEvent::ServerStopping) => break,
                    Some(event) => {
                        let list = format_device_list(&devices.snapshot(), long);
                        if list != last {
                            debug!("Device list changed after {:?}", event);
                            wire::write_hex_string(&mut writer, list.as_bytes()).await?;
                            last = list;
                        }
                    }
                },
                read = reader.read(&mut scratch) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                },
            }
        }

        drop(events);
        ctx.server.events().cleanup();
        Ok(SessionOutcome::completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fakeadb_core::DeviceConfig;

    fn devices() -> Vec<Arc<DeviceState>> {
        vec![
            Arc::new(DeviceState::new(
                &DeviceConfig::new("emulator-5554", "Google", "Pixel 7", "13", 33),
                1,
            )),
            Arc::new(DeviceState::new(
                &DeviceConfig::new("10.0.0.2:5555", "Samsung", "SM-G990", "12", 31)
                    .with_connection(ConnectionKind::Tcp)
                    .with_status(fakeadb_core::DeviceStatus::Unauthorized),
                2,
            )),
        ]
    }

    #[test]
    fn test_short_list() {
        assert_eq!(
            format_device_list(&devices(), false),
            "emulator-5554\tdevice\n10.0.0.2:5555\tunauthorized\n"
        );
    }

    #[test]
    fn test_long_list() {
        let list = format_device_list(&devices(), true);
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(
            lines[0],
            concat!(
                "emulator-5554          device usb:1-1 ",
                "product:pixel_7 model:Pixel_7 device:pixel_7 transport_id:1"
            )
        );
        assert_eq!(
            lines[1],
            concat!(
                "10.0.0.2:5555          unauthorized ",
                "product:sm-g990 model:SM-G990 device:sm-g990 transport_id:2"
            )
        );
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(format_device_list(&[], true), "");
    }
}
