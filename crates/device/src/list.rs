//! Device list
//!
//! The server's set of attached devices. Mutations take the write lock and
//! publish a [`DeviceEvent`]; readers get snapshots so no lock outlives a
//! call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fakeadb_core::{ConnectionKind, DeviceConfig, DeviceEvent, DeviceStatus, EventBus};
use parking_lot::RwLock;
use tracing::info;

use crate::device::DeviceState;
use crate::error::DeviceError;

/// How a client picks the device a request goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSelector {
    /// The only attached device
    Any,
    /// The only USB device
    Usb,
    /// The only TCP device
    Local,
    Serial(String),
    TransportId(u64),
}

impl TransportSelector {
    fn matches(&self, device: &DeviceState) -> bool {
        match self {
            TransportSelector::Any => true,
            TransportSelector::Usb => device.connection() == ConnectionKind::Usb,
            TransportSelector::Local => device.connection() == ConnectionKind::Tcp,
            TransportSelector::Serial(serial) => device.serial() == serial,
            TransportSelector::TransportId(id) => device.transport_id() == *id,
        }
    }
}

/// Attached devices in attach order
pub struct DeviceList {
    devices: RwLock<Vec<Arc<DeviceState>>>,
    last_transport_id: AtomicU64,
    events: Arc<EventBus>,
}

impl DeviceList {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
            last_transport_id: AtomicU64::new(0),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Attach a device. Serials must be unique.
    pub fn attach(&self, config: &DeviceConfig) -> Result<Arc<DeviceState>, DeviceError> {
        let device = {
            let mut devices = self.devices.write();
            if devices.iter().any(|d| d.serial() == config.serial) {
                return Err(DeviceError::Duplicate(config.serial.clone()));
            }
            let transport_id = self.last_transport_id.fetch_add(1, Ordering::SeqCst) + 1;
            let device = Arc::new(DeviceState::new(config, transport_id));
            devices.push(Arc::clone(&device));
            device
        };

        info!(
            "Attached device {} ({} {}, API {}) as transport {}",
            device.serial(),
            device.manufacturer(),
            device.model(),
            device.sdk(),
            device.transport_id()
        );
        self.events.emit(DeviceEvent::Attached {
            serial: device.serial().to_string(),
        });
        Ok(device)
    }

    /// Detach a device, returning it
    pub fn detach(&self, serial: &str) -> Result<Arc<DeviceState>, DeviceError> {
        let device = {
            let mut devices = self.devices.write();
            let index = devices
                .iter()
                .position(|d| d.serial() == serial)
                .ok_or_else(|| DeviceError::NotFound(serial.to_string()))?;
            devices.remove(index)
        };

        info!("Detached device {}", serial);
        self.events.emit(DeviceEvent::Detached {
            serial: serial.to_string(),
        });
        Ok(device)
    }

    /// Change a device's status; emits an event only on an actual change
    pub fn set_status(&self, serial: &str, status: DeviceStatus) -> Result<(), DeviceError> {
        let device = self
            .get(serial)
            .ok_or_else(|| DeviceError::NotFound(serial.to_string()))?;

        let previous = device.set_status(status);
        if previous != status {
            info!("Device {} is now {}", serial, status);
            self.events.emit(DeviceEvent::StatusChanged {
                serial: serial.to_string(),
                status,
            });
        }
        Ok(())
    }

    pub fn get(&self, serial: &str) -> Option<Arc<DeviceState>> {
        self.devices
            .read()
            .iter()
            .find(|d| d.serial() == serial)
            .cloned()
    }

    /// Snapshot of the attached devices
    pub fn snapshot(&self) -> Vec<Arc<DeviceState>> {
        self.devices.read().clone()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Resolve a selector to exactly one device
    pub fn select(&self, selector: &TransportSelector) -> Result<Arc<DeviceState>, DeviceError> {
        let devices = self.devices.read();
        let mut matches = devices.iter().filter(|d| selector.matches(d));

        match (matches.next(), matches.next()) {
            (Some(device), None) => Ok(Arc::clone(device)),
            (Some(_), Some(_)) => Err(DeviceError::Ambiguous),
            (None, _) => Err(match selector {
                TransportSelector::Serial(serial) => DeviceError::NotFound(serial.clone()),
                TransportSelector::TransportId(id) => DeviceError::NotFound(id.to_string()),
                _ => DeviceError::NoDevices,
            }),
        }
    }
}
