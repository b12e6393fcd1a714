//! Host services
//!
//! Requests answered by the server itself rather than by a device:
//! `host:version`, `host:devices`, `host:track-devices`, `host:features`,
//! the per-device queries `get-state`, `get-serialno`, `get-devpath`, and
//! the port forward family.

mod devices;
mod forward;
mod info;
mod server;

use std::sync::Arc;

pub use devices::{format_device_list, ListDevices, TrackDevices};
pub use forward::{format_forward_list, Forward, ForwardCommand};
pub use info::{DeviceInfo, DeviceQuery};
pub use server::{Features, Kill, Version};

use crate::handler::HostCommandHandler;

/// Stock host handlers in lookup order
pub fn default_handlers() -> Vec<Arc<dyn HostCommandHandler>> {
    vec![
        Arc::new(Version),
        Arc::new(Kill),
        Arc::new(ListDevices),
        Arc::new(TrackDevices),
        Arc::new(Features),
        Arc::new(DeviceInfo),
        Arc::new(Forward),
    ]
}
