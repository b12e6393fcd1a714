//! FakeAdb Core - configuration, errors and events
//!
//! This crate holds the pieces shared by the protocol, device and server
//! crates: the server configuration model, the central error type, and the
//! device event bus used by `host:track-devices`.

pub mod config;
pub mod events;
pub mod error;

pub use config::{
    ConnectionKind, DeviceConfig, DeviceStatus, FileConfig, PackageConfig, ServerConfig,
};
pub use events::{DeviceEvent, EventBus, EventSubscription};
pub use error::{FakeAdbError, Result};

