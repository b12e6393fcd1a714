//! FakeAdb - a simulated ADB server
//!
//! Lets ADB client code be tested without hardware: a TCP server speaking
//! the real ADB host protocol, backed by deterministic in-memory devices.
//!
//! ## Architecture
//!
//! FakeAdb is organized into specialized crates:
//!
//! - `fakeadb-core`: configuration, errors and device events
//! - `fakeadb-protocol`: wire framing, shell v2 packets and sync messages
//! - `fakeadb-device`: the simulated device model
//! - `fakeadb-server`: connection dispatch, handlers and shell sessions

#![warn(clippy::all)]

pub use fakeadb_core as core;
pub use fakeadb_device as device;
pub use fakeadb_protocol as protocol;
pub use fakeadb_server as server;

pub use fakeadb_server::{FakeAdbServer, FakeAdbServerBuilder};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "FakeAdb";
