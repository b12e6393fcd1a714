//! Simulated Android device
//!
//! The in-memory model a fake ADB server serves requests against:
//! identity, status, system properties, a virtual filesystem, a package
//! manager and its port forwards. Nothing here touches the host disk.

pub mod device;
pub mod error;
pub mod filesystem;
pub mod forward;
pub mod list;
pub mod packages;

pub use device::DeviceState;
pub use error::DeviceError;
pub use fakeadb_core::{ConnectionKind, DeviceConfig, DeviceStatus};
pub use filesystem::{FileStat, VirtualFs};
pub use forward::{ForwardRule, ForwardTable};
pub use list::{DeviceList, TransportSelector};
pub use packages::{InstallSession, PackageManager, UserInfo};
