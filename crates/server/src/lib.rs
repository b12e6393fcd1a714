//! FakeAdb Server - a simulated ADB server
//!
//! Speaks the ADB host protocol over TCP so ADB clients can be tested
//! without real devices. Each accepted connection reads a length-prefixed
//! request and either answers it as a host service or hands it to the
//! first registered device handler that claims it.
//!
//! ## Layout
//!
//! - [`server`]: listener, accept loop and the control surface
//! - [`connection`]: per-connection request dispatch
//! - [`handler`]: host and device handler traits
//! - [`host`]: stock host services
//! - [`shell`]: shell v1/v2/exec sessions and the shell command table
//! - [`sync`]: file transfer sub-protocol
//! - [`reverse`]: device-side port forwards
//! - [`registry`]: ordered handler registration
//! - [`history`]: bounded log of served sessions

pub mod connection;
pub mod context;
pub mod error;
pub mod handler;
pub mod history;
pub mod host;
pub mod registry;
pub mod request;
pub mod reverse;
pub mod server;
pub mod shell;
pub mod sync;

pub use context::ServerContext;
pub use error::{Result, ServerError};
pub use handler::{
    reject, DeviceCommandHandler, DeviceContext, HostCommandHandler, HostContext, SessionOutcome,
};
pub use history::{SessionHistory, SessionRecord};
pub use registry::{HandlerRegistry, ShellCommandTable};
pub use server::{FakeAdbServer, FakeAdbServerBuilder};
pub use reverse::ReverseHandler;
pub use shell::{AbbHandler, ShellCommand, ShellContext, ShellIo, ShellMode, ShellProtocol};
pub use sync::SyncHandler;
