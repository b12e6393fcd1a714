//! Command handler traits
//!
//! Three kinds of handler are registered with a server:
//!
//! - [`HostCommandHandler`]: host services such as `host:version`, claimed
//!   by exact service name.
//! - [`DeviceCommandHandler`]: device services such as `shell,v2:` or
//!   `sync:`, claimed by `(service, args)`.
//! - [`ShellCommand`](crate::shell::ShellCommand): executables run inside a
//!   shell session, claimed by exact executable name.
//!
//! `claims` must not have side effects; the dispatcher tries handlers in
//! registration order and runs the first that claims a request. A handler
//! that claims is responsible for the `OKAY`/`FAIL` handshake.

use std::sync::Arc;

use async_trait::async_trait;
use fakeadb_device::{DeviceError, DeviceState, TransportSelector};
use fakeadb_protocol::{wire, AdbSocket, ProtocolError};
use tracing::{debug, warn};

use crate::context::ServerContext;

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The request was served. Shell sessions carry their exit code.
    Completed { exit_code: Option<u8> },
    /// The request was refused with `FAIL`
    Rejected { reason: String },
    /// The socket failed or closed mid-session
    TransportClosed { detail: String },
}

impl SessionOutcome {
    pub fn completed() -> Self {
        SessionOutcome::Completed { exit_code: None }
    }

    pub fn exited(code: u8) -> Self {
        SessionOutcome::Completed {
            exit_code: Some(code),
        }
    }

    pub fn exit_code(&self) -> Option<u8> {
        match self {
            SessionOutcome::Completed { exit_code } => *exit_code,
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SessionOutcome::Rejected { .. })
    }
}

/// Send `FAIL` and report the rejection
pub async fn reject(
    socket: &mut dyn AdbSocket,
    reason: impl Into<String>,
) -> Result<SessionOutcome, ProtocolError> {
    let reason = reason.into();
    wire::write_fail(socket, &reason).await?;
    Ok(SessionOutcome::Rejected { reason })
}

/// Turn an error that escaped a handler into an outcome. Transport errors
/// are expected whenever a client hangs up, so they are only logged.
pub(crate) fn absorb(request: &str, err: ProtocolError) -> SessionOutcome {
    if err.is_transport() {
        debug!("Session '{}' ended by transport: {}", request, err);
    } else {
        warn!("Session '{}' failed: {}", request, err);
    }
    SessionOutcome::TransportClosed {
        detail: err.to_string(),
    }
}

/// Everything a host service handler gets to see
pub struct HostContext<'a> {
    pub server: &'a ServerContext,
    /// Device the request was addressed to (`host-serial:…`), or `Any`
    pub selector: TransportSelector,
    /// Service name, e.g. `devices-l`
    pub command: &'a str,
    /// Text after the service name and its `:`; empty if none
    pub args: &'a str,
}

impl HostContext<'_> {
    /// Resolve the addressed device
    pub fn device(&self) -> Result<Arc<DeviceState>, DeviceError> {
        self.server.devices().select(&self.selector)
    }
}

/// A host service
#[async_trait]
pub trait HostCommandHandler: Send + Sync {
    /// Whether this handler serves host service `command`
    fn claims(&self, command: &str) -> bool;

    /// Serve a claimed request
    async fn run(
        &self,
        ctx: &HostContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError>;

    /// Serve a claimed request, absorbing transport failures
    async fn execute(&self, ctx: &HostContext<'_>, socket: &mut dyn AdbSocket) -> SessionOutcome {
        match self.run(ctx, socket).await {
            Ok(outcome) => outcome,
            Err(err) => absorb(ctx.command, err),
        }
    }
}

/// Everything a device service handler gets to see
pub struct DeviceContext<'a> {
    pub server: &'a ServerContext,
    pub device: Arc<DeviceState>,
    /// Service name, e.g. `shell,v2`
    pub service: &'a str,
    /// Text after the service's `:`
    pub args: &'a str,
}

/// A device service
#[async_trait]
pub trait DeviceCommandHandler: Send + Sync {
    /// Whether this handler serves `service:args`
    fn claims(&self, server: &ServerContext, service: &str, args: &str) -> bool;

    /// Whether the device must be online. Checked by the dispatcher after
    /// the claim, before the handler runs.
    fn requires_online(&self, _server: &ServerContext, _service: &str, _args: &str) -> bool {
        true
    }

    /// Serve a claimed request
    async fn run(
        &self,
        ctx: &DeviceContext<'_>,
        socket: &mut dyn AdbSocket,
    ) -> Result<SessionOutcome, ProtocolError>;

    /// Serve a claimed request, absorbing transport failures
    async fn execute(&self, ctx: &DeviceContext<'_>, socket: &mut dyn AdbSocket) -> SessionOutcome {
        match self.run(ctx, socket).await {
            Ok(outcome) => outcome,
            Err(err) => absorb(ctx.service, err),
        }
    }
}
