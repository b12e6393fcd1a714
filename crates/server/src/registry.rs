//! Handler registry
//!
//! Ordered lists of host handlers, device handlers and shell commands.
//! Lookups take a read lock, clone the matching `Arc` and release the lock
//! before the handler runs, so registration never waits on a session.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::ServerContext;
use crate::handler::{DeviceCommandHandler, HostCommandHandler};
use crate::host;
use crate::reverse::ReverseHandler;
use crate::shell::{self, AbbHandler, ShellCommand, ShellHandler, ShellProtocol};
use crate::sync::SyncHandler;

/// Shell executables, first registered wins
#[derive(Default)]
pub struct ShellCommandTable {
    commands: RwLock<Vec<Arc<dyn ShellCommand>>>,
}

impl ShellCommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, command: Arc<dyn ShellCommand>) {
        self.commands.write().push(command);
    }

    /// Register ahead of everything already present
    pub fn prepend(&self, command: Arc<dyn ShellCommand>) {
        self.commands.write().insert(0, command);
    }

    pub fn find(&self, executable: &str) -> Option<Arc<dyn ShellCommand>> {
        self.commands
            .read()
            .iter()
            .find(|c| c.executable() == executable)
            .cloned()
    }

    /// Registered executable names in lookup order
    pub fn executables(&self) -> Vec<String> {
        self.commands
            .read()
            .iter()
            .map(|c| c.executable().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}

/// All handlers known to a server
#[derive(Default)]
pub struct HandlerRegistry {
    host: RwLock<Vec<Arc<dyn HostCommandHandler>>>,
    device: RwLock<Vec<Arc<dyn DeviceCommandHandler>>>,
    shell: Arc<ShellCommandTable>,
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock host services, shell handlers, sync and
    /// shell commands
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.install_defaults();
        registry
    }

    /// Append the stock handlers after anything already registered
    pub fn install_defaults(&self) {
        for handler in host::default_handlers() {
            self.add_host_handler(handler);
        }

        for protocol in [ShellProtocol::V1, ShellProtocol::V2, ShellProtocol::Exec] {
            self.add_device_handler(Arc::new(ShellHandler::new(protocol, Arc::clone(&self.shell))));
        }
        self.add_device_handler(Arc::new(SyncHandler::new()));
        self.add_device_handler(Arc::new(AbbHandler));
        self.add_device_handler(Arc::new(ReverseHandler));

        for command in shell::commands::default_commands() {
            self.shell.add(command);
        }
    }

    pub fn add_host_handler(&self, handler: Arc<dyn HostCommandHandler>) {
        self.host.write().push(handler);
    }

    /// Register a host handler that takes priority over existing ones
    pub fn prepend_host_handler(&self, handler: Arc<dyn HostCommandHandler>) {
        self.host.write().insert(0, handler);
    }

    pub fn add_device_handler(&self, handler: Arc<dyn DeviceCommandHandler>) {
        self.device.write().push(handler);
    }

    /// Register a device handler that takes priority over existing ones
    pub fn prepend_device_handler(&self, handler: Arc<dyn DeviceCommandHandler>) {
        self.device.write().insert(0, handler);
    }

    pub fn add_shell_command(&self, command: Arc<dyn ShellCommand>) {
        self.shell.add(command);
    }

    /// Register a shell command that shadows an existing executable
    pub fn prepend_shell_command(&self, command: Arc<dyn ShellCommand>) {
        self.shell.prepend(command);
    }

    pub fn shell_commands(&self) -> &Arc<ShellCommandTable> {
        &self.shell
    }

    /// First host handler claiming `command`
    pub fn find_host(&self, command: &str) -> Option<Arc<dyn HostCommandHandler>> {
        self.host.read().iter().find(|h| h.claims(command)).cloned()
    }

    /// First device handler claiming `service:args`
    pub fn find_device(
        &self,
        server: &ServerContext,
        service: &str,
        args: &str,
    ) -> Option<Arc<dyn DeviceCommandHandler>> {
        let handlers = self.device.read().clone();
        handlers.into_iter().find(|h| h.claims(server, service, args))
    }

    pub fn host_handler_count(&self) -> usize {
        self.host.read().len()
    }

    pub fn device_handler_count(&self) -> usize {
        self.device.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HostContext, SessionOutcome};
    use async_trait::async_trait;
    use fakeadb_protocol::{AdbSocket, ProtocolError};

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl HostCommandHandler for Named {
        fn claims(&self, command: &str) -> bool {
            command == self.0
        }

        async fn run(
            &self,
            _ctx: &HostContext<'_>,
            _socket: &mut dyn AdbSocket,
        ) -> Result<SessionOutcome, ProtocolError> {
            Ok(SessionOutcome::Rejected {
                reason: self.1.to_string(),
            })
        }
    }

    #[test]
    fn test_first_registered_wins() {
        let registry = HandlerRegistry::new();
        registry.add_host_handler(Arc::new(Named("version", "first")));
        registry.add_host_handler(Arc::new(Named("version", "second")));
        assert_eq!(registry.host_handler_count(), 2);
        assert!(registry.find_host("version").is_some());
        assert!(registry.find_host("devices").is_none());
    }

    #[test]
    fn test_defaults_installed() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.find_host("version").is_some());
        assert!(registry.find_host("track-devices-l").is_some());
        for command in ["forward", "killforward", "killforward-all", "list-forward"] {
            assert!(registry.find_host(command).is_some(), "missing {}", command);
        }
        assert_eq!(registry.device_handler_count(), 6);

        let shell = registry.shell_commands();
        for exe in [
            "cat", "echo", "getprop", "setprop", "rm", "pm", "am", "cmd", "dumpsys", "wm", "logcat",
        ] {
            assert!(shell.find(exe).is_some(), "missing {}", exe);
        }
        assert!(shell.find("vi").is_none());
    }
}
