//! Fake ADB server
//!
//! Binds a TCP listener, accepts connections and runs each one on its own
//! task. The same object is the control surface a test harness uses to
//! attach and detach devices, flip their status and inspect what clients
//! did.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fakeadb_core::{DeviceConfig, DeviceStatus, ServerConfig};
use fakeadb_device::DeviceState;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::context::ServerContext;
use crate::error::{Result, ServerError};
use crate::handler::{DeviceCommandHandler, HostCommandHandler};
use crate::history::SessionRecord;
use crate::registry::HandlerRegistry;
use crate::shell::ShellCommand;

/// Builder for [`FakeAdbServer`]. Handlers registered here take priority
/// over the stock ones.
pub struct FakeAdbServerBuilder {
    config: ServerConfig,
    registry: HandlerRegistry,
    install_defaults: bool,
}

impl FakeAdbServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: HandlerRegistry::new(),
            install_defaults: true,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Port to listen on; 0 picks a free one
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Seed a device, attached when the server is built
    pub fn device(mut self, device: DeviceConfig) -> Self {
        self.config.devices.push(device);
        self
    }

    /// Serve only the handlers registered on this builder
    pub fn without_default_handlers(mut self) -> Self {
        self.install_defaults = false;
        self
    }

    pub fn host_handler(self, handler: Arc<dyn HostCommandHandler>) -> Self {
        self.registry.add_host_handler(handler);
        self
    }

    pub fn device_handler(self, handler: Arc<dyn DeviceCommandHandler>) -> Self {
        self.registry.add_device_handler(handler);
        self
    }

    pub fn shell_command(self, command: Arc<dyn ShellCommand>) -> Self {
        self.registry.add_shell_command(command);
        self
    }

    /// Validate the configuration and attach the seeded devices
    pub fn build(self) -> Result<FakeAdbServer> {
        self.config.validate()?;
        if self.install_defaults {
            self.registry.install_defaults();
        }

        let devices = self.config.devices.clone();
        let ctx = Arc::new(ServerContext::new(self.config, self.registry));
        for device in &devices {
            ctx.devices().attach(device)?;
        }

        Ok(FakeAdbServer {
            ctx,
            local_addr: None,
            accept_task: None,
        })
    }
}

impl Default for FakeAdbServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A fake ADB server and its control surface
pub struct FakeAdbServer {
    ctx: Arc<ServerContext>,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

impl FakeAdbServer {
    pub fn builder() -> FakeAdbServerBuilder {
        FakeAdbServerBuilder::new()
    }

    /// Bind the listener and start accepting connections
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr {
            return Err(ServerError::AlreadyStarted(addr));
        }

        let listener = TcpListener::bind(self.ctx.config().socket_address()).await?;
        let addr = listener.local_addr()?;
        info!(
            "Fake ADB server listening on {} with {} device(s)",
            addr,
            self.ctx.devices().len()
        );

        self.accept_task = Some(tokio::spawn(accept_loop(listener, Arc::clone(&self.ctx))));
        self.local_addr = Some(addr);
        Ok(addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn port(&self) -> Option<u16> {
        self.local_addr.map(|addr| addr.port())
    }

    pub fn is_running(&self) -> bool {
        self.local_addr.is_some() && !self.ctx.is_shutting_down()
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Register handlers on a running server
    pub fn registry(&self) -> &HandlerRegistry {
        self.ctx.registry()
    }

    /// Attach a device; it gets the next transport id
    pub fn connect_device(&self, config: DeviceConfig) -> Result<Arc<DeviceState>> {
        Ok(self.ctx.devices().attach(&config)?)
    }

    pub fn disconnect_device(&self, serial: &str) -> Result<()> {
        self.ctx.devices().detach(serial)?;
        Ok(())
    }

    pub fn set_device_status(&self, serial: &str, status: DeviceStatus) -> Result<()> {
        Ok(self.ctx.devices().set_status(serial, status)?)
    }

    pub fn device(&self, serial: &str) -> Option<Arc<DeviceState>> {
        self.ctx.devices().get(serial)
    }

    /// Attached devices in attach order
    pub fn devices(&self) -> Vec<Arc<DeviceState>> {
        self.ctx.devices().snapshot()
    }

    /// Sessions served so far, oldest first
    pub fn session_history(&self) -> Vec<SessionRecord> {
        self.ctx.history().snapshot()
    }

    /// Configuration that recreates the server as it is now, devices
    /// included
    pub fn current_config(&self) -> ServerConfig {
        let mut config = self.ctx.config().clone();
        config.devices = self
            .ctx
            .devices()
            .snapshot()
            .iter()
            .map(|device| device.to_config())
            .collect();
        config
    }

    /// Stop accepting and cancel open connections
    pub fn stop(&self) {
        self.ctx.request_shutdown();
    }

    /// Wait for the accept loop to end, after [`stop`](Self::stop) or
    /// `host:kill`
    pub async fn wait(&mut self) {
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                warn!("Accept loop ended abnormally: {}", e);
            }
        }
    }

    /// Stop and wait
    pub async fn shutdown(mut self) {
        self.stop();
        self.wait().await;
    }
}

impl Drop for FakeAdbServer {
    fn drop(&mut self) {
        self.ctx.shutdown_token().cancel();
    }
}

async fn accept_loop(listener: TcpListener, ctx: Arc<ServerContext>) {
    let shutdown = ctx.shutdown_token().clone();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                    }
                    debug!("Accepted connection from {}", peer);

                    let connection = Connection::new(Arc::clone(&ctx), stream, Some(peer));
                    let token = shutdown.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = token.cancelled() => debug!("Connection from {} cancelled", peer),
                            _ = connection.run() => {}
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    info!("Fake ADB server stopped accepting connections");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(serial: &str) -> DeviceConfig {
        DeviceConfig::new(serial, "Google", "Pixel", "13", 33)
    }

    #[test]
    fn test_builder_attaches_seeded_devices() {
        let server = FakeAdbServer::builder()
            .config(ServerConfig::ephemeral())
            .device(pixel("a"))
            .device(pixel("b"))
            .build()
            .unwrap();

        let serials: Vec<String> = server
            .devices()
            .iter()
            .map(|d| d.serial().to_string())
            .collect();
        assert_eq!(serials, vec!["a", "b"]);
        assert_eq!(server.device("b").unwrap().transport_id(), 2);
    }

    #[test]
    fn test_builder_rejects_duplicate_serials() {
        let result = FakeAdbServer::builder()
            .device(pixel("a"))
            .device(pixel("a"))
            .build();
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_control_surface() {
        let server = FakeAdbServer::builder()
            .config(ServerConfig::ephemeral())
            .build()
            .unwrap();

        server.connect_device(pixel("a")).unwrap();
        assert!(server.connect_device(pixel("a")).is_err());
        server.set_device_status("a", DeviceStatus::Unauthorized).unwrap();
        assert_eq!(server.device("a").unwrap().status(), DeviceStatus::Unauthorized);

        let config = server.current_config();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].status, DeviceStatus::Unauthorized);

        server.disconnect_device("a").unwrap();
        assert!(matches!(
            server.disconnect_device("a"),
            Err(ServerError::Device(_))
        ));
        assert!(server.devices().is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut server = FakeAdbServer::builder()
            .config(ServerConfig::ephemeral())
            .build()
            .unwrap();

        let addr = server.start().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.is_running());
        assert!(matches!(
            server.start().await,
            Err(ServerError::AlreadyStarted(_))
        ));

        server.shutdown().await;
    }
}
