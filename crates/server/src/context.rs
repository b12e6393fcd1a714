//! Shared server state
//!
//! One [`ServerContext`] is shared by the accept loop, every connection
//! task and the control surface of [`FakeAdbServer`](crate::FakeAdbServer).

use std::sync::Arc;

use fakeadb_core::{DeviceEvent, EventBus, ServerConfig};
use fakeadb_device::DeviceList;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::history::SessionHistory;
use crate::registry::HandlerRegistry;

/// State shared by all connections
pub struct ServerContext {
    adb_version: u32,
    features: Vec<String>,
    shell_v2_chunk_size: usize,
    config: ServerConfig,
    devices: DeviceList,
    registry: HandlerRegistry,
    history: SessionHistory,
    shutdown: CancellationToken,
}

impl ServerContext {
    pub fn new(config: ServerConfig, registry: HandlerRegistry) -> Self {
        let events = Arc::new(EventBus::new());
        Self {
            adb_version: config.adb_version,
            features: config.features.clone(),
            shell_v2_chunk_size: config.shell_v2_chunk_size,
            config,
            devices: DeviceList::new(events),
            registry,
            history: SessionHistory::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Version reported by `host:version`
    pub fn adb_version(&self) -> u32 {
        self.adb_version
    }

    /// Features advertised by the host
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn shell_v2_chunk_size(&self) -> usize {
        self.shell_v2_chunk_size
    }

    /// Configuration the server was built from, without runtime changes
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.devices.events()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop accepting connections and end open sessions. Idempotent.
    pub fn request_shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("Fake ADB server shutting down");
        self.shutdown.cancel();
        self.events().emit(DeviceEvent::ServerStopping);
        self.events().close();
    }
}
