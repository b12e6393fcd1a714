//! Device State
//!
//! One simulated Android device. Identity is fixed at attach time; status,
//! properties, files and packages sit behind a reader/writer lock so that
//! concurrent connections may read while a single writer mutates.

use std::collections::BTreeMap;

use fakeadb_core::{ConnectionKind, DeviceConfig, DeviceStatus, FileConfig, PackageConfig};
use parking_lot::RwLock;

use crate::filesystem::VirtualFs;
use crate::forward::{ForwardRule, ForwardTable};
use crate::packages::PackageManager;

#[derive(Debug)]
struct DeviceData {
    status: DeviceStatus,
    properties: BTreeMap<String, String>,
    fs: VirtualFs,
    packages: PackageManager,
    activities: Vec<String>,
    forwards: ForwardTable,
    reverses: ForwardTable,
}

/// A simulated device
#[derive(Debug)]
pub struct DeviceState {
    serial: String,
    manufacturer: String,
    model: String,
    release: String,
    sdk: u32,
    connection: ConnectionKind,
    transport_id: u64,
    crlf_newlines: bool,
    features: Option<Vec<String>>,
    data: RwLock<DeviceData>,
}

impl DeviceState {
    /// Build a device from its configuration
    pub fn new(config: &DeviceConfig, transport_id: u64) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("ro.product.manufacturer".to_string(), config.manufacturer.clone());
        properties.insert("ro.product.model".to_string(), config.model.clone());
        properties.insert("ro.build.version.release".to_string(), config.release.clone());
        properties.insert("ro.build.version.sdk".to_string(), config.sdk.to_string());
        properties.insert("ro.serialno".to_string(), config.serial.clone());
        properties.extend(config.properties.clone());

        let mut fs = VirtualFs::new();
        for file in &config.files {
            if let Err(e) = fs.write(&file.path, file.contents.as_slice(), file.mode) {
                tracing::warn!("Skipping seeded file on {}: {}", config.serial, e);
            }
        }

        let mut packages = PackageManager::new();
        for package in &config.packages {
            packages.install(package.name.clone(), package.paths.clone());
        }

        Self {
            serial: config.serial.clone(),
            manufacturer: config.manufacturer.clone(),
            model: config.model.clone(),
            release: config.release.clone(),
            sdk: config.sdk,
            connection: config.connection,
            transport_id,
            crlf_newlines: config.uses_crlf(),
            features: config.features.clone(),
            data: RwLock::new(DeviceData {
                status: config.status,
                properties,
                fs,
                packages,
                activities: Vec::new(),
                forwards: ForwardTable::new(),
                reverses: ForwardTable::new(),
            }),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn sdk(&self) -> u32 {
        self.sdk
    }

    pub fn connection(&self) -> ConnectionKind {
        self.connection
    }

    pub fn transport_id(&self) -> u64 {
        self.transport_id
    }

    /// Newline emitted by the legacy shell
    pub fn shell_newline(&self) -> &'static [u8] {
        if self.crlf_newlines {
            b"\r\n"
        } else {
            b"\n"
        }
    }

    /// Device features, falling back to the host's when none are configured
    pub fn features(&self, host_features: &[String]) -> Vec<String> {
        self.features
            .clone()
            .unwrap_or_else(|| host_features.to_vec())
    }

    pub fn status(&self) -> DeviceStatus {
        self.data.read().status
    }

    pub(crate) fn set_status(&self, status: DeviceStatus) -> DeviceStatus {
        std::mem::replace(&mut self.data.write().status, status)
    }

    pub fn is_online(&self) -> bool {
        self.status().is_usable()
    }

    /// `ro.product.name`, or the model when unset
    pub fn product_name(&self) -> String {
        self.property("ro.product.name")
            .unwrap_or_else(|| self.model.to_lowercase().replace(' ', "_"))
    }

    /// `ro.product.device`, or the model when unset
    pub fn device_name(&self) -> String {
        self.property("ro.product.device")
            .unwrap_or_else(|| self.model.to_lowercase().replace(' ', "_"))
    }

    /// `usb:<bus-path>` for USB devices, `unknown` otherwise
    pub fn dev_path(&self) -> String {
        match self.connection {
            ConnectionKind::Usb => format!("usb:1-{}", self.transport_id),
            ConnectionKind::Tcp => "unknown".to_string(),
        }
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.data.read().properties.get(key).cloned()
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data.write().properties.insert(key.into(), value.into());
    }

    /// Snapshot of every property, sorted by key
    pub fn properties(&self) -> BTreeMap<String, String> {
        self.data.read().properties.clone()
    }

    /// Read access to the filesystem
    pub fn with_fs<R>(&self, f: impl FnOnce(&VirtualFs) -> R) -> R {
        f(&self.data.read().fs)
    }

    /// Write access to the filesystem
    pub fn with_fs_mut<R>(&self, f: impl FnOnce(&mut VirtualFs) -> R) -> R {
        f(&mut self.data.write().fs)
    }

    /// Read access to the package manager
    pub fn with_packages<R>(&self, f: impl FnOnce(&PackageManager) -> R) -> R {
        f(&self.data.read().packages)
    }

    /// Write access to the package manager
    pub fn with_packages_mut<R>(&self, f: impl FnOnce(&mut PackageManager) -> R) -> R {
        f(&mut self.data.write().packages)
    }

    /// Record a component started through `am start`
    pub fn record_activity(&self, component: impl Into<String>) {
        self.data.write().activities.push(component.into());
    }

    /// Components started so far, oldest first
    pub fn activities(&self) -> Vec<String> {
        self.data.read().activities.clone()
    }

    /// Host-to-device forwards (`adb forward`)
    pub fn with_forwards_mut<R>(&self, f: impl FnOnce(&mut ForwardTable) -> R) -> R {
        f(&mut self.data.write().forwards)
    }

    /// Device-to-host forwards (`adb reverse`)
    pub fn with_reverses_mut<R>(&self, f: impl FnOnce(&mut ForwardTable) -> R) -> R {
        f(&mut self.data.write().reverses)
    }

    /// Snapshot of the `adb forward` rules
    pub fn forwards(&self) -> Vec<ForwardRule> {
        self.data.read().forwards.rules().to_vec()
    }

    /// Snapshot of the `adb reverse` rules
    pub fn reverses(&self) -> Vec<ForwardRule> {
        self.data.read().reverses.rules().to_vec()
    }

    /// Export the current state as a configuration that recreates it
    pub fn to_config(&self) -> DeviceConfig {
        let data = self.data.read();
        let seeded = [
            "ro.product.manufacturer",
            "ro.product.model",
            "ro.build.version.release",
            "ro.build.version.sdk",
            "ro.serialno",
        ];

        DeviceConfig {
            serial: self.serial.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            release: self.release.clone(),
            sdk: self.sdk,
            connection: self.connection,
            status: data.status,
            crlf_newlines: Some(self.crlf_newlines),
            features: self.features.clone(),
            properties: data
                .properties
                .iter()
                .filter(|(key, _)| !seeded.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            files: data
                .fs
                .files()
                .map(|(path, contents, mode)| FileConfig {
                    path: path.to_string(),
                    contents: contents.to_vec(),
                    mode,
                })
                .collect(),
            packages: data
                .packages
                .names()
                .into_iter()
                .map(|name| PackageConfig {
                    paths: data.packages.paths(&name),
                    name,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel() -> DeviceConfig {
        DeviceConfig::new("emulator-5554", "Google", "Pixel 7", "13", 33)
    }

    #[test]
    fn test_seeded_properties() {
        let device = DeviceState::new(&pixel().with_property("ro.debuggable", "1"), 1);
        assert_eq!(device.property("ro.product.manufacturer").as_deref(), Some("Google"));
        assert_eq!(device.property("ro.build.version.sdk").as_deref(), Some("33"));
        assert_eq!(device.property("ro.debuggable").as_deref(), Some("1"));
        assert_eq!(device.property("ro.missing"), None);
    }

    #[test]
    fn test_set_property() {
        let device = DeviceState::new(&pixel(), 1);
        device.set_property("persist.sys.locale", "en-US");
        assert_eq!(
            device.properties().get("persist.sys.locale").map(String::as_str),
            Some("en-US")
        );
    }

    #[test]
    fn test_status_transition() {
        let device = DeviceState::new(&pixel(), 1);
        assert!(device.is_online());
        let previous = device.set_status(DeviceStatus::Offline);
        assert_eq!(previous, DeviceStatus::Online);
        assert!(!device.is_online());
    }

    #[test]
    fn test_shell_newline() {
        let old = DeviceState::new(&DeviceConfig::new("old", "LGE", "Nexus 5", "6.0", 23), 1);
        let new = DeviceState::new(&pixel(), 2);
        assert_eq!(old.shell_newline(), b"\r\n");
        assert_eq!(new.shell_newline(), b"\n");
    }

    #[test]
    fn test_names_and_paths() {
        let device = DeviceState::new(&pixel(), 3);
        assert_eq!(device.product_name(), "pixel_7");
        assert_eq!(device.dev_path(), "usb:1-3");

        let tcp = DeviceState::new(&pixel().with_connection(ConnectionKind::Tcp), 4);
        assert_eq!(tcp.dev_path(), "unknown");
    }

    #[test]
    fn test_to_config_round_trip() {
        let config = pixel()
            .with_property("ro.debuggable", "1")
            .with_file("/sdcard/a.txt", "hello")
            .with_package("com.example", "/data/app/com.example/base.apk");
        let device = DeviceState::new(&config, 1);
        device.record_activity("com.example/.Main");

        let exported = device.to_config();
        assert_eq!(exported.properties, config.properties);
        assert_eq!(exported.files, config.files);
        assert_eq!(exported.packages, config.packages);
        assert_eq!(exported.crlf_newlines, Some(false));
    }

    #[test]
    fn test_binary_files_survive_export() {
        let apk = vec![80, 75, 3, 4, 255, 254, 0, 128];
        let device = DeviceState::new(&pixel(), 1);
        device
            .with_fs_mut(|fs| fs.write("/data/local/tmp/app.apk", apk.clone(), 0o644))
            .unwrap();

        let recreated = DeviceState::new(&device.to_config(), 2);
        let read = recreated
            .with_fs(|fs| fs.read("/data/local/tmp/app.apk"))
            .unwrap();
        assert_eq!(read, apk);
    }
}
