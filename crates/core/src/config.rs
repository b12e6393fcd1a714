//! Server Configuration
//!
//! Manages everything needed to stand up a fake ADB server:
//! - listening address and advertised protocol version
//! - host feature set
//! - shell v2 output chunking
//! - devices seeded at startup

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FakeAdbError, Result};

/// Features advertised by `host:features` unless configured otherwise
pub const DEFAULT_FEATURES: &[&str] = &[
    "push_sync",
    "fixed_push_mkdir",
    "shell_v2",
    "apex",
    "stat_v2",
    "cmd",
    "abb",
    "abb_exec",
];

/// Connection status of a simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Device is attached but not reachable
    Offline,
    /// Device is in bootloader mode
    Bootloader,
    /// Device is online and ready
    #[default]
    Online,
    /// Device is not authorized (need to accept on device)
    Unauthorized,
}

impl DeviceStatus {
    /// State string used on the wire by `host:devices` and `get-state`
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Offline => "offline",
            DeviceStatus::Bootloader => "bootloader",
            DeviceStatus::Online => "device",
            DeviceStatus::Unauthorized => "unauthorized",
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, DeviceStatus::Online)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the simulated device is attached to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Physical device over USB
    #[default]
    Usb,
    /// Network device (emulators, `adb connect`)
    Tcp,
}

/// A file seeded into a device's virtual filesystem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    /// Absolute device path
    pub path: String,
    /// File contents. Written as a plain string when they are UTF-8 and as
    /// `{ base64 = "..." }` otherwise.
    #[serde(default, with = "file_contents")]
    pub contents: Vec<u8>,
    /// Unix permission bits
    #[serde(default = "default_file_mode")]
    pub mode: u32,
}

fn default_file_mode() -> u32 {
    0o644
}

mod file_contents {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr<'a> {
        Text(std::borrow::Cow<'a, str>),
        Binary { base64: String },
    }

    pub fn serialize<S: Serializer>(contents: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(contents) {
            Ok(text) => Repr::Text(text.into()).serialize(serializer),
            Err(_) => Repr::Binary {
                base64: STANDARD.encode(contents),
            }
            .serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Ok(text.into_owned().into_bytes()),
            Repr::Binary { base64 } => STANDARD
                .decode(base64)
                .map_err(|e| serde::de::Error::custom(format!("invalid base64 contents: {}", e))),
        }
    }
}

/// A package seeded into a device's package manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageConfig {
    /// Application id, e.g. `com.example.app`
    pub name: String,
    /// APK code paths reported by `pm path`
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Configuration of one simulated device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Device serial number
    pub serial: String,
    /// `ro.product.manufacturer`
    pub manufacturer: String,
    /// `ro.product.model`
    pub model: String,
    /// `ro.build.version.release`
    pub release: String,
    /// `ro.build.version.sdk`
    pub sdk: u32,
    /// Host connection kind
    #[serde(default)]
    pub connection: ConnectionKind,
    /// Initial status
    #[serde(default)]
    pub status: DeviceStatus,
    /// Whether legacy shell output converts `\n` to `\r\n`.
    /// Derived from the SDK level when unset.
    #[serde(default)]
    pub crlf_newlines: Option<bool>,
    /// Device features; the server's feature set when unset
    #[serde(default)]
    pub features: Option<Vec<String>>,
    /// Extra system properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Seeded files
    #[serde(default)]
    pub files: Vec<FileConfig>,
    /// Seeded packages
    #[serde(default)]
    pub packages: Vec<PackageConfig>,
}

impl DeviceConfig {
    /// Create a device configuration with the mandatory identity fields
    pub fn new(
        serial: impl Into<String>,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        release: impl Into<String>,
        sdk: u32,
    ) -> Self {
        Self {
            serial: serial.into(),
            manufacturer: manufacturer.into(),
            model: model.into(),
            release: release.into(),
            sdk,
            connection: ConnectionKind::default(),
            status: DeviceStatus::default(),
            crlf_newlines: None,
            features: None,
            properties: BTreeMap::new(),
            files: Vec::new(),
            packages: Vec::new(),
        }
    }

    pub fn with_connection(mut self, connection: ConnectionKind) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push(FileConfig {
            path: path.into(),
            contents: contents.into(),
            mode: default_file_mode(),
        });
        self
    }

    pub fn with_package(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.packages.push(PackageConfig {
            name: name.into(),
            paths: vec![path.into()],
        });
        self
    }

    /// Shell v1 newline conversion. Pre-N devices run the legacy shell
    /// through a pty that turns `\n` into `\r\n`.
    pub fn uses_crlf(&self) -> bool {
        self.crlf_newlines.unwrap_or(self.sdk < 24)
    }
}

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Configuration version for migrations
    pub version: u32,
    /// Address to bind
    pub bind_address: String,
    /// Port to bind; 0 picks an ephemeral port
    pub port: u16,
    /// Version reported by `host:version`
    pub adb_version: u32,
    /// Features advertised by the host
    pub features: Vec<String>,
    /// Maximum payload of a shell v2 output packet
    pub shell_v2_chunk_size: usize,
    /// Devices attached at startup
    pub devices: Vec<DeviceConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            bind_address: "127.0.0.1".to_string(),
            port: 5037,
            adb_version: 41,
            features: DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect(),
            shell_v2_chunk_size: 80,
            devices: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Configuration suited to tests: ephemeral loopback port, no devices
    pub fn ephemeral() -> Self {
        Self {
            port: 0,
            ..Self::default()
        }
    }

    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "fakeadb", "FakeAdb")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the default configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("server.toml"))
    }

    /// Load configuration from `path`, or from the default location.
    /// Falls back to defaults when no file exists.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_file = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::config_file() {
                Some(file) => file,
                None => return Ok(Self::default()),
            },
        };

        if config_file.exists() {
            debug!("Loading config from {:?}", config_file);
            let contents = tokio::fs::read_to_string(&config_file).await?;
            Self::from_toml_str(&contents)
        } else if path.is_some() {
            Err(FakeAdbError::Config(format!(
                "config file {:?} does not exist",
                config_file
            )))
        } else {
            info!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = self.to_toml_string()?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.shell_v2_chunk_size == 0 {
            return Err(FakeAdbError::Config(
                "shell_v2_chunk_size must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.serial.is_empty() {
                return Err(FakeAdbError::Config("device serial must not be empty".into()));
            }
            if !seen.insert(device.serial.as_str()) {
                return Err(FakeAdbError::Config(format!(
                    "duplicate device serial '{}'",
                    device.serial
                )));
            }
        }
        Ok(())
    }

    /// `host:port` string for the listener
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
