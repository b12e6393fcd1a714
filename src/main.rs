//! FakeAdb - simulated ADB server
//!
//! Loads the server configuration, seeds devices and serves the ADB host
//! protocol until Ctrl-C or a client sends `host:kill`.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fakeadb::core::{DeviceConfig, ServerConfig};
use fakeadb::server::FakeAdbServer;
use fakeadb::{APP_NAME, VERSION};

/// Serve the ADB host protocol against simulated devices
#[derive(Debug, Parser)]
#[command(name = "fakeadb", version, about)]
struct Cli {
    /// Configuration file; defaults to the per-user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configuration (0 picks one)
    #[arg(short, long)]
    port: Option<u16>,

    /// Attach an emulator-like device with this serial (repeatable)
    #[arg(short = 'd', long = "device")]
    devices: Vec<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,

    /// Format used by `--dump-config`
    #[arg(long, value_enum, default_value = "toml")]
    format: DumpFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DumpFormat {
    Toml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = effective_config(&cli).await?;

    if cli.dump_config {
        let rendered = match cli.format {
            DumpFormat::Toml => config.to_toml_string()?,
            DumpFormat::Json => config.to_json_string()?,
        };
        println!("{}", rendered);
        return Ok(());
    }

    info!("{} v{} starting...", APP_NAME, VERSION);

    let mut server = FakeAdbServer::builder().config(config).build()?;
    let addr = server.start().await?;
    info!("Serving ADB clients on {}", addr);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted, shutting down");
        }
        _ = server.wait() => info!("Stopped by host:kill"),
    }

    server.shutdown().await;
    Ok(())
}

/// Configuration file plus command line overrides
async fn effective_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = ServerConfig::load(cli.config.as_deref())
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    for serial in &cli.devices {
        config.devices.push(DeviceConfig::new(
            serial.clone(),
            "Google",
            "sdk_gphone64_x86_64",
            "13",
            33,
        ));
    }

    config.validate().map_err(|e| anyhow!(e.user_message()))?;
    Ok(config)
}
