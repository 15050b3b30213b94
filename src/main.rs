//! Pulse Relay - Main Entry Point
//!
//! Reads a pulse-oximeter board over serial and relays decoded readings to
//! websocket clients.

use anyhow::Context;
use clap::Parser;
use pulse_relay::{
    backend::{source_from_config, LinkSupervisor},
    broadcast::BroadcastHub,
    clock::SystemClock,
    config::RelayConfig,
    server::{router, RelayState},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pulse-relay", version, about = "Biosensor serial-stream relay")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device path, e.g. /dev/ttyACM0 or COM3
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Use the built-in mock device instead of a serial port
    #[arg(long)]
    mock: bool,

    /// Address to listen on, e.g. 0.0.0.0:3001
    #[arg(short, long)]
    listen: Option<String>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(port) = &self.port {
            config.device.path = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.device.baud_rate = baud;
        }
        if self.mock {
            config.device.mock = true;
        }
        if let Some(listen) = &self.listen {
            config.server.listen = listen.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pulse_relay=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = RelayConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    if let Some(path) = &cli.write_config {
        config.save(path)?;
        tracing::info!("Configuration written to {:?}", path);
        return Ok(());
    }

    tracing::info!("Starting pulse relay for {}", config.device_identifier());

    let hub = Arc::new(BroadcastHub::new(config.hub.clone()));
    let source = source_from_config(&config.device)?;
    let listen = config.server.listen.clone();
    let supervisor = Arc::new(LinkSupervisor::new(
        config,
        hub.clone(),
        Arc::new(SystemClock),
    ));

    // Observers can still connect and trigger a retry if the device is missing
    if let Err(e) = supervisor.open(source.clone()).await {
        tracing::warn!("Device not available: {}. Waiting for POST /reconnect", e);
    }

    let app = router(RelayState {
        supervisor: supervisor.clone(),
        hub,
        source,
    });

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    tracing::info!("Listening on {}", listen);
    tracing::info!("WebSocket endpoint: ws://{}/ws", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("Shutting down");
    supervisor.close().await;
    Ok(())
}
