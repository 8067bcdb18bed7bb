//! Cloud Client
//!
//! Pairs with a cloud device from a scanned QR code, uploads the given
//! files once authenticated and then polls for notifications.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use sync_engine::{EngineConfig, HandshakeState, SyncEngine};

#[derive(Debug, Parser)]
#[command(name = "cloud-client", version, about)]
struct Cli {
    /// TOML config file
    #[arg(short, long, env = "CLOUD_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Relay base URL
    #[arg(long)]
    proxy: Option<String>,

    /// PIN shown on the cloud device
    #[arg(long)]
    pin: Option<u32>,

    /// Per-request timeout; waits indefinitely when unset
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Base64 payload of the scanned QR code
    #[arg(long, env = "CLOUD_SYNC_QR")]
    qr: String,

    /// Files uploaded after authentication
    files: Vec<PathBuf>,
}

impl Cli {
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = EngineConfig::load(self.config.as_deref())?;
        if let Some(proxy) = &self.proxy {
            config.proxy_url = proxy.clone();
        }
        if let Some(pin) = self.pin {
            config.pin = pin;
        }
        if let Some(timeout) = self.timeout_secs {
            config.request_timeout_secs = Some(timeout);
        }
        if let Some(interval) = self.poll_interval_secs {
            config.poll_interval_secs = interval;
        }
        config.bootstrap_uploads.extend(self.files.iter().cloned());
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cloud_client=info".parse()?)
                .add_directive("sync_engine=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.engine_config()?;
    info!("Starting cloud client against {}", config.proxy_url);

    let engine = SyncEngine::connect(config)?;
    engine.scan_qr(&cli.qr).await?;

    let mut ticker = tokio::time::interval(engine.config().poll_interval());
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            _ = ticker.tick() => match engine.handshake_state() {
                HandshakeState::Authenticated => engine.poll_notifications(),
                HandshakeState::Failed => anyhow::bail!("Pairing failed, scan the QR code again"),
                state => warn!("Still pairing ({})", state),
            },
        }
    }

    Ok(())
}
