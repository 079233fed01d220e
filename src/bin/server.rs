//! API server binary.
//!
//! Reads provider keys from `MISTRAL_API_KEY` and `ELEVENLABS_API_KEY`, an
//! optional config file path from the first argument, and serves until
//! Ctrl-C.

use std::path::PathBuf;

use ink_echo::EchoConfig;
use ink_echo::server::{ApiKeys, EchoServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ink_echo=info")),
        )
        .init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = EchoConfig::load(config_path.as_deref())?;

    tracing::info!(
        bind = %config.server.bind_addr,
        vision_fallback = config.features.vision_fallback,
        "ink-echo-server starting"
    );

    let server = EchoServer::start(config.server, config.features, ApiKeys::from_env())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "ink-echo-server failed to start");
            anyhow::anyhow!("ink-echo-server failed: {e}")
        })?;

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    tracing::info!("ink-echo-server shut down cleanly");
    Ok(())
}
