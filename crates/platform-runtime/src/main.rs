//! # Social Platform Node
//!
//! Runs the post, media and search services against the broker named by
//! `SP_BUS_URL` and the cache named by `SP_CACHE_URL`. `memory://` for both
//! runs everything inside this process.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use platform_runtime::container::{backends, PlatformConfig};
use platform_runtime::PlatformRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    let config = PlatformConfig::from_env().context("Failed to load configuration")?;
    social_telemetry::init_telemetry(&config.telemetry)
        .context("Failed to initialize telemetry")?;

    config.validate().context("Invalid platform configuration")?;
    let transport = backends::transport(&config.bus).context("Failed to select the broker")?;
    let cache = backends::cache_store(&config.cache)
        .await
        .context("Failed to connect to the cache store")?;
    let runtime = PlatformRuntime::start(config, transport, cache).await?;

    info!("Platform is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    match social_telemetry::encode_metrics() {
        Ok(metrics) => debug!(%metrics, "Final metrics snapshot"),
        Err(e) => warn!(error = %e, "Failed to encode metrics"),
    }
    Ok(())
}
