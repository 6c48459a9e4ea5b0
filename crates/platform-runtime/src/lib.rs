//! # Social Platform Runtime
//!
//! Starts the post, media and search services on one event bus and one
//! cache store.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and service construction
//! - `wiring/` - event subscriptions between services
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration
//! 2. Initialize telemetry
//! 3. Connect one bus client per service, build services
//! 4. Bind subscriptions (media cleanup, search indexing)
//! 5. Run until ctrl-c, then stop subscriptions and close clients

pub mod container;
pub mod wiring;

use anyhow::{Context, Result};
use shared_bus::{SubscriptionHandle, Transport};
use shared_cache::CacheStore;
use std::sync::Arc;
use tracing::info;

use crate::container::{PlatformConfig, PlatformContainer};

/// Running services and their subscriptions.
pub struct PlatformRuntime {
    config: PlatformConfig,
    container: PlatformContainer,
    subscriptions: Vec<SubscriptionHandle>,
}

impl PlatformRuntime {
    /// Build every service on `transport` and `cache`, then bind the
    /// subscriptions.
    pub async fn start(
        config: PlatformConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        config.validate().context("Invalid platform configuration")?;

        let container = PlatformContainer::build(&config, transport, cache)
            .await
            .context("Failed to connect services to the event bus")?;

        let subscriptions = match wiring::start_subscriptions(&container, &config.bus).await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                container.close().await;
                return Err(e).context("Failed to bind event subscriptions");
            }
        };

        info!(
            subscriptions = subscriptions.len(),
            queue_mode = ?config.bus.queue_mode,
            "Platform runtime started"
        );

        Ok(Self {
            config,
            container,
            subscriptions,
        })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn container(&self) -> &PlatformContainer {
        &self.container
    }

    pub fn subscriptions(&self) -> &[SubscriptionHandle] {
        &self.subscriptions
    }

    /// Subscription handle for a handler name.
    pub fn subscription(&self, handler: &str) -> Option<&SubscriptionHandle> {
        self.subscriptions.iter().find(|s| s.handler() == handler)
    }

    /// Stop every subscription after its in-flight delivery, then close the
    /// bus clients.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        for subscription in self.subscriptions {
            subscription.shutdown().await;
        }
        self.container.close().await;
        info!("Shutdown complete");
    }
}
