//! Host configuration.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use spark_driver::SparkDriver;
use tracing::{info, warn};
use webln_controller::{
    AuthorizationStore, Controller, JsonFileStorage, LoggingBehaviors, PromptSurface,
    NOT_CONFIGURED_MESSAGE,
};
use webln_relay::RelayConfig;

use crate::error::BridgeError;

/// Configuration for the bridge host.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// JSON file holding domain authorizations. In memory when unset.
    pub auth_store: Option<PathBuf>,
    pub relay: RelayConfig,
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `BRIDGE_AUTH_STORE` - Authorization store path (default: in memory)
    /// - `RELAY_BLOCKED_TTL_SECS` - See [`RelayConfig::from_env`]
    ///
    /// Backend credentials are read separately by [`driver_from_env`].
    pub fn from_env() -> Self {
        Self {
            auth_store: env::var("BRIDGE_AUTH_STORE")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            relay: RelayConfig::from_env(),
        }
    }

    pub fn with_auth_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_store = Some(path.into());
        self
    }

    pub async fn open_store(&self) -> Result<AuthorizationStore, BridgeError> {
        match &self.auth_store {
            Some(path) => {
                let storage = JsonFileStorage::open(path).await?;
                info!("Authorization store at {}", path.display());
                Ok(AuthorizationStore::new(Arc::new(storage)))
            }
            None => Ok(AuthorizationStore::in_memory()),
        }
    }
}

/// The spark driver, or `None` when `SPARK_ENDPOINT` is not set.
pub fn driver_from_env() -> Result<Option<SparkDriver>, BridgeError> {
    if env::var("SPARK_ENDPOINT").map_or(true, |v| v.trim().is_empty()) {
        return Ok(None);
    }
    Ok(Some(SparkDriver::from_env()?))
}

/// Assemble the controller from configuration and environment.
pub async fn build_controller(
    config: &BridgeConfig,
    prompt: Arc<dyn PromptSurface>,
) -> Result<Controller<SparkDriver>, BridgeError> {
    let store = config.open_store().await?;
    let controller = Controller::new(store, prompt, Arc::new(LoggingBehaviors));

    match driver_from_env()? {
        Some(driver) => Ok(controller.with_driver(Arc::new(driver))),
        None => {
            warn!("{}", NOT_CONFIGURED_MESSAGE);
            Ok(controller)
        }
    }
}
