//! Wiring from `VigilConfig` to a running engine.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vigil_core::effects::{DispatchError, EmailDispatchEffects};
use vigil_core::VigilError;
use vigil_effects::{
    HttpDispatchConfig, HttpDispatchHandler, LogDispatchHandler, MemoryReleaseStore,
    ReleaseEffectSystem,
};
use vigil_release::ReleaseEngine;

use crate::config::{DispatchConfig, DispatchMode, Secret, VigilConfig};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to load store fixture: {0}")]
    Store(#[from] VigilError),
    #[error("failed to set up email dispatch: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("{0}")]
    Config(String),
}

/// Engine plus a handle on its backing store.
pub struct App {
    pub engine: Arc<ReleaseEngine<ReleaseEffectSystem>>,
    pub store: MemoryReleaseStore,
}

impl App {
    pub async fn from_config(config: &VigilConfig) -> Result<Self, BootstrapError> {
        let store = match &config.store.fixture {
            Some(path) => MemoryReleaseStore::load_json(path).await?,
            None => MemoryReleaseStore::new(),
        };
        let dispatch = build_dispatch(&config.dispatch)?;
        let effects = Arc::new(ReleaseEffectSystem::with_memory_store(
            store.clone(),
            dispatch,
        ));
        let engine = ReleaseEngine::new(effects)
            .with_rate_limit(config.rate_limit.clone())
            .with_orchestrator_config(config.release.clone())
            .with_service_credential(
                config
                    .server
                    .service_credential
                    .as_ref()
                    .map(|s| s.expose().to_string()),
            );
        Ok(Self {
            engine: Arc::new(engine),
            store,
        })
    }
}

fn build_dispatch(
    config: &DispatchConfig,
) -> Result<Arc<dyn EmailDispatchEffects>, BootstrapError> {
    match config.mode {
        DispatchMode::Log => {
            info!("email dispatch: log only");
            Ok(Arc::new(LogDispatchHandler::new()))
        }
        DispatchMode::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| BootstrapError::Config("dispatch.endpoint is not set".into()))?;
            let api_key = config
                .api_key
                .as_ref()
                .map(Secret::expose)
                .ok_or_else(|| BootstrapError::Config("dispatch.api_key is not set".into()))?;
            info!(endpoint = %endpoint, "email dispatch: http");
            let handler = HttpDispatchHandler::new(HttpDispatchConfig {
                endpoint,
                api_key: api_key.to_string(),
                from_address: config.from_address.clone(),
                timeout: Duration::from_secs(config.timeout_secs),
            })?;
            Ok(Arc::new(handler))
        }
    }
}
