//! Shared session setup for command handlers.

use std::time::Duration;

use poolside_api::{OmniClient, Transport};
use poolside_config::{Config, load_config, load_config_from};
use poolside_core::{Coordinator, CoordinatorConfig, PoolEntity, derive_entities};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// An authenticated session with the entity set derived from the first
/// poll. The coordinator is one-shot: handlers that need fresh telemetry
/// poll explicitly instead of racing a background task.
pub struct Session {
    pub config: Config,
    pub coordinator: Coordinator,
    pub entities: Vec<PoolEntity>,
}

pub async fn connect(global: &GlobalOpts) -> Result<Session, CliError> {
    let config = match &global.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let base_url = config.parsed_base_url()?;
    let (username, password) = config.credentials()?;

    let transport = Transport::with_timeout(Duration::from_secs(config.request_timeout_secs));
    let client = OmniClient::new(base_url, &transport)
        .map_err(poolside_core::CoreError::Api)
        .map_err(CliError::from)?;

    let coordinator = Coordinator::new(
        client,
        CoordinatorConfig {
            poll_interval: Duration::ZERO,
            ..config.coordinator_config()
        },
    );
    coordinator.connect(&username, &password).await?;

    let entities = derive_entities(&coordinator);
    tracing::debug!(count = entities.len(), "session established");

    Ok(Session {
        config,
        coordinator,
        entities,
    })
}
