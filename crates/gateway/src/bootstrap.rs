//! Wiring: config validation and construction of the shared state.

use std::sync::Arc;

use iv_domain::config::{Config, ConfigSeverity};
use iv_domain::{Error, Result};
use iv_providers::{LlmGenerator, OpenAiCompatClient};
use iv_sessions::{MemoryContextStore, TranscriptArchive};

use crate::endpoint::{EndpointRegistry, EndpointShared, Timing};
use crate::state::AppState;

/// Validate the config and assemble the application state. Validation
/// errors are fatal; warnings are logged and tolerated.
pub fn build(config: Config) -> Result<AppState> {
    let mut fatal = 0;
    for issue in config.validate() {
        match issue.severity {
            ConfigSeverity::Error => {
                tracing::error!(%issue, "configuration error");
                fatal += 1;
            }
            ConfigSeverity::Warning => tracing::warn!(%issue, "configuration warning"),
        }
    }
    if fatal > 0 {
        return Err(Error::Config(format!(
            "{fatal} configuration error(s), refusing to start"
        )));
    }

    let registry = Arc::new(EndpointRegistry::new(
        config.gateway.advertised_host.clone(),
        config.gateway.base_ports.clone(),
    ));
    let store = Arc::new(MemoryContextStore::new());
    let client = OpenAiCompatClient::from_config(&config.llm)?;
    let generator = Arc::new(LlmGenerator::new(client));
    let archive = match &config.interview.archive_dir {
        Some(dir) => Some(Arc::new(TranscriptArchive::new(dir)?)),
        None => None,
    };

    let shared = EndpointShared {
        registry,
        store,
        generator,
        archive,
        bind_host: config.gateway.bind.clone(),
        timing: Timing::from_minutes(
            config.interview.duration_minutes,
            config.interview.warning_lead_minutes,
        ),
    };

    Ok(AppState {
        config: Arc::new(config),
        shared,
    })
}
