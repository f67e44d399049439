//! Shared application state for the control-plane handlers.

use std::sync::Arc;

use iv_domain::config::Config;

use crate::endpoint::EndpointShared;

/// Cloned into every HTTP handler and endpoint task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub shared: EndpointShared,
}

impl AppState {
    pub fn registry(&self) -> &crate::endpoint::EndpointRegistry {
        &self.shared.registry
    }
}
