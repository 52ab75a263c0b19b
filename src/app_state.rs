//! Application State Management
//!
//! This module provides the application state that contains the connected
//! store and its configuration, following the dependency injection pattern:
//! the backend handle is constructed exactly once at startup and injected
//! into every handler.

use std::sync::Arc;

use log::info;

use crate::backend::mock_store::MockChunkBackend;
use crate::config::AppConfig;
use crate::store::{GridStore, DEFAULT_BUCKET};

/// Application state containing the connected object store
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GridStore>,
    pub config: AppConfig,
}

impl AppState {
    /// Create a new application state with the store configured from YAML
    /// config
    pub fn new() -> Self {
        let config = AppConfig::load().expect("Failed to load configuration");
        Self::from_config(config)
    }

    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> Self {
        info!("Initializing application state with configuration");
        let store = GridStore::connect(&config.store).expect("Failed to connect chunk store");
        info!("Application state initialized successfully");
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Create application state for testing with the mock backend
    pub fn new_for_testing() -> Self {
        let config = AppConfig::default();
        let store = GridStore::with_backend(Arc::new(MockChunkBackend::new()), DEFAULT_BUCKET);
        Self {
            store: Arc::new(store),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_for_testing_uses_default_bucket() {
        let state = AppState::new_for_testing();
        assert_eq!(state.store.bucket(), DEFAULT_BUCKET);
        assert_eq!(state.config.store.bucket, DEFAULT_BUCKET);
    }
}
