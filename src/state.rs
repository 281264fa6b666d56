//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::bhap::{BhapService, BhapStore};
use crate::config::BhapConfig;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// BHAP workflow over the configured store
    pub bhaps: BhapService,

    pub bhap_config: BhapConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn BhapStore>, bhap_config: BhapConfig) -> Self {
        Self {
            bhaps: BhapService::new(store),
            bhap_config,
        }
    }

    pub fn store(&self) -> &Arc<dyn BhapStore> {
        self.bhaps.store()
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
