//! Explicitly constructed process context.
//!
//! [`AppContext`] is built once in `main` and passed by reference into
//! audio capture, the recognition session and the orchestrator.  It replaces
//! any ambient global: the configuration snapshot and the one shared
//! [`StatusIndicator`] both live here.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::indicator::{LogIndicator, StatusIndicator};

/// Configuration snapshot plus shared collaborators.  Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub indicator: Arc<dyn StatusIndicator>,
}

impl AppContext {
    pub fn new(config: AppConfig, indicator: Arc<dyn StatusIndicator>) -> Self {
        Self { config, indicator }
    }

    /// Default configuration with a logging indicator.
    pub fn with_defaults() -> Self {
        Self::new(AppConfig::default(), Arc::new(LogIndicator))
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppContext>();
    }

    #[test]
    fn clones_share_the_indicator() {
        let ctx = AppContext::with_defaults();
        let other = ctx.clone();
        assert!(Arc::ptr_eq(&ctx.indicator, &other.indicator));
    }
}
