use std::sync::Arc;

use crate::config::Config;
use crate::services::diagnostics::DiagnosticsRegistry;
use crate::store::QuizStore;
use axum::extract::FromRef;

/// Explicit application context handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuizStore>,
    pub config: Config,
    pub diagnostics: Arc<DiagnosticsRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn QuizStore>, config: Config) -> Self {
        let diagnostics = Arc::new(DiagnosticsRegistry::new(config.error_log_capacity));
        Self {
            store,
            config,
            diagnostics,
        }
    }
}

impl FromRef<AppState> for Arc<dyn QuizStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<DiagnosticsRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.diagnostics.clone()
    }
}
