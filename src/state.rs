//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::context::{ContextStore, ScopeClassifier};

/// State shared by every request handler.
///
/// The background document is loaded once here; sessions only read it.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub context: Arc<ContextStore>,
    pub classifier: ScopeClassifier,
}

impl AppState {
    /// Build the state, loading the background document from disk.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let context = ContextStore::load(
            config.context_summary.clone(),
            config.context_path.as_deref(),
        );
        Self::with_context(config, context)
    }

    /// Build the state around an already loaded context store.
    pub fn with_context(config: ServerConfig, context: ContextStore) -> Arc<Self> {
        let classifier =
            ScopeClassifier::default().with_persona_keywords(config.persona_keywords.iter().cloned());

        tracing::info!(
            model = %config.model,
            context_loaded = context.has_full_document(),
            injection_mode = %config.injection_mode,
            "Application state initialized"
        );

        Arc::new(Self {
            config,
            context: Arc::new(context),
            classifier,
        })
    }
}
