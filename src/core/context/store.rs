//! Background text available to a session.

use std::path::{Path, PathBuf};

/// Returned as the full document when no background file is available.
pub const FULL_DOCUMENT_PLACEHOLDER: &str =
    "Full background document not available. Please contact for detailed information.";

/// Holds the short summary and the full background document.
///
/// The store is loaded once at startup and shared read-only by every
/// session, so retrieval never touches the filesystem on the hot path.
#[derive(Debug, Clone)]
pub struct ContextStore {
    summary: String,
    full: Option<String>,
    source: Option<PathBuf>,
}

impl ContextStore {
    /// Build a store from in-memory text.
    pub fn new(summary: impl Into<String>, full: Option<String>) -> Self {
        Self {
            summary: summary.into().trim().to_string(),
            full: full
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            source: None,
        }
    }

    /// Build a store, reading the full document from `path` when given.
    ///
    /// A missing or unreadable file is not an error: the store falls back to
    /// [`FULL_DOCUMENT_PLACEHOLDER`] and logs a warning.
    pub fn load(summary: impl Into<String>, path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::new(summary, None);
        };

        let full = match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::info!(
                    path = %path.display(),
                    bytes = text.len(),
                    "Loaded background document"
                );
                Some(text)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Background document unavailable, using placeholder"
                );
                None
            }
        };

        let mut store = Self::new(summary, full);
        store.source = Some(path.to_path_buf());
        store
    }

    /// Short summary used in the session instructions.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Full background document, or the placeholder text.
    pub fn full_document(&self) -> &str {
        self.full.as_deref().unwrap_or(FULL_DOCUMENT_PLACEHOLDER)
    }

    /// Whether a real document (not the placeholder) is loaded.
    pub fn has_full_document(&self) -> bool {
        self.full.is_some()
    }

    /// Path the document was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(String::new(), None)
    }
}
