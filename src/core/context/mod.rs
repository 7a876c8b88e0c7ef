//! Background context for the conversation.
//!
//! - `retrieval`: line-scoring keyword search over the background document
//! - `scope`: decides whether an utterance is about the persona
//! - `store`: the summary and full document shared by all sessions

mod retrieval;
mod scope;
mod store;

pub use retrieval::{
    FALLBACK_CHAR_LIMIT, MAX_EXCERPT_LINES, MAX_KEY_SECTION_LINES, query_terms, retrieve,
    truncated_corpus,
};
pub use scope::{DEFAULT_DETAIL_KEYWORDS, DEFAULT_PERSONA_KEYWORDS, ScopeClassifier};
pub use store::{ContextStore, FULL_DOCUMENT_PLACEHOLDER};
