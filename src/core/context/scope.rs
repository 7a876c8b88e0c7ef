//! Utterance classification for context injection.

/// Interrogatives that mark an utterance as a question.
const QUESTION_WORDS: &[&str] = &[
    "what", "who", "where", "when", "how", "why", "tell me", "describe",
];

/// Default persona keywords. The assistant speaks as the persona, so
/// second-person phrasing refers to it.
pub const DEFAULT_PERSONA_KEYWORDS: &[&str] = &[
    "you",
    "your",
    "yourself",
    "what do you",
    "who are you",
    "tell me about you",
    "your skills",
    "your experience",
    "your background",
    "what are you",
    "where do you",
    "what can you",
];

/// Default phrases asking for the whole background document.
pub const DEFAULT_DETAIL_KEYWORDS: &[&str] = &[
    "full resume",
    "detailed resume",
    "full background",
    "work history",
    "tell me more about you",
    "more about you",
];

/// Decides whether a transcribed utterance concerns the persona.
#[derive(Debug, Clone)]
pub struct ScopeClassifier {
    persona_keywords: Vec<String>,
    detail_keywords: Vec<String>,
}

impl Default for ScopeClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_PERSONA_KEYWORDS.iter().map(|k| k.to_string()),
            DEFAULT_DETAIL_KEYWORDS.iter().map(|k| k.to_string()),
        )
    }
}

impl ScopeClassifier {
    /// Build a classifier from persona and detail-request keywords.
    ///
    /// Keywords are matched case-insensitively as substrings.
    pub fn new(
        persona_keywords: impl IntoIterator<Item = String>,
        detail_keywords: impl IntoIterator<Item = String>,
    ) -> Self {
        let normalize = |k: String| {
            let k = k.trim().to_lowercase();
            (!k.is_empty()).then_some(k)
        };

        Self {
            persona_keywords: persona_keywords.into_iter().filter_map(normalize).collect(),
            detail_keywords: detail_keywords.into_iter().filter_map(normalize).collect(),
        }
    }

    /// Add extra persona keywords, e.g. the persona's name.
    pub fn with_persona_keywords(mut self, keywords: impl IntoIterator<Item = String>) -> Self {
        self.persona_keywords.extend(
            keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        self
    }

    /// True when the utterance mentions the persona or is phrased as a question.
    pub fn is_in_scope(&self, utterance: &str) -> bool {
        if utterance.trim().is_empty() {
            return false;
        }

        let lower = utterance.to_lowercase();
        let mentions_persona = self.persona_keywords.iter().any(|k| lower.contains(k.as_str()));
        let is_question = QUESTION_WORDS.iter().any(|w| lower.contains(w));

        mentions_persona || is_question
    }

    /// True when the caller explicitly asks for the detailed background.
    pub fn requests_full_document(&self, utterance: &str) -> bool {
        let lower = utterance.to_lowercase();
        self.detail_keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_mentions_are_in_scope() {
        let classifier = ScopeClassifier::default();
        assert!(classifier.is_in_scope("I'd love to hear your background"));
        assert!(classifier.is_in_scope("Introduce yourself"));
    }

    #[test]
    fn test_questions_are_in_scope() {
        let classifier = ScopeClassifier::default();
        assert!(classifier.is_in_scope("Where is the nearest office?"));
        assert!(classifier.is_in_scope("Describe the project"));
    }

    #[test]
    fn test_statements_are_out_of_scope() {
        let classifier = ScopeClassifier::default();
        assert!(!classifier.is_in_scope("The weather is nice today"));
        assert!(!classifier.is_in_scope(""));
        assert!(!classifier.is_in_scope("   "));
    }

    #[test]
    fn test_custom_persona_keywords() {
        let classifier = ScopeClassifier::new(Vec::new(), Vec::new())
            .with_persona_keywords(vec!["  Ada Lovelace ".to_string(), String::new()]);
        assert!(classifier.is_in_scope("ada lovelace rocks"));
        assert!(!classifier.is_in_scope("nice to meet you"));
    }

    #[test]
    fn test_full_document_requests() {
        let classifier = ScopeClassifier::default();
        assert!(classifier.requests_full_document("Can I get your FULL RESUME please"));
        assert!(classifier.requests_full_document("tell me more about you"));
        assert!(!classifier.requests_full_document("what are your skills"));
    }
}
