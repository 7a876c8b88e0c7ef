//! Keyword retrieval over a plain-text background document.
//!
//! The corpus is treated as a list of lines. Each line is scored against the
//! caller's transcript and the best lines are returned verbatim as an excerpt
//! that can be injected into the next generated response.
//!
//! Retrieval never fails: when nothing matches it degrades to the key
//! sections of the document, and finally to a truncated prefix of the corpus.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Maximum number of scored lines returned in an excerpt.
pub const MAX_EXCERPT_LINES: usize = 15;

/// Maximum number of lines collected by the key-section fallback.
pub const MAX_KEY_SECTION_LINES: usize = 10;

/// Length (in characters) of the truncated-corpus fallback.
pub const FALLBACK_CHAR_LIMIT: usize = 500;

/// Lines shorter than this (after trimming) are never scored.
const MIN_LINE_CHARS: usize = 5;

/// Query tokens shorter than this are discarded.
const MIN_TOKEN_CHARS: usize = 3;

/// Upper-case lines shorter than this are treated as section headers.
const MAX_HEADER_CHARS: usize = 50;

/// Content lines under a key section must be longer than this.
const MIN_SECTION_LINE_CHARS: usize = 10;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "is", "are", "was", "were", "what", "who", "where", "when", "how",
        "why", "tell", "me", "about", "you", "your", "yourself", "do", "does", "did",
    ]
    .into_iter()
    .collect()
});

/// Header names that mark a key section worth returning on a miss.
const KEY_SECTION_HEADERS: &[&str] = &["summary", "skill", "experience", "professional"];

/// Header names whose following lines are collected on a miss.
const KEY_SECTION_CONTENT: &[&str] = &["summary", "skill", "experience"];

/// Extract the significant lower-cased terms of a query.
///
/// Surrounding punctuation is trimmed from each whitespace-separated token so
/// that `"skills?"` and `"skills"` are the same term.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| {
            token.chars().count() >= MIN_TOKEN_CHARS && !STOP_WORDS.contains(*token)
        })
        .map(str::to_owned)
        .collect()
}

/// Whether a trimmed line looks like a section header.
fn is_section_header(line: &str) -> bool {
    line.ends_with(':') || (is_all_upper(line) && line.chars().count() < MAX_HEADER_CHARS)
}

/// At least one cased character and no lower-case ones.
fn is_all_upper(line: &str) -> bool {
    line.chars().any(char::is_uppercase) && !line.chars().any(char::is_lowercase)
}

/// Score a single trimmed corpus line against the query terms.
fn score_line(line: &str, terms: &[String]) -> u32 {
    let lower = line.to_lowercase();
    let padded = format!(" {lower} ");

    let mut score = 0;
    for term in terms {
        if !lower.contains(term.as_str()) {
            continue;
        }
        score += 1;

        let whole_word = padded.contains(&format!(" {term} "))
            || lower.starts_with(term.as_str())
            || lower.ends_with(term.as_str());
        if whole_word {
            score += 2;
        }
    }

    // header boost only applies to lines that already matched a term
    if score > 0 && is_section_header(line) {
        score += 1;
    }

    score
}

/// Return the first [`FALLBACK_CHAR_LIMIT`] characters of the corpus.
pub fn truncated_corpus(corpus: &str) -> String {
    corpus.chars().take(FALLBACK_CHAR_LIMIT).collect()
}

/// Collect key-section headers and the content lines beneath them.
fn key_sections(corpus: &str) -> Vec<&str> {
    let mut collected = Vec::new();
    let mut current_section: Option<String> = None;

    for line in corpus.lines() {
        let trimmed = line.trim();

        if is_section_header(trimmed) {
            let lower = trimmed.to_lowercase();
            if KEY_SECTION_HEADERS.iter().any(|k| lower.contains(k)) {
                collected.push(trimmed);
            }
            current_section = Some(lower);
            continue;
        }

        let in_key_section = current_section
            .as_deref()
            .is_some_and(|section| KEY_SECTION_CONTENT.iter().any(|k| section.contains(k)));

        if in_key_section && trimmed.chars().count() > MIN_SECTION_LINE_CHARS {
            collected.push(trimmed);
            if collected.len() >= MAX_KEY_SECTION_LINES {
                break;
            }
        }
    }

    collected.truncate(MAX_KEY_SECTION_LINES);
    collected
}

/// Retrieve the corpus lines most relevant to `query`.
///
/// Lines are returned trimmed, in descending score order (corpus order among
/// equal scores), at most [`MAX_EXCERPT_LINES`] of them, joined by `\n`.
pub fn retrieve(query: &str, corpus: &str) -> String {
    let terms = query_terms(query);
    if terms.is_empty() || corpus.trim().is_empty() {
        tracing::debug!("No usable query terms, returning truncated corpus");
        return truncated_corpus(corpus);
    }

    let mut scored: Vec<(u32, &str)> = corpus
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .filter_map(|line| {
            let score = score_line(line, &terms);
            (score > 0).then_some((score, line))
        })
        .collect();

    if !scored.is_empty() {
        // sort_by is stable, so ties keep corpus order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let lines: Vec<&str> = scored
            .into_iter()
            .take(MAX_EXCERPT_LINES)
            .map(|(_, line)| line)
            .collect();
        tracing::debug!(lines = lines.len(), "Found relevant context lines");
        return lines.join("\n");
    }

    let sections = key_sections(corpus);
    if !sections.is_empty() {
        tracing::debug!(
            lines = sections.len(),
            "No direct matches, returning key sections"
        );
        return sections.join("\n");
    }

    truncated_corpus(corpus)
}
