//! Token-bounded text fragmentation
//!
//! Splits document text into fragments sized for the embedding model while:
//! - Respecting Markdown heading hierarchy (H1-H4) for fragment titles
//! - Breaking on structural boundaries (headings, paragraphs) first
//! - Falling back to sentence boundaries only when a section overflows
//! - Never cutting a sentence in half; a single over-budget sentence
//!   passes through unsplit
//!
//! Fragments come out in source order and are never empty. Heading lines are
//! lifted into fragment titles; all other non-whitespace content is preserved
//! across the concatenation of fragment texts.

mod tokens;

pub use tokens::*;

use regex::Regex;
use std::sync::OnceLock;

/// A bounded slice of a document's text, ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Order within the parent document (stable, zero-based)
    pub index: usize,

    /// Nearest enclosing heading hierarchy, joined as `"H1 > H2 > H3"`
    pub heading: Option<String>,

    /// The slice content, within the configured token budget
    pub text: String,
}

fn heading_regex() -> &'static Regex {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| Regex::new(r"^(#{1,4})\s+(.*)").expect("valid heading regex"))
}

/// Split text into token-bounded fragments.
///
/// Empty or whitespace-only input yields an empty Vec; the caller decides
/// whether that means there is nothing to train.
pub fn split_into_fragments(text: &str, max_tokens: usize) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut hierarchy: Vec<String> = Vec::new();
    let mut section: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(captures) = heading_regex().captures(trimmed) {
            flush_section(&mut fragments, &hierarchy, &mut section, max_tokens);

            let level = captures[1].len();
            let title = captures[2].trim().to_string();

            // Entering a heading drops every deeper level of the hierarchy
            hierarchy.truncate(level - 1);
            hierarchy.resize(level - 1, String::new());
            hierarchy.push(title);
            continue;
        }

        section.push(trimmed);
    }

    flush_section(&mut fragments, &hierarchy, &mut section, max_tokens);
    fragments
}

fn build_title(hierarchy: &[String]) -> Option<String> {
    let joined = hierarchy
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" > ");

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn flush_section(
    fragments: &mut Vec<Fragment>,
    hierarchy: &[String],
    section: &mut Vec<&str>,
    max_tokens: usize,
) {
    let full_text = section.join("\n").trim().to_string();
    section.clear();

    if full_text.is_empty() {
        return;
    }

    let heading = build_title(hierarchy);

    if estimate_tokens(&full_text) <= max_tokens {
        push_fragment(fragments, heading, full_text);
    } else {
        for part in split_by_token_limit(&full_text, max_tokens) {
            push_fragment(fragments, heading.clone(), part);
        }
    }
}

fn push_fragment(fragments: &mut Vec<Fragment>, heading: Option<String>, text: String) {
    let index = fragments.len();
    fragments.push(Fragment {
        index,
        heading,
        text,
    });
}

/// Subdivide an over-budget section at sentence boundaries.
///
/// Sentences accumulate into a buffer until adding the next one would
/// overflow the budget. A single sentence that alone exceeds the budget is
/// emitted unsplit.
fn split_by_token_limit(text: &str, max_tokens: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buffer = String::new();

    for sentence in split_sentences(text) {
        let tentative = if buffer.is_empty() {
            sentence.to_string()
        } else {
            format!("{} {}", buffer, sentence)
        };

        if estimate_tokens(&tentative) <= max_tokens {
            buffer = tentative;
        } else {
            if !buffer.trim().is_empty() {
                parts.push(buffer.trim().to_string());
            }
            buffer = sentence.to_string();
        }
    }

    if !buffer.trim().is_empty() {
        parts.push(buffer.trim().to_string());
    }

    parts
}

/// Split text into sentences, keeping terminal punctuation with each one.
///
/// A boundary is a run of `.`, `?` or `!` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut after_terminator = false;

    for (pos, ch) in text.char_indices() {
        if after_terminator && ch.is_whitespace() {
            let sentence = text[start..pos].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = pos;
            after_terminator = false;
        } else {
            after_terminator = matches!(ch, '.' | '?' | '!');
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}
