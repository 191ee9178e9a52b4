//! Comment segmentation: sentences, then clauses.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clause boundaries: the words "but" and "and", and commas.
static CLAUSE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bbut\b|\band\b|,").unwrap());

/// Split text into sentences.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace, or at a line
/// break. Sentences are trimmed; empty ones are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let end = if b == b'\n' {
            Some(i)
        } else if (b == b'.' || b == b'!' || b == b'?')
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_whitespace()
        {
            Some(i + 1)
        } else {
            None
        };
        if let Some(end) = end {
            let s = text[start..end].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = i + 1;
        }
    }
    let s = text[start..].trim();
    if !s.is_empty() {
        sentences.push(s);
    }
    sentences
}

/// Split one sentence into raw clause fragments. Fragments are returned
/// untrimmed and may be empty.
pub fn split_clauses(sentence: &str) -> Vec<&str> {
    CLAUSE_BOUNDARY.split(sentence).collect()
}

/// Full segmentation: every non-empty, trimmed clause of every sentence.
pub fn segment(text: &str) -> Vec<&str> {
    split_sentences(text)
        .into_iter()
        .flat_map(split_clauses)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}
