//! Report section helpers

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use super::entities::{Analyst, Interview};

/// Sections shorter than this (after trimming) are flagged as low quality
pub const MIN_SECTION_LEN: usize = 100;

// `[n] text` up to the next bracket or newline
const CITATION_PATTERN: &str = r"\[(\d+)\]\s*([^\n\[]+)";

fn citation_regex() -> Option<&'static Regex> {
    static CITATION: OnceLock<Option<Regex>> = OnceLock::new();
    CITATION
        .get_or_init(|| match Regex::new(CITATION_PATTERN) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(error = %e, "Citation pattern failed to compile");
                None
            }
        })
        .as_ref()
}

/// Extract citation texts from `[n] Source` markers.
///
/// Several citations on one line are captured one by one since each
/// capture stops at the next `[`.
pub fn extract_sources(content: &str) -> Vec<String> {
    let Some(re) = citation_regex() else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Long enough and carries at least one markdown header line
pub fn validate_section_content(content: &str) -> bool {
    if content.trim().chars().count() < MIN_SECTION_LEN {
        return false;
    }
    content.lines().any(|line| line.starts_with('#'))
}

pub fn section_title(analyst: &Analyst, topic: &str) -> String {
    if analyst.role.trim().is_empty() {
        format!("{}'s Analysis of {}", analyst.name, topic)
    } else {
        format!("{} Perspective on {}", analyst.role, topic)
    }
}

/// Longest prefix of `text` with at most `max_chars` characters
pub(crate) fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Writer input: gathered context documents, or the transcript when the
/// interview found none
pub fn section_context(interview: &Interview) -> String {
    if interview.context_documents.is_empty() {
        interview.transcript.clone()
    } else {
        interview.context_documents.join("\n\n")
    }
}
