//! Boundary to the tag extractor.
//!
//! The real extractor is an external, usually LLM-backed service that turns
//! an email into a handful of category tags. This module defines the trait it
//! implements, cleans what goes in and what comes out, and falls back to a
//! local keyword scan whenever the upstream fails.

pub mod cache;
pub mod keywords;

pub use cache::{CacheKey, TagCache};
pub use keywords::KeywordExtractor;

use crate::core::types::normalize_tag;
use crate::error::Result;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const MAX_SUBJECT_CHARS: usize = 200;
pub const MAX_BODY_CHARS: usize = 1500;
const MAX_TAGS: usize = 12;
const MAX_TAG_CHARS: usize = 50;
const MAX_SALVAGED_WORDS: usize = 8;

/// An upstream tag source that may fail.
pub trait TokenExtractor: Send + Sync {
    fn extract_tags(&self, subject: &str, body: &str) -> Result<Vec<String>>;
}

/// Placeholder upstream for engines that only use the keyword scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUpstream;

impl TokenExtractor for NoUpstream {
    fn extract_tags(&self, subject: &str, body: &str) -> Result<Vec<String>> {
        Ok(KeywordExtractor::new().extract(subject, body))
    }
}

/// Upstream backed by a text-completion call. The call gets the cleaned
/// subject and body and returns the model's raw reply, which is parsed with
/// [`parse_tag_response`].
pub struct ReplyExtractor<F> {
    call: F,
}

impl<F> ReplyExtractor<F>
where
    F: Fn(&str, &str) -> Result<String> + Send + Sync,
{
    pub fn new(call: F) -> Self {
        Self { call }
    }
}

impl<F> TokenExtractor for ReplyExtractor<F>
where
    F: Fn(&str, &str) -> Result<String> + Send + Sync,
{
    fn extract_tags(&self, subject: &str, body: &str) -> Result<Vec<String>> {
        let reply = (self.call)(subject, body)?;
        Ok(parse_tag_response(&reply))
    }
}

/// Wraps an optional upstream extractor so that extraction never fails.
pub struct FallbackExtractor<E> {
    upstream: Option<E>,
    keywords: KeywordExtractor,
}

impl<E: TokenExtractor> FallbackExtractor<E> {
    pub fn new(upstream: E) -> Self {
        Self {
            upstream: Some(upstream),
            keywords: KeywordExtractor::new(),
        }
    }

    pub fn keywords_only() -> Self {
        Self {
            upstream: None,
            keywords: KeywordExtractor::new(),
        }
    }

    /// Tags for an email. Empty input gives `[]`; an upstream error gives
    /// the keyword scan's tags.
    pub fn extract(&self, subject: &str, body: &str) -> Vec<String> {
        let subject = clean_text(subject, MAX_SUBJECT_CHARS);
        let body = clean_text(body, MAX_BODY_CHARS);
        if subject.is_empty() && body.is_empty() {
            return Vec::new();
        }

        let Some(upstream) = &self.upstream else {
            return self.keywords.extract(&subject, &body);
        };

        match upstream.extract_tags(&subject, &body) {
            Ok(raw) => {
                let tags = normalize_upstream_tags(raw);
                debug!(tags = ?tags, "Extracted tags");
                tags
            }
            Err(e) => {
                warn!(error = %e, "Tag extractor failed, using keyword scan");
                self.keywords.extract(&subject, &body)
            }
        }
    }
}

/// Lowercases, trims, drops blank or overlong tags and duplicates, keeps at
/// most twelve.
pub fn normalize_upstream_tags(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|t| normalize_tag(&t))
        .filter(|t| t.chars().count() < MAX_TAG_CHARS)
        .filter(|t| seen.insert(t.clone()))
        .take(MAX_TAGS)
        .collect()
}

/// Parses an extractor reply that should be a JSON array of strings.
///
/// Malformed replies are salvaged by taking up to eight distinct lowercase
/// words of 3 to 20 letters.
pub fn parse_tag_response(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => normalize_upstream_tags(
            values
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        Err(_) => {
            warn!(response = raw, "Extractor reply was not a JSON array, salvaging words");
            salvage_words(raw)
        }
    }
}

fn salvage_words(raw: &str) -> Vec<String> {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    let re = WORD_RE.get_or_init(|| Regex::new(r"\b[a-z]{3,20}\b").expect("valid word regex"));

    let lower = raw.to_lowercase();
    let mut seen = HashSet::new();
    re.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|w| seen.insert(w.clone()))
        .take(MAX_SALVAGED_WORDS)
        .collect()
}

/// Collapses whitespace, strips angle brackets, truncates to `max_chars`.
pub fn clean_text(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(max_chars)
        .collect()
}
