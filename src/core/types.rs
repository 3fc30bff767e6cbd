// src/core/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::core::ranking::Rankable;
use crate::error::PrefsError;

/// Per-tag swipe counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCounts {
    pub good: u64,
    pub bad: u64,
}

impl TagCounts {
    pub fn total(&self) -> u64 {
        self.good + self.bad
    }
}

/// Learned tag statistics, keyed by normalized tag.
pub type Preferences = BTreeMap<String, TagCounts>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "1.0")]
    V1,
    #[serde(rename = "2.0")]
    V2,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion::V2;

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1 => "1.0",
            SchemaVersion::V2 => "2.0",
        }
    }
}

/// The durable per-user preference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub total_good: u64,
    #[serde(default)]
    pub total_bad: u64,
    /// Every tag ever observed for this user.
    #[serde(default)]
    pub vocabulary: BTreeSet<String>,
    #[serde(default)]
    pub emails_processed: u64,
    pub version: SchemaVersion,
    pub last_updated: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            preferences: Preferences::new(),
            total_good: 0,
            total_bad: 0,
            vocabulary: BTreeSet::new(),
            emails_processed: 0,
            version: SchemaVersion::CURRENT,
            last_updated: Utc::now(),
        }
    }

    /// Counters for `tag`, zero if it was never observed.
    pub fn tag_counts(&self, tag: &str) -> TagCounts {
        self.preferences.get(tag).copied().unwrap_or_default()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn has_observations(&self) -> bool {
        self.total_good > 0 || self.total_bad > 0
    }

    /// Checks the running totals and vocabulary against the per-tag counters.
    pub fn is_consistent(&self) -> bool {
        let good: u64 = self.preferences.values().map(|c| c.good).sum();
        let bad: u64 = self.preferences.values().map(|c| c.bad).sum();
        good == self.total_good
            && bad == self.total_bad
            && self.preferences.keys().all(|tag| self.vocabulary.contains(tag))
    }

    /// Recomputes the class totals from the per-tag counters and adds every
    /// counted tag to the vocabulary. Returns true if anything changed.
    pub fn repair(&mut self) -> bool {
        if self.is_consistent() {
            return false;
        }
        self.total_good = self.preferences.values().map(|c| c.good).sum();
        self.total_bad = self.preferences.values().map(|c| c.bad).sum();
        self.vocabulary.extend(self.preferences.keys().cloned());
        true
    }
}

/// Per-tag counters of a `"1.0"` record: `right` was interested, `left` was not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCounts {
    #[serde(default)]
    pub right: u64,
    #[serde(default)]
    pub left: u64,
}

/// A record written before tag totals and vocabulary were tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProfile {
    pub user_id: String,
    #[serde(default)]
    pub preferences: BTreeMap<String, LegacyCounts>,
    #[serde(default)]
    pub emails_processed: u64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Binary swipe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "interested", alias = "right", alias = "good")]
    Good,
    #[serde(rename = "not_interested", alias = "left", alias = "bad")]
    Bad,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Good => write!(f, "interested"),
            Outcome::Bad => write!(f, "not_interested"),
        }
    }
}

impl FromStr for Outcome {
    type Err = PrefsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interested" | "right" | "good" => Ok(Outcome::Good),
            "not_interested" | "left" | "bad" => Ok(Outcome::Bad),
            other => Err(PrefsError::InvalidInput(format!(
                "outcome must be interested or not_interested, got '{}'",
                other
            ))),
        }
    }
}

/// Mail providers send `internalDate` as epoch millis, sometimes quoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InternalDate {
    Millis(i64),
    Text(String),
}

impl InternalDate {
    pub fn millis(&self) -> Option<i64> {
        match self {
            InternalDate::Millis(ms) => Some(*ms),
            InternalDate::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// An email as the client sends it for ranking.
///
/// Fields the engine does not know about are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, alias = "_tokens")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_date: Option<InternalDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmailItem {
    /// Body text for tag extraction, falling back to the snippet.
    pub fn text(&self) -> &str {
        self.body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .or(self.snippet.as_deref())
            .unwrap_or("")
    }
}

impl Rankable for EmailItem {
    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn timestamp_millis(&self) -> i64 {
        if let Some(ms) = self.internal_date.as_ref().and_then(InternalDate::millis) {
            return ms;
        }
        self.date
            .as_deref()
            .and_then(|d| {
                DateTime::parse_from_rfc2822(d.trim())
                    .or_else(|_| DateTime::parse_from_rfc3339(d.trim()))
                    .ok()
            })
            .map(|d| d.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Lowercases and trims a tag; `None` if nothing is left.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// Normalizes every tag, dropping blanks but keeping repeats.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    tags.iter().filter_map(|t| normalize_tag(t.as_ref())).collect()
}
