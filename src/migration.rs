// File: src/migration.rs
//! Schema migration for stored profiles.
//!
//! `"1.0"` records kept `{right, left}` counters per tag and nothing else.
//! `"2.0"` adds class totals and the vocabulary. Migration is a pure
//! function; the store decides when to write the result back.

use crate::core::types::{LegacyProfile, Preferences, Profile, SchemaVersion, TagCounts};
use crate::error::{PrefsError, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

/// Rewrites a legacy record into the current shape.
pub fn migrate_v1(legacy: LegacyProfile) -> Profile {
    let mut profile = Profile::new(&legacy.user_id);

    let mut preferences = Preferences::new();
    for (tag, counts) in legacy.preferences {
        preferences.insert(
            tag,
            TagCounts {
                good: counts.right,
                bad: counts.left,
            },
        );
    }

    profile.total_good = preferences.values().map(|c| c.good).sum();
    profile.total_bad = preferences.values().map(|c| c.bad).sum();
    profile.vocabulary = preferences.keys().cloned().collect();
    profile.preferences = preferences;
    profile.emails_processed = legacy.emails_processed;
    profile.last_updated = legacy.last_updated.unwrap_or_else(Utc::now);
    profile.version = SchemaVersion::V2;
    profile
}

/// How a decoded record relates to what is on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Already current and consistent.
    Current,
    /// Converted from `"1.0"`; the stored file is still in the old shape.
    Migrated,
    /// A `"2.0"` record whose totals or vocabulary disagreed with its
    /// counters; they were recomputed in memory.
    Repaired,
}

/// Decodes a stored record of any known version.
///
/// A record without a `version` field is treated as `"1.0"`. A `"2.0"`
/// record with inconsistent totals is repaired rather than trusted.
pub fn decode_record(value: Value) -> Result<(Profile, RecordState)> {
    let version = match value.get("version") {
        None | Some(Value::Null) => SchemaVersion::V1.as_str().to_string(),
        Some(Value::String(v)) => v.clone(),
        Some(other) => other.to_string(),
    };

    match version.as_str() {
        "2.0" => {
            let mut profile: Profile = serde_json::from_value(value)?;
            if profile.repair() {
                warn!(
                    user_id = %profile.user_id,
                    total_good = profile.total_good,
                    total_bad = profile.total_bad,
                    "Stored totals did not match tag counters, recomputed them"
                );
                return Ok((profile, RecordState::Repaired));
            }
            Ok((profile, RecordState::Current))
        }
        "1.0" => {
            let legacy: LegacyProfile = serde_json::from_value(value)?;
            Ok((migrate_v1(legacy), RecordState::Migrated))
        }
        _ => Err(PrefsError::UnsupportedVersion(version)),
    }
}
