// File: src/core/insights.rs
use crate::core::scorer::tag_log_odds;
use crate::core::types::Profile;
use serde::{Deserialize, Serialize};

const INTEREST_THRESHOLD: f64 = 0.5;
const TOP_TAGS: usize = 10;
const STRENGTH_DIVISOR: u64 = 2;
const MAX_STRENGTH: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagInsight {
    pub tag: String,
    /// Log-odds of the tag under the whole profile.
    pub score: f64,
    pub interactions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total_emails: u64,
    pub top_interests: Vec<TagInsight>,
    pub top_dislikes: Vec<TagInsight>,
    /// Saturating 0-100 measure of how much the profile has seen.
    pub profile_strength: u8,
}

/// Summarizes what the profile has learned.
///
/// Tags are ordered by `|log-odds| * ln(interactions + 1)`, so a strong
/// opinion backed by few swipes can rank below a milder, well-supported one.
pub fn insights(profile: &Profile) -> Insights {
    let mut weighted: Vec<(TagInsight, f64)> = profile
        .preferences
        .iter()
        .map(|(tag, counts)| {
            let score = tag_log_odds(profile, tag);
            let interactions = counts.total();
            let confidence = score.abs() * ((interactions + 1) as f64).ln();
            (
                TagInsight {
                    tag: tag.clone(),
                    score,
                    interactions,
                },
                confidence,
            )
        })
        .collect();

    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));

    let total_interactions: u64 = weighted.iter().map(|(t, _)| t.interactions).sum();
    let strength = (total_interactions / STRENGTH_DIVISOR).min(MAX_STRENGTH);

    let top_interests = weighted
        .iter()
        .filter(|(t, _)| t.score > INTEREST_THRESHOLD)
        .take(TOP_TAGS)
        .map(|(t, _)| t.clone())
        .collect();
    let top_dislikes = weighted
        .iter()
        .filter(|(t, _)| t.score < -INTEREST_THRESHOLD)
        .take(TOP_TAGS)
        .map(|(t, _)| t.clone())
        .collect();

    Insights {
        total_emails: profile.emails_processed,
        top_interests,
        top_dislikes,
        profile_strength: strength as u8,
    }
}
