// File: src/core/ranking.rs
use crate::core::scorer::email_score;
use crate::core::types::Profile;
use crate::error::PrefsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::str::FromStr;

/// Anything the ranking engine can order. Only tags and recency are read.
pub trait Rankable {
    fn tags(&self) -> &[String];

    /// Milliseconds since the epoch, `0` when unknown.
    fn timestamp_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankMode {
    /// Preference score first, recency breaks ties.
    #[default]
    #[serde(rename = "smart")]
    Smart,
    /// Most recent first; scores are attached but ignored.
    #[serde(rename = "unread", alias = "recency")]
    Recency,
}

impl FromStr for RankMode {
    type Err = PrefsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smart" => Ok(RankMode::Smart),
            "unread" | "recency" => Ok(RankMode::Recency),
            other => Err(PrefsError::InvalidInput(format!(
                "mode must be smart or unread, got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankOptions {
    pub mode: RankMode,
    /// Drop items whose known timestamp is older than this.
    pub since: Option<DateTime<Utc>>,
}

impl RankOptions {
    pub fn new(mode: RankMode) -> Self {
        Self { mode, since: None }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

/// An item annotated with its preference score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranked<T> {
    #[serde(flatten)]
    pub item: T,
    /// `preference_score_percent / 100`
    pub preference_score: f64,
    pub preference_score_percent: u8,
}

/// Scores every item against `profile` and orders them by `options.mode`.
///
/// Scores within 0.01 of each other count as tied. Scores are whole
/// percentages, so that is the same as comparing percents, which keeps the
/// ordering total. Remaining ties keep input order.
pub fn rank<T: Rankable>(profile: &Profile, items: Vec<T>, options: &RankOptions) -> Vec<Ranked<T>> {
    let since = options.since.map(|s| s.timestamp_millis());

    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .filter(|item| match since {
            Some(cutoff) => {
                let ts = item.timestamp_millis();
                ts == 0 || ts >= cutoff
            }
            None => true,
        })
        .map(|item| {
            let percent = email_score(profile, item.tags());
            Ranked {
                item,
                preference_score: f64::from(percent) / 100.0,
                preference_score_percent: percent,
            }
        })
        .collect();

    match options.mode {
        RankMode::Recency => {
            ranked.sort_by_key(|r| Reverse(r.item.timestamp_millis()));
        }
        RankMode::Smart => {
            ranked.sort_by_key(|r| {
                (
                    Reverse(r.preference_score_percent),
                    Reverse(r.item.timestamp_millis()),
                )
            });
        }
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Outcome;
    use crate::learning::PreferenceUpdater;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        tags: Vec<String>,
        ts: i64,
    }

    impl Item {
        fn new(name: &'static str, tags: &[&str], ts: i64) -> Self {
            Self {
                name,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ts,
            }
        }
    }

    impl Rankable for Item {
        fn tags(&self) -> &[String] {
            &self.tags
        }
        fn timestamp_millis(&self) -> i64 {
            self.ts
        }
    }

    fn trained() -> Profile {
        let updater = PreferenceUpdater::new();
        let mut p = Profile::new("ranker");
        for _ in 0..4 {
            updater.apply(&mut p, &["rust"], Outcome::Good).unwrap();
            updater.apply(&mut p, &["spam"], Outcome::Bad).unwrap();
        }
        updater.apply(&mut p, &["news"], Outcome::Good).unwrap();
        p
    }

    fn names(ranked: &[Ranked<Item>]) -> Vec<&'static str> {
        ranked.iter().map(|r| r.item.name).collect()
    }

    #[test]
    fn smart_orders_by_descending_score() {
        let profile = trained();
        let items = vec![
            Item::new("spam", &["spam"], 300),
            Item::new("rust", &["rust"], 100),
            Item::new("plain", &["other"], 200),
        ];
        let ranked = rank(&profile, items, &RankOptions::new(RankMode::Smart));
        assert_eq!(names(&ranked), vec!["rust", "plain", "spam"]);
        for pair in ranked.windows(2) {
            assert!(pair[0].preference_score > pair[1].preference_score);
        }
    }

    #[test]
    fn smart_ties_break_by_recency() {
        let profile = trained();
        let items = vec![
            Item::new("old", &["rust"], 100),
            Item::new("new", &["rust"], 900),
            Item::new("mid", &["RUST"], 500),
        ];
        let ranked = rank(&profile, items, &RankOptions::new(RankMode::Smart));
        assert_eq!(names(&ranked), vec!["new", "mid", "old"]);
    }

    #[test]
    fn recency_ignores_scores_but_attaches_them() {
        let profile = trained();
        let items = vec![
            Item::new("rust", &["rust"], 100),
            Item::new("undated", &["rust"], 0),
            Item::new("spam", &["spam"], 300),
        ];
        let ranked = rank(&profile, items, &RankOptions::new(RankMode::Recency));
        assert_eq!(names(&ranked), vec!["spam", "rust", "undated"]);
        assert!(ranked[0].preference_score_percent < 50);
        assert!(ranked[1].preference_score_percent > 50);
    }

    #[test]
    fn empty_profile_ranks_by_recency_in_smart_mode() {
        let profile = Profile::new("nobody");
        let items = vec![Item::new("a", &["x"], 1), Item::new("b", &["y"], 2)];
        let ranked = rank(&profile, items, &RankOptions::new(RankMode::Smart));
        assert_eq!(names(&ranked), vec!["b", "a"]);
        assert!(ranked.iter().all(|r| r.preference_score_percent == 50));
        assert!(ranked.iter().all(|r| r.preference_score == 0.5));
    }

    #[test]
    fn window_drops_old_dated_items() {
        let profile = Profile::new("nobody");
        let cutoff = DateTime::<Utc>::from_timestamp_millis(1_000).unwrap();
        let items = vec![
            Item::new("old", &["x"], 500),
            Item::new("fresh", &["x"], 1_500),
            Item::new("undated", &["x"], 0),
        ];
        let ranked = rank(&profile, items, &RankOptions::new(RankMode::Recency).since(cutoff));
        assert_eq!(names(&ranked), vec!["fresh", "undated"]);
    }

    #[test]
    fn items_pass_through_unchanged() {
        let profile = trained();
        let original = Item::new("rust", &["rust", "Jobs"], 42);
        let ranked = rank(&profile, vec![original.clone()], &RankOptions::default());
        assert_eq!(ranked[0].item, original);
    }

    #[test]
    fn mode_wire_names() {
        let smart: RankMode = serde_json::from_str("\"smart\"").unwrap();
        let unread: RankMode = serde_json::from_str("\"unread\"").unwrap();
        let recency: RankMode = serde_json::from_str("\"recency\"").unwrap();
        assert_eq!(smart, RankMode::Smart);
        assert_eq!(unread, RankMode::Recency);
        assert_eq!(recency, RankMode::Recency);
        assert_eq!("Unread".parse::<RankMode>().unwrap(), RankMode::Recency);
        assert!("newest".parse::<RankMode>().is_err());
    }
}
