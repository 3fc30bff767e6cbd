// File: src/core/scorer.rs
//! Naive Bayes scoring over a profile's tag counters.
//!
//! All functions here are pure. A tag's weight is its smoothed log-odds
//! `ln(P(tag|good) / P(tag|bad))`, and an item's score is the logistic of the
//! summed weights, expressed as a 0-100 percentage.

use crate::core::types::{normalize_tag, Profile, TagCounts};

/// Laplace (add-one) smoothing constant.
pub const ALPHA: f64 = 1.0;

/// Score returned when there is nothing to condition on.
pub const NEUTRAL_SCORE: u8 = 50;

/// Smoothed log-odds of a tag given its counters and the class totals.
pub fn log_odds(
    counts: TagCounts,
    total_good: u64,
    total_bad: u64,
    vocabulary_size: usize,
) -> f64 {
    let v = vocabulary_size as f64;
    let p_good = (counts.good as f64 + ALPHA) / (total_good as f64 + ALPHA * v);
    let p_bad = (counts.bad as f64 + ALPHA) / (total_bad as f64 + ALPHA * v);
    (p_good / p_bad).ln()
}

/// Log-odds of `tag` under `profile`. Unknown tags count as `{0, 0}`.
pub fn tag_log_odds(profile: &Profile, tag: &str) -> f64 {
    log_odds(
        profile.tag_counts(tag),
        profile.total_good,
        profile.total_bad,
        profile.vocabulary_size(),
    )
}

/// Summed log-odds of the normalized tags, accumulated left to right.
pub fn raw_score<S: AsRef<str>>(profile: &Profile, tags: &[S]) -> f64 {
    let mut sum = 0.0;
    for tag in tags {
        if let Some(tag) = normalize_tag(tag.as_ref()) {
            sum += tag_log_odds(profile, &tag);
        }
    }
    sum
}

/// Preference score in `[0, 100]` for an item carrying `tags`.
pub fn email_score<S: AsRef<str>>(profile: &Profile, tags: &[S]) -> u8 {
    if !profile.has_observations() {
        return NEUTRAL_SCORE;
    }
    if tags.iter().all(|t| normalize_tag(t.as_ref()).is_none()) {
        return NEUTRAL_SCORE;
    }

    let raw = raw_score(profile, tags);
    let probability = 1.0 / (1.0 + (-raw).exp());
    (probability * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Outcome;
    use crate::learning::PreferenceUpdater;

    fn profile_with(swipes: &[(&[&str], Outcome)]) -> Profile {
        let updater = PreferenceUpdater::new();
        let mut profile = Profile::new("test");
        for &(tags, outcome) in swipes {
            updater.apply(&mut profile, tags, outcome).unwrap();
        }
        profile
    }

    #[test]
    fn empty_profile_is_neutral() {
        let profile = Profile::new("test");
        assert_eq!(email_score(&profile, &["sports", "news"]), 50);
    }

    #[test]
    fn empty_tags_are_neutral() {
        let profile = profile_with(&[(&["sports"], Outcome::Good), (&["ads"], Outcome::Bad)]);
        let none: [&str; 0] = [];
        assert_eq!(email_score(&profile, &none), 50);
        assert_eq!(email_score(&profile, &["  "]), 50);
    }

    #[test]
    fn single_good_swipe_matches_formula() {
        // totalGood = 2, totalBad = 0, V = 2
        let profile = profile_with(&[(&["sports", "news"], Outcome::Good)]);

        // sports: pGood = 2/4, pBad = 1/2 -> ln(1) = 0
        assert_eq!(tag_log_odds(&profile, "sports"), 0.0);
        assert_eq!(email_score(&profile, &["sports"]), 50);

        // finance: pGood = 1/4, pBad = 1/2 -> ln(0.5); logistic gives 1/3
        let finance = tag_log_odds(&profile, "finance");
        assert!((finance - 0.5f64.ln()).abs() < 1e-12);
        assert_eq!(email_score(&profile, &["finance"]), 33);

        assert!(email_score(&profile, &["sports"]) > email_score(&profile, &["finance"]));
    }

    #[test]
    fn good_only_tag_scores_above_neutral_once_bad_mass_exists() {
        let profile = profile_with(&[
            (&["sports", "news"], Outcome::Good),
            (&["finance"], Outcome::Bad),
        ]);
        assert!(tag_log_odds(&profile, "sports") > 0.0);
        assert!(tag_log_odds(&profile, "finance") < 0.0);
        assert!(email_score(&profile, &["sports"]) > 50);
        assert!(email_score(&profile, &["finance"]) < 50);
    }

    #[test]
    fn unseen_tags_still_contribute() {
        let profile = profile_with(&[(&["a", "b", "c"], Outcome::Good), (&["d"], Outcome::Bad)]);
        let unseen = tag_log_odds(&profile, "never-seen");
        assert!(unseen.is_finite());
        assert!(unseen != 0.0);
    }

    #[test]
    fn one_sided_totals_stay_finite() {
        let good_only = profile_with(&[(&["x", "y"], Outcome::Good), (&["x"], Outcome::Good)]);
        let bad_only = profile_with(&[(&["x"], Outcome::Bad), (&["z"], Outcome::Bad)]);
        for p in [&good_only, &bad_only] {
            for tag in ["x", "y", "z", "unknown"] {
                assert!(tag_log_odds(p, tag).is_finite());
            }
        }
    }

    #[test]
    fn tags_are_case_normalized() {
        let profile = profile_with(&[
            (&["sports"], Outcome::Good),
            (&["sports"], Outcome::Good),
            (&["ads"], Outcome::Bad),
        ]);
        assert_eq!(
            email_score(&profile, &["SPORTS "]),
            email_score(&profile, &["sports"])
        );
    }

    #[test]
    fn repeated_good_swipes_raise_log_odds() {
        let updater = PreferenceUpdater::new();
        let mut profile = profile_with(&[(&["ads"], Outcome::Bad)]);
        // the first swipe also grows the vocabulary, so it may leave the weight flat
        updater.apply(&mut profile, &["rust"], Outcome::Good).unwrap();
        let mut last = tag_log_odds(&profile, "rust");
        for _ in 0..5 {
            updater.apply(&mut profile, &["rust"], Outcome::Good).unwrap();
            let next = tag_log_odds(&profile, "rust");
            assert!(next > last, "{} should exceed {}", next, last);
            last = next;
        }
    }

    #[test]
    fn repeated_bad_swipes_lower_log_odds() {
        let updater = PreferenceUpdater::new();
        let mut profile = profile_with(&[(&["news"], Outcome::Good)]);
        updater.apply(&mut profile, &["spam"], Outcome::Bad).unwrap();
        let mut last = tag_log_odds(&profile, "spam");
        for _ in 0..5 {
            updater.apply(&mut profile, &["spam"], Outcome::Bad).unwrap();
            let next = tag_log_odds(&profile, "spam");
            assert!(next < last, "{} should be below {}", next, last);
            last = next;
        }
    }

    #[test]
    fn score_is_bounded() {
        let mut swipes: Vec<(&[&str], Outcome)> = Vec::new();
        for _ in 0..200 {
            swipes.push((&["rust"], Outcome::Good));
            swipes.push((&["spam"], Outcome::Bad));
        }
        let profile = profile_with(&swipes);
        let tags = ["rust"; 50];
        assert_eq!(email_score(&profile, &tags), 100);
        let tags = ["spam"; 50];
        assert_eq!(email_score(&profile, &tags), 0);
    }
}
