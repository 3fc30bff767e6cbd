// File: src/learning.rs
use crate::core::types::{normalize_tags, Outcome, Preferences, Profile};
use crate::degrade::{DegradeReason, Degradable};
use crate::error::{PrefsError, Result};
use crate::persistence::ProfileStore;
use tracing::{debug, info, warn};

/// Applies swipe outcomes to a profile's tag counters.
pub struct PreferenceUpdater {
    count_increment: u64,
}

impl Default for PreferenceUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceUpdater {
    pub fn new() -> Self {
        Self { count_increment: 1 }
    }

    /// Records one swipe in memory. Fails without touching `profile` when no
    /// usable tag is left after normalization.
    pub fn apply<S: AsRef<str>>(
        &self,
        profile: &mut Profile,
        tags: &[S],
        outcome: Outcome,
    ) -> Result<()> {
        let tags = normalize_tags(tags);
        if tags.is_empty() {
            return Err(PrefsError::EmptyTags);
        }

        for tag in &tags {
            let counts = profile.preferences.entry(tag.clone()).or_default();
            match outcome {
                Outcome::Good => counts.good += self.count_increment,
                Outcome::Bad => counts.bad += self.count_increment,
            }
            profile.vocabulary.insert(tag.clone());
        }

        let occurrences = tags.len() as u64 * self.count_increment;
        match outcome {
            Outcome::Good => profile.total_good += occurrences,
            Outcome::Bad => profile.total_bad += occurrences,
        }
        profile.emails_processed += 1;
        Ok(())
    }

    /// Records one swipe for `user_id` and persists it under the profile lock.
    ///
    /// The updated preferences are returned even when the write fails; the
    /// result is then `Degraded` and the next load will not reflect it.
    pub fn update<S: AsRef<str>>(
        &self,
        store: &ProfileStore,
        user_id: &str,
        tags: &[S],
        outcome: Outcome,
    ) -> Result<Degradable<Preferences>> {
        let normalized = normalize_tags(tags);
        if normalized.is_empty() {
            info!(user_id, "No tags to update preferences with");
            return Err(PrefsError::EmptyTags);
        }

        let result = store.update_with(user_id, |profile| {
            self.apply(profile, &normalized, outcome)
        })?;

        match &result {
            Degradable::Ok(profile) => {
                debug!(
                    user_id,
                    tags = ?normalized,
                    %outcome,
                    total_emails = profile.emails_processed,
                    "Updated preferences"
                );
            }
            Degradable::Degraded(_, reason) => {
                warn!(
                    user_id,
                    tags = ?normalized,
                    %outcome,
                    %reason,
                    "Preference update applied in memory only"
                );
            }
        }

        Ok(result.map(|profile| profile.preferences))
    }
}

/// True when a degrade reason means the swipe was not written.
pub fn is_lost_update(reason: &DegradeReason) -> bool {
    matches!(
        reason,
        DegradeReason::LockContention { .. } | DegradeReason::WriteFailed(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TagCounts;

    #[test]
    fn apply_counts_each_tag_and_one_email() {
        let updater = PreferenceUpdater::new();
        let mut profile = Profile::new("bob");
        updater
            .apply(&mut profile, &["Sports", "news"], Outcome::Good)
            .unwrap();
        updater.apply(&mut profile, &["sports"], Outcome::Bad).unwrap();

        assert_eq!(profile.tag_counts("sports"), TagCounts { good: 1, bad: 1 });
        assert_eq!(profile.tag_counts("news"), TagCounts { good: 1, bad: 0 });
        assert_eq!(profile.total_good, 2);
        assert_eq!(profile.total_bad, 1);
        assert_eq!(profile.emails_processed, 2);
        assert_eq!(profile.vocabulary.len(), 2);
        assert!(profile.is_consistent());
    }

    #[test]
    fn repeated_tag_in_one_swipe_counts_twice() {
        let updater = PreferenceUpdater::new();
        let mut profile = Profile::new("bob");
        updater
            .apply(&mut profile, &["promo", "PROMO"], Outcome::Bad)
            .unwrap();
        assert_eq!(profile.tag_counts("promo").bad, 2);
        assert_eq!(profile.total_bad, 2);
        assert_eq!(profile.emails_processed, 1);
        assert!(profile.is_consistent());
    }

    #[test]
    fn empty_tags_leave_profile_untouched() {
        let updater = PreferenceUpdater::new();
        let mut profile = Profile::new("bob");
        let before = profile.clone();
        let empty: [&str; 0] = [];

        assert!(matches!(
            updater.apply(&mut profile, &empty, Outcome::Good),
            Err(PrefsError::EmptyTags)
        ));
        assert!(matches!(
            updater.apply(&mut profile, &[" ", ""], Outcome::Good),
            Err(PrefsError::EmptyTags)
        ));
        assert_eq!(profile, before);
    }

    #[test]
    fn apply_on_inconsistent_profile_does_not_panic() {
        let updater = PreferenceUpdater::new();
        let mut profile = Profile::new("bob");
        profile
            .preferences
            .insert("a".into(), TagCounts { good: 3, bad: 0 });

        updater.apply(&mut profile, &["b"], Outcome::Good).unwrap();
        assert_eq!(profile.tag_counts("b").good, 1);
        assert!(profile.repair());
        assert_eq!(profile.total_good, 4);
    }

    #[test]
    fn lost_update_reasons() {
        assert!(is_lost_update(&DegradeReason::LockContention { attempts: 10 }));
        assert!(is_lost_update(&DegradeReason::WriteFailed("disk full".into())));
        assert!(!is_lost_update(&DegradeReason::CorruptRecord("bad json".into())));
        assert!(!is_lost_update(&DegradeReason::RepairedRecord));
    }
}
