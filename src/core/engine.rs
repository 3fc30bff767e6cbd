use crate::config::EngineConfig;
use crate::core::insights::{insights, Insights};
use crate::core::ranking::{rank, RankOptions, Ranked};
use crate::core::scorer::email_score;
use crate::core::types::{EmailItem, Outcome, Preferences, Profile};
use crate::degrade::Degradable;
use crate::error::{PrefsError, Result};
use crate::extract::{CacheKey, FallbackExtractor, NoUpstream, TagCache, TokenExtractor};
use crate::learning::PreferenceUpdater;
use crate::persistence::ProfileStore;
use serde::Serialize;
use tracing::{debug, info};

/// A profile together with what it says about the user.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub profile: Profile,
    pub insights: Insights,
}

/// The preference API: everything the client layer calls.
///
/// Invalid input is rejected with an `Err` before any state is touched.
/// Storage trouble never is; it shows up as `Degraded` results, a neutral
/// score, or `false`.
pub struct PreferenceEngine<E = NoUpstream> {
    store: ProfileStore,
    updater: PreferenceUpdater,
    extractor: FallbackExtractor<E>,
    tag_cache: TagCache,
}

impl PreferenceEngine<NoUpstream> {
    /// Engine that tags emails with the local keyword scan only.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Self::with_extractor_inner(config, FallbackExtractor::keywords_only())
    }
}

impl<E: TokenExtractor> PreferenceEngine<E> {
    /// Engine backed by an upstream extractor, falling back to keywords.
    pub fn with_extractor(config: &EngineConfig, extractor: E) -> Result<Self> {
        Self::with_extractor_inner(config, FallbackExtractor::new(extractor))
    }

    fn with_extractor_inner(config: &EngineConfig, extractor: FallbackExtractor<E>) -> Result<Self> {
        let store = ProfileStore::open(&config.data_dir, config.lock.clone())?;
        info!(data_dir = %store.dir().display(), "Preference engine ready");
        Ok(Self {
            store,
            updater: PreferenceUpdater::new(),
            extractor,
            tag_cache: TagCache::new(config.tag_cache_capacity),
        })
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// extract-tokens
    pub fn extract_tokens(&self, subject: &str, body: &str) -> Result<Vec<String>> {
        if subject.trim().is_empty() && body.trim().is_empty() {
            return Err(PrefsError::InvalidInput(
                "subject or body is required".to_string(),
            ));
        }
        Ok(self.extractor.extract(subject, body))
    }

    /// update-preferences
    pub fn update_preferences<S: AsRef<str>>(
        &self,
        user_id: &str,
        tags: &[S],
        outcome: Outcome,
    ) -> Result<Degradable<Preferences>> {
        check_user_id(user_id)?;
        self.updater.update(&self.store, user_id, tags, outcome)
    }

    /// score-email
    pub fn score_email<S: AsRef<str>>(&self, user_id: &str, tags: &[S]) -> Result<u8> {
        check_user_id(user_id)?;
        let profile = self.store.load(user_id).into_value();
        Ok(email_score(&profile, tags))
    }

    /// rank-emails. Items arriving without tags get them from the extractor,
    /// through the tag cache.
    pub fn rank_emails(
        &self,
        user_id: &str,
        items: Vec<EmailItem>,
        options: &RankOptions,
    ) -> Result<Vec<Ranked<EmailItem>>> {
        check_user_id(user_id)?;
        let profile = self.store.load(user_id).into_value();

        let items: Vec<EmailItem> = items
            .into_iter()
            .map(|mut item| {
                if item.tags.is_empty() {
                    item.tags = self.resolve_tags(&item);
                }
                item
            })
            .collect();

        let ranked = rank(&profile, items, options);
        debug!(user_id, count = ranked.len(), mode = ?options.mode, "Ranked emails");
        Ok(ranked)
    }

    /// get-profile
    pub fn get_profile(&self, user_id: &str) -> Result<ProfileView> {
        check_user_id(user_id)?;
        let profile = self.store.load(user_id).into_value();
        let insights = insights(&profile);
        Ok(ProfileView { profile, insights })
    }

    /// reset-profile. Also drops cached tags, since they may have been
    /// produced for this user's items.
    pub fn reset_profile(&self, user_id: &str) -> Result<bool> {
        check_user_id(user_id)?;
        let ok = self.store.reset(user_id);
        if ok {
            self.tag_cache.clear();
        }
        Ok(ok)
    }

    fn resolve_tags(&self, item: &EmailItem) -> Vec<String> {
        let subject = item.subject.as_deref().unwrap_or("");
        let body = item.text();
        let key = CacheKey::for_item(item.id.as_deref(), subject, body);
        self.tag_cache
            .get_or_insert_with(key, || self.extractor.extract(subject, body))
    }
}

fn check_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(PrefsError::InvalidInput("userId is required".to_string()));
    }
    Ok(())
}
