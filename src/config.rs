// File: src/config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const APP_DIR: &str = "swipe-prefs";
const DEFAULT_TAG_CACHE_CAPACITY: usize = 1000;

/// Bounded retry policy for the per-profile write lock.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How many times to try creating the lock marker before giving up.
    pub max_attempts: u32,
    /// Back-off between attempts.
    pub retry_interval: Duration,
    /// A marker older than this is treated as left behind by a crashed writer.
    /// `None` disables stale-lock recovery.
    pub stale_after: Option<Duration>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_interval: Duration::from_millis(100),
            stale_after: Some(Duration::from_secs(30)),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one JSON record per user.
    pub data_dir: PathBuf,
    pub lock: LockConfig,
    /// Maximum number of items whose extracted tags are kept in memory.
    pub tag_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lock: LockConfig::default(),
            tag_cache_capacity: DEFAULT_TAG_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `SWIPE_PREFS_*` environment variables.
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("SWIPE_PREFS_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Some(n) = parse_var::<u32>("SWIPE_PREFS_LOCK_ATTEMPTS") {
            config.lock.max_attempts = n.max(1);
        }
        if let Some(ms) = parse_var::<u64>("SWIPE_PREFS_LOCK_RETRY_MS") {
            config.lock.retry_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>("SWIPE_PREFS_LOCK_STALE_SECS") {
            config.lock.stale_after = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(n) = parse_var::<usize>("SWIPE_PREFS_TAG_CACHE") {
            config.tag_cache_capacity = n.max(1);
        }

        debug!(data_dir = %config.data_dir.display(), "Loaded engine configuration");
        config
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}

fn default_data_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(mut path) => {
            path.push(APP_DIR);
            path.push("profiles");
            path
        }
        None => PathBuf::from("data").join("profiles"),
    }
}
