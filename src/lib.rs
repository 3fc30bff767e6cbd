// src/lib.rs

pub mod config;
pub mod core;
pub mod degrade;
pub mod error;
pub mod extract;
pub mod learning;
pub mod lock;
pub mod migration;
pub mod persistence;

pub use crate::config::{EngineConfig, LockConfig};
pub use crate::core::engine::{PreferenceEngine, ProfileView};
pub use crate::core::insights::{Insights, TagInsight};
pub use crate::core::ranking::{RankMode, RankOptions, Rankable, Ranked};
pub use crate::core::types::{EmailItem, Outcome, Preferences, Profile, TagCounts};
pub use crate::degrade::{Degradable, DegradeReason};
pub use crate::error::{PrefsError, Result};
pub use crate::extract::{ReplyExtractor, TokenExtractor};
