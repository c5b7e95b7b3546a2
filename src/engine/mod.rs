//! The progression engine. The public API for recording activity and
//! reading progression state.
//!
//! The engine is stateless apart from its configuration; all shared state
//! lives in the [`ProgressionStore`]. Request handlers may share one engine
//! (it is cheap to clone) and call it concurrently.

pub mod award;
pub mod leaderboard;
pub mod ledger;
pub mod streak;
pub mod trigger;
pub mod xp;

pub use award::AwardResult;
pub use streak::StreakUpdate;
pub use trigger::{AchievementFailure, Evaluation};
pub use xp::XpCredit;

use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::UserId;
use crate::store::{MemoryStore, ProgressionStore};

/// Engine settings that are not part of the store.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Offset that decides which calendar day an activity counts for.
    pub day_offset: FixedOffset,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            day_offset: Utc.fix(),
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            day_offset: config.day_offset,
        }
    }
}

/// Achievement, XP, streak, and leaderboard bookkeeping over a store.
pub struct ProgressionEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S> Clone for ProgressionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: ProgressionStore> ProgressionEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl ProgressionEngine<MemoryStore> {
    /// Create an engine over an empty in-memory store (for testing).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), EngineConfig::default())
    }
}

/// Resolve the acting user or fail the whole operation.
///
/// Session handling happens in the caller; the engine only ever sees the
/// resolved id, or its absence.
pub fn require_user(user: Option<UserId>) -> Result<UserId> {
    user.ok_or(Error::Unauthenticated)
}
