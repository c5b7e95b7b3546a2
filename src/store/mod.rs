//! Persistence collaborator of the progression engine.
//!
//! The engine talks to its backing store only through [`ProgressionStore`].
//! Every mutating method is atomic with respect to concurrent callers: the
//! store, not the engine, guarantees that progress is never lost and an
//! achievement is never paid twice.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{
    AchievementDefinition, AchievementId, IncrementOutcome, LeaderboardScope, Metric, Period,
    ProgressRecord, Scope, StreakChange, TeamId, UserId, UserProgressionState,
};

#[async_trait]
pub trait ProgressionStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    /// Active achievements in exactly `scope`, ordered by `order_index`.
    async fn active_achievements(&self, scope: Scope) -> Result<Vec<AchievementDefinition>>;

    /// Look up one achievement, active or not.
    async fn achievement(&self, id: AchievementId) -> Result<Option<AchievementDefinition>>;

    /// Insert or replace a catalog entry.
    async fn upsert_achievement(&self, definition: &AchievementDefinition) -> Result<()>;

    // -----------------------------------------------------------------------
    // Progress ledger
    // -----------------------------------------------------------------------

    async fn progress(
        &self,
        user: UserId,
        achievement: AchievementId,
    ) -> Result<Option<ProgressRecord>>;

    /// Every progress record the user has.
    async fn user_progress(&self, user: UserId) -> Result<Vec<ProgressRecord>>;

    /// Return the existing record, or create one at zero progress.
    async fn get_or_create_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
    ) -> Result<ProgressRecord>;

    /// Atomically add `delta` to an unearned record, creating it if needed.
    ///
    /// Progress is capped at the record's `progress_max`. When the increment
    /// reaches it, the same atomic step sets `earned_at`, writes
    /// `xp_awarded = reward`, and credits `reward` XP to the user, and the
    /// outcome reports `just_completed`. Fails with `AlreadyEarned` when the
    /// record was earned before this call.
    async fn increment_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
        delta: i64,
        reward: i64,
    ) -> Result<IncrementOutcome>;

    /// Compare-and-set on an unearned record: mark it earned at full
    /// progress and credit `reward` XP. Returns `false`, with no side
    /// effect, when the record was already earned.
    async fn award_if_unearned(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
        reward: i64,
    ) -> Result<bool>;

    // -----------------------------------------------------------------------
    // XP, level, streak
    // -----------------------------------------------------------------------

    /// Atomically add `amount` to all XP counters and recompute the level.
    /// Also returns the level the user held right before this credit.
    async fn credit_xp(&self, user: UserId, amount: i64) -> Result<(UserProgressionState, i32)>;

    /// Current totals. Users never seen before read as a fresh state.
    async fn user_state(&self, user: UserId) -> Result<UserProgressionState>;

    /// Apply [`UserProgressionState::touch`] for `today` under a row lock.
    async fn touch_activity(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> Result<(UserProgressionState, StreakChange)>;

    /// Zero the counter of `period` for every user. Returns rows changed.
    async fn reset_period_counters(&self, period: Period) -> Result<u64>;

    // -----------------------------------------------------------------------
    // Teams
    // -----------------------------------------------------------------------

    async fn add_team_member(&self, team: TeamId, user: UserId) -> Result<()>;

    // -----------------------------------------------------------------------
    // Leaderboards
    // -----------------------------------------------------------------------

    /// Top `n` users by `metric`, descending, ties by ascending user id.
    async fn top_n_by_metric(
        &self,
        metric: Metric,
        n: u64,
        scope: LeaderboardScope,
    ) -> Result<Vec<(UserId, i64)>>;

    /// Users in scope whose `metric` is strictly greater than `value`.
    async fn rank_count_above(
        &self,
        metric: Metric,
        value: i64,
        scope: LeaderboardScope,
    ) -> Result<u64>;

    /// Users in scope ordered before `user` holding `value`: strictly
    /// greater metric, or equal metric and smaller id.
    async fn count_ahead(
        &self,
        metric: Metric,
        value: i64,
        user: UserId,
        scope: LeaderboardScope,
    ) -> Result<u64>;

    /// Sum of `metric` over a team's members. Zero for an empty team.
    async fn team_metric(&self, team: TeamId, metric: Metric) -> Result<i64>;

    /// Top `n` teams by summed member `metric`, ties by ascending team id.
    async fn top_n_teams(&self, metric: Metric, n: u64) -> Result<Vec<(TeamId, i64)>>;

    /// Teams whose summed `metric` is strictly greater than `value`.
    async fn team_rank_count_above(&self, metric: Metric, value: i64) -> Result<u64>;
}
