//! Database connection pool, migrations, and health check.
//!
//! Postgres implementation of [`ProgressionStore`]. Each concern lives in
//! its own submodule as an `impl Db` block; this module wires them into
//! the trait.

pub mod achievements;
pub mod leaderboard;
pub mod progress;
pub mod users;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::{Error, Result};
use crate::model::{
    AchievementDefinition, AchievementId, IncrementOutcome, LeaderboardScope, Metric, Period,
    ProgressRecord, Scope, StreakChange, TeamId, UserId, UserProgressionState,
};
use crate::store::ProgressionStore;

/// Database handle. Owns the connection pool shared across all modules.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProgressionStore for Db {
    async fn active_achievements(&self, scope: Scope) -> Result<Vec<AchievementDefinition>> {
        self.list_active_achievements(scope).await
    }

    async fn achievement(&self, id: AchievementId) -> Result<Option<AchievementDefinition>> {
        self.get_achievement(id).await
    }

    async fn upsert_achievement(&self, definition: &AchievementDefinition) -> Result<()> {
        self.save_achievement(definition).await
    }

    async fn progress(
        &self,
        user: UserId,
        achievement: AchievementId,
    ) -> Result<Option<ProgressRecord>> {
        self.get_progress(user, achievement).await
    }

    async fn user_progress(&self, user: UserId) -> Result<Vec<ProgressRecord>> {
        self.list_user_progress(user).await
    }

    async fn get_or_create_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
    ) -> Result<ProgressRecord> {
        self.ensure_progress(user, achievement, progress_max).await
    }

    async fn increment_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
        delta: i64,
        reward: i64,
    ) -> Result<IncrementOutcome> {
        self.atomic_increment_progress(user, achievement, progress_max, delta, reward)
            .await
    }

    async fn award_if_unearned(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
        reward: i64,
    ) -> Result<bool> {
        self.atomic_award_if_unearned(user, achievement, progress_max, reward)
            .await
    }

    async fn credit_xp(&self, user: UserId, amount: i64) -> Result<(UserProgressionState, i32)> {
        self.add_xp(user, amount).await
    }

    async fn user_state(&self, user: UserId) -> Result<UserProgressionState> {
        self.read_user_progression_state(user).await
    }

    async fn touch_activity(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> Result<(UserProgressionState, StreakChange)> {
        self.record_activity(user, today).await
    }

    async fn reset_period_counters(&self, period: Period) -> Result<u64> {
        self.reset_counters(period).await
    }

    async fn add_team_member(&self, team: TeamId, user: UserId) -> Result<()> {
        self.insert_team_member(team, user).await
    }

    async fn top_n_by_metric(
        &self,
        metric: Metric,
        n: u64,
        scope: LeaderboardScope,
    ) -> Result<Vec<(UserId, i64)>> {
        self.top_users(metric, n, scope).await
    }

    async fn rank_count_above(
        &self,
        metric: Metric,
        value: i64,
        scope: LeaderboardScope,
    ) -> Result<u64> {
        self.count_users_above(metric, value, scope).await
    }

    async fn count_ahead(
        &self,
        metric: Metric,
        value: i64,
        user: UserId,
        scope: LeaderboardScope,
    ) -> Result<u64> {
        self.count_users_ahead(metric, value, user, scope).await
    }

    async fn team_metric(&self, team: TeamId, metric: Metric) -> Result<i64> {
        self.sum_team_metric(team, metric).await
    }

    async fn top_n_teams(&self, metric: Metric, n: u64) -> Result<Vec<(TeamId, i64)>> {
        self.top_teams(metric, n).await
    }

    async fn team_rank_count_above(&self, metric: Metric, value: i64) -> Result<u64> {
        self.count_teams_above(metric, value).await
    }
}

/// Convert a non-negative count or limit between Rust and SQL integers.
pub(crate) fn to_sql_limit(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}
