//! Progress ledger storage: lazy record creation, atomic increments, and
//! the at-most-once award transition.
//!
//! Both writers are guarded by `earned_at IS NULL` in the UPDATE itself.
//! Concurrent callers serialize on the row lock and re-check the guard, so
//! exactly one of them sees the row and pays the reward.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{AchievementId, IncrementOutcome, ProgressRecord, UserId};

const PROGRESS_COLUMNS: &str =
    "user_id, achievement_id, progress, progress_max, earned_at, xp_awarded";

impl super::Db {
    pub async fn get_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
    ) -> Result<Option<ProgressRecord>> {
        let row: Option<ProgressRow> = sqlx::query_as(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM achievement_progress
             WHERE user_id = $1 AND achievement_id = $2"
        ))
        .bind(user.0)
        .bind(achievement.0)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(ProgressRecord::from))
    }

    pub async fn list_user_progress(&self, user: UserId) -> Result<Vec<ProgressRecord>> {
        let rows: Vec<ProgressRow> = sqlx::query_as(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM achievement_progress WHERE user_id = $1"
        ))
        .bind(user.0)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(ProgressRecord::from).collect())
    }

    /// Return the existing record or create it at zero progress.
    pub async fn ensure_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
    ) -> Result<ProgressRecord> {
        let mut tx = self.pool().begin().await?;
        insert_progress_if_absent(&mut tx, user, achievement, progress_max).await?;

        let row: ProgressRow = sqlx::query_as(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM achievement_progress
             WHERE user_id = $1 AND achievement_id = $2"
        ))
        .bind(user.0)
        .bind(achievement.0)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Add `delta` to an unearned record in one conditional UPDATE.
    ///
    /// The UPDATE that reaches `progress_max` also sets `earned_at` and
    /// `xp_awarded`, and the reward is credited in the same transaction, so
    /// `earned_at IS NOT NULL` and `progress >= progress_max` flip together.
    pub async fn atomic_increment_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
        delta: i64,
        reward: i64,
    ) -> Result<IncrementOutcome> {
        let mut tx = self.pool().begin().await?;
        insert_progress_if_absent(&mut tx, user, achievement, progress_max).await?;

        let row: Option<ProgressRow> = sqlx::query_as(&format!(
            "UPDATE achievement_progress
             SET progress   = LEAST(progress + $3, progress_max),
                 earned_at  = CASE WHEN progress + $3 >= progress_max THEN now() END,
                 xp_awarded = CASE WHEN progress + $3 >= progress_max THEN $4 ELSE xp_awarded END,
                 updated_at = now()
             WHERE user_id = $1 AND achievement_id = $2 AND earned_at IS NULL
             RETURNING {PROGRESS_COLUMNS}"
        ))
        .bind(user.0)
        .bind(achievement.0)
        .bind(delta)
        .bind(reward)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            // Dropping the transaction rolls back the no-op insert.
            return Err(Error::AlreadyEarned { user, achievement });
        };

        let record = ProgressRecord::from(row);
        let just_completed = record.is_earned();
        if just_completed {
            super::users::credit_xp_on(&mut tx, user, reward).await?;
        }

        tx.commit().await?;
        Ok(IncrementOutcome {
            record,
            just_completed,
        })
    }

    /// Compare-and-set `earned_at` from NULL and pay `reward` once.
    pub async fn atomic_award_if_unearned(
        &self,
        user: UserId,
        achievement: AchievementId,
        progress_max: i64,
        reward: i64,
    ) -> Result<bool> {
        let mut tx = self.pool().begin().await?;
        insert_progress_if_absent(&mut tx, user, achievement, progress_max).await?;

        let rows_affected = sqlx::query(
            "UPDATE achievement_progress
             SET progress = progress_max, earned_at = now(), xp_awarded = $3, updated_at = now()
             WHERE user_id = $1 AND achievement_id = $2 AND earned_at IS NULL",
        )
        .bind(user.0)
        .bind(achievement.0)
        .bind(reward)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        super::users::credit_xp_on(&mut tx, user, reward).await?;
        tx.commit().await?;
        Ok(true)
    }
}

async fn insert_progress_if_absent(
    conn: &mut sqlx::PgConnection,
    user: UserId,
    achievement: AchievementId,
    progress_max: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO achievement_progress (user_id, achievement_id, progress, progress_max)
         VALUES ($1, $2, 0, $3)
         ON CONFLICT (user_id, achievement_id) DO NOTHING",
    )
    .bind(user.0)
    .bind(achievement.0)
    .bind(progress_max.max(1))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ProgressRow {
    user_id: Uuid,
    achievement_id: Uuid,
    progress: i64,
    progress_max: i64,
    earned_at: Option<DateTime<Utc>>,
    xp_awarded: i64,
}

impl From<ProgressRow> for ProgressRecord {
    fn from(row: ProgressRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            achievement_id: AchievementId(row.achievement_id),
            progress: row.progress,
            progress_max: row.progress_max,
            earned_at: row.earned_at,
            xp_awarded: row.xp_awarded,
        }
    }
}
