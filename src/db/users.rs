//! User progression storage: XP counters, levels, streaks, team membership.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    Period, StreakChange, TeamId, UserId, UserProgressionState, level_for_xp,
};

const USER_COLUMNS: &str = "user_id, total_xp, weekly_xp, monthly_xp, level, \
     current_streak, longest_streak, last_active_date";

impl super::Db {
    /// Credit XP in its own transaction.
    pub async fn add_xp(&self, user: UserId, amount: i64) -> Result<(UserProgressionState, i32)> {
        let mut tx = self.pool().begin().await?;
        let credited = credit_xp_on(&mut tx, user, amount).await?;
        tx.commit().await?;
        Ok(credited)
    }

    /// Current totals; a user without a row reads as fresh.
    pub async fn read_user_progression_state(&self, user: UserId) -> Result<UserProgressionState> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM user_progression WHERE user_id = $1"
        ))
        .bind(user.0)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map_or_else(|| UserProgressionState::new(user), UserProgressionState::from))
    }

    /// Apply the streak rule for `today` while holding the user's row lock.
    pub async fn record_activity(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> Result<(UserProgressionState, StreakChange)> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("INSERT INTO user_progression (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user.0)
            .execute(&mut *tx)
            .await?;

        let row: UserRow = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM user_progression WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user.0)
        .fetch_one(&mut *tx)
        .await?;

        let mut state = UserProgressionState::from(row);
        let change = state.touch(today);

        if matches!(change, StreakChange::AlreadyCounted | StreakChange::OutOfOrder) {
            tx.rollback().await?;
            return Ok((state, change));
        }

        sqlx::query(
            "UPDATE user_progression
             SET current_streak = $2, longest_streak = $3, last_active_date = $4, updated_at = now()
             WHERE user_id = $1",
        )
        .bind(user.0)
        .bind(state.current_streak)
        .bind(state.longest_streak)
        .bind(state.last_active_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((state, change))
    }

    /// Zero one periodic counter for every user.
    pub async fn reset_counters(&self, period: Period) -> Result<u64> {
        let column = period.metric().column();
        let rows_affected = sqlx::query(&format!(
            "UPDATE user_progression SET {column} = 0, updated_at = now() WHERE {column} <> 0"
        ))
        .execute(self.pool())
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    pub async fn insert_team_member(&self, team: TeamId, user: UserId) -> Result<()> {
        sqlx::query(
            "INSERT INTO team_members (team_id, user_id) VALUES ($1, $2)
             ON CONFLICT (team_id, user_id) DO NOTHING",
        )
        .bind(team.0)
        .bind(user.0)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

/// Add `amount` to every XP counter as a store-level increment, then set
/// the level from the new total while the row is still locked.
pub(crate) async fn credit_xp_on(
    conn: &mut sqlx::PgConnection,
    user: UserId,
    amount: i64,
) -> Result<(UserProgressionState, i32)> {
    let row: UserRow = sqlx::query_as(&format!(
        "INSERT INTO user_progression (user_id, total_xp, weekly_xp, monthly_xp)
         VALUES ($1, $2, $2, $2)
         ON CONFLICT (user_id) DO UPDATE SET
            total_xp   = user_progression.total_xp + EXCLUDED.total_xp,
            weekly_xp  = user_progression.weekly_xp + EXCLUDED.weekly_xp,
            monthly_xp = user_progression.monthly_xp + EXCLUDED.monthly_xp,
            updated_at = now()
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user.0)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;

    // The upsert leaves `level` alone and holds the row lock until commit,
    // so the returned column is the level before this credit.
    let previous_level = row.level;
    let level = level_for_xp(row.total_xp);
    if level != previous_level {
        sqlx::query("UPDATE user_progression SET level = $2 WHERE user_id = $1")
            .bind(user.0)
            .bind(level)
            .execute(&mut *conn)
            .await?;
    }

    let mut state = UserProgressionState::from(row);
    state.level = level;
    Ok((state, previous_level))
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    total_xp: i64,
    weekly_xp: i64,
    monthly_xp: i64,
    level: i32,
    current_streak: i32,
    longest_streak: i32,
    last_active_date: Option<NaiveDate>,
}

impl From<UserRow> for UserProgressionState {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            total_xp: row.total_xp,
            weekly_xp: row.weekly_xp,
            monthly_xp: row.monthly_xp,
            level: row.level,
            current_streak: row.current_streak,
            longest_streak: row.longest_streak,
            last_active_date: row.last_active_date,
        }
    }
}
