//! Leaderboard queries.
//!
//! Ranks come from counts, never from list positions, so a user far below
//! the displayed page still gets an exact rank from one indexed query.
//! Metric columns are interpolated from [`Metric::column`], a closed set.

use uuid::Uuid;

use super::{from_sql_count, to_sql_limit};
use crate::error::Result;
use crate::model::{LeaderboardScope, Metric, TeamId, UserId};

/// Restricts `up` rows to members of the team bound at `$param`, unless it is NULL.
fn team_filter(param: usize) -> String {
    format!(
        "(${param}::uuid IS NULL OR EXISTS (
            SELECT 1 FROM team_members tm WHERE tm.team_id = ${param} AND tm.user_id = up.user_id))"
    )
}

/// Summed metric per team; members without XP contribute zero.
fn team_totals(metric: Metric) -> String {
    let column = metric.column();
    format!(
        "SELECT tm.team_id, COALESCE(SUM(up.{column}), 0)::BIGINT AS metric_value
         FROM team_members tm
         LEFT JOIN user_progression up ON up.user_id = tm.user_id
         GROUP BY tm.team_id"
    )
}

impl super::Db {
    pub async fn top_users(
        &self,
        metric: Metric,
        n: u64,
        scope: LeaderboardScope,
    ) -> Result<Vec<(UserId, i64)>> {
        let column = metric.column();
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(&format!(
            "SELECT up.user_id, up.{column} FROM user_progression up
             WHERE {filter}
             ORDER BY up.{column} DESC, up.user_id ASC
             LIMIT $1",
            filter = team_filter(2),
        ))
        .bind(to_sql_limit(n))
        .bind(scope.team().map(|t| t.0))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(id, v)| (UserId(id), v)).collect())
    }

    pub async fn count_users_above(
        &self,
        metric: Metric,
        value: i64,
        scope: LeaderboardScope,
    ) -> Result<u64> {
        let column = metric.column();
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM user_progression up WHERE up.{column} > $1 AND {filter}",
            filter = team_filter(2),
        ))
        .bind(value)
        .bind(scope.team().map(|t| t.0))
        .fetch_one(self.pool())
        .await?;

        Ok(from_sql_count(count))
    }

    pub async fn count_users_ahead(
        &self,
        metric: Metric,
        value: i64,
        user: UserId,
        scope: LeaderboardScope,
    ) -> Result<u64> {
        let column = metric.column();
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM user_progression up
             WHERE (up.{column} > $1 OR (up.{column} = $1 AND up.user_id < $3)) AND {filter}",
            filter = team_filter(2),
        ))
        .bind(value)
        .bind(scope.team().map(|t| t.0))
        .bind(user.0)
        .fetch_one(self.pool())
        .await?;

        Ok(from_sql_count(count))
    }

    pub async fn sum_team_metric(&self, team: TeamId, metric: Metric) -> Result<i64> {
        let column = metric.column();
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(up.{column}), 0)::BIGINT
             FROM team_members tm
             LEFT JOIN user_progression up ON up.user_id = tm.user_id
             WHERE tm.team_id = $1"
        ))
        .bind(team.0)
        .fetch_one(self.pool())
        .await?;

        Ok(total)
    }

    pub async fn top_teams(&self, metric: Metric, n: u64) -> Result<Vec<(TeamId, i64)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(&format!(
            "SELECT team_id, metric_value FROM ({totals}) t
             ORDER BY metric_value DESC, team_id ASC
             LIMIT $1",
            totals = team_totals(metric),
        ))
        .bind(to_sql_limit(n))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(id, v)| (TeamId(id), v)).collect())
    }

    pub async fn count_teams_above(&self, metric: Metric, value: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM ({totals}) t WHERE t.metric_value > $1",
            totals = team_totals(metric),
        ))
        .bind(value)
        .fetch_one(self.pool())
        .await?;

        Ok(from_sql_count(count))
    }
}
