//! Leaderboard ranker.
//!
//! Ranks are computed from counts (`1 + users strictly ahead`), never from a
//! user's index in a fetched page, so a user outside the top N still gets an
//! exact rank.

use opentelemetry::KeyValue;
use tracing::{debug, info};

use super::ProgressionEngine;
use crate::error::{Error, Result};
use crate::model::{
    Leaderboard, LeaderboardEntry, LeaderboardScope, Metric, RankedUser, TeamId, TeamStanding,
    UserId,
};
use crate::store::ProgressionStore;
use crate::telemetry::metrics;

fn check_page_size(n: u64) -> Result<()> {
    if n == 0 {
        return Err(Error::InvalidInput(
            "leaderboard page size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

impl<S: ProgressionStore> ProgressionEngine<S> {
    /// The first `n` users by `metric`, ties broken by ascending user id.
    pub async fn top_n(
        &self,
        metric: Metric,
        n: u64,
        scope: LeaderboardScope,
    ) -> Result<Vec<LeaderboardEntry>> {
        check_page_size(n)?;
        metrics::leaderboard_queries().add(
            1,
            &[
                KeyValue::new("kind", "users"),
                KeyValue::new("metric", metric.column()),
            ],
        );

        let rows = self.store.top_n_by_metric(metric, n, scope).await?;
        Ok(rows
            .into_iter()
            .zip(1..)
            .map(|((user_id, metric_value), rank)| LeaderboardEntry {
                user_id,
                rank,
                metric_value,
            })
            .collect())
    }

    /// Competition rank: `1 + count(users with a strictly greater metric)`.
    /// Tied users share a rank.
    pub async fn rank_of(
        &self,
        user: UserId,
        metric: Metric,
        scope: LeaderboardScope,
    ) -> Result<u64> {
        let value = self.store.user_state(user).await?.metric(metric);
        let above = self.store.rank_count_above(metric, value, scope).await?;
        Ok(above + 1)
    }

    /// Unique position under the id tie-break, consistent with [`Self::top_n`].
    pub async fn position_of(
        &self,
        user: UserId,
        metric: Metric,
        scope: LeaderboardScope,
    ) -> Result<u64> {
        let value = self.store.user_state(user).await?.metric(metric);
        let ahead = self.store.count_ahead(metric, value, user, scope).await?;
        Ok(ahead + 1)
    }

    /// A page of the leaderboard plus, optionally, the requester's standing.
    pub async fn get_leaderboard(
        &self,
        metric: Metric,
        scope: LeaderboardScope,
        n: u64,
        current_user: Option<UserId>,
    ) -> Result<Leaderboard> {
        let entries = self.top_n(metric, n, scope).await?;

        let current_user = match current_user {
            Some(user) => Some(self.standing(user, metric, scope).await?),
            None => None,
        };

        Ok(Leaderboard {
            metric,
            scope,
            entries,
            current_user,
        })
    }

    async fn standing(
        &self,
        user: UserId,
        metric: Metric,
        scope: LeaderboardScope,
    ) -> Result<RankedUser> {
        let metric_value = self.store.user_state(user).await?.metric(metric);
        let above = self.store.rank_count_above(metric, metric_value, scope).await?;
        let ahead = self
            .store
            .count_ahead(metric, metric_value, user, scope)
            .await?;

        debug!(user = %user, rank = above + 1, position = ahead + 1, "leaderboard standing");
        Ok(RankedUser {
            user_id: user,
            rank: above + 1,
            position: ahead + 1,
            metric_value,
        })
    }

    /// The first `n` teams by summed member metric, ties by ascending team id.
    pub async fn top_teams(&self, metric: Metric, n: u64) -> Result<Vec<TeamStanding>> {
        check_page_size(n)?;
        metrics::leaderboard_queries().add(
            1,
            &[
                KeyValue::new("kind", "teams"),
                KeyValue::new("metric", metric.column()),
            ],
        );

        let rows = self.store.top_n_teams(metric, n).await?;
        Ok(rows
            .into_iter()
            .zip(1..)
            .map(|((team_id, metric_value), rank)| TeamStanding {
                team_id,
                rank,
                metric_value,
            })
            .collect())
    }

    /// `1 + count(teams with a strictly greater summed metric)`.
    pub async fn team_rank(&self, team: TeamId, metric: Metric) -> Result<u64> {
        let value = self.store.team_metric(team, metric).await?;
        let above = self.store.team_rank_count_above(metric, value).await?;
        Ok(above + 1)
    }

    /// Add `user` to `team`. Adding an existing member is a no-op.
    pub async fn add_team_member(&self, team: TeamId, user: UserId) -> Result<()> {
        self.store.add_team_member(team, user).await?;
        info!(team = %team, user = %user, "team member added");
        Ok(())
    }
}
