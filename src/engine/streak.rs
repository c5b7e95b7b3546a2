//! Streak accountant: consecutive days of activity.

use chrono::{DateTime, NaiveDate, Utc};
use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::debug;

use super::ProgressionEngine;
use crate::error::Result;
use crate::model::{StreakChange, UserId};
use crate::store::ProgressionStore;
use crate::telemetry::metrics;

/// The user's streak after a touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakUpdate {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub change: StreakChange,
}

impl<S: ProgressionStore> ProgressionEngine<S> {
    /// Record that `user` was active now.
    pub async fn touch_daily_activity(&self, user: UserId) -> Result<StreakUpdate> {
        self.touch_activity(user, self.day_for(Utc::now())).await
    }

    /// Record that `user` was active on `today`.
    ///
    /// Idempotent per day. A date before the last recorded activity changes
    /// nothing.
    pub async fn touch_activity(&self, user: UserId, today: NaiveDate) -> Result<StreakUpdate> {
        let (state, change) = self.store.touch_activity(user, today).await?;

        metrics::streak_updates().add(1, &[KeyValue::new("change", change.as_str())]);
        debug!(
            user = %user,
            day = %today,
            change = change.as_str(),
            current = state.current_streak,
            longest = state.longest_streak,
            "activity recorded"
        );

        Ok(StreakUpdate {
            current_streak: state.current_streak,
            longest_streak: state.longest_streak,
            change,
        })
    }

    /// Calendar day that `instant` falls on in the configured offset.
    pub fn day_for(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.config.day_offset).date_naive()
    }
}
