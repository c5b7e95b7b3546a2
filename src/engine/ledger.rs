//! Progress ledger: per-(user, achievement) counters.

use opentelemetry::KeyValue;
use tracing::debug;

use super::ProgressionEngine;
use crate::error::{Error, Result};
use crate::model::{AchievementDefinition, AchievementId, IncrementOutcome, ProgressRecord, UserId};
use crate::store::ProgressionStore;
use crate::telemetry::metrics;

impl<S: ProgressionStore> ProgressionEngine<S> {
    /// Return the user's record for `achievement`, creating it at zero.
    pub async fn get_or_create_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
    ) -> Result<ProgressRecord> {
        let definition = self.definition(achievement).await?;
        self.store
            .get_or_create_progress(user, achievement, definition.effective_progress_max())
            .await
    }

    /// Atomically advance the user's progress on `achievement` by `delta`.
    ///
    /// Fails with `AlreadyEarned` if the achievement was earned earlier.
    pub async fn increment_progress(
        &self,
        user: UserId,
        achievement: AchievementId,
        delta: i64,
    ) -> Result<IncrementOutcome> {
        let definition = self.definition(achievement).await?;
        self.increment_for(user, &definition, delta).await
    }

    pub(crate) async fn increment_for(
        &self,
        user: UserId,
        definition: &AchievementDefinition,
        delta: i64,
    ) -> Result<IncrementOutcome> {
        if delta <= 0 {
            return Err(Error::InvalidInput(format!(
                "progress delta must be positive, got {delta}"
            )));
        }

        let outcome = self
            .store
            .increment_progress(
                user,
                definition.id,
                definition.effective_progress_max(),
                delta,
                definition.xp_reward,
            )
            .await?;

        metrics::progress_increments()
            .add(1, &[KeyValue::new("trigger", definition.trigger.kind())]);
        debug!(
            user = %user,
            achievement = %definition.id,
            progress = outcome.record.progress,
            progress_max = outcome.record.progress_max,
            just_completed = outcome.just_completed,
            "progress incremented"
        );

        Ok(outcome)
    }

    pub(crate) async fn definition(&self, id: AchievementId) -> Result<AchievementDefinition> {
        self.store
            .achievement(id)
            .await?
            .ok_or(Error::AchievementNotFound(id))
    }
}
