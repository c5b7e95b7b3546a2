//! Award issuer: the at-most-once transition to earned.
//!
//! The transition itself is a compare-and-set inside the store. Counting
//! achievements complete inside the ledger increment; threshold and direct
//! awards go through [`ProgressionStore::award_if_unearned`]. Either way the
//! issuer is where a completed award gets reported.

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{debug, info};

use super::ProgressionEngine;
use crate::error::Result;
use crate::model::{AchievementDefinition, AchievementId, UserId};
use crate::store::ProgressionStore;
use crate::telemetry::metrics;

/// Outcome of an award attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AwardResult {
    /// True only for the call that performed the transition.
    pub success: bool,
    /// The achievement, when this call earned it.
    pub achievement: Option<AchievementDefinition>,
}

/// How an award came about. Used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AwardPath {
    /// Progress reached its maximum.
    Increment,
    /// A threshold trigger matched.
    Immediate,
    /// Requested explicitly by a caller.
    Direct,
}

impl AwardPath {
    fn as_str(self) -> &'static str {
        match self {
            AwardPath::Increment => "increment",
            AwardPath::Immediate => "immediate",
            AwardPath::Direct => "direct",
        }
    }
}

impl<S: ProgressionStore> ProgressionEngine<S> {
    /// Mark `achievement` earned for `user` and pay its reward, once.
    ///
    /// Safe to retry and to race: of any number of concurrent calls exactly
    /// one returns `success = true`; the rest return `false` and change
    /// nothing.
    pub async fn award(&self, user: UserId, achievement: AchievementId) -> Result<AwardResult> {
        let definition = self.definition(achievement).await?;
        self.award_definition(user, &definition, AwardPath::Direct)
            .await
    }

    pub(crate) async fn award_definition(
        &self,
        user: UserId,
        definition: &AchievementDefinition,
        path: AwardPath,
    ) -> Result<AwardResult> {
        let success = self
            .store
            .award_if_unearned(
                user,
                definition.id,
                definition.effective_progress_max(),
                definition.xp_reward,
            )
            .await?;

        if success {
            self.issue_completed(user, definition, path);
        } else {
            self.note_award_conflict(user, definition, path);
        }

        Ok(AwardResult {
            success,
            achievement: success.then(|| definition.clone()),
        })
    }

    /// Report an award whose transition has already been committed.
    pub(crate) fn issue_completed(
        &self,
        user: UserId,
        definition: &AchievementDefinition,
        path: AwardPath,
    ) {
        metrics::achievements_awarded().add(
            1,
            &[
                KeyValue::new("trigger", definition.trigger.kind()),
                KeyValue::new("path", path.as_str()),
            ],
        );
        if let Ok(xp) = u64::try_from(definition.xp_reward) {
            metrics::xp_credited().add(xp, &[KeyValue::new("source", "award")]);
        }
        info!(
            user = %user,
            achievement = %definition.id,
            name = %definition.name,
            xp = definition.xp_reward,
            path = path.as_str(),
            "achievement earned"
        );
    }

    pub(crate) fn note_award_conflict(
        &self,
        user: UserId,
        definition: &AchievementDefinition,
        path: AwardPath,
    ) {
        metrics::award_conflicts().add(1, &[KeyValue::new("path", path.as_str())]);
        debug!(
            user = %user,
            achievement = %definition.id,
            "achievement already earned, award skipped"
        );
    }
}
