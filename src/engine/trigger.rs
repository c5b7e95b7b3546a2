//! Trigger evaluation: turn one user action into progress and awards.

use std::collections::HashSet;
use std::time::Instant;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{Instrument, Span, debug, warn};

use super::ProgressionEngine;
use super::award::AwardPath;
use crate::error::{Error, Result};
use crate::event::{EventContext, EventKind};
use crate::model::{
    AchievementDefinition, AchievementId, AchievementView, Scope, TriggerMatch, UserId,
    UserProgressionState,
};
use crate::store::ProgressionStore;
use crate::telemetry::{metrics, progression};

/// One achievement that could not be evaluated.
#[derive(Debug, Serialize)]
pub struct AchievementFailure {
    /// `None` when the failure was not tied to a single achievement.
    pub achievement_id: Option<AchievementId>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Error,
}

fn serialize_error<S: serde::Serializer>(
    error: &Error,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// What a single evaluation did.
#[derive(Debug, Default, Serialize)]
pub struct Evaluation {
    /// Achievements earned by this call, in evaluation order.
    pub awarded: Vec<AchievementDefinition>,
    /// Per-achievement failures. Evaluation continued past each one.
    pub errors: Vec<AchievementFailure>,
}

impl Evaluation {
    pub(crate) fn from_error(error: Error) -> Self {
        Self {
            awarded: Vec::new(),
            errors: vec![AchievementFailure {
                achievement_id: None,
                error,
            }],
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn xp_awarded(&self) -> i64 {
        self.awarded.iter().map(|def| def.xp_reward).sum()
    }
}

/// Mutable state for one evaluation call.
struct Pass<'a> {
    user: UserId,
    earned: HashSet<AchievementId>,
    evaluation: Evaluation,
    span: &'a Span,
}

impl<S: ProgressionStore> ProgressionEngine<S> {
    /// Evaluate every active achievement in `context` against `event`.
    ///
    /// Achievements the user has already earned are skipped. A failure on
    /// one achievement is recorded in [`Evaluation::errors`] and does not stop
    /// the others; only failing to load the catalog or the user's progress
    /// fails the whole call.
    pub async fn evaluate_trigger(
        &self,
        user: UserId,
        event: &EventKind,
        context: &EventContext,
    ) -> Result<Evaluation> {
        let span = progression::start_evaluation_span(user, event);
        let started = Instant::now();

        let result = self
            .run_evaluation(user, event, context, &span)
            .instrument(span.clone())
            .await;

        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "evaluate_trigger")],
        );

        match &result {
            Ok(evaluation) => {
                progression::record_outcome(
                    &span,
                    evaluation.awarded.len(),
                    evaluation.errors.len(),
                );
            }
            Err(error) => {
                metrics::evaluation_failures().add(1, &[KeyValue::new("stage", "evaluation")]);
                warn!(user = %user, event = %event, error = %error, "trigger evaluation failed");
            }
        }

        result
    }

    /// Best-effort wrapper for user-facing handlers.
    ///
    /// Never fails: an unauthenticated caller or a failed evaluation yields
    /// an empty result, and the failure is logged. The handler's primary
    /// operation should never be undone because progression bookkeeping
    /// failed.
    pub async fn record_action(
        &self,
        user: Option<UserId>,
        event: &EventKind,
        context: &EventContext,
    ) -> Evaluation {
        let user = match super::require_user(user) {
            Ok(user) => user,
            Err(_) => {
                debug!(event = %event, "no authenticated user, skipping progression");
                return Evaluation::default();
            }
        };

        match self.evaluate_trigger(user, event, context).await {
            Ok(evaluation) => evaluation,
            Err(error) => Evaluation::from_error(error),
        }
    }

    /// Every achievement visible in `scope` with the user's progress on it.
    pub async fn get_achievements(
        &self,
        user: UserId,
        scope: Scope,
    ) -> Result<Vec<AchievementView>> {
        let definitions = self.store.active_achievements(scope).await?;
        let records = self.store.user_progress(user).await?;

        Ok(definitions
            .into_iter()
            .map(|def| {
                let record = records.iter().find(|r| r.achievement_id == def.id);
                AchievementView::new(def, record)
            })
            .collect())
    }

    async fn run_evaluation(
        &self,
        user: UserId,
        event: &EventKind,
        context: &EventContext,
        span: &Span,
    ) -> Result<Evaluation> {
        let candidates = self.candidates(context).await?;
        if candidates.is_empty() {
            debug!("no active achievements in scope");
            return Ok(Evaluation::default());
        }

        let earned = self
            .store
            .user_progress(user)
            .await?
            .into_iter()
            .filter(|record| record.is_earned())
            .map(|record| record.achievement_id)
            .collect();

        let mut pass = Pass {
            user,
            earned,
            evaluation: Evaluation::default(),
            span,
        };

        // Only thresholds read the user's totals. Without them they stay
        // unmatched and the rest of the pass still runs.
        let mut thresholds: Vec<&AchievementDefinition> = candidates
            .iter()
            .filter(|def| def.trigger.is_immediate())
            .collect();
        let mut state = None;
        if !thresholds.is_empty() {
            match self.store.user_state(user).await {
                Ok(current) => state = Some(current),
                Err(error) => {
                    self.note_failure(&mut pass, None, error);
                    thresholds.clear();
                }
            }
        }

        let all: Vec<&AchievementDefinition> = candidates.iter().collect();
        let mut credited = self.evaluate_pass(&mut pass, event, &all, state.as_ref()).await;

        // Rewards can push the user over a threshold; re-check until stable.
        while credited && !thresholds.is_empty() {
            let state = match self.store.user_state(user).await {
                Ok(state) => state,
                Err(error) => {
                    self.note_failure(&mut pass, None, error);
                    break;
                }
            };
            credited = self
                .evaluate_pass(&mut pass, &EventKind::XpCredited, &thresholds, Some(&state))
                .await;
        }

        Ok(pass.evaluation)
    }

    /// Active global achievements plus those of the event's team and project.
    async fn candidates(&self, context: &EventContext) -> Result<Vec<AchievementDefinition>> {
        let mut scopes = vec![Scope::Global];
        scopes.extend(context.team.map(Scope::Team));
        scopes.extend(context.project.map(Scope::Project));

        let mut candidates = Vec::new();
        for scope in scopes {
            candidates.extend(self.store.active_achievements(scope).await?);
        }
        Ok(candidates)
    }

    /// Returns whether any award in this pass credited XP.
    async fn evaluate_pass(
        &self,
        pass: &mut Pass<'_>,
        event: &EventKind,
        candidates: &[&AchievementDefinition],
        state: Option<&UserProgressionState>,
    ) -> bool {
        let mut credited = false;

        for &definition in candidates {
            if pass.earned.contains(&definition.id) {
                continue;
            }

            let outcome = match definition.trigger.evaluate(event, state) {
                TriggerMatch::NoMatch => continue,
                TriggerMatch::Increment => self.advance(pass.user, definition).await,
                TriggerMatch::AwardNow => self
                    .award_definition(pass.user, definition, AwardPath::Immediate)
                    .await
                    .map(|result| result.success),
            };

            match outcome {
                Ok(true) => {
                    progression::record_award(pass.span, definition.id, definition.xp_reward);
                    pass.earned.insert(definition.id);
                    pass.evaluation.awarded.push(definition.clone());
                    credited |= definition.xp_reward > 0;
                }
                Ok(false) => {}
                Err(error) => self.note_failure(pass, Some(definition.id), error),
            }
        }

        credited
    }

    /// Count one step toward `definition`. Returns true if this step earned it.
    async fn advance(&self, user: UserId, definition: &AchievementDefinition) -> Result<bool> {
        match self.increment_for(user, definition, 1).await {
            Ok(outcome) if outcome.just_completed => {
                self.issue_completed(user, definition, AwardPath::Increment);
                Ok(true)
            }
            Ok(_) => Ok(false),
            // Another request earned it between our read and our write.
            Err(Error::AlreadyEarned { .. }) => {
                self.note_award_conflict(user, definition, AwardPath::Increment);
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    fn note_failure(&self, pass: &mut Pass<'_>, achievement: Option<AchievementId>, error: Error) {
        metrics::evaluation_failures().add(1, &[KeyValue::new("stage", "achievement")]);
        warn!(
            user = %pass.user,
            achievement = ?achievement,
            error = %error,
            "achievement evaluation failed, continuing"
        );
        pass.evaluation.errors.push(AchievementFailure {
            achievement_id: achievement,
            error,
        });
    }
}
