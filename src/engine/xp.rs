//! XP/level accountant.

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Evaluation, ProgressionEngine};
use crate::error::{Error, Result};
use crate::event::{EventContext, EventKind};
use crate::model::{Period, UserId, UserProgressionState};
use crate::store::ProgressionStore;
use crate::telemetry::metrics;

/// Result of crediting XP outside of an award.
#[derive(Debug, Serialize)]
pub struct XpCredit {
    /// Totals after the credit.
    pub state: UserProgressionState,
    pub leveled_up: bool,
    /// Threshold achievements the credit unlocked.
    pub evaluation: Evaluation,
}

impl<S: ProgressionStore> ProgressionEngine<S> {
    /// Add `amount` XP to the user's total, weekly, and monthly counters.
    ///
    /// The level is recomputed in the same write. Threshold achievements in
    /// `context` are then re-evaluated; a failure there is reported in
    /// [`XpCredit::evaluation`] since the credit itself has already landed.
    pub async fn credit_xp(
        &self,
        user: UserId,
        amount: i64,
        context: &EventContext,
    ) -> Result<XpCredit> {
        if amount < 0 {
            return Err(Error::InvalidInput(format!(
                "xp amount must not be negative, got {amount}"
            )));
        }

        let (state, previous_level) = self.store.credit_xp(user, amount).await?;
        let leveled_up = state.level > previous_level;

        if let Ok(xp) = u64::try_from(amount) {
            metrics::xp_credited().add(xp, &[KeyValue::new("source", "direct")]);
        }
        if leveled_up {
            info!(user = %user, level = state.level, total_xp = state.total_xp, "level up");
        } else {
            debug!(user = %user, amount, total_xp = state.total_xp, "xp credited");
        }

        let evaluation = match self
            .evaluate_trigger(user, &EventKind::XpCredited, context)
            .await
        {
            Ok(evaluation) => evaluation,
            Err(error) => {
                warn!(user = %user, error = %error, "threshold check after xp credit failed");
                Evaluation::from_error(error)
            }
        };

        Ok(XpCredit {
            state,
            leveled_up,
            evaluation,
        })
    }

    /// Current totals for `user`. Users with no activity read as fresh.
    pub async fn user_state(&self, user: UserId) -> Result<UserProgressionState> {
        self.store.user_state(user).await
    }

    /// Zero the weekly or monthly counter for every user.
    ///
    /// Total XP and levels are untouched. Returns how many users changed.
    pub async fn reset_period_counters(&self, period: Period) -> Result<u64> {
        let changed = self.store.reset_period_counters(period).await?;
        info!(period = ?period, users = changed, "period counters reset");
        Ok(changed)
    }
}
