//! Progression span helpers.
//!
//! One span per trigger evaluation; awards are recorded as events on it so
//! a trace shows which action earned what.

use tracing::Span;

use crate::event::EventKind;
use crate::model::{AchievementId, UserId};

/// Start a span for one trigger evaluation.
///
/// The `progression.awarded` field is declared empty and filled in by
/// [`record_outcome`].
pub fn start_evaluation_span(user: UserId, event: &EventKind) -> Span {
    tracing::info_span!(
        "progression.evaluate",
        "progression.user_id" = %user,
        "progression.event" = %event,
        "progression.awarded" = tracing::field::Empty,
        "progression.errors" = tracing::field::Empty,
    )
}

/// Record an award as an event scoped to the given span.
pub fn record_award(span: &Span, achievement: AchievementId, xp: i64) {
    span.in_scope(|| {
        tracing::info!(achievement = %achievement, xp, "achievement_awarded");
    });
}

/// Record how many achievements were awarded and how many failed.
pub fn record_outcome(span: &Span, awarded: usize, errors: usize) {
    span.record("progression.awarded", awarded as u64);
    span.record("progression.errors", errors as u64);
}
