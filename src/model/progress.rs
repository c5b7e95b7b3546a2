//! Per-(user, achievement) progress ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AchievementDefinition, AchievementId, UserId};

/// Progress of one user toward one achievement.
///
/// Invariants: `0 ≤ progress ≤ progress_max`, `earned_at` is set exactly
/// when `progress ≥ progress_max`, and `xp_awarded` is written once, in the
/// same transition that sets `earned_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub achievement_id: AchievementId,
    pub progress: i64,
    pub progress_max: i64,
    pub earned_at: Option<DateTime<Utc>>,
    pub xp_awarded: i64,
}

/// Lifecycle of a progress record. `Earned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Earned,
}

impl ProgressRecord {
    /// A fresh record at zero progress.
    pub fn new(user_id: UserId, achievement_id: AchievementId, progress_max: i64) -> Self {
        Self {
            user_id,
            achievement_id,
            progress: 0,
            progress_max: progress_max.max(1),
            earned_at: None,
            xp_awarded: 0,
        }
    }

    pub fn is_earned(&self) -> bool {
        self.earned_at.is_some()
    }

    pub fn status(&self) -> ProgressStatus {
        if self.is_earned() {
            ProgressStatus::Earned
        } else if self.progress > 0 {
            ProgressStatus::InProgress
        } else {
            ProgressStatus::NotStarted
        }
    }
}

/// Result of an atomic progress increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementOutcome {
    /// The record as written by the increment.
    pub record: ProgressRecord,
    /// True only for the call that raised progress to `progress_max`.
    pub just_completed: bool,
}

impl IncrementOutcome {
    pub fn new_progress(&self) -> i64 {
        self.record.progress
    }
}

/// An achievement joined with one user's progress toward it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementView {
    pub achievement: AchievementDefinition,
    pub progress: i64,
    pub progress_max: i64,
    pub status: ProgressStatus,
    pub earned_at: Option<DateTime<Utc>>,
    pub xp_awarded: i64,
}

impl AchievementView {
    /// Join a definition with the user's record, if one exists yet.
    pub fn new(achievement: AchievementDefinition, record: Option<&ProgressRecord>) -> Self {
        match record {
            Some(record) => Self {
                progress: record.progress,
                progress_max: record.progress_max,
                status: record.status(),
                earned_at: record.earned_at,
                xp_awarded: record.xp_awarded,
                achievement,
            },
            None => Self {
                progress: 0,
                progress_max: achievement.effective_progress_max(),
                status: ProgressStatus::NotStarted,
                earned_at: None,
                xp_awarded: 0,
                achievement,
            },
        }
    }
}
