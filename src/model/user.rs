//! Per-user progression totals: XP counters, level, and activity streak.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::level::level_for_xp;
use super::{Metric, UserId};

/// XP, level, and streak state for one user.
///
/// `level` is always `level_for_xp(total_xp)`. `longest_streak` is a
/// high-water mark and may exceed `current_streak`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgressionState {
    pub user_id: UserId,
    pub total_xp: i64,
    pub weekly_xp: i64,
    pub monthly_xp: i64,
    pub level: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_active_date: Option<NaiveDate>,
}

/// What a call to [`UserProgressionState::touch`] did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First recorded activity.
    Started,
    /// Active yesterday, so the streak grew by one.
    Extended,
    /// A gap of two or more days; the streak restarted at 1.
    Reset,
    /// Already counted today. Nothing changed.
    AlreadyCounted,
    /// The date is before the last recorded activity. Nothing changed.
    OutOfOrder,
}

impl StreakChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakChange::Started => "started",
            StreakChange::Extended => "extended",
            StreakChange::Reset => "reset",
            StreakChange::AlreadyCounted => "already_counted",
            StreakChange::OutOfOrder => "out_of_order",
        }
    }

    /// Whether the stored streak was modified.
    pub fn is_update(&self) -> bool {
        !matches!(self, StreakChange::AlreadyCounted | StreakChange::OutOfOrder)
    }
}

impl UserProgressionState {
    /// A user with no XP and no activity.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total_xp: 0,
            weekly_xp: 0,
            monthly_xp: 0,
            level: 1,
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
        }
    }

    /// Set cumulative XP and its derived level.
    pub fn with_total_xp(mut self, total_xp: i64) -> Self {
        self.total_xp = total_xp;
        self.level = level_for_xp(total_xp);
        self
    }

    /// Add `amount` to every XP counter and recompute the level.
    pub fn credit(&mut self, amount: i64) {
        self.total_xp = self.total_xp.saturating_add(amount);
        self.weekly_xp = self.weekly_xp.saturating_add(amount);
        self.monthly_xp = self.monthly_xp.saturating_add(amount);
        self.level = level_for_xp(self.total_xp);
    }

    /// Count activity on `today`.
    pub fn touch(&mut self, today: NaiveDate) -> StreakChange {
        let change = match self.last_active_date {
            Some(last) if last == today => return StreakChange::AlreadyCounted,
            Some(last) if last > today => return StreakChange::OutOfOrder,
            Some(last) if last.succ_opt() == Some(today) => {
                self.current_streak = self.current_streak.saturating_add(1);
                StreakChange::Extended
            }
            Some(_) => {
                self.current_streak = 1;
                StreakChange::Reset
            }
            None => {
                self.current_streak = 1;
                StreakChange::Started
            }
        };

        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_active_date = Some(today);
        change
    }

    /// Value of a leaderboard metric.
    pub fn metric(&self, metric: Metric) -> i64 {
        match metric {
            Metric::TotalXp => self.total_xp,
            Metric::WeeklyXp => self.weekly_xp,
            Metric::MonthlyXp => self.monthly_xp,
        }
    }
}
