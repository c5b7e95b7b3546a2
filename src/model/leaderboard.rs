//! Leaderboard metrics, scopes, and ranked views.
//!
//! Entries are derived on demand from persisted XP totals and never stored.

use serde::{Deserialize, Serialize};

use super::{TeamId, UserId};
use crate::error::{Error, Result};

/// XP counter a leaderboard is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalXp,
    WeeklyXp,
    MonthlyXp,
}

impl Metric {
    /// Column holding this metric in `user_progression`.
    pub fn column(&self) -> &'static str {
        match self {
            Metric::TotalXp => "total_xp",
            Metric::WeeklyXp => "weekly_xp",
            Metric::MonthlyXp => "monthly_xp",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

impl std::str::FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "total_xp" | "total" => Ok(Metric::TotalXp),
            "weekly_xp" | "weekly" => Ok(Metric::WeeklyXp),
            "monthly_xp" | "monthly" => Ok(Metric::MonthlyXp),
            other => Err(Error::InvalidInput(format!("unknown metric: {other}"))),
        }
    }
}

/// Reset window of the periodic XP counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Weekly,
    Monthly,
}

impl Period {
    pub fn metric(&self) -> Metric {
        match self {
            Period::Weekly => Metric::WeeklyXp,
            Period::Monthly => Metric::MonthlyXp,
        }
    }
}

impl std::str::FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            other => Err(Error::InvalidInput(format!("unknown period: {other}"))),
        }
    }
}

/// Population a user leaderboard ranks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardScope {
    /// Every user with a progression record.
    #[default]
    Global,
    /// Members of one team.
    Team(TeamId),
}

impl LeaderboardScope {
    pub fn team(&self) -> Option<TeamId> {
        match self {
            LeaderboardScope::Global => None,
            LeaderboardScope::Team(id) => Some(*id),
        }
    }
}

/// One row of a user leaderboard. `rank` is the 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub rank: u64,
    pub metric_value: i64,
}

/// One row of a team leaderboard, ordered by summed member XP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamStanding {
    pub team_id: TeamId,
    pub rank: u64,
    pub metric_value: i64,
}

/// Where a specific user stands, whether or not they are on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedUser {
    pub user_id: UserId,
    /// `1 + count(users with a strictly greater metric)`. Ties share it.
    pub rank: u64,
    /// Position under the id tie-break; matches `LeaderboardEntry::rank`.
    pub position: u64,
    pub metric_value: i64,
}

/// A page of a leaderboard plus the requesting user's standing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaderboard {
    pub metric: Metric,
    pub scope: LeaderboardScope,
    pub entries: Vec<LeaderboardEntry>,
    pub current_user: Option<RankedUser>,
}
