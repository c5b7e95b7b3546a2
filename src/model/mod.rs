//! Core data model.
//!
//! Achievements are defined once in the catalog and tracked per user in the
//! progress ledger. Users accumulate XP, levels, and streaks, which feed the
//! leaderboards.

pub mod achievement;
pub mod leaderboard;
pub mod level;
pub mod progress;
pub mod user;

pub use achievement::{AchievementDefinition, Scope, Trigger, TriggerMatch};
pub use leaderboard::{
    Leaderboard, LeaderboardEntry, LeaderboardScope, Metric, Period, RankedUser, TeamStanding,
};
pub use level::{level_for_xp, xp_for_level};
pub use progress::{AchievementView, IncrementOutcome, ProgressRecord, ProgressStatus};
pub use user::{StreakChange, UserProgressionState};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Declares a UUID newtype. Ordering follows the UUID byte order, which is
/// also how Postgres orders `uuid` columns, so id tie-breaks agree between
/// stores.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// A user of the product. Resolved by the caller; the engine never
    /// looks up the current session itself.
    UserId
);
uuid_id!(TeamId);
uuid_id!(ProjectId);
uuid_id!(
    /// Catalog identifier of an achievement.
    AchievementId
);
