//! Achievement catalog entries and their trigger conditions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AchievementId, ProjectId, TeamId, UserProgressionState};
use crate::error::{Error, Result};
use crate::event::EventKind;

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// A named, rewarded accomplishment. Immutable while an evaluation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub name: String,
    pub description: String,

    /// Which events may see this achievement at all.
    pub scope: Scope,

    /// What causes progress or an award.
    pub trigger: Trigger,

    /// Events needed to complete an incrementing achievement. Zero or unset
    /// means the first matching event completes it.
    pub progress_max: Option<i64>,

    /// XP paid once, when the achievement is earned.
    pub xp_reward: i64,

    pub is_active: bool,

    /// Display and evaluation order within a scope.
    pub order_index: i32,
}

impl AchievementDefinition {
    /// Start a global, active definition with no reward and a fresh id.
    pub fn new(name: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            id: AchievementId::new(),
            name: name.into(),
            description: String::new(),
            scope: Scope::Global,
            trigger,
            progress_max: None,
            xp_reward: 0,
            is_active: true,
            order_index: 0,
        }
    }

    pub fn id(mut self, id: AchievementId) -> Self {
        self.id = id;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn progress_max(mut self, max: i64) -> Self {
        self.progress_max = Some(max);
        self
    }

    pub fn xp_reward(mut self, xp: i64) -> Self {
        self.xp_reward = xp;
        self
    }

    pub fn order_index(mut self, index: i32) -> Self {
        self.order_index = index;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// The progress needed to earn this achievement, never below 1.
    ///
    /// Threshold achievements are awarded outright, so they always use 1.
    pub fn effective_progress_max(&self) -> i64 {
        if self.trigger.is_immediate() {
            return 1;
        }
        self.progress_max.filter(|max| *max > 0).unwrap_or(1)
    }

    /// Reject definitions the engine cannot evaluate meaningfully.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "achievement {} has an empty name",
                self.id
            )));
        }
        if self.xp_reward < 0 {
            return Err(Error::InvalidDefinition(format!(
                "achievement {} has a negative xp_reward",
                self.id
            )));
        }
        match &self.trigger {
            Trigger::LevelThreshold { level } if *level < 1 => Err(Error::InvalidDefinition(
                format!("achievement {} has level threshold {level} < 1", self.id),
            )),
            Trigger::XpThreshold { xp } if *xp < 0 => Err(Error::InvalidDefinition(format!(
                "achievement {} has negative xp threshold {xp}",
                self.id
            ))),
            Trigger::CountBased { category } if category.trim().is_empty() => Err(
                Error::InvalidDefinition(format!("achievement {} has an empty category", self.id)),
            ),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Visibility of an achievement. Global achievements apply to every event;
/// team and project achievements only to events naming that team or project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Team(TeamId),
    Project(ProjectId),
}

impl Scope {
    /// Storage name of the scope kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Team(_) => "team",
            Scope::Project(_) => "project",
        }
    }

    /// The team or project id, if any.
    pub fn scope_ref(&self) -> Option<Uuid> {
        match self {
            Scope::Global => None,
            Scope::Team(id) => Some(id.0),
            Scope::Project(id) => Some(id.0),
        }
    }

    /// Rebuild a scope from its stored kind and reference.
    pub fn from_parts(kind: &str, scope_ref: Option<Uuid>) -> Result<Self> {
        match (kind, scope_ref) {
            ("global", None) => Ok(Scope::Global),
            ("team", Some(id)) => Ok(Scope::Team(TeamId(id))),
            ("project", Some(id)) => Ok(Scope::Project(ProjectId(id))),
            ("global", Some(_)) => Err(Error::InvalidDefinition(
                "global scope cannot carry a scope_ref".to_string(),
            )),
            ("team" | "project", None) => Err(Error::InvalidDefinition(format!(
                "{kind} scope requires a scope_ref"
            ))),
            (other, _) => Err(Error::InvalidDefinition(format!("unknown scope: {other}"))),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Team(id) => write!(f, "team:{id}"),
            Scope::Project(id) => write!(f, "project:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// The condition class that causes progress or an award.
///
/// Each variant carries only the data its rule needs, so adding a trigger
/// kind forces every match over it to be revisited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// One step per completed task.
    TaskComplete,
    /// One step per completed project.
    ProjectComplete,
    /// One step per completed learning unit.
    LearningComplete,
    /// Awarded once the user's level reaches `level`.
    LevelThreshold { level: i64 },
    /// Awarded once the user's cumulative XP reaches `xp`.
    XpThreshold { xp: i64 },
    /// One step per event counted under `category` (e.g. "tasks").
    CountBased { category: String },
}

/// How a trigger responds to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMatch {
    /// The event is irrelevant to this achievement.
    NoMatch,
    /// Advance progress by one step.
    Increment,
    /// Award outright, skipping incremental progress.
    AwardNow,
}

impl Trigger {
    /// Threshold triggers are awarded outright instead of counted.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Trigger::LevelThreshold { .. } | Trigger::XpThreshold { .. })
    }

    /// Decide whether `event` advances or completes this trigger.
    ///
    /// Threshold triggers ignore the event kind and look only at the user's
    /// current totals; without a state they never match.
    pub fn evaluate(&self, event: &EventKind, state: Option<&UserProgressionState>) -> TriggerMatch {
        let matched = match self {
            Trigger::TaskComplete => *event == EventKind::TaskComplete,
            Trigger::ProjectComplete => *event == EventKind::ProjectComplete,
            Trigger::LearningComplete => *event == EventKind::LearningComplete,
            Trigger::CountBased { category } => event.count_category() == Some(category.as_str()),
            Trigger::LevelThreshold { level } => {
                return match state {
                    Some(s) if i64::from(s.level) >= *level => TriggerMatch::AwardNow,
                    _ => TriggerMatch::NoMatch,
                };
            }
            Trigger::XpThreshold { xp } => {
                return match state {
                    Some(s) if s.total_xp >= *xp => TriggerMatch::AwardNow,
                    _ => TriggerMatch::NoMatch,
                };
            }
        };

        if matched {
            TriggerMatch::Increment
        } else {
            TriggerMatch::NoMatch
        }
    }

    /// Storage name of the trigger kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::TaskComplete => "task_complete",
            Trigger::ProjectComplete => "project_complete",
            Trigger::LearningComplete => "learning_complete",
            Trigger::LevelThreshold { .. } => "level_threshold",
            Trigger::XpThreshold { .. } => "xp_threshold",
            Trigger::CountBased { .. } => "count_based",
        }
    }

    /// Threshold value, for the kinds that have one.
    pub fn value(&self) -> Option<i64> {
        match self {
            Trigger::LevelThreshold { level } => Some(*level),
            Trigger::XpThreshold { xp } => Some(*xp),
            _ => None,
        }
    }

    /// Counted category, for count-based triggers.
    pub fn category(&self) -> Option<&str> {
        match self {
            Trigger::CountBased { category } => Some(category),
            _ => None,
        }
    }

    /// Rebuild a trigger from its stored columns.
    pub fn from_parts(kind: &str, value: Option<i64>, category: Option<String>) -> Result<Self> {
        let missing = |what: &str| Error::InvalidDefinition(format!("{kind} trigger requires {what}"));

        match kind {
            "task_complete" => Ok(Trigger::TaskComplete),
            "project_complete" => Ok(Trigger::ProjectComplete),
            "learning_complete" => Ok(Trigger::LearningComplete),
            "level_threshold" => Ok(Trigger::LevelThreshold {
                level: value.ok_or_else(|| missing("a trigger_value"))?,
            }),
            "xp_threshold" => Ok(Trigger::XpThreshold {
                xp: value.ok_or_else(|| missing("a trigger_value"))?,
            }),
            "count_based" => Ok(Trigger::CountBased {
                category: category.ok_or_else(|| missing("a category"))?,
            }),
            other => Err(Error::InvalidDefinition(format!("unknown trigger type: {other}"))),
        }
    }
}
