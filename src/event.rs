//! Activity events fed into the trigger evaluator.
//!
//! A single user action is reported once. A completed task is both the
//! exact `task_complete` event and one more count in the `"tasks"`
//! category; the evaluator checks both rules in the same pass.

use serde::{Deserialize, Serialize};

use crate::model::{ProjectId, TeamId};

/// What the user just did.
///
/// Completion events already count toward their category. Emitting
/// `Count("tasks")` after `TaskComplete` for the same action counts it twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "category", rename_all = "snake_case")]
pub enum EventKind {
    TaskComplete,
    ProjectComplete,
    LearningComplete,
    /// XP was credited; only threshold achievements respond.
    XpCredited,
    /// A generic counted category such as `"tasks"`.
    Count(String),
}

impl EventKind {
    /// The count category this event contributes to, if any.
    pub fn count_category(&self) -> Option<&str> {
        match self {
            EventKind::TaskComplete => Some("tasks"),
            EventKind::ProjectComplete => Some("projects"),
            EventKind::LearningComplete => Some("learning"),
            EventKind::XpCredited => None,
            EventKind::Count(category) => Some(category),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::TaskComplete => f.write_str("task_complete"),
            EventKind::ProjectComplete => f.write_str("project_complete"),
            EventKind::LearningComplete => f.write_str("learning_complete"),
            EventKind::XpCredited => f.write_str("xp_credited"),
            EventKind::Count(category) => f.write_str(category),
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = std::convert::Infallible;

    /// Trigger names map to their variants; anything else is a count category.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "task_complete" => EventKind::TaskComplete,
            "project_complete" => EventKind::ProjectComplete,
            "learning_complete" => EventKind::LearningComplete,
            "xp_credited" => EventKind::XpCredited,
            other => EventKind::Count(other.to_string()),
        })
    }
}

/// Where the event happened. Selects team- and project-scoped achievements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventContext {
    pub team: Option<TeamId>,
    pub project: Option<ProjectId>,
}

impl EventContext {
    /// No team or project: only global achievements apply.
    pub fn global() -> Self {
        Self::default()
    }

    pub fn team(mut self, team: TeamId) -> Self {
        self.team = Some(team);
        self
    }

    pub fn project(mut self, project: ProjectId) -> Self {
        self.project = Some(project);
        self
    }
}
