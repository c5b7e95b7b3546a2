//! Error types for ascent-rs.

use thiserror::Error;

use crate::model::{AchievementId, UserId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no authenticated user")]
    Unauthenticated,

    #[error("achievement not found: {0}")]
    AchievementNotFound(AchievementId),

    #[error("achievement {achievement} already earned by user {user}")]
    AlreadyEarned {
        user: UserId,
        achievement: AchievementId,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("invalid achievement definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
