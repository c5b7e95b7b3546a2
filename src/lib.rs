//! # ascent-rs
//!
//! Progression engine for a productivity app: achievements earned from user
//! activity, experience points and levels, daily streaks, and leaderboards.
//!
//! The engine runs over any [`store::ProgressionStore`]. [`db::Db`] is the
//! Postgres store; [`store::MemoryStore`] backs tests and local tooling.

pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod store;
pub mod telemetry;
