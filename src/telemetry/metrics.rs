//! Metric instrument factories for ascent-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"ascent-rs"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for ascent-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("ascent-rs")
}

/// Counter: achievements earned.
/// Labels: `trigger` (trigger kind), `path` ("increment", "immediate" or "direct").
pub fn achievements_awarded() -> Counter<u64> {
    meter()
        .u64_counter("ascent.achievements.awarded")
        .with_description("Number of achievements earned")
        .build()
}

/// Counter: award attempts that found the achievement already earned.
/// Labels: `path`.
pub fn award_conflicts() -> Counter<u64> {
    meter()
        .u64_counter("ascent.achievements.award_conflicts")
        .with_description("Award attempts lost to an earlier or concurrent award")
        .build()
}

/// Counter: progress increments applied.
/// Labels: `trigger`.
pub fn progress_increments() -> Counter<u64> {
    meter()
        .u64_counter("ascent.progress.increments")
        .with_description("Number of progress increments")
        .build()
}

/// Counter: XP credited, in points.
/// Labels: `source` ("award" | "direct").
pub fn xp_credited() -> Counter<u64> {
    meter()
        .u64_counter("ascent.xp.credited")
        .with_description("Experience points credited")
        .build()
}

/// Counter: evaluation failures, per achievement or per call.
/// Labels: `stage` ("achievement" | "evaluation").
pub fn evaluation_failures() -> Counter<u64> {
    meter()
        .u64_counter("ascent.evaluation.failures")
        .with_description("Trigger evaluation failures")
        .build()
}

/// Counter: streak updates.
/// Labels: `change` (started | extended | reset | already_counted | out_of_order).
pub fn streak_updates() -> Counter<u64> {
    meter()
        .u64_counter("ascent.streak.updates")
        .with_description("Daily activity streak updates")
        .build()
}

/// Counter: leaderboard reads.
/// Labels: `kind` ("users" | "teams"), `metric`.
pub fn leaderboard_queries() -> Counter<u64> {
    meter()
        .u64_counter("ascent.leaderboard.queries")
        .with_description("Number of leaderboard queries")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("ascent.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
