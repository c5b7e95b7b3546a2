//! The level curve.
//!
//! `xp_for_level(n) = 50·(n−1)²`, so level 1 starts at zero XP and every
//! total maps to exactly one level: `xp_for_level(l) ≤ xp < xp_for_level(l + 1)`.

/// XP scale of the quadratic curve.
pub const XP_CURVE_STEP: i64 = 50;

/// Cumulative XP at which `level` begins. Levels below 1 are treated as 1.
pub fn xp_for_level(level: i32) -> i64 {
    let n = i64::from(level.max(1)) - 1;
    XP_CURVE_STEP.saturating_mul(n).saturating_mul(n)
}

/// Level reached with `total_xp` cumulative XP. Never below 1.
pub fn level_for_xp(total_xp: i64) -> i32 {
    if total_xp <= 0 {
        return 1;
    }
    // Integer square root keeps the curve exact at every boundary.
    let steps = (total_xp / XP_CURVE_STEP).isqrt();
    i32::try_from(steps + 1).unwrap_or(i32::MAX)
}
