//! Consensus-wide constants shared across validation.

/// Expected spacing between stake-minted blocks, in seconds (network rule).
pub const STAKE_TARGET_SPACING: i64 = 10 * 60;
/// Upper bound on the stretched proof-of-work target spacing.
pub const TARGET_SPACING_WORK_MAX: i64 = STAKE_TARGET_SPACING * 12;
/// Stake age at which coin-day weight stops accruing.
pub const STAKE_MAX_AGE: i64 = 60 * 60 * 24 * 90;
/// Maximum tolerated clock drift between peers.
pub const MAX_CLOCK_DRIFT: i64 = 2 * 60 * 60;
/// Difficulty readjustment horizon, in seconds.
pub const TARGET_TIMESPAN: i64 = 7 * 24 * 60 * 60;
/// Ratio between a modifier interval and its selection sections.
pub const MODIFIER_INTERVAL_RATIO: i64 = 3;
/// Number of entropy bits harvested into one stake modifier.
pub const MODIFIER_BITS: usize = 64;
