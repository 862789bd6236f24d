//! Compact-target arithmetic, per-block trust, and difficulty retargeting.

pub mod compact;
pub mod retarget;
pub mod reward;
pub mod trust;

pub use compact::{
    compact_to_u256, difficulty_ratio, target_to_compact, u256_to_compact, CompactError,
};
pub use retarget::{next_target_bits, RetargetAncestors};
pub use reward::proof_of_work_reward;
pub use trust::block_trust;
