//! Consensus constants, network parameters, and kernel protocol epochs.

pub mod constants;
pub mod money;
pub mod params;
pub mod protocol;
pub mod rewards;

pub use params::{chain_params, ChainParams, Checkpoint, Network};
pub use protocol::{is_protocol_v03, is_protocol_v04};
pub use rewards::proof_of_stake_reward;

pub type Hash256 = [u8; 32];
