//! Single-writer chain worker and its request mailbox.

pub mod worker;

pub use worker::{spawn_chain_worker, ChainHandle, HandleError};
