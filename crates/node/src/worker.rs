//! The chain worker task.
//!
//! One task owns the `ChainState` and processes typed requests from a
//! bounded mailbox, one at a time. Callers get a oneshot reply and block
//! on it, so every read observes the state after all prior admissions.
//! There is no other way to touch the state: the mailbox is the lock.

use std::time::{SystemTime, UNIX_EPOCH};

use ppcd_chainstate::state::{ChainState, ChainStateError};
use ppcd_consensus::Hash256;
use ppcd_log::{log_debug, log_info};
use ppcd_primitives::block::Block;
use ppcd_storage::KeyValueStore;
use tokio::sync::{mpsc, oneshot};

const MAILBOX_DEPTH: usize = 64;

/// A command for the chain worker, each carrying its reply slot.
enum ChainRequest {
    AdmitBlock {
        block: Box<Block>,
        reply: oneshot::Sender<Result<Hash256, ChainStateError>>,
    },
    NextRequiredTarget {
        proof_of_stake: bool,
        reply: oneshot::Sender<Result<u32, ChainStateError>>,
    },
    KernelStakeModifier {
        block_hash: Hash256,
        reply: oneshot::Sender<Result<u64, ChainStateError>>,
    },
    LastPowReward {
        reply: oneshot::Sender<Result<i64, ChainStateError>>,
    },
    Difficulty {
        proof_of_stake: bool,
        reply: oneshot::Sender<Result<f64, ChainStateError>>,
    },
}

#[derive(Debug)]
pub enum HandleError {
    /// The worker is gone; the node is shutting down.
    WorkerGone,
    Chain(ChainStateError),
}

impl std::fmt::Display for HandleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleError::WorkerGone => write!(f, "chain worker stopped"),
            HandleError::Chain(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for HandleError {}

impl From<ChainStateError> for HandleError {
    fn from(err: ChainStateError) -> Self {
        HandleError::Chain(err)
    }
}

#[derive(Clone)]
pub struct ChainHandle {
    sender: mpsc::Sender<ChainRequest>,
}

impl ChainHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, ChainStateError>>) -> ChainRequest,
    ) -> Result<T, HandleError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| HandleError::WorkerGone)?;
        response
            .await
            .map_err(|_| HandleError::WorkerGone)?
            .map_err(HandleError::Chain)
    }

    pub async fn admit_block(&self, block: Block) -> Result<Hash256, HandleError> {
        self.request(|reply| ChainRequest::AdmitBlock {
            block: Box::new(block),
            reply,
        })
        .await
    }

    /// Compact bits required of the next block of the given type.
    pub async fn next_required_target(&self, proof_of_stake: bool) -> Result<u32, HandleError> {
        self.request(|reply| ChainRequest::NextRequiredTarget {
            proof_of_stake,
            reply,
        })
        .await
    }

    /// The stake modifier hashing kernels sourced from `block_hash`.
    pub async fn kernel_stake_modifier(&self, block_hash: Hash256) -> Result<u64, HandleError> {
        self.request(|reply| ChainRequest::KernelStakeModifier { block_hash, reply })
            .await
    }

    pub async fn last_pow_reward(&self) -> Result<i64, HandleError> {
        self.request(|reply| ChainRequest::LastPowReward { reply })
            .await
    }

    pub async fn difficulty(&self, proof_of_stake: bool) -> Result<f64, HandleError> {
        self.request(|reply| ChainRequest::Difficulty {
            proof_of_stake,
            reply,
        })
        .await
    }
}

/// Spawns the worker that owns `state`. Dropping every handle stops it.
pub fn spawn_chain_worker<S>(mut state: ChainState<S>) -> ChainHandle
where
    S: KeyValueStore + 'static,
{
    let (sender, mut mailbox) = mpsc::channel(MAILBOX_DEPTH);
    tokio::spawn(async move {
        log_info!("chain worker started");
        while let Some(request) = mailbox.recv().await {
            match request {
                ChainRequest::AdmitBlock { block, reply } => {
                    let result = state.admit_block(&block, adjusted_time());
                    let _ = reply.send(result);
                }
                ChainRequest::NextRequiredTarget {
                    proof_of_stake,
                    reply,
                } => {
                    let _ = reply.send(state.next_required_bits(proof_of_stake));
                }
                ChainRequest::KernelStakeModifier { block_hash, reply } => {
                    let _ =
                        reply.send(state.kernel_stake_modifier(&block_hash, adjusted_time()));
                }
                ChainRequest::LastPowReward { reply } => {
                    let _ = reply.send(state.last_pow_reward());
                }
                ChainRequest::Difficulty {
                    proof_of_stake,
                    reply,
                } => {
                    let _ = reply.send(state.difficulty(proof_of_stake));
                }
            }
        }
        log_debug!("chain worker mailbox closed");
    });
    ChainHandle { sender }
}

/// Network-adjusted time; peer offsets live outside the consensus core,
/// so the local clock stands in for them here.
fn adjusted_time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
