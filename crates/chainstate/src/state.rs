//! Chain state: the single-writer admission pipeline and its queries.
//!
//! One logical worker drives admission sequentially; read-side queries go
//! through the same owner, so the index never needs internal locking.

use std::collections::HashSet;
use std::sync::Arc;

use ppcd_consensus::{ChainParams, Hash256};
use ppcd_difficulty::{
    block_trust, difficulty_ratio, next_target_bits, proof_of_work_reward, RetargetAncestors,
};
use ppcd_kernel::entropy::stake_entropy_bit;
use ppcd_kernel::modifier::{
    check_stake_modifier_checkpoints, compute_next_stake_modifier, stake_modifier_checksum,
};
use ppcd_kernel::stake::{check_stake_kernel_hash, get_kernel_stake_modifier};
use ppcd_kernel::{ChainView, IndexedBlock, InputView, KernelError, SpentInput};
use ppcd_log::{log_debug, log_info};
use ppcd_primitives::block::Block;
use ppcd_primitives::encoding::DecodeError;
use ppcd_primitives::meta::Meta;
use ppcd_primitives::outpoint::OutPoint;
use ppcd_primitives::transaction::Transaction;
use ppcd_storage::{KeyValueStore, StoreError, WriteBatch};
use primitive_types::U256;

use crate::genesis::{genesis_block, genesis_meta};
use crate::index::{BlockIndexEntry, ChainIndex, ChainTip, TxLocation};
use crate::validation::{InputSignatureVerifier, RuleError, ValueRuleError};

/// Identity of a stake: the kernel outpoint and the coinstake timestamp.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StakeId {
    pub prevout: OutPoint,
    pub time: i64,
}

#[derive(Debug)]
pub enum ChainStateError {
    Store(StoreError),
    Decode(DecodeError),
    Kernel(KernelError),
    Rule(RuleError),
    /// The block's parent is not in the index; the caller may orphan it.
    IndexMiss,
    /// An input's previous transaction is unknown to the main chain.
    UnknownInput,
    /// The kernel hash does not meet the weighted target.
    KernelMiss,
    /// The computed modifier checksum contradicts a hard checkpoint.
    CheckpointMismatch { height: i64 },
    /// There is no best block yet.
    EmptyChain,
}

impl std::fmt::Display for ChainStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainStateError::Store(err) => write!(f, "{err}"),
            ChainStateError::Decode(err) => write!(f, "{err}"),
            ChainStateError::Kernel(err) => write!(f, "{err}"),
            ChainStateError::Rule(err) => write!(f, "{err}"),
            ChainStateError::IndexMiss => write!(f, "parent block not in index"),
            ChainStateError::UnknownInput => write!(f, "input transaction not found"),
            ChainStateError::KernelMiss => write!(f, "kernel hash above weighted target"),
            ChainStateError::CheckpointMismatch { height } => {
                write!(f, "rejected by stake modifier checkpoint at height {height}")
            }
            ChainStateError::EmptyChain => write!(f, "no best block"),
        }
    }
}

impl std::error::Error for ChainStateError {}

impl From<StoreError> for ChainStateError {
    fn from(err: StoreError) -> Self {
        ChainStateError::Store(err)
    }
}

impl From<DecodeError> for ChainStateError {
    fn from(err: DecodeError) -> Self {
        ChainStateError::Decode(err)
    }
}

impl From<KernelError> for ChainStateError {
    fn from(err: KernelError) -> Self {
        ChainStateError::Kernel(err)
    }
}

impl From<RuleError> for ChainStateError {
    fn from(err: RuleError) -> Self {
        ChainStateError::Rule(err)
    }
}

impl From<ValueRuleError> for ChainStateError {
    fn from(err: ValueRuleError) -> Self {
        match err {
            ValueRuleError::Rule(err) => ChainStateError::Rule(err),
            ValueRuleError::Kernel(err) => ChainStateError::Kernel(err),
        }
    }
}

pub struct ChainState<S> {
    params: ChainParams,
    index: ChainIndex<S>,
    store: Arc<S>,
    /// Stakes seen on the main chain.
    stake_seen: HashSet<StakeId>,
    /// Stakes seen only through orphan blocks.
    stake_seen_orphan: HashSet<StakeId>,
    input_verifier: Option<Box<dyn InputSignatureVerifier + Send + Sync>>,
}

impl<S: KeyValueStore> ChainState<S> {
    pub fn new(store: Arc<S>, params: ChainParams) -> Self {
        Self {
            params,
            index: ChainIndex::new(Arc::clone(&store)),
            store,
            stake_seen: HashSet::new(),
            stake_seen_orphan: HashSet::new(),
            input_verifier: None,
        }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn set_input_verifier(
        &mut self,
        verifier: Box<dyn InputSignatureVerifier + Send + Sync>,
    ) {
        self.input_verifier = Some(verifier);
    }

    pub fn best_block(&self) -> Result<Option<ChainTip>, ChainStateError> {
        Ok(self.index.best_block()?)
    }

    /// Inserts the network's genesis block with its hard-coded metadata.
    pub fn insert_genesis(&mut self) -> Result<Hash256, ChainStateError> {
        let block = genesis_block(&self.params);
        let hash = block.header.hash();
        let meta = genesis_meta();

        let entry = BlockIndexEntry {
            prev_hash: [0u8; 32],
            height: 0,
            version: block.header.version,
            time: block.header.time,
            bits: block.header.bits,
            chain_trust: meta.chain_trust.to_big_endian(),
            meta,
        };

        let mut batch = WriteBatch::new();
        self.index.put_entry(&mut batch, &hash, &entry);
        self.index.set_height_hash(&mut batch, 0, &hash);
        self.index
            .put_block_bytes(&mut batch, &hash, block.consensus_encode());
        self.index.put_tx_location(
            &mut batch,
            &block.transactions[0].txid(),
            &TxLocation {
                block_hash: hash,
                index: 0,
            },
        );
        self.index.set_best_block(&mut batch, &hash);
        self.store.write_batch(&batch)?;

        log_info!("inserted {} genesis block", self.params.network.name());
        Ok(hash)
    }

    /// Admits a block on top of its indexed parent, populating all
    /// auxiliary metadata: proof-of-stake hash, entropy bit, stake
    /// modifier and checksum, mint and money supply, transaction offsets,
    /// and cumulative trust.
    pub fn admit_block(
        &mut self,
        block: &Block,
        adjusted_time: i64,
    ) -> Result<Hash256, ChainStateError> {
        let hash = block.header.hash();
        let prev_hash = block.header.prev_block;
        let prev = self
            .index
            .entry(&prev_hash)?
            .ok_or(ChainStateError::IndexMiss)?;
        let height = prev.height + 1;

        let mut meta = Meta::default();

        let proof_of_stake = block.is_proof_of_stake();
        if proof_of_stake {
            let hash_proof_of_stake = self.check_tx_proof_of_stake(
                &block.transactions[1],
                block.header.bits,
                adjusted_time,
            )?;
            meta.set_proof_of_stake(true);
            meta.hash_proof_of_stake = hash_proof_of_stake;
        }

        let entropy_bit = stake_entropy_bit(
            self.params.network,
            &hash,
            &block.signature,
            block.header.time as i64,
        );
        meta.set_stake_entropy_bit(entropy_bit);

        let (stake_modifier, generated) = compute_next_stake_modifier(
            &*self,
            &self.params,
            block.header.time as i64,
            &prev_hash,
        )?;
        meta.stake_modifier = stake_modifier;
        meta.set_generated_stake_modifier(generated);

        meta.stake_modifier_checksum =
            stake_modifier_checksum(Some(prev.meta.stake_modifier_checksum), &meta);
        if !check_stake_modifier_checkpoints(&self.params, height, meta.stake_modifier_checksum)
        {
            return Err(ChainStateError::CheckpointMismatch { height });
        }

        let (mint, money_supply) = self.mint_and_money_supply(block, prev.meta.money_supply)?;
        meta.mint = mint;
        meta.money_supply = money_supply;
        meta.tx_offsets = block.tx_offsets();

        let chain_trust =
            prev.chain_trust_value() + block_trust(block.header.bits, proof_of_stake);
        meta.chain_trust = chain_trust;

        log_debug!(
            "admit height={height} modifier={stake_modifier:016x} checksum={:08x} supply={money_supply}",
            meta.stake_modifier_checksum
        );

        // Limited duplicity on stake: a stake admitted to the main chain
        // supersedes any orphan sighting.
        if let Some((prevout, time)) = block.proof_of_stake() {
            let stake = StakeId {
                prevout,
                time: time as i64,
            };
            self.stake_seen_orphan.remove(&stake);
            self.stake_seen.insert(stake);
        }

        let entry = BlockIndexEntry {
            prev_hash,
            height,
            version: block.header.version,
            time: block.header.time,
            bits: block.header.bits,
            chain_trust: chain_trust.to_big_endian(),
            meta,
        };

        let mut batch = WriteBatch::new();
        self.index.put_entry(&mut batch, &hash, &entry);
        self.index.set_height_hash(&mut batch, height, &hash);
        self.index
            .put_block_bytes(&mut batch, &hash, block.consensus_encode());
        for (position, tx) in block.transactions.iter().enumerate() {
            self.index.put_tx_location(
                &mut batch,
                &tx.txid(),
                &TxLocation {
                    block_hash: hash,
                    index: position as u32,
                },
            );
        }
        let best_trust = self
            .index
            .best_block()?
            .map(|tip| tip.chain_trust_value())
            .unwrap_or_else(U256::zero);
        if chain_trust > best_trust {
            self.index.set_best_block(&mut batch, &hash);
        }
        self.store.write_batch(&batch)?;

        Ok(hash)
    }

    /// Limited duplicity on stake: a stake already seen is rejected unless
    /// the block has an orphan child waiting on it (block flood defense).
    pub fn check_duplicate_stake(
        &self,
        block: &Block,
        has_orphan_child: bool,
    ) -> Result<(), ChainStateError> {
        if let Some((prevout, time)) = block.proof_of_stake() {
            let stake = StakeId {
                prevout,
                time: time as i64,
            };
            let seen =
                self.stake_seen.contains(&stake) || self.stake_seen_orphan.contains(&stake);
            if seen && !has_orphan_child {
                return Err(RuleError::DuplicateStake.into());
            }
        }
        Ok(())
    }

    /// Records an orphan block's stake after the duplicity check.
    pub fn process_orphan(
        &mut self,
        block: &Block,
        has_orphan_child: bool,
    ) -> Result<(), ChainStateError> {
        self.check_duplicate_stake(block, has_orphan_child)?;
        if let Some((prevout, time)) = block.proof_of_stake() {
            self.stake_seen_orphan.insert(StakeId {
                prevout,
                time: time as i64,
            });
        }
        Ok(())
    }

    /// Forgets an evicted orphan block's stake.
    pub fn orphan_removed(&mut self, block: &Block) {
        if let Some((prevout, time)) = block.proof_of_stake() {
            self.stake_seen_orphan.remove(&StakeId {
                prevout,
                time: time as i64,
            });
        }
    }

    /// Validates a coinstake's kernel and returns its proof hash.
    pub fn check_tx_proof_of_stake(
        &self,
        tx: &Transaction,
        bits: u32,
        adjusted_time: i64,
    ) -> Result<Hash256, ChainStateError> {
        if !tx.is_coin_stake() {
            return Err(RuleError::WrongCoinstakePosition.into());
        }
        let kernel_input = &tx.vin[0];

        let location = self
            .index
            .tx_location(&kernel_input.prevout.hash)?
            .ok_or(ChainStateError::UnknownInput)?;
        let prev_entry = self
            .index
            .entry(&location.block_hash)?
            .ok_or(ChainStateError::IndexMiss)?;
        let prev_block_bytes = self
            .index
            .block_bytes(&location.block_hash)?
            .ok_or(ChainStateError::IndexMiss)?;
        let prev_block = Block::consensus_decode(&prev_block_bytes)?;

        let tx_prev = prev_block
            .transactions
            .get(location.index as usize)
            .filter(|candidate| candidate.txid() == kernel_input.prevout.hash)
            .ok_or(ChainStateError::UnknownInput)?;

        if let Some(verifier) = &self.input_verifier {
            let prev_txout = tx_prev
                .vout
                .get(kernel_input.prevout.index as usize)
                .ok_or(ChainStateError::Kernel(KernelError::PrevoutOutOfRange))?;
            if !verifier.verify_input(tx, 0, prev_txout) {
                return Err(RuleError::BadCoinstakeSignature.into());
            }
        }

        let tx_prev_offset = prev_entry
            .meta
            .tx_offsets
            .get(location.index as usize)
            .copied()
            .unwrap_or_else(|| prev_block.tx_offsets()[location.index as usize]);

        let (hash_proof_of_stake, success) = check_stake_kernel_hash(
            self,
            &self.params,
            bits,
            &location.block_hash,
            prev_entry.time(),
            tx_prev_offset,
            tx_prev,
            &kernel_input.prevout,
            tx.time as i64,
            adjusted_time,
            true,
        )?;
        if !success {
            return Err(ChainStateError::KernelMiss);
        }
        Ok(hash_proof_of_stake)
    }

    /// Net mint of a block and the resulting money supply.
    fn mint_and_money_supply(
        &self,
        block: &Block,
        prev_supply: i64,
    ) -> Result<(i64, i64), ChainStateError> {
        let mut value_in = 0i64;
        let mut value_out = 0i64;
        let mut fees = 0i64;

        for tx in &block.transactions {
            let tx_value_out = tx.value_out();
            if tx.is_coinbase() {
                value_out += tx_value_out;
                continue;
            }
            let mut tx_value_in = 0i64;
            for input in &tx.vin {
                let prev = self
                    .spent_input(&input.prevout.hash)?
                    .ok_or(ChainStateError::UnknownInput)?;
                tx_value_in += prev
                    .tx
                    .vout
                    .get(input.prevout.index as usize)
                    .ok_or(ChainStateError::Kernel(KernelError::PrevoutOutOfRange))?
                    .value;
            }
            value_in += tx_value_in;
            value_out += tx_value_out;
            if !tx.is_coin_stake() {
                fees += tx_value_in - tx_value_out;
            }
        }

        let mint = value_out - value_in + fees;
        let money_supply = prev_supply + value_out - value_in;
        Ok((mint, money_supply))
    }

    /// The most recent block of the requested type at or before `start`,
    /// never walking past genesis.
    pub fn last_block_of_type(
        &self,
        start: &Hash256,
        proof_of_stake: bool,
    ) -> Result<(Hash256, BlockIndexEntry), ChainStateError> {
        let mut hash = *start;
        let mut entry = self
            .index
            .entry(&hash)?
            .ok_or(ChainStateError::IndexMiss)?;
        loop {
            if entry.height == 0
                || entry.prev_hash == [0u8; 32]
                || entry.meta.is_proof_of_stake() == proof_of_stake
            {
                return Ok((hash, entry));
            }
            hash = entry.prev_hash;
            entry = self
                .index
                .entry(&hash)?
                .ok_or(ChainStateError::IndexMiss)?;
        }
    }

    /// Required difficulty for the next block of the given type.
    pub fn next_required_bits(&self, proof_of_stake: bool) -> Result<u32, ChainStateError> {
        let Some(best) = self.index.best_block()? else {
            return Ok(self.params.pow_limit_bits);
        };

        let (_, prev) = self.last_block_of_type(&best.hash, proof_of_stake)?;
        if prev.height == 0 {
            return Ok(self.params.initial_hash_target_bits);
        }
        let (_, prev_prev) = self.last_block_of_type(&prev.prev_hash, proof_of_stake)?;
        if prev_prev.height == 0 {
            return Ok(self.params.initial_hash_target_bits);
        }

        Ok(next_target_bits(
            best.height,
            &RetargetAncestors {
                prev_time: prev.time(),
                prev_height: prev.height,
                prev_bits: prev.bits,
                prev_prev_time: prev_prev.time(),
            },
            proof_of_stake,
            &self.params,
        ))
    }

    /// The stake modifier used to hash kernels sourced from `block_hash`.
    pub fn kernel_stake_modifier(
        &self,
        block_hash: &Hash256,
        adjusted_time: i64,
    ) -> Result<u64, ChainStateError> {
        let found =
            get_kernel_stake_modifier(self, &self.params, block_hash, adjusted_time, false)?;
        Ok(found.map(|modifier| modifier.modifier).unwrap_or(0))
    }

    /// Subsidy the last proof-of-work block was entitled to.
    pub fn last_pow_reward(&self) -> Result<i64, ChainStateError> {
        let best = self.index.best_block()?.ok_or(ChainStateError::EmptyChain)?;
        let (_, last_pow) = self.last_block_of_type(&best.hash, false)?;
        Ok(proof_of_work_reward(last_pow.bits, &self.params))
    }

    /// Conventional difficulty of the last block of the given type.
    pub fn difficulty(&self, proof_of_stake: bool) -> Result<f64, ChainStateError> {
        let best = self.index.best_block()?.ok_or(ChainStateError::EmptyChain)?;
        let (_, last) = self.last_block_of_type(&best.hash, proof_of_stake)?;
        Ok(difficulty_ratio(last.bits))
    }
}

impl<S: KeyValueStore> ChainView for ChainState<S> {
    fn block_index(&self, hash: &Hash256) -> Result<Option<IndexedBlock>, KernelError> {
        let entry = self
            .index
            .entry(hash)
            .map_err(|err| KernelError::Store(err.to_string()))?;
        Ok(entry.map(|entry| IndexedBlock {
            prev_hash: entry.prev_hash,
            time: entry.time(),
            meta: entry.meta,
            height: entry.height,
        }))
    }

    fn hash_by_height(&self, height: i64) -> Result<Option<Hash256>, KernelError> {
        self.index
            .height_hash(height)
            .map_err(|err| KernelError::Store(err.to_string()))
    }

    fn best_height(&self) -> Result<i64, KernelError> {
        let tip = self
            .index
            .best_block()
            .map_err(|err| KernelError::Store(err.to_string()))?;
        Ok(tip.map(|tip| tip.height).unwrap_or(-1))
    }
}

impl<S: KeyValueStore> InputView for ChainState<S> {
    fn spent_input(&self, txid: &Hash256) -> Result<Option<SpentInput>, KernelError> {
        let Some(location) = self
            .index
            .tx_location(txid)
            .map_err(|err| KernelError::Store(err.to_string()))?
        else {
            return Ok(None);
        };
        let entry = self
            .index
            .entry(&location.block_hash)
            .map_err(|err| KernelError::Store(err.to_string()))?
            .ok_or(KernelError::IndexMiss)?;
        let bytes = self
            .index
            .block_bytes(&location.block_hash)
            .map_err(|err| KernelError::Store(err.to_string()))?
            .ok_or(KernelError::IndexMiss)?;
        let block =
            Block::consensus_decode(&bytes).map_err(|err| KernelError::Store(err.to_string()))?;
        let tx = block
            .transactions
            .into_iter()
            .nth(location.index as usize)
            .ok_or(KernelError::IndexMiss)?;
        Ok(Some(SpentInput {
            tx,
            block_time: entry.time(),
        }))
    }
}
