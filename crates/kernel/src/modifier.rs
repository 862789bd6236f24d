//! Stake modifier computation.
//!
//! The stake modifier exists to stop a coin owner from precomputing future
//! proof-of-stake hashes at the time their output confirms. It is a 64-bit
//! value whose bits are harvested from blocks selected out of the recent
//! past, recomputed at a fixed wall-clock interval rather than every block
//! so an attacker gains no extra bits by grinding out a chain.

use std::collections::HashSet;

use ppcd_consensus::constants::{MODIFIER_BITS, MODIFIER_INTERVAL_RATIO};
use ppcd_consensus::{is_protocol_v04, ChainParams, Hash256};
use ppcd_log::log_debug;
use ppcd_primitives::encoding::Encoder;
use ppcd_primitives::hash::sha256d;
use ppcd_primitives::meta::Meta;
use primitive_types::U256;

use crate::{ChainView, KernelError};

const ZERO_HASH: Hash256 = [0u8; 32];

/// Length in seconds of selection round `section`, 0..64.
///
/// Sections shrink toward later rounds, so early rounds pick from a wider
/// slice of the candidate window.
pub fn selection_interval_section(params: &ChainParams, section: usize) -> i64 {
    debug_assert!(section < MODIFIER_BITS);
    params.modifier_interval * 63
        / (63 + (63 - section as i64) * (MODIFIER_INTERVAL_RATIO - 1))
}

/// Total span of the candidate window, in seconds.
pub fn selection_interval(params: &ChainParams) -> i64 {
    (0..MODIFIER_BITS)
        .map(|section| selection_interval_section(params, section))
        .sum()
}

/// Walks back from `from` to the most recent block that generated a
/// modifier, returning the modifier and its generation time.
pub fn last_stake_modifier(
    view: &impl ChainView,
    from: &Hash256,
) -> Result<(u64, i64), KernelError> {
    let mut node = view.block_index(from)?.ok_or(KernelError::IndexMiss)?;
    while node.prev_hash != ZERO_HASH && !node.meta.generated_stake_modifier() {
        node = view
            .block_index(&node.prev_hash)?
            .ok_or(KernelError::IndexMiss)?;
    }
    if !node.meta.generated_stake_modifier() {
        return Err(KernelError::NoGenesisGeneration);
    }
    Ok((node.meta.stake_modifier, node.time))
}

struct Candidate {
    time: i64,
    hash: Hash256,
    /// Kernel proof hash for stake blocks, the block hash for work blocks.
    proof_hash: Hash256,
    proof_of_stake: bool,
    entropy_bit: u32,
}

/// Selection hash ranking a candidate: the double hash of its proof hash
/// and the previous modifier, shifted down 32 bits for proof-of-stake
/// blocks so stake always outranks work.
fn selection_rank(candidate: &Candidate, prev_modifier: u64) -> U256 {
    let mut encoder = Encoder::with_capacity(40);
    encoder.write_hash_le(&candidate.proof_hash);
    encoder.write_u64_le(prev_modifier);
    let digest = sha256d(&encoder.into_inner());
    let mut rank = U256::from_little_endian(&digest);
    if candidate.proof_of_stake {
        rank >>= 32;
    }
    rank
}

/// Picks the unselected candidate with the smallest selection rank among
/// those inside the current selection section. The earliest candidate is
/// always eligible, even past the section boundary.
fn select_block_from_candidates<'a>(
    candidates: &'a [Candidate],
    selected: &HashSet<Hash256>,
    selection_stop: i64,
    prev_modifier: u64,
) -> Option<&'a Candidate> {
    let mut best: Option<(&Candidate, U256)> = None;
    for candidate in candidates {
        if best.is_some() && candidate.time > selection_stop {
            break;
        }
        if selected.contains(&candidate.hash) {
            continue;
        }
        let rank = selection_rank(candidate, prev_modifier);
        let better = match best {
            Some((_, best_rank)) => rank < best_rank,
            None => true,
        };
        if better {
            best = Some((candidate, rank));
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Computes the stake modifier for a block with the given timestamp whose
/// parent is `prev_hash`, returning the modifier and whether it was
/// freshly generated.
///
/// A fresh modifier is produced only when the parent crossed into a new
/// modifier interval (and, under v0.4+ rules, the block itself sits in yet
/// another interval than the last generation).
pub fn compute_next_stake_modifier(
    view: &impl ChainView,
    params: &ChainParams,
    current_time: i64,
    prev_hash: &Hash256,
) -> Result<(u64, bool), KernelError> {
    if *prev_hash == ZERO_HASH {
        // Genesis: modifier 0, marked generated.
        return Ok((0, true));
    }

    let prev = view.block_index(prev_hash)?.ok_or(KernelError::IndexMiss)?;
    let (prev_modifier, modifier_time) = last_stake_modifier(view, prev_hash)?;

    let interval = params.modifier_interval;
    if modifier_time / interval >= prev.time / interval {
        return Ok((prev_modifier, false));
    }
    if modifier_time / interval >= current_time / interval {
        // v0.4+ requires the current block to be in a new interval too.
        if is_protocol_v04(params.network, current_time) {
            return Ok((prev_modifier, false));
        }
        log_debug!(
            "v0.3 modifier generated inside current interval at time {current_time}"
        );
    }

    // Collect candidates back from the parent through the selection window.
    let selection_interval = selection_interval(params);
    let selection_start = (prev.time / interval) * interval - selection_interval;
    let prev_time = prev.time;
    let mut candidates = Vec::new();
    let mut cursor_hash = *prev_hash;
    let mut cursor = prev;
    loop {
        if cursor.time < selection_start {
            break;
        }
        let proof_of_stake = cursor.meta.hash_proof_of_stake != ZERO_HASH;
        let proof_hash = if proof_of_stake {
            cursor.meta.hash_proof_of_stake
        } else {
            cursor_hash
        };
        candidates.push(Candidate {
            time: cursor.time,
            hash: cursor_hash,
            proof_hash,
            proof_of_stake,
            entropy_bit: cursor.meta.stake_entropy_bit(),
        });
        if cursor.prev_hash == ZERO_HASH {
            break;
        }
        cursor_hash = cursor.prev_hash;
        cursor = view
            .block_index(&cursor_hash)?
            .ok_or(KernelError::IndexMiss)?;
    }

    // Ascending by timestamp; ties broken by the hash read little-endian.
    candidates.sort_unstable_by(|a, b| {
        a.time.cmp(&b.time).then_with(|| {
            U256::from_little_endian(&a.hash).cmp(&U256::from_little_endian(&b.hash))
        })
    });

    let mut new_modifier: u64 = 0;
    let mut selection_stop = selection_start;
    let mut selected: HashSet<Hash256> = HashSet::new();
    for round in 0..MODIFIER_BITS.min(candidates.len()) {
        selection_stop += selection_interval_section(params, round);
        let chosen =
            select_block_from_candidates(&candidates, &selected, selection_stop, prev_modifier)
                .ok_or(KernelError::NoCandidate { round })?;
        new_modifier |= u64::from(chosen.entropy_bit) << round;
        selected.insert(chosen.hash);
        log_debug!(
            "modifier round {round}: stop={selection_stop} bit={} modifier={new_modifier:016x}",
            chosen.entropy_bit
        );
    }

    log_debug!("new stake modifier {new_modifier:016x} from parent time {prev_time}");
    Ok((new_modifier, true))
}

/// Rolling integrity checksum over a block's modifier state: the top 32
/// bits of the double hash of the parent checksum, the flags, the kernel
/// proof hash, and the modifier.
pub fn stake_modifier_checksum(parent_checksum: Option<u32>, meta: &Meta) -> u32 {
    let mut encoder = Encoder::with_capacity(48);
    if let Some(parent_checksum) = parent_checksum {
        encoder.write_u32_le(parent_checksum);
    }
    encoder.write_u32_le(meta.flags);
    encoder.write_hash_le(&meta.hash_proof_of_stake);
    encoder.write_u64_le(meta.stake_modifier);
    let digest = sha256d(&encoder.into_inner());
    (U256::from_little_endian(&digest) >> 224).low_u32()
}

/// Whether a computed checksum is consistent with the hard-coded
/// checkpoints. Networks without a table accept everything.
pub fn check_stake_modifier_checkpoints(
    params: &ChainParams,
    height: i64,
    checksum: u32,
) -> bool {
    match params.stake_modifier_checkpoint(height) {
        Some(expected) => checksum == expected,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppcd_consensus::{chain_params, Network};

    #[test]
    fn section_lengths_shrink() {
        let params = chain_params(Network::Mainnet);
        assert_eq!(selection_interval_section(&params, 0), 7_200);
        assert_eq!(selection_interval_section(&params, 63), 21_600);
        for section in 1..MODIFIER_BITS {
            assert!(
                selection_interval_section(&params, section)
                    >= selection_interval_section(&params, section - 1)
            );
        }
    }

    #[test]
    fn selection_interval_totals() {
        assert_eq!(selection_interval(&chain_params(Network::Mainnet)), 761_920);
        assert_eq!(selection_interval(&chain_params(Network::Testnet3)), 42_301);
    }

    #[test]
    fn genesis_checksum_matches_network_checkpoint() {
        // Genesis meta: entropy bit and generation flag set, zero modifier,
        // zero proof hash, no parent checksum.
        let mut meta = Meta::default();
        meta.set_stake_entropy_bit(1);
        meta.set_generated_stake_modifier(true);
        assert_eq!(meta.flags, 6);
        let checksum = stake_modifier_checksum(None, &meta);
        assert_eq!(checksum, 0x0e00670b);

        let params = chain_params(Network::Mainnet);
        assert!(check_stake_modifier_checkpoints(&params, 0, checksum));
        assert!(!check_stake_modifier_checkpoints(&params, 0, checksum ^ 1));
        // Heights without a pinned value accept anything.
        assert!(check_stake_modifier_checkpoints(&params, 1, 0xdeadbeef));
    }

    #[test]
    fn candidate_order_ties_break_on_reversed_bytes() {
        // Equal timestamps: the hash whose *last* byte is smaller sorts
        // first, because comparison runs from the last byte down.
        let mut low = [0xffu8; 32];
        low[31] = 0x01;
        let mut high = [0x00u8; 32];
        high[31] = 0x02;

        let mut candidates = vec![
            Candidate {
                time: 100,
                hash: high,
                proof_hash: high,
                proof_of_stake: false,
                entropy_bit: 0,
            },
            Candidate {
                time: 100,
                hash: low,
                proof_hash: low,
                proof_of_stake: false,
                entropy_bit: 1,
            },
        ];
        candidates.sort_unstable_by(|a, b| {
            a.time.cmp(&b.time).then_with(|| {
                U256::from_little_endian(&a.hash).cmp(&U256::from_little_endian(&b.hash))
            })
        });
        assert_eq!(candidates[0].hash, low);
        assert_eq!(candidates[1].hash, high);
    }

    #[test]
    fn stake_candidates_outrank_work() {
        // With the same proof hash bytes, a proof-of-stake candidate's rank
        // is the work candidate's shifted right by 32 bits.
        let stake = Candidate {
            time: 0,
            hash: [1u8; 32],
            proof_hash: [7u8; 32],
            proof_of_stake: true,
            entropy_bit: 0,
        };
        let work = Candidate {
            time: 0,
            hash: [7u8; 32],
            proof_hash: [7u8; 32],
            proof_of_stake: false,
            entropy_bit: 0,
        };
        let work_rank = selection_rank(&work, 99);
        let stake_rank = selection_rank(&stake, 99);
        assert_eq!(stake_rank, work_rank >> 32);
        assert!(stake_rank < work_rank);
    }
}
