//! Per-block auxiliary metadata.
//!
//! Every indexed block carries a `Meta` record alongside its header: the
//! stake modifier and its checksum, the kernel proof hash, accounting
//! totals, and the transaction offsets inside the serialized block.

use ppcd_consensus::Hash256;
use primitive_types::U256;

use crate::encoding::{DecodeError, Decoder, Encoder};

/// Block is proof-of-stake.
pub const FLAG_PROOF_OF_STAKE: u32 = 1 << 0;
/// Entropy bit contributed to future stake modifiers.
pub const FLAG_STAKE_ENTROPY: u32 = 1 << 1;
/// A fresh stake modifier was generated at this block.
pub const FLAG_STAKE_MODIFIER: u32 = 1 << 2;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Meta {
    pub stake_modifier: u64,
    pub stake_modifier_checksum: u32,
    /// Kernel hash of the proof-of-stake block; all zero for proof-of-work.
    pub hash_proof_of_stake: Hash256,
    pub flags: u32,
    pub chain_trust: U256,
    pub mint: i64,
    pub money_supply: i64,
    pub tx_offsets: Vec<u32>,
}

impl Meta {
    pub fn is_proof_of_stake(&self) -> bool {
        self.flags & FLAG_PROOF_OF_STAKE != 0
    }

    pub fn set_proof_of_stake(&mut self, proof_of_stake: bool) {
        if proof_of_stake {
            self.flags |= FLAG_PROOF_OF_STAKE;
        } else {
            self.flags &= !FLAG_PROOF_OF_STAKE;
        }
    }

    pub fn stake_entropy_bit(&self) -> u32 {
        u32::from(self.flags & FLAG_STAKE_ENTROPY != 0)
    }

    pub fn set_stake_entropy_bit(&mut self, entropy_bit: u32) {
        if entropy_bit == 0 {
            self.flags &= !FLAG_STAKE_ENTROPY;
        } else {
            self.flags |= FLAG_STAKE_ENTROPY;
        }
    }

    pub fn generated_stake_modifier(&self) -> bool {
        self.flags & FLAG_STAKE_MODIFIER != 0
    }

    pub fn set_generated_stake_modifier(&mut self, generated: bool) {
        if generated {
            self.flags |= FLAG_STAKE_MODIFIER;
        } else {
            self.flags &= !FLAG_STAKE_MODIFIER;
        }
    }

    pub fn serialize(&self, encoder: &mut Encoder) {
        encoder.write_u64_le(self.stake_modifier);
        encoder.write_u32_le(self.stake_modifier_checksum);
        encoder.write_u32_le(self.flags);
        encoder.write_hash_le(&self.hash_proof_of_stake);
        let trust = trust_magnitude(&self.chain_trust);
        encoder.write_u8(trust.len() as u8);
        encoder.write_bytes(&trust);
        encoder.write_i64_le(self.mint);
        encoder.write_i64_le(self.money_supply);
        encoder.write_u32_le(self.tx_offsets.len() as u32);
        for offset in &self.tx_offsets {
            encoder.write_u32_le(*offset);
        }
    }

    pub fn deserialize(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let stake_modifier = decoder.read_u64_le()?;
        let stake_modifier_checksum = decoder.read_u32_le()?;
        let flags = decoder.read_u32_le()?;
        let hash_proof_of_stake = decoder.read_hash_le()?;
        let trust_len = decoder.read_u8()? as usize;
        if trust_len > 32 {
            return Err(DecodeError::InvalidData("chain trust wider than 256 bits"));
        }
        let trust_bytes = decoder.read_bytes(trust_len)?;
        let chain_trust = U256::from_big_endian(&trust_bytes);
        let mint = decoder.read_i64_le()?;
        let money_supply = decoder.read_i64_le()?;
        let offset_count = decoder.read_u32_le()? as usize;
        let mut tx_offsets = Vec::with_capacity(offset_count.min(1 << 16));
        for _ in 0..offset_count {
            tx_offsets.push(decoder.read_u32_le()?);
        }
        Ok(Self {
            stake_modifier,
            stake_modifier_checksum,
            hash_proof_of_stake,
            flags,
            chain_trust,
            mint,
            money_supply,
            tx_offsets,
        })
    }

    pub fn serialized_size(&self) -> usize {
        8 + 4 + 4 + 32 + 1 + trust_magnitude(&self.chain_trust).len() + 8 + 8 + 4
            + 4 * self.tx_offsets.len()
    }
}

/// Big-endian magnitude of the trust value, no leading zeros, empty for zero.
fn trust_magnitude(trust: &U256) -> Vec<u8> {
    let bytes = trust.to_big_endian();
    let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(32);
    bytes[first..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_algebra() {
        let mut meta = Meta::default();
        assert!(!meta.is_proof_of_stake());
        assert_eq!(meta.stake_entropy_bit(), 0);
        assert!(!meta.generated_stake_modifier());

        meta.set_proof_of_stake(true);
        meta.set_stake_entropy_bit(1);
        meta.set_generated_stake_modifier(true);
        assert_eq!(meta.flags, 0b111);

        // Setters are idempotent.
        meta.set_proof_of_stake(true);
        meta.set_stake_entropy_bit(1);
        assert_eq!(meta.flags, 0b111);

        meta.set_proof_of_stake(false);
        meta.set_stake_entropy_bit(0);
        meta.set_generated_stake_modifier(false);
        assert_eq!(meta.flags, 0);
    }

    #[test]
    fn genesis_flags_value() {
        let mut meta = Meta::default();
        meta.set_stake_entropy_bit(1);
        meta.set_generated_stake_modifier(true);
        assert_eq!(meta.flags, 6);
    }

    fn round_trip(meta: &Meta) -> Meta {
        let mut encoder = Encoder::new();
        meta.serialize(&mut encoder);
        let bytes = encoder.into_inner();
        assert_eq!(bytes.len(), meta.serialized_size());
        let mut decoder = Decoder::new(&bytes);
        let back = Meta::deserialize(&mut decoder).expect("meta decode");
        assert!(decoder.is_empty());
        back
    }

    #[test]
    fn serialization_round_trip() {
        let meta = Meta {
            stake_modifier: 0x0123_4567_89ab_cdef,
            stake_modifier_checksum: 0x0e00670b,
            hash_proof_of_stake: [0xabu8; 32],
            flags: 7,
            chain_trust: U256::from(0x11b8_6c46_0810u64),
            mint: 9_999_000_000,
            money_supply: 123_456_789_000,
            tx_offsets: vec![81, 215, 407],
        };
        assert_eq!(round_trip(&meta), meta);
    }

    #[test]
    fn zero_trust_serializes_empty() {
        let meta = Meta::default();
        let mut encoder = Encoder::new();
        meta.serialize(&mut encoder);
        let bytes = encoder.into_inner();
        // modifier(8) checksum(4) flags(4) hash(32) -> length byte at 48.
        assert_eq!(bytes[48], 0);
        assert_eq!(round_trip(&meta), meta);
    }

    #[test]
    fn trust_is_big_endian_magnitude() {
        let meta = Meta {
            chain_trust: U256::from(0x0102u64),
            ..Meta::default()
        };
        let mut encoder = Encoder::new();
        meta.serialize(&mut encoder);
        let bytes = encoder.into_inner();
        assert_eq!(bytes[48], 2);
        assert_eq!(&bytes[49..51], &[0x01, 0x02]);
        assert_eq!(round_trip(&meta), meta);
    }
}
