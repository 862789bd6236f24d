//! Block header and block types.

use ppcd_consensus::Hash256;

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::hash::sha256d;
use crate::outpoint::OutPoint;
use crate::transaction::Transaction;

pub const HEADER_SIZE: usize = 80;

#[derive(Clone, Debug, PartialEq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn consensus_encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::with_capacity(HEADER_SIZE);
        encoder.write_i32_le(self.version);
        encoder.write_hash_le(&self.prev_block);
        encoder.write_hash_le(&self.merkle_root);
        encoder.write_u32_le(self.time);
        encoder.write_u32_le(self.bits);
        encoder.write_u32_le(self.nonce);
        encoder.into_inner()
    }

    /// The block hash covers the 80-byte header only; the block signature
    /// is appended after the transactions and never hashed.
    pub fn hash(&self) -> Hash256 {
        sha256d(&self.consensus_encode())
    }

    pub fn consensus_decode_from(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let version = decoder.read_i32_le()?;
        let prev_block = decoder.read_hash_le()?;
        let merkle_root = decoder.read_hash_le()?;
        let time = decoder.read_u32_le()?;
        let bits = decoder.read_u32_le()?;
        let nonce = decoder.read_u32_le()?;
        Ok(Self {
            version,
            prev_block,
            merkle_root,
            time,
            bits,
            nonce,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// ECDSA signature by the minter over the block hash; empty for genesis.
    pub signature: Vec<u8>,
}

impl Block {
    /// Two kinds of block: proof-of-work or proof-of-stake.
    pub fn is_proof_of_stake(&self) -> bool {
        self.transactions.len() > 1 && self.transactions[1].is_coin_stake()
    }

    /// The stake identity of a proof-of-stake block: the kernel outpoint
    /// paired with the coinstake timestamp.
    pub fn proof_of_stake(&self) -> Option<(OutPoint, u32)> {
        if !self.is_proof_of_stake() {
            return None;
        }
        let coinstake = &self.transactions[1];
        Some((coinstake.vin[0].prevout.clone(), coinstake.time))
    }

    pub fn consensus_encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_bytes(&self.header.consensus_encode());
        encoder.write_varint(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.consensus_encode(&mut encoder);
        }
        encoder.write_var_bytes(&self.signature);
        encoder.into_inner()
    }

    pub fn consensus_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let header = BlockHeader::consensus_decode_from(&mut decoder)?;
        let count = decoder.read_varint()?;
        let count = usize::try_from(count).map_err(|_| DecodeError::SizeTooLarge)?;
        let mut transactions = Vec::with_capacity(count);
        for _ in 0..count {
            transactions.push(Transaction::consensus_decode(&mut decoder)?);
        }
        let signature = decoder.read_var_bytes()?;
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(Self {
            header,
            transactions,
            signature,
        })
    }

    /// Byte offset of each transaction within the serialized block; the
    /// kernel hash commits to the staked transaction's offset.
    pub fn tx_offsets(&self) -> Vec<u32> {
        let mut encoder = Encoder::new();
        encoder.write_varint(self.transactions.len() as u64);
        let mut offset = HEADER_SIZE + encoder.len();
        let mut offsets = Vec::with_capacity(self.transactions.len());
        for tx in &self.transactions {
            offsets.push(offset as u32);
            offset += tx.serialized_size();
        }
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outpoint::OutPoint;
    use crate::transaction::{TxIn, TxOut};

    fn coinbase() -> Transaction {
        Transaction {
            version: 1,
            time: 1_400_000_000,
            vin: vec![TxIn {
                prevout: OutPoint::null(),
                script_sig: vec![0x01, 0x02],
                sequence: u32::MAX,
            }],
            vout: vec![TxOut {
                value: 0,
                script_pubkey: Vec::new(),
            }],
            lock_time: 0,
        }
    }

    fn coinstake() -> Transaction {
        Transaction {
            version: 1,
            time: 1_400_000_000,
            vin: vec![TxIn {
                prevout: OutPoint {
                    hash: [9u8; 32],
                    index: 1,
                },
                script_sig: Vec::new(),
                sequence: u32::MAX,
            }],
            vout: vec![
                TxOut {
                    value: 0,
                    script_pubkey: Vec::new(),
                },
                TxOut {
                    value: 50_000_000,
                    script_pubkey: vec![0xac],
                },
            ],
            lock_time: 0,
        }
    }

    fn block(transactions: Vec<Transaction>) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                prev_block: [0u8; 32],
                merkle_root: [0u8; 32],
                time: 1_400_000_000,
                bits: 0x1c00ffff,
                nonce: 0,
            },
            transactions,
            signature: vec![0xde, 0xad],
        }
    }

    #[test]
    fn header_is_eighty_bytes() {
        let block = block(vec![coinbase()]);
        assert_eq!(block.header.consensus_encode().len(), HEADER_SIZE);
    }

    #[test]
    fn block_round_trip() {
        let block = block(vec![coinbase(), coinstake()]);
        let bytes = block.consensus_encode();
        let back = Block::consensus_decode(&bytes).expect("decode");
        assert_eq!(back, block);
    }

    #[test]
    fn proof_of_stake_detection() {
        assert!(!block(vec![coinbase()]).is_proof_of_stake());
        let pos = block(vec![coinbase(), coinstake()]);
        assert!(pos.is_proof_of_stake());
        let (prevout, time) = pos.proof_of_stake().expect("stake");
        assert_eq!(prevout.hash, [9u8; 32]);
        assert_eq!(time, 1_400_000_000);
    }

    #[test]
    fn tx_offsets_track_serialization() {
        let block = block(vec![coinbase(), coinstake()]);
        let offsets = block.tx_offsets();
        let bytes = block.consensus_encode();
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[0], 81);
        // Each offset points at the transaction's version field.
        for (offset, tx) in offsets.iter().zip(&block.transactions) {
            let start = *offset as usize;
            let encoded = crate::encoding::encode(tx);
            assert_eq!(&bytes[start..start + encoded.len()], &encoded[..]);
        }
    }
}
