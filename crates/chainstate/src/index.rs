//! Persistent block index.
//!
//! Entries are keyed by block hash and hold the parent hash rather than a
//! reference, so traversal is a sequence of lookups and the index never
//! forms ownership cycles.

use std::sync::Arc;

use ppcd_consensus::Hash256;
use ppcd_primitives::encoding::{Decoder, Encoder};
use ppcd_primitives::meta::Meta;
use ppcd_storage::{Column, KeyValueStore, StoreError, WriteBatch};
use primitive_types::U256;

const META_BEST_BLOCK_KEY: &[u8] = b"best_block";

#[derive(Clone, Debug)]
pub struct BlockIndexEntry {
    pub prev_hash: Hash256,
    pub height: i64,
    pub version: i32,
    pub time: u32,
    pub bits: u32,
    /// Cumulative trust up to and including this block, big-endian.
    pub chain_trust: [u8; 32],
    pub meta: Meta,
}

impl BlockIndexEntry {
    pub fn time(&self) -> i64 {
        self.time as i64
    }

    pub fn chain_trust_value(&self) -> U256 {
        U256::from_big_endian(&self.chain_trust)
    }
}

#[derive(Clone, Debug)]
pub struct ChainTip {
    pub hash: Hash256,
    pub height: i64,
    pub chain_trust: [u8; 32],
}

impl ChainTip {
    pub fn chain_trust_value(&self) -> U256 {
        U256::from_big_endian(&self.chain_trust)
    }
}

/// Where a transaction lives: its block and position within it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxLocation {
    pub block_hash: Hash256,
    pub index: u32,
}

pub struct ChainIndex<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> ChainIndex<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn entry(&self, hash: &Hash256) -> Result<Option<BlockIndexEntry>, StoreError> {
        let bytes = match self.store.get(Column::BlockIndex, hash)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        decode_entry(&bytes).map(Some).map_err(StoreError::Backend)
    }

    pub fn put_entry(&self, batch: &mut WriteBatch, hash: &Hash256, entry: &BlockIndexEntry) {
        batch.put(Column::BlockIndex, hash, encode_entry(entry));
    }

    pub fn height_hash(&self, height: i64) -> Result<Option<Hash256>, StoreError> {
        let bytes = match self.store.get(Column::HeightIndex, &height_key(height))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        decode_hash(&bytes).map(Some).map_err(StoreError::Backend)
    }

    pub fn set_height_hash(&self, batch: &mut WriteBatch, height: i64, hash: &Hash256) {
        batch.put(Column::HeightIndex, height_key(height), *hash);
    }

    pub fn best_block(&self) -> Result<Option<ChainTip>, StoreError> {
        let hash = match self.store.get(Column::Meta, META_BEST_BLOCK_KEY)? {
            Some(bytes) => decode_hash(&bytes).map_err(StoreError::Backend)?,
            None => return Ok(None),
        };
        let entry = match self.entry(&hash)? {
            Some(entry) => entry,
            None => return Ok(None),
        };
        Ok(Some(ChainTip {
            hash,
            height: entry.height,
            chain_trust: entry.chain_trust,
        }))
    }

    pub fn set_best_block(&self, batch: &mut WriteBatch, hash: &Hash256) {
        batch.put(Column::Meta, META_BEST_BLOCK_KEY, *hash);
    }

    pub fn block_bytes(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, StoreError> {
        self.store.get(Column::Block, hash)
    }

    pub fn put_block_bytes(&self, batch: &mut WriteBatch, hash: &Hash256, bytes: Vec<u8>) {
        batch.put(Column::Block, hash, bytes);
    }

    pub fn tx_location(&self, txid: &Hash256) -> Result<Option<TxLocation>, StoreError> {
        let bytes = match self.store.get(Column::TxIndex, txid)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        decode_tx_location(&bytes)
            .map(Some)
            .map_err(StoreError::Backend)
    }

    pub fn put_tx_location(&self, batch: &mut WriteBatch, txid: &Hash256, location: &TxLocation) {
        let mut encoder = Encoder::with_capacity(36);
        encoder.write_hash_le(&location.block_hash);
        encoder.write_u32_le(location.index);
        batch.put(Column::TxIndex, txid, encoder.into_inner());
    }
}

fn height_key(height: i64) -> [u8; 8] {
    height.to_le_bytes()
}

fn encode_entry(entry: &BlockIndexEntry) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_hash_le(&entry.prev_hash);
    encoder.write_i64_le(entry.height);
    encoder.write_i32_le(entry.version);
    encoder.write_u32_le(entry.time);
    encoder.write_u32_le(entry.bits);
    encoder.write_bytes(&entry.chain_trust);
    entry.meta.serialize(&mut encoder);
    encoder.into_inner()
}

fn decode_entry(bytes: &[u8]) -> Result<BlockIndexEntry, String> {
    let mut decoder = Decoder::new(bytes);
    let prev_hash = decoder.read_hash_le().map_err(|err| err.to_string())?;
    let height = decoder.read_i64_le().map_err(|err| err.to_string())?;
    let version = decoder.read_i32_le().map_err(|err| err.to_string())?;
    let time = decoder.read_u32_le().map_err(|err| err.to_string())?;
    let bits = decoder.read_u32_le().map_err(|err| err.to_string())?;
    let chain_trust = decoder.read_fixed::<32>().map_err(|err| err.to_string())?;
    let meta = Meta::deserialize(&mut decoder).map_err(|err| err.to_string())?;
    if !decoder.is_empty() {
        return Err("trailing bytes in block index entry".to_string());
    }
    Ok(BlockIndexEntry {
        prev_hash,
        height,
        version,
        time,
        bits,
        chain_trust,
        meta,
    })
}

fn decode_tx_location(bytes: &[u8]) -> Result<TxLocation, String> {
    let mut decoder = Decoder::new(bytes);
    let block_hash = decoder.read_hash_le().map_err(|err| err.to_string())?;
    let index = decoder.read_u32_le().map_err(|err| err.to_string())?;
    if !decoder.is_empty() {
        return Err("trailing bytes in tx location".to_string());
    }
    Ok(TxLocation { block_hash, index })
}

fn decode_hash(bytes: &[u8]) -> Result<Hash256, String> {
    if bytes.len() != 32 {
        return Err("invalid hash length".to_string());
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(bytes);
    Ok(hash)
}
