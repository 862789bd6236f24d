//! Hard-coded genesis data.

use ppcd_consensus::{ChainParams, Hash256};
use ppcd_primitives::block::{Block, BlockHeader};
use ppcd_primitives::meta::Meta;
use ppcd_primitives::outpoint::OutPoint;
use ppcd_primitives::transaction::{Transaction, TxIn, TxOut};
use primitive_types::U256;

/// The coinbase shared by every network's genesis block, carrying the
/// launch-day headline.
pub fn genesis_coinbase_tx() -> Transaction {
    let script_sig: &[u8] = &[
        0x04, 0xff, 0xff, 0x00, 0x1d, 0x02, 0x0f, 0x27, 0x4b, 0x4d, 0x61, 0x74, 0x6f, 0x6e,
        0x69, 0x73, 0x20, 0x30, 0x37, 0x2d, 0x41, 0x55, 0x47, 0x2d, 0x32, 0x30, 0x31, 0x32,
        0x20, 0x50, 0x61, 0x72, 0x61, 0x6c, 0x6c, 0x65, 0x6c, 0x20, 0x43, 0x75, 0x72, 0x72,
        0x65, 0x6e, 0x63, 0x69, 0x65, 0x73, 0x20, 0x41, 0x6e, 0x64, 0x20, 0x54, 0x68, 0x65,
        0x20, 0x52, 0x6f, 0x61, 0x64, 0x6d, 0x61, 0x70, 0x20, 0x54, 0x6f, 0x20, 0x4d, 0x6f,
        0x6e, 0x65, 0x74, 0x61, 0x72, 0x79, 0x20, 0x46, 0x72, 0x65, 0x65, 0x64, 0x6f, 0x6d,
    ];
    Transaction {
        version: 1,
        time: 0x502c59a2,
        vin: vec![TxIn {
            prevout: OutPoint {
                hash: [0u8; 32],
                index: u32::MAX,
            },
            script_sig: script_sig.to_vec(),
            sequence: u32::MAX,
        }],
        vout: vec![TxOut {
            value: 0,
            script_pubkey: Vec::new(),
        }],
        lock_time: 0,
    }
}

/// The genesis block for the configured network.
pub fn genesis_block(params: &ChainParams) -> Block {
    let coinbase = genesis_coinbase_tx();
    let merkle_root = coinbase.txid();
    Block {
        header: BlockHeader {
            version: 1,
            prev_block: [0u8; 32],
            merkle_root,
            time: params.genesis_time,
            bits: params.genesis_bits,
            nonce: params.genesis_nonce,
        },
        transactions: vec![coinbase],
        signature: Vec::new(),
    }
}

/// The genesis metadata: entropy and generation flags set, unit trust.
pub fn genesis_meta() -> Meta {
    let mut meta = Meta {
        stake_modifier_checksum: 0x0e00670b,
        chain_trust: U256::one(),
        ..Meta::default()
    };
    meta.set_stake_entropy_bit(1);
    meta.set_generated_stake_modifier(true);
    meta
}

pub fn is_genesis_hash(params: &ChainParams, hash: &Hash256) -> bool {
    *hash == params.genesis_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppcd_consensus::{chain_params, Network};

    #[test]
    fn coinbase_txid_is_the_merkle_root() {
        let coinbase = genesis_coinbase_tx();
        let txid = coinbase.txid();
        let params = chain_params(Network::Mainnet);
        let block = genesis_block(&params);
        assert_eq!(block.header.merkle_root, txid);
        // Display form of the shared merkle root.
        assert_eq!(txid[31], 0x3c);
        assert_eq!(txid[0], 0xc2);
    }

    #[test]
    fn mainnet_genesis_hash() {
        let params = chain_params(Network::Mainnet);
        let block = genesis_block(&params);
        assert_eq!(block.header.hash(), params.genesis_hash);
        assert!(is_genesis_hash(&params, &block.header.hash()));
    }

    #[test]
    fn testnet3_genesis_hash() {
        let params = chain_params(Network::Testnet3);
        let block = genesis_block(&params);
        assert_eq!(block.header.hash(), params.genesis_hash);
    }

    #[test]
    fn genesis_block_shape() {
        let params = chain_params(Network::Mainnet);
        let block = genesis_block(&params);
        assert!(!block.is_proof_of_stake());
        assert!(block.signature.is_empty());
        assert!(block.transactions[0].is_coinbase());

        let meta = genesis_meta();
        assert_eq!(meta.flags, 6);
        assert_eq!(meta.stake_modifier, 0);
        assert_eq!(meta.chain_trust, U256::one());
    }
}
