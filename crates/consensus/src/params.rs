//! Chain parameter definitions.

use crate::Hash256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Mainnet,
    Testnet3,
    Regtest,
}

impl Network {
    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet3 => "testnet3",
            Network::Regtest => "regtest",
        }
    }
}

/// A known-good block hash pinned at a height.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Checkpoint {
    pub height: i64,
    pub hash: Hash256,
}

#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: Network,
    pub default_port: u16,

    pub genesis_hash: Hash256,
    pub genesis_time: u32,
    pub genesis_bits: u32,
    pub genesis_nonce: u32,

    /// Highest proof-of-work target, little-endian.
    pub pow_limit: Hash256,
    pub pow_limit_bits: u32,
    /// Difficulty used while a block type has fewer than two ancestors.
    pub initial_hash_target_bits: u32,

    /// Minimum age before a coin may stake, in seconds.
    pub stake_min_age: i64,
    pub coinbase_maturity: i64,
    /// Time to elapse before a new stake modifier is computed.
    pub modifier_interval: i64,

    pub checkpoints: Vec<Checkpoint>,
    pub stake_modifier_checkpoints: &'static [(i64, u32)],
}

impl ChainParams {
    /// The hard-coded modifier checksum pinned at a height, if any.
    pub fn stake_modifier_checkpoint(&self, height: i64) -> Option<u32> {
        self.stake_modifier_checkpoints
            .iter()
            .find(|(checkpoint_height, _)| *checkpoint_height == height)
            .map(|(_, checksum)| *checksum)
    }
}

#[derive(Debug)]
pub enum HexError {
    InvalidLength,
    InvalidHex,
}

/// Parses a display-order (big-endian) hex string into internal hash bytes.
pub fn hash256_from_hex(input: &str) -> Result<Hash256, HexError> {
    let hex = input.trim();
    if hex.len() != 64 {
        return Err(HexError::InvalidLength);
    }
    let mut bytes = [0u8; 32];
    for (i, byte_out) in bytes.iter_mut().enumerate() {
        let start = i * 2;
        *byte_out =
            u8::from_str_radix(&hex[start..start + 2], 16).map_err(|_| HexError::InvalidHex)?;
    }
    bytes.reverse();
    Ok(bytes)
}

/// Little-endian target with the low `bits` bits set.
fn pow_limit_le(bits: u32) -> Hash256 {
    let mut limit = [0u8; 32];
    let full = (bits / 8) as usize;
    for byte in limit.iter_mut().take(full) {
        *byte = 0xff;
    }
    if bits % 8 != 0 {
        limit[full] = (1u8 << (bits % 8)) - 1;
    }
    limit
}

const MAINNET_STAKE_MODIFIER_CHECKPOINTS: &[(i64, u32)] = &[
    (0, 0x0e00670b),
    (19_080, 0xad4e4d29),
    (30_583, 0xdc7bf136),
    (99_999, 0xf555cfd2),
];

pub fn chain_params(network: Network) -> ChainParams {
    match network {
        Network::Mainnet => mainnet_chain_params(),
        Network::Testnet3 => testnet3_chain_params(),
        Network::Regtest => regtest_chain_params(),
    }
}

fn mainnet_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Mainnet,
        default_port: 9901,
        genesis_hash: hash256_from_hex(
            "0000000032fe677166d54963b62a4677d8957e87c508eaa4fd7eb1c880cd27e3",
        )
        .expect("mainnet genesis hash"),
        genesis_time: 0x502c5b7f,
        genesis_bits: 0x1d00ffff,
        genesis_nonce: 0x81e582ab,
        pow_limit: pow_limit_le(224),
        pow_limit_bits: 0x1d00ffff,
        initial_hash_target_bits: 0x1c00ffff,
        stake_min_age: 60 * 60 * 24 * 30,
        coinbase_maturity: 100,
        modifier_interval: 6 * 60 * 60,
        checkpoints: vec![
            Checkpoint {
                height: 19_080,
                hash: hash256_from_hex(
                    "000000000000bca54d9ac17881f94193fd6a270c1bb21c3bf0b37f588a40dbd7",
                )
                .expect("mainnet checkpoint 19080"),
            },
            Checkpoint {
                height: 30_583,
                hash: hash256_from_hex(
                    "d39d1481a7eecba48932ea5913be58ad3894c7ee6d5a8ba8abeb772c66a6696e",
                )
                .expect("mainnet checkpoint 30583"),
            },
            Checkpoint {
                height: 99_999,
                hash: hash256_from_hex(
                    "27fd5e1de16a4270eb8c68dee2754a64da6312c7c3a0e99a7e6776246be1ee3f",
                )
                .expect("mainnet checkpoint 99999"),
            },
        ],
        stake_modifier_checkpoints: MAINNET_STAKE_MODIFIER_CHECKPOINTS,
    }
}

fn testnet3_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Testnet3,
        default_port: 9903,
        genesis_hash: hash256_from_hex(
            "00000001f757bb737f6596503e17cd17b0658ce630cc727c0cca81aec47c9f06",
        )
        .expect("testnet3 genesis hash"),
        genesis_time: 0x502c71d0,
        genesis_bits: 0x1d0fffff,
        genesis_nonce: 0x07533a5a,
        pow_limit: pow_limit_le(228),
        pow_limit_bits: 0x1d07ffff,
        initial_hash_target_bits: 0x1d07ffff,
        stake_min_age: 60 * 60 * 24,
        coinbase_maturity: 60,
        modifier_interval: 60 * 20,
        checkpoints: Vec::new(),
        stake_modifier_checkpoints: &[],
    }
}

fn regtest_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Regtest,
        default_port: 18_444,
        genesis_hash: hash256_from_hex(
            "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206",
        )
        .expect("regtest genesis hash"),
        genesis_time: 1_296_688_602,
        genesis_bits: 0x207fffff,
        genesis_nonce: 2,
        pow_limit: pow_limit_le(255),
        pow_limit_bits: 0x207fffff,
        initial_hash_target_bits: 0x207fffff,
        stake_min_age: 60 * 60 * 24,
        coinbase_maturity: 60,
        modifier_interval: 60 * 20,
        checkpoints: Vec::new(),
        stake_modifier_checkpoints: &[],
    }
}
