//! Stake entropy bit extraction.

use ppcd_consensus::{is_protocol_v04, Hash256, Network};
use ppcd_primitives::hash::hash160;

/// The single entropy bit a block contributes to future stake modifiers.
///
/// Under v0.4+ rules the bit is the lowest bit of the block hash read as a
/// little-endian integer. Earlier protocols take the highest bit of the
/// big-endian HASH160 of the block signature.
pub fn stake_entropy_bit(
    network: Network,
    block_hash: &Hash256,
    block_signature: &[u8],
    block_time: i64,
) -> u32 {
    if is_protocol_v04(network, block_time) {
        return u32::from(block_hash[0] & 1);
    }

    let mut digest = hash160(block_signature);
    digest.reverse();
    u32::from(digest[0] >> 7)
}

#[cfg(test)]
mod tests {
    use super::*;

    const V04_TIME: i64 = 1_400_000_000;
    const V03_TIME: i64 = 1_365_000_000;

    #[test]
    fn v04_takes_hash_parity() {
        let mut even = [0u8; 32];
        even[0] = 0x42;
        assert_eq!(stake_entropy_bit(Network::Mainnet, &even, &[], V04_TIME), 0);

        let mut odd = [0u8; 32];
        odd[0] = 0xe3;
        assert_eq!(stake_entropy_bit(Network::Mainnet, &odd, &[], V04_TIME), 1);
    }

    #[test]
    fn v03_takes_signature_hash_top_bit() {
        let hash = [0u8; 32];
        // HASH160([0u8; 70]) ends in 0xf4: top big-endian bit set.
        assert_eq!(
            stake_entropy_bit(Network::Mainnet, &hash, &[0u8; 70], V03_TIME),
            1
        );
        // HASH160(1..=71) ends in 0x35: top bit clear.
        let signature: Vec<u8> = (1u8..=71).collect();
        assert_eq!(
            stake_entropy_bit(Network::Mainnet, &hash, &signature, V03_TIME),
            0
        );
    }

    #[test]
    fn testnet_uses_its_own_switch_time() {
        let mut odd = [0u8; 32];
        odd[0] = 0x01;
        // 1_396_000_000 is v0.4 on testnet but still v0.3 on mainnet.
        let time = 1_396_000_000;
        assert_eq!(stake_entropy_bit(Network::Testnet3, &odd, &[0u8; 70], time), 1);
        assert_eq!(stake_entropy_bit(Network::Mainnet, &odd, &[0u8; 70], time), 1);
        // The mainnet result came from the signature path; flip the
        // signature and only mainnet changes.
        let signature: Vec<u8> = (1u8..=71).collect();
        assert_eq!(
            stake_entropy_bit(Network::Testnet3, &odd, &signature, time),
            1
        );
        assert_eq!(stake_entropy_bit(Network::Mainnet, &odd, &signature, time), 0);
    }
}
