//! Kernel protocol epoch predicates.
//!
//! The proof-of-stake kernel went through three wire-compatible revisions.
//! Which rules apply to a block is decided purely by its timestamp against
//! hard-coded switch times, so these predicates must never change.

use crate::params::Network;

/// Protocol switch time of the v0.3 kernel protocol.
const PROTOCOL_V03_SWITCH_TIME: i64 = 1_363_800_000;
const PROTOCOL_V03_TEST_SWITCH_TIME: i64 = 1_359_781_000;
/// Protocol switch time of the v0.4 kernel protocol.
const PROTOCOL_V04_SWITCH_TIME: i64 = 1_399_300_000;
const PROTOCOL_V04_TEST_SWITCH_TIME: i64 = 1_395_700_000;

/// Whether the v0.3 kernel rules apply at the given timestamp.
pub fn is_protocol_v03(network: Network, time: i64) -> bool {
    let switch_time = match network {
        Network::Testnet3 => PROTOCOL_V03_TEST_SWITCH_TIME,
        _ => PROTOCOL_V03_SWITCH_TIME,
    };
    time >= switch_time
}

/// Whether the v0.4 kernel rules apply at the given timestamp.
///
/// v0.4 implies v0.3.
pub fn is_protocol_v04(network: Network, time: i64) -> bool {
    let switch_time = match network {
        Network::Testnet3 => PROTOCOL_V04_TEST_SWITCH_TIME,
        _ => PROTOCOL_V04_SWITCH_TIME,
    };
    time >= switch_time
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_switch_edges() {
        assert!(!is_protocol_v03(Network::Mainnet, 1_363_799_999));
        assert!(is_protocol_v03(Network::Mainnet, 1_363_800_000));
        assert!(!is_protocol_v04(Network::Mainnet, 1_399_299_999));
        assert!(is_protocol_v04(Network::Mainnet, 1_399_300_000));
    }

    #[test]
    fn testnet_switch_edges() {
        assert!(!is_protocol_v03(Network::Testnet3, 1_359_780_999));
        assert!(is_protocol_v03(Network::Testnet3, 1_359_781_000));
        assert!(!is_protocol_v04(Network::Testnet3, 1_395_699_999));
        assert!(is_protocol_v04(Network::Testnet3, 1_395_700_000));
    }

    #[test]
    fn v04_implies_v03() {
        for network in [Network::Mainnet, Network::Testnet3, Network::Regtest] {
            for time in [1_300_000_000, 1_360_000_000, 1_365_000_000, 1_400_000_000] {
                if is_protocol_v04(network, time) {
                    assert!(is_protocol_v03(network, time));
                }
            }
        }
    }
}
