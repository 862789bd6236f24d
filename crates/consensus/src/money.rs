//! Monetary units and money range rules.

pub type Amount = i64;

pub const CENT: Amount = 10_000;
pub const COIN: Amount = 100 * CENT;

/// The minimum fee a transaction must pay per started kilobyte.
pub const MIN_TX_FEE: Amount = CENT;
pub const MIN_RELAY_TX_FEE: Amount = CENT;
/// Non-empty outputs below this value are rejected (network rule).
pub const MIN_TXOUT_AMOUNT: Amount = MIN_TX_FEE;

/// No amount larger than this (in sunnys) is valid.
pub const MAX_MONEY: Amount = 2_000_000_000 * COIN;
/// Largest subsidy a proof-of-work block may mint.
pub const MAX_MINT_PROOF_OF_WORK: Amount = 9_999 * COIN;

pub fn money_range(value: Amount) -> bool {
    (0..=MAX_MONEY).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units() {
        assert_eq!(COIN, 1_000_000);
        assert_eq!(CENT, 10_000);
        assert_eq!(MAX_MINT_PROOF_OF_WORK, 9_999_000_000);
    }

    #[test]
    fn range() {
        assert!(money_range(0));
        assert!(money_range(MAX_MONEY));
        assert!(!money_range(MAX_MONEY + 1));
        assert!(!money_range(-1));
    }
}
