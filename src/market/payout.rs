//! Pari-mutuel pool arithmetic.

use alloy::primitives::U256;

/// Protocol fee in basis points (2%).
pub const PROTOCOL_FEE_BPS: u64 = 200;

const BPS_DENOMINATOR: u64 = 10_000;

/// Expected payout for `outcome_stake` in a pool of `total_stake`, after the
/// protocol fee. Zero when nobody backed the outcome.
pub fn estimate_payout(total_stake: U256, outcome_stake: U256, fee_bps: u64) -> U256 {
    if outcome_stake.is_zero() || total_stake.is_zero() {
        return U256::ZERO;
    }
    let fee = total_stake * U256::from(fee_bps) / U256::from(BPS_DENOMINATOR);
    let net_pool = total_stake - fee;
    net_pool * outcome_stake / total_stake
}

/// Share of the pool backing each of two outcomes, in whole percent.
/// An empty pool reads as an even split.
pub fn outcome_shares(outcome_stakes: [U256; 2]) -> [u8; 2] {
    let total = outcome_stakes[0] + outcome_stakes[1];
    if total.is_zero() {
        return [50, 50];
    }
    let share = |stake: U256| -> u8 {
        let pct = (stake * U256::from(100u64) + total / U256::from(2u64)) / total;
        pct.saturating_to::<u64>().min(100) as u8
    };
    [share(outcome_stakes[0]), share(outcome_stakes[1])]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn payout_deducts_fee() {
        // 100 total, 2% fee -> 98 net, backer holds half -> 49.
        assert_eq!(estimate_payout(u(100), u(50), PROTOCOL_FEE_BPS), u(49));
    }

    #[test]
    fn payout_is_zero_without_backing() {
        assert_eq!(estimate_payout(u(100), U256::ZERO, PROTOCOL_FEE_BPS), U256::ZERO);
        assert_eq!(estimate_payout(U256::ZERO, U256::ZERO, PROTOCOL_FEE_BPS), U256::ZERO);
    }

    #[test]
    fn shares_default_to_even_split() {
        assert_eq!(outcome_shares([U256::ZERO, U256::ZERO]), [50, 50]);
        assert_eq!(outcome_shares([u(3), u(1)]), [75, 25]);
    }
}
