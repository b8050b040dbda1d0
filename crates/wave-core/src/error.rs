//! Error types for the Wavefront engine.
use thiserror::Error;

use crate::types::{Address, TokenId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("division by zero")] DivisionByZero,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance for {account}: have {have}, need {need}")] InsufficientBalance { account: Address, have: u128, need: u128 },
    #[error("balance overflow")] Overflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("slippage exceeded: out {amount_out} < min {min_amount_out}")] SlippageExceeded { amount_out: u128, min_amount_out: u128 },
    #[error("expired: deadline {deadline} < now {now}")] Expired { deadline: u64, now: u64 },
    #[error("seed too small")] SeedTooSmall,
    #[error("zero amount")] ZeroAmount,
    #[error("reserve exhausted: need {need}, reserve {reserve}")] ReserveExhausted { need: u128, reserve: u128 },
    #[error("amount {amount} exceeds circulating supply {circulating}")] ExceedsCirculating { amount: u128, circulating: u128 },
    #[error("no circulating supply")] NoCirculatingSupply,
    #[error("invalid reserves")] InvalidReserves,
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreditError {
    #[error("insufficient collateral: debt {debt} would exceed limit {limit}")] InsufficientCollateral { debt: u128, limit: u128 },
    #[error("debt {debt} exceeds collateral {limit} after transfer")] DebtExceedsCollateral { debt: u128, limit: u128 },
    #[error("no debt")] NoDebt,
    #[error("zero amount")] ZeroAmount,
    #[error("insufficient liquidity: need {need}, available {available}")] InsufficientLiquidity { need: u128, available: u128 },
    #[error(transparent)] Market(#[from] MarketError),
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("unknown content item: {0}")] UnknownItem(u64),
    #[error("epoch mismatch: expected {expected}, live {live}")] EpochMismatch { expected: u64, live: u64 },
    #[error("expired: deadline {deadline} < now {now}")] Expired { deadline: u64, now: u64 },
    #[error("price exceeded: price {price} > max {max_price}")] PriceExceeded { price: u128, max_price: u128 },
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("reward smaller than left: amount {amount}, left {left}")] RewardSmallerThanLeft { amount: u128, left: u128 },
    #[error("reward {amount} smaller than duration {duration}")] RewardTooSmall { amount: u128, duration: u64 },
    #[error("withdraw {amount} exceeds stake {stake}")] StakeUnderflow { amount: u128, stake: u128 },
    #[error(transparent)] Math(#[from] MathError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config: {0}")] Invalid(String),
    #[error("config source: {0}")] Source(String),
}

#[derive(Error, Debug)]
pub enum WaveError {
    #[error("unknown token: {0}")] UnknownToken(TokenId),
    #[error("unauthorized: {0}")] Unauthorized(Address),
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] Market(#[from] MarketError),
    #[error(transparent)] Credit(#[from] CreditError),
    #[error(transparent)] Content(#[from] ContentError),
    #[error(transparent)] Reward(#[from] RewardError),
    #[error(transparent)] Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_convert_into_wave_error() {
        let err: WaveError = MarketError::SeedTooSmall.into();
        assert!(matches!(err, WaveError::Market(MarketError::SeedTooSmall)));

        let err: WaveError = RewardError::RewardSmallerThanLeft { amount: 1, left: 2 }.into();
        assert_eq!(err.to_string(), "reward smaller than left: amount 1, left 2");
    }

    #[test]
    fn math_error_lifts_into_domain_errors() {
        let err: MarketError = MathError::Overflow.into();
        assert_eq!(err, MarketError::Math(MathError::Overflow));
        let err: CreditError = MarketError::NoCirculatingSupply.into();
        assert_eq!(err.to_string(), "no circulating supply");
    }
}
