//! # wave-rewards — Reward streaming.
//!
//! Each token owns one [`RewardPool`] with a stream per reward currency.
//! Funds notified into a stream are paid out linearly over a fixed period,
//! split between stakers in proportion to their stake at every instant.
//! A top-up may extend or raise the payout rate but never lower it.

pub mod pool;

pub use pool::{FundOutcome, Position, RewardPool, RewardStream};
