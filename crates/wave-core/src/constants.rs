//! Protocol constants. Quote amounts are in raw quote units (6 decimals),
//! token amounts in raw token units (18 decimals).
//!
//! These are the default deployment values; every one of them can be
//! overridden through [`DeploymentConfig`](crate::config::DeploymentConfig).

/// One whole unit of the quote currency in raw units.
pub const QUOTE_UNIT: u128 = 1_000_000;

/// One whole token in raw units.
pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// Total token supply placed in the curve when a market is created.
pub const INITIAL_SUPPLY: u128 = 1_000_000_000 * TOKEN_UNIT;

/// Virtual quote reserve added to the real reserve for pricing.
///
/// Fixes the opening price at `RESERVE_VIRT_QUOTE_RAW / INITIAL_SUPPLY`
/// (0.0001 quote per token with the defaults) and is the only reserve the
/// floor price is computed from.
pub const RESERVE_VIRT_QUOTE_RAW: u128 = 100_000 * QUOTE_UNIT;

/// Lowest price a content item can ever be collected at.
pub const CONTENT_MIN_INIT_PRICE: u128 = QUOTE_UNIT;

pub const BPS_PRECISION: u128 = 10_000;
pub const PPB_PRECISION: u64 = 1_000_000_000;

/// Scale applied to stored reward rates and reward-per-stake accumulators.
pub const RATE_PRECISION: u128 = 1_000_000_000_000;

/// Trading fee charged on the input side of every swap.
pub const FEE_BPS: u128 = 100;
/// Portion of the trading fee paid to the referrer, if any.
pub const REFERRER_SHARE_BPS: u128 = 2_000;
/// Portion of the trading fee paid to the treasury, if one is set.
pub const TREASURY_SHARE_BPS: u128 = 2_000;

/// Content ceiling after a collection, as a multiple of the price paid.
pub const CONTENT_CEILING_MULTIPLIER_BPS: u128 = 20_000;
/// Default time for a content price to fall from its ceiling to the floor.
pub const CONTENT_DECAY_SECS: u64 = 86_400;

/// Length of a reward period started by a funding top-up.
pub const REWARD_DURATION_SECS: u64 = 7 * 86_400;
