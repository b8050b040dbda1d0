//! Bonding-curve market with a virtual quote reserve.
//!
//! Pricing uses `(V + R) * T = k` where `V` is the immutable virtual quote
//! reserve, `R` the real quote held, and `T` the token reserve. `V` keeps the
//! price finite at launch and is the only reserve the floor price depends on.
//!
//! Every method either returns an error without touching `self` or commits
//! the whole transition.

use serde::{Deserialize, Serialize};

use wave_core::constants::TOKEN_UNIT;
use wave_core::error::MarketError;
use wave_core::math::{add, mul_div, mul_div_ceil, sub};
use wave_core::types::SwapDirection;

/// Reserves of one token's market.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub(crate) virtual_quote_reserve: u128,
    pub(crate) real_quote_reserve: u128,
    pub(crate) token_reserve: u128,
    pub(crate) max_supply: u128,
}

/// Result of a committed swap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub direction: SwapDirection,
    /// Net input that reached the curve.
    pub amount_in: u128,
    pub amount_out: u128,
    /// Reserves after the swap.
    pub real_quote_reserve: u128,
    pub token_reserve: u128,
}

impl Market {
    /// A fresh market holding the whole supply and no real quote.
    pub fn new(virtual_quote_reserve: u128, initial_supply: u128) -> Result<Self, MarketError> {
        Self::from_reserves(virtual_quote_reserve, 0, initial_supply, initial_supply)
    }

    /// Rebuild a market from stored reserves.
    ///
    /// # Errors
    ///
    /// - [`MarketError::InvalidReserves`] if `V` or `T` is zero, `T > max_supply`,
    ///   or `(V + R) * T < V * max_supply`
    pub fn from_reserves(
        virtual_quote_reserve: u128,
        real_quote_reserve: u128,
        token_reserve: u128,
        max_supply: u128,
    ) -> Result<Self, MarketError> {
        if virtual_quote_reserve == 0 || token_reserve == 0 || token_reserve > max_supply {
            return Err(MarketError::InvalidReserves);
        }
        let pricing = add(virtual_quote_reserve, real_quote_reserve)?;
        // (V + R) * T >= V * S  <=>  ceil(V * S / T) <= V + R
        if mul_div_ceil(virtual_quote_reserve, max_supply, token_reserve)? > pricing {
            return Err(MarketError::InvalidReserves);
        }
        Ok(Self { virtual_quote_reserve, real_quote_reserve, token_reserve, max_supply })
    }

    /// Create a market and execute the creator's fee-free seed buy.
    ///
    /// Returns the market and the tokens bought by the seed.
    ///
    /// # Errors
    ///
    /// - [`MarketError::SeedTooSmall`] if `seed` is zero while `require_seed`
    ///   is set, or a positive seed buys no tokens
    pub fn launch(
        virtual_quote_reserve: u128,
        initial_supply: u128,
        seed: u128,
        require_seed: bool,
    ) -> Result<(Self, u128), MarketError> {
        let mut market = Self::new(virtual_quote_reserve, initial_supply)?;
        if seed == 0 {
            if require_seed {
                return Err(MarketError::SeedTooSmall);
            }
            return Ok((market, 0));
        }
        let out = market.quote(seed, SwapDirection::Buy)?;
        if out == 0 {
            return Err(MarketError::SeedTooSmall);
        }
        market.apply(SwapDirection::Buy, seed, out)?;
        Ok((market, out))
    }

    pub fn virtual_quote_reserve(&self) -> u128 {
        self.virtual_quote_reserve
    }

    pub fn real_quote_reserve(&self) -> u128 {
        self.real_quote_reserve
    }

    pub fn token_reserve(&self) -> u128 {
        self.token_reserve
    }

    pub fn max_supply(&self) -> u128 {
        self.max_supply
    }

    /// Tokens held outside the curve.
    pub fn circulating_supply(&self) -> u128 {
        self.max_supply - self.token_reserve
    }

    /// `V + R`, the quote side used for pricing.
    pub fn pricing_quote_reserve(&self) -> Result<u128, MarketError> {
        Ok(add(self.virtual_quote_reserve, self.real_quote_reserve)?)
    }

    /// Curve output for a hypothetical swap of `amount_in`, before fees.
    ///
    /// # Errors
    ///
    /// - [`MarketError::ExceedsCirculating`] for a sell larger than the circulating supply
    /// - [`MarketError::ReserveExhausted`] if a sell would pay out more than the real reserve
    pub fn quote(&self, amount_in: u128, direction: SwapDirection) -> Result<u128, MarketError> {
        let pricing = self.pricing_quote_reserve()?;
        match direction {
            SwapDirection::Buy => {
                // T * q / (V + R + q)
                Ok(mul_div(self.token_reserve, amount_in, add(pricing, amount_in)?)?)
            }
            SwapDirection::Sell => {
                let circulating = self.circulating_supply();
                if amount_in > circulating {
                    return Err(MarketError::ExceedsCirculating { amount: amount_in, circulating });
                }
                // (V + R) * t / (T + t)
                let out = mul_div(pricing, amount_in, add(self.token_reserve, amount_in)?)?;
                if out > self.real_quote_reserve {
                    return Err(MarketError::ReserveExhausted {
                        need: out,
                        reserve: self.real_quote_reserve,
                    });
                }
                Ok(out)
            }
        }
    }

    /// Execute a swap of net input `amount_in`.
    ///
    /// Checks run in order: deadline, zero amount, curve math, slippage.
    /// `deadline = None` disables the deadline check.
    pub fn swap(
        &mut self,
        amount_in: u128,
        min_amount_out: u128,
        direction: SwapDirection,
        deadline: Option<u64>,
        now: u64,
    ) -> Result<SwapOutcome, MarketError> {
        check_deadline(deadline, now)?;
        if amount_in == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let amount_out = self.quote(amount_in, direction)?;
        if amount_out < min_amount_out {
            return Err(MarketError::SlippageExceeded { amount_out, min_amount_out });
        }
        self.apply(direction, amount_in, amount_out)?;
        Ok(SwapOutcome {
            direction,
            amount_in,
            amount_out,
            real_quote_reserve: self.real_quote_reserve,
            token_reserve: self.token_reserve,
        })
    }

    fn apply(
        &mut self,
        direction: SwapDirection,
        amount_in: u128,
        amount_out: u128,
    ) -> Result<(), MarketError> {
        let (real, tokens) = match direction {
            SwapDirection::Buy => (
                add(self.real_quote_reserve, amount_in)?,
                sub(self.token_reserve, amount_out)?,
            ),
            SwapDirection::Sell => (
                sub(self.real_quote_reserve, amount_out)?,
                add(self.token_reserve, amount_in)?,
            ),
        };
        self.real_quote_reserve = real;
        self.token_reserve = tokens;
        Ok(())
    }

    /// Spot price in raw quote per whole token: `(V + R) * TOKEN_UNIT / T`.
    pub fn market_price(&self) -> Result<u128, MarketError> {
        Ok(mul_div(self.pricing_quote_reserve()?, TOKEN_UNIT, self.token_reserve)?)
    }

    /// Price at which the last token would sell: `V * TOKEN_UNIT / max_supply`.
    pub fn floor_price(&self) -> Result<u128, MarketError> {
        Ok(mul_div(self.virtual_quote_reserve, TOKEN_UNIT, self.max_supply)?)
    }

    /// The factors `(V + R, T)` of the curve product.
    pub fn curve_factors(&self) -> Result<(u128, u128), MarketError> {
        Ok((self.pricing_quote_reserve()?, self.token_reserve))
    }
}

/// Fail with [`MarketError::Expired`] if `now` is past `deadline`.
pub fn check_deadline(deadline: Option<u64>, now: u64) -> Result<(), MarketError> {
    match deadline {
        Some(deadline) if now > deadline => Err(MarketError::Expired { deadline, now }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wave_core::constants::{INITIAL_SUPPLY, QUOTE_UNIT, RESERVE_VIRT_QUOTE_RAW};

    fn small_market() -> Market {
        Market::from_reserves(1_000, 0, 1_000_000, 1_000_000).unwrap()
    }

    fn default_market() -> Market {
        Market::new(RESERVE_VIRT_QUOTE_RAW, INITIAL_SUPPLY).unwrap()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    #[test]
    fn new_market_holds_everything() {
        let m = default_market();
        assert_eq!(m.real_quote_reserve(), 0);
        assert_eq!(m.token_reserve(), INITIAL_SUPPLY);
        assert_eq!(m.circulating_supply(), 0);
        assert_eq!(m.market_price().unwrap(), 100);
        assert_eq!(m.floor_price().unwrap(), 100);
    }

    #[test]
    fn from_reserves_rejects_inconsistent_state() {
        assert_eq!(Market::from_reserves(0, 0, 1, 1), Err(MarketError::InvalidReserves));
        assert_eq!(Market::from_reserves(1, 0, 0, 1), Err(MarketError::InvalidReserves));
        assert_eq!(Market::from_reserves(1, 0, 2, 1), Err(MarketError::InvalidReserves));
        // Tokens circulate but no real quote backs them.
        assert_eq!(
            Market::from_reserves(1_000, 0, 900_000, 1_000_000),
            Err(MarketError::InvalidReserves)
        );
    }

    #[test]
    fn launch_executes_seed_buy() {
        let (m, out) = Market::launch(1_000, 1_000_000, 10, true).unwrap();
        // floor(9900.99..)
        assert_eq!(out, 9_900);
        assert_eq!(m.real_quote_reserve(), 10);
        assert_eq!(m.circulating_supply(), 9_900);
    }

    #[test]
    fn launch_rejects_zero_seed_when_required() {
        assert_eq!(Market::launch(1_000, 1_000_000, 0, true), Err(MarketError::SeedTooSmall));
        let (m, out) = Market::launch(1_000, 1_000_000, 0, false).unwrap();
        assert_eq!(out, 0);
        assert_eq!(m, small_market());
    }

    #[test]
    fn launch_rejects_dust_seed() {
        // 1 raw quote buys 0 tokens when V dwarfs the supply.
        assert_eq!(Market::launch(1_000_000, 100, 1, true), Err(MarketError::SeedTooSmall));
    }

    // ------------------------------------------------------------------
    // Quotes and swaps
    // ------------------------------------------------------------------

    #[test]
    fn buy_output_rounds_down_in_the_pools_favour() {
        // 1_000_000 * 10 / 1010 = 9900.99.., floored: the trader never
        // receives the fractional token.
        assert_eq!(small_market().quote(10, SwapDirection::Buy).unwrap(), 9_900);
    }

    #[test]
    fn buy_then_sell_returns_less_than_paid() {
        let mut m = small_market();
        let bought = m.swap(10, 0, SwapDirection::Buy, None, 0).unwrap().amount_out;
        let sold = m.swap(bought, 0, SwapDirection::Sell, None, 0).unwrap().amount_out;
        assert!(sold < 10);
        assert_eq!(sold, 9);
    }

    #[test]
    fn sell_more_than_circulating_fails() {
        let (m, out) = Market::launch(1_000, 1_000_000, 10, true).unwrap();
        assert_eq!(
            m.quote(out + 1, SwapDirection::Sell),
            Err(MarketError::ExceedsCirculating { amount: out + 1, circulating: out })
        );
    }

    #[test]
    fn selling_everything_stays_within_real_reserve() {
        // Tight but consistent: (V + R) * T == V * S.
        let m = Market::from_reserves(1_000, 100, 1_000_000, 1_100_000).unwrap();
        assert_eq!(m.quote(100_000, SwapDirection::Sell).unwrap(), 100);
    }

    #[test]
    fn swap_check_order() {
        let mut m = small_market();
        // Expired wins over zero amount.
        assert_eq!(
            m.swap(0, 0, SwapDirection::Buy, Some(5), 6),
            Err(MarketError::Expired { deadline: 5, now: 6 })
        );
        assert_eq!(m.swap(0, 0, SwapDirection::Buy, Some(6), 6), Err(MarketError::ZeroAmount));
        assert_eq!(
            m.swap(10, 9_901, SwapDirection::Buy, None, 6),
            Err(MarketError::SlippageExceeded { amount_out: 9_900, min_amount_out: 9_901 })
        );
        assert_eq!(m, small_market());
    }

    #[test]
    fn swap_reports_new_reserves() {
        let mut m = small_market();
        let outcome = m.swap(10, 9_900, SwapDirection::Buy, Some(100), 100).unwrap();
        assert_eq!(outcome.real_quote_reserve, 10);
        assert_eq!(outcome.token_reserve, 1_000_000 - 9_900);
        assert_eq!(outcome.amount_in, 10);
    }

    #[test]
    fn price_rises_with_buys() {
        let mut m = default_market();
        let before = m.market_price().unwrap();
        m.swap(1_000 * QUOTE_UNIT, 0, SwapDirection::Buy, None, 0).unwrap();
        assert!(m.market_price().unwrap() > before);
        assert_eq!(m.floor_price().unwrap(), before);
    }

    #[test]
    fn check_deadline_boundary() {
        assert!(check_deadline(None, u64::MAX).is_ok());
        assert!(check_deadline(Some(10), 10).is_ok());
        assert!(check_deadline(Some(10), 11).is_err());
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    fn product(m: &Market) -> (u128, u128) {
        m.curve_factors().unwrap()
    }

    fn product_ge(a: (u128, u128), b: (u128, u128)) -> bool {
        // Compare a.0 * a.1 >= b.0 * b.1 without overflow via division bounds.
        mul_div_ceil(b.0, b.1, a.1).unwrap() <= a.0
    }

    proptest! {
        #[test]
        fn round_trip_never_profits(
            seed in 1u128..=1_000_000 * QUOTE_UNIT,
            q in 1u128..=1_000_000 * QUOTE_UNIT,
        ) {
            let (mut m, _) = Market::launch(RESERVE_VIRT_QUOTE_RAW, INITIAL_SUPPLY, seed, true).unwrap();
            let before = product(&m);
            let bought = m.swap(q, 0, SwapDirection::Buy, None, 0).unwrap().amount_out;
            prop_assume!(bought > 0);
            let back = m.swap(bought, 0, SwapDirection::Sell, None, 0).unwrap().amount_out;
            prop_assert!(back <= q);
            prop_assert!(product_ge(product(&m), before));
        }

        #[test]
        fn consistency_survives_swaps(
            buys in proptest::collection::vec(1u128..=100_000 * QUOTE_UNIT, 1..8),
            sell_bps in 0u128..=10_000,
        ) {
            let mut m = default_market();
            for q in buys {
                m.swap(q, 0, SwapDirection::Buy, None, 0).unwrap();
            }
            let t = m.circulating_supply() * sell_bps / 10_000;
            if t > 0 {
                m.swap(t, 0, SwapDirection::Sell, None, 0).unwrap();
            }
            prop_assert!(Market::from_reserves(
                m.virtual_quote_reserve(),
                m.real_quote_reserve(),
                m.token_reserve(),
                m.max_supply(),
            ).is_ok());
        }
    }
}
