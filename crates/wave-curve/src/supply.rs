//! Supply control: floor value, burn and heal.
//!
//! The floor value of a balance `b` is what its holder receives selling last,
//! after every other holder has sold: with only `V` left on the quote side
//! and `max_supply - b` tokens in the reserve, `V * b / (max_supply - b)`.
//!
//! Burning and healing both shrink `max_supply` relative to the circulating
//! supply, which lifts every holder's floor value. Neither pays anyone out.

use wave_core::error::MarketError;
use wave_core::math::{add, mul_div, mul_div_ceil, sub};

use crate::market::Market;

impl Market {
    /// Quote recoverable by selling `balance` after every other holder sold.
    ///
    /// # Errors
    ///
    /// - [`MarketError::ExceedsCirculating`] if `balance` is more than circulates
    pub fn floor_value(&self, balance: u128) -> Result<u128, MarketError> {
        if balance == 0 {
            return Ok(0);
        }
        let circulating = self.circulating_supply();
        if balance > circulating {
            return Err(MarketError::ExceedsCirculating { amount: balance, circulating });
        }
        // max_supply - balance >= token_reserve >= 1
        Ok(mul_div(self.virtual_quote_reserve, balance, self.max_supply - balance)?)
    }

    /// Remove `amount` tokens from circulation without paying out.
    ///
    /// The token reserve shrinks in proportion so the price paid by the
    /// remaining holders rises. Burning the whole circulating supply leaves
    /// the reserves untouched.
    pub fn burn(&mut self, amount: u128) -> Result<(), MarketError> {
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let circulating = self.circulating_supply();
        if amount > circulating {
            return Err(MarketError::ExceedsCirculating { amount, circulating });
        }
        let remaining = circulating - amount;
        let token_reserve = if remaining == 0 {
            self.token_reserve
        } else {
            // Round the reserve up so the curve stays backed.
            mul_div_ceil(self.token_reserve, remaining, circulating)?
        };
        let max_supply = add(token_reserve, remaining)?;
        self.token_reserve = token_reserve;
        self.max_supply = max_supply;
        Ok(())
    }

    /// Add `amount` quote to the real reserve without minting.
    ///
    /// The token reserve drops to the smallest value the new reserve still
    /// backs, so the circulating supply is unchanged and floor values rise.
    ///
    /// # Errors
    ///
    /// - [`MarketError::ZeroAmount`] if `amount` is zero
    /// - [`MarketError::NoCirculatingSupply`] if no tokens circulate
    pub fn heal(&mut self, amount: u128) -> Result<(), MarketError> {
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let circulating = self.circulating_supply();
        if circulating == 0 {
            return Err(MarketError::NoCirculatingSupply);
        }
        let real = add(self.real_quote_reserve, amount)?;
        let backed = mul_div_ceil(self.virtual_quote_reserve, circulating, real)?;
        let token_reserve = self.token_reserve.min(backed);
        let max_supply = add(token_reserve, circulating)?;
        self.real_quote_reserve = real;
        self.token_reserve = token_reserve;
        self.max_supply = max_supply;
        Ok(())
    }

    /// Tokens that would leave the reserve if `amount` were burned now.
    pub fn burn_reserve_delta(&self, amount: u128) -> Result<u128, MarketError> {
        let mut burned = self.clone();
        burned.burn(amount)?;
        Ok(sub(self.token_reserve, burned.token_reserve)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wave_core::constants::{INITIAL_SUPPLY, QUOTE_UNIT, RESERVE_VIRT_QUOTE_RAW};
    use wave_core::types::SwapDirection;

    fn seeded(seed: u128) -> Market {
        Market::launch(RESERVE_VIRT_QUOTE_RAW, INITIAL_SUPPLY, seed, true).unwrap().0
    }

    fn consistent(m: &Market) -> bool {
        Market::from_reserves(
            m.virtual_quote_reserve(),
            m.real_quote_reserve(),
            m.token_reserve(),
            m.max_supply(),
        )
        .is_ok()
    }

    // ------------------------------------------------------------------
    // Floor value
    // ------------------------------------------------------------------

    #[test]
    fn floor_value_of_everything_is_real_reserve_bound() {
        let m = Market::from_reserves(1_000, 100, 1_000_000, 1_100_000).unwrap();
        // 1000 * 100_000 / 1_000_000
        assert_eq!(m.floor_value(100_000).unwrap(), 100);
        assert_eq!(m.floor_value(0).unwrap(), 0);
        assert!(m.floor_value(100_001).is_err());
    }

    #[test]
    fn floor_value_never_exceeds_sale_proceeds() {
        let m = seeded(10_000 * QUOTE_UNIT);
        let all = m.circulating_supply();
        let proceeds = m.quote(all, SwapDirection::Sell).unwrap();
        assert!(m.floor_value(all).unwrap() <= proceeds);
    }

    // ------------------------------------------------------------------
    // Burn
    // ------------------------------------------------------------------

    #[test]
    fn burn_shrinks_reserve_proportionally() {
        let mut m = Market::from_reserves(1_000, 100, 1_000_000, 1_100_000).unwrap();
        m.burn(50_000).unwrap();
        assert_eq!(m.token_reserve(), 500_000);
        assert_eq!(m.circulating_supply(), 50_000);
        assert_eq!(m.real_quote_reserve(), 100);
        assert!(consistent(&m));
    }

    #[test]
    fn burn_raises_market_and_floor_price() {
        let mut m = seeded(10_000 * QUOTE_UNIT);
        let price = m.market_price().unwrap();
        let floor = m.floor_price().unwrap();
        m.burn(m.circulating_supply() / 3).unwrap();
        assert!(m.market_price().unwrap() > price);
        assert!(m.floor_price().unwrap() > floor);
    }

    #[test]
    fn burn_everything_keeps_reserves() {
        let mut m = seeded(10 * QUOTE_UNIT);
        let reserve = m.token_reserve();
        m.burn(m.circulating_supply()).unwrap();
        assert_eq!(m.token_reserve(), reserve);
        assert_eq!(m.max_supply(), reserve);
        assert_eq!(m.circulating_supply(), 0);
    }

    #[test]
    fn burn_rejects_zero_and_excess() {
        let mut m = seeded(10 * QUOTE_UNIT);
        assert_eq!(m.burn(0), Err(MarketError::ZeroAmount));
        let c = m.circulating_supply();
        assert!(matches!(m.burn(c + 1), Err(MarketError::ExceedsCirculating { .. })));
    }

    // ------------------------------------------------------------------
    // Heal
    // ------------------------------------------------------------------

    #[test]
    fn heal_requires_circulating_supply() {
        let mut m = Market::new(RESERVE_VIRT_QUOTE_RAW, INITIAL_SUPPLY).unwrap();
        assert_eq!(m.heal(1), Err(MarketError::NoCirculatingSupply));
        assert_eq!(m.heal(0), Err(MarketError::ZeroAmount));
    }

    #[test]
    fn heal_lifts_floor_value_and_keeps_circulating() {
        let mut m = seeded(10_000 * QUOTE_UNIT);
        let c = m.circulating_supply();
        let before = m.floor_value(c / 2).unwrap();
        m.heal(5_000 * QUOTE_UNIT).unwrap();
        assert_eq!(m.circulating_supply(), c);
        assert_eq!(m.real_quote_reserve(), 15_000 * QUOTE_UNIT);
        assert!(m.floor_value(c / 2).unwrap() > before);
        assert!(consistent(&m));
    }

    #[test]
    fn burn_reserve_delta_is_a_dry_run() {
        let m = Market::from_reserves(1_000, 100, 1_000_000, 1_100_000).unwrap();
        assert_eq!(m.burn_reserve_delta(50_000).unwrap(), 500_000);
        assert_eq!(m.token_reserve(), 1_000_000);
    }

    proptest! {
        #[test]
        fn burn_and_heal_keep_consistency(
            seed in 1u128..=1_000_000 * QUOTE_UNIT,
            burn_bps in 1u128..=10_000,
            heal in 1u128..=1_000_000 * QUOTE_UNIT,
        ) {
            let mut m = seeded(seed);
            let burn = (m.circulating_supply() * burn_bps / 10_000).max(1);
            m.burn(burn).unwrap();
            prop_assert!(consistent(&m));
            if m.circulating_supply() > 0 {
                let half = m.circulating_supply() / 2;
                let before = m.floor_value(half).unwrap();
                m.heal(heal).unwrap();
                prop_assert!(consistent(&m));
                prop_assert!(m.floor_value(half).unwrap() >= before);
            }
        }
    }
}
