//! Price decay between collections.
//!
//! A decay policy maps elapsed seconds to a factor in parts per billion:
//! `10^9` right after a collection, falling toward zero. The live price is
//! `min + (ceiling - min) * factor / 10^9`, so it never drops below `min`.

use wave_core::config::PriceDecay;
use wave_core::constants::PPB_PRECISION;
use wave_core::error::MathError;
use wave_core::math::{add, fixed_pow, mul_div, sub};

/// Remaining share of the excess over the floor after `elapsed` seconds.
pub fn decay_factor_ppb(policy: &PriceDecay, elapsed: u64) -> Result<u64, MathError> {
    match *policy {
        PriceDecay::Linear { duration_secs } => {
            if duration_secs == 0 {
                return Err(MathError::DivisionByZero);
            }
            if elapsed >= duration_secs {
                return Ok(0);
            }
            let left = (duration_secs - elapsed) as u128;
            let factor = mul_div(PPB_PRECISION as u128, left, duration_secs as u128)?;
            Ok(factor as u64)
        }
        PriceDecay::Geometric { step_secs, retention_ppb } => {
            if step_secs == 0 {
                return Err(MathError::DivisionByZero);
            }
            fixed_pow(retention_ppb.min(PPB_PRECISION), elapsed / step_secs, PPB_PRECISION)
        }
    }
}

/// Price `elapsed` seconds after the ceiling was set.
///
/// A ceiling at or below `min` yields `min`.
pub fn decayed_price(
    min: u128,
    ceiling: u128,
    policy: &PriceDecay,
    elapsed: u64,
) -> Result<u128, MathError> {
    if ceiling <= min {
        return Ok(min);
    }
    let factor = decay_factor_ppb(policy, elapsed)?;
    let excess = mul_div(sub(ceiling, min)?, factor as u128, PPB_PRECISION as u128)?;
    add(min, excess)
}
