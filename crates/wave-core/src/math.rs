//! Fixed-point and overflow-safe integer arithmetic.
//!
//! All engine math is integer-only for determinism. Products of two `u128`
//! amounts (token reserves are ~10^27 raw units) can exceed `u128`, so
//! [`mul_div`] and [`mul_div_ceil`] carry the intermediate in 256 bits.

use uint::construct_uint;

use crate::constants::BPS_PRECISION;
use crate::error::MathError;

construct_uint! {
    /// 256-bit intermediate for `a * b / d`.
    struct U256(4);
}

fn narrow(value: U256) -> Result<u128, MathError> {
    if value.bits() > 128 {
        return Err(MathError::Overflow);
    }
    Ok(value.low_u128())
}

/// `floor(a * b / d)` without intermediate overflow.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    if d == 0 {
        return Err(MathError::DivisionByZero);
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / d);
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(d))
}

/// `ceil(a * b / d)` without intermediate overflow.
pub fn mul_div_ceil(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    if d == 0 {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = (U256::from(a) * U256::from(b)).div_mod(U256::from(d));
    if remainder.is_zero() {
        narrow(quotient)
    } else {
        narrow(quotient + U256::one())
    }
}

/// `amount * bps / 10_000`, rounded down.
pub fn apply_bps(amount: u128, bps: u128) -> Result<u128, MathError> {
    mul_div(amount, bps, BPS_PRECISION)
}

pub fn add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow)
}

/// Fixed-point exponentiation: computes `(base/precision)^exp` in fixed-point.
///
/// Uses binary exponentiation for O(log n) multiplications.
/// `base` and return value are in fixed-point with `precision` as denominator.
pub fn fixed_pow(base: u64, exp: u64, precision: u64) -> Result<u64, MathError> {
    if precision == 0 {
        return Err(MathError::DivisionByZero);
    }
    if exp == 0 {
        return Ok(precision);
    }

    let p = precision as u128;
    let mut result: u128 = p;
    let mut b: u128 = base as u128;
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result = result.checked_mul(b).ok_or(MathError::Overflow)? / p;
        }
        e >>= 1;
        if e > 0 {
            b = b.checked_mul(b).ok_or(MathError::Overflow)? / p;
        }
        // Once the running value hits zero it stays there.
        if result == 0 {
            return Ok(0);
        }
    }

    u64::try_from(result).map_err(|_| MathError::Overflow)
}
