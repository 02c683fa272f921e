//! Liquidity <-> token amounts (Uniswap V3 LiquidityAmounts / SqrtPriceMath)
//!
//! All results are truncated toward zero. A preview must never report more
//! tokens than the pool would actually hand out.

use alloy_primitives::U256;

use super::full_math::{mul_div, Q96};
use crate::error::{Result, SimulationError};

fn sorted(sqrt_a: U256, sqrt_b: U256) -> (U256, U256) {
    if sqrt_a > sqrt_b {
        (sqrt_b, sqrt_a)
    } else {
        (sqrt_a, sqrt_b)
    }
}

fn to_u128(value: U256, what: &str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(SimulationError::Math(format!("{} exceeds uint128", what)));
    }
    Ok(value.to::<u128>())
}

/// Token0 owed for `liquidity` between two sqrt prices
pub fn amount0_delta(sqrt_a: U256, sqrt_b: U256, liquidity: u128) -> Result<U256> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);
    if lower.is_zero() {
        return Err(SimulationError::Math("sqrt price is zero".into()));
    }
    let numerator = U256::from(liquidity) << 96;
    Ok(mul_div(numerator, upper - lower, upper)? / lower)
}

/// Token1 owed for `liquidity` between two sqrt prices
pub fn amount1_delta(sqrt_a: U256, sqrt_b: U256, liquidity: u128) -> Result<U256> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);
    mul_div(U256::from(liquidity), upper - lower, Q96)
}

pub fn liquidity_for_amount0(sqrt_a: U256, sqrt_b: U256, amount0: U256) -> Result<u128> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);
    let intermediate = mul_div(lower, upper, Q96)?;
    to_u128(mul_div(amount0, intermediate, upper - lower)?, "liquidity")
}

pub fn liquidity_for_amount1(sqrt_a: U256, sqrt_b: U256, amount1: U256) -> Result<u128> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);
    to_u128(mul_div(amount1, Q96, upper - lower)?, "liquidity")
}

/// Token amounts held by `liquidity` in [sqrt_a, sqrt_b] at the current price
pub fn amounts_for_liquidity(
    sqrt_price_x96: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
) -> Result<(U256, U256)> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);

    if sqrt_price_x96 <= lower {
        Ok((amount0_delta(lower, upper, liquidity)?, U256::ZERO))
    } else if sqrt_price_x96 < upper {
        Ok((
            amount0_delta(sqrt_price_x96, upper, liquidity)?,
            amount1_delta(lower, sqrt_price_x96, liquidity)?,
        ))
    } else {
        Ok((U256::ZERO, amount1_delta(lower, upper, liquidity)?))
    }
}

/// Max liquidity mintable from the given amounts at the current price
pub fn liquidity_for_amounts(
    sqrt_price_x96: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    amount0: U256,
    amount1: U256,
) -> Result<u128> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);

    if sqrt_price_x96 <= lower {
        liquidity_for_amount0(lower, upper, amount0)
    } else if sqrt_price_x96 < upper {
        let from0 = liquidity_for_amount0(sqrt_price_x96, upper, amount0)?;
        let from1 = liquidity_for_amount1(lower, sqrt_price_x96, amount1)?;
        Ok(from0.min(from1))
    } else {
        liquidity_for_amount1(lower, upper, amount1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_math::sqrt_ratio_at_tick;

    fn diff(a: U256, b: U256) -> U256 {
        if a > b {
            a - b
        } else {
            b - a
        }
    }

    #[test]
    fn test_amounts_three_regions() {
        let lower = sqrt_ratio_at_tick(-60).unwrap();
        let upper = sqrt_ratio_at_tick(60).unwrap();
        let liquidity = 1_000_000_000_000_000_000u128;

        let below = sqrt_ratio_at_tick(-120).unwrap();
        let (a0, a1) = amounts_for_liquidity(below, lower, upper, liquidity).unwrap();
        assert!(a0 > U256::ZERO);
        assert_eq!(a1, U256::ZERO);

        let above = sqrt_ratio_at_tick(120).unwrap();
        let (a0, a1) = amounts_for_liquidity(above, lower, upper, liquidity).unwrap();
        assert_eq!(a0, U256::ZERO);
        assert!(a1 > U256::ZERO);

        // Symmetric range around tick 0 holds (almost) equal amounts
        let (a0, a1) = amounts_for_liquidity(Q96, lower, upper, liquidity).unwrap();
        assert_eq!(a0, U256::from(2_995_354_955_910_780u64));
        assert_eq!(a1, U256::from(2_995_354_955_910_780u64));
    }

    #[test]
    fn test_liquidity_amounts_are_inverse() {
        let lower = sqrt_ratio_at_tick(-60).unwrap();
        let upper = sqrt_ratio_at_tick(60).unwrap();
        let liquidity = 1_000_000_000_000_000_000u128;

        let (a0, a1) = amounts_for_liquidity(Q96, lower, upper, liquidity).unwrap();
        let recovered = liquidity_for_amounts(Q96, lower, upper, a0, a1).unwrap();
        assert!(recovered <= liquidity);

        let (b0, b1) = amounts_for_liquidity(Q96, lower, upper, recovered).unwrap();
        assert!(diff(a0, b0) <= U256::from(1u64));
        assert!(diff(a1, b1) <= U256::from(1u64));
    }

    #[test]
    fn test_single_sided_inverse() {
        let lower = sqrt_ratio_at_tick(1000).unwrap();
        let upper = sqrt_ratio_at_tick(2000).unwrap();
        let price = sqrt_ratio_at_tick(0).unwrap();
        let amount0 = U256::from(5_000_000_000u64);

        let liquidity = liquidity_for_amounts(price, lower, upper, amount0, U256::ZERO).unwrap();
        let (back0, back1) = amounts_for_liquidity(price, lower, upper, liquidity).unwrap();
        assert!(back0 <= amount0);
        assert!(amount0 - back0 <= U256::from(1u64));
        assert_eq!(back1, U256::ZERO);
    }

    #[test]
    fn test_bound_order_does_not_matter() {
        let a = sqrt_ratio_at_tick(-600).unwrap();
        let b = sqrt_ratio_at_tick(600).unwrap();
        assert_eq!(amount0_delta(a, b, 10u128.pow(12)).unwrap(), amount0_delta(b, a, 10u128.pow(12)).unwrap());
        assert_eq!(amount1_delta(a, b, 10u128.pow(12)).unwrap(), amount1_delta(b, a, 10u128.pow(12)).unwrap());
    }

    #[test]
    fn test_liquidity_overflow_is_an_error() {
        let a = sqrt_ratio_at_tick(0).unwrap();
        let b = sqrt_ratio_at_tick(1).unwrap();
        assert!(liquidity_for_amount1(a, b, U256::MAX >> 64).is_err());
    }
}
