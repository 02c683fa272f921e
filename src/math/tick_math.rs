//! Tick <-> sqrtPriceX96 conversions
//!
//! `sqrt_ratio_at_tick` is an exact port of Uniswap V3 TickMath.getSqrtRatioAtTick.
//! The inverse uses a binary search over that function, which yields the same
//! "greatest tick whose ratio is <= the input" answer as getTickAtSqrtRatio.

use alloy_primitives::{uint, U256};

use crate::error::{Result, SimulationError};

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

/// sqrt_ratio_at_tick(MIN_TICK)
pub const MIN_SQRT_RATIO: U256 = uint!(4295128739_U256);

/// sqrt_ratio_at_tick(MAX_TICK)
pub const MAX_SQRT_RATIO: U256 = uint!(1461446703485210103287273052203988822378723970342_U256);

/// Q128 multipliers for each bit of |tick|, from TickMath
const TICK_MULTIPLIERS: [(u32, U256); 19] = [
    (0x2, uint!(0xfff97272373d413259a46990580e213a_U256)),
    (0x4, uint!(0xfff2e50f5f656932ef12357cf3c7fdcc_U256)),
    (0x8, uint!(0xffe5caca7e10e4e61c3624eaa0941cd0_U256)),
    (0x10, uint!(0xffcb9843d60f6159c9db58835c926644_U256)),
    (0x20, uint!(0xff973b41fa98c081472e6896dfb254c0_U256)),
    (0x40, uint!(0xff2ea16466c96a3843ec78b326b52861_U256)),
    (0x80, uint!(0xfe5dee046a99a2a811c461f1969c3053_U256)),
    (0x100, uint!(0xfcbe86c7900a88aedcffc83b479aa3a4_U256)),
    (0x200, uint!(0xf987a7253ac413176f2b074cf7815e54_U256)),
    (0x400, uint!(0xf3392b0822b70005940c7a398e4b70f3_U256)),
    (0x800, uint!(0xe7159475a2c29b7443b29c7fa6e889d9_U256)),
    (0x1000, uint!(0xd097f3bdfd2022b8845ad8f792aa5825_U256)),
    (0x2000, uint!(0xa9f746462d870fdf8a65dc1f90e061e5_U256)),
    (0x4000, uint!(0x70d869a156d2a1b890bb3df62baf32f7_U256)),
    (0x8000, uint!(0x31be135f97d08fd981231505542fcfa6_U256)),
    (0x10000, uint!(0x9aa508b5b7a84e1c677de54f3e99bc9_U256)),
    (0x20000, uint!(0x5d6af8dedb81196699c329225ee604_U256)),
    (0x40000, uint!(0x2216e584f5fa1ea926041bedfe98_U256)),
    (0x80000, uint!(0x48a170391f7dc42444e8fa2_U256)),
];

/// Compute sqrt(1.0001^tick) * 2^96
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<U256> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(SimulationError::Math(format!(
            "tick {} out of bounds [{}, {}]",
            tick, MIN_TICK, MAX_TICK
        )));
    }
    Ok(sqrt_ratio_at_tick_unchecked(tick))
}

fn sqrt_ratio_at_tick_unchecked(tick: i32) -> U256 {
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        uint!(0xfffcb933bd6fad37aa2d162d1a594001_U256)
    } else {
        U256::from(1u64) << 128
    };

    // ratio <= 2^128 and every multiplier < 2^128, so the product fits in 256 bits
    for (bit, multiplier) in TICK_MULTIPLIERS {
        if abs_tick & bit != 0 {
            ratio = (ratio * multiplier) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up
    let shifted = ratio >> 32;
    if (ratio & U256::from(u32::MAX)).is_zero() {
        shifted
    } else {
        shifted + U256::from(1u64)
    }
}

/// Greatest tick such that sqrt_ratio_at_tick(tick) <= sqrt_price_x96
pub fn tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(SimulationError::Math(format!(
            "sqrtPriceX96 {} outside [MIN_SQRT_RATIO, MAX_SQRT_RATIO)",
            sqrt_price_x96
        )));
    }

    let (mut low, mut high) = (MIN_TICK, MAX_TICK);
    while low < high {
        // Upper mid so the loop always makes progress
        let mid = low + (high - low + 1) / 2;
        if sqrt_ratio_at_tick_unchecked(mid) <= sqrt_price_x96 {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Ok(low)
}

/// Tick spacing for the standard fee tiers (fee in hundredths of a bip)
pub fn tick_spacing_for_fee(fee: u32) -> Option<i32> {
    match fee {
        100 => Some(1),
        500 => Some(10),
        3000 => Some(60),
        10000 => Some(200),
        _ => None,
    }
}

/// Both ticks in bounds, aligned to `tick_spacing`, and lower < upper
pub fn validate_tick_range(tick_lower: i32, tick_upper: i32, tick_spacing: i32) -> Result<()> {
    let invalid = || SimulationError::TickRangeInvalid {
        lower: tick_lower,
        upper: tick_upper,
        spacing: tick_spacing,
    };

    if tick_spacing <= 0 || tick_lower >= tick_upper {
        return Err(invalid());
    }
    if tick_lower < MIN_TICK || tick_upper > MAX_TICK {
        return Err(invalid());
    }
    if tick_lower % tick_spacing != 0 || tick_upper % tick_spacing != 0 {
        return Err(invalid());
    }
    Ok(())
}

/// Round `tick` to the nearest multiple of `tick_spacing` inside the valid range
pub fn nearest_usable_tick(tick: i32, tick_spacing: i32) -> i32 {
    if tick_spacing <= 0 {
        return tick;
    }
    let rounded = ((tick as f64) / (tick_spacing as f64)).round() as i32 * tick_spacing;
    if rounded < MIN_TICK {
        rounded + tick_spacing
    } else if rounded > MAX_TICK {
        rounded - tick_spacing
    } else {
        rounded
    }
}

// ============================================
// HUMAN PRICE HELPERS (token1 per token0)
// ============================================

const TICK_BASE: f64 = 1.0001;

fn decimals_scale(decimals0: u8, decimals1: u8) -> f64 {
    10_f64.powi(decimals0 as i32 - decimals1 as i32)
}

/// Decimal-adjusted price at a tick
pub fn tick_to_price(tick: i32, decimals0: u8, decimals1: u8) -> f64 {
    TICK_BASE.powi(tick) * decimals_scale(decimals0, decimals1)
}

/// Floor tick for a decimal-adjusted price
pub fn price_to_tick(price: f64, decimals0: u8, decimals1: u8) -> Result<i32> {
    if !price.is_finite() || price <= 0.0 {
        return Err(SimulationError::Math(format!("price {} is not positive", price)));
    }
    let raw = price / decimals_scale(decimals0, decimals1);
    let tick = (raw.ln() / TICK_BASE.ln()).floor();
    if tick < MIN_TICK as f64 || tick > MAX_TICK as f64 {
        return Err(SimulationError::Math(format!("price {} maps outside the tick range", price)));
    }
    Ok(tick as i32)
}

/// Decimal-adjusted price from a Q64.96 sqrt price
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> f64 {
    let sqrt = u256_to_f64(sqrt_price_x96) / 2_f64.powi(96);
    sqrt * sqrt * decimals_scale(decimals0, decimals1)
}

/// Q64.96 sqrt price for a decimal-adjusted price (f64 precision)
pub fn price_to_sqrt_price_x96(price: f64, decimals0: u8, decimals1: u8) -> Result<U256> {
    if !price.is_finite() || price <= 0.0 {
        return Err(SimulationError::Math(format!("price {} is not positive", price)));
    }
    let raw = price / decimals_scale(decimals0, decimals1);
    let value = raw.sqrt() * 2_f64.powi(96);

    let two_64 = 2_f64.powi(64);
    let high = (value / two_64).floor();
    let low = value - high * two_64;
    if high >= 2_f64.powi(96) {
        return Err(SimulationError::Math(format!("price {} too large for Q64.96", price)));
    }
    Ok((U256::from(high as u128) << 64) + U256::from(low as u128))
}

pub(crate) fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * 2_f64.powi(64) + limb as f64)
}
