//! 512-bit intermediate multiply/divide (Uniswap FullMath semantics)

use alloy_primitives::{U256, U512};

use crate::error::{Result, SimulationError};

/// 2^96, the Q64.96 unit
pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);

fn narrow(value: U512) -> Result<U256> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|&limb| limb != 0) {
        return Err(SimulationError::Math("mul_div result overflows 256 bits".into()));
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// floor(a * b / denominator) without intermediate overflow
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(SimulationError::Math("mul_div by zero".into()));
    }
    let product = U512::from(a) * U512::from(b);
    narrow(product / U512::from(denominator))
}

/// ceil(a * b / denominator)
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(SimulationError::Math("mul_div by zero".into()));
    }
    let product = U512::from(a) * U512::from(b);
    let denominator = U512::from(denominator);
    let mut result = product / denominator;
    if !(product % denominator).is_zero() {
        result += U512::from(1u64);
    }
    narrow(result)
}
