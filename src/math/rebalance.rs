//! Equity-preserving rebalance prediction
//!
//! The pool price is held fixed. A position's holdings are valued in token1
//! (`price * amount0 + amount1`) and that equity is split across the new range
//! in the proportion a freshly minted position would hold it.

use alloy_primitives::U256;
use serde::Serialize;

use super::full_math::{mul_div, Q96};
use super::liquidity::{amounts_for_liquidity, liquidity_for_amounts};
use super::tick_math::{sqrt_ratio_at_tick, u256_to_f64};
use crate::error::{Result, SimulationError};
use crate::position::Position;

/// `amount0` valued in token1, floored. Scales by sqrtP twice so prices
/// below 2^-96 (sqrtP < 2^48) keep their precision.
fn token0_in_token1(sqrt_price_x96: U256, amount0: U256) -> Result<U256> {
    mul_div(mul_div(amount0, sqrt_price_x96, Q96)?, sqrt_price_x96, Q96)
}

/// Largest token0 amount worth at most `value` token1
fn token1_in_token0(sqrt_price_x96: U256, value: U256) -> Result<U256> {
    mul_div(mul_div(value, Q96, sqrt_price_x96)?, Q96, sqrt_price_x96)
}

/// Value of (amount0, amount1) denominated in token1
pub fn token1_equity(sqrt_price_x96: U256, amount0: U256, amount1: U256) -> Result<U256> {
    token0_in_token1(sqrt_price_x96, amount0)?
        .checked_add(amount1)
        .ok_or_else(|| SimulationError::Math("equity overflows uint256".into()))
}

/// Relative token1-denominated value of the token0 and token1 legs of a unit
/// of liquidity in [sqrt_a, sqrt_b]. Only the ratio between the two is meaningful.
pub fn value_weights(sqrt_price_x96: U256, sqrt_a: U256, sqrt_b: U256) -> Result<(U256, U256)> {
    let (lower, upper) = if sqrt_a > sqrt_b { (sqrt_b, sqrt_a) } else { (sqrt_a, sqrt_b) };

    if sqrt_price_x96 <= lower {
        Ok((U256::from(1u64), U256::ZERO))
    } else if sqrt_price_x96 >= upper {
        Ok((U256::ZERO, U256::from(1u64)))
    } else {
        let token0_leg = mul_div(sqrt_price_x96, upper - sqrt_price_x96, upper)?;
        Ok((token0_leg, sqrt_price_x96 - lower))
    }
}

/// Share of a position's value held in token0, in [0, 1]
pub fn token0_value_ratio(sqrt_price_x96: U256, sqrt_a: U256, sqrt_b: U256) -> Result<f64> {
    let (v0, v1) = value_weights(sqrt_price_x96, sqrt_a, sqrt_b)?;
    let v0 = u256_to_f64(v0);
    let v1 = u256_to_f64(v1);
    Ok(v0 / (v0 + v1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebalancePrediction {
    pub amount0: U256,
    pub amount1: U256,
    /// Liquidity the predicted amounts mint into the new range
    pub liquidity: u128,
    pub equity_in_token1: U256,
}

/// Redistribute the token1 equity of (amount0, amount1) into [new_lower, new_upper]
pub fn predict_rebalanced_amounts(
    sqrt_price_x96: U256,
    amount0: U256,
    amount1: U256,
    new_tick_lower: i32,
    new_tick_upper: i32,
) -> Result<RebalancePrediction> {
    let sqrt_a = sqrt_ratio_at_tick(new_tick_lower)?;
    let sqrt_b = sqrt_ratio_at_tick(new_tick_upper)?;
    let equity = token1_equity(sqrt_price_x96, amount0, amount1)?;

    let (v0, v1) = value_weights(sqrt_price_x96, sqrt_a, sqrt_b)?;
    let target1 = mul_div(equity, v1, v0 + v1)?;

    let new_amount0 = token1_in_token0(sqrt_price_x96, equity - target1)?;
    // Derive token1 from the remainder so equity is conserved exactly
    let new_amount1 = equity - token0_in_token1(sqrt_price_x96, new_amount0)?;

    let liquidity = liquidity_for_amounts(sqrt_price_x96, sqrt_a, sqrt_b, new_amount0, new_amount1)?;

    Ok(RebalancePrediction {
        amount0: new_amount0,
        amount1: new_amount1,
        liquidity,
        equity_in_token1: equity,
    })
}

/// Predict the holdings of `position` after moving it to a new range.
/// Uncollected fees are included since a rebalance collects them.
pub fn predict_rebalanced_position(
    position: &Position,
    sqrt_price_x96: U256,
    new_tick_lower: i32,
    new_tick_upper: i32,
) -> Result<RebalancePrediction> {
    let (amount0, amount1) = amounts_for_liquidity(
        sqrt_price_x96,
        sqrt_ratio_at_tick(position.tick_lower)?,
        sqrt_ratio_at_tick(position.tick_upper)?,
        position.liquidity,
    )?;

    predict_rebalanced_amounts(
        sqrt_price_x96,
        amount0 + U256::from(position.tokens_owed0),
        amount1 + U256::from(position.tokens_owed1),
        new_tick_lower,
        new_tick_upper,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tick_math::price_to_sqrt_price_x96;
    use alloy_primitives::Address;

    const E18: u128 = 1_000_000_000_000_000_000;

    fn within_one(a: U256, b: U256) -> bool {
        let d = if a > b { a - b } else { b - a };
        d <= U256::from(1u64)
    }

    #[test]
    fn test_rebalance_conserves_equity_out_of_range() {
        let sqrt_price = price_to_sqrt_price_x96(1.5, 18, 18).unwrap();
        let before = token1_equity(sqrt_price, U256::from(1000u64), U256::from(500u64)).unwrap();
        assert!(within_one(before, U256::from(2000u64)));

        let prediction =
            predict_rebalanced_amounts(sqrt_price, U256::from(1000u64), U256::from(500u64), 150, 250).unwrap();

        // Price 1.5 sits far above [150, 250], so the new range is all token1
        assert_eq!(prediction.amount0, U256::ZERO);
        assert_eq!(prediction.equity_in_token1, before);
        let after = token1_equity(sqrt_price, prediction.amount0, prediction.amount1).unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn test_rebalance_into_symmetric_range_splits_evenly() {
        let prediction = predict_rebalanced_amounts(
            Q96,
            U256::from(1000 * E18),
            U256::from(500 * E18),
            -600,
            600,
        )
        .unwrap();

        assert!(within_one(prediction.amount0, U256::from(750 * E18)));
        assert!(within_one(prediction.amount1, U256::from(750 * E18)));
        assert_eq!(prediction.equity_in_token1, U256::from(1500 * E18));
        assert_eq!(
            token1_equity(Q96, prediction.amount0, prediction.amount1).unwrap(),
            prediction.equity_in_token1
        );
        assert!(prediction.liquidity > 0);
    }

    #[test]
    fn test_rebalance_in_range_off_center() {
        let sqrt_price = sqrt_ratio_at_tick(300).unwrap();
        let prediction = predict_rebalanced_amounts(
            sqrt_price,
            U256::from(1000 * E18),
            U256::from(500 * E18),
            -600,
            600,
        )
        .unwrap();

        let after = token1_equity(sqrt_price, prediction.amount0, prediction.amount1).unwrap();
        assert_eq!(after, prediction.equity_in_token1);

        // Minting the predicted amounts consumes both sides almost entirely
        let (used0, used1) = amounts_for_liquidity(
            sqrt_price,
            sqrt_ratio_at_tick(-600).unwrap(),
            sqrt_ratio_at_tick(600).unwrap(),
            prediction.liquidity,
        )
        .unwrap();
        let dust = U256::from(E18 / 1_000_000);
        assert!(prediction.amount0 - used0 < dust);
        assert!(prediction.amount1 - used1 < dust);
    }

    #[test]
    fn test_rebalance_at_extreme_low_price_conserves_equity() {
        // sqrtP < 2^48 here, so price * 2^96 floors to zero
        let sqrt_price = sqrt_ratio_at_tick(-700_000).unwrap();
        assert!(sqrt_price < U256::from(1u64) << 48);

        let amount0 = U256::from(10u64).pow(U256::from(32u64));
        let amount1 = U256::from(5u64);
        let equity = token1_equity(sqrt_price, amount0, amount1).unwrap();
        // 1e32 token0 at ~4e-31 is worth ~40 token1
        assert!(equity > U256::from(30u64) && equity < U256::from(50u64));

        for (lower, upper) in [(-700_200, -699_800), (-690_000, -680_000), (-720_000, -710_000)] {
            let prediction = predict_rebalanced_amounts(sqrt_price, amount0, amount1, lower, upper).unwrap();
            assert_eq!(prediction.equity_in_token1, equity);
            assert_eq!(
                token1_equity(sqrt_price, prediction.amount0, prediction.amount1).unwrap(),
                equity
            );
        }

        // A range above the price holds only token0
        let above = predict_rebalanced_amounts(sqrt_price, amount0, amount1, -690_000, -680_000).unwrap();
        assert!(above.amount0 > amount0);
    }

    #[test]
    fn test_value_ratio_edges() {
        let lower = sqrt_ratio_at_tick(-600).unwrap();
        let upper = sqrt_ratio_at_tick(600).unwrap();
        assert_eq!(token0_value_ratio(sqrt_ratio_at_tick(-1200).unwrap(), lower, upper).unwrap(), 1.0);
        assert_eq!(token0_value_ratio(sqrt_ratio_at_tick(1200).unwrap(), lower, upper).unwrap(), 0.0);
        let mid = token0_value_ratio(Q96, lower, upper).unwrap();
        assert!((mid - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_predict_rebalanced_position_includes_owed_fees() {
        let position = Position {
            token_id: U256::from(7u64),
            owner: Address::repeat_byte(0x11),
            token0: Address::repeat_byte(0x01),
            token1: Address::repeat_byte(0x02),
            fee: 3000,
            tick_spacing: 60,
            tick_lower: -600,
            tick_upper: 600,
            liquidity: 10 * E18,
            tokens_owed0: 0,
            tokens_owed1: 0,
        };
        let without_fees = predict_rebalanced_position(&position, Q96, -1200, 1200).unwrap();

        let with_fees = Position { tokens_owed0: 1000, tokens_owed1: 2000, ..position };
        let prediction = predict_rebalanced_position(&with_fees, Q96, -1200, 1200).unwrap();
        assert_eq!(
            prediction.equity_in_token1,
            without_fees.equity_in_token1 + U256::from(3000u64)
        );
    }
}
