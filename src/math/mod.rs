//! Q64.96 fixed-point AMM math
//!
//! Pure functions only: no provider access, everything is unit-testable.

pub mod full_math;
pub mod liquidity;
pub mod rebalance;
pub mod tick_math;

pub use full_math::{mul_div, mul_div_rounding_up, Q96};
pub use liquidity::{amounts_for_liquidity, liquidity_for_amounts};
pub use rebalance::{
    predict_rebalanced_amounts, predict_rebalanced_position, token0_value_ratio, token1_equity,
    RebalancePrediction,
};
pub use tick_math::{
    nearest_usable_tick, price_to_sqrt_price_x96, price_to_tick, sqrt_price_x96_to_price,
    sqrt_ratio_at_tick, tick_at_sqrt_ratio, tick_spacing_for_fee, tick_to_price,
    validate_tick_range, MAX_TICK, MIN_TICK,
};
