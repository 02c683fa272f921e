//! Automation actions and their ABI shapes
//!
//! Each action kind maps to exactly one automation-contract overload. The
//! permit variant is picked when the action carries a signed permit, otherwise
//! the caller must be an approved NPM operator (forged by the override builder).

use alloy_primitives::aliases::U24;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use serde::Serialize;

use crate::abi::IAutoman;
use crate::error::{Result, SimulationError};
use crate::math::{tick_spacing_for_fee, validate_tick_range};
use crate::position::Position;
use crate::swap::planner::to_i24;

/// EIP-2612-style signed NPM permit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    pub deadline: U256,
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// New position minted from the caller's tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintRequest {
    pub token0: Address,
    pub token1: Address,
    /// Fee tier in hundredths of a bip
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: U256,
    pub amount1_desired: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationAction {
    MintOptimal(MintRequest),
    DecreaseLiquidity {
        token_id: U256,
        liquidity: u128,
        permit: Option<Permit>,
    },
    /// Decrease and swap everything into one token
    DecreaseLiquiditySingle {
        token_id: U256,
        liquidity: u128,
        /// true: token0 is sold, proceeds are token1
        zero_for_one: bool,
        permit: Option<Permit>,
    },
    /// Collect fees and add them back as liquidity
    Reinvest { token_id: U256, permit: Option<Permit> },
    Rebalance {
        token_id: U256,
        tick_lower: i32,
        tick_upper: i32,
        permit: Option<Permit>,
    },
    RemoveLiquidity { token_id: U256, permit: Option<Permit> },
}

/// Per-call arguments resolved by the orchestrator
#[derive(Debug, Clone)]
pub struct CallArgs<'a> {
    /// Loaded position, required by every position-based action
    pub position: Option<&'a Position>,
    pub recipient: Address,
    pub deadline: U256,
    pub fee_bips: U256,
    pub swap_data: Bytes,
}

/// Decoded return value of a simulated action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SimulatedResult {
    pub amount0: U256,
    pub amount1: U256,
    pub liquidity: Option<u128>,
    pub token_id: Option<U256>,
}

impl AutomationAction {
    pub fn name(&self) -> &'static str {
        match self {
            AutomationAction::MintOptimal(_) => "mintOptimal",
            AutomationAction::DecreaseLiquidity { .. } => "decreaseLiquidity",
            AutomationAction::DecreaseLiquiditySingle { .. } => "decreaseLiquiditySingle",
            AutomationAction::Reinvest { .. } => "reinvest",
            AutomationAction::Rebalance { .. } => "rebalance",
            AutomationAction::RemoveLiquidity { .. } => "removeLiquidity",
        }
    }

    pub fn token_id(&self) -> Option<U256> {
        match *self {
            AutomationAction::MintOptimal(_) => None,
            AutomationAction::DecreaseLiquidity { token_id, .. }
            | AutomationAction::DecreaseLiquiditySingle { token_id, .. }
            | AutomationAction::Reinvest { token_id, .. }
            | AutomationAction::Rebalance { token_id, .. }
            | AutomationAction::RemoveLiquidity { token_id, .. } => Some(token_id),
        }
    }

    pub fn permit(&self) -> Option<&Permit> {
        match self {
            AutomationAction::MintOptimal(_) => None,
            AutomationAction::DecreaseLiquidity { permit, .. }
            | AutomationAction::DecreaseLiquiditySingle { permit, .. }
            | AutomationAction::Reinvest { permit, .. }
            | AutomationAction::Rebalance { permit, .. }
            | AutomationAction::RemoveLiquidity { permit, .. } => permit.as_ref(),
        }
    }

    /// Actions that add liquidity get a swap plan to balance their amounts
    pub fn needs_swap_plan(&self) -> bool {
        matches!(
            self,
            AutomationAction::MintOptimal(_)
                | AutomationAction::Reinvest { .. }
                | AutomationAction::Rebalance { .. }
        )
    }

    /// Position-based actions without a permit need the caller to be an NPM operator
    pub fn requires_npm_approval(&self) -> bool {
        self.token_id().is_some() && self.permit().is_none()
    }

    /// Structural checks that need no chain state
    pub fn validate(&self) -> Result<()> {
        match *self {
            AutomationAction::MintOptimal(mint) => {
                let spacing = tick_spacing_for_fee(mint.fee)
                    .ok_or_else(|| SimulationError::Config(format!("unknown fee tier {}", mint.fee)))?;
                validate_tick_range(mint.tick_lower, mint.tick_upper, spacing)
            }
            // Alignment needs the position's tick spacing; ordering and bounds do not
            AutomationAction::Rebalance { tick_lower, tick_upper, .. } => {
                validate_tick_range(tick_lower, tick_upper, 1)
            }
            _ => Ok(()),
        }
    }

    /// Checks against the loaded position
    pub fn validate_for(&self, position: &Position) -> Result<()> {
        match *self {
            AutomationAction::Rebalance { tick_lower, tick_upper, .. } => {
                validate_tick_range(tick_lower, tick_upper, position.tick_spacing)
            }
            AutomationAction::DecreaseLiquidity { liquidity, .. }
            | AutomationAction::DecreaseLiquiditySingle { liquidity, .. }
                if liquidity == 0 || liquidity > position.liquidity =>
            {
                Err(SimulationError::Config(format!(
                    "cannot decrease {} of {} liquidity",
                    liquidity, position.liquidity
                )))
            }
            _ => Ok(()),
        }
    }

    /// ABI-encoded automation-contract call
    pub fn calldata(&self, args: &CallArgs<'_>) -> Result<Bytes> {
        let encoded = match *self {
            AutomationAction::MintOptimal(mint) => IAutoman::mintOptimalCall {
                params: mint_params(
                    mint.token0,
                    mint.token1,
                    mint.fee,
                    mint.tick_lower,
                    mint.tick_upper,
                    (mint.amount0_desired, mint.amount1_desired),
                    args,
                )?,
                swapData: args.swap_data.clone(),
            }
            .abi_encode(),

            AutomationAction::DecreaseLiquidity { token_id, liquidity, permit } => {
                let params = decrease_params(token_id, liquidity, args.deadline);
                match permit {
                    None => IAutoman::decreaseLiquidity_0Call { params, feeBips: args.fee_bips }.abi_encode(),
                    Some(p) => IAutoman::decreaseLiquidity_1Call {
                        params,
                        feeBips: args.fee_bips,
                        permitDeadline: p.deadline,
                        v: p.v,
                        r: p.r,
                        s: p.s,
                    }
                    .abi_encode(),
                }
            }

            AutomationAction::DecreaseLiquiditySingle { token_id, liquidity, zero_for_one, permit } => {
                let params = decrease_params(token_id, liquidity, args.deadline);
                match permit {
                    None => IAutoman::decreaseLiquiditySingle_0Call {
                        params,
                        zeroForOne: zero_for_one,
                        feeBips: args.fee_bips,
                        swapData: args.swap_data.clone(),
                    }
                    .abi_encode(),
                    Some(p) => IAutoman::decreaseLiquiditySingle_1Call {
                        params,
                        zeroForOne: zero_for_one,
                        feeBips: args.fee_bips,
                        swapData: args.swap_data.clone(),
                        permitDeadline: p.deadline,
                        v: p.v,
                        r: p.r,
                        s: p.s,
                    }
                    .abi_encode(),
                }
            }

            AutomationAction::Reinvest { token_id, permit } => {
                let params = IAutoman::IncreaseLiquidityParams {
                    tokenId: token_id,
                    amount0Desired: U256::ZERO,
                    amount1Desired: U256::ZERO,
                    amount0Min: U256::ZERO,
                    amount1Min: U256::ZERO,
                    deadline: args.deadline,
                };
                match permit {
                    None => IAutoman::reinvest_0Call {
                        params,
                        feeBips: args.fee_bips,
                        swapData: args.swap_data.clone(),
                    }
                    .abi_encode(),
                    Some(p) => IAutoman::reinvest_1Call {
                        params,
                        feeBips: args.fee_bips,
                        swapData: args.swap_data.clone(),
                        permitDeadline: p.deadline,
                        v: p.v,
                        r: p.r,
                        s: p.s,
                    }
                    .abi_encode(),
                }
            }

            AutomationAction::Rebalance { token_id, tick_lower, tick_upper, permit } => {
                let position = args.position.ok_or_else(|| {
                    SimulationError::Config("rebalance needs the loaded position".into())
                })?;
                // Desired amounts come from the removed liquidity inside the contract
                let params = mint_params(
                    position.token0,
                    position.token1,
                    position.fee,
                    tick_lower,
                    tick_upper,
                    (U256::ZERO, U256::ZERO),
                    args,
                )?;
                match permit {
                    None => IAutoman::rebalance_0Call {
                        params,
                        tokenId: token_id,
                        feeBips: args.fee_bips,
                        swapData: args.swap_data.clone(),
                    }
                    .abi_encode(),
                    Some(p) => IAutoman::rebalance_1Call {
                        params,
                        tokenId: token_id,
                        feeBips: args.fee_bips,
                        swapData: args.swap_data.clone(),
                        permitDeadline: p.deadline,
                        v: p.v,
                        r: p.r,
                        s: p.s,
                    }
                    .abi_encode(),
                }
            }

            AutomationAction::RemoveLiquidity { token_id, permit } => {
                let position = args.position.ok_or_else(|| {
                    SimulationError::Config("removeLiquidity needs the loaded position".into())
                })?;
                let params = decrease_params(token_id, position.liquidity, args.deadline);
                match permit {
                    None => IAutoman::removeLiquidity_0Call { params, feeBips: args.fee_bips }.abi_encode(),
                    Some(p) => IAutoman::removeLiquidity_1Call {
                        params,
                        feeBips: args.fee_bips,
                        permitDeadline: p.deadline,
                        v: p.v,
                        r: p.r,
                        s: p.s,
                    }
                    .abi_encode(),
                }
            }
        };
        Ok(encoded.into())
    }

    /// Decode raw return data with the shape of this action's overload
    pub fn decode_result(&self, data: &[u8]) -> Result<SimulatedResult> {
        let what = self.name();
        let decode_err = |e: alloy_sol_types::Error| SimulationError::decode(what, e);

        let result = match *self {
            AutomationAction::MintOptimal(_) => {
                let ret = IAutoman::mintOptimalCall::abi_decode_returns(data).map_err(decode_err)?;
                SimulatedResult {
                    amount0: ret.amount0,
                    amount1: ret.amount1,
                    liquidity: Some(ret.liquidity),
                    token_id: Some(ret.tokenId),
                }
            }
            // Both overloads share a return shape
            AutomationAction::DecreaseLiquidity { .. } => {
                let ret = IAutoman::decreaseLiquidity_0Call::abi_decode_returns(data).map_err(decode_err)?;
                SimulatedResult { amount0: ret.amount0, amount1: ret.amount1, ..Default::default() }
            }
            AutomationAction::DecreaseLiquiditySingle { zero_for_one, .. } => {
                let amount =
                    IAutoman::decreaseLiquiditySingle_0Call::abi_decode_returns(data).map_err(decode_err)?;
                if zero_for_one {
                    SimulatedResult { amount1: amount, ..Default::default() }
                } else {
                    SimulatedResult { amount0: amount, ..Default::default() }
                }
            }
            AutomationAction::Reinvest { .. } => {
                let ret = IAutoman::reinvest_0Call::abi_decode_returns(data).map_err(decode_err)?;
                SimulatedResult {
                    amount0: ret.amount0,
                    amount1: ret.amount1,
                    liquidity: Some(ret.liquidity),
                    token_id: None,
                }
            }
            AutomationAction::Rebalance { .. } => {
                let ret = IAutoman::rebalance_0Call::abi_decode_returns(data).map_err(decode_err)?;
                SimulatedResult {
                    amount0: ret.amount0,
                    amount1: ret.amount1,
                    liquidity: Some(ret.liquidity),
                    token_id: Some(ret.newTokenId),
                }
            }
            AutomationAction::RemoveLiquidity { .. } => {
                let ret = IAutoman::removeLiquidity_0Call::abi_decode_returns(data).map_err(decode_err)?;
                SimulatedResult { amount0: ret.amount0, amount1: ret.amount1, ..Default::default() }
            }
        };
        Ok(result)
    }
}

fn mint_params(
    token0: Address,
    token1: Address,
    fee: u32,
    tick_lower: i32,
    tick_upper: i32,
    (amount0_desired, amount1_desired): (U256, U256),
    args: &CallArgs<'_>,
) -> Result<IAutoman::MintParams> {
    Ok(IAutoman::MintParams {
        token0,
        token1,
        fee: U24::saturating_from(fee),
        tickLower: to_i24(tick_lower)?,
        tickUpper: to_i24(tick_upper)?,
        amount0Desired: amount0_desired,
        amount1Desired: amount1_desired,
        amount0Min: U256::ZERO,
        amount1Min: U256::ZERO,
        recipient: args.recipient,
        deadline: args.deadline,
    })
}

fn decrease_params(token_id: U256, liquidity: u128, deadline: U256) -> IAutoman::DecreaseLiquidityParams {
    IAutoman::DecreaseLiquidityParams {
        tokenId: token_id,
        liquidity,
        amount0Min: U256::ZERO,
        amount1Min: U256::ZERO,
        deadline,
    }
}
