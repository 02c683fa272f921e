//! Optimal Swap Planner
//!
//! Tier 1 asks the automation contract for the in-pool optimal swap that
//! balances the desired amounts for the target range. Tier 2 routes that
//! swap through an aggregator and wraps the router call in the envelope the
//! on-chain swap proxy expects:
//!
//! `proxy (20 bytes) ++ abi.encode(router, approveTarget, tokenIn, tokenOut, amountIn, calldata)`
//!
//! Tier 1 failures fail the preview. Tier 2 failures fall back to no swap data.

use alloy_primitives::aliases::I24;
use alloy_primitives::{Address, Bytes, U256};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{SolCall, SolValue};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::aggregator::{QuoteRequest, SwapQuoter};
use crate::abi::IAutoman;
use crate::error::{Result, SimulationError};
use crate::simulator::provider::{BlockTag, SimulationBackend};

// ============================================
// TYPES
// ============================================

/// Pool-only optimum reported by the automation contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimalSwap {
    pub amount_in: U256,
    pub amount_out: U256,
    pub zero_for_one: bool,
    pub sqrt_price_x96: U256,
}

/// Router call routed through the swap proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPlan {
    pub router: Address,
    pub approve_target: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub calldata: Bytes,
}

type EnvelopeFields = (Address, Address, Address, Address, U256, Bytes);

impl SwapPlan {
    /// Swap data in the form the automation contract forwards to the proxy
    pub fn envelope(&self, proxy: Address) -> Bytes {
        let fields: EnvelopeFields = (
            self.router,
            self.approve_target,
            self.token_in,
            self.token_out,
            self.amount_in,
            self.calldata.clone(),
        );
        let mut out = proxy.to_vec();
        out.extend_from_slice(&fields.abi_encode_params());
        out.into()
    }

    /// Inverse of `envelope`, returning the proxy address and the plan
    pub fn decode_envelope(data: &[u8]) -> Result<(Address, SwapPlan)> {
        if data.len() < 20 {
            return Err(SimulationError::decode("swap envelope", "shorter than a proxy address"));
        }
        let proxy = Address::from_slice(&data[..20]);
        let (router, approve_target, token_in, token_out, amount_in, calldata) =
            EnvelopeFields::abi_decode_params(&data[20..])
                .map_err(|e| SimulationError::decode("swap envelope", e))?;

        Ok((proxy, SwapPlan { router, approve_target, token_in, token_out, amount_in, calldata }))
    }
}

/// What the planner needs to know about the liquidity being added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: U256,
    pub amount1_desired: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSwap {
    pub optimum: OptimalSwap,
    /// Aggregator route, None when swapping in-pool
    pub plan: Option<SwapPlan>,
    /// `swapData` argument for the automation call, empty for no aggregator swap
    pub swap_data: Bytes,
}

impl PlannedSwap {
    fn in_pool(optimum: OptimalSwap) -> Self {
        Self { optimum, plan: None, swap_data: Bytes::new() }
    }
}

#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub chain_id: u64,
    pub automation: Address,
    /// None disables aggregator routing
    pub swap_proxy: Option<Address>,
    pub allowed_routers: HashSet<Address>,
    pub slippage_bips: u32,
    pub block: BlockTag,
}

// ============================================
// PLANNER
// ============================================

pub struct OptimalSwapPlanner<'a, B, Q> {
    backend: &'a B,
    quoter: &'a Q,
    settings: &'a PlannerSettings,
}

impl<'a, B: SimulationBackend, Q: SwapQuoter> OptimalSwapPlanner<'a, B, Q> {
    pub fn new(backend: &'a B, quoter: &'a Q, settings: &'a PlannerSettings) -> Self {
        Self { backend, quoter, settings }
    }

    /// Tier 1: in-pool optimum from the automation contract
    pub async fn pool_optimum(&self, request: &SwapRequest) -> Result<OptimalSwap> {
        let call = IAutoman::getOptimalSwapCall {
            pool: request.pool,
            tickLower: to_i24(request.tick_lower)?,
            tickUpper: to_i24(request.tick_upper)?,
            amount0Desired: request.amount0_desired,
            amount1Desired: request.amount1_desired,
        };
        let tx = TransactionRequest::default()
            .to(self.settings.automation)
            .input(Bytes::from(call.abi_encode()).into());

        let out = self.backend.call(&tx, self.settings.block, None).await?;
        let ret = IAutoman::getOptimalSwapCall::abi_decode_returns(&out)
            .map_err(|e| SimulationError::decode("getOptimalSwap", e))?;

        let optimum = OptimalSwap {
            amount_in: ret.amountIn,
            amount_out: ret.amountOut,
            zero_for_one: ret.zeroForOne,
            sqrt_price_x96: U256::from(ret.sqrtPriceX96),
        };
        debug!(
            amount_in = %optimum.amount_in,
            amount_out = %optimum.amount_out,
            zero_for_one = optimum.zero_for_one,
            "Pool-only optimal swap"
        );
        Ok(optimum)
    }

    /// Tier 2: aggregator route for the tier-1 direction and amount
    pub async fn aggregator_plan(&self, request: &SwapRequest, optimum: &OptimalSwap) -> Result<SwapPlan> {
        let (token_in, token_out) = if optimum.zero_for_one {
            (request.token0, request.token1)
        } else {
            (request.token1, request.token0)
        };

        let quote = self
            .quoter
            .quote(&QuoteRequest {
                chain_id: self.settings.chain_id,
                token_in,
                token_out,
                amount_in: optimum.amount_in,
                slippage_bips: self.settings.slippage_bips,
                from: self.settings.swap_proxy.unwrap_or(self.settings.automation),
            })
            .await?;

        if !self.settings.allowed_routers.contains(&quote.to) {
            return Err(SimulationError::SwapRouterNotApproved {
                router: quote.to,
                chain_id: self.settings.chain_id,
            });
        }

        Ok(SwapPlan {
            router: quote.to,
            approve_target: quote.approve_target.unwrap_or(quote.to),
            token_in,
            token_out,
            amount_in: optimum.amount_in,
            calldata: quote.data,
        })
    }

    /// Full two-tier plan
    pub async fn plan(&self, request: &SwapRequest) -> Result<PlannedSwap> {
        let optimum = self.pool_optimum(request).await?;

        if optimum.amount_in.is_zero() {
            debug!("Amounts already balanced, no swap needed");
            return Ok(PlannedSwap::in_pool(optimum));
        }
        let Some(proxy) = self.settings.swap_proxy else {
            debug!("No swap proxy configured, swapping in pool");
            return Ok(PlannedSwap::in_pool(optimum));
        };

        match self.aggregator_plan(request, &optimum).await {
            Ok(plan) => {
                info!(router = %plan.router, amount_in = %plan.amount_in, "Aggregator route selected");
                let swap_data = plan.envelope(proxy);
                Ok(PlannedSwap { optimum, plan: Some(plan), swap_data })
            }
            Err(e) if e.is_recoverable_swap_error() => {
                warn!(error = %e, "Aggregator route discarded, falling back to in-pool swap");
                Ok(PlannedSwap::in_pool(optimum))
            }
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn to_i24(tick: i32) -> Result<I24> {
    I24::try_from(tick).map_err(|_| SimulationError::Math(format!("tick {} does not fit int24", tick)))
}
