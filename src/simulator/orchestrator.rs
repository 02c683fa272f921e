//! Rebalance Simulation Orchestrator
//!
//! Runs one preview through a fixed sequence of stages:
//!
//! `Start -> PositionLoaded -> OverridesBuilt -> SwapPlanned -> Simulated -> Decoded`
//!
//! A failure at any stage ends the run with `SimulationFailure { stage, cause }`.
//! Nothing is retried. Collaborators are passed in at construction.

use alloy_primitives::{Address, U256};
use alloy_rpc_types::state::StateOverride;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::actions::{AutomationAction, CallArgs, SimulatedResult};
use super::executor::SimulatedCallExecutor;
use super::provider::{BlockTag, SimulationBackend};
use crate::error::SimulationError;
use crate::math::{amounts_for_liquidity, predict_rebalanced_position, sqrt_ratio_at_tick, RebalancePrediction};
use crate::overrides::{merge_overrides, KnownSlots, StateOverrideBuilder, TokenFunding};
use crate::position::{PoolSnapshot, Position, PositionReader};
use crate::swap::{OptimalSwapPlanner, PlannedSwap, PlannerSettings, SwapQuoter, SwapRequest};

// ============================================
// STAGES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Start,
    PositionLoaded,
    OverridesBuilt,
    SwapPlanned,
    Simulated,
    Decoded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::PositionLoaded => "position-loaded",
            Stage::OverridesBuilt => "overrides-built",
            Stage::SwapPlanned => "swap-planned",
            Stage::Simulated => "simulated",
            Stage::Decoded => "decoded",
        };
        f.write_str(name)
    }
}

/// Terminal failure. `stage` is the stage that was being attempted.
#[derive(Error, Debug)]
#[error("preview failed at stage {stage}: {cause}")]
pub struct SimulationFailure {
    pub stage: Stage,
    #[source]
    pub cause: SimulationError,
}

fn at(stage: Stage) -> impl FnOnce(SimulationError) -> SimulationFailure {
    move |cause| SimulationFailure { stage, cause }
}

// ============================================
// REQUEST / REPORT
// ============================================

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub chain_id: u64,
    pub automation: Address,
    pub npm: Address,
    pub swap_proxy: Option<Address>,
    pub allowed_routers: HashSet<Address>,
    pub slippage_bips: u32,
    /// Automation fee charged on the action
    pub fee_bips: u64,
    pub known_slots: KnownSlots,
}

impl SimulationSettings {
    fn planner(&self, block: BlockTag) -> PlannerSettings {
        PlannerSettings {
            chain_id: self.chain_id,
            automation: self.automation,
            swap_proxy: self.swap_proxy,
            allowed_routers: self.allowed_routers.clone(),
            slippage_bips: self.slippage_bips,
            block,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub action: AutomationAction,
    /// `from` of the simulated transaction
    pub caller: Address,
    /// Caller already holds balances and approvals; no overrides are forged
    pub funded: bool,
    pub block: BlockTag,
    pub deadline: U256,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub action: &'static str,
    pub position: Option<Position>,
    pub pool: PoolSnapshot,
    pub swap: Option<PlannedSwap>,
    /// Whether the final call carried a state-override set
    pub overrides_applied: bool,
    pub result: SimulatedResult,
    /// Pure-math expectation for rebalances, next to the simulated result
    pub prediction: Option<RebalancePrediction>,
}

// ============================================
// ORCHESTRATOR
// ============================================

pub struct RebalanceSimulationOrchestrator<B, Q, R> {
    backend: B,
    quoter: Q,
    reader: R,
    settings: SimulationSettings,
}

impl<B, Q, R> RebalanceSimulationOrchestrator<B, Q, R>
where
    B: SimulationBackend,
    Q: SwapQuoter,
    R: PositionReader,
{
    pub fn new(backend: B, quoter: Q, reader: R, settings: SimulationSettings) -> Self {
        Self { backend, quoter, reader, settings }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn quoter(&self) -> &Q {
        &self.quoter
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationReport, SimulationFailure> {
        let action = &request.action;
        info!(action = action.name(), caller = %request.caller, block = %request.block, "Preview started");

        // Start: structural checks, no I/O
        action.validate().map_err(at(Stage::Start))?;

        // PositionLoaded
        let (position, pool) = self.load(request).await.map_err(at(Stage::PositionLoaded))?;
        info!(stage = %Stage::PositionLoaded, pool = %pool.address, tick = pool.tick, "Stage complete");

        // OverridesBuilt
        let mut overrides = self
            .build_overrides(request, position.as_ref())
            .await
            .map_err(at(Stage::OverridesBuilt))?;
        info!(stage = %Stage::OverridesBuilt, accounts = overrides.len(), "Stage complete");

        // SwapPlanned
        let swap = self
            .plan_swap(request, position.as_ref(), &pool)
            .await
            .map_err(at(Stage::SwapPlanned))?;
        if let Some(router) = swap.as_ref().and_then(|s| s.plan.as_ref()).map(|p| p.router) {
            let builder = StateOverrideBuilder::new(&self.backend, request.block, self.settings.known_slots);
            let whitelist = builder.build_router_whitelist_override(self.settings.automation, router);
            overrides = merge_overrides(overrides, whitelist).map_err(at(Stage::SwapPlanned))?;
        }
        info!(
            stage = %Stage::SwapPlanned,
            aggregator = swap.as_ref().is_some_and(|s| s.plan.is_some()),
            "Stage complete"
        );

        // Simulated
        let recipient = position.map(|p| p.owner).unwrap_or(request.caller);
        let calldata = action
            .calldata(&CallArgs {
                position: position.as_ref(),
                recipient,
                deadline: request.deadline,
                fee_bips: U256::from(self.settings.fee_bips),
                swap_data: swap.as_ref().map(|s| s.swap_data.clone()).unwrap_or_default(),
            })
            .map_err(at(Stage::Simulated))?;
        let tx = SimulatedCallExecutor::<B>::transaction(request.caller, self.settings.automation, calldata);
        let overrides = Some(overrides).filter(|o| !o.is_empty());
        let overrides_applied = overrides.is_some() && self.backend.supports_state_overrides();

        let output = SimulatedCallExecutor::new(&self.backend)
            .call(&tx, overrides.as_ref(), request.block)
            .await
            .map_err(at(Stage::Simulated))?;
        info!(stage = %Stage::Simulated, bytes = output.len(), "Stage complete");

        // Decoded
        let result = action.decode_result(&output).map_err(at(Stage::Decoded))?;
        let prediction = self.predict(action, position.as_ref(), &pool);
        info!(
            stage = %Stage::Decoded,
            amount0 = %result.amount0,
            amount1 = %result.amount1,
            liquidity = ?result.liquidity,
            "Preview complete"
        );

        Ok(SimulationReport {
            action: action.name(),
            position,
            pool,
            swap,
            overrides_applied,
            result,
            prediction,
        })
    }

    async fn load(&self, request: &SimulationRequest) -> Result<(Option<Position>, PoolSnapshot), SimulationError> {
        match (request.action, request.action.token_id()) {
            (AutomationAction::MintOptimal(mint), _) => {
                let pool = self.reader.pool(mint.token0, mint.token1, mint.fee, request.block).await?;
                Ok((None, pool))
            }
            (_, Some(token_id)) => {
                let position = self.reader.position(token_id, request.block).await?;
                request.action.validate_for(&position)?;
                let pool = self
                    .reader
                    .pool(position.token0, position.token1, position.fee, request.block)
                    .await?;
                Ok((Some(position), pool))
            }
            (_, None) => Err(SimulationError::Config(format!("{} needs a token id", request.action.name()))),
        }
    }

    async fn build_overrides(
        &self,
        request: &SimulationRequest,
        position: Option<&Position>,
    ) -> Result<StateOverride, SimulationError> {
        if request.funded {
            debug!("Funded caller, skipping balance and approval overrides");
            return Ok(StateOverride::default());
        }

        let builder = StateOverrideBuilder::new(&self.backend, request.block, self.settings.known_slots);
        let mut overrides = StateOverride::default();

        if let AutomationAction::MintOptimal(mint) = request.action {
            let fundings = [
                TokenFunding { token: mint.token0, amount: mint.amount0_desired },
                TokenFunding { token: mint.token1, amount: mint.amount1_desired },
            ];
            overrides = builder
                .build_erc20_overrides(&fundings, request.caller, self.settings.automation)
                .await?;
        }

        if let Some(position) = position.filter(|_| request.action.requires_npm_approval()) {
            let approval =
                builder.build_operator_approval_override(self.settings.npm, position.owner, self.settings.automation);
            overrides = merge_overrides(overrides, approval)?;
        }
        Ok(overrides)
    }

    async fn plan_swap(
        &self,
        request: &SimulationRequest,
        position: Option<&Position>,
        pool: &PoolSnapshot,
    ) -> Result<Option<PlannedSwap>, SimulationError> {
        if !request.action.needs_swap_plan() {
            return Ok(None);
        }
        let swap_request = match (request.action, position) {
            (AutomationAction::MintOptimal(mint), _) => SwapRequest {
                pool: pool.address,
                token0: mint.token0,
                token1: mint.token1,
                tick_lower: mint.tick_lower,
                tick_upper: mint.tick_upper,
                amount0_desired: mint.amount0_desired,
                amount1_desired: mint.amount1_desired,
            },
            (AutomationAction::Reinvest { .. }, Some(position)) => SwapRequest {
                pool: pool.address,
                token0: position.token0,
                token1: position.token1,
                tick_lower: position.tick_lower,
                tick_upper: position.tick_upper,
                amount0_desired: U256::from(position.tokens_owed0),
                amount1_desired: U256::from(position.tokens_owed1),
            },
            (AutomationAction::Rebalance { tick_lower, tick_upper, .. }, Some(position)) => {
                let (amount0, amount1) = amounts_for_liquidity(
                    pool.sqrt_price_x96,
                    sqrt_ratio_at_tick(position.tick_lower)?,
                    sqrt_ratio_at_tick(position.tick_upper)?,
                    position.liquidity,
                )?;
                SwapRequest {
                    pool: pool.address,
                    token0: position.token0,
                    token1: position.token1,
                    tick_lower,
                    tick_upper,
                    amount0_desired: amount0 + U256::from(position.tokens_owed0),
                    amount1_desired: amount1 + U256::from(position.tokens_owed1),
                }
            }
            _ => return Ok(None),
        };

        if swap_request.amount0_desired.is_zero() && swap_request.amount1_desired.is_zero() {
            debug!("Nothing to balance, skipping swap planning");
            return Ok(None);
        }

        let settings = self.settings.planner(request.block);
        let planner = OptimalSwapPlanner::new(&self.backend, &self.quoter, &settings);
        planner.plan(&swap_request).await.map(Some)
    }

    fn predict(
        &self,
        action: &AutomationAction,
        position: Option<&Position>,
        pool: &PoolSnapshot,
    ) -> Option<RebalancePrediction> {
        let (AutomationAction::Rebalance { tick_lower, tick_upper, .. }, Some(position)) = (action, position) else {
            return None;
        };
        match predict_rebalanced_position(position, pool.sqrt_price_x96, *tick_lower, *tick_upper) {
            Ok(prediction) => Some(prediction),
            Err(e) => {
                warn!(error = %e, "Rebalance prediction unavailable");
                None
            }
        }
    }
}
