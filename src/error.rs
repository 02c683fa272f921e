//! Simulation Error Taxonomy
//!
//! Every pipeline stage returns `Result<T, SimulationError>` so callers can
//! match on the failure kind. The binary wraps these in `eyre` reports.

use alloy_primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    /// Provider/chain cannot generate access lists. Fatal, never degraded.
    #[error("eth_createAccessList is unavailable on this provider: {0}")]
    AccessListUnavailable(String),

    /// A probe did not touch the token contract exactly once.
    #[error("expected exactly one access list entry for token {token}, found {found}")]
    InvalidAccessListLength { token: Address, found: usize },

    /// Slot diff did not isolate exactly the balance and allowance slots.
    #[error("expected 2 mapping slots for token {token}, found {found}")]
    InvalidStorageKeyCount { token: Address, found: usize },

    #[error("invalid tick range [{lower}, {upper}] for tick spacing {spacing}")]
    TickRangeInvalid { lower: i32, upper: i32, spacing: i32 },

    #[error("swap router {router} is not approved on chain {chain_id}")]
    SwapRouterNotApproved { router: Address, chain_id: u64 },

    /// The simulated action reverted. The reason is upstream text.
    #[error("simulated call reverted: {0}")]
    CallReverted(String),

    #[error("conflicting state override for {address} ({field})")]
    ConflictingOverride { address: Address, field: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error("aggregator error: {0}")]
    Aggregator(String),

    #[error("fixed-point math error: {0}")]
    Math(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SimulationError {
    pub fn decode(what: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Decode { what, reason: reason.to_string() }
    }

    /// Aggregator-side failures degrade to an in-pool swap instead of failing the preview.
    pub fn is_recoverable_swap_error(&self) -> bool {
        matches!(
            self,
            SimulationError::Aggregator(_) | SimulationError::SwapRouterNotApproved { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
