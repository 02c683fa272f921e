//! Simulated Call Executor
//!
//! Issues the overridden eth_call when the node supports it and overrides were
//! supplied, a plain eth_call otherwise. Decoding is the caller's job.

use alloy_primitives::{Address, Bytes};
use alloy_rpc_types::state::StateOverride;
use alloy_rpc_types::TransactionRequest;
use tracing::{debug, warn};

use super::provider::{BlockTag, SimulationBackend};
use crate::error::Result;

pub struct SimulatedCallExecutor<'a, B> {
    backend: &'a B,
}

impl<'a, B: SimulationBackend> SimulatedCallExecutor<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Build the read-only transaction for `from` calling `to` with `calldata`
    pub fn transaction(from: Address, to: Address, calldata: Bytes) -> TransactionRequest {
        TransactionRequest::default().from(from).to(to).input(calldata.into())
    }

    /// Execute `tx` and return its raw return data
    pub async fn call(
        &self,
        tx: &TransactionRequest,
        overrides: Option<&StateOverride>,
        block: BlockTag,
    ) -> Result<Bytes> {
        let overrides = overrides.filter(|o| !o.is_empty());

        let overrides = match overrides {
            Some(o) if self.backend.supports_state_overrides() => Some(o),
            Some(o) => {
                warn!(
                    accounts = o.len(),
                    "Node does not support state overrides, simulating against real balances"
                );
                None
            }
            None => None,
        };

        debug!(block = %block, overridden = overrides.is_some(), "Executing simulated call");
        self.backend.call(tx, block, overrides).await
    }
}
