//! Access-list slot resolver
//!
//! Runs a read-only ERC-20 probe through eth_createAccessList and returns every
//! (address, storageKeys) pair the call touched.

use alloy_eips::eip2930::AccessListItem;
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use tracing::debug;

use crate::error::Result;
use crate::simulator::provider::{BlockTag, SimulationBackend};

sol! {
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }
}

/// The read function whose storage footprint is probed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Erc20Probe {
    BalanceOf { owner: Address },
    Allowance { owner: Address, spender: Address },
}

impl Erc20Probe {
    pub fn calldata(&self) -> Bytes {
        match *self {
            Erc20Probe::BalanceOf { owner } => IERC20::balanceOfCall { owner }.abi_encode().into(),
            Erc20Probe::Allowance { owner, spender } => {
                IERC20::allowanceCall { owner, spender }.abi_encode().into()
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Erc20Probe::BalanceOf { .. } => "balanceOf",
            Erc20Probe::Allowance { .. } => "allowance",
        }
    }
}

pub struct AccessListSlotResolver<'a, B> {
    backend: &'a B,
}

impl<'a, B: SimulationBackend> AccessListSlotResolver<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Raw access list of `probe` executed against `token` from `from`
    pub async fn resolve(
        &self,
        token: Address,
        probe: Erc20Probe,
        from: Address,
        block: BlockTag,
    ) -> Result<Vec<AccessListItem>> {
        let tx = TransactionRequest::default()
            .from(from)
            .to(token)
            .input(probe.calldata().into());

        let entries = self.backend.create_access_list(&tx, block).await?;

        debug!(
            token = %token,
            probe = probe.name(),
            entries = entries.len(),
            "Probe access list"
        );
        Ok(entries)
    }
}
