//! State Override Builder
//!
//! ERC-20 balance/allowance slots are discovered per token (two parallel
//! access-list probes, then a slot diff). The NPM operator-approval and the
//! automation router whitelist have fixed layouts, so their slots are computed
//! straight from the base slot index.

use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types::state::{AccountOverride, StateOverride};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::access_list::{AccessListSlotResolver, Erc20Probe};
use super::mapping_slot::{bool_word, mapping_slot, nested_mapping_slot, uint_word};
use super::slot_diff::diff_storage_slots;
use crate::error::{Result, SimulationError};
use crate::simulator::provider::{BlockTag, SimulationBackend};

/// Base slots of the fixed-layout mappings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownSlots {
    /// NonfungiblePositionManager `_operatorApprovals` (owner => operator => bool)
    pub npm_operator_approvals: u64,
    /// Automation contract `isWhiteListedSwapRouter` (router => bool)
    pub router_whitelist: u64,
}

impl Default for KnownSlots {
    fn default() -> Self {
        Self { npm_operator_approvals: 5, router_whitelist: 3 }
    }
}

/// Token and amount to forge for the simulating account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFunding {
    pub token: Address,
    pub amount: U256,
}

pub struct StateOverrideBuilder<'a, B> {
    resolver: AccessListSlotResolver<'a, B>,
    block: BlockTag,
    known_slots: KnownSlots,
}

impl<'a, B: SimulationBackend> StateOverrideBuilder<'a, B> {
    pub fn new(backend: &'a B, block: BlockTag, known_slots: KnownSlots) -> Self {
        Self { resolver: AccessListSlotResolver::new(backend), block, known_slots }
    }

    /// Balance and allowance slots of `token` for owner `from` and spender `to`
    pub async fn discover_erc20_slots(&self, token: Address, from: Address, to: Address) -> Result<[B256; 2]> {
        let (balance, allowance) = futures::try_join!(
            self.resolver.resolve(token, Erc20Probe::BalanceOf { owner: from }, from, self.block),
            self.resolver.resolve(
                token,
                Erc20Probe::Allowance { owner: from, spender: to },
                from,
                self.block
            ),
        )?;

        let slots = diff_storage_slots(token, &balance, &allowance)?;
        debug!(token = %token, slot_a = %slots[0], slot_b = %slots[1], "ERC20 mapping slots");
        Ok(slots)
    }

    /// Give `from` a balance of `amount` and an allowance of `amount` for `to`
    pub async fn build_erc20_override(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<StateOverride> {
        let slots = self.discover_erc20_slots(token, from, to).await?;
        let value = uint_word(amount);

        let mut overrides = StateOverride::default();
        overrides.insert(
            token,
            AccountOverride::default().with_state_diff(slots.map(|slot| (slot, value))),
        );
        Ok(overrides)
    }

    /// Forge every funding entry concurrently and merge the results.
    /// Zero amounts need no forging and are skipped.
    pub async fn build_erc20_overrides(
        &self,
        fundings: &[TokenFunding],
        from: Address,
        to: Address,
    ) -> Result<StateOverride> {
        let per_token = futures::future::try_join_all(
            fundings
                .iter()
                .filter(|f| !f.amount.is_zero())
                .map(|f| self.build_erc20_override(f.token, from, to, f.amount)),
        )
        .await?;

        let merged = per_token
            .into_iter()
            .try_fold(StateOverride::default(), merge_overrides)?;

        info!(tokens = merged.len(), "Built ERC20 balance/allowance overrides");
        Ok(merged)
    }

    /// `isApprovedForAll(owner, spender) == true` on the position manager
    pub fn build_operator_approval_override(&self, npm: Address, owner: Address, spender: Address) -> StateOverride {
        let slot = nested_mapping_slot(owner, spender, U256::from(self.known_slots.npm_operator_approvals));
        single_slot_override(npm, slot, bool_word(true))
    }

    /// Force `router` onto the automation contract's swap-router whitelist
    pub fn build_router_whitelist_override(&self, automation: Address, router: Address) -> StateOverride {
        let slot = mapping_slot(router, U256::from(self.known_slots.router_whitelist));
        single_slot_override(automation, slot, bool_word(true))
    }
}

fn single_slot_override(address: Address, slot: B256, value: B256) -> StateOverride {
    let mut overrides = StateOverride::default();
    overrides.insert(address, AccountOverride::default().with_state_diff([(slot, value)]));
    overrides
}

// ============================================
// MERGING
// ============================================

fn merge_field<T: PartialEq>(
    address: Address,
    field: &str,
    base: &mut Option<T>,
    incoming: Option<T>,
) -> Result<()> {
    let Some(incoming) = incoming else { return Ok(()) };
    match base.as_ref() {
        Some(existing) if *existing != incoming => Err(SimulationError::ConflictingOverride {
            address,
            field: field.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            *base = Some(incoming);
            Ok(())
        }
    }
}

fn merge_account(address: Address, base: &mut AccountOverride, incoming: AccountOverride) -> Result<()> {
    merge_field(address, "balance", &mut base.balance, incoming.balance)?;
    merge_field(address, "nonce", &mut base.nonce, incoming.nonce)?;
    merge_field(address, "code", &mut base.code, incoming.code)?;
    merge_field(address, "state", &mut base.state, incoming.state)?;

    if let Some(incoming_diff) = incoming.state_diff {
        let diff = base.state_diff.get_or_insert_with(Default::default);
        for (slot, value) in incoming_diff {
            match diff.get(&slot) {
                Some(existing) if *existing != value => {
                    return Err(SimulationError::ConflictingOverride {
                        address,
                        field: format!("stateDiff[{}]", slot),
                    });
                }
                Some(_) => {}
                None => {
                    diff.insert(slot, value);
                }
            }
        }
    }
    Ok(())
}

/// Union of two override sets. The same field or slot written twice with
/// different values is a `ConflictingOverride`.
pub fn merge_overrides(mut base: StateOverride, other: StateOverride) -> Result<StateOverride> {
    for (address, account) in other {
        match base.get_mut(&address) {
            Some(existing) => merge_account(address, existing, account)?,
            None => {
                base.insert(address, account);
            }
        }
    }
    Ok(base)
}

/// Number of stateDiff slots set on `address`
pub fn state_diff_len(overrides: &StateOverride, address: Address) -> usize {
    overrides
        .get(&address)
        .and_then(|account| account.state_diff.as_ref())
        .map(|diff| diff.len())
        .unwrap_or(0)
}
