//! State override construction
//!
//! Access-list probes find where a token keeps balances and allowances, the
//! differ isolates the two mapping slots, and the builder writes forged values
//! into a provider-level state-override set.

pub mod access_list;
pub mod builder;
pub mod mapping_slot;
pub mod slot_diff;

pub use access_list::{AccessListSlotResolver, Erc20Probe};
pub use builder::{merge_overrides, state_diff_len, KnownSlots, StateOverrideBuilder, TokenFunding};
pub use slot_diff::diff_storage_slots;
