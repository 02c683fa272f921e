//! LP Preview - risk-free previews of Uniswap V3 liquidity automation actions
//!
//! A preview forges the balances and approvals an action needs through
//! state overrides, plans the swap that balances the position, and runs the
//! automation call with `eth_call`. Nothing is ever broadcast.

pub mod abi;
pub mod chains;
pub mod config;
pub mod error;
pub mod math;
pub mod overrides;
pub mod position;
pub mod simulator;
pub mod swap;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Result, SimulationError};
