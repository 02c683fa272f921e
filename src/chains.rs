//! Per-chain deployments: Uniswap V3 periphery and trusted swap routers

use alloy_primitives::{address, Address};
use std::collections::HashSet;

/// Contracts the preview pipeline talks to on one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDeployment {
    pub chain_id: u64,
    pub name: &'static str,
    pub npm: Address,
    pub factory: Address,
    /// Aggregator routers the swap proxy accepts
    pub swap_routers: &'static [Address],
}

impl ChainDeployment {
    pub fn allowed_routers(&self) -> HashSet<Address> {
        self.swap_routers.iter().copied().collect()
    }
}

// ============================================
// UNISWAP V3 PERIPHERY
// ============================================

const CANONICAL_NPM: Address = address!("C36442b4a4522E871399CD717aBDD847Ab11FE88");
const CANONICAL_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");

const BASE_NPM: Address = address!("03a520b32C04BF3bEEf7BEb72E919cf822Ed34f1");
const BASE_FACTORY: Address = address!("33128a8fC17869897dcE68Ed026d694621f6FDfD");

// ============================================
// SWAP ROUTERS
// ============================================

/// 1inch AggregationRouterV5
pub const ONEINCH_V5: Address = address!("1111111254EEB25477B68fb85Ed929f73A960582");
/// 1inch AggregationRouterV6
pub const ONEINCH_V6: Address = address!("111111125421cA6dc452d289314280a0f8842A65");
/// 0x Exchange Proxy
pub const ZEROX_EXCHANGE_PROXY: Address = address!("DEF1C0ded9bec7F1a1670819833240f027b25EfF");

const DEFAULT_ROUTERS: &[Address] = &[ONEINCH_V5, ONEINCH_V6, ZEROX_EXCHANGE_PROXY];

pub const DEPLOYMENTS: &[ChainDeployment] = &[
    ChainDeployment {
        chain_id: 1,
        name: "mainnet",
        npm: CANONICAL_NPM,
        factory: CANONICAL_FACTORY,
        swap_routers: DEFAULT_ROUTERS,
    },
    ChainDeployment {
        chain_id: 10,
        name: "optimism",
        npm: CANONICAL_NPM,
        factory: CANONICAL_FACTORY,
        swap_routers: DEFAULT_ROUTERS,
    },
    ChainDeployment {
        chain_id: 137,
        name: "polygon",
        npm: CANONICAL_NPM,
        factory: CANONICAL_FACTORY,
        swap_routers: DEFAULT_ROUTERS,
    },
    ChainDeployment {
        chain_id: 8453,
        name: "base",
        npm: BASE_NPM,
        factory: BASE_FACTORY,
        swap_routers: DEFAULT_ROUTERS,
    },
    ChainDeployment {
        chain_id: 42161,
        name: "arbitrum",
        npm: CANONICAL_NPM,
        factory: CANONICAL_FACTORY,
        swap_routers: DEFAULT_ROUTERS,
    },
];

pub fn deployment(chain_id: u64) -> Option<&'static ChainDeployment> {
    DEPLOYMENTS.iter().find(|d| d.chain_id == chain_id)
}
