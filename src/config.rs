//! Configuration for LP Preview
//!
//! Loaded from the environment (and `.env`) or from a TOML file. Addresses are
//! kept as strings here and parsed once, when the simulation settings are built.

use alloy_primitives::{Address, U256};
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::chains::{deployment, ChainDeployment};
use crate::overrides::KnownSlots;
use crate::simulator::{BlockTag, SimulationReport, SimulationSettings};

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// RPC URL of a node that supports eth_createAccessList
    pub rpc_url: String,

    /// Chain ID (1 = Ethereum Mainnet)
    pub chain_id: u64,

    /// Node accepts the state-override argument of eth_call
    pub supports_state_overrides: bool,

    /// Pin previews to this block (latest when unset)
    pub block_number: Option<u64>,

    // ========== Contracts ==========
    /// Liquidity automation contract
    pub automation_address: Option<String>,

    /// Trusted swap proxy; aggregator routing is off when unset
    pub swap_proxy_address: Option<String>,

    /// NonfungiblePositionManager, defaults to the chain deployment
    pub npm_address: Option<String>,

    /// Account the preview is simulated from
    pub caller_address: Option<String>,

    // ========== Swap Settings ==========
    /// Aggregator API base URL, e.g. https://api.1inch.dev
    pub aggregator_api_url: Option<String>,

    pub aggregator_api_key: Option<String>,

    /// Slippage tolerance passed to the aggregator (50 = 0.5%)
    pub slippage_bips: u32,

    /// Seconds an aggregator quote stays reusable
    pub quote_cache_ttl_secs: u64,

    /// Routers accepted on top of the chain's default allow-list
    pub extra_allowed_routers: Vec<String>,

    // ========== Automation Settings ==========
    /// Automation fee passed with every action
    pub fee_bips: u64,

    /// Action deadline = now + this many seconds
    pub deadline_buffer_secs: u64,

    /// Base slot of the NPM `_operatorApprovals` mapping
    pub npm_operator_approvals_slot: u64,

    /// Base slot of the automation router whitelist mapping
    pub router_whitelist_slot: u64,

    // ========== Logging ==========
    /// Append every preview to a JSON-lines file
    pub preview_log: bool,

    pub preview_log_path: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim()).wrap_err_with(|| format!("{} is not a valid address: {}", field, value))
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Network
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: env_or("CHAIN_ID", defaults.chain_id),
            supports_state_overrides: env_or("SUPPORTS_STATE_OVERRIDES", defaults.supports_state_overrides),
            block_number: env::var("BLOCK_NUMBER").ok().and_then(|s| s.parse().ok()),

            // Contracts
            automation_address: env::var("AUTOMATION_ADDRESS").ok(),
            swap_proxy_address: env::var("SWAP_PROXY_ADDRESS").ok(),
            npm_address: env::var("NPM_ADDRESS").ok(),
            caller_address: env::var("CALLER_ADDRESS").ok(),

            // Swap
            aggregator_api_url: env::var("AGGREGATOR_API_URL").ok(),
            aggregator_api_key: env::var("AGGREGATOR_API_KEY").ok(),
            slippage_bips: env_or("SLIPPAGE_BIPS", defaults.slippage_bips),
            quote_cache_ttl_secs: env_or("QUOTE_CACHE_TTL_SECS", defaults.quote_cache_ttl_secs),
            extra_allowed_routers: env_list("EXTRA_ALLOWED_ROUTERS"),

            // Automation
            fee_bips: env_or("FEE_BIPS", defaults.fee_bips),
            deadline_buffer_secs: env_or("DEADLINE_BUFFER_SECS", defaults.deadline_buffer_secs),
            npm_operator_approvals_slot: env_or("NPM_OPERATOR_APPROVALS_SLOT", defaults.npm_operator_approvals_slot),
            router_whitelist_slot: env_or("ROUTER_WHITELIST_SLOT", defaults.router_whitelist_slot),

            // Logging
            preview_log: env_or("PREVIEW_LOG", defaults.preview_log),
            preview_log_path: env::var("PREVIEW_LOG_PATH").unwrap_or(defaults.preview_log_path),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn deployment(&self) -> Option<&'static ChainDeployment> {
        deployment(self.chain_id)
    }

    pub fn block(&self) -> BlockTag {
        self.block_number.into()
    }

    pub fn known_slots(&self) -> KnownSlots {
        KnownSlots {
            npm_operator_approvals: self.npm_operator_approvals_slot,
            router_whitelist: self.router_whitelist_slot,
        }
    }

    pub fn automation(&self) -> Result<Address> {
        let raw = self
            .automation_address
            .as_deref()
            .ok_or_else(|| eyre!("AUTOMATION_ADDRESS is required"))?;
        parse_address("AUTOMATION_ADDRESS", raw)
    }

    pub fn caller(&self) -> Result<Option<Address>> {
        self.caller_address
            .as_deref()
            .map(|raw| parse_address("CALLER_ADDRESS", raw))
            .transpose()
    }

    pub fn npm(&self) -> Result<Address> {
        match (&self.npm_address, self.deployment()) {
            (Some(raw), _) => parse_address("NPM_ADDRESS", raw),
            (None, Some(d)) => Ok(d.npm),
            (None, None) => Err(eyre!("chain {} has no known NPM, set NPM_ADDRESS", self.chain_id)),
        }
    }

    pub fn factory(&self) -> Result<Address> {
        self.deployment()
            .map(|d| d.factory)
            .ok_or_else(|| eyre!("chain {} has no known Uniswap V3 factory", self.chain_id))
    }

    /// Action deadline relative to `now` (unix seconds)
    pub fn deadline(&self, now: u64) -> U256 {
        U256::from(now.saturating_add(self.deadline_buffer_secs))
    }

    /// Validate configuration before running a preview
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre!("Invalid RPC_URL - please set a node URL"));
        }
        self.automation()?;
        self.npm()?;
        self.caller()?;
        if let Some(raw) = &self.swap_proxy_address {
            parse_address("SWAP_PROXY_ADDRESS", raw)?;
        }
        for raw in &self.extra_allowed_routers {
            parse_address("EXTRA_ALLOWED_ROUTERS", raw)?;
        }

        // Sanity checks
        if self.slippage_bips > 5_000 {
            return Err(eyre!("SLIPPAGE_BIPS above 50% ({}) is almost certainly a typo", self.slippage_bips));
        }
        if self.fee_bips >= 10_000 {
            return Err(eyre!("FEE_BIPS must be below 10000 (currently {})", self.fee_bips));
        }
        if self.swap_proxy_address.is_some() && self.aggregator_api_url.is_none() {
            tracing::warn!("SWAP_PROXY_ADDRESS set without AGGREGATOR_API_URL, swaps stay in-pool");
        }
        Ok(())
    }

    /// Settings for the orchestrator
    pub fn settings(&self) -> Result<SimulationSettings> {
        let mut allowed_routers = self.deployment().map(|d| d.allowed_routers()).unwrap_or_default();
        for raw in &self.extra_allowed_routers {
            allowed_routers.insert(parse_address("EXTRA_ALLOWED_ROUTERS", raw)?);
        }

        Ok(SimulationSettings {
            chain_id: self.chain_id,
            automation: self.automation()?,
            npm: self.npm()?,
            swap_proxy: self
                .swap_proxy_address
                .as_deref()
                .map(|raw| parse_address("SWAP_PROXY_ADDRESS", raw))
                .transpose()?,
            allowed_routers,
            slippage_bips: self.slippage_bips,
            fee_bips: self.fee_bips,
            known_slots: self.known_slots(),
        })
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let chain = self.deployment().map(|d| d.name).unwrap_or("unknown");
        let set = |v: &Option<String>| if v.is_some() { "✓ Configured" } else { "✗ Not Set" };
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║               LP PREVIEW - CONFIGURATION                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain:             {:^40} ║", format!("{} ({})", chain, self.chain_id));
        println!("║ Block:             {:^40} ║", self.block().to_string());
        println!("║ State Overrides:   {:^40} ║",
            if self.supports_state_overrides { "✓ Supported" } else { "✗ Plain eth_call" }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CONTRACTS                                                  ║");
        println!("║ • Automation:      {:^40} ║", set(&self.automation_address));
        println!("║ • Swap Proxy:      {:^40} ║", set(&self.swap_proxy_address));
        println!("║ • NPM:             {:^40} ║",
            if self.npm_address.is_some() { "✓ Custom" } else { "Chain default" }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SWAPS                                                      ║");
        println!("║ • Aggregator:      {:^40} ║", set(&self.aggregator_api_url));
        println!("║ • Slippage:        {:>37.2} % ║", self.slippage_bips as f64 / 100.0);
        println!("║ • Quote TTL:       {:>38} s ║", self.quote_cache_ttl_secs);
        println!("║ • Extra Routers:   {:^40} ║", self.extra_allowed_routers.len());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ AUTOMATION                                                 ║");
        println!("║ • Fee:             {:>35} bips ║", self.fee_bips);
        println!("║ • Deadline Buffer: {:>38} s ║", self.deadline_buffer_secs);
        println!("║ • Preview Log:     {:^40} ║",
            if self.preview_log { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        let slots = KnownSlots::default();
        Self {
            rpc_url: "https://eth.llamarpc.com".to_string(),
            chain_id: 1,
            supports_state_overrides: true,
            block_number: None,
            automation_address: None,
            swap_proxy_address: None,
            npm_address: None,
            caller_address: None,
            aggregator_api_url: None,
            aggregator_api_key: None,
            slippage_bips: 50,
            quote_cache_ttl_secs: 30,
            extra_allowed_routers: vec![],
            fee_bips: 0,
            deadline_buffer_secs: 1800,
            npm_operator_approvals_slot: slots.npm_operator_approvals,
            router_whitelist_slot: slots.router_whitelist,
            preview_log: false,
            preview_log_path: "./logs/previews.jsonl".to_string(),
        }
    }
}

// ============================================
// PREVIEW LOGGER
// ============================================

use chrono::{DateTime, Utc};
use std::io::Write;

/// One preview outcome, appended as a JSON line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewLog {
    pub timestamp: DateTime<Utc>,
    pub chain_id: u64,
    pub block: String,
    pub action: String,
    pub caller: Address,
    pub success: bool,
    pub failed_stage: Option<String>,
    pub error: Option<String>,
    pub amount0: Option<U256>,
    pub amount1: Option<U256>,
    pub liquidity: Option<u128>,
    pub token_id: Option<U256>,
    pub aggregator_router: Option<Address>,
}

impl PreviewLog {
    pub fn success(chain_id: u64, block: BlockTag, caller: Address, report: &SimulationReport) -> Self {
        Self {
            timestamp: Utc::now(),
            chain_id,
            block: block.to_string(),
            action: report.action.to_string(),
            caller,
            success: true,
            failed_stage: None,
            error: None,
            amount0: Some(report.result.amount0),
            amount1: Some(report.result.amount1),
            liquidity: report.result.liquidity,
            token_id: report.result.token_id,
            aggregator_router: report.swap.as_ref().and_then(|s| s.plan.as_ref()).map(|p| p.router),
        }
    }

    pub fn failure(chain_id: u64, block: BlockTag, caller: Address, action: &str, stage: &str, error: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            chain_id,
            block: block.to_string(),
            action: action.to_string(),
            caller,
            success: false,
            failed_stage: Some(stage.to_string()),
            error: Some(error.to_string()),
            amount0: None,
            amount1: None,
            liquidity: None,
            token_id: None,
            aggregator_router: None,
        }
    }

    /// Append this log to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================
