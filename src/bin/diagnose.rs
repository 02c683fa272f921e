//! Diagnostic tool - check configuration and node capabilities
//!
//! Run with: cargo run --bin diagnose

use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::state::StateOverride;
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use lp_preview::abi::{IAutoman, INonfungiblePositionManager};
use lp_preview::config::Config;
use lp_preview::overrides::{Erc20Probe, StateOverrideBuilder};
use lp_preview::simulator::{BlockTag, RpcBackend, SimulationBackend};
use lp_preview::SimulationError;

fn section(title: &str) {
    println!("\n═══════════════════════════════════════════════════");
    println!("{:^51}", title);
    println!("═══════════════════════════════════════════════════\n");
}

fn mark(ok: bool) -> &'static str {
    if ok { "✅" } else { "❌" }
}

/// First 30 and last 15 characters of a long URL
fn shorten(url: &str) -> String {
    let chars: Vec<char> = url.chars().collect();
    if chars.len() <= 50 {
        return url.to_string();
    }
    let head: String = chars[..30].iter().collect();
    let tail: String = chars[chars.len() - 15..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Read a bool view with `overrides` applied
async fn forged_flag<B, C>(
    backend: &B,
    to: Address,
    call: C,
    overrides: &StateOverride,
    block: BlockTag,
) -> Result<bool, SimulationError>
where
    B: SimulationBackend,
    C: SolCall<Return = bool>,
{
    let tx = TransactionRequest::default().to(to).input(Bytes::from(call.abi_encode()).into());
    let out = backend.call(&tx, block, Some(overrides)).await?;
    C::abi_decode_returns(&out).map_err(|e| SimulationError::decode(C::SIGNATURE, e))
}

fn report_slot(view: &str, key: &str, slot: u64, check: Result<bool, SimulationError>) {
    match check {
        Ok(true) => println!("  ✅ {} reads forged slot {}", view, slot),
        Ok(false) => {
            println!("  ❌ {} ignores slot {}", view, slot);
            println!("     → Set {} to the contract's storage slot", key);
        }
        Err(e) => {
            println!("  ❌ {} with state overrides: {}", view, e);
            println!("     → Set SUPPORTS_STATE_OVERRIDES=false");
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    println!("🔍 LP PREVIEW DIAGNOSTIC CHECK\n");

    let config = Config::from_env()?;

    section("CONFIGURATION");

    println!("  RPC_URL: {}", shorten(&config.rpc_url));
    println!("  CHAIN_ID: {} ({})", config.chain_id, config.deployment().map(|d| d.name).unwrap_or("unknown"));
    println!("  BLOCK: {}", config.block());

    let checks = [
        ("AUTOMATION_ADDRESS", config.automation_address.is_some(), "Required for every preview"),
        ("SWAP_PROXY_ADDRESS", config.swap_proxy_address.is_some(), "Enables aggregator routing"),
        ("AGGREGATOR_API_URL", config.aggregator_api_url.is_some(), "Aggregator quotes"),
        ("CALLER_ADDRESS", config.caller_address.is_some(), "Needed for mint previews"),
    ];
    for (key, set, desc) in checks {
        println!("  {} {}", mark(set), key);
        println!("    └─ {}\n", desc);
    }

    match config.validate() {
        Ok(()) => println!("  ✅ Configuration is valid"),
        Err(e) => println!("  ❌ {}", e),
    }

    section("NODE CAPABILITIES");

    let provider = ProviderBuilder::new().connect_http(config.rpc_url.parse()?);
    match provider.get_chain_id().await {
        Ok(id) if id == config.chain_id => println!("  ✅ eth_chainId: {}", id),
        Ok(id) => println!("  ❌ eth_chainId: node is on {} but CHAIN_ID is {}", id, config.chain_id),
        Err(e) => {
            println!("  ❌ Node unreachable: {}", e);
            return Ok(());
        }
    }

    let backend = RpcBackend::new(provider, config.supports_state_overrides);
    let Some(deployment) = config.deployment() else {
        println!("  ❓ No known deployment for this chain, skipping probes");
        return Ok(());
    };

    // ERC-721 balanceOf has the same shape; the zero owner reverts there
    let probe = Erc20Probe::BalanceOf { owner: Address::with_last_byte(1) };
    let tx = TransactionRequest::default().to(deployment.npm).input(probe.calldata().into());
    match backend.create_access_list(&tx, config.block()).await {
        Ok(entries) => println!("  ✅ eth_createAccessList ({} entries)", entries.len()),
        Err(SimulationError::AccessListUnavailable(e)) => {
            println!("  ❌ eth_createAccessList unsupported: {}", e);
            println!("     → Forged-balance previews will fail; use --funded with a real holder");
        }
        Err(e) => println!("  ❌ eth_createAccessList: {}", e),
    }

    section("FORGED SLOTS");

    // A forged slot only counts if the contract's own view reads it back
    let slots = config.known_slots();
    let builder = StateOverrideBuilder::new(&backend, config.block(), slots);
    let owner = Address::with_last_byte(1);
    let operator = config.automation().unwrap_or(Address::with_last_byte(2));
    let approval = INonfungiblePositionManager::isApprovedForAllCall { owner, operator };
    let overrides = builder.build_operator_approval_override(deployment.npm, owner, operator);
    let check = forged_flag(&backend, deployment.npm, approval, &overrides, config.block()).await;
    report_slot("NPM isApprovedForAll", "NPM_OPERATOR_APPROVALS_SLOT", slots.npm_operator_approvals, check);

    let (Ok(automation), Some(&router)) = (config.automation(), deployment.swap_routers.first()) else {
        println!("  ❓ AUTOMATION_ADDRESS not set, skipping router whitelist check");
        println!("\n✅ Diagnostic complete!\n");
        return Ok(());
    };
    let whitelisted = IAutoman::isWhiteListedSwapRouterCall { router };
    let overrides = builder.build_router_whitelist_override(automation, router);
    let check = forged_flag(&backend, automation, whitelisted, &overrides, config.block()).await;
    report_slot("Automation isWhiteListedSwapRouter", "ROUTER_WHITELIST_SLOT", slots.router_whitelist, check);

    println!("\n✅ Diagnostic complete!\n");
    Ok(())
}
