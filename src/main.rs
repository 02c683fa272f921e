//! LP Preview - preview Uniswap V3 liquidity automation actions
//!
//! Run with: cargo run -- <command>
//!
//! Every command is a read-only eth_call against the configured node.
//! Balances and approvals the caller lacks are forged with state overrides.

use alloy_primitives::{Address, B256, U256};
use alloy_provider::ProviderBuilder;
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lp_preview::config::{Config, PreviewLog};
use lp_preview::overrides::StateOverrideBuilder;
use lp_preview::position::{OnChainPositionReader, PositionReader};
use lp_preview::simulator::{
    AutomationAction, MintRequest, Permit, RebalanceSimulationOrchestrator, RpcBackend, SimulationReport,
    SimulationRequest,
};
use lp_preview::swap::AggregatorClient;

// ============================================
// CLI
// ============================================

/// Preview Uniswap V3 liquidity automation actions without sending a transaction
#[derive(Parser, Debug)]
#[command(name = "lp-preview", author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (environment and .env otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Pin the preview to this block number
    #[arg(long, global = true)]
    block: Option<u64>,

    /// Simulate from this account (defaults to the position owner)
    #[arg(long, global = true)]
    caller: Option<Address>,

    /// The caller already holds the tokens and approvals; forge nothing
    #[arg(long, global = true)]
    funded: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct PermitArgs {
    /// Deadline of a signed NPM permit; selects the permit overload
    #[arg(long, requires_all = ["permit_v", "permit_r", "permit_s"])]
    permit_deadline: Option<U256>,

    #[arg(long)]
    permit_v: Option<u8>,

    #[arg(long)]
    permit_r: Option<B256>,

    #[arg(long)]
    permit_s: Option<B256>,
}

impl PermitArgs {
    fn permit(&self) -> Option<Permit> {
        match (self.permit_deadline, self.permit_v, self.permit_r, self.permit_s) {
            (Some(deadline), Some(v), Some(r), Some(s)) => Some(Permit { deadline, v, r, s }),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover the balance and allowance storage slots of an ERC-20
    Slots {
        token: Address,
        owner: Address,
        spender: Address,
    },
    /// Mint a new position with an optimal swap
    Mint {
        token0: Address,
        token1: Address,
        /// Fee tier in hundredths of a bip (500, 3000, ...)
        fee: u32,
        #[arg(long, allow_negative_numbers = true)]
        tick_lower: i32,
        #[arg(long, allow_negative_numbers = true)]
        tick_upper: i32,
        #[arg(long, default_value = "0")]
        amount0: U256,
        #[arg(long, default_value = "0")]
        amount1: U256,
    },
    /// Move a position to a new tick range
    Rebalance {
        token_id: U256,
        #[arg(long, allow_negative_numbers = true)]
        tick_lower: i32,
        #[arg(long, allow_negative_numbers = true)]
        tick_upper: i32,
        #[command(flatten)]
        permit: PermitArgs,
    },
    /// Compound collected fees back into the position
    Reinvest {
        token_id: U256,
        #[command(flatten)]
        permit: PermitArgs,
    },
    /// Withdraw part of a position's liquidity
    Decrease {
        token_id: U256,
        liquidity: u128,
        #[command(flatten)]
        permit: PermitArgs,
    },
    /// Withdraw liquidity and swap everything into one token
    DecreaseSingle {
        token_id: U256,
        liquidity: u128,
        /// Sell token0 for token1 (token1 for token0 otherwise)
        #[arg(long)]
        zero_for_one: bool,
        #[command(flatten)]
        permit: PermitArgs,
    },
    /// Withdraw all liquidity and burn the position
    Remove {
        token_id: U256,
        #[command(flatten)]
        permit: PermitArgs,
    },
}

impl Command {
    fn action(&self) -> Option<AutomationAction> {
        let action = match self {
            Command::Slots { .. } => return None,
            Command::Mint { token0, token1, fee, tick_lower, tick_upper, amount0, amount1 } => {
                AutomationAction::MintOptimal(MintRequest {
                    token0: *token0,
                    token1: *token1,
                    fee: *fee,
                    tick_lower: *tick_lower,
                    tick_upper: *tick_upper,
                    amount0_desired: *amount0,
                    amount1_desired: *amount1,
                })
            }
            Command::Rebalance { token_id, tick_lower, tick_upper, permit } => AutomationAction::Rebalance {
                token_id: *token_id,
                tick_lower: *tick_lower,
                tick_upper: *tick_upper,
                permit: permit.permit(),
            },
            Command::Reinvest { token_id, permit } => {
                AutomationAction::Reinvest { token_id: *token_id, permit: permit.permit() }
            }
            Command::Decrease { token_id, liquidity, permit } => AutomationAction::DecreaseLiquidity {
                token_id: *token_id,
                liquidity: *liquidity,
                permit: permit.permit(),
            },
            Command::DecreaseSingle { token_id, liquidity, zero_for_one, permit } => {
                AutomationAction::DecreaseLiquiditySingle {
                    token_id: *token_id,
                    liquidity: *liquidity,
                    zero_for_one: *zero_for_one,
                    permit: permit.permit(),
                }
            }
            Command::Remove { token_id, permit } => {
                AutomationAction::RemoveLiquidity { token_id: *token_id, permit: permit.permit() }
            }
        };
        Some(action)
    }
}

// ============================================
// OUTPUT
// ============================================

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔭 LP PREVIEW - Uniswap V3 Automation Simulator").cyan().bold()
    );
    println!(
        "{}",
        style("    State Overrides | Optimal Swaps | Nothing Broadcast").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(template);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_report(report: &SimulationReport, elapsed: Duration) {
    println!();
    println!("{}", style(format!("═══ {} PREVIEW ═══", report.action.to_uppercase())).green().bold());
    println!();

    if let Some(position) = &report.position {
        println!("  Position #{} owned by {}", position.token_id, position.owner);
        println!(
            "    └─ range [{}, {}] | liquidity {} | fee {}",
            position.tick_lower, position.tick_upper, position.liquidity, position.fee
        );
    }
    println!("  Pool {} at tick {}", report.pool.address, report.pool.tick);

    match &report.swap {
        Some(swap) => match &swap.plan {
            Some(plan) => println!(
                "  Swap: {} of {} via aggregator router {}",
                plan.amount_in, plan.token_in, plan.router
            ),
            None if swap.optimum.amount_in.is_zero() => println!("  Swap: none needed"),
            None => println!(
                "  Swap: {} in-pool ({})",
                swap.optimum.amount_in,
                if swap.optimum.zero_for_one { "token0 → token1" } else { "token1 → token0" }
            ),
        },
        None => println!("  Swap: not applicable"),
    }
    println!(
        "  Overrides: {}",
        if report.overrides_applied { style("forged balances/approvals").yellow() } else { style("none").dim() }
    );

    println!();
    println!("  {}", style("Simulated result").bold());
    println!("    • amount0:   {}", report.result.amount0);
    println!("    • amount1:   {}", report.result.amount1);
    if let Some(liquidity) = report.result.liquidity {
        println!("    • liquidity: {}", liquidity);
    }
    if let Some(token_id) = report.result.token_id {
        println!("    • token id:  {}", token_id);
    }

    if let Some(prediction) = &report.prediction {
        println!();
        println!("  {}", style("Pure-math prediction").bold());
        println!("    • amount0:   {}", prediction.amount0);
        println!("    • amount1:   {}", prediction.amount1);
        println!("    • liquidity: {}", prediction.liquidity);
        println!("    • equity:    {} (token1 units)", prediction.equity_in_token1);
    }

    println!();
    println!("  {} in {:.2?}", style("✓ Preview complete").green(), elapsed);
}

// ============================================
// MAIN
// ============================================

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let directive = if cli.verbose { "lp_preview=debug" } else { "lp_preview=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if cli.block.is_some() {
        config.block_number = cli.block;
    }
    if let Some(caller) = cli.caller {
        config.caller_address = Some(caller.to_string());
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file or --config");
        return Err(e);
    }

    if !cli.json {
        print_banner();
        config.print_summary();
        println!();
    }

    let provider = ProviderBuilder::new().connect_http(config.rpc_url.parse()?);
    let backend = RpcBackend::new(provider, config.supports_state_overrides);
    let block = config.block();

    let Some(action) = cli.command.action() else {
        let Command::Slots { token, owner, spender } = cli.command else {
            return Err(eyre!("unreachable command"));
        };
        let builder = StateOverrideBuilder::new(&backend, block, config.known_slots());
        let bar = spinner("Probing access lists...");
        let slots = builder.discover_erc20_slots(token, owner, spender).await;
        bar.finish_and_clear();
        let [a, b] = slots?;
        println!("{} {}", style("Mapping slots of").bold(), token);
        println!("  • {}", a);
        println!("  • {}", b);
        return Ok(());
    };

    let reader = OnChainPositionReader::new(backend.clone(), config.npm()?, config.factory()?);
    let aggregator = AggregatorClient::new(
        config.aggregator_api_url.clone(),
        config.aggregator_api_key.clone(),
        Duration::from_secs(config.quote_cache_ttl_secs),
    );
    let orchestrator = RebalanceSimulationOrchestrator::new(backend, aggregator, reader, config.settings()?);

    // Position actions default to simulating as the owner
    let caller = match (config.caller()?, action.token_id()) {
        (Some(caller), _) => caller,
        (None, Some(token_id)) => orchestrator.reader().position(token_id, block).await?.owner,
        (None, None) => return Err(eyre!("mint previews need --caller or CALLER_ADDRESS")),
    };

    let request = SimulationRequest {
        action,
        caller,
        funded: cli.funded,
        block,
        deadline: config.deadline(chrono::Utc::now().timestamp().max(0) as u64),
    };
    info!(action = action.name(), caller = %caller, "Running preview");

    let start = Instant::now();
    let bar = (!cli.json).then(|| spinner(&format!("Simulating {}...", action.name())));
    let outcome = orchestrator.simulate(&request).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let log = match &outcome {
        Ok(report) => PreviewLog::success(config.chain_id, block, caller, report),
        Err(failure) => PreviewLog::failure(
            config.chain_id,
            block,
            caller,
            action.name(),
            &failure.stage.to_string(),
            &failure.cause.to_string(),
        ),
    };
    if config.preview_log {
        if let Err(e) = log.append_to_file(&config.preview_log_path) {
            error!("Failed to write preview log: {}", e);
        }
    }

    match outcome {
        Ok(report) if cli.json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Ok(report) => {
            print_report(&report, start.elapsed());
            Ok(())
        }
        Err(failure) => {
            if !cli.json {
                println!();
                println!("  {} at stage {}", style("✗ Preview failed").red().bold(), failure.stage);
                println!("    └─ {}", failure.cause);
            }
            Err(failure.into())
        }
    }
}
