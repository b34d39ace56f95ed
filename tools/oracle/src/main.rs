//! Oracle binary
//!
//! Random mode drives weighted random operations across four traders seeded
//! from their on-chain wallet balances; scenario mode runs the deterministic
//! settlement choreographies with mocked seed balances. Either way the
//! process exits non-zero when an invariant violation is raised.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::market::MarketContext;

use oracle::context::RunContext;
use oracle::orchestrator::Orchestrator;
use oracle::settlement::FixedDelay;
use oracle::surface::process::{ProcessConfig, ProcessSurface};
use oracle::surface::{ChainSurface, ControlSurface, QuerySurface};
use oracle::trader::{SigningKey, TraderIdentity, TraderModel};

const TRADER_KEY_VARS: [&str; 4] = [
    "TRADER1_PRIVKEY",
    "TRADER2_PRIVKEY",
    "TRADER3_PRIVKEY",
    "TRADER4_PRIVKEY",
];

/// Mocked wallet balance per asset in scenario mode.
const SCENARIO_SEED_BALANCE: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Weighted random operations with structural validation rounds.
    Random,
    /// Deterministic split-settlement choreographies.
    Scenarios,
}

#[derive(Parser, Debug)]
#[command(
    name = "oracle",
    version,
    about = "Model-based settlement oracle for the exchange stack"
)]
struct Args {
    /// Simulation mode
    #[arg(long, value_enum, default_value = "random")]
    mode: Mode,

    /// Environment file holding the stack URL and trader keys
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Stack URL; falls back to MARKET_STACK_URL from the environment
    #[arg(long)]
    stack: Option<String>,

    /// Number of operations in random mode
    #[arg(long, default_value_t = 50)]
    operations: u64,

    /// Number of participating traders (keys are taken in order)
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=4))]
    traders: u8,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Exchange control CLI
    #[arg(long, default_value = "exchange-cli")]
    cli_binary: PathBuf,

    /// JSONL-emitting gRPC client for the query surface
    #[arg(long, default_value = "grpcurl")]
    query_binary: PathBuf,

    /// Chain utility tool
    #[arg(long, default_value = "cast")]
    cast_binary: PathBuf,

    /// Proto descriptor for the query client, if it needs one
    #[arg(long)]
    proto_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if dotenv::from_path(&args.env_file).is_err() {
        warn!(env_file = %args.env_file.display(), "environment file not found");
    }

    let stack = args
        .stack
        .clone()
        .or_else(|| std::env::var("MARKET_STACK_URL").ok())
        .context("no stack URL: pass --stack or set MARKET_STACK_URL")?;

    let mut keys = load_trader_keys()?;
    keys.truncate(args.traders as usize);

    let mut config = ProcessConfig::new(stack);
    config.cli_binary = args.cli_binary.clone();
    config.query_binary = args.query_binary.clone();
    config.cast_binary = args.cast_binary.clone();
    config.proto_file = args.proto_file.clone();
    let surface = Arc::new(ProcessSurface::new(config));

    surface
        .status()
        .await
        .context("exchange stack is unreachable")?;
    let stack_config = surface.fetch_config().await.context("config fetch failed")?;
    let market = MarketContext::resolve(&stack_config)?;
    info!(market = %market.market_id, "resolved market context");

    let traders = build_traders(surface.as_ref(), &market, &keys, args.mode).await?;

    let ctx = RunContext::new(market);
    let seed = args.seed.unwrap_or_else(rand::random);
    info!(seed, "seeding operation generator");

    let control: Arc<dyn ControlSurface> = surface.clone();
    let query: Arc<dyn QuerySurface> = surface.clone();
    let mut orchestrator = Orchestrator::new(
        ctx,
        control,
        query,
        Arc::new(FixedDelay::default()),
        traders,
        seed,
    );

    let outcome = match args.mode {
        Mode::Random => orchestrator.run_random(args.operations).await,
        Mode::Scenarios => orchestrator.run_scenarios().await,
    };

    match outcome {
        Ok(summary) => {
            println!("{summary}");
            Ok(())
        }
        Err(violation) => {
            error!(%violation, "run failed");
            println!("{}", orchestrator.summary());
            bail!(violation)
        }
    }
}

fn load_trader_keys() -> anyhow::Result<Vec<SigningKey>> {
    TRADER_KEY_VARS
        .iter()
        .map(|var| {
            std::env::var(var)
                .map(SigningKey::new)
                .with_context(|| format!("missing {var} in environment"))
        })
        .collect()
}

/// Derive each trader's address and seed its shadow model: actual on-chain
/// wallet balances in random mode, mocked balances in scenario mode.
async fn build_traders(
    surface: &ProcessSurface,
    market: &MarketContext,
    keys: &[SigningKey],
    mode: Mode,
) -> anyhow::Result<Vec<TraderModel>> {
    let mut traders = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let name = format!("Trader{}", i + 1);
        let address = surface
            .derive_address(key.expose())
            .await
            .with_context(|| format!("address derivation failed for {name}"))?;
        let identity = TraderIdentity::new(&name, key.clone(), &address);

        let trader = match mode {
            Mode::Random => {
                let base = wallet_balance(
                    surface,
                    &address,
                    &market.base_token_address,
                    &market.base_rpc_url,
                )
                .await;
                let quote = wallet_balance(
                    surface,
                    &address,
                    &market.quote_token_address,
                    &market.quote_rpc_url,
                )
                .await;
                info!(name = %name, address = %address, base = %base, quote = %quote, "queried on-chain balances");
                TraderModel::with_wallet(identity, base, quote)
            }
            Mode::Scenarios => {
                info!(name = %name, address = %address, balance = SCENARIO_SEED_BALANCE, "using mock balances");
                TraderModel::with_mock_balances(identity, Decimal::from(SCENARIO_SEED_BALANCE))
            }
        };
        traders.push(trader);
    }
    Ok(traders)
}

/// A failed balance lookup seeds zero, mirroring a wallet with no funds.
async fn wallet_balance(
    surface: &ProcessSurface,
    address: &str,
    token_address: &str,
    rpc_url: &str,
) -> Decimal {
    match surface.token_balance(address, token_address, rpc_url).await {
        Ok(balance) => balance,
        Err(error) => {
            warn!(%address, %error, "balance query failed, assuming zero");
            Decimal::ZERO
        }
    }
}
