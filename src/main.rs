use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;
use pairtrade::config::{PairTradeConfig, RunMode};
use pairtrade::engine::PairTradeEngine;
use pairtrade::ports::ExecutionGateway;
use pairtrade::trade::execution::gateway_box::GatewayBox;
use std::env;
use std::io::Write;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "pairtrade", about = "Statistical-arbitrage pairs trading engine")]
struct Cli {
    /// Defaults to RUN_MODE from the configuration
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one analysis/trading cycle and exit
    Once,
    /// Run a cycle every INTERVAL_SECS until interrupted
    Auto,
    /// Report hedge ratio and recent signals without trading
    #[command(alias = "analyse")]
    Analyze,
    /// List open orders
    Orders { symbol: Option<String> },
    /// List held positions
    Positions,
    /// Cancel one order (and its linked bracket leg)
    Cancel { order_id: String },
    /// Cancel every open order, optionally for one symbol
    CancelAll { symbol: Option<String> },
    /// Flatten one position at market
    Close { symbol: String },
    /// Flatten every position
    CloseAll,
}

impl Command {
    fn run_mode(&self) -> Option<RunMode> {
        match self {
            Command::Once => Some(RunMode::Once),
            Command::Auto => Some(RunMode::Auto),
            Command::Analyze => Some(RunMode::Analyze),
            _ => None,
        }
    }
}

async fn run_trading(mut cfg: PairTradeConfig, mode: Option<RunMode>) -> anyhow::Result<()> {
    if let Some(mode) = mode {
        cfg.run_mode = mode;
    }
    log::info!("Starting pair-trade {:?} run...", cfg.run_mode);
    let engine = PairTradeEngine::new(cfg)?;
    engine.run().await
}

async fn run_admin(cfg: &PairTradeConfig, command: Command) -> anyhow::Result<()> {
    if cfg.paper_state_file.is_none() && cfg.gateway_name == "paper" {
        log::warn!("PAPER_STATE_FILE is not set; the paper book starts empty");
    }
    let gateway = GatewayBox::create(&cfg.gateway_name, cfg.paper_state_file.as_deref())?;
    match command {
        Command::Orders { symbol } => {
            let orders = gateway.list_open_orders(symbol.as_deref()).await?;
            log::info!("{} open orders", orders.len());
            for o in orders {
                log::info!(
                    "  {} {} {} qty={} {:?} @ {} linked={}",
                    o.order_id,
                    o.symbol,
                    o.side,
                    o.quantity,
                    o.kind,
                    o.price,
                    o.linked_order_id.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Positions => {
            let positions = gateway.list_positions().await?;
            log::info!("{} positions", positions.len());
            for p in positions {
                log::info!(
                    "  {} qty={} avg_entry={}",
                    p.symbol,
                    p.quantity,
                    p.avg_entry_price
                );
            }
        }
        Command::Cancel { order_id } => {
            gateway.cancel_order(&order_id).await?;
            log::info!("cancelled {}", order_id);
        }
        Command::CancelAll { symbol } => {
            let n = gateway.cancel_all_orders(symbol.as_deref()).await?;
            log::info!("cancelled {} orders", n);
        }
        Command::Close { symbol } => match gateway.close_position(&symbol).await? {
            Some(handle) => log::info!("closed {} with order {}", symbol, handle.order_id),
            None => log::info!("no position in {}", symbol),
        },
        Command::CloseAll => {
            let n = gateway.close_all_positions().await?;
            log::info!("closed {} positions", n);
        }
        Command::Once | Command::Auto | Command::Analyze => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging with local timezone
    let offset_seconds = env::var("TIMEZONE_OFFSET")
        .unwrap_or_else(|_| "0".to_string())
        .parse::<i32>()
        .expect("Invalid TIMEZONE_OFFSET");
    let offset = FixedOffset::east_opt(offset_seconds).expect("Invalid offset");
    Builder::from_default_env()
        .format(move |buf, record| {
            let utc_now: DateTime<Utc> = Utc::now();
            let local_now = utc_now.with_timezone(&offset);
            writeln!(
                buf,
                "{} [{}] - {}",
                local_now.format("%Y-%m-%dT%H:%M:%S%z"),
                record.level(),
                record.args()
            )
        })
        .filter(
            None,
            LevelFilter::from_str(&env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
                .unwrap_or(LevelFilter::Info),
        )
        .init();

    let git_hash = option_env!("PAIRTRADE_GIT_HASH").unwrap_or("unknown");
    log::info!("pairtrade git: {}", git_hash);

    let cli = Cli::parse();
    let cfg = PairTradeConfig::from_env_or_yaml().expect("invalid pair trade config");

    let result = match cli.command {
        None => run_trading(cfg, None).await,
        Some(command) => match command.run_mode() {
            Some(mode) => run_trading(cfg, Some(mode)).await,
            None => run_admin(&cfg, command).await,
        },
    };
    result.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}
