//! Risk-sized signal engine.
//!
//! Generates BUY/SELL signals from technical indicators and turns them into
//! sized orders with stop-loss and take-profit levels.

mod api;
mod bot;
mod indicators;
mod models;
mod trading;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::SnapshotClient;
use crate::bot::{Bot, PlanDecision};
use crate::models::{parse_klines_json, PriceBar};
use crate::trading::{get_strategy, RiskManager, Settings, StrategyKind};

/// Risk-sized signal engine CLI.
#[derive(Parser)]
#[command(name = "sigrisk")]
#[command(about = "Technical-analysis signals with risk-based position sizing", long_about = None)]
struct Cli {
    /// Log level or filter directives (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// JSON settings file with "risk" and "strategy" sections
    #[arg(short, long, env = "SIGRISK_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the signal for a kline file
    Signal {
        /// Kline JSON file (array of exchange kline rows, oldest first)
        #[arg(short, long)]
        klines: PathBuf,

        /// Strategy name (RSI, EMA_Cross, RSI_EMA, Bollinger_Bands)
        #[arg(short, long, default_value = "RSI_EMA")]
        strategy: String,
    },

    /// Run one planning cycle against an account snapshot
    Plan {
        /// Account snapshot JSON file
        #[arg(long)]
        snapshot: PathBuf,

        /// Kline JSON file (array of exchange kline rows, oldest first)
        #[arg(short, long)]
        klines: PathBuf,

        /// Symbol to plan for
        #[arg(long)]
        symbol: String,

        /// Strategy name (RSI, EMA_Cross, RSI_EMA, Bollinger_Bands)
        #[arg(short, long, default_value = "RSI_EMA")]
        strategy: String,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,

    /// List available strategies
    Strategies,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Signal { klines, strategy } => {
            let bars = load_bars(&klines)?;
            let strategy = get_strategy(&strategy, &settings.strategy);

            info!(bars = bars.len(), strategy = %strategy.name(), "Evaluating signal");
            let signal = strategy.get_signal(&bars);

            println!("{}", signal);
        }

        Commands::Plan {
            snapshot,
            klines,
            symbol,
            strategy,
            json,
        } => {
            let client = SnapshotClient::from_file(&snapshot)?;
            let bars = load_bars(&klines)?;

            let risk = RiskManager::new(client, settings.risk.clone());
            let mut bot = Bot::new(risk, get_strategy(&strategy, &settings.strategy));
            info!(symbol = %symbol, bars = bars.len(), strategy = %bot.strategy_name(), "Planning");

            match bot.evaluate(&symbol, &bars) {
                PlanDecision::Planned(plan) if json => {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                }
                PlanDecision::Planned(plan) => {
                    println!("\n=== Trade Plan: {} ===\n", plan.symbol);
                    println!("  Strategy:     {}", plan.strategy);
                    println!("  Side:         {}", plan.side);
                    println!("  Entry Price:  {}", plan.entry_price);
                    println!("  Quantity:     {}", plan.quantity);
                    println!("  Notional:     {}", (plan.quantity * plan.entry_price).round_dp(2));
                    println!("  Stop Loss:    {}", display_level(plan.stop_loss));
                    println!("  Take Profit:  {}", display_level(plan.take_profit));
                }
                other => {
                    println!("No trade for {}: {}", symbol, other);
                }
            }
        }

        Commands::Config => {
            let risk = &settings.risk;
            let strategy = &settings.strategy;

            println!("\n=== Risk Configuration ===\n");
            println!("Position Sizing:");
            println!("  Risk Per Trade:       {}%", risk.risk_per_trade * dec!(100));
            println!("  Max Open Positions:   {}", risk.max_open_positions);

            println!("\nProtective Levels:");
            println!("  Stop Loss:            {} ({}%)", risk.use_stop_loss, risk.stop_loss_pct * dec!(100));
            println!("  Take Profit:          {} ({}%)", risk.use_take_profit, risk.take_profit_pct * dec!(100));
            println!("  Trailing Stop:        {} ({}%)", risk.trailing_stop, risk.trailing_stop_pct * dec!(100));

            println!("\nCompounding:");
            println!("  Auto Compound:        {}", risk.auto_compound);
            println!("  Reinvest Share:       {}%", risk.compound_reinvest_percent * dec!(100));

            println!("\n=== Strategy Configuration ===\n");
            println!("RSI:");
            println!("  Period:               {}", strategy.rsi_period);
            println!("  Overbought:           {}", strategy.rsi_overbought);
            println!("  Oversold:             {}", strategy.rsi_oversold);

            println!("\nEMA Cross:");
            println!("  Fast:                 {}", strategy.fast_ema);
            println!("  Slow:                 {}", strategy.slow_ema);

            println!("\nBollinger Bands:");
            println!("  Window:               {}", strategy.bb_window);
            println!("  Std Devs:             {}", strategy.bb_std_dev);
        }

        Commands::Strategies => {
            for kind in StrategyKind::all() {
                println!("{}", kind);
            }
        }
    }

    Ok(())
}

fn load_bars(path: &Path) -> Result<Vec<PriceBar>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read klines {}", path.display()))?;
    parse_klines_json(&json).with_context(|| format!("Invalid klines in {}", path.display()))
}

fn display_level(level: Option<rust_decimal::Decimal>) -> String {
    level.map_or_else(|| "disabled".to_string(), |price| price.to_string())
}
