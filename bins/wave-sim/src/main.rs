//! wave-sim — Scenario runner for the Wavefront engine.
//!
//! Replays a JSON scenario of creator-token operations against an
//! in-memory ledger and prints what each step did.

mod runner;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use wave_core::config::DeploymentConfig;
use wave_core::types::Asset;

use crate::runner::Runner;
use crate::scenario::{format_units, Scenario, QUOTE_DECIMALS, TOKEN_DECIMALS};

/// Wavefront scenario runner.
#[derive(Parser)]
#[command(name = "wave-sim")]
#[command(version, about = "Replay creator-token scenarios against the Wavefront engine")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file.
    Run(RunArgs),
    /// Print the effective deployment config.
    ShowConfig(ConfigArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the scenario JSON.
    scenario: PathBuf,

    /// Deployment config (TOML). `WAVE__*` environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Deployment config (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::ShowConfig(args) => show_config(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<DeploymentConfig> {
    DeploymentConfig::load(path.map(PathBuf::as_path)).context("Failed to load deployment config")
}

fn run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let scenario = Scenario::load(&args.scenario)?;
    info!(
        name = %scenario.name,
        steps = scenario.steps.len(),
        accounts = scenario.accounts.len(),
        "running scenario"
    );

    let mut runner = Runner::new(config, &scenario)?;
    let reports = runner.run(&scenario)?;

    println!("\n=== SCENARIO {} ===", scenario.name);
    for report in &reports {
        println!("[{:>3}] t={} {:<14} {}", report.index, report.now, report.op, report.outcome);
    }

    println!("\n=== BALANCES ===");
    for (label, asset, amount) in runner.balances() {
        let decimals = match asset {
            Asset::Quote => QUOTE_DECIMALS,
            Asset::Token(_) => TOKEN_DECIMALS,
        };
        println!("  {label:<12} {:>28} {asset}", format_units(amount, decimals));
    }

    println!("\n=== TOKENS ===");
    for token in runner.engine().tokens() {
        let market = &token.market;
        println!(
            "  {} {} reserve={} quote, circulating={} tokens, debt={}, items={}",
            token.id,
            token.metadata.symbol,
            format_units(market.real_quote_reserve(), QUOTE_DECIMALS),
            format_units(market.circulating_supply(), TOKEN_DECIMALS),
            format_units(token.credit.total_debt(), QUOTE_DECIMALS),
            token.content.len()
        );
    }
    info!(steps = reports.len(), "scenario complete");
    Ok(())
}

fn show_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let rendered = serde_json::to_string_pretty(&config).context("Failed to render config")?;
    println!("{rendered}");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
