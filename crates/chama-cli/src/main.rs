//! Chama CLI
//!
//! Command-line interface for replaying ROSCA group scenarios.

mod scenario;

use chama_engine::config::LoggingConfig;
use chama_engine::metrics::render;
use chama_engine::{EngineConfig, EngineMetrics};
use clap::{Parser, Subcommand};
use prometheus::Registry;
use scenario::{Runner, Scenario};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "chama")]
#[command(author = "Chama Engine Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Chama - rotating savings group engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CHAMA_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario against a manual clock and in-memory settlement
    Simulate {
        /// Scenario file (.toml or .json)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Print Prometheus metrics after the replay
        #[arg(long)]
        metrics: bool,

        /// Abort on the first rejected intent
        #[arg(long)]
        strict: bool,

        /// Print committed events as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Version information
    Version,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false),
            )
            .init();
    }
}

fn expand_path(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    path.to_path_buf()
}

/// Explicit path, else `<config dir>/chama/chama.toml`
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(expand_path(path)),
        None => dirs::config_dir().map(|dir| dir.join("chama").join("chama.toml")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = config_path(cli.config.as_deref());
    let config = EngineConfig::load(config_path.as_deref())?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Simulate {
            scenario,
            metrics,
            strict,
            events,
        } => {
            let scenario_path = expand_path(&scenario);
            let scenario = Scenario::load(&scenario_path)?;
            let engine_config = scenario.engine.clone().unwrap_or(config);

            tracing::info!(
                "Replaying {} ({} steps)",
                scenario.name.as_deref().unwrap_or("scenario"),
                scenario.steps.len()
            );

            let registry = Registry::new();
            let engine_metrics = if metrics && engine_config.metrics.enabled {
                Some(EngineMetrics::new(&registry)?)
            } else {
                None
            };

            let mut runner = Runner::new(&scenario, engine_config, engine_metrics)?;
            let report = runner.run(&scenario, strict, |event| {
                if events {
                    match serde_json::to_string(event) {
                        Ok(line) => println!("{}", line),
                        Err(err) => tracing::warn!("unprintable event: {}", err),
                    }
                }
            })?;

            println!();
            println!("Steps applied: {}", report.applied);
            println!("Steps rejected: {}", report.rejected.len());
            for (step, reason) in &report.rejected {
                println!("  #{}: {}", step, reason);
            }
            println!("Events: {}", report.events.len());

            let engine = runner.engine();
            for id in 1..=engine.group_count() as u64 {
                let details = engine.get_group_details(chama_core::types::GroupId(id))?;
                println!();
                println!(
                    "{}: {} ({}/{} members, round {})",
                    details.group.id,
                    details.group.phase,
                    details.member_count,
                    details.group.member_target,
                    details.group.current_round
                );
                println!("  paid out: {}", details.balance.paid_out);
                println!("  refunded: {}", details.balance.refunded);
                println!("  penalties: {}", details.total_penalties);
                println!("  escrowed: {}", details.balance.holdings()?);
            }

            println!();
            println!("Wallets:");
            for (label, balance) in runner.balances() {
                println!("  {:<16} {}", label, balance);
            }
            println!("  {:<16} {}", "(escrow)", runner.escrow());

            if metrics {
                println!();
                print!("{}", render(&registry)?);
            }
        }

        Commands::Config => {
            if let Some(path) = &config_path {
                tracing::debug!("Config: {:?}", path);
            }
            print!("{}", config.to_toml()?);
        }

        Commands::Version => {
            println!("Chama v0.1.0");
            println!("Rust: {}", rustc_version_runtime::version());
            println!();
            println!("Features:");
            println!("  - Rotating payouts in join order or seeded draw");
            println!("  - Security deposits with late penalties");
            println!("  - Member disputes with timed voting");
            println!("  - Conservation-checked settlement batches");
        }
    }

    Ok(())
}
