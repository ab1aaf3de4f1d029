//! Sensa - sampler de sensores
//!
//! Lê a configuração TOML, monta as pilhas de sensoriamento e publica um
//! blackboard JSON por ciclo. Logs vão para stderr; stdout fica para o sink.
//!
//! ## Variáveis de ambiente
//! - `SENSA_CONFIG`: caminho da configuração (mesmo que `--config`)
//! - `RUST_LOG`: filtro de logs (padrão: `sensa=info`)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sensa_calc::CalculationKind;
use sensa_devices::DeviceKind;
use sensa_orchestration::{Config, Orchestrator, Registry};

#[derive(Parser, Debug)]
#[command(name = "sensa")]
#[command(author = "Sensa Contributors")]
#[command(version = "2026.10.1")]
#[command(about = "Sample sensors into a blackboard and publish it as JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sampling loop
    Run {
        /// Configuration file
        #[arg(short, long, value_name = "FILE", env = "SENSA_CONFIG")]
        config: PathBuf,

        /// Run a single cycle and exit
        #[arg(long, conflicts_with = "cycles")]
        once: bool,

        /// Run N cycles and exit
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
    },

    /// Validate a configuration and build every stack without sampling
    Check {
        /// Configuration file
        #[arg(short, long, value_name = "FILE", env = "SENSA_CONFIG")]
        config: PathBuf,
    },

    /// List the device models and calculation modules that can be configured
    Models,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, once, cycles } => run_command(&config, if once { Some(1) } else { cycles }),
        Commands::Check { config } => check_command(&config),
        Commands::Models => {
            models_command();
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn run_command(path: &Path, cycles: Option<u64>) -> Result<()> {
    let config = load(path)?;
    let mut orchestrator = Orchestrator::from_config(&config).context("starting sampler")?;

    let Some(cycles) = cycles else {
        info!(config = %path.display(), "sampling until interrupted");
        orchestrator.run();
    };

    let summary = orchestrator.run_cycles(cycles).clone();
    let stats = orchestrator.scheduler_stats();
    info!(
        cycles = summary.cycles,
        published = summary.published,
        stack_failures = summary.stack_failures,
        sink_failures = summary.sink_failures,
        max_cycle_us = stats.max_execution_time.as_micros() as u64,
        "sampling finished"
    );
    if summary.published == 0 {
        anyhow::bail!("no cycle produced data");
    }
    Ok(())
}

fn check_command(path: &Path) -> Result<()> {
    let config = load(path)?;
    let registry = Registry::build(&config).context("building stacks")?;

    println!("{}: ok", path.display());
    println!("  sampler: {:?}, every {}s", config.sampler.mode, config.sampler.period_secs);
    for name in config.sampled_stacks() {
        let Some(stack) = registry.stack(&name) else {
            continue;
        };
        let modules: Vec<&str> = stack.pipeline().module_names().collect();
        println!(
            "  stack {}: {} [{}] prefix={}",
            name,
            stack.device().name(),
            modules.join(" → "),
            stack.prefix().unwrap_or("-")
        );
    }
    Ok(())
}

fn models_command() {
    println!("devices:");
    for kind in DeviceKind::ALL {
        println!("  {}", kind);
    }
    println!("calculations:");
    for kind in CalculationKind::ALL {
        println!("  {}", kind);
    }
}
