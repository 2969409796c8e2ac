//! Thin runner around the engine: load a JSON scenario, run it, summarize.
//!
//! Exit code 0 on a completed run; non-zero when the scenario fails
//! validation or the engine halts on an invariant violation. All flag
//! parsing lives here; the engine itself never touches the command line.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use exchange_core::{Event, ScenarioConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exchange-sim", about = "Spatial bilateral exchange simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scenario file without running it.
    Validate { scenario: PathBuf },
    /// Run a scenario for a number of ticks.
    Run {
        scenario: PathBuf,
        #[arg(long, default_value_t = 100)]
        ticks: u64,
        /// Write the full event stream as JSON lines.
        #[arg(long)]
        events_out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { scenario } => validate_cmd(&scenario),
        Commands::Run {
            scenario,
            ticks,
            events_out,
        } => run_cmd(&scenario, ticks, events_out.as_deref()),
    }
}

fn load_scenario(path: &std::path::Path) -> Result<ScenarioConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let config: ScenarioConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

fn validate_cmd(path: &std::path::Path) -> Result<()> {
    let config = load_scenario(path)?;
    config.validate().context("scenario validation failed")?;
    println!(
        "ok: {} agents on a {}x{} grid",
        config.agents.len(),
        config.grid_size,
        config.grid_size
    );
    Ok(())
}

fn run_cmd(path: &std::path::Path, ticks: u64, events_out: Option<&std::path::Path>) -> Result<()> {
    let config = load_scenario(path)?;
    let mut sim = config.build().context("scenario validation failed")?;
    let events = sim.run(ticks).context("run halted")?;

    if let Some(out_path) = events_out {
        let mut out = fs::File::create(out_path)
            .with_context(|| format!("creating {}", out_path.display()))?;
        for event in &events {
            serde_json::to_writer(&mut out, event)?;
            out.write_all(b"\n")?;
        }
    }

    let trades = events
        .iter()
        .filter(|e| matches!(e, Event::Trade { .. }))
        .count();
    let forages = events
        .iter()
        .filter(|e| matches!(e, Event::Forage { .. }))
        .count();
    println!(
        "ran {} ticks: {} trades, {} forages, {} events total",
        sim.tick(),
        trades,
        forages,
        events.len()
    );
    for agent in sim.agents() {
        println!(
            "  agent {}: pos {} inventory A={} B={} M={}",
            agent.id, agent.pos, agent.inventory.a, agent.inventory.b, agent.inventory.money
        );
    }
    Ok(())
}
