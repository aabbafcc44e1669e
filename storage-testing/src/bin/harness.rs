// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use storage_ops::{EngineConfig, RunnerEvent};
use storage_testing::fixtures::Rig;
use storage_testing::scenario;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "harness")]
#[command(about = "Queue a scenario's operations, preview them and apply them in memory")]
struct HarnessCli {
    /// Scenario file, or the name of one under the scenarios directory
    scenario: String,

    /// Engine configuration (TOML); STORAGE_OPS_CONFIG or defaults otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only print the preview, do not apply anything
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON instead of a tree
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storage_ops=info,storage_sys=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = HarnessCli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading engine config {}", path.display()))?,
        None => EngineConfig::from_env().context("loading engine config")?,
    };

    let scenario = scenario::load(&cli.scenario)
        .with_context(|| format!("loading scenario {}", cli.scenario))?;
    let rig = Rig::with_config(scenario.devices()?, config);
    let outcomes = scenario.queue(&rig.stack)?;
    info!(
        scenario = %scenario.name,
        pushed = outcomes.len(),
        queued = rig.stack.len(),
        "scenario queued"
    );

    for description in rig.stack.descriptions() {
        println!("{description}");
    }
    let layout = rig.layout(&scenario.device.node);
    println!("{}", serde_json::to_string_pretty(&layout)?);

    if cli.dry_run {
        return Ok(());
    }

    let outcome = rig.apply();
    for event in &outcome.events {
        match event {
            RunnerEvent::OpFinished { index, status } => {
                info!(index, status = %status, "operation finished");
            }
            RunnerEvent::Error => warn!("applying operations failed"),
            _ => {}
        }
    }
    if cli.json {
        println!("{}", outcome.report.to_json()?);
    } else {
        print!("{}", outcome.report);
    }

    if outcome.last_event() != Some(&RunnerEvent::Finished) {
        anyhow::bail!("scenario {} did not apply cleanly", scenario.name);
    }
    Ok(())
}
