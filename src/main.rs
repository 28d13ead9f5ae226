use cyclosim::{bench_forces, bench_ticks};
use cyclosim::{build_simulation, ScenarioConfig};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file name under the scenarios/ directory
    #[arg(short, default_value = "single_proton.yaml")]
    file_name: String,

    /// Output CSV path; defaults to "<run name>_tracked.csv"
    #[arg(long)]
    out: Option<PathBuf>,

    /// Run the throughput benchmarks instead of a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(file_name);
    let file = File::open(&config_path)
        .with_context(|| format!("opening scenario {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)
        .with_context(|| format!("parsing scenario {}", config_path.display()))?;
    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.bench {
        bench_forces();
        bench_ticks();
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let mut sim = build_simulation(scenario_cfg).context("building scenario")?;
    let report = sim.run().context("running simulation")?;

    for warning in &report.sink_warnings {
        warn!(error = %warning, "sink failure during run");
    }

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("{}_tracked.csv", sim.params().name)));
    let file = File::create(&out).with_context(|| format!("creating {}", out.display()))?;
    sim.sink()
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("writing {}", out.display()))?;

    info!(
        ticks = report.ticks,
        final_time = report.final_time,
        output = %out.display(),
        "tracked data written"
    );
    Ok(())
}
