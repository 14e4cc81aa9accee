//! `ekf-fusion` CLI: run measurement logs and simulated scenarios through the
//! laser/radar EKF, report RMSE, import/export replays.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fusion_core::{
    FusionConfig, FusionEkf, MeasurementPackage, RmseAccumulator, RmseReport, SensorKind,
    StepOutcome,
};
use serde::Serialize;
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{Scenario, ScenarioKind};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ekf-fusion", about = "Laser/radar Extended Kalman Filter")]
struct Cli {
    /// Filter configuration (JSON); defaults are used for missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Ignore radar packets
    #[arg(long, global = true, conflicts_with = "radar_only")]
    laser_only: bool,
    /// Ignore laser packets
    #[arg(long, global = true)]
    radar_only: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a text measurement log.
    Run {
        /// Path to the input log
        input: PathBuf,
        /// Write one estimate line per packet to this file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
    /// Simulate a named scenario and filter it.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Save the generated packets as a JSON replay log
        #[arg(long)]
        save_replay: Option<PathBuf>,
        /// Save the generated packets as a text measurement log
        #[arg(long)]
        export_log: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
    /// Load and filter a previously recorded JSON replay log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        /// Output metrics to a JSON file
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
}

/// Counters and accuracy for one filtered sequence.
#[derive(Debug, Default, Serialize)]
struct RunSummary {
    packets: usize,
    updates: usize,
    skipped: usize,
    ignored: usize,
    rejected: usize,
    mean_nis_laser: Option<f64>,
    mean_nis_radar: Option<f64>,
    rmse: Option<RmseReport>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            input,
            output,
            metrics,
        } => {
            let file = File::open(&input)
                .with_context(|| format!("cannot open {}", input.display()))?;
            let packets = sim::read_log(BufReader::new(file))
                .with_context(|| format!("cannot parse {}", input.display()))?;
            println!("Processing '{}' ({} packets)...", input.display(), packets.len());

            let summary = match output {
                Some(path) => {
                    let mut writer = BufWriter::new(File::create(&path)?);
                    let sink: &mut dyn Write = &mut writer;
                    let summary = run_filter(&config, &packets, Some(sink))?;
                    writer.flush()?;
                    println!("Estimates saved to {}", path.display());
                    summary
                }
                None => run_filter(&config, &packets, None)?,
            };
            report(&summary, metrics.as_deref())?;
        }
        Commands::RunScenario {
            scenario,
            seed,
            save_replay: replay_path,
            export_log,
            metrics,
        } => {
            let scenario = Scenario::build(scenario, seed);
            let packets = scenario.generate();
            println!(
                "Running scenario '{}' (seed={}, duration={:.0}s, {} packets)...",
                scenario.name,
                seed,
                scenario.duration,
                packets.len()
            );

            if let Some(path) = export_log {
                let writer = BufWriter::new(File::create(&path)?);
                sim::write_log(writer, &packets)?;
                println!("Measurement log saved to {}", path.display());
            }

            let summary = run_filter(&config, &packets, None)?;

            if let Some(path) = replay_path {
                let log = ReplayLog {
                    scenario_name: scenario.name.clone(),
                    seed,
                    packets,
                };
                save_replay(&log, &path)?;
                println!("Replay saved to {}", path.display());
            }
            report(&summary, metrics.as_deref())?;
        }
        Commands::Replay { input, metrics } => {
            let log = load_replay(&input)?;
            println!(
                "Replaying '{}' ({} packets)...",
                log.scenario_name,
                log.packets.len()
            );
            let summary = run_filter(&config, &log.packets, None)?;
            report(&summary, metrics.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<FusionConfig> {
    let mut config = match &cli.config {
        Some(path) => FusionConfig::from_json_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => FusionConfig::default(),
    };
    if cli.laser_only {
        config.use_radar = false;
    }
    if cli.radar_only {
        config.use_laser = false;
    }
    Ok(config)
}

/// Feed every packet through a fresh filter, optionally writing estimates.
fn run_filter(
    config: &FusionConfig,
    packets: &[MeasurementPackage],
    mut output: Option<&mut dyn Write>,
) -> Result<RunSummary> {
    let mut ekf = FusionEkf::new(config.clone());
    let mut rmse = RmseAccumulator::new();
    let mut summary = RunSummary::default();
    let mut nis_sum = [0.0f64; 2];
    let mut nis_count = [0usize; 2];

    for pack in packets {
        summary.packets += 1;
        match ekf.process_measurement(pack) {
            StepOutcome::Ignored { .. } => {
                summary.ignored += 1;
                continue;
            }
            StepOutcome::Rejected { .. } => {
                summary.rejected += 1;
                continue;
            }
            StepOutcome::Initialized { .. } => {}
            StepOutcome::Updated { sensor, nis, .. } => {
                summary.updates += 1;
                let i = match sensor {
                    SensorKind::Laser => 0,
                    SensorKind::Radar => 1,
                };
                nis_sum[i] += nis;
                nis_count[i] += 1;
            }
            StepOutcome::UpdateSkipped { .. } => summary.skipped += 1,
        }

        let Some(state) = ekf.state() else {
            continue;
        };
        if let Some(gt) = &pack.ground_truth {
            rmse.accumulate(state, gt);
        }
        if let Some(w) = output.as_deref_mut() {
            sim::write_estimate(w, state, pack)?;
        }
    }

    let mean = |i: usize| (nis_count[i] > 0).then(|| nis_sum[i] / nis_count[i] as f64);
    summary.mean_nis_laser = mean(0);
    summary.mean_nis_radar = mean(1);
    summary.rmse = rmse.report();
    Ok(summary)
}

fn report(summary: &RunSummary, metrics_path: Option<&Path>) -> Result<()> {
    println!(
        "Done: {} packets, {} updates, {} skipped, {} ignored, {} rejected",
        summary.packets, summary.updates, summary.skipped, summary.ignored, summary.rejected
    );
    if let Some(nis) = summary.mean_nis_laser {
        println!("Mean NIS laser: {nis:.3}");
    }
    if let Some(nis) = summary.mean_nis_radar {
        println!("Mean NIS radar: {nis:.3}");
    }
    match &summary.rmse {
        Some(r) => println!(
            "RMSE: px={:.4} py={:.4} vx={:.4} vy={:.4}",
            r.px, r.py, r.vx, r.vy
        ),
        None => println!("RMSE: no ground truth"),
    }

    if let Some(path) = metrics_path {
        std::fs::write(path, serde_json::to_string_pretty(summary)?)?;
        println!("Metrics saved to {}", path.display());
    }
    Ok(())
}
