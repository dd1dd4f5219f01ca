//! # Axonion CLI
//!
//! Headless runner for the single-neuron simulator.

use anyhow::Context;
use axonion_engine::{
    Alert, AlertKind, Channel, EngineConfig, EngineRunner, SimulationEngine, StimulusProtocol,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Simulated ms advanced between progress updates
const CHUNK_MS: f64 = 10.0;

#[derive(Parser)]
#[command(name = "axonion")]
#[command(version)]
#[command(about = "Hodgkin-Huxley neuron with metabolic load, simulated acquisition", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProtocolKind {
    Off,
    Constant,
    Step,
    Pulse,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print a summary
    Run {
        /// TOML engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Simulated duration (ms)
        #[arg(short, long, default_value_t = 1000.0)]
        duration: f64,
        /// Override the configured stimulus protocol
        #[arg(short, long, value_enum)]
        protocol: Option<ProtocolKind>,
        /// Stimulus amplitude (uA/cm2); step size for `step`
        #[arg(long, default_value_t = 10.0)]
        amplitude: f64,
        /// Holding current before the step (uA/cm2)
        #[arg(long, default_value_t = 0.0)]
        baseline: f64,
        /// Step onset (ms)
        #[arg(long, default_value_t = 100.0)]
        onset: f64,
        /// Pulse period (ms)
        #[arg(long, default_value_t = 20.0)]
        period: f64,
        /// Pulse frequency (Hz); overrides --period
        #[arg(long)]
        frequency: Option<f64>,
        /// Pulse width (ms)
        #[arg(long, default_value_t = 1.0)]
        width: f64,
        /// Acquisition noise standard deviation (mV)
        #[arg(long)]
        noise: Option<f64>,
        /// Seed for reproducible noise
        #[arg(long)]
        seed: Option<u64>,
        /// Kill the cell at this simulated time (ms)
        #[arg(long)]
        kill_at: Option<f64>,
        /// Pace the run in wall-clock time on the background runner
        #[arg(long)]
        realtime: bool,
        /// Write the recorded history as JSON
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// List stimulus protocols
    Protocols,

    /// Print the default configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            duration,
            protocol,
            amplitude,
            baseline,
            onset,
            period,
            frequency,
            width,
            noise,
            seed,
            kill_at,
            realtime,
            export,
        } => {
            let mut config = match config {
                Some(path) => EngineConfig::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => EngineConfig::default(),
            };

            if let Some(kind) = protocol {
                config.protocol = match kind {
                    ProtocolKind::Off => StimulusProtocol::Off,
                    ProtocolKind::Constant => StimulusProtocol::Constant { amplitude },
                    ProtocolKind::Step => StimulusProtocol::Step {
                        baseline,
                        step_amplitude: amplitude,
                        onset,
                    },
                    ProtocolKind::Pulse => match frequency {
                        Some(hz) => StimulusProtocol::pulse_from_frequency(amplitude, hz, width)?,
                        None => StimulusProtocol::Pulse { amplitude, period, width },
                    },
                };
            }
            if let Some(noise_std) = noise {
                config.acquisition.noise_std = noise_std;
            }
            if seed.is_some() {
                config.acquisition.seed = seed;
            }
            anyhow::ensure!(duration.is_finite() && duration > 0.0, "duration must be positive");

            let engine = SimulationEngine::new(config)?;
            println!(
                "{} {} for {} ms",
                "Simulating".green().bold(),
                engine.protocol().to_string().cyan(),
                duration
            );

            let engine = if realtime {
                run_realtime(engine, duration, kill_at)?
            } else {
                run_batch(engine, duration, kill_at)?
            };

            print_summary(&engine, duration);

            if let Some(path) = export {
                export_history(&engine, &path)?;
            }
        }

        Commands::Protocols => {
            println!("{}", "Stimulus Protocols:".green().bold());
            println!();
            println!("  {}      - no injected current", "off".cyan());
            println!("  {} - constant amplitude", "constant".cyan());
            println!("  {}     - baseline, then baseline + amplitude from onset", "step".cyan());
            println!("  {}    - amplitude for `width` ms of every `period` ms", "pulse".cyan());
        }

        Commands::Config => {
            print!("{}", EngineConfig::default().to_toml()?);
        }
    }

    Ok(())
}

fn progress_bar(duration: f64) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(duration.ceil() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ms")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn report_alerts(pb: &ProgressBar, alerts: Vec<Alert>) {
    for alert in alerts {
        pb.suspend(|| {
            let line = format!("  [{:>8.1} ms] {}", alert.time, alert.kind);
            if alert.kind == AlertKind::CellDeath {
                println!("{}", line.red().bold());
            } else {
                println!("{}", line.yellow());
            }
        });
    }
}

fn run_batch(mut engine: SimulationEngine, duration: f64, kill_at: Option<f64>) -> anyhow::Result<SimulationEngine> {
    let pb = progress_bar(duration)?;
    let mut pending_kill = kill_at;

    while engine.time() < duration {
        let chunk = CHUNK_MS.min(duration - engine.time());
        engine.run_for(chunk);
        if let Some(at) = pending_kill {
            if engine.time() >= at {
                engine.kill();
                pending_kill = None;
            }
        }
        report_alerts(&pb, engine.drain_alerts());
        pb.set_position(engine.time() as u64);
        if chunk < engine.dt() {
            break;
        }
    }

    pb.finish_and_clear();
    Ok(engine)
}

fn run_realtime(engine: SimulationEngine, duration: f64, kill_at: Option<f64>) -> anyhow::Result<SimulationEngine> {
    let pb = progress_bar(duration)?;
    let mut runner = EngineRunner::new(engine);
    let mut pending_kill = kill_at;
    runner.start()?;

    loop {
        thread::sleep(Duration::from_millis(50));
        let now = runner.state().simulation_time;
        if let Some(at) = pending_kill {
            if now >= at {
                runner.kill()?;
                pending_kill = None;
            }
        }
        report_alerts(&pb, runner.drain_alerts());
        pb.set_position(now as u64);
        if now >= duration {
            break;
        }
    }

    runner.stop();
    pb.finish_and_clear();

    let shared = runner.engine();
    drop(runner);
    let engine = std::sync::Arc::try_unwrap(shared)
        .map_err(|_| anyhow::anyhow!("engine still shared after runner stopped"))?
        .into_inner();
    Ok(engine)
}

fn print_summary(engine: &SimulationEngine, duration: f64) {
    let state = engine.state();
    let spikes = engine.spike_count();
    let rate_hz = spikes as f64 / (engine.time().max(duration) / 1000.0);

    println!();
    println!("{}", "Summary".green().bold());
    println!("  Simulated time:   {:.1} ms", engine.time());
    println!("  Spikes:           {} ({:.1} Hz)", spikes, rate_hz);
    println!("  Membrane:         {:.2} mV", state.membrane_potential);
    if let Some((lo, hi)) = engine.history().channel(Channel::MembranePotential).value_range() {
        println!("  Recorded Vm:      {:.1} .. {:.1} mV", lo, hi);
    }
    println!("  Calcium:          {:.4}", state.intracellular_calcium);
    println!("  ATP:              {:.4}", state.atp_level);
    println!("  Mito stress:      {:.4} (peak {:.4})", state.mitochondrial_stress, state.peak_stress);
    println!("  Damage:           {:.4}", state.structural_damage);
    if engine.is_viable() {
        println!("  Viability:        {}", "viable".green());
    } else {
        println!("  Viability:        {}", "non-viable".red().bold());
    }
}

fn export_history(engine: &SimulationEngine, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), engine.history().samples())?;
    info!("Exported {} samples to {}", engine.history().len(), path.display());
    println!("{} {}", "Exported history to".green(), path.display());
    Ok(())
}
