//! Background Simulation Runner
//!
//! Loads a saved vessel, steps it through its changepoints and prints the
//! schedule with final resource totals.

use std::path::PathBuf;
use std::process;

use background_resources::behaviour::BehaviourRegistry;
use background_resources::core::config::SolverConfig;
use background_resources::persistence::load_file;
use background_resources::processor::{ResourceState, Simulator};
use clap::Parser;
use serde::Serialize;

/// Background Simulation Runner - look ahead on an unloaded vessel
#[derive(Parser, Debug)]
#[command(name = "background_sim")]
#[command(about = "Step a saved vessel through its resource changepoints")]
struct Args {
    /// Vessel file containing a BACKGROUND_PROCESSOR block
    vessel: PathBuf,

    /// Solver config (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop at this absolute time instead of running to the horizon
    #[arg(long)]
    until: Option<f64>,

    /// Override the config's iteration limit
    #[arg(long)]
    max_steps: Option<usize>,

    /// Output format: json or text
    #[arg(long, default_value = "text")]
    format: String,

    /// Print resource totals after every step
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct StepRecord {
    time: f64,
    resources: Vec<ResourceState>,
}

/// JSON output structure
#[derive(Serialize)]
struct SimulationReport {
    start_time: f64,
    end_time: f64,
    steps: Vec<StepRecord>,
    hit_limit: bool,
    warnings: Vec<String>,
    fault: Option<String>,
    resources: Vec<ResourceState>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(report) => print_report(&report, &args),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SolverConfig::load(path)?,
        None => SolverConfig::default(),
    };
    if let Some(limit) = args.max_steps {
        config = config.with_iteration_limit(limit);
        config.validate()?;
    }

    let registry = BehaviourRegistry::with_defaults();
    let loaded = load_file(&args.vessel, &registry, config)?;
    let warnings: Vec<String> = loaded.warnings.iter().map(|w| w.to_string()).collect();

    let mut simulator = Simulator::new(&loaded.processor);
    let start_time = simulator.current_time();
    let mut steps = Vec::new();
    let mut fault = None;

    match args.until {
        Some(until) => {
            simulator.run_until(until)?;
            steps.push(StepRecord {
                time: simulator.current_time(),
                resources: simulator.processor().resource_states(),
            });
        }
        None => loop {
            match simulator.step() {
                Ok(true) => steps.push(StepRecord {
                    time: simulator.current_time(),
                    resources: if args.verbose {
                        simulator.processor().resource_states()
                    } else {
                        Vec::new()
                    },
                }),
                Ok(false) => break,
                Err(e) => {
                    fault = Some(e.to_string());
                    break;
                }
            }
        },
    }

    Ok(SimulationReport {
        start_time,
        end_time: simulator.current_time(),
        steps,
        hit_limit: simulator.hit_limit(),
        warnings,
        fault,
        resources: simulator.processor().resource_states(),
    })
}

fn print_text(report: &SimulationReport, verbose: bool) {
    println!("Background Simulation");
    println!("=====================");
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    println!("Start: {}", report.start_time);
    for (i, step) in report.steps.iter().enumerate() {
        println!("Changepoint {:>3}: t = {}", i + 1, step.time);
        if verbose {
            for state in &step.resources {
                println!(
                    "    {:<20} {:>14.4} / {:<14.4} ({:+.6}/s)",
                    state.resource.as_str(),
                    state.amount,
                    state.max_amount,
                    state.rate
                );
            }
        }
    }
    println!("End: {}", report.end_time);
    if report.hit_limit {
        println!("Stopped at the iteration limit");
    }
    if let Some(fault) = &report.fault {
        println!("Fault: {}", fault);
    }
    println!();
    println!("Final resources:");
    for state in &report.resources {
        println!(
            "  {:<20} {:>14.4} / {:<14.4} ({:+.6}/s)",
            state.resource.as_str(),
            state.amount,
            state.max_amount,
            state.rate
        );
    }
}

fn print_report(report: &SimulationReport, args: &Args) {
    match args.format.as_str() {
        "json" => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize report: {}", e),
        },
        "text" => print_text(report, args.verbose),
        _ => {
            eprintln!("Unknown format '{}', defaulting to text", args.format);
            print_text(report, args.verbose);
        }
    }
}
