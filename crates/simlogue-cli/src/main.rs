//! SimLogue command-line interface.

mod output;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use simlogue_core::{units, Quantity};
use simlogue_parser::parse;
use simlogue_solver::Simulator;

#[derive(Parser)]
#[command(name = "simlogue")]
#[command(about = "A time-domain analogue circuit simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Netlist file to load the circuit from
    #[arg(value_name = "circuit_file")]
    circuit_file: PathBuf,

    /// Run duration as a time value (e.g. 1_s, 500_ms, 2_min)
    #[arg(value_name = "duration")]
    duration: String,

    /// Directory for generated CSV tables
    #[arg(short = 't', long = "tables", default_value = "./tables/")]
    tables: PathBuf,

    /// Sampling rate in Hz (sets the timestep to 1/freq)
    #[arg(short = 'r', long = "samplerate", default_value_t = 44100.0)]
    samplerate: f64,

    /// Export the scope tables as CSV on exit
    #[arg(short = 'e', long = "export-tables")]
    export_tables: bool,

    /// Render the scope time series after the run
    #[arg(short = 'g', long = "show-graphs")]
    show_graphs: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let duration = match parse_duration(&cli.duration) {
        Ok(duration) => duration,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };
    if !(cli.samplerate > 0.0 && cli.samplerate.is_finite()) {
        eprintln!("argument <freq> must be a positive sampling rate");
        return ExitCode::from(2);
    }

    match run(&cli, duration) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn parse_duration(literal: &str) -> std::result::Result<f64, String> {
    let (quantity, value) = units::parse_value(literal)
        .ok_or_else(|| format!("argument duration: invalid value '{literal}'"))?;
    if quantity != Quantity::Time {
        return Err(format!(
            "argument duration has to be a time value, got a {quantity}"
        ));
    }
    if value <= 0.0 {
        return Err("argument duration must be positive".to_string());
    }
    Ok(value)
}

fn run(cli: &Cli, duration: f64) -> Result<()> {
    let source = fs::read_to_string(&cli.circuit_file)
        .with_context(|| format!("failed to read {}", cli.circuit_file.display()))?;
    let netlist = parse(&source)
        .with_context(|| format!("failed to load {}", cli.circuit_file.display()))?;

    let dt = 1.0 / cli.samplerate;
    let steps = (duration / dt) as usize;
    let mut sim = Simulator::new(netlist.circuit, dt);
    for scope in netlist.scopes {
        sim.add_scope(scope);
    }

    println!("Running for {steps} steps");
    // A mid-run solver failure still leaves every sample recorded so far
    // exportable.
    let failure = sim.run_for_steps(steps).err();

    if cli.export_tables {
        println!("Exporting tables...");
        output::export_tables(&cli.tables, sim.scopes())?;
    }
    if cli.show_graphs {
        output::show_graphs(sim.scopes());
    }

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
