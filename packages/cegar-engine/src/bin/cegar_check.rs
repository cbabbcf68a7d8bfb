//! cegar-check: predicate-abstraction verifier CLI
//!
//! # Usage
//!
//! ```bash
//! # Check the reach-error property of a program
//! cargo run --bin cegar-check --release -- verify program.json
//!
//! # Thorough preset, JSON report, ARG dump
//! cargo run --bin cegar-check --release -- verify program.json --preset thorough \
//!     --format json --arg-dot arg.dot
//!
//! # Ranged analysis, writing what is left when a budget runs out
//! cargo run --bin cegar-check --release -- verify program.json \
//!     --range "[(main::x=0), (main::x=100)]" --path-range-output rest.txt
//! ```
//!
//! Exit codes: 0 SAFE, 1 UNSAFE, 2 UNKNOWN, 3 error.

use cegar_engine::config::{EngineConfig, Preset, ValidatedConfig};
use cegar_engine::features::arg::to_dot;
use cegar_engine::features::range::{load_range, save_range, RangeInterval};
use cegar_engine::{CegarDriver, VerificationOutcome, VerificationTask};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cegar-check")]
#[command(about = "CEGAR verifier over bit-vector control-flow automata", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a program (JSON CFA plus optional property automata)
    Verify {
        /// Program file
        program: PathBuf,

        /// YAML configuration (schema v1)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Preset used when no configuration file is given
        #[arg(short, long, default_value = "balanced")]
        preset: String,

        /// Input range, e.g. "[(main::x=0), null]"
        #[arg(long, conflicts_with = "range_file")]
        range: Option<String>,

        /// File holding the input range
        #[arg(long)]
        range_file: Option<PathBuf>,

        /// Where to write the remaining range when a budget runs out
        #[arg(long)]
        path_range_output: Option<PathBuf>,

        /// Write the final ARG as DOT
        #[arg(long)]
        arg_dot: Option<PathBuf>,

        /// Write the final precision as JSON
        #[arg(long)]
        precision_output: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

struct VerifyArgs {
    program: PathBuf,
    config: Option<PathBuf>,
    preset: String,
    range: Option<String>,
    range_file: Option<PathBuf>,
    path_range_output: Option<PathBuf>,
    arg_dot: Option<PathBuf>,
    precision_output: Option<PathBuf>,
    format: Format,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    verdict: &'a cegar_engine::Verdict,
    statistics: &'a cegar_engine::CegarStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_range: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Verify {
            program,
            config,
            preset,
            range,
            range_file,
            path_range_output,
            arg_dot,
            precision_output,
            format,
        } => verify(VerifyArgs {
            program,
            config,
            preset,
            range,
            range_file,
            path_range_output,
            arg_dot,
            precision_output,
            format,
        }),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{}", err);
            eprintln!("error: {}", err);
            ExitCode::from(3)
        }
    }
}

fn verify(args: VerifyArgs) -> Result<u8, Box<dyn std::error::Error>> {
    let config = load_config(args.config.as_ref(), &args.preset)?;
    let task = VerificationTask::from_json_file(&args.program)?;
    info!(program = %args.program.display(), automata = task.automata.len(), "program loaded");

    let range = match (&args.range, &args.range_file) {
        (Some(text), _) => Some(RangeInterval::parse(text)?),
        (None, Some(path)) => Some(load_range(path)?),
        (None, None) => None,
    };

    let mut driver = CegarDriver::new(task.cfa, task.automata, config)?;
    if let Some(range) = range {
        driver = driver.with_range(range);
    }
    let outcome = driver.run()?;

    if let Some(path) = &args.arg_dot {
        std::fs::write(path, to_dot(&outcome.arg, driver.cfa(), driver.product()))?;
    }
    if let Some(path) = &args.precision_output {
        std::fs::write(path, serde_json::to_string_pretty(&outcome.precision)?)?;
    }
    if let (Some(path), Some(range)) = (&args.path_range_output, &outcome.remaining_range) {
        save_range(path, range)?;
    }

    report(&outcome, args.format)?;
    Ok(outcome.verdict.exit_code() as u8)
}

fn load_config(
    path: Option<&PathBuf>,
    preset: &str,
) -> Result<ValidatedConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(EngineConfig::from_yaml(path)?),
        None => {
            let preset: Preset = preset.parse()?;
            Ok(EngineConfig::preset(preset).build()?)
        }
    }
}

fn report(outcome: &VerificationOutcome, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        Format::Text => {
            println!("Verdict: {}", outcome.verdict);
            if let Some(witness) = outcome.verdict.witness() {
                println!("\nCounterexample:");
                for step in &witness.steps {
                    println!("  {} -> {}: {}", step.source, step.target, step.operation);
                }
                println!("Inputs:");
                for (name, value) in witness.inputs() {
                    println!("  {} = {}", name, value);
                }
                if let Some(valid) = witness.validated {
                    println!("Replay: {}", if valid { "confirmed" } else { "MISMATCH" });
                }
            }
            if let Some(range) = &outcome.remaining_range {
                println!("\nRemaining range: {}", range);
            }
            println!("\n{}", outcome.statistics);
        }
        Format::Json => {
            let report = JsonReport {
                verdict: &outcome.verdict,
                statistics: &outcome.statistics,
                remaining_range: outcome.remaining_range.as_ref().map(|r| r.to_string()),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
