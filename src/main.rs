use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand_core::SeedableRng;
use tracing_subscriber::EnvFilter;

use xs128p::config::{Capture, SolverConfig, DEFAULT_TIMEOUT_MS};
use xs128p::convention::EngineFamily;
use xs128p::error::Error;
use xs128p::reverse_rng;
use xs128p::rng::{GeneratorState, Xorshift128Plus};
use xs128p::verification;

#[derive(Parser)]
#[command(name = "xs128p")]
#[command(about = "Recover xorshift128+ state from Math.random() output and predict what comes next")]
struct Cli {
    /// Log solver progress (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recover the state behind a capture and print predictions
    Predict {
        /// chrome, firefox or safari
        #[arg(short, long)]
        engine: Option<EngineFamily>,

        /// JSON capture file ({"engine": ..., "samples": [...]})
        #[arg(short, long)]
        capture: Option<PathBuf>,

        /// Observed values, in the order Math.random() returned them
        samples: Vec<f64>,

        /// How many values to predict
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Solver timeout in milliseconds, 0 for none
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Simulate what an engine serves from a known state
    Generate {
        #[arg(short, long)]
        engine: EngineFamily,

        /// First state word; with --state1, overrides --seed
        #[arg(long, value_parser = parse_word, requires = "state1")]
        state0: Option<u64>,

        #[arg(long, value_parser = parse_word, requires = "state0")]
        state1: Option<u64>,

        /// Expand a 64-bit seed into a generator state
        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,

        /// Write a capture file instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check the inverse step and symbolic encoding on random states
    Verify {
        #[arg(long, default_value_t = 1_000_000)]
        states: usize,
    },
}

fn parse_word(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid 64-bit word '{}': {}", s, e))
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Predict { engine, capture, samples, count, timeout_ms, json } => {
            let capture = match capture {
                Some(path) => {
                    let mut loaded = Capture::load(&path)?;
                    if let Some(engine) = engine {
                        loaded.engine = engine;
                    }
                    if !samples.is_empty() {
                        loaded.samples = samples;
                    }
                    loaded
                }
                None => {
                    let engine =
                        engine.ok_or_else(|| Error::from("--engine is required without --capture".to_string()))?;
                    Capture::from_samples(engine, samples)?
                }
            };
            let config = SolverConfig {
                timeout_ms: if timeout_ms == 0 { None } else { Some(timeout_ms) },
            };

            let report = reverse_rng::run(&capture, count, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Engine: {}", report.engine);
                println!("Observed: {:?}", report.samples);
                match report.recovered_state {
                    Some(state) => {
                        println!("Recovered state: {}", state);
                        for (i, p) in report.predictions.iter().enumerate() {
                            println!("  {:>3}: {}", i + 1, p);
                        }
                    }
                    None => println!("No generator state matches these samples"),
                }
            }
        }
        Command::Generate { engine, state0, state1, seed, count, output } => {
            let seed = match (state0, state1) {
                (Some(state0), Some(state1)) => GeneratorState::new(state0, state1),
                _ => Xorshift128Plus::seed_from_u64(seed.unwrap_or_else(|| rand::random())).state(),
            };
            tracing::info!(%seed, %engine, "simulating engine output");
            let capture = Capture {
                engine,
                samples: engine.convention().served_sequence(seed, count),
            };
            match output {
                Some(path) => {
                    capture.save(&path)?;
                    println!("Wrote {} samples to {}", count, path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&capture)?),
            }
        }
        Command::Verify { states } => {
            let report = verification::verify_random_states(states);
            println!("Checked {} states", report.checked);
            if report.passed() {
                println!("backward(forward(s)) == s and symbolic step matches concrete step");
            } else {
                for state in &report.inverse_failures {
                    println!("  inverse mismatch at {}", state);
                }
                for state in &report.encoding_failures {
                    println!("  encoding mismatch at {}", state);
                }
                return Err(Error::from(format!(
                    "{} inverse and {} encoding mismatches",
                    report.inverse_failures.len(),
                    report.encoding_failures.len()
                )));
            }
        }
    }

    Ok(())
}
