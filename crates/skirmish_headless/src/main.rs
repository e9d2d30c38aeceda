//! Headless skirmish runner.
//!
//! Runs the simulation without graphics, controlled via JSON on stdin/stdout
//! or played to completion by the built-in AI.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p skirmish_headless
//!
//! # Play a scenario until one team is left, streaming events
//! cargo run -p skirmish_headless -- run --scenario data/scenarios/skirmish_1v1.ron --events
//!
//! # Validate data and map files
//! cargo run -p skirmish_headless -- validate --data data/game_data.ron --map data/maps/skirmish_1v1.ron
//!
//! # Every AI personality against every other
//! cargo run -p skirmish_headless -- batch --output results/batch.json
//! ```
//!
//! # Output
//!
//! Protocol and results: stdout, one JSON object per line.
//! Logs: stderr, filtered by `RUST_LOG` or `--verbose`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_core::ai::Personality;
use skirmish_core::error::ConfigError;
use skirmish_headless::{
    batch::{run_batch, BatchConfig},
    protocol::Response,
    runner::{run_match, write_response, HeadlessConfig, HeadlessRunner},
    scenario::{load_game_data, load_map, Scenario, ScenarioError, DEFAULT_GAME_DATA},
};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless skirmish runner for scripted play, AI matches and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario until one team is left or the tick limit is hit
    Run {
        /// Scenario file (default: built-in 1v1)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scenario's tick limit
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Stream every tick's events as JSON lines
        #[arg(long)]
        events: bool,

        /// Print the final world snapshot
        #[arg(long)]
        state: bool,
    },

    /// Check data, map and scenario files without running them
    Validate {
        /// Blueprint data file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Map files, checked against the data file (or the built-in data)
        #[arg(short, long)]
        map: Vec<PathBuf>,

        /// Scenario files
        #[arg(short, long)]
        scenario: Vec<PathBuf>,
    },

    /// Drive a simulation with JSON commands on stdin
    Interactive {
        /// Scenario file (default: built-in 1v1)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Stream every tick's events
        #[arg(long)]
        auto_events: bool,

        /// Output state after every tick command
        #[arg(long)]
        auto_state: bool,
    },

    /// Play every pairing of AI personalities on one scenario
    Batch {
        /// Scenario file (default: built-in 1v1)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Personalities to include (default: all)
        #[arg(short = 'P', long, value_delimiter = ',', value_parser = parse_personality)]
        personalities: Vec<Personality>,

        /// Tick limit per match (default: the scenario's)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Also play mirror matches
        #[arg(long)]
        mirror: bool,

        /// Save results to this JSON file instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Failures that end the process.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{0} file(s) failed validation")]
    Invalid(usize),
}

fn parse_personality(name: &str) -> Result<Personality, String> {
    Personality::ALL
        .into_iter()
        .find(|p| format!("{p:?}").eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("unknown personality '{name}'"))
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for protocol and results
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            ticks,
            events,
            state,
        }) => cmd_run(scenario.as_deref(), ticks, events, state),
        Some(Commands::Validate { data, map, scenario }) => cmd_validate(data.as_deref(), &map, &scenario),
        Some(Commands::Interactive {
            scenario,
            auto_events,
            auto_state,
        }) => cmd_interactive(scenario.as_deref(), auto_events, auto_state),
        Some(Commands::Batch {
            scenario,
            personalities,
            ticks,
            parallel,
            mirror,
            output,
        }) => cmd_batch(scenario.as_deref(), personalities, ticks, parallel, mirror, output.as_deref()),
        // Default: interactive mode on the built-in scenario
        None => cmd_interactive(None, false, false),
    };

    if let Err(error) = result {
        tracing::error!(%error, "headless runner failed");
        std::process::exit(1);
    }
}

/// Play a scenario to completion.
fn cmd_run(scenario: Option<&Path>, ticks: Option<u64>, events: bool, state: bool) -> Result<(), CliError> {
    let scenario = Scenario::load_or_builtin(scenario)?;
    let max_ticks = ticks.unwrap_or(scenario.max_ticks);
    tracing::info!(scenario = %scenario.name, max_ticks, "running scenario");

    let mut sim = scenario.simulation()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut write_error = None;
    let outcome = run_match(&mut sim, max_ticks, |tick| {
        if events && write_error.is_none() {
            if let Err(e) = write_response(&mut out, &Response::from(tick)) {
                write_error = Some(e);
            }
        }
    });
    if let Some(e) = write_error {
        return Err(e.into());
    }

    write_response(
        &mut out,
        &Response::GameOver {
            tick: outcome.ticks,
            winner: outcome.winner,
        },
    )?;
    if state {
        write_response(&mut out, &Response::State { snapshot: sim.snapshot() })?;
    }
    write_response(
        &mut out,
        &Response::Hash {
            tick: outcome.ticks,
            hash: outcome.hash,
        },
    )?;
    out.flush()?;
    Ok(())
}

/// Validate files, reporting every failure before giving up.
fn cmd_validate(data: Option<&Path>, maps: &[PathBuf], scenarios: &[PathBuf]) -> Result<(), CliError> {
    let mut failures = 0;
    let game_data = match data {
        Some(path) => match load_game_data(path) {
            Ok(parsed) => {
                tracing::info!(path = %path.display(), units = parsed.units.len(), buildings = parsed.buildings.len(), "data ok");
                Some(parsed)
            }
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "invalid data");
                failures += 1;
                None
            }
        },
        None => Some(skirmish_core::data::GameData::from_ron_str(DEFAULT_GAME_DATA)?),
    };

    for path in maps {
        let checked = load_map(path).map_err(CliError::from).and_then(|map| {
            if let Some(data) = &game_data {
                data.validate_map(&map)?;
            }
            Ok(map)
        });
        match checked {
            Ok(map) => tracing::info!(path = %path.display(), map = %map.name, "map ok"),
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "invalid map");
                failures += 1;
            }
        }
    }

    for path in scenarios {
        let checked = Scenario::load(path).map_err(CliError::from).and_then(|scenario| {
            scenario.simulation()?;
            Ok(scenario)
        });
        match checked {
            Ok(scenario) => tracing::info!(path = %path.display(), scenario = %scenario.name, "scenario ok"),
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "invalid scenario");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(CliError::Invalid(failures));
    }
    Ok(())
}

/// Run an interactive JSON-lines session.
fn cmd_interactive(scenario: Option<&Path>, auto_events: bool, auto_state: bool) -> Result<(), CliError> {
    tracing::info!("Starting interactive session");
    let scenario = Scenario::load_or_builtin(scenario)?;
    let config = HeadlessConfig {
        emit_events: auto_events,
        emit_state: auto_state,
    };
    let mut runner = HeadlessRunner::new(scenario.simulation()?, config);
    runner.run(io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}

/// Play every personality pairing and report the tallies.
fn cmd_batch(
    scenario: Option<&Path>,
    personalities: Vec<Personality>,
    ticks: Option<u64>,
    parallel: usize,
    mirror: bool,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let scenario = Scenario::load_or_builtin(scenario)?;
    let defaults = BatchConfig::default();
    let config = BatchConfig {
        personalities: if personalities.is_empty() {
            defaults.personalities
        } else {
            personalities
        },
        max_ticks: ticks.unwrap_or(scenario.max_ticks),
        parallel_games: parallel,
        mirror_matches: mirror,
    };

    let results = run_batch(&scenario, &config)?;

    match output {
        Some(path) => {
            results.save(path)?;
            tracing::info!(path = %path.display(), "results saved");
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer(&mut out, &results).map_err(io::Error::from)?;
            writeln!(out)?;
        }
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE: {} matches in {:.1}s", results.matches.len(), results.duration_seconds);
    eprintln!("{}", "=".repeat(50));
    for record in &results.records {
        eprintln!(
            "{:<12} {:>3} W {:>3} L {:>3} D",
            format!("{:?}", record.personality),
            record.wins,
            record.losses,
            record.draws
        );
    }
    if !results.errors.is_empty() {
        eprintln!("Failed matches: {}", results.errors.len());
    }
    Ok(())
}
