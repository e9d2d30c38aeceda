//! Headless skirmish runner.
//!
//! Runs the simulation without graphics, for scripted play, external AI
//! agents and CI:
//!
//! - **Scenario loading**: blueprint data, map and settings from RON files
//! - **Interactive control**: JSON commands on stdin, responses on stdout
//! - **Batch matches**: every AI personality pairing, played in parallel
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: commands (tick, order, spawn, query, ...)
//! - **stdout**: responses, tick events and snapshots
//! - **stderr**: logs (human-readable)
//!
//! See the [`protocol`] module for the full command/response format.
//!
//! # Example
//!
//! ```bash
//! # Drive the built-in scenario interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p skirmish_headless -- interactive
//!
//! # Play a scenario to the end
//! cargo run -p skirmish_headless -- run --scenario data/scenarios/skirmish_1v1.ron
//!
//! # Check data files
//! cargo run -p skirmish_headless -- validate --data data/game_data.ron --map data/maps/skirmish_1v1.ron
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use protocol::{Command, Response};
pub use runner::{run_match, HeadlessConfig, HeadlessRunner, MatchOutcome};
pub use scenario::{Scenario, ScenarioError};
