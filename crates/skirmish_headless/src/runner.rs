//! Headless runner: drives a [`Simulation`] from JSON-lines commands, or
//! runs a match to completion without input.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use skirmish_core::components::TeamId;
use skirmish_core::events::TickEvents;
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::orders::PlayerOrder;
use skirmish_core::simulation::Simulation;
use skirmish_core::snapshot::PlayerSnapshot;
use tracing::{debug, info, warn};

use crate::protocol::{Command, Response};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Stream every tick's events.
    pub emit_events: bool,
    /// Output a snapshot after every `tick` command (vs only on `query`).
    pub emit_state: bool,
}

/// Interactive runner over one simulation.
#[derive(Debug)]
pub struct HeadlessRunner {
    sim: Simulation,
    config: HeadlessConfig,
    game_over: bool,
}

impl HeadlessRunner {
    /// Wrap a simulation.
    #[must_use]
    pub fn new(sim: Simulation, config: HeadlessConfig) -> Self {
        Self {
            sim,
            config,
            game_over: false,
        }
    }

    /// The simulation being driven.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Greeting sent before any command is read.
    #[must_use]
    pub fn ready(&self) -> Response {
        Response::Ready {
            version: env!("CARGO_PKG_VERSION").to_string(),
            tick: self.sim.tick_count(),
            players: self.sim.players().len(),
        }
    }

    /// Execute one command.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        let ack = Response::ack(&command);
        match command {
            Command::Tick { count } => {
                let mut responses = self.advance(count);
                responses.push(ack);
                responses
            }
            Command::Order { player, kind } => {
                self.sim.submit(PlayerOrder::new(player, kind));
                vec![ack]
            }
            Command::Spawn { player, blueprint, x, y } => {
                let (Some(x), Some(y)) = (Fixed::checked_from_num(x), Fixed::checked_from_num(y)) else {
                    return vec![Response::error(format!("position ({x}, {y}) is out of range"))];
                };
                let spawned = self.sim.spawn_unit(player, &blueprint, Vec2Fixed::new(x, y));
                vec![match spawned {
                    Ok(entity) => Response::Spawned { entity, blueprint },
                    Err(e) => Response::error(e.to_string()),
                }]
            }
            Command::Place {
                player,
                blueprint,
                cell_x,
                cell_y,
            } => {
                let placed = self.sim.place_building(player, &blueprint, (cell_x, cell_y));
                vec![match placed {
                    Ok(entity) => Response::Spawned { entity, blueprint },
                    Err(e) => Response::error(e.to_string()),
                }]
            }
            Command::Remove { entity } => match self.sim.despawn(entity) {
                Ok(()) => vec![ack],
                Err(e) => vec![Response::error(e.to_string())],
            },
            Command::Query => vec![Response::State {
                snapshot: self.sim.snapshot(),
            }],
            Command::Hash => vec![Response::Hash {
                tick: self.sim.tick_count(),
                hash: self.sim.state_hash(),
            }],
            Command::Quit => vec![ack],
        }
    }

    /// Parse and execute one input line.
    pub fn handle_line(&mut self, line: &str) -> Vec<Response> {
        match serde_json::from_str::<Command>(line) {
            Ok(command) => self.handle(command),
            Err(e) => vec![unreadable(&e)],
        }
    }

    fn advance(&mut self, count: u32) -> Vec<Response> {
        let mut responses = Vec::new();
        for _ in 0..count {
            let events = self.sim.tick();
            if self.config.emit_events {
                responses.push(events.into());
            }
            if !self.game_over {
                if let Some(winner) = self.sim.winner() {
                    self.game_over = true;
                    info!(tick = self.sim.tick_count(), winner, "game over");
                    responses.push(Response::GameOver {
                        tick: self.sim.tick_count(),
                        winner: Some(winner),
                    });
                }
            }
        }
        if self.config.emit_state {
            responses.push(Response::State {
                snapshot: self.sim.snapshot(),
            });
        }
        responses
    }

    /// Read commands from `input` until `quit` or end of input, writing
    /// responses to `output`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        write_response(&mut output, &self.ready())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!(command = line, "received");
            let command = serde_json::from_str::<Command>(line);
            let quit = matches!(command, Ok(Command::Quit));
            let responses = match command {
                Ok(command) => self.handle(command),
                Err(e) => vec![unreadable(&e)],
            };
            for response in responses {
                write_response(&mut output, &response)?;
            }
            output.flush()?;
            if quit {
                break;
            }
        }
        Ok(())
    }
}

fn unreadable(error: &serde_json::Error) -> Response {
    warn!(%error, "unreadable command");
    Response::error(format!("invalid command: {error}"))
}

/// Write one response as a JSON line.
pub fn write_response<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    serde_json::to_writer(&mut *output, response)?;
    writeln!(output)
}

/// How a non-interactive match ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Ticks run.
    pub ticks: u64,
    /// Winning team, or `None` if the tick limit was hit first.
    pub winner: Option<TeamId>,
    /// Final state hash.
    pub hash: u64,
    /// Final player states.
    pub players: Vec<PlayerSnapshot>,
}

/// Tick `sim` until one team is left or `max_ticks` is reached, handing
/// every tick's events to `on_tick`.
pub fn run_match(sim: &mut Simulation, max_ticks: u64, mut on_tick: impl FnMut(TickEvents)) -> MatchOutcome {
    while sim.tick_count() < max_ticks && sim.winner().is_none() {
        on_tick(sim.tick());
    }
    let outcome = MatchOutcome {
        ticks: sim.tick_count(),
        winner: sim.winner(),
        hash: sim.state_hash(),
        players: sim.snapshot().players,
    };
    info!(ticks = outcome.ticks, winner = ?outcome.winner, "match finished");
    outcome
}
