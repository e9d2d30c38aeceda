//! JSON protocol for headless control.
//!
//! The runner speaks JSON lines (one JSON object per line):
//!
//! **Input (stdin):** commands from a controller script or external AI
//! **Output (stdout):** responses, tick events and snapshots
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready",...}`
//! 2. Controller sends commands as JSON lines
//! 3. Every tick's events are streamed when event output is on
//! 4. When one team is left, outputs `{"type":"game_over",...}` once
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"0.1.0","tick":0,"players":2}
//! -> {"cmd":"order","player":0,"kind":{"order":"produce","building":1,"item":"barracks"}}
//! <- {"type":"ack","cmd":"order"}
//! -> {"cmd":"tick","count":20}
//! <- {"type":"events","tick":1,"events":[...],"diagnostics":[]}
//! <- {"type":"ack","cmd":"tick"}
//! -> {"cmd":"query"}
//! <- {"type":"state","snapshot":{"tick":20,"entities":[...],"players":[...]}}
//! ```

use serde::{Deserialize, Serialize};
use skirmish_core::components::{EntityId, PlayerId, TeamId};
use skirmish_core::events::{Diagnostic, SimEvent, TickEvents};
use skirmish_core::orders::{OrderKind, PlayerOrder};
use skirmish_core::snapshot::WorldSnapshot;

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands accepted by the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the simulation by N ticks (default: 1).
    Tick {
        /// Ticks to run.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Submit a player order. It takes effect on the next tick.
    Order {
        /// Issuing player.
        player: PlayerId,
        /// The order itself.
        kind: OrderKind,
    },

    /// Spawn a unit at a world position.
    Spawn {
        /// Owning player.
        player: PlayerId,
        /// Unit blueprint id.
        blueprint: String,
        /// World X.
        x: f64,
        /// World Y.
        y: f64,
    },

    /// Place a finished building with its top-left corner on a cell.
    Place {
        /// Owning player.
        player: PlayerId,
        /// Building blueprint id.
        blueprint: String,
        /// Cell column.
        cell_x: u32,
        /// Cell row.
        cell_y: u32,
    },

    /// Destroy an entity at the end of the next tick.
    Remove {
        /// Entity to destroy.
        entity: EntityId,
    },

    /// Output the current world snapshot without advancing time.
    Query,

    /// Output the state hash for determinism checks.
    Hash,

    /// Stop the runner.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

impl Command {
    /// Command name as it appears in the `cmd` tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Order { .. } => "order",
            Self::Spawn { .. } => "spawn",
            Self::Place { .. } => "place",
            Self::Remove { .. } => "remove",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }

    /// Wrap a player order.
    #[must_use]
    pub fn order(order: PlayerOrder) -> Self {
        Self::Order {
            player: order.player,
            kind: order.kind,
        }
    }
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses written by the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Runner version.
        version: String,
        /// Current tick.
        tick: u64,
        /// Player slots in the match.
        players: usize,
    },

    /// Acknowledgment of a command.
    Ack {
        /// Name of the acknowledged command.
        cmd: String,
    },

    /// An entity was created by a `spawn` or `place` command.
    Spawned {
        /// New entity id.
        entity: EntityId,
        /// Blueprint it was built from.
        blueprint: String,
    },

    /// Everything that happened during one tick.
    Events {
        /// Tick the events belong to.
        tick: u64,
        /// Gameplay events.
        events: Vec<SimEvent>,
        /// Recovered errors (rejected orders, exhausted spawn space, ...).
        diagnostics: Vec<Diagnostic>,
    },

    /// Full world snapshot.
    State {
        /// The snapshot.
        snapshot: WorldSnapshot,
    },

    /// Deterministic state hash.
    Hash {
        /// Tick the hash was taken after.
        tick: u64,
        /// Hash value.
        hash: u64,
    },

    /// The match has a winner, or ran out of ticks.
    GameOver {
        /// Final tick.
        tick: u64,
        /// Winning team, if any.
        winner: Option<TeamId>,
    },

    /// A command failed.
    Error {
        /// What went wrong.
        message: String,
    },
}

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Acknowledge a command.
    #[must_use]
    pub fn ack(command: &Command) -> Self {
        Self::Ack {
            cmd: command.name().to_string(),
        }
    }
}

impl From<TickEvents> for Response {
    fn from(events: TickEvents) -> Self {
        Self::Events {
            tick: events.tick,
            events: events.events,
            diagnostics: events.diagnostics,
        }
    }
}
