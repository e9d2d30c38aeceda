//! # Skirmish Core
//!
//! Deterministic simulation core for a real-time strategy skirmish.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No file or network IO
//! - No system randomness
//! - No floating-point math in game state (uses fixed-point)
//!
//! This separation enables:
//! - Headless batch and interactive runners
//! - Replays and determinism testing
//! - Parallel movement planning that cannot change the outcome
//!
//! ## Crate Structure
//!
//! - [`simulation`] - Tick scheduler and the public facade
//! - [`store`] / [`spatial`] - Entity arena and the uniform-grid index
//! - [`movement`] / [`combat`] - Parallel movement, targeting and damage
//! - [`production`] / [`economy`] - Queues, credits and power
//! - [`ai`] - Personality-driven computer players
//! - [`orders`] / [`events`] / [`snapshot`] - Input and output surfaces
//! - [`data`] - RON blueprint and map definitions
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod clock;
pub mod combat;
pub mod components;
pub mod config;
mod construction;
pub mod data;
pub mod economy;
pub mod error;
pub mod events;
pub mod math;
pub mod movement;
pub mod orders;
pub mod production;
pub mod simulation;
pub mod snapshot;
pub mod spatial;
pub mod store;
pub mod terrain;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{AiState, Personality, PersonalityProfile};
    pub use crate::clock::TickClock;
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::data::{GameData, MapDefinition};
    pub use crate::economy::{Controller, Player};
    pub use crate::error::{ConfigError, GameError, OrderError, Result};
    pub use crate::events::{Diagnostic, SimEvent, TickEvents};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::orders::{OrderKind, OrderSender, PlayerOrder};
    pub use crate::production::{
        BlueprintRegistry, BuildingBlueprint, BuildingTypeId, ProductionItem, ProductionKind,
        ProductionQueue, UnitBlueprint, UnitTypeId,
    };
    pub use crate::simulation::Simulation;
    pub use crate::snapshot::WorldSnapshot;
}
