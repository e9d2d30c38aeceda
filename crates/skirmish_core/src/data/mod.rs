//! Data-driven definitions loaded from RON.
//!
//! This module contains pure data structures for blueprints and maps plus
//! their validation. It performs no IO; file loading is handled by
//! `skirmish_headless`.

mod building_data;
mod game_data;
mod map_data;
mod unit_data;

pub use building_data::{BuildingData, IncomeData};
pub use game_data::{income_for, GameData};
pub use map_data::{MapDefinition, PlayerSetup, StartEntity};
pub use unit_data::UnitData;
