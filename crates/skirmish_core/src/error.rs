//! Error types for the game simulation.
//!
//! Only [`ConfigError`] is fatal, and only before the simulation starts.
//! Everything raised mid-tick ([`OrderError`], spatial inconsistencies,
//! resource exhaustion) is recovered locally and reported as a
//! [`Diagnostic`](crate::events::Diagnostic).

use thiserror::Error;

use crate::components::EntityId;
use crate::math::Fixed;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// A player order could not be applied.
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),

    /// Data or map definitions are malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

/// Reasons a player order is rejected at intake.
///
/// Rejected orders are dropped; the issuing player simply sees nothing happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The referenced entity does not exist (or is already destroyed).
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),

    /// The referenced entity belongs to another player.
    #[error("entity {entity} is not owned by player {player}")]
    NotOwned {
        /// Entity the order referenced.
        entity: EntityId,
        /// Player who issued the order.
        player: u8,
    },

    /// The entity cannot carry out this kind of order.
    #[error("entity {0} cannot perform this order")]
    WrongEntityKind(EntityId),

    /// The player is not in the game (defeated or out of range).
    #[error("player {0} cannot issue orders")]
    InactivePlayer(u8),

    /// Not enough credits at enqueue time.
    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits {
        /// Cost of the requested item.
        required: u32,
        /// Credits the player had.
        available: u32,
    },

    /// The building cannot produce the requested item.
    #[error("building {building} cannot produce {item}")]
    CannotProduce {
        /// Producing building.
        building: EntityId,
        /// Requested blueprint id.
        item: String,
    },

    /// The building is still under construction.
    #[error("building {0} is not operational")]
    NotOperational(EntityId),

    /// The blueprint id is not registered.
    #[error("unknown blueprint '{0}'")]
    UnknownBlueprint(String),

    /// Production queue index out of range.
    #[error("no production item at index {index} in building {building}")]
    NoSuchQueueItem {
        /// Producing building.
        building: EntityId,
        /// Requested index.
        index: usize,
    },

    /// A target may not be attacked by this player.
    #[error("entity {0} is not a hostile target")]
    NotHostile(EntityId),

    /// The order lists no units.
    #[error("order has no units")]
    EmptySelection,

    /// A destination or rally point lies outside the map.
    #[error("point ({x}, {y}) is outside the map")]
    OffMap {
        /// Requested x.
        x: Fixed,
        /// Requested y.
        y: Fixed,
    },
}

/// Load-time configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// RON parsing failed.
    #[error("Failed to parse {what}: {source}")]
    Parse {
        /// Which document failed.
        what: &'static str,
        /// Parser error.
        #[source]
        source: ron::error::SpannedError,
    },

    /// A value is outside its allowed range.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Offending field.
        field: String,
        /// Explanation.
        message: String,
    },

    /// A reference to a blueprint that does not exist.
    #[error("Unknown blueprint '{id}' referenced by {referenced_by}")]
    UnknownBlueprint {
        /// Missing blueprint id.
        id: String,
        /// Where it was referenced.
        referenced_by: String,
    },

    /// Duplicate blueprint id.
    #[error("Duplicate blueprint id '{0}'")]
    DuplicateBlueprint(String),

    /// A player index outside `0..MAX_PLAYERS` or duplicated.
    #[error("Invalid player setup: {0}")]
    InvalidPlayer(String),

    /// Terrain grid dimensions do not match the map header.
    #[error("Terrain grid is {actual} cells, expected {expected}")]
    TerrainSize {
        /// Expected number of cells.
        expected: usize,
        /// Cells found.
        actual: usize,
    },

    /// A start-manifest entity is placed on impassable or out-of-map ground.
    #[error("Start entity '{id}' for player {player} is placed off-map or on blocked terrain")]
    BadPlacement {
        /// Blueprint id.
        id: String,
        /// Owning player.
        player: u8,
    },
}
