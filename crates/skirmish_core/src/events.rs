//! Event feed and diagnostics produced by each tick.
//!
//! Consumers (renderers, audio, replays, the headless runner) read these
//! after the tick; the core never calls back into them.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, PlayerId};
use crate::error::OrderError;
use crate::math::Vec2Fixed;
use crate::production::{BuildingTypeId, UnitTypeId};

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A unit entered the world.
    UnitSpawned {
        /// New unit.
        id: EntityId,
        /// Owning player.
        owner: PlayerId,
        /// Blueprint.
        unit_type: UnitTypeId,
        /// Spawn position.
        position: Vec2Fixed,
    },
    /// A unit was destroyed.
    UnitDestroyed {
        /// Destroyed unit.
        id: EntityId,
        /// Owning player.
        owner: PlayerId,
        /// Final position.
        position: Vec2Fixed,
    },
    /// A building footprint was placed and construction began.
    BuildingPlaced {
        /// New building.
        id: EntityId,
        /// Owning player.
        owner: PlayerId,
        /// Blueprint.
        building_type: BuildingTypeId,
        /// Footprint center.
        position: Vec2Fixed,
    },
    /// Construction finished.
    BuildingCompleted {
        /// Building.
        id: EntityId,
        /// Owning player.
        owner: PlayerId,
        /// Blueprint.
        building_type: BuildingTypeId,
    },
    /// A building was destroyed or sold.
    BuildingDestroyed {
        /// Building.
        id: EntityId,
        /// Owning player.
        owner: PlayerId,
        /// Blueprint.
        building_type: BuildingTypeId,
        /// Footprint center.
        position: Vec2Fixed,
    },
    /// A weapon fired.
    ProjectileFired {
        /// Firing entity.
        source: EntityId,
        /// Intended victim.
        target: EntityId,
        /// Spawned projectile, `None` for instant-hit weapons.
        projectile: Option<EntityId>,
    },
    /// A hit landed.
    ProjectileImpact {
        /// Firing entity.
        source: EntityId,
        /// Impact point.
        position: Vec2Fixed,
        /// Entities damaged, ascending.
        hits: Vec<EntityId>,
        /// Total damage dealt.
        damage: u32,
    },
    /// An extraction building paid out.
    IncomeCollected {
        /// Paying building.
        building: EntityId,
        /// Receiving player.
        owner: PlayerId,
        /// Credits added.
        amount: u32,
    },
    /// A player lost all headquarters (or everything).
    PlayerDefeated {
        /// Defeated player.
        player: PlayerId,
    },
}

/// Why a production step could not proceed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exhaustion {
    /// No free cell near the producer; the item is held.
    NoSpawnCell,
    /// The producer's queue is full; the order is deferred.
    QueueFull,
}

/// A recovered error, reported for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "diagnostic", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An order failed validation and was dropped.
    OrderRejected {
        /// Issuing player.
        player: PlayerId,
        /// Reason, as displayed text.
        reason: String,
    },
    /// The spatial index referenced an entity the store no longer holds.
    SpatialInconsistency {
        /// Stale id that was purged.
        id: EntityId,
    },
    /// Production was held or deferred.
    ResourceExhausted {
        /// Producing building.
        building: EntityId,
        /// What ran out.
        reason: Exhaustion,
    },
    /// A deferred order waited too long and was dropped.
    DeferredOrderExpired {
        /// Issuing player.
        player: PlayerId,
        /// Target building.
        building: EntityId,
    },
}

impl Diagnostic {
    /// Diagnostic for a rejected order.
    #[must_use]
    pub fn rejected(player: PlayerId, error: &OrderError) -> Self {
        Self::OrderRejected {
            player,
            reason: error.to_string(),
        }
    }
}

/// Everything produced by a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick these events belong to.
    pub tick: u64,
    /// Gameplay events in emission order.
    pub events: Vec<SimEvent>,
    /// Recovered errors.
    pub diagnostics: Vec<Diagnostic>,
}

impl TickEvents {
    /// Empty event set for a tick.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// Record a gameplay event.
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Record a diagnostic.
    pub fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Check if nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.diagnostics.is_empty()
    }

    /// Ids of units spawned this tick.
    pub fn spawned_units(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::UnitSpawned { id, .. } => Some(*id),
            _ => None,
        })
    }

    /// Ids of entities destroyed this tick.
    pub fn destroyed(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::UnitDestroyed { id, .. } | SimEvent::BuildingDestroyed { id, .. } => Some(*id),
            _ => None,
        })
    }
}
