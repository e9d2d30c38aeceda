//! Read-only per-tick world state for renderers, UIs and tools.

use serde::{Deserialize, Serialize};

use crate::ai::AiState;
use crate::components::{BuildingState, Entity, EntityClass, EntityId, EntityKind, Order, PlayerId};
use crate::economy::Player;
use crate::math::Vec2Fixed;
use crate::production::BlueprintRegistry;
use crate::store::EntityStore;

/// One entity as seen from outside the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Owning player.
    pub owner: PlayerId,
    /// Unit, building or projectile.
    pub class: EntityClass,
    /// Blueprint name (empty for projectiles).
    pub type_name: String,
    /// World position.
    pub position: Vec2Fixed,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
    /// Standing order, for units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    /// Construction percentage, for buildings not yet active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construction: Option<u32>,
    /// Queued items, for buildings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<usize>,
}

impl EntitySnapshot {
    fn capture(entity: &Entity, registry: &BlueprintRegistry) -> Self {
        let (type_name, order, construction, queue) = match &entity.kind {
            EntityKind::Unit(unit) => (
                registry
                    .unit(unit.unit_type)
                    .map(|bp| bp.name.clone())
                    .unwrap_or_default(),
                Some(unit.order),
                None,
                None,
            ),
            EntityKind::Building(building) => (
                registry
                    .building(building.building_type)
                    .map(|bp| bp.name.clone())
                    .unwrap_or_default(),
                None,
                matches!(building.state, BuildingState::UnderConstruction { .. })
                    .then(|| building.construction_percentage()),
                Some(building.queue.len()),
            ),
            EntityKind::Projectile(_) => (String::new(), None, None, None),
        };

        Self {
            id: entity.id,
            owner: entity.owner,
            class: entity.class(),
            type_name,
            position: entity.position,
            health: entity.health.current,
            max_health: entity.health.max,
            order,
            construction,
            queue,
        }
    }
}

/// One player's public state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player id.
    pub id: PlayerId,
    /// Team.
    pub team: u8,
    /// Credits.
    pub credits: u32,
    /// Power produced.
    pub power_produced: u32,
    /// Power consumed.
    pub power_consumed: u32,
    /// Whether the player is out.
    pub defeated: bool,
    /// AI state, for AI players.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_state: Option<AiState>,
}

/// Everything observable after a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Tick the snapshot was taken after.
    pub tick: u64,
    /// Live entities, by ascending id.
    pub entities: Vec<EntitySnapshot>,
    /// Players, by id.
    pub players: Vec<PlayerSnapshot>,
}

impl WorldSnapshot {
    /// Capture the store and players. Entities awaiting removal are skipped.
    #[must_use]
    pub fn capture(
        tick: u64,
        store: &EntityStore,
        players: &[Player],
        registry: &BlueprintRegistry,
        ai_states: impl Fn(PlayerId) -> Option<AiState>,
    ) -> Self {
        let entities = store
            .iter()
            .filter(|e| !store.is_marked(e.id))
            .map(|e| EntitySnapshot::capture(e, registry))
            .collect();
        let players = players
            .iter()
            .map(|p| PlayerSnapshot {
                id: p.id,
                team: p.team,
                credits: p.credits,
                power_produced: p.power_produced,
                power_consumed: p.power_consumed,
                defeated: p.defeated,
                ai_state: ai_states(p.id),
            })
            .collect();
        Self {
            tick,
            entities,
            players,
        }
    }

    /// Look up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|index| &self.entities[index])
    }

    /// Entities owned by a player.
    pub fn owned_by(&self, player: PlayerId) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities.iter().filter(move |e| e.owner == player)
    }
}
