//! Blueprints, production queues and the reservation model.
//!
//! Credits are deducted when an item is enqueued, never when it completes,
//! so a player can never start more production than they can pay for.
//! Progress per tick is scaled by the owner's power ratio.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, Footprint, UnitClass, WeaponSpec};
use crate::economy::Player;
use crate::error::OrderError;
use crate::math::{fixed_serde, Fixed};

/// Interned identifier for unit blueprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(pub u16);

/// Interned identifier for building blueprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u16);

/// Something a building can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductionKind {
    /// A unit, spawned next to the producer.
    Unit(UnitTypeId),
    /// A building, placed near the producer.
    Building(BuildingTypeId),
}

/// Compiled unit blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitBlueprint {
    /// Interned id.
    pub id: UnitTypeId,
    /// Data-file name, e.g. `"infantry"`.
    pub name: String,
    /// Credit cost.
    pub cost: u32,
    /// Production time in ticks.
    pub build_time: u32,
    /// Maximum health.
    pub health: u32,
    /// Movement class.
    pub class: UnitClass,
    /// Speed in world units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Sight radius.
    #[serde(with = "fixed_serde")]
    pub sight: Fixed,
    /// Weapon, if armed.
    pub weapon: Option<WeaponSpec>,
}

/// Compiled building blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingBlueprint {
    /// Interned id.
    pub id: BuildingTypeId,
    /// Data-file name, e.g. `"barracks"`.
    pub name: String,
    /// Credit cost.
    pub cost: u32,
    /// Time in the producer's queue, in ticks.
    pub build_time: u32,
    /// On-site construction time after placement, in ticks.
    pub construction_time: u32,
    /// Maximum health.
    pub health: u32,
    /// Footprint in cells.
    pub footprint: Footprint,
    /// Power supplied while active.
    pub power_output: u32,
    /// Power drawn while active.
    pub power_usage: u32,
    /// Credits per income interval (resource extraction).
    pub income: u32,
    /// Income interval in ticks.
    pub income_interval: u32,
    /// Defensive weapon.
    pub weapon: Option<WeaponSpec>,
    /// Items this building can produce.
    pub produces: Vec<ProductionKind>,
    /// Losing every headquarters defeats the player.
    pub is_headquarters: bool,
}

impl BuildingBlueprint {
    /// Check if this building can produce the given item.
    #[must_use]
    pub fn can_produce(&self, item: ProductionKind) -> bool {
        self.produces.contains(&item)
    }
}

/// Registry of all compiled blueprints.
///
/// Built once from [`GameData`](crate::data::GameData) before the simulation
/// starts; read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlueprintRegistry {
    units: Vec<UnitBlueprint>,
    buildings: Vec<BuildingBlueprint>,
    unit_names: HashMap<String, UnitTypeId>,
    building_names: HashMap<String, BuildingTypeId>,
}

impl BlueprintRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit blueprint, assigning its id.
    pub fn register_unit(&mut self, mut blueprint: UnitBlueprint) -> UnitTypeId {
        let id = UnitTypeId(self.units.len() as u16);
        blueprint.id = id;
        self.unit_names.insert(blueprint.name.clone(), id);
        self.units.push(blueprint);
        id
    }

    /// Register a building blueprint, assigning its id.
    pub fn register_building(&mut self, mut blueprint: BuildingBlueprint) -> BuildingTypeId {
        let id = BuildingTypeId(self.buildings.len() as u16);
        blueprint.id = id;
        self.building_names.insert(blueprint.name.clone(), id);
        self.buildings.push(blueprint);
        id
    }

    /// Get a unit blueprint by id.
    #[must_use]
    pub fn unit(&self, id: UnitTypeId) -> Option<&UnitBlueprint> {
        self.units.get(id.0 as usize)
    }

    /// Get a building blueprint by id.
    #[must_use]
    pub fn building(&self, id: BuildingTypeId) -> Option<&BuildingBlueprint> {
        self.buildings.get(id.0 as usize)
    }

    /// Mutable building blueprint access, used while linking `produces` lists.
    pub(crate) fn building_mut(&mut self, id: BuildingTypeId) -> Option<&mut BuildingBlueprint> {
        self.buildings.get_mut(id.0 as usize)
    }

    /// Look up a unit id by name.
    #[must_use]
    pub fn unit_id(&self, name: &str) -> Option<UnitTypeId> {
        self.unit_names.get(name).copied()
    }

    /// Look up a building id by name.
    #[must_use]
    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_names.get(name).copied()
    }

    /// Resolve a name to either a unit or a building.
    #[must_use]
    pub fn item_by_name(&self, name: &str) -> Option<ProductionKind> {
        self.unit_id(name)
            .map(ProductionKind::Unit)
            .or_else(|| self.building_id(name).map(ProductionKind::Building))
    }

    /// Display name of a production item.
    #[must_use]
    pub fn item_name(&self, item: ProductionKind) -> &str {
        match item {
            ProductionKind::Unit(id) => self.unit(id).map_or("?", |b| b.name.as_str()),
            ProductionKind::Building(id) => self.building(id).map_or("?", |b| b.name.as_str()),
        }
    }

    /// Cost and queue time of a production item.
    #[must_use]
    pub fn item_cost(&self, item: ProductionKind) -> Option<(u32, u32)> {
        match item {
            ProductionKind::Unit(id) => self.unit(id).map(|b| (b.cost, b.build_time)),
            ProductionKind::Building(id) => self.building(id).map(|b| (b.cost, b.build_time)),
        }
    }

    /// All unit blueprints.
    pub fn all_units(&self) -> impl Iterator<Item = &UnitBlueprint> {
        self.units.iter()
    }

    /// All building blueprints.
    pub fn all_buildings(&self) -> impl Iterator<Item = &BuildingBlueprint> {
        self.buildings.iter()
    }
}

/// An item currently in a production queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionItem {
    /// What is being produced.
    pub kind: ProductionKind,
    /// Progress in (possibly fractional) ticks.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// Total build time in ticks.
    pub total_time: u32,
    /// Credits reserved at enqueue time (basis for refunds).
    pub paid: u32,
}

impl ProductionItem {
    /// Create a new production item.
    #[must_use]
    pub fn new(kind: ProductionKind, total_time: u32, paid: u32) -> Self {
        Self {
            kind,
            progress: Fixed::ZERO,
            total_time,
            paid,
        }
    }

    /// Check if production is complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress >= Fixed::from_num(self.total_time)
    }

    /// Get progress as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.total_time == 0 {
            100
        } else {
            (self.progress.saturating_mul(Fixed::from_num(100)) / Fixed::saturating_from_num(self.total_time))
                .saturating_to_num::<u32>()
                .min(100)
        }
    }

    /// Advance production by `rate` ticks, capped at the total.
    pub fn advance(&mut self, rate: Fixed) {
        let total = Fixed::from_num(self.total_time);
        self.progress = (self.progress + rate).min(total);
    }
}

/// Production queue for a building.
///
/// The front item is actively produced. When it completes it stays at the
/// front until it has been spawned, so an item that cannot be placed is held
/// rather than lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionQueue {
    /// Queued items.
    pub items: VecDeque<ProductionItem>,
    /// Maximum number of items allowed in the queue.
    pub max_queue_size: usize,
}

impl Default for ProductionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionQueue {
    /// Default maximum queue size.
    pub const DEFAULT_MAX_QUEUE_SIZE: usize = 5;

    /// Create a new empty production queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_size(Self::DEFAULT_MAX_QUEUE_SIZE)
    }

    /// Create a production queue with a specific max size.
    #[must_use]
    pub fn with_max_size(max_queue_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_queue_size,
        }
    }

    /// Check if the queue is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_queue_size
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Currently producing item.
    #[must_use]
    pub fn current(&self) -> Option<&ProductionItem> {
        self.items.front()
    }

    /// Currently producing item, mutably.
    pub fn current_mut(&mut self) -> Option<&mut ProductionItem> {
        self.items.front_mut()
    }

    /// Remove and return the front item if it is complete.
    pub fn pop_complete(&mut self) -> Option<ProductionItem> {
        if self.items.front().is_some_and(ProductionItem::is_complete) {
            self.items.pop_front()
        } else {
            None
        }
    }

    /// Cancel and remove an item at the given index.
    pub fn cancel(&mut self, index: usize) -> Option<ProductionItem> {
        self.items.remove(index)
    }
}

/// Outcome of a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Item queued and paid for.
    Queued,
    /// Queue is full; nothing was charged, try again next tick.
    QueueFull,
}

/// Queue an item for production, reserving its cost from the player.
///
/// Validation happens before any mutation: on `Err` neither the queue nor
/// the player's credits change.
pub fn queue_production(
    building_id: EntityId,
    queue: &mut ProductionQueue,
    blueprint: &BuildingBlueprint,
    is_active: bool,
    item: ProductionKind,
    registry: &BlueprintRegistry,
    player: &mut Player,
) -> Result<EnqueueOutcome, OrderError> {
    if !is_active {
        return Err(OrderError::NotOperational(building_id));
    }

    if !blueprint.can_produce(item) {
        return Err(OrderError::CannotProduce {
            building: building_id,
            item: registry.item_name(item).to_string(),
        });
    }

    let (cost, build_time) = registry
        .item_cost(item)
        .ok_or_else(|| OrderError::UnknownBlueprint(format!("{item:?}")))?;

    if !player.can_afford(cost) {
        return Err(OrderError::InsufficientCredits {
            required: cost,
            available: player.credits,
        });
    }

    if queue.is_full() {
        return Ok(EnqueueOutcome::QueueFull);
    }

    player.spend(cost)?;
    queue
        .items
        .push_back(ProductionItem::new(item, build_time, cost));
    Ok(EnqueueOutcome::Queued)
}

/// Cancel production at a queue index.
///
/// Refunds the reserved cost scaled by the fraction of work not yet done.
/// Returns the cancelled item and the refund.
pub fn cancel_production(
    building_id: EntityId,
    queue: &mut ProductionQueue,
    index: usize,
    player: &mut Player,
) -> Result<(ProductionItem, u32), OrderError> {
    let item = queue.cancel(index).ok_or(OrderError::NoSuchQueueItem {
        building: building_id,
        index,
    })?;

    let remaining_percent = 100 - item.percentage();
    let refund = share(item.paid, remaining_percent);
    player.deposit(refund);

    Ok((item, refund))
}

/// `percent` of `amount`, rounded down.
pub(crate) fn share(amount: u32, percent: u32) -> u32 {
    let part = u64::from(amount) * u64::from(percent) / 100;
    u32::try_from(part).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::Controller;

    fn registry() -> (BlueprintRegistry, UnitTypeId, UnitTypeId, BuildingTypeId) {
        let mut registry = BlueprintRegistry::new();
        let infantry = registry.register_unit(UnitBlueprint {
            id: UnitTypeId(0),
            name: "infantry".into(),
            cost: 100,
            build_time: 10,
            health: 45,
            class: UnitClass::Infantry,
            speed: Fixed::ONE,
            sight: Fixed::from_num(6),
            weapon: Some(WeaponSpec::new(10, Fixed::from_num(4), 5)),
        });
        let tank = registry.register_unit(UnitBlueprint {
            id: UnitTypeId(0),
            name: "tank".into(),
            cost: 700,
            build_time: 30,
            health: 300,
            class: UnitClass::Tank,
            speed: Fixed::ONE,
            sight: Fixed::from_num(8),
            weapon: None,
        });
        let barracks = registry.register_building(BuildingBlueprint {
            id: BuildingTypeId(0),
            name: "barracks".into(),
            cost: 300,
            build_time: 20,
            construction_time: 0,
            health: 200,
            footprint: Footprint::new(2, 2),
            power_output: 0,
            power_usage: 10,
            income: 0,
            income_interval: 0,
            weapon: None,
            produces: vec![ProductionKind::Unit(infantry)],
            is_headquarters: false,
        });
        (registry, infantry, tank, barracks)
    }

    #[test]
    fn test_registry_lookup() {
        let (registry, infantry, tank, barracks) = registry();
        assert_eq!(registry.unit_id("infantry"), Some(infantry));
        assert_eq!(registry.unit_id("tank"), Some(tank));
        assert_eq!(registry.building_id("barracks"), Some(barracks));
        assert_eq!(
            registry.item_by_name("barracks"),
            Some(ProductionKind::Building(barracks))
        );
        assert_eq!(registry.item_by_name("nope"), None);
        assert_eq!(registry.item_cost(ProductionKind::Unit(tank)), Some((700, 30)));
    }

    #[test]
    fn test_production_item_advance_is_capped() {
        let mut item = ProductionItem::new(ProductionKind::Unit(UnitTypeId(0)), 4, 100);
        item.advance(Fixed::from_num(1.5));
        assert_eq!(item.percentage(), 37);
        item.advance(Fixed::from_num(10));
        assert!(item.is_complete());
        assert_eq!(item.progress, Fixed::from_num(4));
    }

    #[test]
    fn test_queue_production_reserves_credits() {
        let (registry, infantry, _, barracks) = registry();
        let blueprint = registry.building(barracks).unwrap().clone();
        let mut queue = ProductionQueue::new();
        let mut player = Player::new(0, 0, 250, Controller::Human);

        let outcome = queue_production(
            1,
            &mut queue,
            &blueprint,
            true,
            ProductionKind::Unit(infantry),
            &registry,
            &mut player,
        );
        assert_eq!(outcome, Ok(EnqueueOutcome::Queued));
        assert_eq!(player.credits, 150);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_production_insufficient_credits_changes_nothing() {
        let (registry, infantry, _, barracks) = registry();
        let blueprint = registry.building(barracks).unwrap().clone();
        let mut queue = ProductionQueue::new();
        let mut player = Player::new(0, 0, 80, Controller::Human);

        let outcome = queue_production(
            1,
            &mut queue,
            &blueprint,
            true,
            ProductionKind::Unit(infantry),
            &registry,
            &mut player,
        );
        assert_eq!(
            outcome,
            Err(OrderError::InsufficientCredits {
                required: 100,
                available: 80
            })
        );
        assert_eq!(player.credits, 80);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_production_rejects_wrong_item() {
        let (registry, _, tank, barracks) = registry();
        let blueprint = registry.building(barracks).unwrap().clone();
        let mut queue = ProductionQueue::new();
        let mut player = Player::new(0, 0, 5000, Controller::Human);

        let outcome = queue_production(
            1,
            &mut queue,
            &blueprint,
            true,
            ProductionKind::Unit(tank),
            &registry,
            &mut player,
        );
        assert!(matches!(outcome, Err(OrderError::CannotProduce { .. })));
        assert_eq!(player.credits, 5000);
    }

    #[test]
    fn test_queue_production_not_operational() {
        let (registry, infantry, _, barracks) = registry();
        let blueprint = registry.building(barracks).unwrap().clone();
        let mut queue = ProductionQueue::new();
        let mut player = Player::new(0, 0, 5000, Controller::Human);

        let outcome = queue_production(
            9,
            &mut queue,
            &blueprint,
            false,
            ProductionKind::Unit(infantry),
            &registry,
            &mut player,
        );
        assert_eq!(outcome, Err(OrderError::NotOperational(9)));
    }

    #[test]
    fn test_queue_full_defers_without_charging() {
        let (registry, infantry, _, barracks) = registry();
        let blueprint = registry.building(barracks).unwrap().clone();
        let mut queue = ProductionQueue::with_max_size(1);
        let mut player = Player::new(0, 0, 1000, Controller::Human);
        let item = ProductionKind::Unit(infantry);

        assert_eq!(
            queue_production(1, &mut queue, &blueprint, true, item, &registry, &mut player),
            Ok(EnqueueOutcome::Queued)
        );
        assert_eq!(
            queue_production(1, &mut queue, &blueprint, true, item, &registry, &mut player),
            Ok(EnqueueOutcome::QueueFull)
        );
        assert_eq!(player.credits, 900);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cancel_refund_scales_with_remaining_work() {
        let mut queue = ProductionQueue::new();
        let mut item = ProductionItem::new(ProductionKind::Unit(UnitTypeId(0)), 10, 100);
        item.advance(Fixed::from_num(5));
        queue.items.push_back(item);
        let mut player = Player::new(0, 0, 0, Controller::Human);

        let (_, refund) = cancel_production(1, &mut queue, 0, &mut player).unwrap();
        assert_eq!(refund, 50);
        assert_eq!(player.credits, 50);
        assert!(queue.is_empty());

        assert_eq!(
            cancel_production(1, &mut queue, 0, &mut player),
            Err(OrderError::NoSuchQueueItem {
                building: 1,
                index: 0
            })
        );
    }

    #[test]
    fn test_share_does_not_overflow() {
        assert_eq!(share(300, 50), 150);
        assert_eq!(share(u32::MAX, 100), u32::MAX);
        assert_eq!(share(u32::MAX, 50), u32::MAX / 2);
        assert_eq!(share(7, 0), 0);
    }

    #[test]
    fn test_pop_complete_only_when_done() {
        let mut queue = ProductionQueue::new();
        queue
            .items
            .push_back(ProductionItem::new(ProductionKind::Unit(UnitTypeId(0)), 2, 0));
        assert!(queue.pop_complete().is_none());
        queue.current_mut().unwrap().advance(Fixed::from_num(2));
        assert!(queue.pop_complete().is_some());
        assert!(queue.is_empty());
    }
}
