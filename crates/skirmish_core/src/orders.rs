//! Order intake: the queue players and AI controllers submit into, and the
//! validation that turns a queued order into state changes.
//!
//! Orders may be sent from any thread at any time through an
//! [`OrderSender`]. They are only drained at the start of a tick, so an
//! order submitted while tick `N` runs takes effect in tick `N + 1`.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{EntityId, Order, PlayerId, Unit};
use crate::config::SimConfig;
use crate::economy::Player;
use crate::error::OrderError;
use crate::events::{Diagnostic, Exhaustion, TickEvents};
use crate::math::{fixed_sqrt, Fixed, Vec2Fixed};
use crate::production::{
    cancel_production, queue_production, share, BlueprintRegistry, EnqueueOutcome, ProductionKind,
};
use crate::store::EntityStore;
use crate::terrain::TerrainGrid;

/// What a player wants done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "order", rename_all = "snake_case")]
pub enum OrderKind {
    /// Move units, ignoring enemies.
    Move {
        /// Units to move.
        units: Vec<EntityId>,
        /// Group destination.
        destination: Vec2Fixed,
    },
    /// Move units, engaging hostiles met on the way.
    AttackMove {
        /// Units to move.
        units: Vec<EntityId>,
        /// Group destination.
        destination: Vec2Fixed,
    },
    /// Chase and attack a specific entity.
    Attack {
        /// Attacking units.
        units: Vec<EntityId>,
        /// Victim.
        target: EntityId,
    },
    /// Hold position and fire at anything in range.
    Hold {
        /// Units to hold.
        units: Vec<EntityId>,
    },
    /// Cancel orders and targets.
    Stop {
        /// Units to stop.
        units: Vec<EntityId>,
    },
    /// Queue a unit or building at a producer.
    Produce {
        /// Producing building.
        building: EntityId,
        /// Blueprint id.
        item: String,
    },
    /// Remove an item from a production queue with a partial refund.
    CancelProduction {
        /// Producing building.
        building: EntityId,
        /// Queue index (0 is the item in progress).
        index: usize,
    },
    /// Set where a building's new units walk to.
    SetRallyPoint {
        /// Producing building.
        building: EntityId,
        /// Rally point.
        point: Vec2Fixed,
    },
    /// Sell a building for a partial refund.
    Sell {
        /// Building to sell.
        building: EntityId,
    },
}

/// An order tagged with the player who issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOrder {
    /// Issuing player.
    pub player: PlayerId,
    /// The order.
    pub kind: OrderKind,
}

impl PlayerOrder {
    /// Create an order.
    #[must_use]
    pub const fn new(player: PlayerId, kind: OrderKind) -> Self {
        Self { player, kind }
    }
}

/// Cloneable handle for submitting orders from any thread.
#[derive(Debug, Clone)]
pub struct OrderSender(Sender<PlayerOrder>);

impl OrderSender {
    /// Submit an order; returns `false` if the simulation is gone.
    pub fn submit(&self, order: PlayerOrder) -> bool {
        self.0.send(order).is_ok()
    }
}

/// Receiving side, owned by the simulation.
#[derive(Debug)]
pub struct OrderQueue {
    rx: Receiver<PlayerOrder>,
    tx: Sender<PlayerOrder>,
}

impl Default for OrderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderQueue {
    /// Create an empty, unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { rx, tx }
    }

    /// A new sender handle.
    #[must_use]
    pub fn sender(&self) -> OrderSender {
        OrderSender(self.tx.clone())
    }

    /// Drain every order submitted so far, in submission order.
    #[must_use]
    pub fn drain(&self) -> Vec<PlayerOrder> {
        self.rx.try_iter().collect()
    }
}

/// A produce order waiting for queue space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredOrder {
    /// Issuing player.
    pub player: PlayerId,
    /// Producing building.
    pub building: EntityId,
    /// Requested item.
    pub item: ProductionKind,
    /// Last tick on which the order may still be retried.
    pub expires_at: u64,
}

/// Mutable world parts an order may touch.
pub(crate) struct OrderContext<'a> {
    pub store: &'a mut EntityStore,
    pub players: &'a mut [Player],
    pub registry: &'a BlueprintRegistry,
    pub terrain: &'a TerrainGrid,
    pub config: &'a SimConfig,
    pub deferred: &'a mut Vec<DeferredOrder>,
    pub events: &'a mut TickEvents,
    pub tick: u64,
}

impl OrderContext<'_> {
    /// Validate and apply a batch of orders in submission order.
    ///
    /// Invalid orders are dropped with a diagnostic; they never abort the
    /// batch.
    pub fn apply_all(&mut self, orders: Vec<PlayerOrder>) {
        for order in orders {
            if let Err(error) = self.apply(&order) {
                debug!(player = order.player, ?order.kind, %error, "order rejected");
                self.events.diagnose(Diagnostic::rejected(order.player, &error));
            }
        }
    }

    fn apply(&mut self, order: &PlayerOrder) -> Result<(), OrderError> {
        let player = order.player;
        if self
            .players
            .get(player as usize)
            .map_or(true, |p| p.defeated)
        {
            return Err(OrderError::InactivePlayer(player));
        }

        match &order.kind {
            OrderKind::Move { units, destination } => {
                self.command_group(player, units, *destination, Order::Move)
            }
            OrderKind::AttackMove { units, destination } => {
                self.command_group(player, units, *destination, Order::AttackMove)
            }
            OrderKind::Attack { units, target } => self.attack(player, units, *target),
            OrderKind::Hold { units } => self.set_orders(player, units, |unit| {
                unit.order = Order::Hold;
                unit.blocked_ticks = 0;
            }),
            OrderKind::Stop { units } => self.set_orders(player, units, |unit| {
                unit.order = Order::Idle;
                unit.target = None;
                unit.blocked_ticks = 0;
            }),
            OrderKind::Produce { building, item } => self.produce(player, *building, item),
            OrderKind::CancelProduction { building, index } => {
                self.cancel(player, *building, *index)
            }
            OrderKind::SetRallyPoint { building, point } => {
                self.owned_building(player, *building)?;
                self.on_map(*point)?;
                if let Some(b) = self
                    .store
                    .get_mut(*building)
                    .and_then(|e| e.as_building_mut())
                {
                    b.rally_point = Some(*point);
                }
                Ok(())
            }
            OrderKind::Sell { building } => self.sell(player, *building),
        }
    }

    /// Owned, live units from a selection, ascending. Units that died since
    /// the order was issued are skipped.
    fn owned_units(&self, player: PlayerId, units: &[EntityId]) -> Result<Vec<EntityId>, OrderError> {
        if units.is_empty() {
            return Err(OrderError::EmptySelection);
        }
        let mut selected = Vec::with_capacity(units.len());
        for &id in units {
            let Some(entity) = self.store.resolve(id) else {
                continue;
            };
            if entity.owner != player {
                return Err(OrderError::NotOwned { entity: id, player });
            }
            if entity.as_unit().is_none() {
                return Err(OrderError::WrongEntityKind(id));
            }
            selected.push(id);
        }
        if selected.is_empty() {
            return Err(OrderError::UnknownEntity(units[0]));
        }
        selected.sort_unstable();
        selected.dedup();
        Ok(selected)
    }

    fn owned_building(&self, player: PlayerId, building: EntityId) -> Result<(), OrderError> {
        let entity = self
            .store
            .resolve(building)
            .ok_or(OrderError::UnknownEntity(building))?;
        if entity.owner != player {
            return Err(OrderError::NotOwned {
                entity: building,
                player,
            });
        }
        if entity.as_building().is_none() {
            return Err(OrderError::WrongEntityKind(building));
        }
        Ok(())
    }

    fn set_orders(
        &mut self,
        player: PlayerId,
        units: &[EntityId],
        mut update: impl FnMut(&mut Unit),
    ) -> Result<(), OrderError> {
        for id in self.owned_units(player, units)? {
            if let Some(unit) = self.store.get_mut(id).and_then(|e| e.as_unit_mut()) {
                update(unit);
            }
        }
        Ok(())
    }

    fn on_map(&self, point: Vec2Fixed) -> Result<(), OrderError> {
        match self.terrain.world_to_grid(point) {
            Some(_) => Ok(()),
            None => Err(OrderError::OffMap {
                x: point.x,
                y: point.y,
            }),
        }
    }

    fn command_group(
        &mut self,
        player: PlayerId,
        units: &[EntityId],
        destination: Vec2Fixed,
        order: fn(Vec2Fixed) -> Order,
    ) -> Result<(), OrderError> {
        self.on_map(destination)?;
        let selected = self.owned_units(player, units)?;
        let offsets = formation_offsets(selected.len(), self.config.formation_spacing);
        for (id, offset) in selected.into_iter().zip(offsets) {
            if let Some(unit) = self.store.get_mut(id).and_then(|e| e.as_unit_mut()) {
                unit.order = order(destination);
                unit.formation_offset = offset;
                unit.target = None;
                unit.blocked_ticks = 0;
            }
        }
        Ok(())
    }

    fn attack(&mut self, player: PlayerId, units: &[EntityId], target: EntityId) -> Result<(), OrderError> {
        let team = self.players[player as usize].team;
        let victim = self
            .store
            .resolve(target)
            .ok_or(OrderError::UnknownEntity(target))?;
        if !victim.is_targetable() || !victim.is_hostile_to(team) {
            return Err(OrderError::NotHostile(target));
        }

        let selected = self.owned_units(player, units)?;
        for id in selected {
            if let Some(unit) = self.store.get_mut(id).and_then(|e| e.as_unit_mut()) {
                if unit.weapon.is_none() {
                    continue;
                }
                unit.order = Order::Attack(target);
                unit.target = Some(target);
                unit.formation_offset = Vec2Fixed::ZERO;
                unit.blocked_ticks = 0;
            }
        }
        Ok(())
    }

    fn produce(&mut self, player: PlayerId, building: EntityId, item: &str) -> Result<(), OrderError> {
        self.owned_building(player, building)?;
        let kind = self
            .registry
            .item_by_name(item)
            .ok_or_else(|| OrderError::UnknownBlueprint(item.to_string()))?;

        match enqueue(self.store, self.players, self.registry, player, building, kind)? {
            EnqueueOutcome::Queued => {}
            EnqueueOutcome::QueueFull => {
                self.deferred.push(DeferredOrder {
                    player,
                    building,
                    item: kind,
                    expires_at: self.tick + u64::from(self.config.deferred_order_ttl),
                });
                self.events.diagnose(Diagnostic::ResourceExhausted {
                    building,
                    reason: Exhaustion::QueueFull,
                });
            }
        }
        Ok(())
    }

    fn cancel(&mut self, player: PlayerId, building: EntityId, index: usize) -> Result<(), OrderError> {
        self.owned_building(player, building)?;
        let queue = self
            .store
            .get_mut(building)
            .and_then(|e| e.as_building_mut())
            .map(|b| &mut b.queue)
            .ok_or(OrderError::WrongEntityKind(building))?;
        cancel_production(building, queue, index, &mut self.players[player as usize])?;
        Ok(())
    }

    fn sell(&mut self, player: PlayerId, building: EntityId) -> Result<(), OrderError> {
        self.owned_building(player, building)?;
        let (cost, built) = self
            .store
            .get(building)
            .and_then(|e| e.as_building())
            .and_then(|b| {
                self.registry
                    .building(b.building_type)
                    .map(|bp| (bp.cost, b.construction_percentage()))
            })
            .unwrap_or((0, 0));

        // Queued items are refunded as if cancelled before the building goes.
        if let Some(b) = self.store.get_mut(building).and_then(|e| e.as_building_mut()) {
            while !b.queue.is_empty() {
                let last = b.queue.len() - 1;
                cancel_production(building, &mut b.queue, last, &mut self.players[player as usize])?;
            }
        }

        // Unfinished buildings return only the part already built.
        let refund = share(share(cost, self.config.sell_refund_percent), built);
        self.players[player as usize].deposit(refund);
        self.store.mark_destroyed(building);
        Ok(())
    }
}

/// Try to put `item` into `building`'s queue for `player`.
pub(crate) fn enqueue(
    store: &mut EntityStore,
    players: &mut [Player],
    registry: &BlueprintRegistry,
    player: PlayerId,
    building: EntityId,
    item: ProductionKind,
) -> Result<EnqueueOutcome, OrderError> {
    let entity = store
        .get_mut(building)
        .ok_or(OrderError::UnknownEntity(building))?;
    let b = entity
        .as_building_mut()
        .ok_or(OrderError::WrongEntityKind(building))?;
    let blueprint = registry
        .building(b.building_type)
        .ok_or_else(|| OrderError::UnknownBlueprint(format!("{:?}", b.building_type)))?;
    let owner = players
        .get_mut(player as usize)
        .ok_or(OrderError::InactivePlayer(player))?;
    let active = b.is_active();
    queue_production(building, &mut b.queue, blueprint, active, item, registry, owner)
}

/// Slot offsets for a group of `count` units, filling a square grid
/// centered on the destination, row by row.
#[must_use]
pub fn formation_offsets(count: usize, spacing: Fixed) -> Vec<Vec2Fixed> {
    if count <= 1 {
        return vec![Vec2Fixed::ZERO; count];
    }
    let columns = fixed_sqrt(Fixed::from_num(count)).ceil().to_num::<usize>().max(1);
    let rows = count.div_ceil(columns);
    let center_x = Fixed::from_num(columns - 1) / Fixed::from_num(2);
    let center_y = Fixed::from_num(rows - 1) / Fixed::from_num(2);

    (0..count)
        .map(|i| {
            let col = Fixed::from_num(i % columns);
            let row = Fixed::from_num(i / columns);
            Vec2Fixed::new((col - center_x) * spacing, (row - center_y) * spacing)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drains_in_order() {
        let queue = OrderQueue::new();
        let sender = queue.sender();
        let other = sender.clone();
        assert!(sender.submit(PlayerOrder::new(0, OrderKind::Hold { units: vec![1] })));
        assert!(other.submit(PlayerOrder::new(1, OrderKind::Stop { units: vec![2] })));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].player, 0);
        assert_eq!(drained[1].player, 1);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_sender_works_across_threads() {
        let queue = OrderQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || {
            sender.submit(PlayerOrder::new(
                0,
                OrderKind::Sell { building: 3 },
            ));
        })
        .join()
        .unwrap();
        assert_eq!(queue.drain().len(), 1);
    }

    #[test]
    fn test_formation_offsets_are_centered() {
        assert_eq!(formation_offsets(1, Fixed::ONE), vec![Vec2Fixed::ZERO]);
        let offsets = formation_offsets(4, Fixed::from_num(2));
        assert_eq!(
            offsets,
            vec![
                Vec2Fixed::from_ints(-1, -1),
                Vec2Fixed::from_ints(1, -1),
                Vec2Fixed::from_ints(-1, 1),
                Vec2Fixed::from_ints(1, 1),
            ]
        );
        let offsets = formation_offsets(5, Fixed::ONE);
        assert_eq!(offsets.len(), 5);
        // All distinct slots
        for (i, a) in offsets.iter().enumerate() {
            for b in &offsets[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
