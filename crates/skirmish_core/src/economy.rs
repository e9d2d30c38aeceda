//! Player economy: credits, power and resource extraction.
//!
//! Credits are unsigned and every spend is checked, so a balance can never
//! go negative. Power is recomputed from active buildings each tick and the
//! resulting ratio throttles production and construction.

use serde::{Deserialize, Serialize};

use crate::ai::{EnemyIntel, Personality};
use crate::components::{PlayerId, TeamId};
use crate::error::OrderError;
use crate::events::{SimEvent, TickEvents};
use crate::math::Fixed;
use crate::store::EntityStore;

/// Who issues a player's orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    /// Orders arrive through the order queue from outside.
    Human,
    /// Orders come from the built-in AI with the given personality.
    Ai(Personality),
}

/// Per-player state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Player index.
    pub id: PlayerId,
    /// Alliance tag.
    pub team: TeamId,
    /// Current credits.
    pub credits: u32,
    /// Power supplied by active buildings.
    pub power_produced: u32,
    /// Power drawn by active buildings.
    pub power_consumed: u32,
    /// Who controls this player.
    pub controller: Controller,
    /// Whether the player has been eliminated.
    pub defeated: bool,
    /// What this player has learned about its enemies.
    pub intel: EnemyIntel,
}

impl Player {
    /// Create a player with a starting balance.
    #[must_use]
    pub fn new(id: PlayerId, team: TeamId, credits: u32, controller: Controller) -> Self {
        Self {
            id,
            team,
            credits,
            power_produced: 0,
            power_consumed: 0,
            controller,
            defeated: false,
            intel: EnemyIntel::default(),
        }
    }

    /// Check if player can afford a cost.
    #[must_use]
    pub const fn can_afford(&self, cost: u32) -> bool {
        self.credits >= cost
    }

    /// Spend credits, rejecting the spend if the balance is too low.
    pub fn spend(&mut self, amount: u32) -> Result<(), OrderError> {
        self.credits = self
            .credits
            .checked_sub(amount)
            .ok_or(OrderError::InsufficientCredits {
                required: amount,
                available: self.credits,
            })?;
        Ok(())
    }

    /// Add credits.
    pub fn deposit(&mut self, amount: u32) {
        self.credits = self.credits.saturating_add(amount);
    }

    /// Power ratio clamped to `[0, 1]`.
    ///
    /// A player drawing no power runs at full speed.
    #[must_use]
    pub fn power_ratio(&self) -> Fixed {
        if self.power_consumed == 0 {
            return Fixed::ONE;
        }
        (Fixed::from_num(self.power_produced) / Fixed::from_num(self.power_consumed)).min(Fixed::ONE)
    }

    /// Surplus (or deficit, negative) power.
    #[must_use]
    pub fn power_balance(&self) -> i64 {
        i64::from(self.power_produced) - i64::from(self.power_consumed)
    }

    /// Check if the player is driven by the AI.
    #[must_use]
    pub const fn is_ai(&self) -> bool {
        matches!(self.controller, Controller::Ai(_))
    }
}

/// Recompute every player's power totals from their active buildings.
pub fn recompute_power(players: &mut [Player], store: &EntityStore) {
    for player in players.iter_mut() {
        player.power_produced = 0;
        player.power_consumed = 0;
    }

    for entity in store.iter() {
        let Some(building) = entity.as_building() else {
            continue;
        };
        if !building.is_active() {
            continue;
        }
        if let Some(player) = players.get_mut(entity.owner as usize) {
            player.power_produced = player.power_produced.saturating_add(building.power_output);
            player.power_consumed = player.power_consumed.saturating_add(building.power_usage);
        }
    }
}

/// Advance extraction timers and pay out income.
///
/// Only active buildings earn. Iterates in id order so payouts are
/// reproducible.
pub fn collect_income(players: &mut [Player], store: &mut EntityStore, events: &mut TickEvents) {
    for id in store.sorted_ids() {
        let Some(entity) = store.get_mut(id) else {
            continue;
        };
        let owner = entity.owner;
        let Some(building) = entity.as_building_mut() else {
            continue;
        };
        if !building.is_active() {
            continue;
        }
        let Some(income) = building.income.as_mut() else {
            continue;
        };
        if income.interval == 0 {
            continue;
        }

        income.elapsed += 1;
        if income.elapsed < income.interval {
            continue;
        }
        income.elapsed = 0;
        let amount = income.amount;

        if let Some(player) = players.get_mut(owner as usize) {
            if player.defeated {
                continue;
            }
            player.deposit(amount);
            events.push(SimEvent::IncomeCollected {
                building: id,
                owner,
                amount,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Building, BuildingState, Entity, EntityKind, Footprint, Health, Income};
    use crate::math::Vec2Fixed;
    use crate::production::BuildingTypeId;

    fn building(power_output: u32, power_usage: u32) -> EntityKind {
        let mut building = Building::new(BuildingTypeId(0), Footprint::default());
        building.power_output = power_output;
        building.power_usage = power_usage;
        EntityKind::Building(building)
    }

    fn spawn(store: &mut EntityStore, owner: u8, kind: EntityKind) -> u64 {
        store.spawn(|id| Entity {
            id,
            owner,
            team: owner,
            position: Vec2Fixed::ZERO,
            health: Health::new(100),
            kind,
        })
    }

    #[test]
    fn test_spend_rejects_overdraft() {
        let mut player = Player::new(0, 0, 80, Controller::Human);
        assert_eq!(
            player.spend(100),
            Err(OrderError::InsufficientCredits {
                required: 100,
                available: 80
            })
        );
        assert_eq!(player.credits, 80);
        assert!(player.spend(80).is_ok());
        assert_eq!(player.credits, 0);
    }

    #[test]
    fn test_power_ratio() {
        let mut player = Player::new(0, 0, 0, Controller::Human);
        assert_eq!(player.power_ratio(), Fixed::ONE);

        player.power_produced = 50;
        player.power_consumed = 100;
        assert_eq!(player.power_ratio(), Fixed::from_num(0.5));
        assert_eq!(player.power_balance(), -50);

        player.power_produced = 300;
        assert_eq!(player.power_ratio(), Fixed::ONE);
    }

    #[test]
    fn test_recompute_power_ignores_unfinished_buildings() {
        let mut store = EntityStore::new();
        let mut players = vec![Player::new(0, 0, 0, Controller::Human)];

        spawn(&mut store, 0, building(100, 50));
        let site = spawn(&mut store, 0, building(0, 40));
        if let Some(b) = store.get_mut(site).and_then(Entity::as_building_mut) {
            b.state = BuildingState::UnderConstruction {
                progress: Fixed::ZERO,
                total: 10,
            };
        }

        recompute_power(&mut players, &store);
        assert_eq!(players[0].power_produced, 100);
        assert_eq!(players[0].power_consumed, 50);
    }

    #[test]
    fn test_recompute_power_saturates() {
        let mut store = EntityStore::new();
        let mut players = vec![Player::new(0, 0, 0, Controller::Human)];
        spawn(&mut store, 0, building(u32::MAX, u32::MAX));
        spawn(&mut store, 0, building(u32::MAX, 1));

        recompute_power(&mut players, &store);
        assert_eq!(players[0].power_produced, u32::MAX);
        assert_eq!(players[0].power_consumed, u32::MAX);
    }

    #[test]
    fn test_collect_income_pays_each_interval() {
        let mut store = EntityStore::new();
        let mut players = vec![Player::new(0, 0, 0, Controller::Human)];
        let mut kind = building(0, 0);
        if let EntityKind::Building(b) = &mut kind {
            b.income = Some(Income {
                amount: 100,
                interval: 3,
                elapsed: 0,
            });
        }
        spawn(&mut store, 0, kind);

        let mut events = TickEvents::default();
        for _ in 0..6 {
            collect_income(&mut players, &mut store, &mut events);
        }
        assert_eq!(players[0].credits, 200);
        assert_eq!(events.events.len(), 2);
    }
}
