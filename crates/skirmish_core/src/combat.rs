//! Combat resolution: weapon fire, projectile flight and damage.
//!
//! Runs single-threaded after movement intents are applied. Entities whose
//! health reaches zero are only marked here; the scheduler removes them
//! (from the store and the spatial index together) in end-of-tick cleanup.

use tracing::trace;

use crate::components::{
    BuildingState, DamageType, Entity, EntityId, EntityKind, Health, ImpactPolicy, Projectile,
    ProjectileTarget, TeamId, WeaponSpec,
};
use crate::config::SimConfig;
use crate::events::{SimEvent, TickEvents};
use crate::math::{Fixed, Vec2Fixed};
use crate::movement::acquire_target;
use crate::spatial::SpatialIndex;
use crate::store::EntityStore;

/// A damage payload landing at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Entity credited with the hit.
    pub source: EntityId,
    /// Team of the attacker; only entities hostile to it are damaged.
    pub team: TeamId,
    /// Impact point.
    pub point: Vec2Fixed,
    /// Intended victim, if any.
    pub primary: Option<EntityId>,
    /// Base damage.
    pub damage: u32,
    /// Damage type.
    pub damage_type: DamageType,
    /// Splash radius (0 = primary only).
    pub splash_radius: Fixed,
}

/// Run one tick of combat.
///
/// Projectiles already in flight move first; weapons then fire, so a
/// projectile launched this tick starts travelling next tick.
pub fn run_combat(
    store: &mut EntityStore,
    spatial: &SpatialIndex,
    config: &SimConfig,
    events: &mut TickEvents,
) {
    advance_projectiles(store, spatial, config, events);
    fire_weapons(store, spatial, config, events);
}

/// Apply a hit. Damage to entities that are already dead has no effect.
///
/// Returns the total damage dealt.
pub fn apply_hit(store: &mut EntityStore, spatial: &SpatialIndex, hit: Hit, events: &mut TickEvents) -> u32 {
    let mut victims: Vec<EntityId> = if hit.splash_radius > Fixed::ZERO {
        spatial.query_circle(hit.point, hit.splash_radius)
    } else {
        Vec::new()
    };
    if let Some(primary) = hit.primary {
        if let Err(slot) = victims.binary_search(&primary) {
            victims.insert(slot, primary);
        }
    }

    let mut total: u32 = 0;
    let mut hits = Vec::new();
    for id in victims {
        if store.is_marked(id) {
            continue;
        }
        let Some(entity) = store.get_mut(id) else {
            continue;
        };
        if !entity.is_targetable() || !entity.is_hostile_to(hit.team) {
            continue;
        }
        let amount = hit.damage_type.damage_vs(hit.damage, entity.armor());
        total = total.saturating_add(entity.health.apply_damage(amount));
        hits.push(id);
        if entity.health.is_dead() {
            if let Some(building) = entity.as_building_mut() {
                building.state = BuildingState::Destroyed;
            }
            store.mark_destroyed(id);
        }
    }

    events.push(SimEvent::ProjectileImpact {
        source: hit.source,
        position: hit.point,
        hits,
        damage: total,
    });
    total
}

struct Shot {
    shooter: EntityId,
    owner: u8,
    team: TeamId,
    origin: Vec2Fixed,
    target: EntityId,
    target_position: Vec2Fixed,
    weapon: WeaponSpec,
}

fn fire_weapons(
    store: &mut EntityStore,
    spatial: &SpatialIndex,
    config: &SimConfig,
    events: &mut TickEvents,
) {
    for id in store.sorted_ids() {
        let Some(shot) = ready_shot(store, spatial, id) else {
            continue;
        };

        if let Some(entity) = store.get_mut(id) {
            match &mut entity.kind {
                EntityKind::Unit(unit) => unit.cooldown = shot.weapon.cooldown,
                EntityKind::Building(building) => building.cooldown = shot.weapon.cooldown,
                EntityKind::Projectile(_) => {}
            }
        }

        if shot.weapon.is_instant() {
            events.push(SimEvent::ProjectileFired {
                source: shot.shooter,
                target: shot.target,
                projectile: None,
            });
            apply_hit(
                store,
                spatial,
                Hit {
                    source: shot.shooter,
                    team: shot.team,
                    point: shot.target_position,
                    primary: Some(shot.target),
                    damage: shot.weapon.damage,
                    damage_type: shot.weapon.damage_type,
                    splash_radius: shot.weapon.splash_radius,
                },
                events,
            );
        } else {
            let projectile = launch(store, &shot, config);
            trace!(shooter = shot.shooter, target = shot.target, projectile, "projectile launched");
            events.push(SimEvent::ProjectileFired {
                source: shot.shooter,
                target: shot.target,
                projectile: Some(projectile),
            });
        }
    }
}

/// Tick the cooldown of `id` and return a shot if it can fire now.
fn ready_shot(store: &mut EntityStore, spatial: &SpatialIndex, id: EntityId) -> Option<Shot> {
    if store.resolve(id).is_none() {
        return None;
    }

    // Turrets pick their own targets; units got theirs in the movement phase.
    let turret_target = match store.get(id).map(|e| (&e.kind, e.position, e.team)) {
        Some((EntityKind::Building(building), position, team)) if building.is_active() => {
            let weapon = building.weapon?;
            let keep = building.target.filter(|&t| {
                store.resolve(t).is_some_and(|v| {
                    v.is_hostile_to(team) && v.position.distance_squared(position) <= weapon.range_squared()
                })
            });
            Some(keep.or_else(|| acquire_target(store, spatial, position, team, weapon.range)))
        }
        _ => None,
    };

    let entity = store.get_mut(id)?;
    let (weapon, target, cooldown) = match &mut entity.kind {
        EntityKind::Unit(unit) => {
            if !unit.order.engages() {
                unit.cooldown = unit.cooldown.saturating_sub(1);
                return None;
            }
            (unit.weapon?, unit.target, &mut unit.cooldown)
        }
        EntityKind::Building(building) => {
            if !building.is_active() {
                return None;
            }
            if let Some(target) = turret_target {
                building.target = target;
            }
            (building.weapon?, building.target, &mut building.cooldown)
        }
        EntityKind::Projectile(_) => return None,
    };

    if *cooldown > 0 {
        *cooldown -= 1;
        return None;
    }

    let (owner, team, origin) = (entity.owner, entity.team, entity.position);
    let target = target?;
    let victim = store.resolve(target)?;
    if !victim.is_hostile_to(team) || victim.position.distance_squared(origin) > weapon.range_squared() {
        return None;
    }

    Some(Shot {
        shooter: id,
        owner,
        team,
        origin,
        target,
        target_position: victim.position,
        weapon,
    })
}

fn launch(store: &mut EntityStore, shot: &Shot, config: &SimConfig) -> EntityId {
    let distance = shot.origin.distance(shot.target_position);
    let travel = distance
        .checked_div(shot.weapon.projectile_speed)
        .map_or(u32::MAX, |ticks| ticks.saturating_ceil().saturating_to_num::<u32>());
    let projectile = Projectile {
        source: shot.shooter,
        target: ProjectileTarget::Entity(shot.target),
        aim_point: shot.target_position,
        speed: shot.weapon.projectile_speed,
        damage: shot.weapon.damage,
        damage_type: shot.weapon.damage_type,
        splash_radius: shot.weapon.splash_radius,
        impact: shot.weapon.impact,
        ttl: travel.saturating_add(config.projectile_ttl_slack),
    };
    store.spawn(|id| Entity {
        id,
        owner: shot.owner,
        team: shot.team,
        position: shot.origin,
        health: Health::new(1),
        kind: EntityKind::Projectile(projectile),
    })
}

fn advance_projectiles(
    store: &mut EntityStore,
    spatial: &SpatialIndex,
    config: &SimConfig,
    events: &mut TickEvents,
) {
    let ids: Vec<EntityId> = store
        .iter()
        .filter(|e| e.as_projectile().is_some())
        .map(|e| e.id)
        .collect();

    for id in ids {
        if store.is_marked(id) {
            continue;
        }
        let Some((mut projectile, team, mut position)) = store
            .get(id)
            .and_then(|e| e.as_projectile().map(|p| (*p, e.team, e.position)))
        else {
            continue;
        };

        // Track the target, or deal with it having died mid-flight.
        if let ProjectileTarget::Entity(target) = projectile.target {
            if let Some(victim) = store.resolve(target) {
                projectile.aim_point = victim.position;
            } else {
                let retarget = match projectile.impact {
                    ImpactPolicy::Splash => acquire_target(
                        store,
                        spatial,
                        projectile.aim_point,
                        team,
                        projectile.splash_radius,
                    ),
                    ImpactPolicy::SingleTarget => None,
                };
                match retarget.and_then(|t| store.resolve(t).map(|v| (t, v.position))) {
                    Some((new_target, aim)) => {
                        trace!(projectile = id, new_target, "splash projectile retargeted");
                        projectile.target = ProjectileTarget::Entity(new_target);
                        projectile.aim_point = aim;
                    }
                    None => {
                        store.mark_destroyed(id);
                        continue;
                    }
                }
            }
        }

        let to_aim = projectile.aim_point - position;
        position = if to_aim.length() <= projectile.speed {
            projectile.aim_point
        } else {
            position + to_aim.clamp_length(projectile.speed)
        };

        let arrived = position.distance_squared(projectile.aim_point)
            <= config.impact_tolerance.saturating_mul(config.impact_tolerance);
        projectile.ttl = projectile.ttl.saturating_sub(1);

        if arrived {
            let primary = match projectile.target {
                ProjectileTarget::Entity(target) => Some(target),
                ProjectileTarget::Point(_) => None,
            };
            apply_hit(
                store,
                spatial,
                Hit {
                    source: projectile.source,
                    team,
                    point: projectile.aim_point,
                    primary,
                    damage: projectile.damage,
                    damage_type: projectile.damage_type,
                    splash_radius: projectile.splash_radius,
                },
                events,
            );
            store.mark_destroyed(id);
        } else if projectile.ttl == 0 {
            store.mark_destroyed(id);
        }

        if let Some(entity) = store.get_mut(id) {
            entity.position = position;
            entity.kind = EntityKind::Projectile(projectile);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Building, Footprint, Order, Unit, UnitClass};
    use crate::production::{BuildingTypeId, UnitTypeId};

    struct Arena {
        store: EntityStore,
        spatial: SpatialIndex,
        config: SimConfig,
        events: TickEvents,
    }

    impl Arena {
        fn new() -> Self {
            Self {
                store: EntityStore::new(),
                spatial: SpatialIndex::new(Fixed::from_num(4)),
                config: SimConfig::default(),
                events: TickEvents::default(),
            }
        }

        fn spawn(&mut self, team: u8, x: i32, y: i32, health: u32, kind: EntityKind) -> EntityId {
            let id = self.store.spawn(|id| Entity {
                id,
                owner: team,
                team,
                position: Vec2Fixed::from_ints(x, y),
                health: Health::new(health),
                kind,
            });
            self.spatial.insert(id, Vec2Fixed::from_ints(x, y));
            id
        }

        fn shooter(&mut self, x: i32, y: i32, weapon: WeaponSpec, target: EntityId) -> EntityId {
            let mut unit = Unit::new(UnitTypeId(0), UnitClass::Infantry, Fixed::ONE).with_weapon(weapon);
            unit.target = Some(target);
            self.spawn(0, x, y, 50, EntityKind::Unit(unit))
        }

        fn dummy(&mut self, team: u8, x: i32, y: i32, health: u32) -> EntityId {
            let unit = Unit::new(UnitTypeId(1), UnitClass::Infantry, Fixed::ONE);
            self.spawn(team, x, y, health, EntityKind::Unit(unit))
        }

        fn tick(&mut self) {
            run_combat(&mut self.store, &self.spatial, &self.config, &mut self.events);
        }

        fn health(&self, id: EntityId) -> u32 {
            self.store.get(id).map_or(0, |e| e.health.current)
        }

        fn projectiles(&self) -> usize {
            self.store
                .iter()
                .filter(|e| e.as_projectile().is_some() && !self.store.is_marked(e.id))
                .count()
        }
    }

    #[test]
    fn test_instant_weapon_hits_and_cools_down() {
        let mut arena = Arena::new();
        let victim = arena.dummy(1, 3, 0, 100);
        arena.shooter(0, 0, WeaponSpec::new(10, Fixed::from_num(5), 3), victim);

        arena.tick();
        assert_eq!(arena.health(victim), 90);
        // Cooldown 3: next shot lands on the fourth tick after firing
        for _ in 0..3 {
            arena.tick();
        }
        assert_eq!(arena.health(victim), 90);
        arena.tick();
        assert_eq!(arena.health(victim), 80);
    }

    #[test]
    fn test_out_of_range_does_not_fire() {
        let mut arena = Arena::new();
        let victim = arena.dummy(1, 6, 0, 100);
        arena.shooter(0, 0, WeaponSpec::new(10, Fixed::from_num(5), 3), victim);
        arena.tick();
        assert_eq!(arena.health(victim), 100);
        assert!(arena.events.events.is_empty());
    }

    #[test]
    fn test_projectile_travel_time() {
        let mut arena = Arena::new();
        let victim = arena.dummy(1, 4, 0, 100);
        let weapon = WeaponSpec::new(10, Fixed::from_num(5), 100).with_projectile_speed(Fixed::ONE);
        arena.shooter(0, 0, weapon, victim);

        arena.tick();
        assert_eq!(arena.projectiles(), 1);
        // Four units of travel at speed 1
        for _ in 0..3 {
            arena.tick();
            assert_eq!(arena.health(victim), 100);
        }
        arena.tick();
        assert_eq!(arena.health(victim), 90);
        assert_eq!(arena.projectiles(), 0);
    }

    #[test]
    fn test_crawling_projectile_flight_saturates() {
        let mut arena = Arena::new();
        let victim = arena.dummy(1, 4, 0, 100);
        let weapon = WeaponSpec::new(10, Fixed::from_num(5), 100).with_projectile_speed(Fixed::from_bits(1));
        arena.shooter(0, 0, weapon, victim);

        arena.tick();
        let ttl = arena
            .store
            .iter()
            .find_map(|e| e.as_projectile())
            .map_or(0, |p| p.ttl);
        // Launched this tick, stepped at most once.
        assert!(ttl >= u32::MAX - 1, "ttl {ttl}");
        arena.tick();
        assert_eq!(arena.health(victim), 100);
    }

    #[test]
    fn test_single_target_projectile_expires_when_target_dies() {
        let mut arena = Arena::new();
        let victim = arena.dummy(1, 4, 0, 100);
        let bystander = arena.dummy(1, 4, 1, 100);
        let weapon = WeaponSpec::new(10, Fixed::from_num(5), 100).with_projectile_speed(Fixed::ONE);
        arena.shooter(0, 0, weapon, victim);

        arena.tick();
        arena.store.mark_destroyed(victim);
        for _ in 0..6 {
            arena.tick();
        }
        assert_eq!(arena.health(bystander), 100);
        assert_eq!(arena.projectiles(), 0);
    }

    #[test]
    fn test_splash_projectile_retargets() {
        let mut arena = Arena::new();
        let victim = arena.dummy(1, 4, 0, 100);
        let bystander = arena.dummy(1, 5, 1, 100);
        let weapon = WeaponSpec::new(10, Fixed::from_num(5), 100)
            .with_projectile_speed(Fixed::ONE)
            .with_splash(Fixed::from_num(2));
        arena.shooter(0, 0, weapon, victim);

        arena.tick();
        arena.store.mark_destroyed(victim);
        for _ in 0..8 {
            arena.tick();
        }
        assert_eq!(arena.health(bystander), 90);
    }

    #[test]
    fn test_splash_hits_every_hostile_in_radius() {
        let mut arena = Arena::new();
        let a = arena.dummy(1, 10, 10, 100);
        let b = arena.dummy(1, 11, 10, 100);
        let far = arena.dummy(1, 20, 10, 100);
        let friendly = arena.dummy(0, 10, 11, 100);

        let dealt = apply_hit(
            &mut arena.store,
            &arena.spatial,
            Hit {
                source: 99,
                team: 0,
                point: Vec2Fixed::from_ints(10, 10),
                primary: Some(a),
                damage: 20,
                damage_type: DamageType::Kinetic,
                splash_radius: Fixed::from_num(2),
            },
            &mut arena.events,
        );
        assert_eq!(dealt, 40);
        assert_eq!(arena.health(a), 80);
        assert_eq!(arena.health(b), 80);
        assert_eq!(arena.health(far), 100);
        assert_eq!(arena.health(friendly), 100);
    }

    #[test]
    fn test_damage_on_dead_entity_has_no_effect() {
        let mut arena = Arena::new();
        let victim = arena.dummy(1, 1, 0, 15);
        let hit = Hit {
            source: 99,
            team: 0,
            point: Vec2Fixed::from_ints(1, 0),
            primary: Some(victim),
            damage: 20,
            damage_type: DamageType::Kinetic,
            splash_radius: Fixed::ZERO,
        };

        assert_eq!(apply_hit(&mut arena.store, &arena.spatial, hit, &mut arena.events), 15);
        assert!(arena.store.is_marked(victim));
        assert_eq!(apply_hit(&mut arena.store, &arena.spatial, hit, &mut arena.events), 0);
        assert_eq!(arena.health(victim), 0);
        assert_eq!(arena.store.pending_count(), 1);
    }

    #[test]
    fn test_turret_acquires_and_fires() {
        let mut arena = Arena::new();
        let mut turret = Building::new(BuildingTypeId(0), Footprint::new(1, 1));
        turret.weapon = Some(WeaponSpec::new(20, Fixed::from_num(6), 10));
        arena.spawn(0, 0, 0, 200, EntityKind::Building(turret));
        let intruder = arena.dummy(1, 5, 0, 100);

        arena.tick();
        assert_eq!(arena.health(intruder), 80);
    }

    #[test]
    fn test_move_order_holds_fire() {
        let mut arena = Arena::new();
        let victim = arena.dummy(1, 3, 0, 100);
        let shooter = arena.shooter(0, 0, WeaponSpec::new(10, Fixed::from_num(5), 3), victim);
        if let Some(unit) = arena.store.get_mut(shooter).and_then(Entity::as_unit_mut) {
            unit.order = Order::Move(Vec2Fixed::from_ints(0, 10));
        }
        arena.tick();
        assert_eq!(arena.health(victim), 100);
    }
}
