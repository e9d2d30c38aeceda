//! Movement and target acquisition.
//!
//! This phase runs on the rayon pool. Workers read the store, the spatial
//! index and the terrain immutably and return one [`UnitIntent`] per unit.
//! Intents are applied afterwards on the scheduler thread, each writing
//! only its own unit, so the result does not depend on worker scheduling.

use rayon::prelude::*;

use crate::components::{Entity, EntityId, Order, TeamId, Unit, UnitClass};
use crate::config::SimConfig;
use crate::math::{Fixed, Vec2Fixed};
use crate::spatial::SpatialIndex;
use crate::store::EntityStore;
use crate::terrain::TerrainGrid;

/// Longest lead, in ticks, a pursuer extrapolates its target's motion.
const MAX_LEAD_TICKS: i32 = 20;

/// Result of planning one unit's tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitIntent {
    /// Unit this intent belongs to.
    pub id: EntityId,
    /// Position after this tick.
    pub position: Vec2Fixed,
    /// Order after this tick.
    pub order: Order,
    /// Target after this tick.
    pub target: Option<EntityId>,
    /// Updated blocked counter.
    pub blocked_ticks: u32,
    /// Formation offset after this tick.
    pub formation_offset: Vec2Fixed,
}

/// Read-only world view shared by movement workers.
#[derive(Clone, Copy)]
pub struct MovementContext<'a> {
    /// Entity data.
    pub store: &'a EntityStore,
    /// Spatial index matching the store.
    pub spatial: &'a SpatialIndex,
    /// Terrain and building footprints.
    pub terrain: &'a TerrainGrid,
    /// Tuning.
    pub config: &'a SimConfig,
}

/// Split live units into work items: one partition per owner, with large
/// partitions cut into `chunk_size` pieces. Ids inside a partition are
/// ascending.
#[must_use]
pub fn partition_units(store: &EntityStore, chunk_size: usize) -> Vec<Vec<EntityId>> {
    let mut by_owner: Vec<Vec<EntityId>> = Vec::new();
    for entity in store.iter() {
        if entity.as_unit().is_none() || store.is_marked(entity.id) {
            continue;
        }
        let owner = entity.owner as usize;
        if by_owner.len() <= owner {
            by_owner.resize_with(owner + 1, Vec::new);
        }
        by_owner[owner].push(entity.id);
    }

    let chunk_size = chunk_size.max(1);
    by_owner
        .into_iter()
        .filter(|ids| !ids.is_empty())
        .flat_map(|ids| {
            ids.chunks(chunk_size)
                .map(<[EntityId]>::to_vec)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Plan every unit in `partitions` on `pool`. Intents come back sorted by id.
#[must_use]
pub fn compute_intents(
    pool: &rayon::ThreadPool,
    ctx: MovementContext<'_>,
    partitions: &[Vec<EntityId>],
) -> Vec<UnitIntent> {
    let mut intents: Vec<UnitIntent> = pool.install(|| {
        partitions
            .par_iter()
            .flat_map_iter(|chunk| chunk.iter().filter_map(move |&id| plan_unit(ctx, id)))
            .collect()
    });
    intents.sort_unstable_by_key(|intent| intent.id);
    intents
}

/// Write intents back. Each intent only touches its own unit.
pub fn apply_intents(store: &mut EntityStore, spatial: &mut SpatialIndex, intents: &[UnitIntent]) {
    for intent in intents {
        if store.is_marked(intent.id) {
            continue;
        }
        let Some(entity) = store.get_mut(intent.id) else {
            continue;
        };
        let previous = entity.position;
        entity.position = intent.position;
        if let Some(unit) = entity.as_unit_mut() {
            unit.last_step = intent.position - previous;
            unit.order = intent.order;
            unit.target = intent.target;
            unit.blocked_ticks = intent.blocked_ticks;
            unit.formation_offset = intent.formation_offset;
        }
        if intent.position != previous {
            spatial.update(intent.id, intent.position);
        }
    }
}

/// Nearest live hostile of `team` within `range` of `from`.
///
/// Ties on distance go to the lowest id.
#[must_use]
pub fn acquire_target(
    store: &EntityStore,
    spatial: &SpatialIndex,
    from: Vec2Fixed,
    team: TeamId,
    range: Fixed,
) -> Option<EntityId> {
    spatial
        .query_circle(from, range)
        .into_iter()
        .filter_map(|id| store.resolve(id))
        .filter(|e| e.is_targetable() && e.is_hostile_to(team))
        .map(|e| (e.position.distance_squared(from), e.id))
        .min()
        .map(|(_, id)| id)
}

/// Plan a single unit's tick.
#[must_use]
pub fn plan_unit(ctx: MovementContext<'_>, id: EntityId) -> Option<UnitIntent> {
    let entity = ctx.store.resolve(id)?;
    let unit = entity.as_unit()?;

    let mut intent = UnitIntent {
        id,
        position: entity.position,
        order: unit.order,
        target: unit.target,
        blocked_ticks: unit.blocked_ticks,
        formation_offset: unit.formation_offset,
    };

    refresh_target(ctx, entity, unit, &mut intent);

    let goal = match intent.order {
        Order::Idle | Order::Hold => None,
        Order::Move(dest) | Order::FollowRally(dest) => {
            Some(dest.saturating_add(intent.formation_offset))
        }
        Order::AttackMove(dest) => {
            if intent.target.is_some() {
                // Engaging: stand and fight, resume once the target is gone.
                None
            } else {
                Some(dest.saturating_add(intent.formation_offset))
            }
        }
        Order::Attack(victim) => chase_point(ctx, entity, unit, victim),
    };

    if let Some(goal) = goal {
        step_toward(ctx, entity, unit, goal, &mut intent);
    }

    Some(intent)
}

/// Drop dead or out-of-range targets, then acquire a new one if allowed.
fn refresh_target(ctx: MovementContext<'_>, entity: &Entity, unit: &Unit, intent: &mut UnitIntent) {
    let Some(weapon) = unit.weapon else {
        intent.target = None;
        if matches!(intent.order, Order::Attack(_)) {
            intent.order = Order::Idle;
        }
        return;
    };

    if let Order::Attack(victim) = intent.order {
        let alive = ctx
            .store
            .resolve(victim)
            .is_some_and(|v| v.is_targetable() && v.is_hostile_to(entity.team));
        if alive {
            intent.target = Some(victim);
            return;
        }
        intent.order = Order::Idle;
        intent.target = None;
    }

    if !intent.order.engages() {
        intent.target = None;
        return;
    }

    if let Some(current) = intent.target {
        let keep = ctx.store.resolve(current).is_some_and(|t| {
            t.is_targetable()
                && t.is_hostile_to(entity.team)
                && t.position.distance_squared(entity.position) <= weapon.range_squared()
        });
        if !keep {
            intent.target = None;
        }
    }

    if intent.target.is_none() {
        intent.target = acquire_target(ctx.store, ctx.spatial, entity.position, entity.team, weapon.range);
    }
}

/// Where a pursuer should head this tick, or `None` once in range.
fn chase_point(
    ctx: MovementContext<'_>,
    entity: &Entity,
    unit: &Unit,
    victim: EntityId,
) -> Option<Vec2Fixed> {
    let target = ctx.store.resolve(victim)?;
    let range_sq = unit.weapon.map_or(Fixed::ZERO, |w| w.range_squared());
    let distance_sq = target.position.distance_squared(entity.position);
    if distance_sq <= range_sq {
        return None;
    }

    // Lead the target by the time it takes to close the gap.
    let target_step = target.as_unit().map_or(Vec2Fixed::ZERO, |t| t.last_step);
    if target_step.is_zero() || unit.speed <= Fixed::ZERO {
        return Some(target.position);
    }
    let distance = crate::math::fixed_sqrt(distance_sq);
    let lead = (distance / unit.speed).min(Fixed::from_num(MAX_LEAD_TICKS));
    Some(target.position.saturating_add(target_step.scale(lead)))
}

fn step_toward(
    ctx: MovementContext<'_>,
    entity: &Entity,
    unit: &Unit,
    goal: Vec2Fixed,
    intent: &mut UnitIntent,
) {
    let position = entity.position;
    let goal = ctx.terrain.clamp_to_map(goal);
    let remaining = position.distance(goal);
    let arrives_on_arrival = !matches!(intent.order, Order::Attack(_));

    if remaining <= ctx.config.arrival_tolerance && arrives_on_arrival {
        finish_order(intent);
        return;
    }
    if unit.speed <= Fixed::ZERO {
        return;
    }

    let seek = if remaining <= unit.speed {
        goal - position
    } else {
        (goal - position).clamp_length(unit.speed)
    };
    let step = (seek + separation(ctx, entity, unit)).clamp_length(unit.speed);
    let next = resolve_step(ctx.terrain, unit.class, position, step);

    let progress = remaining - next.distance(goal);
    if progress > unit.speed / Fixed::from_num(8) {
        intent.blocked_ticks = 0;
    } else {
        intent.blocked_ticks += 1;
    }
    intent.position = next;

    if arrives_on_arrival && next.distance(goal) <= ctx.config.arrival_tolerance {
        if unit.class.is_airborne() || ctx.terrain.is_walkable_at(goal) {
            intent.position = goal;
        }
        finish_order(intent);
    } else if intent.blocked_ticks > ctx.config.blocked_tick_limit {
        // The order fails; the unit stops where it is.
        intent.order = Order::Idle;
        intent.target = None;
        intent.blocked_ticks = 0;
        intent.formation_offset = Vec2Fixed::ZERO;
    }
}

fn finish_order(intent: &mut UnitIntent) {
    intent.order = Order::Idle;
    intent.blocked_ticks = 0;
    intent.formation_offset = Vec2Fixed::ZERO;
}

/// Push away from nearby units so groups spread out instead of stacking.
fn separation(ctx: MovementContext<'_>, entity: &Entity, unit: &Unit) -> Vec2Fixed {
    let radius = ctx.config.separation_radius;
    if radius <= Fixed::ZERO || ctx.config.separation_weight <= Fixed::ZERO {
        return Vec2Fixed::ZERO;
    }

    let mut push = Vec2Fixed::ZERO;
    for other_id in ctx.spatial.query_circle(entity.position, radius) {
        if other_id == entity.id {
            continue;
        }
        let Some(other) = ctx.store.resolve(other_id) else {
            continue;
        };
        let Some(other_unit) = other.as_unit() else {
            continue;
        };
        if other_unit.class.is_airborne() != unit.class.is_airborne() {
            continue;
        }

        let away = entity.position - other.position;
        let distance = away.length();
        let direction = if distance == Fixed::ZERO {
            // Exactly stacked: split along x by id so the pair separates.
            if entity.id > other_id {
                Vec2Fixed::new(Fixed::ONE, Fixed::ZERO)
            } else {
                Vec2Fixed::new(-Fixed::ONE, Fixed::ZERO)
            }
        } else {
            away.scale(Fixed::ONE / distance)
        };
        let strength = (radius - distance) / radius;
        push += direction.scale(strength);
    }

    push.clamp_length(Fixed::ONE)
        .scale(unit.speed * ctx.config.separation_weight)
}

/// Apply `step`, sliding along blocked axes. Aircraft ignore terrain.
fn resolve_step(terrain: &TerrainGrid, class: UnitClass, from: Vec2Fixed, step: Vec2Fixed) -> Vec2Fixed {
    let full = terrain.clamp_to_map(from + step);
    if class.is_airborne() {
        return full;
    }
    if terrain.is_walkable_at(full) {
        return full;
    }
    let slide_x = terrain.clamp_to_map(Vec2Fixed::new(from.x + step.x, from.y));
    if step.x != Fixed::ZERO && terrain.is_walkable_at(slide_x) {
        return slide_x;
    }
    let slide_y = terrain.clamp_to_map(Vec2Fixed::new(from.x, from.y + step.y));
    if step.y != Fixed::ZERO && terrain.is_walkable_at(slide_y) {
        return slide_y;
    }
    from
}
