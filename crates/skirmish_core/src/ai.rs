//! AI opponents.
//!
//! Every AI player runs the same state machine. Personalities are data: a
//! [`PersonalityProfile`] of thresholds read by [`decide`]. A controller only
//! looks at its own entities, its own economy and what its units and
//! buildings can currently see, and acts exclusively by submitting
//! [`PlayerOrder`]s to the shared order queue, so AI orders are validated
//! and applied on the next tick exactly like a human's.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{Entity, EntityId, Order, PlayerId};
use crate::economy::{Controller, Player};
use crate::error::ConfigError;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::orders::{OrderKind, OrderSender, PlayerOrder};
use crate::production::{BlueprintRegistry, BuildingBlueprint, ProductionKind};
use crate::spatial::SpatialIndex;
use crate::store::EntityStore;
use crate::terrain::TerrainGrid;

// ============================================================================
// Personalities
// ============================================================================

/// AI temperament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Personality {
    /// Attacks early with moderate economy.
    Aggressive,
    /// Turtles behind turrets and a large army.
    Defensive,
    /// Minimal economy, floods cheap infantry.
    Rusher,
    /// Middle of the road.
    Balanced,
}

impl Personality {
    /// All personalities.
    pub const ALL: [Self; 4] = [Self::Aggressive, Self::Defensive, Self::Rusher, Self::Balanced];

    const fn index(self) -> usize {
        match self {
            Self::Aggressive => 0,
            Self::Defensive => 1,
            Self::Rusher => 2,
            Self::Balanced => 3,
        }
    }
}

/// Threshold table driving one personality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    /// Personality this profile applies to.
    pub personality: Personality,
    /// Multiplier on own strength when comparing against scouted enemies.
    #[serde(with = "fixed_serde")]
    pub aggression_bias: Fixed,
    /// Armed units needed to launch an attack.
    pub attack_army_size: u32,
    /// An ongoing attack continues while at least this many armed units remain.
    pub retreat_army_size: u32,
    /// Attack early once `army * aggression_bias >= enemy_strength * push_ratio`.
    #[serde(with = "fixed_serde")]
    pub push_ratio: Fixed,
    /// Income buildings wanted before building up the military.
    pub economy_target: u32,
    /// Unit-producing buildings wanted.
    pub production_target: u32,
    /// Armed buildings wanted.
    pub defense_target: u32,
    /// Credits above which spare money goes into more buildings.
    pub expand_credits: u32,
    /// Evaluations between scouting runs while the enemy base is unknown.
    pub scout_interval: u32,
    /// Hostile units this close to the headquarters count as a threat.
    #[serde(with = "fixed_serde")]
    pub threat_radius: Fixed,
    /// How far toward the enemy rally points are pushed.
    #[serde(with = "fixed_serde")]
    pub rally_distance: Fixed,
    /// Unit blueprints trained first when a building offers them.
    #[serde(default)]
    pub preferred_units: Vec<String>,
}

impl PersonalityProfile {
    /// Built-in profile for a personality.
    #[must_use]
    pub fn builtin(personality: Personality) -> Self {
        let (bias, attack, retreat, push) = match personality {
            Personality::Aggressive => (12, 5, 2, 10),
            Personality::Rusher => (12, 3, 1, 8),
            Personality::Balanced => (10, 8, 3, 12),
            Personality::Defensive => (8, 12, 5, 15),
        };
        let (economy, production, defense, expand, scout) = match personality {
            Personality::Aggressive => (2, 2, 1, 2500, 3),
            Personality::Rusher => (1, 1, 0, 3000, 2),
            Personality::Balanced => (3, 2, 2, 2000, 4),
            Personality::Defensive => (3, 1, 3, 1500, 6),
        };
        let (threat, rally) = match personality {
            Personality::Aggressive => (12, 10),
            Personality::Rusher => (10, 14),
            Personality::Balanced => (12, 8),
            Personality::Defensive => (16, 5),
        };
        Self {
            personality,
            aggression_bias: tenths(bias),
            attack_army_size: attack,
            retreat_army_size: retreat,
            push_ratio: tenths(push),
            economy_target: economy,
            production_target: production,
            defense_target: defense,
            expand_credits: expand,
            scout_interval: scout,
            threat_radius: Fixed::from_num(threat),
            rally_distance: Fixed::from_num(rally),
            preferred_units: match personality {
                Personality::Rusher => vec!["infantry".to_string()],
                _ => Vec::new(),
            },
        }
    }

    /// Check thresholds are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = format!("personalities.{:?}", self.personality);
        let invalid = |field: &str, message: &str| ConfigError::InvalidValue {
            field: format!("{name}.{field}"),
            message: message.to_string(),
        };
        if self.attack_army_size == 0 {
            return Err(invalid("attack_army_size", "must be positive"));
        }
        if self.retreat_army_size > self.attack_army_size {
            return Err(invalid("retreat_army_size", "must not exceed attack_army_size"));
        }
        if self.aggression_bias <= Fixed::ZERO {
            return Err(invalid("aggression_bias", "must be positive"));
        }
        if self.push_ratio <= Fixed::ZERO {
            return Err(invalid("push_ratio", "must be positive"));
        }
        if self.scout_interval == 0 {
            return Err(invalid("scout_interval", "must be positive"));
        }
        if self.threat_radius <= Fixed::ZERO {
            return Err(invalid("threat_radius", "must be positive"));
        }
        Ok(())
    }
}

fn tenths(value: i32) -> Fixed {
    Fixed::from_num(value) / Fixed::from_num(10)
}

/// Profiles for every personality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTable {
    profiles: [PersonalityProfile; 4],
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            profiles: Personality::ALL.map(PersonalityProfile::builtin),
        }
    }
}

impl ProfileTable {
    /// Replace the profile for `profile.personality`.
    pub fn set(&mut self, profile: PersonalityProfile) {
        let index = profile.personality.index();
        self.profiles[index] = profile;
    }

    /// Profile for a personality.
    #[must_use]
    pub fn get(&self, personality: Personality) -> &PersonalityProfile {
        &self.profiles[personality.index()]
    }
}

// ============================================================================
// Knowledge
// ============================================================================

/// What a player knows about its enemies from scouting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyIntel {
    /// Last enemy headquarters seen.
    pub enemy_hq: Option<EntityId>,
    /// Where that headquarters stands.
    pub enemy_hq_position: Option<Vec2Fixed>,
    /// Most armed hostile units seen in a single scan.
    pub enemy_strength: u32,
    /// Tick of the last sighting.
    pub last_seen_tick: Option<u64>,
}

/// Decision state of an AI player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiState {
    /// Spend surplus on more production and power.
    Expand,
    /// Build income buildings.
    #[default]
    BuildEconomy,
    /// Build production buildings and train units.
    BuildMilitary,
    /// Send a unit to find the enemy base.
    Scout,
    /// Send the army at the enemy base.
    Attack,
    /// Fight off units near the base.
    Defend,
}

/// Building role derived from a blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildingRole {
    /// Command center.
    Headquarters,
    /// Produces credits.
    Economy,
    /// Net power producer.
    Power,
    /// Trains units.
    Production,
    /// Armed structure.
    Defense,
    /// Anything else.
    Other,
}

impl BuildingRole {
    /// Classify a blueprint.
    #[must_use]
    pub fn of(blueprint: &BuildingBlueprint) -> Self {
        if blueprint.is_headquarters {
            Self::Headquarters
        } else if blueprint.income > 0 {
            Self::Economy
        } else if blueprint.weapon.is_some() {
            Self::Defense
        } else if blueprint
            .produces
            .iter()
            .any(|p| matches!(p, ProductionKind::Unit(_)))
        {
            Self::Production
        } else if blueprint.power_output > blueprint.power_usage {
            Self::Power
        } else {
            Self::Other
        }
    }
}

/// A player's view of its own forces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Own headquarters position.
    pub headquarters: Option<Vec2Fixed>,
    /// Own armed units, ascending.
    pub army: Vec<EntityId>,
    /// Own units with no order, ascending.
    pub idle: Vec<EntityId>,
    /// Income buildings, built or queued.
    pub economy: u32,
    /// Unit-producing buildings, built or queued.
    pub production: u32,
    /// Armed buildings, built or queued.
    pub defenses: u32,
    /// Power buildings queued but not yet active.
    pub power_pending: u32,
    /// Hostile units near the headquarters, nearest first.
    pub threats: Vec<Vec2Fixed>,
    /// Credits available.
    pub credits: u32,
    /// Power produced minus consumed.
    pub power_balance: i64,
}

impl Observation {
    fn army_size(&self) -> u32 {
        u32::try_from(self.army.len()).unwrap_or(u32::MAX)
    }
}

/// Pick the next state from what the player can observe.
#[must_use]
pub fn decide(
    profile: &PersonalityProfile,
    current: AiState,
    observation: &Observation,
    intel: &EnemyIntel,
    scout_due: bool,
) -> AiState {
    let army = observation.army_size();

    if !observation.threats.is_empty() && army > 0 {
        return AiState::Defend;
    }

    let pushing = intel.enemy_strength > 0
        && army >= profile.retreat_army_size.max(1)
        && Fixed::from_num(army) * profile.aggression_bias
            >= Fixed::from_num(intel.enemy_strength) * profile.push_ratio;
    let holding = current == AiState::Attack && army >= profile.retreat_army_size.max(1);
    if army >= profile.attack_army_size || holding || pushing {
        return AiState::Attack;
    }

    if observation.economy < profile.economy_target {
        return AiState::BuildEconomy;
    }
    if observation.production < profile.production_target {
        return AiState::BuildMilitary;
    }
    if scout_due && intel.enemy_hq_position.is_none() && !observation.idle.is_empty() {
        return AiState::Scout;
    }
    if observation.credits >= profile.expand_credits {
        return AiState::Expand;
    }
    AiState::BuildMilitary
}

// ============================================================================
// Controller
// ============================================================================

/// Read-only world parts an AI controller may consult.
#[derive(Clone, Copy)]
pub struct AiWorld<'a> {
    /// Entity store.
    pub store: &'a EntityStore,
    /// Spatial index for sight queries.
    pub spatial: &'a SpatialIndex,
    /// Map bounds.
    pub terrain: &'a TerrainGrid,
    /// Blueprints.
    pub registry: &'a BlueprintRegistry,
    /// Personality thresholds.
    pub profiles: &'a ProfileTable,
    /// Current tick.
    pub tick: u64,
}

/// One AI player's decision loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiController {
    player: PlayerId,
    personality: Personality,
    state: AiState,
    evaluations: u64,
    last_scout: u64,
    next_due: u64,
}

struct OwnBuilding<'a> {
    id: EntityId,
    blueprint: &'a BuildingBlueprint,
    active: bool,
    queued: usize,
    full: bool,
    rally: Option<Vec2Fixed>,
}

impl AiController {
    /// Create a controller for an AI player.
    #[must_use]
    pub fn new(player: PlayerId, personality: Personality) -> Self {
        Self {
            player,
            personality,
            state: AiState::default(),
            evaluations: 0,
            last_scout: 0,
            next_due: 0,
        }
    }

    /// Controlled player.
    #[must_use]
    pub const fn player(&self) -> PlayerId {
        self.player
    }

    /// Personality.
    #[must_use]
    pub const fn personality(&self) -> Personality {
        self.personality
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AiState {
        self.state
    }

    /// Observe, decide and submit orders. Returns the number of orders sent.
    pub fn evaluate(&mut self, world: AiWorld<'_>, player: &mut Player, sender: &OrderSender) -> usize {
        let profile = world.profiles.get(self.personality);
        scan(world, player, profile);

        let buildings = self.own_buildings(world);
        let observation = self.observe(world, player, profile, &buildings);

        self.evaluations += 1;
        let scout_due = self.evaluations - self.last_scout >= u64::from(profile.scout_interval);
        let next = decide(profile, self.state, &observation, &player.intel, scout_due);
        if next != self.state {
            debug!(player = self.player, from = ?self.state, to = ?next, "ai state change");
            self.state = next;
        }

        let mut orders = Vec::new();
        let mut budget = observation.credits;
        self.plan(world, profile, player, &observation, &buildings, &mut budget, &mut orders);

        let sent = orders.len();
        for kind in orders {
            sender.submit(PlayerOrder::new(self.player, kind));
        }
        sent
    }

    fn own_buildings<'a>(&self, world: AiWorld<'a>) -> Vec<OwnBuilding<'a>> {
        world
            .store
            .owned_by(self.player)
            .filter_map(|e| {
                let building = e.as_building()?;
                let blueprint = world.registry.building(building.building_type)?;
                Some(OwnBuilding {
                    id: e.id,
                    blueprint,
                    active: building.is_active(),
                    queued: building.queue.len(),
                    full: building.queue.is_full(),
                    rally: building.rally_point,
                })
            })
            .collect()
    }

    fn observe(
        &self,
        world: AiWorld<'_>,
        player: &Player,
        profile: &PersonalityProfile,
        buildings: &[OwnBuilding<'_>],
    ) -> Observation {
        let mut observation = Observation {
            credits: player.credits,
            power_balance: player.power_balance(),
            ..Observation::default()
        };

        for entity in world.store.owned_by(self.player) {
            if let Some(unit) = entity.as_unit() {
                if unit.weapon.is_some() {
                    observation.army.push(entity.id);
                }
                if unit.order == Order::Idle {
                    observation.idle.push(entity.id);
                }
            } else if entity
                .as_building()
                .and_then(|b| world.registry.building(b.building_type))
                .is_some_and(|bp| bp.is_headquarters)
                && observation.headquarters.is_none()
            {
                observation.headquarters = Some(entity.position);
            }
        }

        for building in buildings {
            count_role(&mut observation, BuildingRole::of(building.blueprint), !building.active);
            let Some(store_entity) = world.store.get(building.id) else {
                continue;
            };
            let queue = store_entity.as_building().map(|b| &b.queue);
            for item in queue.into_iter().flat_map(|q| q.items.iter()) {
                if let ProductionKind::Building(id) = item.kind {
                    if let Some(bp) = world.registry.building(id) {
                        count_role(&mut observation, BuildingRole::of(bp), true);
                    }
                }
            }
        }

        if let Some(hq) = observation.headquarters {
            let team = player.team;
            let mut threats: Vec<&Entity> = world
                .spatial
                .query_circle(hq, profile.threat_radius)
                .into_iter()
                .filter_map(|id| world.store.resolve(id))
                .filter(|e| e.is_hostile_to(team) && e.as_unit().is_some())
                .collect();
            threats.sort_unstable_by_key(|e| (e.position.distance_squared(hq), e.id));
            observation.threats = threats.into_iter().map(|e| e.position).collect();
        }

        observation
    }

    #[allow(clippy::too_many_arguments)]
    fn plan(
        &mut self,
        world: AiWorld<'_>,
        profile: &PersonalityProfile,
        player: &Player,
        observation: &Observation,
        buildings: &[OwnBuilding<'_>],
        budget: &mut u32,
        orders: &mut Vec<OrderKind>,
    ) {
        // Keep the lights on whatever the state.
        if observation.power_balance < 0 && observation.power_pending == 0 {
            self.build(world, buildings, BuildingRole::Power, budget, orders);
        }

        match self.state {
            AiState::BuildEconomy => {
                self.build(world, buildings, BuildingRole::Economy, budget, orders);
            }
            AiState::BuildMilitary => {
                if observation.production < profile.production_target {
                    self.build(world, buildings, BuildingRole::Production, budget, orders);
                }
                self.train(world, profile, buildings, budget, orders);
            }
            AiState::Expand => {
                let role = if observation.production <= observation.economy {
                    BuildingRole::Production
                } else {
                    BuildingRole::Economy
                };
                self.build(world, buildings, role, budget, orders);
                self.train(world, profile, buildings, budget, orders);
            }
            AiState::Scout => {
                if let Some(&scout) = observation.idle.first() {
                    let destination = guess_enemy_base(world, observation, &player.intel);
                    orders.push(OrderKind::Move {
                        units: vec![scout],
                        destination,
                    });
                    self.last_scout = self.evaluations;
                }
                self.train(world, profile, buildings, budget, orders);
            }
            AiState::Attack => {
                let destination = guess_enemy_base(world, observation, &player.intel);
                let units: Vec<EntityId> = observation
                    .army
                    .iter()
                    .copied()
                    .filter(|&id| !is_engaged(world.store, id))
                    .collect();
                if !units.is_empty() {
                    orders.push(OrderKind::AttackMove { units, destination });
                }
                self.train(world, profile, buildings, budget, orders);
            }
            AiState::Defend => {
                if let Some(&threat) = observation.threats.first() {
                    orders.push(OrderKind::AttackMove {
                        units: observation.army.clone(),
                        destination: threat,
                    });
                }
                if observation.defenses < profile.defense_target {
                    self.build(world, buildings, BuildingRole::Defense, budget, orders);
                }
                self.train(world, profile, buildings, budget, orders);
            }
        }

        self.manage_rally(world, profile, observation, &player.intel, buildings, orders);
    }

    /// Queue the cheapest affordable building of `role` in the first
    /// producer that can make one.
    fn build(
        &self,
        world: AiWorld<'_>,
        buildings: &[OwnBuilding<'_>],
        role: BuildingRole,
        budget: &mut u32,
        orders: &mut Vec<OrderKind>,
    ) {
        let choice = buildings
            .iter()
            .filter(|b| b.active && !b.full)
            .flat_map(|b| {
                b.blueprint.produces.iter().filter_map(move |item| match item {
                    ProductionKind::Building(id) => Some((b.id, *id)),
                    ProductionKind::Unit(_) => None,
                })
            })
            .filter_map(|(producer, id)| {
                let bp = world.registry.building(id)?;
                (BuildingRole::of(bp) == role && bp.cost <= *budget)
                    .then(|| (bp.cost, producer, bp.name.clone()))
            })
            .min();

        if let Some((cost, building, item)) = choice {
            *budget -= cost;
            orders.push(OrderKind::Produce { building, item });
        }
    }

    /// Queue one unit in every idle-ish production building.
    fn train(
        &self,
        world: AiWorld<'_>,
        profile: &PersonalityProfile,
        buildings: &[OwnBuilding<'_>],
        budget: &mut u32,
        orders: &mut Vec<OrderKind>,
    ) {
        for building in buildings.iter().filter(|b| b.active && b.queued < 2) {
            let options: Vec<_> = building
                .blueprint
                .produces
                .iter()
                .filter_map(|item| match item {
                    ProductionKind::Unit(id) => world.registry.unit(*id),
                    ProductionKind::Building(_) => None,
                })
                .filter(|bp| bp.cost <= *budget && bp.weapon.is_some())
                .collect();
            if options.is_empty() {
                continue;
            }

            let preferred = options
                .iter()
                .find(|bp| profile.preferred_units.iter().any(|name| *name == bp.name));
            let index = usize::try_from(self.evaluations).unwrap_or(0) % options.len();
            let pick = preferred.unwrap_or(&options[index]);

            *budget -= pick.cost;
            orders.push(OrderKind::Produce {
                building: building.id,
                item: pick.name.clone(),
            });
        }
    }

    /// Point production rally points partway toward the known enemy base.
    fn manage_rally(
        &self,
        world: AiWorld<'_>,
        profile: &PersonalityProfile,
        observation: &Observation,
        intel: &EnemyIntel,
        buildings: &[OwnBuilding<'_>],
        orders: &mut Vec<OrderKind>,
    ) {
        let (Some(hq), Some(enemy)) = (observation.headquarters, intel.enemy_hq_position) else {
            return;
        };
        let toward = enemy - hq;
        let advance = profile.rally_distance.min(toward.length() / Fixed::from_num(2));
        let point = world
            .terrain
            .clamp_to_map(hq + toward.normalize().scale(advance));

        for building in buildings
            .iter()
            .filter(|b| BuildingRole::of(b.blueprint) == BuildingRole::Production)
        {
            if building.rally != Some(point) {
                orders.push(OrderKind::SetRallyPoint {
                    building: building.id,
                    point,
                });
            }
        }
    }
}

fn count_role(observation: &mut Observation, role: BuildingRole, pending: bool) {
    match role {
        BuildingRole::Economy => observation.economy += 1,
        BuildingRole::Production => observation.production += 1,
        BuildingRole::Defense => observation.defenses += 1,
        BuildingRole::Power if pending => observation.power_pending += 1,
        BuildingRole::Power | BuildingRole::Headquarters | BuildingRole::Other => {}
    }
}

fn is_engaged(store: &EntityStore, id: EntityId) -> bool {
    store
        .get(id)
        .and_then(Entity::as_unit)
        .is_some_and(|u| matches!(u.order, Order::Attack(_) | Order::AttackMove(_)))
}

/// Known enemy headquarters, or the point opposite our own across the map.
fn guess_enemy_base(world: AiWorld<'_>, observation: &Observation, intel: &EnemyIntel) -> Vec2Fixed {
    if let Some(known) = intel.enemy_hq_position {
        return known;
    }
    let size = world.terrain.world_size();
    let guess = match observation.headquarters {
        Some(hq) => size - hq,
        None => size.scale(Fixed::from_num(0.5)),
    };
    world.terrain.clamp_to_map(guess)
}

/// Update `player.intel` from everything its entities can see.
fn scan(world: AiWorld<'_>, player: &mut Player, profile: &PersonalityProfile) {
    let team = player.team;
    let mut seen = BTreeSet::new();
    let mut home = None;

    for entity in world.store.owned_by(player.id) {
        let sight = match (entity.as_unit(), entity.as_building()) {
            (Some(unit), _) => unit.sight,
            (None, Some(building)) => {
                if world
                    .registry
                    .building(building.building_type)
                    .is_some_and(|bp| bp.is_headquarters)
                {
                    home = Some(entity.position);
                }
                profile.threat_radius
            }
            (None, None) => continue,
        };
        seen.extend(
            world
                .spatial
                .query_circle(entity.position, sight)
                .into_iter()
                .filter(|&id| world.store.resolve(id).is_some_and(|e| e.is_hostile_to(team))),
        );
    }

    let intel = &mut player.intel;
    if intel.enemy_hq.is_some_and(|id| world.store.resolve(id).is_none()) {
        intel.enemy_hq = None;
        intel.enemy_hq_position = None;
    }
    if seen.is_empty() {
        return;
    }

    let hostiles: Vec<&Entity> = seen.iter().filter_map(|&id| world.store.resolve(id)).collect();
    let armed = hostiles
        .iter()
        .filter(|e| e.as_unit().is_some_and(|u| u.weapon.is_some()))
        .count();
    intel.enemy_strength = intel
        .enemy_strength
        .max(u32::try_from(armed).unwrap_or(u32::MAX));
    intel.last_seen_tick = Some(world.tick);

    let origin = home.unwrap_or(Vec2Fixed::ZERO);
    let enemy_hq = hostiles
        .iter()
        .filter(|e| {
            e.as_building()
                .and_then(|b| world.registry.building(b.building_type))
                .is_some_and(|bp| bp.is_headquarters)
        })
        .min_by_key(|e| (e.position.distance_squared(origin), e.id))
        .map(|e| (e.id, e.position));
    if let Some((id, position)) = enemy_hq {
        if intel.enemy_hq != Some(id) {
            debug!(player = player.id, enemy_hq = id, "enemy headquarters spotted");
        }
        intel.enemy_hq = Some(id);
        intel.enemy_hq_position = Some(position);
    }
}

// ============================================================================
// Scheduling
// ============================================================================

/// Runs AI controllers under a per-tick budget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiDirector {
    controllers: Vec<AiController>,
    cursor: usize,
}

impl AiDirector {
    /// One controller per AI-controlled player.
    #[must_use]
    pub fn new(players: &[Player]) -> Self {
        let controllers = players
            .iter()
            .filter_map(|p| match p.controller {
                Controller::Ai(personality) => Some(AiController::new(p.id, personality)),
                Controller::Human => None,
            })
            .collect();
        Self {
            controllers,
            cursor: 0,
        }
    }

    /// All controllers.
    #[must_use]
    pub fn controllers(&self) -> &[AiController] {
        &self.controllers
    }

    /// Evaluate due controllers round-robin, at most `budget` of them, each
    /// at most once per `interval` ticks. Returns the number of orders sent.
    pub fn run(
        &mut self,
        world: AiWorld<'_>,
        players: &mut [Player],
        sender: &OrderSender,
        budget: usize,
        interval: u32,
    ) -> usize {
        let count = self.controllers.len();
        let mut evaluated = 0;
        let mut sent = 0;

        for step in 0..count {
            if evaluated >= budget {
                break;
            }
            let index = (self.cursor + step) % count;
            let controller = &mut self.controllers[index];
            let Some(player) = players.get_mut(controller.player as usize) else {
                continue;
            };
            if player.defeated || world.tick < controller.next_due {
                continue;
            }

            sent += controller.evaluate(world, player, sender);
            controller.next_due = world.tick + u64::from(interval.max(1));
            evaluated += 1;
            self.cursor = (index + 1) % count;
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(army: usize) -> Observation {
        Observation {
            army: (1..=army as u64).collect(),
            economy: 5,
            production: 5,
            credits: 100,
            ..Observation::default()
        }
    }

    #[test]
    fn test_aggressive_attacks_before_defensive() {
        let table = ProfileTable::default();
        let aggressive = table.get(Personality::Aggressive);
        let defensive = table.get(Personality::Defensive);
        assert!(aggressive.attack_army_size < defensive.attack_army_size);

        let intel = EnemyIntel::default();
        let army = observation(aggressive.attack_army_size as usize);
        assert_eq!(
            decide(aggressive, AiState::BuildMilitary, &army, &intel, false),
            AiState::Attack
        );
        assert_eq!(
            decide(defensive, AiState::BuildMilitary, &army, &intel, false),
            AiState::BuildMilitary
        );
    }

    #[test]
    fn test_threat_triggers_defend() {
        let profile = PersonalityProfile::builtin(Personality::Balanced);
        let mut obs = observation(2);
        obs.threats.push(Vec2Fixed::from_ints(3, 3));
        assert_eq!(
            decide(&profile, AiState::BuildEconomy, &obs, &EnemyIntel::default(), false),
            AiState::Defend
        );
    }

    #[test]
    fn test_attack_holds_until_retreat_size() {
        let profile = PersonalityProfile::builtin(Personality::Balanced);
        let intel = EnemyIntel::default();
        let obs = observation(profile.retreat_army_size as usize);
        assert_eq!(decide(&profile, AiState::Attack, &obs, &intel, false), AiState::Attack);
        let obs = observation(profile.retreat_army_size as usize - 1);
        assert_ne!(decide(&profile, AiState::Attack, &obs, &intel, false), AiState::Attack);
    }

    #[test]
    fn test_push_against_weak_enemy() {
        let profile = PersonalityProfile::builtin(Personality::Balanced);
        let intel = EnemyIntel {
            enemy_strength: 2,
            ..EnemyIntel::default()
        };
        let obs = observation(4);
        assert_eq!(decide(&profile, AiState::BuildMilitary, &obs, &intel, false), AiState::Attack);
    }

    #[test]
    fn test_economy_and_scouting_priorities() {
        let profile = PersonalityProfile::builtin(Personality::Balanced);
        let intel = EnemyIntel::default();
        let mut obs = observation(1);
        obs.economy = 0;
        assert_eq!(decide(&profile, AiState::Expand, &obs, &intel, true), AiState::BuildEconomy);

        obs.economy = profile.economy_target;
        obs.idle = vec![1];
        assert_eq!(decide(&profile, AiState::BuildEconomy, &obs, &intel, true), AiState::Scout);
        assert_eq!(
            decide(&profile, AiState::BuildEconomy, &obs, &intel, false),
            AiState::BuildMilitary
        );

        obs.credits = profile.expand_credits;
        assert_eq!(decide(&profile, AiState::BuildEconomy, &obs, &intel, false), AiState::Expand);
    }

    #[test]
    fn test_profile_validation() {
        for personality in Personality::ALL {
            PersonalityProfile::builtin(personality).validate().unwrap();
        }
        let mut broken = PersonalityProfile::builtin(Personality::Rusher);
        broken.retreat_army_size = broken.attack_army_size + 1;
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_profile_table_override() {
        let mut table = ProfileTable::default();
        let mut custom = PersonalityProfile::builtin(Personality::Defensive);
        custom.attack_army_size = 20;
        table.set(custom);
        assert_eq!(table.get(Personality::Defensive).attack_army_size, 20);
        assert_eq!(table.get(Personality::Rusher).personality, Personality::Rusher);
    }

    #[test]
    fn test_profile_from_ron() {
        let profile: PersonalityProfile = ron::from_str(
            r"(personality: Aggressive, aggression_bias: 1.5, attack_army_size: 2,
               retreat_army_size: 1, push_ratio: 1.0, economy_target: 1,
               production_target: 1, defense_target: 0, expand_credits: 500,
               scout_interval: 2, threat_radius: 10.0, rally_distance: 6.0)",
        )
        .unwrap();
        assert_eq!(profile.aggression_bias, Fixed::from_num(1.5));
        assert!(profile.preferred_units.is_empty());
    }
}
