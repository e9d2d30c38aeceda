//! Entity data definitions.
//!
//! Components are pure data with no tick logic. Every live entity is an
//! [`Entity`] owned by the [`EntityStore`](crate::store::EntityStore); other
//! entities refer to it only through its [`EntityId`].

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::production::{BuildingTypeId, ProductionQueue, UnitTypeId};

/// Unique identifier for entities. Never reused within a simulation.
pub type EntityId = u64;

/// Player index, `0..MAX_PLAYERS`.
pub type PlayerId = u8;

/// Alliance tag. Entities on different teams are hostile.
pub type TeamId = u8;

/// Maximum number of players in one simulation.
pub const MAX_PLAYERS: usize = 8;

// ============================================================================
// Combat Types
// ============================================================================

/// Damage type classification for weapons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DamageType {
    /// Bullets and shells. Full damage vs soft targets, poor vs buildings.
    #[default]
    Kinetic,
    /// Rockets, grenades, artillery. Strong vs heavy armor and buildings.
    Explosive,
    /// Consistent 75% vs everything.
    Energy,
}

impl DamageType {
    /// Damage multiplier for this damage type against an armor type.
    #[must_use]
    pub fn effectiveness_vs(self, armor: ArmorType) -> Fixed {
        use ArmorType::*;
        use DamageType::*;

        let percent = match (self, armor) {
            (Kinetic, Unarmored) => 100,
            (Kinetic, Light) => 75,
            (Kinetic, Heavy) => 50,
            (Kinetic, Building) => 25,

            (Explosive, Unarmored) => 50,
            (Explosive, Light) => 75,
            (Explosive, Heavy) => 100,
            (Explosive, Building) => 150,

            (Energy, _) => 75,
        };

        Fixed::from_num(percent) / Fixed::from_num(100)
    }

    /// Damage dealt to `armor` by a hit of `base` damage, rounded down,
    /// never below 1 for a non-zero hit on a susceptible target.
    #[must_use]
    pub fn damage_vs(self, base: u32, armor: ArmorType) -> u32 {
        let scaled = (Fixed::from_num(base) * self.effectiveness_vs(armor)).to_num::<u32>();
        if base > 0 && scaled == 0 {
            1
        } else {
            scaled
        }
    }
}

/// Armor classification for units and structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ArmorType {
    /// Infantry.
    #[default]
    Unarmored,
    /// Light vehicles and aircraft.
    Light,
    /// Tanks and artillery.
    Heavy,
    /// Structures.
    Building,
}

/// Movement class of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UnitClass {
    /// Foot soldiers.
    #[default]
    Infantry,
    /// Wheeled vehicles.
    Vehicle,
    /// Tracked armor.
    Tank,
    /// Helicopters. Ignore terrain passability.
    Aircraft,
}

impl UnitClass {
    /// Check if this unit class flies over terrain.
    #[must_use]
    pub const fn is_airborne(self) -> bool {
        matches!(self, Self::Aircraft)
    }

    /// Armor type appropriate for this class.
    #[must_use]
    pub const fn armor(self) -> ArmorType {
        match self {
            Self::Infantry => ArmorType::Unarmored,
            Self::Vehicle | Self::Aircraft => ArmorType::Light,
            Self::Tank => ArmorType::Heavy,
        }
    }
}

/// What a projectile does when its target is gone before impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ImpactPolicy {
    /// Expire without effect.
    #[default]
    SingleTarget,
    /// Retarget to the nearest hostile within the splash radius.
    Splash,
}

/// Weapon specification shared by units and turrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Damage per hit.
    pub damage: u32,
    /// Engagement range in world units.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Ticks between shots.
    pub cooldown: u32,
    /// Projectile travel speed per tick (0 = instant hit).
    #[serde(default, with = "fixed_serde")]
    pub projectile_speed: Fixed,
    /// Splash radius applied around the impact point (0 = single target).
    #[serde(default, with = "fixed_serde")]
    pub splash_radius: Fixed,
    /// Damage type.
    #[serde(default)]
    pub damage_type: DamageType,
    /// Behaviour when the target dies mid-flight.
    #[serde(default)]
    pub impact: ImpactPolicy,
}

impl WeaponSpec {
    /// Create a kinetic, instant-hit, single-target weapon.
    #[must_use]
    pub fn new(damage: u32, range: Fixed, cooldown: u32) -> Self {
        Self {
            damage,
            range,
            cooldown,
            projectile_speed: Fixed::ZERO,
            splash_radius: Fixed::ZERO,
            damage_type: DamageType::Kinetic,
            impact: ImpactPolicy::SingleTarget,
        }
    }

    /// Builder method to set projectile speed.
    #[must_use]
    pub fn with_projectile_speed(mut self, speed: Fixed) -> Self {
        self.projectile_speed = speed;
        self
    }

    /// Builder method to make the weapon a splash weapon.
    #[must_use]
    pub fn with_splash(mut self, radius: Fixed) -> Self {
        self.splash_radius = radius;
        self.impact = ImpactPolicy::Splash;
        self
    }

    /// Builder method to set damage type.
    #[must_use]
    pub const fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = damage_type;
        self
    }

    /// Whether hits land the same tick the weapon fires.
    #[must_use]
    pub fn is_instant(&self) -> bool {
        self.projectile_speed <= Fixed::ZERO
    }

    /// Squared range, for comparisons against `distance_squared`.
    #[must_use]
    pub fn range_squared(&self) -> Fixed {
        self.range.saturating_mul(self.range)
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if entity is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Saturates at zero, so damaging a dead entity deals nothing.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }

    /// Get health as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.max == 0 {
            0
        } else {
            let percent = u64::from(self.current) * 100 / u64::from(self.max);
            u32::try_from(percent).unwrap_or(u32::MAX)
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Current standing order of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum Order {
    /// No order. Units still auto-acquire targets in weapon range.
    #[default]
    Idle,
    /// Move to a point, ignoring enemies.
    Move(Vec2Fixed),
    /// Move to a point, stopping to engage hostiles in range.
    AttackMove(Vec2Fixed),
    /// Chase and attack a specific entity.
    Attack(EntityId),
    /// Stay put and fire at anything in range.
    Hold,
    /// Newly produced unit walking to its building's rally point.
    FollowRally(Vec2Fixed),
}

impl Order {
    /// Destination point of a movement order.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec2Fixed> {
        match self {
            Self::Move(p) | Self::AttackMove(p) | Self::FollowRally(p) => Some(*p),
            _ => None,
        }
    }

    /// Whether the unit is allowed to auto-acquire and fire at targets.
    #[must_use]
    pub const fn engages(&self) -> bool {
        !matches!(self, Self::Move(_))
    }
}

// ============================================================================
// Entity variants
// ============================================================================

/// A mobile unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Blueprint this unit was built from.
    pub unit_type: UnitTypeId,
    /// Movement class.
    pub class: UnitClass,
    /// Movement speed in world units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Weapon, if the unit can attack.
    pub weapon: Option<WeaponSpec>,
    /// Sight radius used for AI scouting.
    #[serde(with = "fixed_serde")]
    pub sight: Fixed,
    /// Current order.
    pub order: Order,
    /// Current target (weak reference, checked against the store each tick).
    pub target: Option<EntityId>,
    /// Offset from the group destination assigned when the order was issued.
    pub formation_offset: Vec2Fixed,
    /// Consecutive ticks the unit failed to make progress.
    pub blocked_ticks: u32,
    /// Ticks until the weapon can fire again.
    pub cooldown: u32,
    /// Displacement applied last tick (used by pursuers to lead the target).
    pub last_step: Vec2Fixed,
}

impl Unit {
    /// Create an idle unit.
    #[must_use]
    pub fn new(unit_type: UnitTypeId, class: UnitClass, speed: Fixed) -> Self {
        Self {
            unit_type,
            class,
            speed,
            weapon: None,
            sight: Fixed::from_num(8),
            order: Order::Idle,
            target: None,
            formation_offset: Vec2Fixed::ZERO,
            blocked_ticks: 0,
            cooldown: 0,
            last_step: Vec2Fixed::ZERO,
        }
    }

    /// Builder method to arm the unit.
    #[must_use]
    pub fn with_weapon(mut self, weapon: WeaponSpec) -> Self {
        self.weapon = Some(weapon);
        self
    }
}

/// Operational state of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingState {
    /// Being built; not producing, not powered, not earning.
    UnderConstruction {
        /// Progress so far in (possibly fractional) ticks.
        #[serde(with = "fixed_serde")]
        progress: Fixed,
        /// Total construction time in ticks.
        total: u32,
    },
    /// Fully operational.
    Active,
    /// Health reached zero; awaiting end-of-tick cleanup.
    Destroyed,
}

/// Building footprint in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Width in cells.
    pub width: u8,
    /// Height in cells.
    pub height: u8,
}

impl Footprint {
    /// Create a footprint.
    #[must_use]
    pub const fn new(width: u8, height: u8) -> Self {
        Self { width, height }
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

/// Periodic credit income from a resource-extraction building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Income {
    /// Credits paid per interval.
    pub amount: u32,
    /// Interval in ticks.
    pub interval: u32,
    /// Ticks accumulated toward the next payout.
    pub elapsed: u32,
}

/// A static structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Blueprint this building was built from.
    pub building_type: BuildingTypeId,
    /// Footprint in grid cells; the entity position is the footprint center.
    pub footprint: Footprint,
    /// Operational state.
    pub state: BuildingState,
    /// Items waiting to be produced.
    pub queue: ProductionQueue,
    /// Where newly produced units walk to.
    pub rally_point: Option<Vec2Fixed>,
    /// Power supplied while active.
    pub power_output: u32,
    /// Power drawn while active.
    pub power_usage: u32,
    /// Resource extraction, if any.
    pub income: Option<Income>,
    /// Defensive weapon, if any.
    pub weapon: Option<WeaponSpec>,
    /// Current turret target (weak reference).
    pub target: Option<EntityId>,
    /// Ticks until the turret can fire again.
    pub cooldown: u32,
}

impl Building {
    /// Create an active building with an empty queue.
    #[must_use]
    pub fn new(building_type: BuildingTypeId, footprint: Footprint) -> Self {
        Self {
            building_type,
            footprint,
            state: BuildingState::Active,
            queue: ProductionQueue::new(),
            rally_point: None,
            power_output: 0,
            power_usage: 0,
            income: None,
            weapon: None,
            target: None,
            cooldown: 0,
        }
    }

    /// Check if the building is fully operational.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, BuildingState::Active)
    }

    /// Construction progress as a percentage (0-100).
    #[must_use]
    pub fn construction_percentage(&self) -> u32 {
        match self.state {
            BuildingState::UnderConstruction { progress, total } if total > 0 => {
                (progress.saturating_mul(Fixed::from_num(100)) / Fixed::saturating_from_num(total))
                    .saturating_to_num::<u32>()
                    .min(100)
            }
            _ => 100,
        }
    }

    /// Advance construction by `rate` ticks of progress.
    ///
    /// Returns `true` if construction just completed.
    pub fn advance_construction(&mut self, rate: Fixed) -> bool {
        if let BuildingState::UnderConstruction { progress, total } = &mut self.state {
            *progress += rate;
            if *progress >= Fixed::from_num(*total) {
                self.state = BuildingState::Active;
                return true;
            }
        }
        false
    }
}

/// What a projectile is flying toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileTarget {
    /// Homing on an entity (weak reference).
    Entity(EntityId),
    /// Flying to a fixed ground point.
    Point(Vec2Fixed),
}

/// A projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Entity that fired this projectile (may since have died).
    pub source: EntityId,
    /// Current target.
    pub target: ProjectileTarget,
    /// Last known position of the target.
    pub aim_point: Vec2Fixed,
    /// Travel speed per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Damage to deal on impact.
    pub damage: u32,
    /// Type of damage.
    pub damage_type: DamageType,
    /// Splash radius (0 = single target).
    #[serde(with = "fixed_serde")]
    pub splash_radius: Fixed,
    /// Behaviour if the target dies mid-flight.
    pub impact: ImpactPolicy,
    /// Remaining lifetime in ticks.
    pub ttl: u32,
}

/// The variant-specific part of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    /// A mobile unit.
    Unit(Unit),
    /// A structure.
    Building(Building),
    /// A projectile.
    Projectile(Projectile),
}

/// Coarse entity classification for snapshots and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    /// Mobile unit.
    Unit,
    /// Structure.
    Building,
    /// Projectile.
    Projectile,
}

/// A live entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier.
    pub id: EntityId,
    /// Owning player.
    pub owner: PlayerId,
    /// Alliance tag.
    pub team: TeamId,
    /// World position.
    pub position: Vec2Fixed,
    /// Health (projectiles carry a nominal 1 HP).
    pub health: Health,
    /// Variant data.
    pub kind: EntityKind,
}

impl Entity {
    /// Coarse classification.
    #[must_use]
    pub const fn class(&self) -> EntityClass {
        match self.kind {
            EntityKind::Unit(_) => EntityClass::Unit,
            EntityKind::Building(_) => EntityClass::Building,
            EntityKind::Projectile(_) => EntityClass::Projectile,
        }
    }

    /// Unit data, if this is a unit.
    #[must_use]
    pub fn as_unit(&self) -> Option<&Unit> {
        match &self.kind {
            EntityKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    /// Mutable unit data, if this is a unit.
    pub fn as_unit_mut(&mut self) -> Option<&mut Unit> {
        match &mut self.kind {
            EntityKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    /// Building data, if this is a building.
    #[must_use]
    pub fn as_building(&self) -> Option<&Building> {
        match &self.kind {
            EntityKind::Building(building) => Some(building),
            _ => None,
        }
    }

    /// Mutable building data, if this is a building.
    pub fn as_building_mut(&mut self) -> Option<&mut Building> {
        match &mut self.kind {
            EntityKind::Building(building) => Some(building),
            _ => None,
        }
    }

    /// Projectile data, if this is a projectile.
    #[must_use]
    pub fn as_projectile(&self) -> Option<&Projectile> {
        match &self.kind {
            EntityKind::Projectile(projectile) => Some(projectile),
            _ => None,
        }
    }

    /// Whether this entity can be shot at (units and buildings, alive).
    #[must_use]
    pub fn is_targetable(&self) -> bool {
        !self.health.is_dead() && !matches!(self.kind, EntityKind::Projectile(_))
    }

    /// Whether this entity is hostile to `team`.
    #[must_use]
    pub const fn is_hostile_to(&self, team: TeamId) -> bool {
        self.team != team
    }

    /// Armor type used for damage calculation.
    #[must_use]
    pub fn armor(&self) -> ArmorType {
        match &self.kind {
            EntityKind::Unit(unit) => unit.class.armor(),
            EntityKind::Building(_) => ArmorType::Building,
            EntityKind::Projectile(_) => ArmorType::Unarmored,
        }
    }
}
