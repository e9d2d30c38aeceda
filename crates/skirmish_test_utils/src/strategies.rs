//! Proptest strategies.
//!
//! These generate random but reproducible inputs for property-based tests
//! of the simulation.

use proptest::prelude::*;
use skirmish_core::components::{EntityId, PlayerId};
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::orders::{OrderKind, PlayerOrder};

/// Fixed-point coordinate inside `0..max` with quarter-unit resolution.
pub fn arb_coord(max: i32) -> impl Strategy<Value = Fixed> {
    (0..max * 4).prop_map(|q| Fixed::from_num(q) / Fixed::from_num(4))
}

/// Position inside a `max` x `max` world.
pub fn arb_position(max: i32) -> impl Strategy<Value = Vec2Fixed> {
    (arb_coord(max), arb_coord(max)).prop_map(|(x, y)| Vec2Fixed::new(x, y))
}

/// Any representable point, most of them far outside any map.
pub fn arb_anywhere() -> impl Strategy<Value = Vec2Fixed> {
    (any::<i64>(), any::<i64>()).prop_map(|(x, y)| Vec2Fixed::new(Fixed::from_bits(x), Fixed::from_bits(y)))
}

/// Order destination: usually on a `max` x `max` map, sometimes anywhere.
pub fn arb_destination(max: i32) -> impl Strategy<Value = Vec2Fixed> {
    prop_oneof![3 => arb_position(max), 1 => arb_anywhere()]
}

/// A list of distinct-enough unit positions.
pub fn arb_positions(max: i32, count: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Vec2Fixed>> {
    proptest::collection::vec(arb_position(max), count)
}

/// Credit balances.
pub fn arb_credits() -> impl Strategy<Value = u32> {
    0u32..5000u32
}

/// Health values (1-1000).
pub fn arb_health() -> impl Strategy<Value = u32> {
    1u32..1000u32
}

/// Damage values (1-100).
pub fn arb_damage() -> impl Strategy<Value = u32> {
    1u32..100u32
}

/// Any order a player might submit.
///
/// `entities` are ids that may or may not exist or belong to the player;
/// `items` are blueprint names to produce. Both must be non-empty.
pub fn arb_order(
    player: PlayerId,
    entities: Vec<EntityId>,
    items: Vec<&'static str>,
    world: i32,
) -> impl Strategy<Value = PlayerOrder> {
    let entity = proptest::sample::select(entities.clone());
    let most = entities.len().min(3);
    let selection = proptest::sample::subsequence(entities, 0..=most);
    let item = proptest::sample::select(items);

    prop_oneof![
        (selection.clone(), arb_destination(world))
            .prop_map(|(units, destination)| OrderKind::Move { units, destination }),
        (selection.clone(), arb_destination(world))
            .prop_map(|(units, destination)| OrderKind::AttackMove { units, destination }),
        (selection.clone(), entity.clone()).prop_map(|(units, target)| OrderKind::Attack { units, target }),
        selection.clone().prop_map(|units| OrderKind::Hold { units }),
        selection.prop_map(|units| OrderKind::Stop { units }),
        (entity.clone(), item).prop_map(|(building, item)| OrderKind::Produce {
            building,
            item: item.to_string(),
        }),
        (entity.clone(), 0usize..6).prop_map(|(building, index)| OrderKind::CancelProduction { building, index }),
        (entity.clone(), arb_destination(world)).prop_map(|(building, point)| OrderKind::SetRallyPoint { building, point }),
        entity.prop_map(|building| OrderKind::Sell { building }),
    ]
    .prop_map(move |kind| PlayerOrder::new(player, kind))
}

/// Orders for each tick of a run, for any of `players`.
pub fn arb_order_script(
    players: PlayerId,
    entities: Vec<EntityId>,
    items: Vec<&'static str>,
    world: i32,
    ticks: usize,
) -> impl Strategy<Value = Vec<Vec<PlayerOrder>>> {
    let per_tick = (0..players)
        .prop_flat_map(move |player| arb_order(player, entities.clone(), items.clone(), world));
    proptest::collection::vec(proptest::collection::vec(per_tick, 0..3), ticks)
}
