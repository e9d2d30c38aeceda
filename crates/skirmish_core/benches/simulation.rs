//! Simulation benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use skirmish_core::math::Vec2Fixed;
use skirmish_core::orders::{OrderKind, PlayerOrder};
use skirmish_core::simulation::Simulation;
use skirmish_core::spatial::SpatialIndex;
use skirmish_test_utils::fixtures::{fixed, pos, ScenarioBuilder};

fn battle(units_per_side: i32) -> Simulation {
    let mut sim = ScenarioBuilder::new(128, 128)
        .human(0)
        .human(0)
        .entity(0, "headquarters", (2, 2))
        .entity(1, "headquarters", (124, 124))
        .build();
    for i in 0..units_per_side {
        let (x, y) = (10 + (i % 20) * 2, 10 + (i / 20) * 2);
        sim.spawn_unit(0, "rifleman", pos(x, y)).ok();
        sim.spawn_unit(1, "rifleman", pos(x + 60, y + 60)).ok();
    }
    for player in 0..2 {
        let units: Vec<_> = sim
            .store()
            .owned_by(player)
            .filter(|e| e.as_unit().is_some())
            .map(|e| e.id)
            .collect();
        sim.submit(PlayerOrder::new(
            player,
            OrderKind::AttackMove {
                units,
                destination: pos(64, 64),
            },
        ));
    }
    sim
}

/// Full tick cost for growing armies.
pub fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for size in [50, 200, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut sim = battle(size);
            b.iter(|| black_box(sim.tick()));
        });
    }
    group.finish();
}

/// Radius queries against a populated index.
pub fn spatial_benchmark(c: &mut Criterion) {
    let mut index = SpatialIndex::new(fixed(8));
    for id in 0..5000u64 {
        let x = (id * 37 % 500) as i32;
        let y = (id * 91 % 500) as i32;
        index.insert(id + 1, Vec2Fixed::from_ints(x, y));
    }
    c.bench_function("spatial_query_circle", |b| {
        b.iter(|| black_box(index.query_circle(pos(250, 250), fixed(12))));
    });
}

criterion_group!(benches, tick_benchmark, spatial_benchmark);
criterion_main!(benches);
