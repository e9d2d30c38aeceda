//! Shipped data files and full sessions over scenarios loaded from disk.

use std::path::{Path, PathBuf};

use skirmish_core::orders::{OrderKind, PlayerOrder};
use skirmish_headless::{run_match, Command, HeadlessConfig, HeadlessRunner, Response, Scenario};
use skirmish_test_utils::fixtures::{find_owned, map_to_ron, pos, ScenarioBuilder, TEST_DATA};

fn shipped(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(relative)
}

fn session(runner: &mut HeadlessRunner, commands: &[Command]) -> Vec<Response> {
    let input: Vec<String> = commands.iter().map(|c| serde_json::to_string(c).unwrap()).collect();
    let mut output = Vec::new();
    runner.run(input.join("\n").as_bytes(), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn shipped_scenario_loads_and_matches_builtin() {
    let scenario = Scenario::load(&shipped("scenarios/skirmish_1v1.ron")).unwrap();
    let builtin = Scenario::builtin().unwrap();
    assert_eq!(scenario.data, builtin.data);
    assert_eq!(scenario.map, builtin.map);
    assert_eq!(scenario.max_ticks, 36_000);
    assert!(scenario.simulation().is_ok());
}

#[test]
fn shipped_ai_match_is_deterministic() {
    let scenario = Scenario::builtin().unwrap();
    let play = || {
        let mut sim = scenario.simulation().unwrap();
        run_match(&mut sim, 300, |_| {})
    };
    let first = play();
    assert_eq!(first.ticks, 300);
    assert_eq!(first, play());
}

#[test]
fn scripted_skirmish_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.ron"), TEST_DATA).unwrap();
    let map = ScenarioBuilder::new(32, 32)
        .human(1000)
        .human(1000)
        .entity(0, "headquarters", (2, 2))
        .entity(0, "rifleman", (12, 12))
        .entity(1, "headquarters", (28, 28))
        .entity(1, "scout", (15, 12));
    std::fs::write(dir.path().join("map.ron"), map_to_ron(map.map())).unwrap();
    let path = dir.path().join("scenario.ron");
    std::fs::write(
        &path,
        r#"(name: "scripted", data: Some("data.ron"), map: "map.ron", config: (worker_threads: Some(2)))"#,
    )
    .unwrap();

    let scenario = Scenario::load(&path).unwrap();
    let sim = scenario.simulation().unwrap();
    let rifleman = find_owned(&sim, 0, "rifleman").unwrap();
    let scout = find_owned(&sim, 1, "scout").unwrap();
    let mut runner = HeadlessRunner::new(
        sim,
        HeadlessConfig {
            emit_events: true,
            emit_state: false,
        },
    );

    let responses = session(
        &mut runner,
        &[
            Command::order(PlayerOrder::new(
                0,
                OrderKind::Attack {
                    units: vec![rifleman],
                    target: scout,
                },
            )),
            // Not ours: rejected at intake, reported as a diagnostic.
            Command::order(PlayerOrder::new(
                1,
                OrderKind::Move {
                    units: vec![rifleman],
                    destination: pos(1, 1),
                },
            )),
            Command::Tick { count: 40 },
            Command::Query,
            Command::Quit,
        ],
    );

    let rejected = responses.iter().any(|r| match r {
        Response::Events { diagnostics, .. } => !diagnostics.is_empty(),
        _ => false,
    });
    assert!(rejected);

    let Some(Response::State { snapshot }) = responses.iter().rev().nth(1) else {
        panic!("expected a state before quit, got {responses:?}");
    };
    assert_eq!(snapshot.tick, 40);
    assert!(snapshot.entity(scout).is_none());
    assert!(snapshot.entity(rifleman).is_some());
}
