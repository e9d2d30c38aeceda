//! Batch AI matches.
//!
//! Plays every pairing of the configured personalities on one scenario, in
//! parallel using rayon, and tallies wins per personality. Each match is
//! deterministic, so a batch is reproducible run to run.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use skirmish_core::ai::Personality;
use tracing::{debug, info, warn};

use crate::runner::{run_match, MatchOutcome};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Personalities to pit against each other.
    pub personalities: Vec<Personality>,
    /// Tick limit per match; matches that reach it are draws.
    pub max_ticks: u64,
    /// Maximum parallel matches (0 = rayon default).
    pub parallel_games: usize,
    /// Also play each personality against itself.
    pub mirror_matches: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            personalities: Personality::ALL.to_vec(),
            max_ticks: 12_000,
            parallel_games: 0,
            mirror_matches: false,
        }
    }
}

impl BatchConfig {
    /// Every ordered pairing this batch plays.
    #[must_use]
    pub fn pairings(&self) -> Vec<(Personality, Personality)> {
        let mut pairs = Vec::new();
        for &first in &self.personalities {
            for &second in &self.personalities {
                if first != second || self.mirror_matches {
                    pairs.push((first, second));
                }
            }
        }
        pairs
    }
}

/// One finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Personality in player slot 0.
    pub first: Personality,
    /// Personality in player slot 1.
    pub second: Personality,
    /// Winning slot (0 or 1), if any.
    pub winning_slot: Option<u8>,
    /// How the match ended.
    #[serde(flatten)]
    pub outcome: MatchOutcome,
}

impl MatchResult {
    /// Personality that won.
    #[must_use]
    pub fn winner(&self) -> Option<Personality> {
        match self.winning_slot? {
            0 => Some(self.first),
            _ => Some(self.second),
        }
    }
}

/// Win/loss/draw tally for one personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityRecord {
    /// The personality.
    pub personality: Personality,
    /// Matches won.
    pub wins: u32,
    /// Matches lost.
    pub losses: u32,
    /// Matches that hit the tick limit.
    pub draws: u32,
}

impl PersonalityRecord {
    /// Matches played.
    #[must_use]
    pub const fn played(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario played.
    pub scenario: String,
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual matches, in pairing order.
    pub matches: Vec<MatchResult>,
    /// Per-personality tallies, in configuration order.
    pub records: Vec<PersonalityRecord>,
    /// Matches that could not be started.
    pub errors: Vec<String>,
    /// Wall-clock runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Tally for one personality.
    #[must_use]
    pub fn record(&self, personality: Personality) -> Option<&PersonalityRecord> {
        self.records.iter().find(|r| r.personality == personality)
    }
}

/// Play every pairing in `config` on `scenario`.
///
/// Returns an error only if the scenario cannot host two AI players or
/// the thread pool cannot be built; per-match failures land in
/// [`BatchResults::errors`].
pub fn run_batch(scenario: &Scenario, config: &BatchConfig) -> Result<BatchResults, ScenarioError> {
    let started = Instant::now();
    let pairings = config.pairings();
    if let Some(&(first, second)) = pairings.first() {
        scenario.with_personalities(first, second)?;
    }
    info!(
        scenario = %scenario.name,
        matches = pairings.len(),
        max_ticks = config.max_ticks,
        "starting batch"
    );

    let play = |&(first, second): &(Personality, Personality)| play_match(scenario, first, second, config.max_ticks);
    let outcomes: Vec<Result<MatchResult, String>> = if config.parallel_games > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games)
            .thread_name(|i| format!("skirmish-batch-{i}"))
            .build()
            .map_err(|e| ScenarioError::Invalid(format!("cannot start batch workers: {e}")))?;
        pool.install(|| pairings.par_iter().map(play).collect())
    } else {
        pairings.par_iter().map(play).collect()
    };

    let mut matches = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => matches.push(result),
            Err(e) => {
                warn!(error = %e, "match failed to start");
                errors.push(e);
            }
        }
    }

    let records = tally(&config.personalities, &matches);
    let duration_seconds = started.elapsed().as_secs_f64();
    info!(
        played = matches.len(),
        failed = errors.len(),
        seconds = duration_seconds,
        "batch complete"
    );
    Ok(BatchResults {
        scenario: scenario.name.clone(),
        config: config.clone(),
        matches,
        records,
        errors,
        duration_seconds,
    })
}

fn play_match(
    scenario: &Scenario,
    first: Personality,
    second: Personality,
    max_ticks: u64,
) -> Result<MatchResult, String> {
    let mut setup = scenario.with_personalities(first, second).map_err(|e| e.to_string())?;
    // Matches already run in parallel; keep each one's movement phase serial.
    setup.config.worker_threads = Some(1);
    let mut sim = setup
        .simulation()
        .map_err(|e| format!("{first:?} vs {second:?}: {e}"))?;

    let outcome = run_match(&mut sim, max_ticks, |_| {});
    let winning_slot = outcome.winner.and_then(|team| {
        setup.map.players[..2]
            .iter()
            .position(|p| p.team() == team)
            .map(|slot| slot as u8)
    });
    debug!(?first, ?second, ?winning_slot, ticks = outcome.ticks, "match played");
    Ok(MatchResult {
        first,
        second,
        winning_slot,
        outcome,
    })
}

fn tally(personalities: &[Personality], matches: &[MatchResult]) -> Vec<PersonalityRecord> {
    let mut records: Vec<PersonalityRecord> = Vec::new();
    for &personality in personalities {
        if records.iter().any(|r| r.personality == personality) {
            continue;
        }
        records.push(PersonalityRecord {
            personality,
            wins: 0,
            losses: 0,
            draws: 0,
        });
    }

    for result in matches {
        for (slot, personality) in [(0u8, result.first), (1u8, result.second)] {
            let Some(record) = records.iter_mut().find(|r| r.personality == personality) else {
                continue;
            };
            match result.winning_slot {
                None => record.draws += 1,
                Some(winner) if winner == slot => record.wins += 1,
                Some(_) => record.losses += 1,
            }
        }
    }
    records
}
