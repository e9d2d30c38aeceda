//! Fixed-timestep clock.
//!
//! Converts variable frame times into a whole number of ticks. Ticks are
//! never split: leftover time carries over to the next frame, and when a
//! frame falls too far behind the backlog beyond `max_ticks_per_frame` is
//! dropped instead of being simulated in a burst.

use std::time::Duration;

use tracing::trace;

/// Accumulates frame time and hands out ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickClock {
    step: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    dropped: u64,
}

impl TickClock {
    /// Clock running at `tick_rate` ticks per second.
    #[must_use]
    pub fn new(tick_rate: u32, max_ticks_per_frame: u32) -> Self {
        Self {
            step: Duration::from_secs(1) / tick_rate.max(1),
            max_ticks_per_frame: max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            dropped: 0,
        }
    }

    /// Duration of one tick.
    #[must_use]
    pub const fn step(&self) -> Duration {
        self.step
    }

    /// Time carried over toward the next tick.
    #[must_use]
    pub const fn pending(&self) -> Duration {
        self.accumulator
    }

    /// Total ticks skipped because frames fell behind.
    #[must_use]
    pub const fn dropped_ticks(&self) -> u64 {
        self.dropped
    }

    /// Add a frame's elapsed time and return how many ticks to run now.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator = self.accumulator.saturating_add(elapsed);

        let mut ticks = 0;
        while self.accumulator >= self.step && ticks < self.max_ticks_per_frame {
            self.accumulator -= self.step;
            ticks += 1;
        }

        if self.accumulator >= self.step {
            let behind = self.accumulator.as_nanos() / self.step.as_nanos();
            self.dropped += u64::try_from(behind).unwrap_or(u64::MAX);
            trace!(behind, "frame overran, dropping backlog");
            self.accumulator = Duration::from_nanos(
                u64::try_from(self.accumulator.as_nanos() % self.step.as_nanos()).unwrap_or(0),
            );
        }
        ticks
    }
}
