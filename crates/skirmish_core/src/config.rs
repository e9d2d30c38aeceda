//! Simulation tuning parameters.
//!
//! Every field has a default, so a RON file only needs to list the values it
//! overrides:
//!
//! ```ron
//! SimConfig(
//!     tick_rate: 20,
//!     blocked_tick_limit: 40,
//!     ai_budget_per_tick: 1,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::math::{fixed_serde, Fixed};

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks per second of simulated time.
    pub tick_rate: u32,
    /// Ticks a single frame may run before the clock drops the backlog.
    pub max_ticks_per_frame: u32,
    /// Spatial hash cell size in world units.
    #[serde(with = "fixed_serde")]
    pub spatial_cell_size: Fixed,
    /// Movement worker threads; `None` uses every available core.
    pub worker_threads: Option<usize>,
    /// Units per movement task when an owner's partition is large.
    pub partition_chunk_size: usize,
    /// Ticks without progress before a move order fails.
    pub blocked_tick_limit: u32,
    /// Distance at which a unit counts as arrived.
    #[serde(with = "fixed_serde")]
    pub arrival_tolerance: Fixed,
    /// Neighbors closer than this push each other apart.
    #[serde(with = "fixed_serde")]
    pub separation_radius: Fixed,
    /// Strength of the separation push relative to unit speed.
    #[serde(with = "fixed_serde")]
    pub separation_weight: Fixed,
    /// Spacing between formation slots for group orders.
    #[serde(with = "fixed_serde")]
    pub formation_spacing: Fixed,
    /// Projectiles within this distance of their aim point impact.
    #[serde(with = "fixed_serde")]
    pub impact_tolerance: Fixed,
    /// Extra ticks a projectile may live beyond its computed travel time.
    pub projectile_ttl_slack: u32,
    /// Cells searched around a producer for a free spawn spot.
    pub spawn_search_radius: u32,
    /// Ticks a queue-full production order waits before being dropped.
    pub deferred_order_ttl: u32,
    /// Percentage of the cost returned when selling a building.
    pub sell_refund_percent: u32,
    /// Maximum AI controllers evaluated per tick.
    pub ai_budget_per_tick: usize,
    /// Minimum ticks between two evaluations of the same AI controller.
    pub ai_decision_interval: u32,
    /// Losing every headquarters defeats a player even if units remain.
    pub defeat_on_hq_loss: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            max_ticks_per_frame: 5,
            spatial_cell_size: Fixed::from_num(8),
            worker_threads: None,
            partition_chunk_size: 256,
            blocked_tick_limit: 30,
            arrival_tolerance: Fixed::from_num(0.25),
            separation_radius: Fixed::from_num(0.75),
            separation_weight: Fixed::from_num(0.5),
            formation_spacing: Fixed::from_num(1.5),
            impact_tolerance: Fixed::from_num(0.5),
            projectile_ttl_slack: 10,
            spawn_search_radius: 4,
            deferred_order_ttl: 100,
            sell_refund_percent: 50,
            ai_budget_per_tick: 2,
            ai_decision_interval: 10,
            defeat_on_hq_loss: true,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from RON and validate it.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|source| ConfigError::Parse {
            what: "simulation config",
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &str, message: &str) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_string(),
                message: message.to_string(),
            }
        }

        if self.tick_rate == 0 {
            return Err(invalid("tick_rate", "must be positive"));
        }
        if self.max_ticks_per_frame == 0 {
            return Err(invalid("max_ticks_per_frame", "must be positive"));
        }
        if self.spatial_cell_size <= Fixed::ZERO {
            return Err(invalid("spatial_cell_size", "must be positive"));
        }
        if self.worker_threads == Some(0) {
            return Err(invalid("worker_threads", "must be positive when set"));
        }
        if self.partition_chunk_size == 0 {
            return Err(invalid("partition_chunk_size", "must be positive"));
        }
        if self.arrival_tolerance <= Fixed::ZERO {
            return Err(invalid("arrival_tolerance", "must be positive"));
        }
        if self.impact_tolerance < Fixed::ZERO {
            return Err(invalid("impact_tolerance", "must not be negative"));
        }
        if self.separation_radius < Fixed::ZERO || self.separation_weight < Fixed::ZERO {
            return Err(invalid("separation", "radius and weight must not be negative"));
        }
        if self.sell_refund_percent > 100 {
            return Err(invalid("sell_refund_percent", "must be at most 100"));
        }
        Ok(())
    }

    /// Length of one tick in seconds.
    #[must_use]
    pub fn tick_seconds(&self) -> f64 {
        1.0 / f64::from(self.tick_rate.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = SimConfig::from_ron_str("(tick_rate: 30, spatial_cell_size: 16.0)").unwrap();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.spatial_cell_size, Fixed::from_num(16));
        assert_eq!(config.blocked_tick_limit, SimConfig::default().blocked_tick_limit);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = SimConfig::from_ron_str("(tick_rate: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "tick_rate"));

        let err = SimConfig::from_ron_str("(sell_refund_percent: 150)").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_rejects_malformed_ron() {
        let err = SimConfig::from_ron_str("(tick_rate: \"fast\")").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_default_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
        assert_eq!(SimConfig::default().tick_seconds(), 0.05);
    }
}
