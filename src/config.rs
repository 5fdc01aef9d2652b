//! Simulation parameters, loaded once at construction.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Longest wall-clock delay any worker waits on in one go.
pub const MAX_DELAY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Seconds to a `Duration`, clamped to `0..=MAX_DELAY`. NaN maps to zero.
pub fn clamp_delay(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
}

/// Every knob of the simulation. Missing TOML keys fall back to the defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub tables: usize,
    pub waiters: usize,
    pub cooks: usize,
    /// Units per second.
    pub customer_speed: f64,
    /// Units per second.
    pub waiter_speed: f64,
    pub eating_min_ms: u64,
    pub eating_max_ms: u64,
    pub prep_min_ms: u64,
    pub prep_max_ms: u64,
    /// Poisson rate (lambda) of arrivals per tick.
    pub arrival_rate: f64,
    pub arrival_tick_ms: u64,
    pub receptionist_tick_ms: u64,
    pub waiter_idle_ms: u64,
    pub shutdown_grace_ms: u64,
    /// Multiplies every duration. 0.01 runs a hundred times faster.
    pub time_scale: f64,
    pub auto_arrivals: bool,
    pub max_customers: Option<u64>,
    pub seed: Option<u64>,
    pub tables_per_row: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tables: 10,
            waiters: 1,
            cooks: 1,
            customer_speed: 100.0,
            waiter_speed: 150.0,
            eating_min_ms: 5000,
            eating_max_ms: 10000,
            prep_min_ms: 3000,
            prep_max_ms: 8000,
            arrival_rate: 0.2,
            arrival_tick_ms: 3000,
            receptionist_tick_ms: 500,
            waiter_idle_ms: 500,
            shutdown_grace_ms: 2000,
            time_scale: 1.0,
            auto_arrivals: true,
            max_customers: None,
            seed: None,
            tables_per_row: 5,
        }
    }
}

impl SimConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject anything that would make a worker misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tables == 0 {
            return Err(ConfigError::NoTables);
        }
        if self.waiters == 0 {
            return Err(ConfigError::NoWaiters);
        }
        if self.cooks == 0 {
            return Err(ConfigError::NoCooks);
        }
        if !(self.arrival_rate.is_finite() && self.arrival_rate > 0.0) {
            return Err(ConfigError::NonPositiveArrivalRate(self.arrival_rate));
        }
        if self.eating_min_ms > self.eating_max_ms {
            return Err(ConfigError::InvalidRange {
                name: "eating time",
                min: self.eating_min_ms,
                max: self.eating_max_ms,
            });
        }
        if self.prep_min_ms > self.prep_max_ms {
            return Err(ConfigError::InvalidRange {
                name: "preparation time",
                min: self.prep_min_ms,
                max: self.prep_max_ms,
            });
        }
        for (name, value) in [
            ("customer speed", self.customer_speed),
            ("waiter speed", self.waiter_speed),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveSpeed { name, value });
            }
        }
        for (name, value) in [
            ("arrival tick", self.arrival_tick_ms),
            ("receptionist tick", self.receptionist_tick_ms),
            ("waiter idle wait", self.waiter_idle_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        if self.tables_per_row == 0 {
            return Err(ConfigError::ZeroInterval("tables per row"));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(ConfigError::InvalidTimeScale(self.time_scale));
        }
        for (name, ms) in [
            ("eating time", self.eating_max_ms),
            ("preparation time", self.prep_max_ms),
            ("arrival tick", self.arrival_tick_ms),
            ("receptionist tick", self.receptionist_tick_ms),
            ("waiter idle wait", self.waiter_idle_ms),
        ] {
            let secs = ms as f64 / 1000.0 * self.time_scale;
            if secs > MAX_DELAY.as_secs_f64() {
                return Err(ConfigError::ScaledDelayTooLong { name, secs });
            }
        }
        Ok(())
    }

    /// Convert nominal milliseconds into wall-clock time.
    pub fn scaled_ms(&self, ms: u64) -> Duration {
        self.scaled_secs(ms as f64 / 1000.0)
    }

    /// Scale a nominal number of seconds. Never exceeds [`MAX_DELAY`].
    pub fn scaled_secs(&self, secs: f64) -> Duration {
        clamp_delay(secs * self.time_scale)
    }

    /// Wall-clock interval between arrival draws.
    pub fn arrival_tick(&self) -> Duration {
        self.scaled_ms(self.arrival_tick_ms)
    }

    /// Wall-clock interval between backlog passes.
    pub fn receptionist_tick(&self) -> Duration {
        self.scaled_ms(self.receptionist_tick_ms)
    }

    /// Longest an idle waiter sleeps before rescanning.
    pub fn waiter_idle_wait(&self) -> Duration {
        self.scaled_ms(self.waiter_idle_ms)
    }

    /// Grace period is wall-clock; it is not scaled.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().expect("defaults should validate");
    }

    #[test]
    fn rejects_non_positive_arrival_rate() {
        for rate in [0.0, -1.5, f64::NAN] {
            let config = SimConfig {
                arrival_rate: rate,
                ..SimConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::NonPositiveArrivalRate(_))
            ));
        }
    }

    #[test]
    fn rejects_empty_staff_and_tables() {
        let no_tables = SimConfig {
            tables: 0,
            ..SimConfig::default()
        };
        assert!(matches!(no_tables.validate(), Err(ConfigError::NoTables)));
        let no_cooks = SimConfig {
            cooks: 0,
            ..SimConfig::default()
        };
        assert!(matches!(no_cooks.validate(), Err(ConfigError::NoCooks)));
    }

    #[test]
    fn rejects_time_scale_that_stretches_waits_past_the_limit() {
        let config = SimConfig {
            time_scale: 1e19,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ScaledDelayTooLong { .. })
        ));

        let long_meal = SimConfig {
            eating_max_ms: u64::MAX,
            ..SimConfig::default()
        };
        assert!(matches!(
            long_meal.validate(),
            Err(ConfigError::ScaledDelayTooLong { name: "eating time", .. })
        ));
    }

    #[test]
    fn scaled_durations_saturate_instead_of_overflowing() {
        let config = SimConfig::default();
        assert_eq!(config.scaled_secs(f64::MAX), MAX_DELAY);
        assert_eq!(config.scaled_secs(f64::INFINITY), MAX_DELAY);
        assert_eq!(config.scaled_secs(-3.0), Duration::ZERO);
        assert_eq!(clamp_delay(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn rejects_inverted_eating_range() {
        let config = SimConfig {
            eating_min_ms: 10,
            eating_max_ms: 5,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { min: 10, max: 5, .. })
        ));
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = SimConfig::from_toml_str("tables = 3\narrival_rate = 1.5\n")
            .expect("valid toml");
        assert_eq!(config.tables, 3);
        assert_eq!(config.arrival_rate, 1.5);
        assert_eq!(config.waiters, SimConfig::default().waiters);
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let result = SimConfig::from_toml_str("chairs = 4\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn time_scale_shrinks_durations() {
        let config = SimConfig {
            time_scale: 0.5,
            ..SimConfig::default()
        };
        assert_eq!(config.arrival_tick(), Duration::from_millis(1500));
        assert_eq!(config.shutdown_grace(), Duration::from_millis(2000));
    }
}
