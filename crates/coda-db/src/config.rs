// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Database configuration.
use crate::error::{ContractViolation, DbResult};
use crate::timestamp::{DEFAULT_TPS, MAX_TPS, MIN_TPS};

/// Key the configuration is stored under in a config store.
pub const DB_CONFIG_KEY: &str = "db";

/// Settings a [`crate::Database`] is created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DbConfig {
    /// Tick rate of every timestamp slot, in `1..=1000`.
    pub ticks_per_second: u32,
    /// Initial query-variable mode of records built by the database helpers.
    pub allow_query_vars: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TPS,
            allow_query_vars: false,
        }
    }
}

impl DbConfig {
    /// Rejects an out-of-range tick rate.
    pub fn validate(&self) -> DbResult<()> {
        if !(MIN_TPS..=MAX_TPS).contains(&self.ticks_per_second) {
            return Err(ContractViolation::value(
                "DbConfig::validate",
                format!(
                    "ticks_per_second {} outside {MIN_TPS}..={MAX_TPS}",
                    self.ticks_per_second
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = DbConfig::default();
        assert_eq!(cfg.ticks_per_second, 60);
        assert!(!cfg.allow_query_vars);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn tick_rate_bounds() {
        for (tps, ok) in [(0, false), (1, true), (1000, true), (1001, false)] {
            let cfg = DbConfig {
                ticks_per_second: tps,
                ..DbConfig::default()
            };
            assert_eq!(cfg.validate().is_ok(), ok, "tps {tps}");
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_fields_take_defaults() {
        let cfg: DbConfig = serde_json::from_str(r#"{"allow_query_vars": true}"#).unwrap();
        assert_eq!(cfg.ticks_per_second, DEFAULT_TPS);
        assert!(cfg.allow_query_vars);
        let back: DbConfig = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
