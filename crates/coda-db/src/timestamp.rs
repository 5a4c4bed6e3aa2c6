// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tick-based timestamps used for onset/offset and timestamp slots.
use std::fmt;

use crate::error::{ContractViolation, DbResult};

/// Smallest legal tick count.
pub const MIN_TICKS: i64 = 0;
/// Largest legal tick count.
pub const MAX_TICKS: i64 = i64::MAX;
/// Smallest legal ticks-per-second rate.
pub const MIN_TPS: u32 = 1;
/// Largest legal ticks-per-second rate.
pub const MAX_TPS: u32 = 1000;
/// Default ticks-per-second rate of a fresh database.
pub const DEFAULT_TPS: u32 = 60;

/// A point in time measured in ticks at a fixed tick rate.
///
/// Rendered as `hh:mm:ss:fff`, where `fff` is the tick within the current
/// second (`ticks % tps`), not milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TimeStamp {
    tps: u32,
    ticks: i64,
}

impl TimeStamp {
    /// Builds a timestamp, rejecting an out-of-range rate or tick count.
    pub fn new(tps: u32, ticks: i64) -> DbResult<Self> {
        if !(MIN_TPS..=MAX_TPS).contains(&tps) {
            return Err(ContractViolation::value(
                "TimeStamp::new",
                format!("tps {tps} out of range"),
            ));
        }
        if ticks < MIN_TICKS {
            return Err(ContractViolation::value(
                "TimeStamp::new",
                format!("ticks {ticks} out of range"),
            ));
        }
        Ok(Self { tps, ticks })
    }

    /// Zero ticks at the given rate, clamped into the legal rate range.
    pub fn zero(tps: u32) -> Self {
        Self {
            tps: tps.clamp(MIN_TPS, MAX_TPS),
            ticks: 0,
        }
    }

    /// Ticks per second.
    pub fn tps(&self) -> u32 {
        self.tps
    }

    /// Tick count.
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Returns `true` when both fields are within their legal ranges.
    pub fn is_valid(&self) -> bool {
        (MIN_TPS..=MAX_TPS).contains(&self.tps) && self.ticks >= MIN_TICKS
    }

    /// Debug form: `(tps,hh:mm:ss:fff)`.
    pub fn to_db_string(&self) -> String {
        format!("({},{self})", self.tps)
    }

    /// Compares tick counts; `None` when the rates differ.
    pub fn cmp_ticks(&self, other: &Self) -> Option<std::cmp::Ordering> {
        (self.tps == other.tps).then(|| self.ticks.cmp(&other.ticks))
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tps = i64::from(self.tps);
        let hours = self.ticks / tps / 3600;
        let rest = self.ticks - 3600 * hours * tps;
        let minutes = (rest / tps) / 60;
        let rest = rest - 60 * minutes * tps;
        let seconds = rest / tps;
        let frames = self.ticks % tps;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}:{frames:03}")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn renders_hours_minutes_seconds_and_ticks() {
        let ts = TimeStamp::new(60, 11).unwrap();
        assert_eq!(ts.to_string(), "00:00:00:011");
        let ts = TimeStamp::new(60, 60 * 11).unwrap();
        assert_eq!(ts.to_string(), "00:00:11:000");
        let ts = TimeStamp::new(60, 60 * 3600 + 60 * 61 + 33).unwrap();
        assert_eq!(ts.to_string(), "01:01:01:033");
        assert_eq!(ts.to_db_string(), "(60,01:01:01:033)");
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(TimeStamp::new(0, 0).is_err());
        assert!(TimeStamp::new(1001, 0).is_err());
        assert!(TimeStamp::new(60, -1).is_err());
        assert!(TimeStamp::new(1000, 0).is_ok());
    }

    #[test]
    fn comparison_requires_matching_rates() {
        let a = TimeStamp::new(60, 5).unwrap();
        let b = TimeStamp::new(60, 9).unwrap();
        let c = TimeStamp::new(30, 9).unwrap();
        assert_eq!(a.cmp_ticks(&b), Some(std::cmp::Ordering::Less));
        assert_eq!(a.cmp_ticks(&c), None);
    }
}
