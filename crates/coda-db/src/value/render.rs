// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Display and debug-dump forms of typed values.
//!
//! Both forms are asserted on byte-for-byte by fixtures; keep them stable.
use std::fmt;

use super::{DataValue, Limits, Payload};

/// Formats a float the way the fixtures expect: plain decimal with at least
/// one fractional digit for magnitudes in `[1e-3, 1e7)`, `1.0E10`-style
/// scientific otherwise.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_owned();
    }
    let magnitude = value.abs();
    if (1e-3..1e7).contains(&magnitude) {
        return format!("{value:?}");
    }
    let sci = format!("{value:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    if mantissa.contains('.') {
        format!("{mantissa}E{exponent}")
    } else {
        format!("{mantissa}.0E{exponent}")
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::ColPredicate(cp) => write!(f, "{cp}"),
            Payload::Predicate(p) => write!(f, "{p}"),
            Payload::Float(v) => f.write_str(&format_float(*v)),
            Payload::Int(v) => write!(f, "{v}"),
            Payload::Nominal(v) | Payload::Text(v) => f.write_str(v.as_deref().unwrap_or("")),
            Payload::QuoteString(v) => write!(f, "\"{}\"", v.as_deref().unwrap_or("")),
            Payload::TimeStamp(ts) => write!(f, "{ts}"),
            Payload::Undefined(name) => f.write_str(name),
        }
    }
}

impl DataValue {
    /// Structural dump tagging identity, slot binding, cell, payload and
    /// subrange state.
    pub fn to_db_string(&self) -> String {
        let head = format!(
            "({} (id {}) (itsFargID {}) (itsFargType {}) (itsCellID {}) (itsValue ",
            self.kind().tag(),
            self.id,
            self.farg_id,
            self.farg_type,
            self.cell_id
        );
        let sub = self.subrange;
        let tail = match (&self.payload, &self.limits) {
            (Payload::Int(v), Limits::Int(min, max)) => {
                format!("{v}) (subRange {sub}) (minVal {min}) (maxVal {max}))")
            }
            (Payload::Int(v), _) => format!("{v}) (subRange {sub}) (minVal 0) (maxVal 0))"),
            (Payload::Float(v), Limits::Float(min, max)) => format!(
                "{}) (subRange {sub}) (minVal {}) (maxVal {}))",
                format_float(*v),
                format_float(*min),
                format_float(*max)
            ),
            (Payload::Float(v), _) => format!(
                "{}) (subRange {sub}) (minVal 0.0) (maxVal 0.0))",
                format_float(*v)
            ),
            (Payload::TimeStamp(ts), Limits::Time(Some((min, max)))) if sub => format!(
                "{}) (subRange true) (minVal {}) (maxVal {}))",
                ts.to_db_string(),
                min.to_db_string(),
                max.to_db_string()
            ),
            (Payload::TimeStamp(ts), _) => format!("{}) (subRange {sub}))", ts.to_db_string()),
            (Payload::Nominal(v) | Payload::QuoteString(v) | Payload::Text(v), _) => {
                format!("{}) (subRange {sub}))", v.as_deref().unwrap_or("<null>"))
            }
            (Payload::ColPredicate(cp), _) => {
                let inner = if cp.is_bound() {
                    cp.to_db_string()
                } else {
                    "()".to_owned()
                };
                format!("{inner}) (subRange {sub}))")
            }
            (Payload::Predicate(p), _) => {
                let inner = if p.is_bound() {
                    p.to_db_string()
                } else {
                    "()".to_owned()
                };
                format!("{inner}) (subRange {sub}))")
            }
            (Payload::Undefined(name), _) => format!("{name}) (subRange {sub}))"),
        };
        head + &tail
    }
}
