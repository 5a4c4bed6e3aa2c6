// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Formal arguments ("slots"): the typed positions of a vocabulary element.
//!
//! A [`Slot`] is a value-type snapshot. The vocabulary hands out shared
//! borrows of its slots; editing happens on a cloned element that is then
//! submitted back through [`crate::VocabList::replace_matrix`] or
//! [`crate::VocabList::replace_predicate`].
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ContractViolation, DbResult};
use crate::ident::ElementId;
use crate::timestamp::{TimeStamp, DEFAULT_TPS};
use crate::value::DataValue;

/// Type tag of a slot. The declaration order is part of the model.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FargType {
    /// Not yet assigned; never legal on a live slot.
    Undefined,
    /// Holds a nested column predicate.
    ColPredicate,
    /// Holds a 64-bit integer.
    Integer,
    /// Holds a 64-bit float.
    Float,
    /// Holds a nominal (symbol).
    Nominal,
    /// Holds a nested predicate.
    Predicate,
    /// Holds a quoted string.
    QuoteString,
    /// Holds a timestamp.
    TimeStamp,
    /// Holds free text.
    Text,
    /// Holds any kind except free text.
    Untyped,
}

impl fmt::Display for FargType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undefined => "UNDEFINED",
            Self::ColPredicate => "COL_PREDICATE",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Nominal => "NOMINAL",
            Self::Predicate => "PREDICATE",
            Self::QuoteString => "QUOTE_STRING",
            Self::TimeStamp => "TIME_STAMP",
            Self::Text => "TEXT",
            Self::Untyped => "UNTYPED",
        })
    }
}

/// Per-type range information of a slot.
///
/// `None` bounds or approval sets mean the slot is not subranged.
#[derive(Clone, PartialEq, Debug)]
pub enum SlotRange {
    /// Nested column predicate.
    ColPredicate,
    /// Integer, optionally clamped to `[min, max]`.
    Integer {
        /// Inclusive bounds when subranged.
        bounds: Option<(i64, i64)>,
    },
    /// Float, optionally clamped to `[min, max]`.
    Float {
        /// Inclusive bounds when subranged.
        bounds: Option<(f64, f64)>,
    },
    /// Nominal, optionally restricted to an approved set.
    Nominal {
        /// Approved nominals when subranged.
        approved: Option<BTreeSet<String>>,
    },
    /// Nested predicate, optionally restricted to approved predicate elements.
    Predicate {
        /// Approved predicate vocabulary element ids when subranged.
        approved: Option<BTreeSet<ElementId>>,
    },
    /// Quoted string.
    QuoteString,
    /// Timestamp at `tps`, optionally clamped to `[min, max]` ticks.
    TimeStamp {
        /// Tick rate; the vocabulary rewrites it to the database rate.
        tps: u32,
        /// Inclusive tick bounds when subranged.
        bounds: Option<(i64, i64)>,
    },
    /// Free text.
    Text,
    /// Any kind except free text.
    Untyped,
}

impl SlotRange {
    /// Type tag of this range.
    pub fn farg_type(&self) -> FargType {
        match self {
            Self::ColPredicate => FargType::ColPredicate,
            Self::Integer { .. } => FargType::Integer,
            Self::Float { .. } => FargType::Float,
            Self::Nominal { .. } => FargType::Nominal,
            Self::Predicate { .. } => FargType::Predicate,
            Self::QuoteString => FargType::QuoteString,
            Self::TimeStamp { .. } => FargType::TimeStamp,
            Self::Text => FargType::Text,
            Self::Untyped => FargType::Untyped,
        }
    }

    /// Returns `true` when the range restricts legal values.
    pub fn is_subranged(&self) -> bool {
        match self {
            Self::Integer { bounds } | Self::TimeStamp { bounds, .. } => bounds.is_some(),
            Self::Float { bounds } => bounds.is_some(),
            Self::Nominal { approved } => approved.is_some(),
            Self::Predicate { approved } => approved.is_some(),
            Self::ColPredicate | Self::QuoteString | Self::Text | Self::Untyped => false,
        }
    }
}

/// One typed position of a vocabulary element.
#[derive(Clone, PartialEq, Debug)]
pub struct Slot {
    id: ElementId,
    ve_id: ElementId,
    name: String,
    range: SlotRange,
}

impl Slot {
    /// Creates an unregistered slot; ids are assigned when its element is
    /// added to a vocabulary.
    pub fn new(name: impl Into<String>, range: SlotRange) -> Self {
        Self {
            id: ElementId::INVALID,
            ve_id: ElementId::INVALID,
            name: name.into(),
            range,
        }
    }

    /// Unbounded integer slot.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, SlotRange::Integer { bounds: None })
    }

    /// Unbounded float slot.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, SlotRange::Float { bounds: None })
    }

    /// Unrestricted nominal slot.
    pub fn nominal(name: impl Into<String>) -> Self {
        Self::new(name, SlotRange::Nominal { approved: None })
    }

    /// Unrestricted nested-predicate slot.
    pub fn predicate(name: impl Into<String>) -> Self {
        Self::new(name, SlotRange::Predicate { approved: None })
    }

    /// Nested column-predicate slot.
    pub fn col_predicate(name: impl Into<String>) -> Self {
        Self::new(name, SlotRange::ColPredicate)
    }

    /// Quote-string slot.
    pub fn quote_string(name: impl Into<String>) -> Self {
        Self::new(name, SlotRange::QuoteString)
    }

    /// Unbounded timestamp slot.
    pub fn time_stamp(name: impl Into<String>) -> Self {
        Self::new(
            name,
            SlotRange::TimeStamp {
                tps: DEFAULT_TPS,
                bounds: None,
            },
        )
    }

    /// Free-text slot.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, SlotRange::Text)
    }

    /// Untyped slot.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, SlotRange::Untyped)
    }

    /// Restricts an integer, float or timestamp (ticks) slot to `[min, max]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn with_bounds(mut self, min: i64, max: i64) -> DbResult<Self> {
        if min >= max {
            return Err(ContractViolation::schema(
                "Slot::with_bounds",
                format!("min {min} >= max {max}"),
            ));
        }
        match &mut self.range {
            SlotRange::Integer { bounds } | SlotRange::TimeStamp { bounds, .. } => {
                *bounds = Some((min, max));
            }
            SlotRange::Float { bounds } => *bounds = Some((min as f64, max as f64)),
            other => {
                return Err(ContractViolation::schema(
                    "Slot::with_bounds",
                    format!("{} slot can't carry bounds", other.farg_type()),
                ))
            }
        }
        Ok(self)
    }

    /// Restricts a float slot to `[min, max]`.
    pub fn with_float_bounds(mut self, min: f64, max: f64) -> DbResult<Self> {
        if min.is_nan() || max.is_nan() || min >= max {
            return Err(ContractViolation::schema(
                "Slot::with_float_bounds",
                format!("bad bounds [{min}, {max}]"),
            ));
        }
        let SlotRange::Float { bounds } = &mut self.range else {
            return Err(ContractViolation::schema(
                "Slot::with_float_bounds",
                "not a float slot",
            ));
        };
        *bounds = Some((min, max));
        Ok(self)
    }

    /// Restricts a nominal slot to the given approved values.
    pub fn with_approved_nominals<I, S>(mut self, values: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if let Some(bad) = set.iter().find(|v| !crate::lexicon::is_valid_nominal(v)) {
            return Err(ContractViolation::schema(
                "Slot::with_approved_nominals",
                format!("'{bad}' is not a valid nominal"),
            ));
        }
        let SlotRange::Nominal { approved } = &mut self.range else {
            return Err(ContractViolation::schema(
                "Slot::with_approved_nominals",
                "not a nominal slot",
            ));
        };
        *approved = Some(set);
        Ok(self)
    }

    /// Restricts a predicate slot to the given predicate vocabulary elements.
    pub fn with_approved_predicates<I>(mut self, ids: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = ElementId>,
    {
        let SlotRange::Predicate { approved } = &mut self.range else {
            return Err(ContractViolation::schema(
                "Slot::with_approved_predicates",
                "not a predicate slot",
            ));
        };
        *approved = Some(ids.into_iter().collect());
        Ok(self)
    }

    /// Slot identity, INVALID until registered.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Owning vocabulary element.
    pub fn ve_id(&self) -> ElementId {
        self.ve_id
    }

    /// Slot name, `<name>` form.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Range information.
    pub fn range(&self) -> &SlotRange {
        &self.range
    }

    /// Type tag.
    pub fn farg_type(&self) -> FargType {
        self.range.farg_type()
    }

    /// Returns `true` when the slot restricts legal values.
    pub fn is_subranged(&self) -> bool {
        self.range.is_subranged()
    }

    /// Renames the slot.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replaces the range. Changing the type tag of a registered slot is
    /// rejected when the element is submitted back to the vocabulary.
    pub fn set_range(&mut self, range: SlotRange) {
        self.range = range;
    }

    /// Tick rate of a timestamp slot; the default rate otherwise.
    pub fn tps(&self) -> u32 {
        match self.range {
            SlotRange::TimeStamp { tps, .. } => tps,
            _ => DEFAULT_TPS,
        }
    }

    /// Returns `true` if `value` is legal in this nominal slot.
    pub fn approves_nominal(&self, value: &str) -> bool {
        match &self.range {
            SlotRange::Nominal { approved: Some(set) } => set.contains(value),
            SlotRange::Nominal { approved: None } => true,
            _ => false,
        }
    }

    /// Returns `true` if a predicate bound to `pve_id` is legal in this slot.
    pub fn approves_predicate(&self, pve_id: ElementId) -> bool {
        match &self.range {
            SlotRange::Predicate { approved: Some(set) } => set.contains(&pve_id),
            SlotRange::Predicate { approved: None } => true,
            _ => false,
        }
    }

    /// Subrange bounds of a timestamp slot as timestamps.
    pub(crate) fn time_bounds(&self) -> Option<(TimeStamp, TimeStamp)> {
        match self.range {
            SlotRange::TimeStamp {
                tps,
                bounds: Some((min, max)),
            } => Some((
                TimeStamp::new(tps, min).unwrap_or_else(|_| TimeStamp::zero(tps)),
                TimeStamp::new(tps, max).unwrap_or_else(|_| TimeStamp::zero(tps)),
            )),
            _ => None,
        }
    }

    /// Fresh default value bound to this slot.
    pub fn construct_empty_arg(&self) -> DataValue {
        DataValue::empty_for(self)
    }

    /// Best-effort carry-forward of `old` into this slot.
    ///
    /// The result never carries an identity; see [`DataValue::salvage_for`].
    pub fn construct_arg_with_salvage(&self, old: &DataValue) -> DataValue {
        DataValue::salvage_for(self, old)
    }

    pub(crate) fn assign_ids(&mut self, id: ElementId, ve_id: ElementId) {
        self.id = id;
        self.ve_id = ve_id;
    }

    pub(crate) fn set_tps(&mut self, rate: u32) {
        if let SlotRange::TimeStamp { tps, .. } = &mut self.range {
            *tps = rate;
        }
    }

    /// Drops `pve_id` from a predicate approval set. Returns `true` if it was
    /// present.
    pub(crate) fn forget_predicate(&mut self, pve_id: ElementId) -> bool {
        match &mut self.range {
            SlotRange::Predicate {
                approved: Some(set),
            } => set.remove(&pve_id),
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn farg_type_renders_upper_snake() {
        assert_eq!(FargType::TimeStamp.to_string(), "TIME_STAMP");
        assert_eq!(FargType::ColPredicate.to_string(), "COL_PREDICATE");
        assert!(FargType::Undefined < FargType::ColPredicate);
        assert!(FargType::Text < FargType::Untyped);
    }

    #[test]
    fn bounds_require_matching_type_and_order() {
        let slot = Slot::integer("<i>").with_bounds(1, 10).unwrap();
        assert!(slot.is_subranged());
        assert!(Slot::integer("<i>").with_bounds(10, 1).is_err());
        assert!(Slot::text("<t>").with_bounds(0, 1).is_err());
        let slot = Slot::float("<f>").with_float_bounds(-1.5, 1.5).unwrap();
        assert_eq!(
            slot.range(),
            &SlotRange::Float {
                bounds: Some((-1.5, 1.5))
            }
        );
    }

    #[test]
    fn approval_sets() {
        let slot = Slot::nominal("<n>")
            .with_approved_nominals(["alpha", "beta"])
            .unwrap();
        assert!(slot.approves_nominal("alpha"));
        assert!(!slot.approves_nominal("gamma"));
        assert!(Slot::nominal("<n>").approves_nominal("gamma"));
        assert!(Slot::nominal("<n>")
            .with_approved_nominals(["(bad)"])
            .is_err());

        let mut slot = Slot::predicate("<p>")
            .with_approved_predicates([ElementId(3)])
            .unwrap();
        assert!(slot.approves_predicate(ElementId(3)));
        assert!(!slot.approves_predicate(ElementId(4)));
        assert!(slot.forget_predicate(ElementId(3)));
        assert!(!slot.approves_predicate(ElementId(3)));
    }

    #[test]
    fn untyped_and_text_are_never_subranged() {
        assert!(!Slot::untyped("<u>").is_subranged());
        assert!(!Slot::text("<t>").is_subranged());
        assert_eq!(Slot::untyped("<u>").farg_type(), FargType::Untyped);
    }
}
