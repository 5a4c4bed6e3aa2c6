// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed values: the closed set of argument kinds a record can hold.
//!
//! A [`DataValue`] is bound to exactly one slot (its `farg_id`) and mirrors
//! that slot's type tag and subrange. Assignment and every schema-change
//! cascade re-coerce the payload, so a subranged value is always in range.
//! Values that carry a nested record ([`Payload::ColPredicate`],
//! [`Payload::Predicate`]) forward index and cascade operations into it.
use std::collections::BTreeSet;

use tracing::debug;

use crate::cascade::{Cascade, Notification};
use crate::error::{ContractViolation, DbResult};
use crate::farg::{FargType, Slot, SlotRange};
use crate::ident::ElementId;
use crate::index::{EntryKind, IdentityIndex, IndexEntry};
use crate::lexicon;
use crate::record::{ColPred, Predicate};
use crate::timestamp::TimeStamp;
use crate::vocab::SchemaAuthority;

mod render;
mod salvage;

pub use render::format_float;

/// Kind of a typed value, one per [`Payload`] variant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ValueKind {
    /// Nested column predicate.
    ColPredicate,
    /// 64-bit float.
    Float,
    /// 64-bit integer.
    Int,
    /// Nominal (symbol), possibly a query variable.
    Nominal,
    /// Nested predicate.
    Predicate,
    /// Quoted string.
    QuoteString,
    /// Free text.
    Text,
    /// Timestamp.
    TimeStamp,
    /// Placeholder carrying the name of the slot it stands in for.
    Undefined,
}

impl ValueKind {
    /// Tag used in debug dumps and index listings.
    pub fn tag(self) -> &'static str {
        match self {
            Self::ColPredicate => "ColPredDataValue",
            Self::Float => "FloatDataValue",
            Self::Int => "IntDataValue",
            Self::Nominal => "NominalDataValue",
            Self::Predicate => "PredDataValue",
            Self::QuoteString => "QuoteStringDataValue",
            Self::Text => "TextStringDataValue",
            Self::TimeStamp => "TimeStampDataValue",
            Self::Undefined => "UndefinedDataValue",
        }
    }

    /// The slot type this kind natively fills.
    pub fn native_farg_type(self) -> Option<FargType> {
        match self {
            Self::ColPredicate => Some(FargType::ColPredicate),
            Self::Float => Some(FargType::Float),
            Self::Int => Some(FargType::Integer),
            Self::Nominal => Some(FargType::Nominal),
            Self::Predicate => Some(FargType::Predicate),
            Self::QuoteString => Some(FargType::QuoteString),
            Self::Text => Some(FargType::Text),
            Self::TimeStamp => Some(FargType::TimeStamp),
            Self::Undefined => None,
        }
    }
}

/// Payload of a typed value.
#[derive(Debug)]
pub enum Payload {
    /// Owned nested column predicate.
    ColPredicate(Box<ColPred>),
    /// Float payload.
    Float(f64),
    /// Integer payload.
    Int(i64),
    /// Nominal payload; `None` when empty.
    Nominal(Option<String>),
    /// Owned nested predicate.
    Predicate(Box<Predicate>),
    /// Quote-string payload (stored without the quotes); `None` when empty.
    QuoteString(Option<String>),
    /// Free-text payload; `None` when empty.
    Text(Option<String>),
    /// Timestamp payload.
    TimeStamp(TimeStamp),
    /// Placeholder; holds the name of the slot it fills.
    Undefined(String),
}

impl Payload {
    /// Kind of this payload.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::ColPredicate(_) => ValueKind::ColPredicate,
            Self::Float(_) => ValueKind::Float,
            Self::Int(_) => ValueKind::Int,
            Self::Nominal(_) => ValueKind::Nominal,
            Self::Predicate(_) => ValueKind::Predicate,
            Self::QuoteString(_) => ValueKind::QuoteString,
            Self::Text(_) => ValueKind::Text,
            Self::TimeStamp(_) => ValueKind::TimeStamp,
            Self::Undefined(_) => ValueKind::Undefined,
        }
    }

    fn copy_blind(&self) -> Self {
        match self {
            Self::ColPredicate(cp) => Self::ColPredicate(Box::new(cp.copy_blind())),
            Self::Float(v) => Self::Float(*v),
            Self::Int(v) => Self::Int(*v),
            Self::Nominal(v) => Self::Nominal(v.clone()),
            Self::Predicate(p) => Self::Predicate(Box::new(p.copy_blind())),
            Self::QuoteString(v) => Self::QuoteString(v.clone()),
            Self::Text(v) => Self::Text(v.clone()),
            Self::TimeStamp(ts) => Self::TimeStamp(*ts),
            Self::Undefined(name) => Self::Undefined(name.clone()),
        }
    }

    /// Checks string payloads against their lexical rules.
    fn check(&self, op: &'static str) -> DbResult<()> {
        let bad = match self {
            Self::Nominal(Some(v)) => !lexicon::is_valid_nominal(v),
            Self::QuoteString(Some(v)) => !lexicon::is_valid_quote_string(v),
            Self::Text(Some(v)) => !lexicon::is_valid_text_string(v),
            Self::Undefined(name) => !lexicon::is_valid_farg_name(name),
            Self::Float(v) => v.is_nan(),
            Self::TimeStamp(ts) => !ts.is_valid(),
            _ => false,
        };
        if bad {
            return Err(ContractViolation::value(
                op,
                format!("illegal {} payload", self.kind().tag()),
            ));
        }
        Ok(())
    }
}

/// Range limits mirrored from the bound slot. Integer and float limits
/// survive the slot dropping its subrange; they only render in debug dumps.
#[derive(Clone, Debug)]
enum Limits {
    None,
    Int(i64, i64),
    Float(f64, f64),
    Time(Option<(TimeStamp, TimeStamp)>),
    Nominals(BTreeSet<String>),
    Predicates(BTreeSet<ElementId>),
}

impl Limits {
    fn default_for(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => Self::Int(0, 0),
            ValueKind::Float => Self::Float(0.0, 0.0),
            ValueKind::TimeStamp => Self::Time(None),
            ValueKind::Nominal => Self::Nominals(BTreeSet::new()),
            ValueKind::Predicate => Self::Predicates(BTreeSet::new()),
            _ => Self::None,
        }
    }
}

/// One argument of a record.
#[derive(Debug)]
pub struct DataValue {
    id: ElementId,
    farg_id: ElementId,
    farg_type: FargType,
    cell_id: ElementId,
    owner_id: ElementId,
    subrange: bool,
    payload: Payload,
    limits: Limits,
}

impl DataValue {
    fn unbound(payload: Payload) -> Self {
        let limits = Limits::default_for(payload.kind());
        Self {
            id: ElementId::INVALID,
            farg_id: ElementId::INVALID,
            farg_type: FargType::Undefined,
            cell_id: ElementId::INVALID,
            owner_id: ElementId::INVALID,
            subrange: false,
            payload,
            limits,
        }
    }

    /// Unbound integer value.
    pub fn int(value: i64) -> Self {
        Self::unbound(Payload::Int(value))
    }

    /// Unbound float value.
    pub fn float(value: f64) -> Self {
        Self::unbound(Payload::Float(value))
    }

    /// Unbound timestamp value.
    pub fn time_stamp(value: TimeStamp) -> Self {
        Self::unbound(Payload::TimeStamp(value))
    }

    /// Unbound nominal; the empty string yields an empty nominal.
    pub fn nominal(value: &str) -> DbResult<Self> {
        Self::from_payload(Payload::Nominal(non_empty(value)))
    }

    /// Unbound quote string (without the surrounding quotes).
    pub fn quote_string(value: &str) -> DbResult<Self> {
        Self::from_payload(Payload::QuoteString(non_empty(value)))
    }

    /// Unbound free text.
    pub fn text(value: &str) -> DbResult<Self> {
        Self::from_payload(Payload::Text(non_empty(value)))
    }

    /// Unbound placeholder named after a slot (`<name>`).
    pub fn undefined(slot_name: &str) -> DbResult<Self> {
        Self::from_payload(Payload::Undefined(slot_name.to_owned()))
    }

    /// Unbound value holding a nested predicate.
    pub fn predicate(value: Predicate) -> Self {
        Self::unbound(Payload::Predicate(Box::new(value)))
    }

    /// Unbound value holding a nested column predicate.
    pub fn col_predicate(value: ColPred) -> Self {
        Self::unbound(Payload::ColPredicate(Box::new(value)))
    }

    /// Unbound value from a raw payload, checked against its lexical rules.
    pub fn from_payload(payload: Payload) -> DbResult<Self> {
        payload.check("DataValue::from_payload")?;
        Ok(Self::unbound(payload))
    }

    /// Value bound to the slot `farg_id`, which must exist in `schema`.
    ///
    /// Nested records must be congruent with `schema`; a record built
    /// against another vocabulary fails here.
    pub fn construct(
        schema: &dyn SchemaAuthority,
        farg_id: ElementId,
        payload: Payload,
    ) -> DbResult<Self> {
        if !farg_id.is_valid() {
            return Err(ContractViolation::invalid_id(
                "DataValue::construct",
                "farg_id is INVALID",
            ));
        }
        let slot = schema.slot(farg_id)?;
        let mut dv = Self::from_payload(payload)?;
        dv.bind(slot)?;
        dv.validate_nested(schema)?;
        Ok(dv)
    }

    /// Fresh default for `slot`.
    pub(crate) fn empty_for(slot: &Slot) -> Self {
        let payload = match slot.range() {
            SlotRange::ColPredicate => Payload::ColPredicate(Box::new(ColPred::unbound())),
            SlotRange::Integer { .. } => Payload::Int(0),
            SlotRange::Float { .. } => Payload::Float(0.0),
            SlotRange::Nominal { .. } => Payload::Nominal(None),
            SlotRange::Predicate { .. } => Payload::Predicate(Box::new(Predicate::unbound())),
            SlotRange::QuoteString => Payload::QuoteString(None),
            SlotRange::TimeStamp { tps, .. } => Payload::TimeStamp(TimeStamp::zero(*tps)),
            SlotRange::Text => Payload::Text(None),
            SlotRange::Untyped => Payload::Undefined(slot.name().to_owned()),
        };
        let mut dv = Self::unbound(payload);
        dv.farg_id = slot.id();
        dv.farg_type = slot.farg_type();
        dv.apply_range(slot);
        dv
    }

    /// Identity in the index, INVALID for non-canonical copies.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Bound slot, INVALID before the first assignment.
    pub fn farg_id(&self) -> ElementId {
        self.farg_id
    }

    /// Type tag of the bound slot.
    pub fn farg_type(&self) -> FargType {
        self.farg_type
    }

    /// Owning data cell.
    pub fn cell_id(&self) -> ElementId {
        self.cell_id
    }

    /// Identity of the record holding this value.
    pub fn owner_id(&self) -> ElementId {
        self.owner_id
    }

    /// Returns `true` when mirroring a subranged slot.
    pub fn is_subranged(&self) -> bool {
        self.subrange
    }

    /// Kind of the payload.
    pub fn kind(&self) -> ValueKind {
        self.payload.kind()
    }

    /// Borrow of the payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Nested column predicate, if any.
    pub fn as_col_pred(&self) -> Option<&ColPred> {
        match &self.payload {
            Payload::ColPredicate(cp) => Some(cp),
            _ => None,
        }
    }

    /// Approved predicate elements mirrored from a subranged predicate slot.
    pub fn approved_predicates(&self) -> Option<&BTreeSet<ElementId>> {
        match &self.limits {
            Limits::Predicates(set) if self.subrange => Some(set),
            _ => None,
        }
    }

    /// Nested predicate, if any.
    pub fn as_predicate(&self) -> Option<&Predicate> {
        match &self.payload {
            Payload::Predicate(p) => Some(p),
            _ => None,
        }
    }

    /// A nominal whose text starts with `?` stands in for any slot during
    /// pattern matching.
    pub fn is_query_var(&self) -> bool {
        matches!(&self.payload, Payload::Nominal(Some(v)) if v.starts_with('?'))
    }

    /// Binds this value to `slot`, mirroring its type and subrange.
    ///
    /// Accepts the slot's native kind, the placeholder, a nominal query
    /// variable, or (for untyped slots) anything but free text.
    pub fn bind(&mut self, slot: &Slot) -> DbResult<()> {
        const OP: &str = "DataValue::bind";
        if !slot.id().is_valid() {
            return Err(ContractViolation::invalid_id(OP, "slot is not registered"));
        }
        if self.farg_id.is_valid() && self.farg_id != slot.id() {
            return Err(ContractViolation::slot(
                OP,
                format!("already bound to slot {}, not {}", self.farg_id, slot.id()),
            ));
        }
        let kind = self.kind();
        let fits = match slot.farg_type() {
            FargType::Undefined => false,
            FargType::Untyped => kind != ValueKind::Text,
            native => {
                kind == ValueKind::Undefined
                    || kind.native_farg_type() == Some(native)
                    || self.is_query_var()
            }
        };
        if !fits {
            return Err(ContractViolation::type_mismatch(
                OP,
                format!("{} can't fill {} slot {}", kind.tag(), slot.farg_type(), slot.name()),
            ));
        }
        self.farg_id = slot.id();
        self.farg_type = slot.farg_type();
        self.apply_range(slot);
        Ok(())
    }

    /// Recomputes subrange and limits from `slot` and re-coerces the payload.
    pub fn update_sub_range(&mut self, slot: &Slot) -> DbResult<()> {
        if slot.id() != self.farg_id {
            return Err(ContractViolation::slot(
                "DataValue::update_sub_range",
                format!("slot {} is not the bound slot {}", slot.id(), self.farg_id),
            ));
        }
        self.apply_range(slot);
        Ok(())
    }

    fn apply_range(&mut self, slot: &Slot) {
        let query_var = self.is_query_var();
        match (&mut self.payload, slot.range()) {
            (Payload::Int(v), SlotRange::Integer { bounds }) => {
                self.subrange = bounds.is_some();
                if let Some((lo, hi)) = *bounds {
                    self.limits = Limits::Int(lo, hi);
                    *v = clamp_int(*v, lo, hi);
                }
            }
            (Payload::Float(v), SlotRange::Float { bounds }) => {
                self.subrange = bounds.is_some();
                if let Some((lo, hi)) = *bounds {
                    self.limits = Limits::Float(lo, hi);
                    *v = clamp_float(*v, lo, hi);
                }
            }
            (Payload::TimeStamp(ts), SlotRange::TimeStamp { .. }) => {
                let bounds = slot.time_bounds();
                self.subrange = bounds.is_some();
                if let Some((lo, hi)) = bounds {
                    *ts = clamp_time(*ts, lo, hi);
                }
                self.limits = Limits::Time(bounds);
            }
            (Payload::Nominal(v), SlotRange::Nominal { approved }) => {
                self.subrange = approved.is_some();
                let set = approved.clone().unwrap_or_default();
                if self.subrange
                    && !query_var
                    && v.as_ref().is_some_and(|name| !set.contains(name))
                {
                    *v = None;
                }
                self.limits = Limits::Nominals(set);
            }
            (Payload::Predicate(p), SlotRange::Predicate { approved }) => {
                self.subrange = approved.is_some();
                let set = approved.clone().unwrap_or_default();
                if self.subrange && p.is_bound() && !set.contains(&p.ve_id()) {
                    **p = Predicate::unbound();
                }
                self.limits = Limits::Predicates(set);
            }
            _ => self.subrange = false,
        }
    }

    /// Re-applies the mirrored limits to the payload.
    pub fn coerce_to_range(&mut self) {
        if !self.subrange {
            return;
        }
        let query_var = self.is_query_var();
        match (&mut self.payload, &self.limits) {
            (Payload::Int(v), Limits::Int(lo, hi)) => *v = clamp_int(*v, *lo, *hi),
            (Payload::Float(v), Limits::Float(lo, hi)) => *v = clamp_float(*v, *lo, *hi),
            (Payload::TimeStamp(ts), Limits::Time(Some((lo, hi)))) => {
                *ts = clamp_time(*ts, *lo, *hi);
            }
            (Payload::Nominal(v), Limits::Nominals(set)) => {
                if !query_var && v.as_ref().is_some_and(|name| !set.contains(name)) {
                    *v = None;
                }
            }
            (Payload::Predicate(p), Limits::Predicates(set)) => {
                if p.is_bound() && !set.contains(&p.ve_id()) {
                    **p = Predicate::unbound();
                }
            }
            _ => {}
        }
    }

    fn expect_kind(&self, op: &'static str, expected: ValueKind) -> DbResult<()> {
        if self.kind() == expected {
            return Ok(());
        }
        Err(ContractViolation::type_mismatch(
            op,
            format!("{} expected, found {}", expected.tag(), self.kind().tag()),
        ))
    }

    /// Assigns an integer, clamping into the subrange.
    pub fn set_int(&mut self, value: i64) -> DbResult<()> {
        self.expect_kind("DataValue::set_int", ValueKind::Int)?;
        self.payload = Payload::Int(value);
        self.coerce_to_range();
        Ok(())
    }

    /// Assigns a float, clamping into the subrange.
    pub fn set_float(&mut self, value: f64) -> DbResult<()> {
        self.expect_kind("DataValue::set_float", ValueKind::Float)?;
        if value.is_nan() {
            return Err(ContractViolation::value("DataValue::set_float", "NaN"));
        }
        self.payload = Payload::Float(value);
        self.coerce_to_range();
        Ok(())
    }

    /// Assigns a timestamp, clamping into the subrange.
    pub fn set_time_stamp(&mut self, value: TimeStamp) -> DbResult<()> {
        self.expect_kind("DataValue::set_time_stamp", ValueKind::TimeStamp)?;
        self.payload = Payload::TimeStamp(value);
        self.coerce_to_range();
        Ok(())
    }

    /// Assigns a nominal. An unapproved nominal in a subranged slot becomes
    /// empty.
    pub fn set_nominal(&mut self, value: Option<&str>) -> DbResult<()> {
        const OP: &str = "DataValue::set_nominal";
        self.expect_kind(OP, ValueKind::Nominal)?;
        let value = value.and_then(non_empty);
        if let Some(v) = &value {
            if !lexicon::is_valid_nominal(v) {
                return Err(ContractViolation::value(OP, format!("'{v}' is not a nominal")));
            }
        }
        self.payload = Payload::Nominal(value);
        self.coerce_to_range();
        Ok(())
    }

    /// Assigns a quote string (without quotes).
    pub fn set_quote_string(&mut self, value: Option<&str>) -> DbResult<()> {
        const OP: &str = "DataValue::set_quote_string";
        self.expect_kind(OP, ValueKind::QuoteString)?;
        let value = value.and_then(non_empty);
        if value.as_deref().is_some_and(|v| !lexicon::is_valid_quote_string(v)) {
            return Err(ContractViolation::value(OP, "not a quote string"));
        }
        self.payload = Payload::QuoteString(value);
        Ok(())
    }

    /// Assigns free text.
    pub fn set_text(&mut self, value: Option<&str>) -> DbResult<()> {
        const OP: &str = "DataValue::set_text";
        self.expect_kind(OP, ValueKind::Text)?;
        let value = value.and_then(non_empty);
        if value.as_deref().is_some_and(|v| !lexicon::is_valid_text_string(v)) {
            return Err(ContractViolation::value(OP, "not a text string"));
        }
        self.payload = Payload::Text(value);
        Ok(())
    }

    /// Assigns a nested predicate. A bound predicate must be congruent with
    /// `schema`; one outside a subrange's approved set is replaced by the
    /// unbound predicate.
    pub fn set_predicate(&mut self, schema: &dyn SchemaAuthority, value: Predicate) -> DbResult<()> {
        const OP: &str = "DataValue::set_predicate";
        self.expect_kind(OP, ValueKind::Predicate)?;
        value.validate(schema, false)?;
        self.payload = Payload::Predicate(Box::new(value));
        self.coerce_to_range();
        Ok(())
    }

    /// Assigns a nested column predicate, which must be congruent with
    /// `schema`.
    pub fn set_col_pred(&mut self, schema: &dyn SchemaAuthority, value: ColPred) -> DbResult<()> {
        const OP: &str = "DataValue::set_col_pred";
        self.expect_kind(OP, ValueKind::ColPredicate)?;
        value.validate(schema, false)?;
        self.payload = Payload::ColPredicate(Box::new(value));
        Ok(())
    }

    /// Deep copy validated against `schema`: the bound slot must exist with
    /// the same type, and nested records must be congruent.
    pub fn copy(&self, schema: &dyn SchemaAuthority) -> DbResult<Self> {
        let dup = self.copy_blind();
        if dup.farg_id.is_valid() {
            let slot = schema.slot(dup.farg_id)?;
            if slot.farg_type() != dup.farg_type {
                return Err(ContractViolation::slot(
                    "DataValue::copy",
                    format!(
                        "slot {} is {}, value thinks {}",
                        slot.id(),
                        slot.farg_type(),
                        dup.farg_type
                    ),
                ));
            }
        }
        dup.validate_nested(schema)?;
        Ok(dup)
    }

    /// Deep copy that skips every schema check. Only for staging copies whose
    /// binding may be stale mid-cascade.
    pub fn copy_blind(&self) -> Self {
        Self {
            id: self.id,
            farg_id: self.farg_id,
            farg_type: self.farg_type,
            cell_id: self.cell_id,
            owner_id: self.owner_id,
            subrange: self.subrange,
            payload: self.payload.copy_blind(),
            limits: self.limits.clone(),
        }
    }

    pub(crate) fn validate_nested(&self, schema: &dyn SchemaAuthority) -> DbResult<()> {
        match &self.payload {
            Payload::ColPredicate(cp) => cp.validate(schema, false),
            Payload::Predicate(p) => p.validate(schema, false),
            _ => Ok(()),
        }
    }

    /// Registers this value (and any nested record) in `idx` under `cell_id`.
    pub fn insert_in_index(&mut self, idx: &mut dyn IdentityIndex, cell_id: ElementId) -> DbResult<()> {
        const OP: &str = "DataValue::insert_in_index";
        if self.id.is_valid() {
            return Err(ContractViolation::invalid_id(
                OP,
                format!("value {} already in index", self.id),
            ));
        }
        if !self.farg_id.is_valid() {
            return Err(ContractViolation::invalid_id(OP, "value is not bound to a slot"));
        }
        self.cell_id = cell_id;
        self.id = idx.add(IndexEntry::value(self.kind(), cell_id, self.farg_id))?;
        match &mut self.payload {
            Payload::ColPredicate(cp) => cp.insert_in_index(idx, cell_id),
            Payload::Predicate(p) => p.insert_in_index(idx, cell_id),
            _ => Ok(()),
        }
    }

    /// Deregisters this value (and any nested record) from `idx`.
    pub fn remove_from_index(&self, idx: &mut dyn IdentityIndex, cell_id: ElementId) -> DbResult<()> {
        const OP: &str = "DataValue::remove_from_index";
        if self.cell_id != cell_id {
            return Err(ContractViolation::index(
                OP,
                format!("value {} lives in cell {}, not {cell_id}", self.id, self.cell_id),
            ));
        }
        let entry = idx.remove(self.id)?;
        if entry.kind != EntryKind::Value(self.kind()) {
            return Err(ContractViolation::corrupt(
                OP,
                format!("index held {} under value id {}", entry.kind, self.id),
            ));
        }
        match &self.payload {
            Payload::ColPredicate(cp) => cp.remove_from_index(idx, cell_id),
            Payload::Predicate(p) => p.remove_from_index(idx, cell_id),
            _ => Ok(()),
        }
    }

    /// Makes this value the canonical instance in place of `old`, which must
    /// carry the same identity, cell and slot binding.
    pub fn replace_in_index(
        &mut self,
        idx: &mut dyn IdentityIndex,
        schema: &dyn SchemaAuthority,
        old: &Self,
        cell_id: ElementId,
        cascade: Cascade,
    ) -> DbResult<()> {
        const OP: &str = "DataValue::replace_in_index";
        if self.id != old.id
            || self.cell_id != old.cell_id
            || self.farg_id != old.farg_id
            || self.farg_type != old.farg_type
        {
            return Err(ContractViolation::index(OP, "mis-match with old value"));
        }
        if self.cell_id != cell_id {
            return Err(ContractViolation::index(OP, "cell id mis-match"));
        }
        idx.replace(self.id, IndexEntry::value(self.kind(), cell_id, self.farg_id))?;
        match (&mut self.payload, &old.payload) {
            (Payload::ColPredicate(new), Payload::ColPredicate(prev)) => {
                new.update_index_for_replacement(idx, schema, prev, cell_id, cascade)
            }
            (Payload::Predicate(new), Payload::Predicate(prev)) => {
                new.update_index_for_replacement(idx, schema, prev, cell_id, cascade)
            }
            (Payload::ColPredicate(_) | Payload::Predicate(_), _) => Err(ContractViolation::corrupt(
                OP,
                "old value does not hold the same nested record kind",
            )),
            _ => Ok(()),
        }
    }

    /// Adjusts this value for an in-place edit of its slot.
    ///
    /// A slot never changes identity or type in place; only its name and
    /// range may change.
    pub fn update_for_farg_change(
        &mut self,
        name_changed: bool,
        subrange_changed: bool,
        range_changed: bool,
        old_slot: &Slot,
        new_slot: &Slot,
    ) -> DbResult<()> {
        const OP: &str = "DataValue::update_for_farg_change";
        if old_slot.id() != new_slot.id() {
            return Err(ContractViolation::slot(OP, "old and new slot ids differ"));
        }
        if old_slot.ve_id() != new_slot.ve_id() {
            return Err(ContractViolation::slot(OP, "old and new slot owners differ"));
        }
        if old_slot.farg_type() != new_slot.farg_type() {
            return Err(ContractViolation::slot(OP, "old and new slot types differ"));
        }
        if self.farg_id != new_slot.id() {
            return Err(ContractViolation::slot(OP, "value is not bound to this slot"));
        }
        if self.farg_type != new_slot.farg_type() {
            return Err(ContractViolation::slot(OP, "value type tag disagrees with slot"));
        }
        if subrange_changed || range_changed {
            self.apply_range(new_slot);
        }
        if name_changed {
            if let Payload::Undefined(name) = &mut self.payload {
                debug!(slot = %new_slot.id(), "renaming placeholder to {}", new_slot.name());
                new_slot.name().clone_into(name);
            }
        }
        Ok(())
    }

    /// Forwards a cascade notification into a nested record. Scalars ignore it.
    pub fn apply_notification(
        &mut self,
        schema: &dyn SchemaAuthority,
        note: &Notification,
    ) -> DbResult<()> {
        match &mut self.payload {
            Payload::ColPredicate(cp) => cp.apply_notification(schema, note),
            Payload::Predicate(p) => p.apply_notification(schema, note),
            _ => Ok(()),
        }
    }

    pub(crate) fn register_nested(&self, schema: &mut dyn SchemaAuthority) -> DbResult<()> {
        match &self.payload {
            Payload::ColPredicate(cp) => cp.register_with(schema),
            Payload::Predicate(p) => p.register_with(schema),
            _ => Ok(()),
        }
    }

    pub(crate) fn deregister_nested(&self, schema: &mut dyn SchemaAuthority) -> DbResult<()> {
        match &self.payload {
            Payload::ColPredicate(cp) => cp.deregister_from(schema),
            Payload::Predicate(p) => p.deregister_from(schema),
            _ => Ok(()),
        }
    }

    /// Forgets this value's identity (and that of any nested record) so the
    /// tree can be inserted as new.
    pub fn clear_id(&mut self) {
        self.id = ElementId::INVALID;
        match &mut self.payload {
            Payload::ColPredicate(cp) => cp.clear_id(),
            Payload::Predicate(p) => p.clear_id(),
            _ => {}
        }
    }

    pub(crate) fn set_owner(&mut self, owner_id: ElementId) {
        self.owner_id = owner_id;
    }

    pub(crate) fn adopt_cell(&mut self, cell_id: ElementId) {
        self.cell_id = cell_id;
        match &mut self.payload {
            Payload::ColPredicate(cp) => cp.adopt_cell(cell_id),
            Payload::Predicate(p) => p.adopt_cell(cell_id),
            _ => {}
        }
    }

    /// Adds every vocabulary element the nested record tree is bound to.
    pub fn referenced_vocab_ids(&self, out: &mut BTreeSet<ElementId>) {
        match &self.payload {
            Payload::ColPredicate(cp) => cp.referenced_vocab_ids(out),
            Payload::Predicate(p) => p.referenced_vocab_ids(out),
            _ => {}
        }
    }

    /// Vocabulary element of the nested record, INVALID for scalars and
    /// unbound records.
    pub fn nested_ve_id(&self) -> ElementId {
        match &self.payload {
            Payload::ColPredicate(cp) => cp.ve_id(),
            Payload::Predicate(p) => p.ve_id(),
            _ => ElementId::INVALID,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

// The vocabulary rejects inverted and NaN bounds; these never panic either way.
fn clamp_int(v: i64, lo: i64, hi: i64) -> i64 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

fn clamp_float(v: f64, lo: f64, hi: f64) -> f64 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

fn clamp_time(ts: TimeStamp, lo: TimeStamp, hi: TimeStamp) -> TimeStamp {
    if ts.ticks() < lo.ticks() {
        lo
    } else if ts.ticks() > hi.ticks() {
        hi
    } else {
        ts
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::DbIndex;
    use crate::vocab::{MatrixType, MatrixVocabElement, VocabList};

    fn bound_slot(slot: Slot) -> (VocabList, DbIndex, ElementId) {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let mve = MatrixVocabElement::new("m", MatrixType::Matrix).with_slot(slot);
        let id = vocab.add_matrix(&mut idx, mve).unwrap();
        let farg = vocab.matrix(id).unwrap().fargs()[0].id();
        (vocab, idx, farg)
    }

    #[test]
    fn defaults_per_slot_type() {
        let (vocab, _, farg) = bound_slot(Slot::untyped("<u>"));
        let dv = vocab.slot(farg).unwrap().construct_empty_arg();
        assert_eq!(dv.kind(), ValueKind::Undefined);
        assert_eq!(dv.to_string(), "<u>");

        let (vocab, _, farg) = bound_slot(Slot::integer("<i>").with_bounds(5, 10).unwrap());
        let dv = vocab.slot(farg).unwrap().construct_empty_arg();
        assert!(dv.is_subranged());
        assert_eq!(dv.to_string(), "5");
    }

    #[test]
    fn construct_requires_an_existing_slot() {
        let (vocab, _, farg) = bound_slot(Slot::float("<f>"));
        let dv = DataValue::construct(&vocab, farg, Payload::Float(11.0)).unwrap();
        assert_eq!(dv.farg_id(), farg);
        assert_eq!(dv.farg_type(), FargType::Float);
        let err = DataValue::construct(&vocab, ElementId(999), Payload::Float(1.0)).unwrap_err();
        assert!(matches!(err, ContractViolation::NotFound { .. }));
        let err = DataValue::construct(&vocab, farg, Payload::Int(1)).unwrap_err();
        assert!(matches!(err, ContractViolation::TypeMismatch { .. }));
    }

    #[test]
    fn subranged_int_clamps_on_assignment() {
        let (vocab, _, farg) = bound_slot(Slot::integer("<i>").with_bounds(-3, 3).unwrap());
        let mut dv = DataValue::construct(&vocab, farg, Payload::Int(10)).unwrap();
        assert_eq!(dv.to_string(), "3");
        dv.set_int(-7).unwrap();
        assert_eq!(dv.to_string(), "-3");
        assert!(dv.set_float(1.0).is_err());
    }

    #[test]
    fn unapproved_nominal_becomes_empty_unless_query_var() {
        let slot = Slot::nominal("<n>")
            .with_approved_nominals(["yes", "no"])
            .unwrap();
        let (vocab, _, farg) = bound_slot(slot);
        let mut dv = DataValue::construct(&vocab, farg, Payload::Nominal(Some("yes".into()))).unwrap();
        assert_eq!(dv.to_string(), "yes");
        dv.set_nominal(Some("maybe")).unwrap();
        assert_eq!(dv.to_string(), "");
        dv.set_nominal(Some("?who")).unwrap();
        assert!(dv.is_query_var());
        assert_eq!(dv.to_string(), "?who");
        assert!(dv.set_nominal(Some("bad(nominal")).is_err());
    }

    #[test]
    fn text_never_binds_to_untyped() {
        let (vocab, _, farg) = bound_slot(Slot::untyped("<u>"));
        let mut dv = DataValue::text("free text").unwrap();
        let err = dv.bind(vocab.slot(farg).unwrap()).unwrap_err();
        assert!(matches!(err, ContractViolation::TypeMismatch { .. }));
    }

    #[test]
    fn index_round_trip_and_cell_checks() {
        let (vocab, mut idx, farg) = bound_slot(Slot::integer("<i>"));
        let mut dv = DataValue::construct(&vocab, farg, Payload::Int(4)).unwrap();
        dv.insert_in_index(&mut idx, ElementId(77)).unwrap();
        assert!(dv.id().is_valid());
        assert!(dv.insert_in_index(&mut idx, ElementId(77)).is_err());
        assert!(dv.remove_from_index(&mut idx, ElementId(78)).is_err());
        dv.remove_from_index(&mut idx, ElementId(77)).unwrap();
        assert!(!idx.contains(dv.id()));
    }

    #[test]
    fn farg_change_rejects_identity_or_type_change() {
        let (vocab, _, farg) = bound_slot(Slot::integer("<i>"));
        let slot = vocab.slot(farg).unwrap().clone();
        let mut dv = slot.construct_empty_arg();
        let mut narrowed = slot.clone();
        narrowed.set_range(SlotRange::Integer {
            bounds: Some((1, 2)),
        });
        dv.update_for_farg_change(false, true, true, &slot, &narrowed)
            .unwrap();
        assert!(dv.is_subranged());
        assert_eq!(dv.to_string(), "1");

        let mut retyped = slot.clone();
        retyped.set_range(SlotRange::Text);
        assert!(dv
            .update_for_farg_change(false, false, false, &slot, &retyped)
            .is_err());
    }

    #[test]
    fn blind_copy_keeps_identity_fields() {
        let (vocab, mut idx, farg) = bound_slot(Slot::float("<f>"));
        let mut dv = DataValue::construct(&vocab, farg, Payload::Float(2.5)).unwrap();
        dv.insert_in_index(&mut idx, ElementId(5)).unwrap();
        let dup = dv.copy_blind();
        assert_eq!(dup.id(), dv.id());
        assert_eq!(dup.to_db_string(), dv.to_db_string());
        let checked = dv.copy(&vocab).unwrap();
        assert_eq!(checked.to_db_string(), dv.to_db_string());
    }

    #[test]
    fn clamping_tolerates_bad_bounds() {
        assert_eq!(clamp_int(5, 10, 1), 10);
        assert_eq!(clamp_int(-4, -3, 3), -3);
        assert!((clamp_float(1.5, f64::NAN, 1.0) - 1.0).abs() < f64::EPSILON);
        assert!(clamp_float(f64::NAN, 0.0, 1.0).is_nan());
    }
}
