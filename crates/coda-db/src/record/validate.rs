// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Congruence and replacement validation.
use crate::cascade::{Cascade, SchemaKind};
use crate::error::{ContractViolation, DbResult};
use crate::farg::{FargType, Slot, SlotRange};
use crate::ident::ElementId;
use crate::value::{DataValue, Payload, ValueKind};
use crate::vocab::SchemaAuthority;

use super::{Record, RecordKind, Shape};

/// What an argument check needs to know about the record holding the
/// argument. Copied out so the record's argument list can be borrowed
/// mutably while checking.
#[derive(Clone, Copy, Debug)]
pub(super) struct ArgContext {
    pub(super) kind: SchemaKind,
    pub(super) ve_id: ElementId,
    pub(super) query_vars: bool,
}

fn dv_name(farg_type: FargType) -> &'static str {
    match farg_type {
        FargType::ColPredicate => "ColPred",
        FargType::Integer => "Int",
        FargType::Float => "Float",
        FargType::Nominal => "Nominal",
        FargType::Predicate => "Pred",
        FargType::QuoteString => "QuoteString",
        FargType::TimeStamp => "TimeStamp",
        FargType::Text => "TextString",
        FargType::Undefined | FargType::Untyped => "Undefined",
    }
}

impl ArgContext {
    /// The argument-kind switch: a slot accepts its native kind, the
    /// placeholder, or (with query variables on) a nominal query variable.
    /// Untyped slots accept everything except free text.
    pub(super) fn check_type(
        self,
        slot: &Slot,
        n: usize,
        arg: &DataValue,
        op: &'static str,
    ) -> DbResult<()> {
        if slot.ve_id() != self.ve_id {
            return Err(ContractViolation::slot(
                op,
                format!("arg {n}: slot {} belongs to {}, not {}", slot.id(), slot.ve_id(), self.ve_id),
            ));
        }
        if arg.farg_id().is_valid() && arg.farg_id() != slot.id() {
            return Err(ContractViolation::slot(
                op,
                format!("arg {n}: bound to slot {}, expected {}", arg.farg_id(), slot.id()),
            ));
        }
        let kind = arg.kind();
        match slot.farg_type() {
            FargType::Undefined => Err(ContractViolation::corrupt(
                op,
                format!("arg {n}: slot {} has no type", slot.id()),
            )),
            FargType::Untyped if kind == ValueKind::Text => Err(ContractViolation::type_mismatch(
                op,
                format!("arg {n}: Type mismatch: Text Strings can't be substituted for untyped arguments."),
            )),
            FargType::Untyped => Ok(()),
            native => {
                let query_var = self.query_vars && arg.is_query_var();
                if kind.native_farg_type() == Some(native) || kind == ValueKind::Undefined || query_var {
                    return Ok(());
                }
                let detail = if self.query_vars {
                    format!(
                        "arg {n}: Arg type mismatch: {} DV, undefined DV, or query var expected.",
                        dv_name(native)
                    )
                } else {
                    format!("arg {n}: {} DV, or undefined DV expected.", dv_name(native))
                };
                Err(ContractViolation::type_mismatch(op, detail))
            }
        }
    }

    /// Checks a bound argument against the subrange of `slot`.
    pub(super) fn check_range(
        self,
        slot: &Slot,
        n: usize,
        arg: &DataValue,
        op: &'static str,
    ) -> DbResult<()> {
        if arg.kind().native_farg_type() != Some(slot.farg_type()) {
            return Ok(());
        }
        if arg.is_subranged() != slot.is_subranged() {
            return Err(ContractViolation::slot(
                op,
                format!("arg {n}: subrange flag disagrees with slot {}", slot.id()),
            ));
        }
        let in_range = match (arg.payload(), slot.range()) {
            (Payload::Int(v), SlotRange::Integer { bounds: Some((lo, hi)) }) => (lo..=hi).contains(&v),
            (Payload::Float(v), SlotRange::Float { bounds: Some((lo, hi)) }) => lo <= v && v <= hi,
            (
                Payload::TimeStamp(ts),
                SlotRange::TimeStamp {
                    bounds: Some((lo, hi)),
                    ..
                },
            ) => (lo..=hi).contains(&&ts.ticks()),
            (Payload::Nominal(Some(v)), SlotRange::Nominal { approved: Some(set) }) => {
                arg.is_query_var() || set.contains(v)
            }
            (Payload::Predicate(p), SlotRange::Predicate { approved: Some(set) }) => {
                !p.is_bound() || set.contains(&p.ve_id())
            }
            _ => true,
        };
        if !in_range {
            return Err(ContractViolation::value(
                op,
                format!("arg {n}: {arg} outside the range of slot {}", slot.name()),
            ));
        }
        Ok(())
    }

    /// Type and range check.
    pub(super) fn check_arg(
        self,
        slot: &Slot,
        n: usize,
        arg: &DataValue,
        op: &'static str,
    ) -> DbResult<()> {
        self.check_type(slot, n, arg, op)?;
        self.check_range(slot, n, arg, op)
    }

    /// Checks that `new` may replace `old` in slot `n`.
    ///
    /// `old` is `None` only while a structural cascade on this record's
    /// element is in flight and `new` fills a slot that did not exist before.
    pub(super) fn validate_replacement_arg(
        self,
        schema: &dyn SchemaAuthority,
        slot: &Slot,
        n: usize,
        old: Option<&DataValue>,
        new: &DataValue,
        cascade: Cascade,
    ) -> DbResult<()> {
        const OP: &str = "Record::validate_replacement_arg";
        if old.is_none() && !cascade.modifies(self.kind, self.ve_id) {
            return Err(ContractViolation::index(
                OP,
                format!("arg {n}: no old argument outside a structural cascade"),
            ));
        }
        if new.farg_id() != slot.id() {
            return Err(ContractViolation::slot(
                OP,
                format!("arg {n}: new arg bound to {}, slot is {}", new.farg_id(), slot.id()),
            ));
        }
        match old {
            None if new.id().is_valid() => {
                return Err(ContractViolation::invalid_id(
                    OP,
                    format!("arg {n}: new arg has an identity but nothing to replace"),
                ));
            }
            None => {}
            Some(prev) => {
                if prev.farg_id() != slot.id() {
                    return Err(ContractViolation::slot(
                        OP,
                        format!("arg {n}: old arg bound to {}, slot is {}", prev.farg_id(), slot.id()),
                    ));
                }
                if prev.kind() != new.kind() {
                    if new.id().is_valid() {
                        return Err(ContractViolation::invalid_id(
                            OP,
                            format!("arg {n}: dv type change and id set"),
                        ));
                    }
                } else if new.id().is_valid() && new.id() != prev.id() {
                    return Err(ContractViolation::invalid_id(
                        OP,
                        format!("arg {n}: new id {} does not match old id {}", new.id(), prev.id()),
                    ));
                }
                self.check_type(slot, n, prev, OP)?;
            }
        }
        self.check_arg(slot, n, new, OP)?;

        let carried = new.id().is_valid();
        match (new.payload(), old.map(DataValue::payload)) {
            (Payload::ColPredicate(cp), Some(Payload::ColPredicate(prev))) if carried => {
                cp.validate_replacement(schema, prev, cascade)
            }
            (Payload::Predicate(p), Some(Payload::Predicate(prev))) if carried => {
                p.validate_replacement(schema, prev, cascade)
            }
            _ => validate_nested(schema, new, !carried),
        }
    }
}

/// Validates the record nested in `arg`, if any.
pub(super) fn validate_nested(
    schema: &dyn SchemaAuthority,
    arg: &DataValue,
    id_must_be_invalid: bool,
) -> DbResult<()> {
    match arg.payload() {
        Payload::ColPredicate(cp) => cp.validate(schema, id_must_be_invalid),
        Payload::Predicate(p) => p.validate(schema, id_must_be_invalid),
        _ => Ok(()),
    }
}

impl<K: RecordKind> Record<K> {
    pub(super) fn arg_context(&self) -> ArgContext {
        ArgContext {
            kind: K::SCHEMA,
            ve_id: self.ve_id,
            query_vars: self.query_vars,
        }
    }

    /// An unbound record carries no name, no argument list and no var-len
    /// flag.
    pub(super) fn check_unbound_well_formed(&self, op: &'static str) -> DbResult<()> {
        if self.ve_id.is_valid() {
            return Ok(());
        }
        if !self.ve_name.is_empty() || self.args.is_some() || self.var_len {
            return Err(ContractViolation::corrupt(
                op,
                "unbound record carries a name, arguments or var-len flag",
            ));
        }
        Ok(())
    }

    /// Checks the cached element fields and the per-position slot binding of
    /// every argument against the live shape.
    fn check_shape<'s>(
        &self,
        schema: &'s dyn SchemaAuthority,
        op: &'static str,
    ) -> DbResult<(Shape<'s>, &[DataValue])> {
        let shape = K::shape(schema, self.ve_id)?;
        if shape.name != self.ve_name {
            return Err(ContractViolation::schema(
                op,
                format!("cached name '{}' but element is '{}'", self.ve_name, shape.name),
            ));
        }
        if shape.var_len != self.var_len {
            return Err(ContractViolation::schema(op, "cached var-len flag is stale"));
        }
        let args = self
            .args
            .as_deref()
            .ok_or_else(|| ContractViolation::corrupt(op, "bound record without argument list"))?;
        if args.len() != shape.slots.len() {
            return Err(ContractViolation::ArityMismatch {
                op,
                expected: shape.slots.len(),
                actual: args.len(),
            });
        }
        for (n, (arg, slot)) in args.iter().zip(shape.slots).enumerate() {
            if arg.farg_id() != slot.id() {
                return Err(ContractViolation::slot(
                    op,
                    format!("arg {n}: bound to {}, slot is {}", arg.farg_id(), slot.id()),
                ));
            }
            if arg.farg_type() != slot.farg_type() {
                return Err(ContractViolation::slot(
                    op,
                    format!("arg {n}: type tag {} but slot is {}", arg.farg_type(), slot.farg_type()),
                ));
            }
        }
        Ok((shape, args))
    }

    /// Checks the record (and its nested records) for congruence with
    /// `schema`. With `id_must_be_invalid` every identity in the tree must
    /// be INVALID, as required before insertion.
    pub fn validate(&self, schema: &dyn SchemaAuthority, id_must_be_invalid: bool) -> DbResult<()> {
        const OP: &str = "Record::validate";
        if id_must_be_invalid && self.id.is_valid() {
            return Err(ContractViolation::invalid_id(
                OP,
                format!("record already has id {}", self.id),
            ));
        }
        if !self.is_bound() {
            return self.check_unbound_well_formed(OP);
        }
        let (shape, args) = self.check_shape(schema, OP)?;
        let ctx = self.arg_context();
        for (n, (arg, slot)) in args.iter().zip(shape.slots).enumerate() {
            if id_must_be_invalid && arg.id().is_valid() {
                return Err(ContractViolation::invalid_id(
                    OP,
                    format!("arg {n} already has id {}", arg.id()),
                ));
            }
            ctx.check_arg(slot, n, arg, OP)?;
            validate_nested(schema, arg, id_must_be_invalid)?;
        }
        Ok(())
    }

    /// Checks that this record may become the canonical instance in place
    /// of `old`.
    pub fn validate_replacement(
        &self,
        schema: &dyn SchemaAuthority,
        old: &Self,
        cascade: Cascade,
    ) -> DbResult<()> {
        const OP: &str = "Record::validate_replacement";
        old.check_unbound_well_formed(OP)?;
        if self.id.is_valid() && self.id != old.id {
            return Err(ContractViolation::invalid_id(
                OP,
                format!("new id {} does not match old id {}", self.id, old.id),
            ));
        }
        if self.is_bound() && cascade.deletes(K::SCHEMA, self.ve_id) {
            return Err(ContractViolation::corrupt(
                OP,
                format!("still bound to deleted element {}", self.ve_id),
            ));
        }
        if !self.is_bound() {
            return self.check_unbound_well_formed(OP);
        }
        let (shape, args) = self.check_shape(schema, OP)?;
        let ctx = self.arg_context();

        if self.ve_id != old.ve_id || !self.id.is_valid() {
            for (n, (arg, slot)) in args.iter().zip(shape.slots).enumerate() {
                if arg.id().is_valid() {
                    return Err(ContractViolation::invalid_id(
                        OP,
                        format!("arg {n}: fresh argument list carries id {}", arg.id()),
                    ));
                }
                ctx.check_arg(slot, n, arg, OP)?;
                validate_nested(schema, arg, true)?;
            }
            return Ok(());
        }

        let old_args = old.args();
        if !cascade.modifies(K::SCHEMA, self.ve_id) {
            if old_args.len() != args.len() {
                return Err(ContractViolation::ArityMismatch {
                    op: OP,
                    expected: old_args.len(),
                    actual: args.len(),
                });
            }
            for (n, ((arg, prev), slot)) in args.iter().zip(old_args).zip(shape.slots).enumerate() {
                ctx.validate_replacement_arg(schema, slot, n, Some(prev), arg, cascade)?;
            }
            return Ok(());
        }

        for (n, (arg, slot)) in args.iter().zip(shape.slots).enumerate() {
            let prev = if arg.id().is_valid() {
                Some(find_by_id(old_args, arg.id(), n, OP)?)
            } else {
                None
            };
            ctx.validate_replacement_arg(schema, slot, n, prev, arg, cascade)?;
        }
        Ok(())
    }
}

/// The unique old argument carrying `id`.
pub(super) fn find_by_id<'a>(
    old_args: &'a [DataValue],
    id: ElementId,
    n: usize,
    op: &'static str,
) -> DbResult<&'a DataValue> {
    let mut matches = old_args.iter().filter(|prev| prev.id() == id);
    let Some(found) = matches.next() else {
        return Err(ContractViolation::index(
            op,
            format!("arg {n}: new arg has valid identity but no matching old arg"),
        ));
    };
    if matches.next().is_some() {
        return Err(ContractViolation::index(
            op,
            format!("arg {n}: identity {id} matches more than one old arg"),
        ));
    }
    Ok(found)
}
