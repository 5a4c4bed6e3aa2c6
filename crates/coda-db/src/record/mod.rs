// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record containers: column predicates and nested predicates.
//!
//! A record is one instantiation of a vocabulary element's shape. Unbound
//! records (`ve_id == INVALID`) carry no argument list; bound records carry
//! exactly one [`DataValue`] per slot of the element's record shape, in slot
//! order. [`ColPred`] binds to matrix elements through their implied
//! column-predicate shape, [`Predicate`] binds to predicate elements.
//!
//! Both flavours share one implementation, parameterised by a zero-sized
//! [`RecordKind`] marker.
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use crate::cascade::SchemaKind;
use crate::error::{ContractViolation, DbResult};
use crate::farg::Slot;
use crate::ident::ElementId;
use crate::index::{EntryKind, IdentityIndex, IndexEntry};
use crate::value::DataValue;
use crate::vocab::SchemaAuthority;

mod notify;
mod reconcile;
mod validate;

/// Name, var-len flag and record-shape slots of the element a record binds to.
#[derive(Clone, Copy, Debug)]
pub struct Shape<'a> {
    /// Element name.
    pub name: &'a str,
    /// Element var-len flag.
    pub var_len: bool,
    /// One slot per argument.
    pub slots: &'a [Slot],
}

/// Static description of a record flavour.
pub trait RecordKind: fmt::Debug + Clone + Copy + PartialEq + Eq + Default + 'static {
    /// Vocabulary kind records of this flavour bind to.
    const SCHEMA: SchemaKind;
    /// Index entry kind of the record itself.
    const ENTRY: EntryKind;
    /// Leading tag of the debug dump.
    const TAG: &'static str;
    /// Debug-dump tag of the element id field.
    const ID_TAG: &'static str;
    /// Debug-dump tag of the element name field.
    const NAME_TAG: &'static str;

    /// Resolves the shape of element `ve_id`.
    fn shape(schema: &dyn SchemaAuthority, ve_id: ElementId) -> DbResult<Shape<'_>>;
}

/// Marker for records bound to matrix elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnShape;

impl RecordKind for ColumnShape {
    const SCHEMA: SchemaKind = SchemaKind::Matrix;
    const ENTRY: EntryKind = EntryKind::ColPred;
    const TAG: &'static str = "colPred";
    const ID_TAG: &'static str = "mveID";
    const NAME_TAG: &'static str = "mveName";

    fn shape(schema: &dyn SchemaAuthority, ve_id: ElementId) -> DbResult<Shape<'_>> {
        let mve = schema.matrix(ve_id)?;
        Ok(Shape {
            name: mve.name(),
            var_len: mve.var_len(),
            slots: mve.cp_fargs(),
        })
    }
}

/// Marker for records bound to predicate elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PredicateShape;

impl RecordKind for PredicateShape {
    const SCHEMA: SchemaKind = SchemaKind::Predicate;
    const ENTRY: EntryKind = EntryKind::Predicate;
    const TAG: &'static str = "predicate";
    const ID_TAG: &'static str = "predID";
    const NAME_TAG: &'static str = "predName";

    fn shape(schema: &dyn SchemaAuthority, ve_id: ElementId) -> DbResult<Shape<'_>> {
        let pve = schema.predicate(ve_id)?;
        Ok(Shape {
            name: pve.name(),
            var_len: pve.var_len(),
            slots: pve.fargs(),
        })
    }
}

/// Column predicate: a record bound to a matrix element.
pub type ColPred = Record<ColumnShape>;

/// Nested predicate: a record bound to a predicate element.
pub type Predicate = Record<PredicateShape>;

/// An ordered, schema-congruent list of typed values.
///
/// Records are never implicitly cloned. [`Record::copy`] validates the copy
/// against the schema, [`Record::copy_blind`] does not.
#[derive(Debug)]
pub struct Record<K: RecordKind> {
    id: ElementId,
    ve_id: ElementId,
    ve_name: String,
    args: Option<Vec<DataValue>>,
    var_len: bool,
    cell_id: ElementId,
    query_vars: bool,
    kind: PhantomData<K>,
}

impl<K: RecordKind> Default for Record<K> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl<K: RecordKind> Record<K> {
    /// The empty record: no element, no arguments.
    pub fn unbound() -> Self {
        Self {
            id: ElementId::INVALID,
            ve_id: ElementId::INVALID,
            ve_name: String::new(),
            args: None,
            var_len: false,
            cell_id: ElementId::INVALID,
            query_vars: false,
            kind: PhantomData,
        }
    }

    /// Record bound to `ve_id` holding the default value of every slot.
    pub fn bound(schema: &dyn SchemaAuthority, ve_id: ElementId) -> DbResult<Self> {
        let mut record = Self::unbound();
        record.set_ve_id(schema, ve_id, false)?;
        Ok(record)
    }

    /// Record bound to `ve_id` holding `values`, one per slot.
    ///
    /// Each value must pass the slot type check; unbound values are bound to
    /// their slot (and coerced into its range).
    pub fn with_args(
        schema: &dyn SchemaAuthority,
        ve_id: ElementId,
        values: Vec<DataValue>,
    ) -> DbResult<Self> {
        const OP: &str = "Record::with_args";
        let mut record = Self::bound(schema, ve_id)?;
        let slots = K::shape(schema, ve_id)?.slots;
        if values.len() != slots.len() {
            return Err(ContractViolation::ArityMismatch {
                op: OP,
                expected: slots.len(),
                actual: values.len(),
            });
        }
        for (n, value) in values.into_iter().enumerate() {
            record.replace_arg(schema, n, value)?;
        }
        Ok(record)
    }

    /// Record bound to `ve_id`; `None` entries keep the slot default and
    /// `Some` entries are copied in (without their identities).
    pub fn construct(
        schema: &dyn SchemaAuthority,
        ve_id: ElementId,
        values: &[Option<DataValue>],
    ) -> DbResult<Self> {
        let mut record = Self::bound(schema, ve_id)?;
        if values.len() != record.num_args() {
            return Err(ContractViolation::ArityMismatch {
                op: "Record::construct",
                expected: record.num_args(),
                actual: values.len(),
            });
        }
        for (n, value) in values.iter().enumerate() {
            if let Some(value) = value {
                let mut dup = value.copy_blind();
                dup.clear_id();
                record.replace_arg(schema, n, dup)?;
            }
        }
        Ok(record)
    }

    /// Deep copy validated against `schema`.
    pub fn copy(&self, schema: &dyn SchemaAuthority) -> DbResult<Self> {
        let dup = self.copy_blind();
        dup.validate(schema, false)?;
        Ok(dup)
    }

    /// Deep copy that skips every schema check. Only for staging copies
    /// whose binding may be stale mid-cascade.
    pub fn copy_blind(&self) -> Self {
        Self {
            id: self.id,
            ve_id: self.ve_id,
            ve_name: self.ve_name.clone(),
            args: self
                .args
                .as_ref()
                .map(|args| args.iter().map(DataValue::copy_blind).collect()),
            var_len: self.var_len,
            cell_id: self.cell_id,
            query_vars: self.query_vars,
            kind: PhantomData,
        }
    }

    /// Rebinds to `ve_id`, or unbinds when it is INVALID.
    ///
    /// With `salvage`, argument `n` of the previous list is carried into slot
    /// `n` of the new shape where a conversion exists; every other slot gets
    /// its default. Rebuilt arguments carry no identity.
    pub fn set_ve_id(
        &mut self,
        schema: &dyn SchemaAuthority,
        ve_id: ElementId,
        salvage: bool,
    ) -> DbResult<()> {
        if !ve_id.is_valid() {
            self.unbind();
            return Ok(());
        }
        let shape = K::shape(schema, ve_id)?;
        if shape.slots.is_empty() {
            return Err(ContractViolation::schema(
                "Record::set_ve_id",
                format!("element {ve_id} has no slots"),
            ));
        }
        let old = self.args.take();
        let mut args: Vec<DataValue> = shape
            .slots
            .iter()
            .enumerate()
            .map(|(n, slot)| match old.as_ref().and_then(|prev| prev.get(n)) {
                Some(prev) if salvage => slot.construct_arg_with_salvage(prev),
                _ => slot.construct_empty_arg(),
            })
            .collect();
        for arg in &mut args {
            arg.set_owner(self.id);
            arg.adopt_cell(self.cell_id);
        }
        self.ve_id = ve_id;
        shape.name.clone_into(&mut self.ve_name);
        self.var_len = shape.var_len;
        self.args = Some(args);
        Ok(())
    }

    pub(crate) fn unbind(&mut self) {
        self.ve_id = ElementId::INVALID;
        self.ve_name.clear();
        self.args = None;
        self.var_len = false;
    }

    /// Identity in the index, INVALID for non-canonical copies.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Owning data cell.
    pub fn cell_id(&self) -> ElementId {
        self.cell_id
    }

    /// Bound element, INVALID when unbound.
    pub fn ve_id(&self) -> ElementId {
        self.ve_id
    }

    /// Cached element name; empty when unbound.
    pub fn ve_name(&self) -> &str {
        &self.ve_name
    }

    /// Cached var-len flag.
    pub fn var_len(&self) -> bool {
        self.var_len
    }

    /// Returns `true` when bound to an element.
    pub fn is_bound(&self) -> bool {
        self.ve_id.is_valid()
    }

    /// Number of arguments; zero when unbound.
    pub fn num_args(&self) -> usize {
        self.args.as_ref().map_or(0, Vec::len)
    }

    /// Arguments in slot order; empty when unbound.
    pub fn args(&self) -> &[DataValue] {
        self.args.as_deref().unwrap_or_default()
    }

    /// Borrow of argument `n`.
    pub fn arg(&self, n: usize) -> DbResult<&DataValue> {
        self.args().get(n).ok_or_else(|| {
            ContractViolation::ArityMismatch {
                op: "Record::arg",
                expected: n + 1,
                actual: self.num_args(),
            }
        })
    }

    /// Validated deep copy of argument `n`.
    pub fn arg_copy(&self, schema: &dyn SchemaAuthority, n: usize) -> DbResult<DataValue> {
        self.arg(n)?.copy(schema)
    }

    /// Returns `true` if nominal query variables may stand in for any slot.
    pub fn query_vars_allowed(&self) -> bool {
        self.query_vars
    }

    /// Enables or disables query-variable substitution.
    pub fn set_query_vars_allowed(&mut self, allowed: bool) {
        self.query_vars = allowed;
    }

    /// Replaces argument `n` with `value`.
    ///
    /// The value must pass the type check for slot `n`; an unbound value is
    /// bound to the slot, a bound one must already be bound to it.
    pub fn replace_arg(
        &mut self,
        schema: &dyn SchemaAuthority,
        n: usize,
        mut value: DataValue,
    ) -> DbResult<()> {
        const OP: &str = "Record::replace_arg";
        if !self.is_bound() {
            return Err(ContractViolation::invalid_id(OP, "record is not bound"));
        }
        let slots = K::shape(schema, self.ve_id)?.slots;
        let slot = slots.get(n).ok_or(ContractViolation::ArityMismatch {
            op: OP,
            expected: slots.len(),
            actual: n + 1,
        })?;
        let ctx = self.arg_context();
        ctx.check_type(slot, n, &value, OP)?;
        if value.farg_id().is_valid() {
            ctx.check_range(slot, n, &value, OP)?;
        } else {
            value.bind(slot)?;
        }
        validate::validate_nested(schema, &value, false)?;
        value.set_owner(self.id);
        value.adopt_cell(self.cell_id);
        let args = self.args_mut(OP)?;
        let target = args
            .get_mut(n)
            .ok_or_else(|| ContractViolation::corrupt(OP, "argument list shorter than shape"))?;
        *target = value;
        Ok(())
    }

    fn args_mut(&mut self, op: &'static str) -> DbResult<&mut Vec<DataValue>> {
        self.args
            .as_mut()
            .ok_or_else(|| ContractViolation::corrupt(op, "bound record without argument list"))
    }

    /// Registers this record and its argument tree in `idx` under `cell_id`.
    pub fn insert_in_index(
        &mut self,
        idx: &mut dyn IdentityIndex,
        cell_id: ElementId,
    ) -> DbResult<()> {
        if self.id.is_valid() {
            return Err(ContractViolation::invalid_id(
                "Record::insert_in_index",
                format!("record {} already in index", self.id),
            ));
        }
        self.cell_id = cell_id;
        self.id = idx.add(IndexEntry::record(K::ENTRY, cell_id))?;
        self.insert_args_in_index(idx, cell_id)
    }

    fn insert_args_in_index(
        &mut self,
        idx: &mut dyn IdentityIndex,
        cell_id: ElementId,
    ) -> DbResult<()> {
        let owner = self.id;
        for arg in self.args.iter_mut().flatten() {
            arg.set_owner(owner);
            arg.insert_in_index(idx, cell_id)?;
        }
        Ok(())
    }

    /// Deregisters this record and its argument tree from `idx`.
    pub fn remove_from_index(
        &self,
        idx: &mut dyn IdentityIndex,
        cell_id: ElementId,
    ) -> DbResult<()> {
        const OP: &str = "Record::remove_from_index";
        if self.cell_id != cell_id {
            return Err(ContractViolation::index(
                OP,
                format!("record {} lives in cell {}, not {cell_id}", self.id, self.cell_id),
            ));
        }
        let entry = idx.remove(self.id)?;
        if entry.kind != K::ENTRY {
            return Err(ContractViolation::corrupt(
                OP,
                format!("index held {} under record id {}", entry.kind, self.id),
            ));
        }
        self.remove_args_from_index(idx, cell_id)
    }

    fn remove_args_from_index(
        &self,
        idx: &mut dyn IdentityIndex,
        cell_id: ElementId,
    ) -> DbResult<()> {
        for arg in self.args() {
            arg.remove_from_index(idx, cell_id)?;
        }
        Ok(())
    }

    /// Subscribes this record (and every bound nested record) to the element
    /// it is bound to.
    pub fn register_with(&self, schema: &mut dyn SchemaAuthority) -> DbResult<()> {
        if self.is_bound() {
            if !self.id.is_valid() {
                return Err(ContractViolation::invalid_id(
                    "Record::register_with",
                    "only canonical records can listen",
                ));
            }
            schema.register_listener(self.ve_id, self.id)?;
        }
        for arg in self.args() {
            arg.register_nested(schema)?;
        }
        Ok(())
    }

    /// Undoes [`Record::register_with`].
    pub fn deregister_from(&self, schema: &mut dyn SchemaAuthority) -> DbResult<()> {
        if self.is_bound() {
            schema.deregister_listener(self.ve_id, self.id)?;
        }
        for arg in self.args() {
            arg.deregister_nested(schema)?;
        }
        Ok(())
    }

    /// Forgets every identity in the tree so it can be inserted as new.
    pub fn clear_id(&mut self) {
        self.id = ElementId::INVALID;
        for arg in self.args.iter_mut().flatten() {
            arg.clear_id();
            arg.set_owner(ElementId::INVALID);
        }
    }

    /// Moves the whole tree into `cell_id`.
    pub fn adopt_cell(&mut self, cell_id: ElementId) {
        self.cell_id = cell_id;
        for arg in self.args.iter_mut().flatten() {
            arg.adopt_cell(cell_id);
        }
    }

    /// Adds every element the tree is bound to, this record included.
    pub fn referenced_vocab_ids(&self, out: &mut BTreeSet<ElementId>) {
        if self.is_bound() {
            out.insert(self.ve_id);
        }
        for arg in self.args() {
            arg.referenced_vocab_ids(out);
        }
    }

    /// Structural dump of the record and every argument.
    pub fn to_db_string(&self) -> String {
        let arg_list = match &self.args {
            None => "(argList ())".to_owned(),
            Some(args) => format!(
                "(argList ({}))",
                args.iter()
                    .map(DataValue::to_db_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        format!(
            "({} (id {}) ({} {}) ({} {}) (varLen {}) {arg_list}))",
            K::TAG,
            self.id,
            K::ID_TAG,
            self.ve_id,
            K::NAME_TAG,
            self.ve_name,
            self.var_len
        )
    }
}

impl<K: RecordKind> fmt::Display for Record<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(args) = self.args.as_ref().filter(|_| self.is_bound()) else {
            return f.write_str("()");
        };
        write!(f, "{}(", self.ve_name)?;
        for (n, arg) in args.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::farg::Slot;
    use crate::index::DbIndex;
    use crate::timestamp::TimeStamp;
    use crate::value::Payload;
    use crate::vocab::{MatrixType, MatrixVocabElement, PredicateVocabElement, VocabList};

    fn float_mve(vocab: &mut VocabList, idx: &mut DbIndex) -> ElementId {
        let mve = MatrixVocabElement::new("float_mve", MatrixType::Float).with_slot(Slot::float("<val>"));
        vocab.add_matrix(idx, mve).unwrap()
    }

    #[test]
    fn unbound_record_renders_empty() {
        let cp = ColPred::unbound();
        assert_eq!(cp.to_string(), "()");
        assert_eq!(
            cp.to_db_string(),
            "(colPred (id 0) (mveID 0) (mveName ) (varLen false) (argList ())))"
        );
        assert_eq!(cp.num_args(), 0);
        assert!(cp.arg(0).is_err());
    }

    #[test]
    fn bound_record_holds_slot_defaults() {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let mve = float_mve(&mut vocab, &mut idx);
        let cp = ColPred::bound(&vocab, mve).unwrap();
        assert_eq!(cp.num_args(), 4);
        assert_eq!(cp.to_string(), "float_mve(0, 00:00:00:000, 00:00:00:000, 0.0)");
        let slots = vocab.matrix(mve).unwrap().cp_fargs();
        for (arg, slot) in cp.args().iter().zip(slots) {
            assert_eq!(arg.farg_id(), slot.id());
        }
    }

    #[test]
    fn construct_copies_supplied_values() {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let mve = float_mve(&mut vocab, &mut idx);
        let cp = ColPred::construct(
            &vocab,
            mve,
            &[
                Some(DataValue::int(11)),
                Some(DataValue::time_stamp(TimeStamp::new(60, 11).unwrap())),
                Some(DataValue::time_stamp(TimeStamp::new(60, 660).unwrap())),
                Some(DataValue::float(11.0)),
            ],
        )
        .unwrap();
        assert_eq!(cp.to_string(), "float_mve(11, 00:00:00:011, 00:00:11:000, 11.0)");
        let err = ColPred::construct(&vocab, mve, &[None, None]).unwrap_err();
        assert!(matches!(
            err,
            ContractViolation::ArityMismatch {
                expected: 4,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn rebind_with_salvage_carries_positional_values() {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let a = vocab
            .add_predicate(
                &mut idx,
                PredicateVocabElement::new("a")
                    .with_slot(Slot::integer("<x>"))
                    .with_slot(Slot::nominal("<y>")),
            )
            .unwrap();
        let b = vocab
            .add_predicate(
                &mut idx,
                PredicateVocabElement::new("b")
                    .with_slot(Slot::float("<x>"))
                    .with_slot(Slot::integer("<y>")),
            )
            .unwrap();
        let mut p = Predicate::with_args(
            &vocab,
            a,
            vec![DataValue::int(7), DataValue::nominal("seven").unwrap()],
        )
        .unwrap();
        p.set_ve_id(&vocab, b, true).unwrap();
        assert_eq!(p.to_string(), "b(7.0, 0)");
        p.set_ve_id(&vocab, a, false).unwrap();
        assert_eq!(p.to_string(), "a(0, )");
        p.set_ve_id(&vocab, ElementId::INVALID, true).unwrap();
        assert_eq!(p.to_string(), "()");
        assert!(!p.is_bound());
    }

    #[test]
    fn replace_arg_binds_and_type_checks() {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let pve = vocab
            .add_predicate(&mut idx, PredicateVocabElement::new("p").with_slot(Slot::untyped("<u>")))
            .unwrap();
        let mut p = Predicate::bound(&vocab, pve).unwrap();
        p.replace_arg(&vocab, 0, DataValue::int(3)).unwrap();
        assert_eq!(p.to_string(), "p(3)");
        let err = p
            .replace_arg(&vocab, 0, DataValue::text("prose").unwrap())
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Text Strings can't be substituted for untyped arguments"));
        assert!(p.replace_arg(&vocab, 1, DataValue::int(1)).is_err());
        assert!(matches!(p.arg(0).unwrap().payload(), Payload::Int(3)));
    }

    #[test]
    fn index_round_trip_covers_the_tree() {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let mve = float_mve(&mut vocab, &mut idx);
        let before = idx.len();
        let mut cp = ColPred::bound(&vocab, mve).unwrap();
        cp.insert_in_index(&mut idx, ElementId(500)).unwrap();
        assert_eq!(idx.len(), before + 5);
        assert!(cp.args().iter().all(|a| a.owner_id() == cp.id()));
        cp.register_with(&mut vocab).unwrap();
        assert_eq!(vocab.listeners(mve), vec![cp.id()]);
        cp.deregister_from(&mut vocab).unwrap();
        cp.remove_from_index(&mut idx, ElementId(500)).unwrap();
        assert_eq!(idx.len(), before);
    }
}
