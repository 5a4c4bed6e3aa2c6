// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vocabulary: the schema authority records are bound to.
//!
//! Two element kinds exist. A [`MatrixVocabElement`] defines a column
//! (record) shape; its implied column-predicate shape prepends `<ord>`,
//! `<onset>` and `<offset>` to a mirror of its user slots. A
//! [`PredicateVocabElement`] defines a nested-predicate shape.
//!
//! The vocabulary also owns the observer registry: records register their own
//! id under the element they are bound to, so a broadcast can find them
//! without the element holding references to records.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::cascade::{SchemaKind, SlotMapping, VocabChange};
use crate::error::{ContractViolation, DbResult};
use crate::farg::{FargType, Slot, SlotRange};
use crate::ident::ElementId;
use crate::index::{EntryKind, IdentityIndex, IndexEntry};
use crate::lexicon;
use crate::timestamp::{MAX_TPS, MIN_TPS};

/// Number of fixed slots (`<ord>`, `<onset>`, `<offset>`) leading every
/// column-predicate shape.
pub const CP_FIXED_SLOTS: usize = 3;

/// Column type of a matrix element.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatrixType {
    /// Not yet chosen; rejected by the vocabulary.
    Undefined,
    /// Single free-text slot.
    Text,
    /// Single nominal slot.
    Nominal,
    /// Single integer slot.
    Integer,
    /// Single float slot.
    Float,
    /// Single predicate slot.
    Predicate,
    /// One or more slots of any type.
    Matrix,
}

impl MatrixType {
    /// The one slot type a single-slot column must use.
    fn single_slot_type(self) -> Option<FargType> {
        match self {
            Self::Text => Some(FargType::Text),
            Self::Nominal => Some(FargType::Nominal),
            Self::Integer => Some(FargType::Integer),
            Self::Float => Some(FargType::Float),
            Self::Predicate => Some(FargType::Predicate),
            Self::Undefined | Self::Matrix => None,
        }
    }
}

impl fmt::Display for MatrixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undefined => "UNDEFINED",
            Self::Text => "TEXT",
            Self::Nominal => "NOMINAL",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Predicate => "PREDICATE",
            Self::Matrix => "MATRIX",
        })
    }
}

/// Definition of a column (record) shape.
#[derive(Clone, PartialEq, Debug)]
pub struct MatrixVocabElement {
    id: ElementId,
    name: String,
    matrix_type: MatrixType,
    var_len: bool,
    fargs: Vec<Slot>,
    cp_fargs: Vec<Slot>,
}

impl MatrixVocabElement {
    /// New, unregistered element with no slots.
    pub fn new(name: impl Into<String>, matrix_type: MatrixType) -> Self {
        Self {
            id: ElementId::INVALID,
            name: name.into(),
            matrix_type,
            var_len: false,
            fargs: Vec::new(),
            cp_fargs: Vec::new(),
        }
    }

    /// Appends a slot.
    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.fargs.push(slot);
        self
    }

    /// Sets the var-len flag.
    pub fn with_var_len(mut self, var_len: bool) -> Self {
        self.var_len = var_len;
        self
    }

    /// Element identity, INVALID until added.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column type.
    pub fn matrix_type(&self) -> MatrixType {
        self.matrix_type
    }

    /// Var-len flag.
    pub fn var_len(&self) -> bool {
        self.var_len
    }

    /// User slots.
    pub fn fargs(&self) -> &[Slot] {
        &self.fargs
    }

    /// Implied column-predicate slots; empty until added.
    pub fn cp_fargs(&self) -> &[Slot] {
        &self.cp_fargs
    }

    /// Renames the element.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Sets the var-len flag.
    pub fn set_var_len(&mut self, var_len: bool) {
        self.var_len = var_len;
    }

    /// Mutable borrow of user slot `n`.
    pub fn slot_mut(&mut self, n: usize) -> Option<&mut Slot> {
        self.fargs.get_mut(n)
    }

    /// Inserts a (fresh) slot at position `n`, clamped to the end.
    pub fn insert_slot(&mut self, n: usize, slot: Slot) {
        let n = n.min(self.fargs.len());
        self.fargs.insert(n, slot);
    }

    /// Removes user slot `n`.
    pub fn remove_slot(&mut self, n: usize) -> Option<Slot> {
        (n < self.fargs.len()).then(|| self.fargs.remove(n))
    }
}

/// Definition of a nested-predicate shape.
#[derive(Clone, PartialEq, Debug)]
pub struct PredicateVocabElement {
    id: ElementId,
    name: String,
    var_len: bool,
    fargs: Vec<Slot>,
}

impl PredicateVocabElement {
    /// New, unregistered element with no slots.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ElementId::INVALID,
            name: name.into(),
            var_len: false,
            fargs: Vec::new(),
        }
    }

    /// Appends a slot.
    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.fargs.push(slot);
        self
    }

    /// Sets the var-len flag.
    pub fn with_var_len(mut self, var_len: bool) -> Self {
        self.var_len = var_len;
        self
    }

    /// Element identity, INVALID until added.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Var-len flag.
    pub fn var_len(&self) -> bool {
        self.var_len
    }

    /// Slots.
    pub fn fargs(&self) -> &[Slot] {
        &self.fargs
    }

    /// Renames the element.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Sets the var-len flag.
    pub fn set_var_len(&mut self, var_len: bool) {
        self.var_len = var_len;
    }

    /// Mutable borrow of slot `n`.
    pub fn slot_mut(&mut self, n: usize) -> Option<&mut Slot> {
        self.fargs.get_mut(n)
    }

    /// Inserts a (fresh) slot at position `n`, clamped to the end.
    pub fn insert_slot(&mut self, n: usize, slot: Slot) {
        let n = n.min(self.fargs.len());
        self.fargs.insert(n, slot);
    }

    /// Removes slot `n`.
    pub fn remove_slot(&mut self, n: usize) -> Option<Slot> {
        (n < self.fargs.len()).then(|| self.fargs.remove(n))
    }
}

/// Either kind of vocabulary element.
#[derive(Clone, PartialEq, Debug)]
pub enum VocabElement {
    /// Column shape.
    Matrix(MatrixVocabElement),
    /// Nested-predicate shape.
    Predicate(PredicateVocabElement),
}

impl VocabElement {
    /// Element identity.
    pub fn id(&self) -> ElementId {
        match self {
            Self::Matrix(m) => m.id,
            Self::Predicate(p) => p.id,
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        match self {
            Self::Matrix(m) => &m.name,
            Self::Predicate(p) => &p.name,
        }
    }

    /// Var-len flag.
    pub fn var_len(&self) -> bool {
        match self {
            Self::Matrix(m) => m.var_len,
            Self::Predicate(p) => p.var_len,
        }
    }

    /// Element kind.
    pub fn kind(&self) -> SchemaKind {
        match self {
            Self::Matrix(_) => SchemaKind::Matrix,
            Self::Predicate(_) => SchemaKind::Predicate,
        }
    }

    /// The slots a record bound to this element holds one value per: the
    /// column-predicate shape for matrices, the plain slots for predicates.
    pub fn record_slots(&self) -> &[Slot] {
        match self {
            Self::Matrix(m) => &m.cp_fargs,
            Self::Predicate(p) => &p.fargs,
        }
    }

    /// Every slot, column-predicate mirrors included.
    fn slots_mut(&mut self) -> Vec<&mut Slot> {
        match self {
            Self::Matrix(m) => m.fargs.iter_mut().chain(m.cp_fargs.iter_mut()).collect(),
            Self::Predicate(p) => p.fargs.iter_mut().collect(),
        }
    }

    fn all_slots(&self) -> impl Iterator<Item = &Slot> + '_ {
        let (fargs, cp): (&[Slot], &[Slot]) = match self {
            Self::Matrix(m) => (&m.fargs, &m.cp_fargs),
            Self::Predicate(p) => (&p.fargs, &[]),
        };
        fargs.iter().chain(cp.iter())
    }
}

/// Consumed interface of the schema authority.
///
/// Lookups hand out shared borrows; callers must not retain them across a
/// mutation of the authority.
pub trait SchemaAuthority {
    /// Resolves an element id.
    fn resolve(&self, ve_id: ElementId) -> DbResult<&VocabElement>;
    /// Resolves a slot id (user or column-predicate slot).
    fn slot(&self, farg_id: ElementId) -> DbResult<&Slot>;
    /// Tick rate of the owning database.
    fn ticks_per_second(&self) -> u32;
    /// Subscribes `record_id` to changes of `ve_id`.
    fn register_listener(&mut self, ve_id: ElementId, record_id: ElementId) -> DbResult<()>;
    /// Unsubscribes `record_id` from changes of `ve_id`.
    fn deregister_listener(&mut self, ve_id: ElementId, record_id: ElementId) -> DbResult<()>;
    /// Records subscribed to `ve_id`, ascending.
    fn listeners(&self, ve_id: ElementId) -> Vec<ElementId>;

    /// Resolves a matrix element.
    fn matrix(&self, ve_id: ElementId) -> DbResult<&MatrixVocabElement> {
        match self.resolve(ve_id)? {
            VocabElement::Matrix(m) => Ok(m),
            VocabElement::Predicate(_) => Err(ContractViolation::NotFound {
                op: "SchemaAuthority::matrix",
                what: "matrix vocab element",
                id: ve_id,
            }),
        }
    }

    /// Resolves a predicate element.
    fn predicate(&self, ve_id: ElementId) -> DbResult<&PredicateVocabElement> {
        match self.resolve(ve_id)? {
            VocabElement::Predicate(p) => Ok(p),
            VocabElement::Matrix(_) => Err(ContractViolation::NotFound {
                op: "SchemaAuthority::predicate",
                what: "predicate vocab element",
                id: ve_id,
            }),
        }
    }
}

/// In-memory vocabulary and observer registry.
#[derive(Clone, Debug)]
pub struct VocabList {
    tps: u32,
    elements: BTreeMap<ElementId, VocabElement>,
    slot_owner: BTreeMap<ElementId, ElementId>,
    listeners: BTreeMap<ElementId, BTreeSet<ElementId>>,
}

impl VocabList {
    /// Empty vocabulary whose timestamp slots run at `tps`, clamped into the
    /// legal rate range.
    pub fn new(tps: u32) -> Self {
        Self {
            tps: tps.clamp(MIN_TPS, MAX_TPS),
            elements: BTreeMap::new(),
            slot_owner: BTreeMap::new(),
            listeners: BTreeMap::new(),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if no element is defined.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in id order.
    pub fn elements(&self) -> impl Iterator<Item = &VocabElement> + '_ {
        self.elements.values()
    }

    /// Looks an element up by name.
    pub fn find(&self, name: &str) -> Option<&VocabElement> {
        self.elements.values().find(|ve| ve.name() == name)
    }

    fn check_name(&self, kind: SchemaKind, name: &str, own: ElementId, op: &'static str) -> DbResult<()> {
        let legal = match kind {
            SchemaKind::Matrix => lexicon::is_valid_svar_name(name),
            SchemaKind::Predicate => lexicon::is_valid_pred_name(name),
        };
        if !legal {
            return Err(ContractViolation::schema(op, format!("'{name}' is not a legal name")));
        }
        if self.elements.values().any(|ve| ve.name() == name && ve.id() != own) {
            return Err(ContractViolation::schema(op, format!("name '{name}' already in use")));
        }
        Ok(())
    }

    fn check_slots(&self, slots: &[Slot], op: &'static str) -> DbResult<()> {
        if slots.is_empty() {
            return Err(ContractViolation::schema(op, "element needs at least one slot"));
        }
        let mut names = BTreeSet::new();
        for slot in slots {
            if !lexicon::is_valid_farg_name(slot.name()) {
                return Err(ContractViolation::schema(
                    op,
                    format!("'{}' is not a legal slot name", slot.name()),
                ));
            }
            if !names.insert(slot.name()) {
                return Err(ContractViolation::schema(
                    op,
                    format!("slot name '{}' used twice", slot.name()),
                ));
            }
            match slot.range() {
                SlotRange::TimeStamp {
                    bounds: Some((min, _)),
                    ..
                } if *min < 0 => {
                    return Err(ContractViolation::schema(
                        op,
                        format!("slot {} has negative tick bounds", slot.name()),
                    ));
                }
                SlotRange::Integer {
                    bounds: Some((min, max)),
                }
                | SlotRange::TimeStamp {
                    bounds: Some((min, max)),
                    ..
                } if min >= max => {
                    return Err(ContractViolation::schema(
                        op,
                        format!("slot {} has bounds [{min}, {max}]", slot.name()),
                    ));
                }
                SlotRange::Float {
                    bounds: Some((min, max)),
                } if min.is_nan() || max.is_nan() || min >= max => {
                    return Err(ContractViolation::schema(
                        op,
                        format!("slot {} has bounds [{min}, {max}]", slot.name()),
                    ));
                }
                SlotRange::Predicate {
                    approved: Some(ids),
                } => {
                    for id in ids {
                        self.predicate(*id)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_matrix_type(mve: &MatrixVocabElement, op: &'static str) -> DbResult<()> {
        match mve.matrix_type {
            MatrixType::Undefined => Err(ContractViolation::schema(op, "matrix type is UNDEFINED")),
            MatrixType::Matrix => Ok(()),
            single => {
                let expected = single.single_slot_type();
                match mve.fargs.as_slice() {
                    [only] if Some(only.farg_type()) == expected => Ok(()),
                    _ => Err(ContractViolation::schema(
                        op,
                        format!("{single} column needs exactly one matching slot"),
                    )),
                }
            }
        }
    }

    /// Checks that every registered slot in `edited` belongs to `old` with
    /// the same type.
    fn check_continuity(old: &[Slot], edited: &[Slot], op: &'static str) -> DbResult<()> {
        for slot in edited.iter().filter(|s| s.id().is_valid()) {
            let Some(prev) = old.iter().find(|p| p.id() == slot.id()) else {
                return Err(ContractViolation::slot(
                    op,
                    format!("slot {} does not belong to this element", slot.id()),
                ));
            };
            if prev.farg_type() != slot.farg_type() {
                return Err(ContractViolation::schema(
                    op,
                    format!(
                        "slot {} can't change type from {} to {} in place",
                        slot.id(),
                        prev.farg_type(),
                        slot.farg_type()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn allocate_slots(
        &mut self,
        idx: &mut dyn IdentityIndex,
        ve_id: ElementId,
        slots: &mut [Slot],
    ) -> DbResult<()> {
        for slot in slots {
            let id = if slot.id().is_valid() {
                slot.id()
            } else {
                idx.add(IndexEntry::vocab(EntryKind::FormalArg, ve_id))?
            };
            slot.assign_ids(id, ve_id);
            slot.set_tps(self.tps);
            self.slot_owner.insert(id, ve_id);
        }
        Ok(())
    }

    /// Builds the column-predicate shape for `fargs`, reusing the ids of
    /// `old_cp` for the fixed slots and for mirrors of surviving user slots.
    fn build_cp_fargs(
        &mut self,
        idx: &mut dyn IdentityIndex,
        ve_id: ElementId,
        fargs: &[Slot],
        old_fargs: &[Slot],
        old_cp: &[Slot],
    ) -> DbResult<Vec<Slot>> {
        let fixed = [
            Slot::integer("<ord>"),
            Slot::time_stamp("<onset>"),
            Slot::time_stamp("<offset>"),
        ];
        let mut cp = Vec::with_capacity(CP_FIXED_SLOTS + fargs.len());
        for (k, mut slot) in fixed.into_iter().enumerate() {
            let id = match old_cp.get(k) {
                Some(prev) => prev.id(),
                None => idx.add(IndexEntry::vocab(EntryKind::FormalArg, ve_id))?,
            };
            slot.assign_ids(id, ve_id);
            cp.push(slot);
        }
        for farg in fargs {
            let reused = old_fargs
                .iter()
                .position(|prev| prev.id() == farg.id())
                .and_then(|i| old_cp.get(CP_FIXED_SLOTS + i))
                .map(Slot::id);
            let id = match reused {
                Some(id) => id,
                None => idx.add(IndexEntry::vocab(EntryKind::FormalArg, ve_id))?,
            };
            let mut mirror = farg.clone();
            mirror.assign_ids(id, ve_id);
            cp.push(mirror);
        }
        for slot in &mut cp {
            slot.set_tps(self.tps);
            self.slot_owner.insert(slot.id(), ve_id);
        }
        Ok(cp)
    }

    fn release_slots(
        &mut self,
        idx: &mut dyn IdentityIndex,
        old: &[Slot],
        kept: &[Slot],
    ) -> DbResult<()> {
        for slot in old {
            if kept.iter().all(|k| k.id() != slot.id()) {
                idx.remove(slot.id())?;
                self.slot_owner.remove(&slot.id());
            }
        }
        Ok(())
    }

    /// Adds a matrix element, allocating ids for it and every slot.
    pub fn add_matrix(
        &mut self,
        idx: &mut dyn IdentityIndex,
        mut mve: MatrixVocabElement,
    ) -> DbResult<ElementId> {
        const OP: &str = "VocabList::add_matrix";
        if mve.id.is_valid() || mve.fargs.iter().any(|s| s.id().is_valid()) {
            return Err(ContractViolation::invalid_id(OP, "new element carries ids"));
        }
        self.check_name(SchemaKind::Matrix, &mve.name, ElementId::INVALID, OP)?;
        self.check_slots(&mve.fargs, OP)?;
        Self::check_matrix_type(&mve, OP)?;

        let id = idx.add(IndexEntry::vocab(EntryKind::MatrixVocab, ElementId::INVALID))?;
        mve.id = id;
        self.allocate_slots(idx, id, &mut mve.fargs)?;
        mve.cp_fargs = self.build_cp_fargs(idx, id, &mve.fargs, &[], &[])?;
        debug!(ve = %id, name = %mve.name, slots = mve.fargs.len(), "matrix element added");
        self.elements.insert(id, VocabElement::Matrix(mve));
        Ok(id)
    }

    /// Adds a predicate element, allocating ids for it and every slot.
    pub fn add_predicate(
        &mut self,
        idx: &mut dyn IdentityIndex,
        mut pve: PredicateVocabElement,
    ) -> DbResult<ElementId> {
        const OP: &str = "VocabList::add_predicate";
        if pve.id.is_valid() || pve.fargs.iter().any(|s| s.id().is_valid()) {
            return Err(ContractViolation::invalid_id(OP, "new element carries ids"));
        }
        self.check_name(SchemaKind::Predicate, &pve.name, ElementId::INVALID, OP)?;
        self.check_slots(&pve.fargs, OP)?;

        let id = idx.add(IndexEntry::vocab(EntryKind::PredicateVocab, ElementId::INVALID))?;
        pve.id = id;
        self.allocate_slots(idx, id, &mut pve.fargs)?;
        debug!(ve = %id, name = %pve.name, slots = pve.fargs.len(), "predicate element added");
        self.elements.insert(id, VocabElement::Predicate(pve));
        Ok(id)
    }

    /// Replaces a matrix element with an edited copy and describes the edit.
    ///
    /// Surviving slots keep their id; slots carrying INVALID are inserted;
    /// slots missing from the copy are deleted. A slot can't change type in
    /// place.
    pub fn replace_matrix(
        &mut self,
        idx: &mut dyn IdentityIndex,
        edited: MatrixVocabElement,
    ) -> DbResult<VocabChange> {
        const OP: &str = "VocabList::replace_matrix";
        let old = self.matrix(edited.id)?.clone();
        if edited.matrix_type != old.matrix_type {
            return Err(ContractViolation::schema(OP, "matrix type can't change"));
        }
        self.check_name(SchemaKind::Matrix, &edited.name, old.id, OP)?;
        self.check_slots(&edited.fargs, OP)?;
        Self::check_matrix_type(&edited, OP)?;
        Self::check_continuity(&old.fargs, &edited.fargs, OP)?;

        let mut new = edited;
        self.allocate_slots(idx, old.id, &mut new.fargs)?;
        self.release_slots(idx, &old.fargs, &new.fargs)?;
        new.cp_fargs = self.build_cp_fargs(idx, old.id, &new.fargs, &old.fargs, &old.cp_fargs)?;
        self.release_slots(idx, &old.cp_fargs, &new.cp_fargs)?;

        let slots = SlotMapping::between(&old.fargs, &new.fargs)?;
        let cp_slots = SlotMapping::between(&old.cp_fargs, &new.cp_fargs)?;
        let change = VocabChange {
            ve_id: old.id,
            name_changed: old.name != new.name,
            old_name: old.name.clone(),
            new_name: new.name.clone(),
            var_len_changed: old.var_len != new.var_len,
            old_var_len: old.var_len,
            new_var_len: new.var_len,
            farg_list_changed: slots.has_changes() || cp_slots.has_changes(),
            slots,
            cp_slots: Some(cp_slots),
        };
        debug!(ve = %old.id, noop = change.is_noop(), "matrix element replaced");
        self.elements.insert(old.id, VocabElement::Matrix(new));
        Ok(change)
    }

    /// Replaces a predicate element with an edited copy and describes the
    /// edit. Same slot rules as [`VocabList::replace_matrix`].
    pub fn replace_predicate(
        &mut self,
        idx: &mut dyn IdentityIndex,
        edited: PredicateVocabElement,
    ) -> DbResult<VocabChange> {
        const OP: &str = "VocabList::replace_predicate";
        let old = self.predicate(edited.id)?.clone();
        self.check_name(SchemaKind::Predicate, &edited.name, old.id, OP)?;
        self.check_slots(&edited.fargs, OP)?;
        Self::check_continuity(&old.fargs, &edited.fargs, OP)?;

        let mut new = edited;
        self.allocate_slots(idx, old.id, &mut new.fargs)?;
        self.release_slots(idx, &old.fargs, &new.fargs)?;

        let slots = SlotMapping::between(&old.fargs, &new.fargs)?;
        let change = VocabChange {
            ve_id: old.id,
            name_changed: old.name != new.name,
            old_name: old.name.clone(),
            new_name: new.name.clone(),
            var_len_changed: old.var_len != new.var_len,
            old_var_len: old.var_len,
            new_var_len: new.var_len,
            farg_list_changed: slots.has_changes(),
            slots,
            cp_slots: None,
        };
        debug!(ve = %old.id, noop = change.is_noop(), "predicate element replaced");
        self.elements.insert(old.id, VocabElement::Predicate(new));
        Ok(change)
    }

    fn remove_element(
        &mut self,
        idx: &mut dyn IdentityIndex,
        ve_id: ElementId,
        op: &'static str,
    ) -> DbResult<VocabElement> {
        let subscribed = self.listeners.get(&ve_id).map_or(0, BTreeSet::len);
        if subscribed > 0 {
            return Err(ContractViolation::index(
                op,
                format!("element {ve_id} still has {subscribed} listeners"),
            ));
        }
        let element = self.elements.remove(&ve_id).ok_or(ContractViolation::NotFound {
            op,
            what: "vocab element",
            id: ve_id,
        })?;
        for slot in element.all_slots() {
            idx.remove(slot.id())?;
            self.slot_owner.remove(&slot.id());
        }
        idx.remove(ve_id)?;
        self.listeners.remove(&ve_id);
        Ok(element)
    }

    /// Removes a matrix element and its slots. Bound records must have been
    /// deregistered first.
    pub fn remove_matrix(
        &mut self,
        idx: &mut dyn IdentityIndex,
        ve_id: ElementId,
    ) -> DbResult<MatrixVocabElement> {
        const OP: &str = "VocabList::remove_matrix";
        self.matrix(ve_id)?;
        match self.remove_element(idx, ve_id, OP)? {
            VocabElement::Matrix(m) => Ok(m),
            VocabElement::Predicate(_) => Err(ContractViolation::corrupt(OP, "kind changed")),
        }
    }

    /// Removes a predicate element and its slots, and drops it from every
    /// predicate approval set. Bound records must have been deregistered
    /// first. Values mirroring an approval set are not refreshed here;
    /// [`crate::Database::delete_predicate_ve`] cascades that edit.
    pub fn remove_predicate(
        &mut self,
        idx: &mut dyn IdentityIndex,
        ve_id: ElementId,
    ) -> DbResult<PredicateVocabElement> {
        let removed = self.take_predicate(idx, ve_id)?;
        for element in self.elements.values_mut() {
            for slot in element.slots_mut() {
                if slot.forget_predicate(ve_id) {
                    debug!(slot = %slot.id(), pve = %ve_id, "dropped deleted predicate from approval set");
                }
            }
        }
        Ok(removed)
    }

    /// Removes a predicate element and its slots, leaving approval sets that
    /// name it in place.
    pub(crate) fn take_predicate(
        &mut self,
        idx: &mut dyn IdentityIndex,
        ve_id: ElementId,
    ) -> DbResult<PredicateVocabElement> {
        const OP: &str = "VocabList::remove_predicate";
        self.predicate(ve_id)?;
        match self.remove_element(idx, ve_id, OP)? {
            VocabElement::Predicate(p) => Ok(p),
            VocabElement::Matrix(_) => Err(ContractViolation::corrupt(OP, "kind changed")),
        }
    }

    /// Edited copies of every other element with a slot approving predicate
    /// `pve_id`, that approval withdrawn.
    pub(crate) fn without_approval_of(&self, pve_id: ElementId) -> Vec<VocabElement> {
        let mut out = Vec::new();
        for element in self.elements.values().filter(|ve| ve.id() != pve_id) {
            let mut edited = element.clone();
            let mut touched = false;
            for slot in edited.slots_mut() {
                touched |= slot.forget_predicate(pve_id);
            }
            if touched {
                out.push(edited);
            }
        }
        out
    }
}

impl SchemaAuthority for VocabList {
    fn resolve(&self, ve_id: ElementId) -> DbResult<&VocabElement> {
        if !ve_id.is_valid() {
            return Err(ContractViolation::invalid_id(
                "VocabList::resolve",
                "element id is INVALID",
            ));
        }
        self.elements.get(&ve_id).ok_or(ContractViolation::NotFound {
            op: "VocabList::resolve",
            what: "vocab element",
            id: ve_id,
        })
    }

    fn slot(&self, farg_id: ElementId) -> DbResult<&Slot> {
        let not_found = ContractViolation::NotFound {
            op: "VocabList::slot",
            what: "formal argument",
            id: farg_id,
        };
        let owner = self.slot_owner.get(&farg_id).ok_or_else(|| not_found.clone())?;
        self.resolve(*owner)?
            .all_slots()
            .find(|s| s.id() == farg_id)
            .ok_or(not_found)
    }

    fn ticks_per_second(&self) -> u32 {
        self.tps
    }

    fn register_listener(&mut self, ve_id: ElementId, record_id: ElementId) -> DbResult<()> {
        const OP: &str = "VocabList::register_listener";
        self.resolve(ve_id)?;
        if !record_id.is_valid() {
            return Err(ContractViolation::invalid_id(OP, "record id is INVALID"));
        }
        if !self.listeners.entry(ve_id).or_default().insert(record_id) {
            return Err(ContractViolation::index(
                OP,
                format!("record {record_id} already listening to {ve_id}"),
            ));
        }
        Ok(())
    }

    fn deregister_listener(&mut self, ve_id: ElementId, record_id: ElementId) -> DbResult<()> {
        let removed = self
            .listeners
            .get_mut(&ve_id)
            .is_some_and(|set| set.remove(&record_id));
        if !removed {
            return Err(ContractViolation::index(
                "VocabList::deregister_listener",
                format!("record {record_id} is not listening to {ve_id}"),
            ));
        }
        Ok(())
    }

    fn listeners(&self, ve_id: ElementId) -> Vec<ElementId> {
        self.listeners
            .get(&ve_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
