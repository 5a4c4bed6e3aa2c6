// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cascade protocol types: the four schema-change notifications, the
//! in-flight cascade marker used during index reconciliation, and the
//! old-to-new slot correspondence computed for every vocabulary edit.
use crate::error::{ContractViolation, DbResult};
use crate::farg::Slot;
use crate::ident::ElementId;

/// Which kind of vocabulary element an operation concerns.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SchemaKind {
    /// Record-shaped (matrix) elements; column predicates bind to these.
    Matrix,
    /// Nested-predicate elements; predicates bind to these.
    Predicate,
}

/// The structural cascade in flight while a replacement is reconciled with
/// the index, if any.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Cascade {
    /// Plain edit; argument lists of same-element records line up by position.
    #[default]
    None,
    /// The matrix element's definition changed.
    MatrixModified(ElementId),
    /// The matrix element was deleted.
    MatrixDeleted(ElementId),
    /// The predicate element's definition changed.
    PredicateModified(ElementId),
    /// The predicate element was deleted.
    PredicateDeleted(ElementId),
}

impl Cascade {
    /// Returns `true` if this cascade modifies element `ve_id` of `kind`.
    pub fn modifies(self, kind: SchemaKind, ve_id: ElementId) -> bool {
        match (self, kind) {
            (Self::MatrixModified(id), SchemaKind::Matrix)
            | (Self::PredicateModified(id), SchemaKind::Predicate) => id == ve_id,
            _ => false,
        }
    }

    /// Returns `true` if this cascade deletes element `ve_id` of `kind`.
    pub fn deletes(self, kind: SchemaKind, ve_id: ElementId) -> bool {
        match (self, kind) {
            (Self::MatrixDeleted(id), SchemaKind::Matrix)
            | (Self::PredicateDeleted(id), SchemaKind::Predicate) => id == ve_id,
            _ => false,
        }
    }

    /// Returns `true` unless this is [`Cascade::None`].
    pub fn is_active(self) -> bool {
        self != Self::None
    }
}

/// One of the four messages broadcast to records bound to an element.
#[derive(Clone, Debug)]
pub enum Notification {
    /// A matrix element's name, var-len flag and/or slots changed.
    MatrixChanged(VocabChange),
    /// A matrix element was deleted.
    MatrixDeleted(ElementId),
    /// A predicate element's name, var-len flag and/or slots changed.
    PredicateChanged(VocabChange),
    /// A predicate element was deleted.
    PredicateDeleted(ElementId),
}

impl Notification {
    /// Element the notification is about.
    pub fn ve_id(&self) -> ElementId {
        match self {
            Self::MatrixChanged(change) | Self::PredicateChanged(change) => change.ve_id,
            Self::MatrixDeleted(id) | Self::PredicateDeleted(id) => *id,
        }
    }

    /// Kind of the element the notification is about.
    pub fn schema_kind(&self) -> SchemaKind {
        match self {
            Self::MatrixChanged(_) | Self::MatrixDeleted(_) => SchemaKind::Matrix,
            Self::PredicateChanged(_) | Self::PredicateDeleted(_) => SchemaKind::Predicate,
        }
    }

    /// The cascade marker index reconciliation runs under for this message.
    pub fn cascade(&self) -> Cascade {
        match self {
            Self::MatrixChanged(change) => Cascade::MatrixModified(change.ve_id),
            Self::MatrixDeleted(id) => Cascade::MatrixDeleted(*id),
            Self::PredicateChanged(change) => Cascade::PredicateModified(change.ve_id),
            Self::PredicateDeleted(id) => Cascade::PredicateDeleted(*id),
        }
    }
}

/// Correspondence between an element's old and new slot lists, matched by
/// slot identity.
#[derive(Clone, Debug, Default)]
pub struct SlotMapping {
    /// For each new slot, the index of the old slot it continues.
    pub n2o: Vec<Option<usize>>,
    /// For each old slot, the index of the new slot that continues it.
    pub o2n: Vec<Option<usize>>,
    /// Per new slot: renamed.
    pub name_changed: Vec<bool>,
    /// Per new slot: subrange switched on or off.
    pub subrange_changed: Vec<bool>,
    /// Per new slot: bounds or approval set edited.
    pub range_changed: Vec<bool>,
    /// Per old slot: removed by the edit.
    pub deleted: Vec<bool>,
    /// Per new slot: added by the edit.
    pub inserted: Vec<bool>,
    /// Slots before the edit.
    pub old_slots: Vec<Slot>,
    /// Slots after the edit.
    pub new_slots: Vec<Slot>,
}

impl SlotMapping {
    /// Computes the mapping between two slot lists of the same element.
    ///
    /// Every registered slot in `new` must either continue an old slot of the
    /// same type or be freshly allocated (absent from `old`).
    pub fn between(old: &[Slot], new: &[Slot]) -> DbResult<Self> {
        const OP: &str = "SlotMapping::between";
        let mut map = Self {
            n2o: vec![None; new.len()],
            o2n: vec![None; old.len()],
            name_changed: vec![false; new.len()],
            subrange_changed: vec![false; new.len()],
            range_changed: vec![false; new.len()],
            deleted: vec![true; old.len()],
            inserted: vec![true; new.len()],
            old_slots: old.to_vec(),
            new_slots: new.to_vec(),
        };
        for (j, slot) in new.iter().enumerate() {
            if !slot.id().is_valid() {
                continue;
            }
            let matches: Vec<usize> = old
                .iter()
                .enumerate()
                .filter(|(_, prev)| prev.id() == slot.id())
                .map(|(i, _)| i)
                .collect();
            let i = match matches.as_slice() {
                [] => continue,
                [i] => *i,
                _ => {
                    return Err(ContractViolation::corrupt(
                        OP,
                        format!("slot id {} appears twice in the old list", slot.id()),
                    ))
                }
            };
            if map.o2n[i].is_some() {
                return Err(ContractViolation::corrupt(
                    OP,
                    format!("slot id {} appears twice in the new list", slot.id()),
                ));
            }
            let prev = &old[i];
            if prev.farg_type() != slot.farg_type() {
                return Err(ContractViolation::schema(
                    OP,
                    format!(
                        "slot {} retyped in place from {} to {}",
                        slot.id(),
                        prev.farg_type(),
                        slot.farg_type()
                    ),
                ));
            }
            map.n2o[j] = Some(i);
            map.o2n[i] = Some(j);
            map.deleted[i] = false;
            map.inserted[j] = false;
            map.name_changed[j] = prev.name() != slot.name();
            map.subrange_changed[j] = prev.is_subranged() != slot.is_subranged();
            map.range_changed[j] = prev.range() != slot.range();
        }
        Ok(map)
    }

    /// Returns `true` if the edit touched the slot list at all.
    pub fn has_changes(&self) -> bool {
        self.old_slots.len() != self.new_slots.len()
            || self.inserted.iter().any(|f| *f)
            || self.deleted.iter().any(|f| *f)
            || self.n2o.iter().enumerate().any(|(j, i)| *i != Some(j))
            || self.name_changed.iter().any(|f| *f)
            || self.subrange_changed.iter().any(|f| *f)
            || self.range_changed.iter().any(|f| *f)
    }

    /// Returns `true` if new slot `j` needs [`crate::DataValue::update_for_farg_change`].
    pub fn slot_edited(&self, j: usize) -> bool {
        self.name_changed.get(j).copied().unwrap_or(false)
            || self.subrange_changed.get(j).copied().unwrap_or(false)
            || self.range_changed.get(j).copied().unwrap_or(false)
    }
}

/// Description of one vocabulary edit, as broadcast to bound records.
#[derive(Clone, Debug)]
pub struct VocabChange {
    /// Edited element.
    pub ve_id: ElementId,
    /// The element was renamed.
    pub name_changed: bool,
    /// Name before the edit.
    pub old_name: String,
    /// Name after the edit.
    pub new_name: String,
    /// The var-len flag flipped.
    pub var_len_changed: bool,
    /// Var-len flag before the edit.
    pub old_var_len: bool,
    /// Var-len flag after the edit.
    pub new_var_len: bool,
    /// The slot list (or the implied column-predicate slot list) changed.
    pub farg_list_changed: bool,
    /// User-visible slot correspondence.
    pub slots: SlotMapping,
    /// Column-predicate shape correspondence; matrices only.
    pub cp_slots: Option<SlotMapping>,
}

impl VocabChange {
    /// Change record with every flag false: broadcasting it must leave bound
    /// records untouched.
    pub fn unchanged(
        ve_id: ElementId,
        name: &str,
        var_len: bool,
        slots: &[Slot],
        cp_slots: Option<&[Slot]>,
    ) -> DbResult<Self> {
        Ok(Self {
            ve_id,
            name_changed: false,
            old_name: name.to_owned(),
            new_name: name.to_owned(),
            var_len_changed: false,
            old_var_len: var_len,
            new_var_len: var_len,
            farg_list_changed: false,
            slots: SlotMapping::between(slots, slots)?,
            cp_slots: cp_slots.map(|cp| SlotMapping::between(cp, cp)).transpose()?,
        })
    }

    /// Returns `true` if nothing about the element changed.
    pub fn is_noop(&self) -> bool {
        !self.name_changed && !self.var_len_changed && !self.farg_list_changed
    }

    /// Mapping for records of `kind` bound to this element: the column
    /// predicate shape for matrices, the plain slots for predicates.
    pub fn mapping_for(&self, kind: SchemaKind) -> DbResult<&SlotMapping> {
        match kind {
            SchemaKind::Predicate => Ok(&self.slots),
            SchemaKind::Matrix => self.cp_slots.as_ref().ok_or_else(|| {
                ContractViolation::corrupt(
                    "VocabChange::mapping_for",
                    format!("matrix change for {} without column-predicate mapping", self.ve_id),
                )
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::farg::SlotRange;

    fn registered(mut slot: Slot, id: u64) -> Slot {
        slot.assign_ids(ElementId(id), ElementId(1));
        slot
    }

    #[test]
    fn cascade_predicates() {
        let c = Cascade::MatrixModified(ElementId(4));
        assert!(c.modifies(SchemaKind::Matrix, ElementId(4)));
        assert!(!c.modifies(SchemaKind::Predicate, ElementId(4)));
        assert!(!c.deletes(SchemaKind::Matrix, ElementId(4)));
        assert!(Cascade::PredicateDeleted(ElementId(2)).deletes(SchemaKind::Predicate, ElementId(2)));
        assert!(!Cascade::None.is_active());
    }

    #[test]
    fn mapping_tracks_insert_delete_and_reorder() {
        let a = registered(Slot::integer("<a>"), 10);
        let b = registered(Slot::float("<b>"), 11);
        let c = registered(Slot::nominal("<c>"), 12);
        let mut b2 = b.clone();
        b2.rename("<bee>");
        let fresh = Slot::text("<d>");
        let map = SlotMapping::between(&[a, b, c.clone()], &[c, b2, fresh]).unwrap();
        assert_eq!(map.n2o, vec![Some(2), Some(1), None]);
        assert_eq!(map.o2n, vec![None, Some(1), Some(0)]);
        assert_eq!(map.deleted, vec![true, false, false]);
        assert_eq!(map.inserted, vec![false, false, true]);
        assert_eq!(map.name_changed, vec![false, true, false]);
        assert!(map.has_changes());
        assert!(map.slot_edited(1));
        assert!(!map.slot_edited(0));
    }

    #[test]
    fn retyping_in_place_is_rejected() {
        let a = registered(Slot::integer("<a>"), 10);
        let mut retyped = a.clone();
        retyped.set_range(SlotRange::Text);
        let err = SlotMapping::between(&[a], &[retyped]).unwrap_err();
        assert!(matches!(err, ContractViolation::Schema { .. }));
    }

    #[test]
    fn identical_lists_are_a_noop() {
        let a = registered(Slot::integer("<a>"), 10);
        let change = VocabChange::unchanged(ElementId(1), "m", false, &[a], None).unwrap();
        assert!(change.is_noop());
        assert!(!change.slots.has_changes());
        assert!(change.mapping_for(SchemaKind::Matrix).is_err());
    }
}
