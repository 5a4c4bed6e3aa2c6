// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Index reconciliation when an edited copy replaces the canonical record.
use tracing::debug;

use crate::cascade::Cascade;
use crate::error::{ContractViolation, DbResult};
use crate::ident::ElementId;
use crate::index::{IdentityIndex, IndexEntry};
use crate::value::DataValue;
use crate::vocab::SchemaAuthority;

use super::validate::find_by_id;
use super::{Record, RecordKind};

impl<K: RecordKind> Record<K> {
    /// Makes this record the canonical instance in place of `old`, bringing
    /// the index in line with the new argument tree.
    ///
    /// Arguments that keep their identity are replaced in place, fresh ones
    /// are inserted and orphaned ones removed. While `cascade` modifies this
    /// record's element, old and new arguments are matched by identity;
    /// otherwise they are matched by position.
    pub fn update_index_for_replacement(
        &mut self,
        idx: &mut dyn IdentityIndex,
        schema: &dyn SchemaAuthority,
        old: &Self,
        cell_id: ElementId,
        cascade: Cascade,
    ) -> DbResult<()> {
        const OP: &str = "Record::update_index_for_replacement";
        if old.cell_id != cell_id {
            return Err(ContractViolation::index(
                OP,
                format!("old record lives in cell {}, not {cell_id}", old.cell_id),
            ));
        }
        old.check_unbound_well_formed(OP)?;
        if self.is_bound() && cascade.deletes(K::SCHEMA, self.ve_id) {
            return Err(ContractViolation::corrupt(
                OP,
                format!("still bound to deleted element {}", self.ve_id),
            ));
        }
        if !old.id.is_valid() {
            return Err(ContractViolation::invalid_id(OP, "old record is not in the index"));
        }
        if self.id.is_valid() {
            if self.id != old.id {
                return Err(ContractViolation::invalid_id(
                    OP,
                    format!("new id {} does not match old id {}", self.id, old.id),
                ));
            }
            if self.cell_id != cell_id {
                return Err(ContractViolation::index(
                    OP,
                    format!("new record lives in cell {}, not {cell_id}", self.cell_id),
                ));
            }
        }
        self.cell_id = cell_id;
        let entry = IndexEntry::record(K::ENTRY, cell_id);

        if !self.is_bound() {
            if !self.id.is_valid() {
                debug!(old = %old.id, "unbound replacement without identity: reinserting");
                old.remove_from_index(idx, cell_id)?;
                return self.insert_in_index(idx, cell_id);
            }
            if old.is_bound() {
                debug!(record = %self.id, "record unbound: dropping old arguments");
                old.remove_args_from_index(idx, cell_id)?;
            }
            return idx.replace(self.id, entry);
        }

        if !old.is_bound() || self.ve_id != old.ve_id {
            debug!(record = %self.id, from = %old.ve_id, to = %self.ve_id, "record rebound");
            if !self.id.is_valid() {
                old.remove_from_index(idx, cell_id)?;
                return self.insert_in_index(idx, cell_id);
            }
            idx.replace(self.id, entry)?;
            old.remove_args_from_index(idx, cell_id)?;
            return self.insert_args_in_index(idx, cell_id);
        }

        if !self.id.is_valid() {
            debug!(old = %old.id, "same element, new tree without identity: reinserting");
            old.remove_from_index(idx, cell_id)?;
            return self.insert_in_index(idx, cell_id);
        }

        idx.replace(self.id, entry)?;
        if cascade.modifies(K::SCHEMA, self.ve_id) {
            debug!(record = %self.id, ?cascade, "reconciling arguments by identity");
            self.reconcile_by_identity(idx, schema, old, cell_id, cascade)
        } else {
            debug!(record = %self.id, "reconciling arguments by position");
            self.reconcile_by_position(idx, schema, old, cell_id, cascade)
        }
    }

    fn reconcile_by_position(
        &mut self,
        idx: &mut dyn IdentityIndex,
        schema: &dyn SchemaAuthority,
        old: &Self,
        cell_id: ElementId,
        cascade: Cascade,
    ) -> DbResult<()> {
        const OP: &str = "Record::reconcile_by_position";
        let slots = K::shape(schema, self.ve_id)?.slots;
        let ctx = self.arg_context();
        let owner = self.id;
        let old_args = old.args();
        let new_args = self.args_mut(OP)?;
        if new_args.len() != old_args.len() || new_args.len() != slots.len() {
            return Err(ContractViolation::ArityMismatch {
                op: OP,
                expected: slots.len(),
                actual: new_args.len(),
            });
        }
        for (n, ((new, prev), slot)) in new_args.iter_mut().zip(old_args).zip(slots).enumerate() {
            if slot.id() != new.farg_id() || slot.id() != prev.farg_id() {
                return Err(ContractViolation::slot(
                    OP,
                    format!("arg {n}: old and new args are not both bound to slot {}", slot.id()),
                ));
            }
            if !prev.id().is_valid() {
                return Err(ContractViolation::invalid_id(
                    OP,
                    format!("arg {n}: old arg is not in the index"),
                ));
            }
            if new.id().is_valid() && new.id() != prev.id() {
                return Err(ContractViolation::invalid_id(
                    OP,
                    format!("arg {n}: new id {} does not match old id {}", new.id(), prev.id()),
                ));
            }
            ctx.validate_replacement_arg(schema, slot, n, Some(prev), new, cascade)?;
            new.set_owner(owner);
            new.adopt_cell(cell_id);
            replace_or_swap(idx, schema, new, prev, cell_id, cascade)?;
        }
        Ok(())
    }

    fn reconcile_by_identity(
        &mut self,
        idx: &mut dyn IdentityIndex,
        schema: &dyn SchemaAuthority,
        old: &Self,
        cell_id: ElementId,
        cascade: Cascade,
    ) -> DbResult<()> {
        const OP: &str = "Record::reconcile_by_identity";
        let slots = K::shape(schema, self.ve_id)?.slots;
        let ctx = self.arg_context();
        let owner = self.id;
        let old_args = old.args();
        let new_args = self.args_mut(OP)?;

        for prev in old_args {
            if !prev.id().is_valid() {
                return Err(ContractViolation::invalid_id(OP, "old arg is not in the index"));
            }
            match new_args.iter().filter(|new| new.id() == prev.id()).count() {
                0 => {
                    debug!(arg = %prev.id(), "old arg has no successor: removing");
                    prev.remove_from_index(idx, cell_id)?;
                }
                1 => {}
                _ => {
                    return Err(ContractViolation::index(
                        OP,
                        format!("old arg {} appears more than once in the new list", prev.id()),
                    ));
                }
            }
        }

        if new_args.len() != slots.len() {
            return Err(ContractViolation::ArityMismatch {
                op: OP,
                expected: slots.len(),
                actual: new_args.len(),
            });
        }
        for (n, (new, slot)) in new_args.iter_mut().zip(slots).enumerate() {
            if new.farg_id() != slot.id() {
                return Err(ContractViolation::slot(
                    OP,
                    format!("arg {n}: bound to {}, slot is {}", new.farg_id(), slot.id()),
                ));
            }
            let prev = if new.id().is_valid() {
                Some(find_by_id(old_args, new.id(), n, OP)?)
            } else {
                None
            };
            ctx.validate_replacement_arg(schema, slot, n, prev, new, cascade)?;
            new.set_owner(owner);
            new.adopt_cell(cell_id);
            match prev {
                Some(prev) => new.replace_in_index(idx, schema, prev, cell_id, cascade)?,
                None => new.insert_in_index(idx, cell_id)?,
            }
        }
        Ok(())
    }
}

/// Replaces `prev` by `new` in the index: in place when `new` kept the
/// identity, otherwise by removing the old tree and inserting the new one.
fn replace_or_swap(
    idx: &mut dyn IdentityIndex,
    schema: &dyn SchemaAuthority,
    new: &mut DataValue,
    prev: &DataValue,
    cell_id: ElementId,
    cascade: Cascade,
) -> DbResult<()> {
    if new.id().is_valid() {
        new.replace_in_index(idx, schema, prev, cell_id, cascade)
    } else {
        prev.remove_from_index(idx, cell_id)?;
        new.insert_in_index(idx, cell_id)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::farg::Slot;
    use crate::index::DbIndex;
    use crate::record::{ColPred, Predicate};
    use crate::vocab::{MatrixType, MatrixVocabElement, PredicateVocabElement, VocabList};

    const CELL: ElementId = ElementId(1000);

    fn setup() -> (DbIndex, VocabList, ElementId, ElementId) {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let pve = vocab
            .add_predicate(&mut idx, PredicateVocabElement::new("p").with_slot(Slot::integer("<k>")))
            .unwrap();
        let mve = vocab
            .add_matrix(
                &mut idx,
                MatrixVocabElement::new("m", MatrixType::Matrix)
                    .with_slot(Slot::integer("<a>"))
                    .with_slot(Slot::untyped("<b>")),
            )
            .unwrap();
        (idx, vocab, mve, pve)
    }

    fn canonical(idx: &mut DbIndex, vocab: &VocabList, mve: ElementId) -> ColPred {
        let mut cp = ColPred::bound(vocab, mve).unwrap();
        cp.adopt_cell(CELL);
        cp.insert_in_index(idx, CELL).unwrap();
        cp
    }

    #[test]
    fn positional_replacement_keeps_or_swaps_identities() {
        let (mut idx, vocab, mve, _) = setup();
        let old = canonical(&mut idx, &vocab, mve);
        let kept = old.arg(3).unwrap().id();
        let swapped = old.arg(4).unwrap().id();

        let mut new = old.copy(&vocab).unwrap();
        new.replace_arg(&vocab, 4, DataValue::int(9)).unwrap();
        new.validate_replacement(&vocab, &old, Cascade::None).unwrap();
        new.update_index_for_replacement(&mut idx, &vocab, &old, CELL, Cascade::None)
            .unwrap();

        assert_eq!(new.arg(3).unwrap().id(), kept);
        assert!(!idx.contains(swapped));
        assert!(idx.contains(new.arg(4).unwrap().id()));
        assert_eq!(idx.ids_in_cell(CELL).len(), 6);
    }

    #[test]
    fn nested_predicate_is_inserted_and_later_removed() {
        let (mut idx, vocab, mve, pve) = setup();
        let old = canonical(&mut idx, &vocab, mve);
        let mut new = old.copy(&vocab).unwrap();
        let nested = Predicate::with_args(&vocab, pve, vec![DataValue::int(5)]).unwrap();
        new.replace_arg(&vocab, 4, DataValue::predicate(nested)).unwrap();
        new.update_index_for_replacement(&mut idx, &vocab, &old, CELL, Cascade::None)
            .unwrap();
        // record + 5 values + nested predicate + its value
        assert_eq!(idx.ids_in_cell(CELL).len(), 8);
        assert_eq!(new.to_string(), "m(0, 00:00:00:000, 00:00:00:000, 0, p(5))");

        let mut cleared = new.copy(&vocab).unwrap();
        cleared
            .replace_arg(&vocab, 4, DataValue::undefined("<b>").unwrap())
            .unwrap();
        cleared
            .update_index_for_replacement(&mut idx, &vocab, &new, CELL, Cascade::None)
            .unwrap();
        assert_eq!(idx.ids_in_cell(CELL).len(), 6);
    }

    #[test]
    fn unbinding_drops_arguments_but_keeps_the_record() {
        let (mut idx, vocab, mve, _) = setup();
        let old = canonical(&mut idx, &vocab, mve);
        let mut new = old.copy(&vocab).unwrap();
        new.set_ve_id(&vocab, ElementId::INVALID, false).unwrap();
        new.update_index_for_replacement(&mut idx, &vocab, &old, CELL, Cascade::None)
            .unwrap();
        assert_eq!(idx.ids_in_cell(CELL), vec![old.id()]);
    }

    #[test]
    fn identity_mismatch_and_wrong_cell_fail() {
        let (mut idx, vocab, mve, _) = setup();
        let old = canonical(&mut idx, &vocab, mve);
        let mut new = old.copy(&vocab).unwrap();
        assert!(new
            .update_index_for_replacement(&mut idx, &vocab, &old, ElementId(3), Cascade::None)
            .is_err());
        let mut stray = ColPred::bound(&vocab, mve).unwrap();
        stray.adopt_cell(CELL);
        stray.id = ElementId(9999);
        assert!(stray
            .update_index_for_replacement(&mut idx, &vocab, &old, CELL, Cascade::None)
            .is_err());
        new.update_index_for_replacement(&mut idx, &vocab, &old, CELL, Cascade::None)
            .unwrap();
    }

    #[test]
    fn identity_reconciliation_rejects_a_duplicated_new_identity() {
        let (mut idx, vocab, mve, _) = setup();
        let old = canonical(&mut idx, &vocab, mve);
        let mut new = old.copy_blind();
        let twin = new.arg(3).unwrap().copy_blind();
        new.args.as_mut().unwrap()[4] = twin;
        let err = new
            .update_index_for_replacement(&mut idx, &vocab, &old, CELL, Cascade::MatrixModified(mve))
            .unwrap_err();
        assert!(matches!(err, ContractViolation::IndexState { .. }));
        assert!(err
            .to_string()
            .contains("appears more than once in the new list"));
    }
}
