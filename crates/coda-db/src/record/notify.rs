// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Schema-change handlers: how a record follows edits and deletions of the
//! vocabulary elements it (or any nested record) is bound to.
use tracing::debug;

use crate::cascade::{Notification, SchemaKind, VocabChange};
use crate::error::{ContractViolation, DbResult};
use crate::farg::FargType;
use crate::ident::ElementId;
use crate::value::{DataValue, ValueKind};
use crate::vocab::SchemaAuthority;

use super::{Record, RecordKind};

fn nested_kind(kind: SchemaKind) -> ValueKind {
    match kind {
        SchemaKind::Matrix => ValueKind::ColPredicate,
        SchemaKind::Predicate => ValueKind::Predicate,
    }
}

fn dedicated_slot(kind: SchemaKind) -> FargType {
    match kind {
        SchemaKind::Matrix => FargType::ColPredicate,
        SchemaKind::Predicate => FargType::Predicate,
    }
}

impl<K: RecordKind> Record<K> {
    /// Dispatches one of the four schema notifications.
    pub fn apply_notification(
        &mut self,
        schema: &dyn SchemaAuthority,
        note: &Notification,
    ) -> DbResult<()> {
        match note {
            Notification::MatrixChanged(change) => self.update_for_matrix_change(schema, change, note),
            Notification::MatrixDeleted(id) => self.update_for_matrix_deletion(schema, *id, note),
            Notification::PredicateChanged(change) => {
                self.update_for_predicate_change(schema, change, note)
            }
            Notification::PredicateDeleted(id) => {
                self.update_for_predicate_deletion(schema, *id, note)
            }
        }
    }

    /// A matrix element's definition changed.
    pub fn update_for_matrix_change(
        &mut self,
        schema: &dyn SchemaAuthority,
        change: &VocabChange,
        note: &Notification,
    ) -> DbResult<()> {
        self.update_for_change(schema, SchemaKind::Matrix, change, note)
    }

    /// A matrix element was deleted.
    pub fn update_for_matrix_deletion(
        &mut self,
        schema: &dyn SchemaAuthority,
        deleted: ElementId,
        note: &Notification,
    ) -> DbResult<()> {
        self.update_for_deletion(schema, SchemaKind::Matrix, deleted, note)
    }

    /// A predicate element's definition changed.
    pub fn update_for_predicate_change(
        &mut self,
        schema: &dyn SchemaAuthority,
        change: &VocabChange,
        note: &Notification,
    ) -> DbResult<()> {
        self.update_for_change(schema, SchemaKind::Predicate, change, note)
    }

    /// A predicate element was deleted.
    pub fn update_for_predicate_deletion(
        &mut self,
        schema: &dyn SchemaAuthority,
        deleted: ElementId,
        note: &Notification,
    ) -> DbResult<()> {
        self.update_for_deletion(schema, SchemaKind::Predicate, deleted, note)
    }

    fn update_for_change(
        &mut self,
        schema: &dyn SchemaAuthority,
        kind: SchemaKind,
        change: &VocabChange,
        note: &Notification,
    ) -> DbResult<()> {
        if !self.is_bound() {
            return Ok(());
        }
        if kind == K::SCHEMA && self.ve_id == change.ve_id {
            self.apply_own_change(change)?;
        }
        for arg in self.args.iter_mut().flatten() {
            arg.apply_notification(schema, note)?;
        }
        Ok(())
    }

    /// Follows an edit of the element this record is bound to. Surviving
    /// arguments move (identity included) to their slot's new position;
    /// inserted slots get their default.
    fn apply_own_change(&mut self, change: &VocabChange) -> DbResult<()> {
        const OP: &str = "Record::apply_own_change";
        if change.name_changed {
            if self.ve_name != change.old_name {
                return Err(ContractViolation::corrupt(
                    OP,
                    format!("cached name '{}', change says '{}'", self.ve_name, change.old_name),
                ));
            }
            change.new_name.clone_into(&mut self.ve_name);
        }
        if change.var_len_changed {
            if self.var_len != change.old_var_len {
                return Err(ContractViolation::corrupt(OP, "cached var-len flag is stale"));
            }
            self.var_len = change.new_var_len;
        }
        if !change.farg_list_changed {
            return Ok(());
        }

        let mapping = change.mapping_for(K::SCHEMA)?;
        let old_args = self
            .args
            .take()
            .ok_or_else(|| ContractViolation::corrupt(OP, "bound record without argument list"))?;
        if old_args.len() != mapping.old_slots.len() {
            return Err(ContractViolation::ArityMismatch {
                op: OP,
                expected: mapping.old_slots.len(),
                actual: old_args.len(),
            });
        }
        let mut moved: Vec<Option<DataValue>> =
            std::iter::repeat_with(|| None).take(mapping.new_slots.len()).collect();
        for (i, mut arg) in old_args.into_iter().enumerate() {
            if mapping.deleted.get(i).copied().unwrap_or(true) {
                debug!(record = %self.id, slot = i, "dropping argument of deleted slot");
                continue;
            }
            let j = mapping.o2n.get(i).copied().flatten().ok_or_else(|| {
                ContractViolation::corrupt(OP, format!("old slot {i} neither deleted nor mapped"))
            })?;
            if mapping.slot_edited(j) {
                arg.update_for_farg_change(
                    mapping.name_changed[j],
                    mapping.subrange_changed[j],
                    mapping.range_changed[j],
                    &mapping.old_slots[i],
                    &mapping.new_slots[j],
                )?;
            }
            let target = moved
                .get_mut(j)
                .ok_or_else(|| ContractViolation::corrupt(OP, format!("new slot {j} out of range")))?;
            *target = Some(arg);
        }
        let mut args = Vec::with_capacity(moved.len());
        for (arg, slot) in moved.into_iter().zip(&mapping.new_slots) {
            let mut arg = arg.unwrap_or_else(|| slot.construct_empty_arg());
            arg.set_owner(self.id);
            arg.adopt_cell(self.cell_id);
            args.push(arg);
        }
        debug!(record = %self.id, ve = %self.ve_id, args = args.len(), "argument list rebuilt");
        self.args = Some(args);
        Ok(())
    }

    fn update_for_deletion(
        &mut self,
        schema: &dyn SchemaAuthority,
        kind: SchemaKind,
        deleted: ElementId,
        note: &Notification,
    ) -> DbResult<()> {
        const OP: &str = "Record::update_for_deletion";
        if !self.is_bound() {
            return Ok(());
        }
        if kind == K::SCHEMA && self.ve_id == deleted {
            debug!(record = %self.id, ve = %deleted, "bound element deleted: unbinding");
            self.unbind();
            return Ok(());
        }
        let slots = K::shape(schema, self.ve_id)?.slots;
        let (owner, cell_id) = (self.id, self.cell_id);
        for (n, arg) in self.args.iter_mut().flatten().enumerate() {
            let orphaned = arg.kind() == nested_kind(kind) && arg.nested_ve_id() == deleted;
            if !orphaned {
                arg.apply_notification(schema, note)?;
                continue;
            }
            match arg.farg_type() {
                FargType::Untyped => {
                    let slot = slots.get(n).ok_or_else(|| {
                        ContractViolation::corrupt(OP, format!("arg {n} has no slot"))
                    })?;
                    debug!(record = %owner, arg = n, "untyped arg bound to deleted element reset");
                    let mut fresh = slot.construct_empty_arg();
                    fresh.set_owner(owner);
                    fresh.adopt_cell(cell_id);
                    *arg = fresh;
                }
                t if t == dedicated_slot(kind) => arg.apply_notification(schema, note)?,
                other => {
                    return Err(ContractViolation::corrupt(
                        OP,
                        format!("arg {n}: nested record held in a {other} slot"),
                    ));
                }
            }
        }
        Ok(())
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

    #[test]
    fn own_change_moves_surviving_args_and_defaults_new_ones() {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let pve = vocab
            .add_predicate(
                &mut idx,
                PredicateVocabElement::new("p")
                    .with_slot(Slot::integer("<a>"))
                    .with_slot(Slot::float("<b>")),
            )
            .unwrap();
        let mut p = Predicate::with_args(&vocab, pve, vec![DataValue::int(1), DataValue::float(2.0)])
            .unwrap();

        let mut edited = vocab.predicate(pve).unwrap().clone();
        edited.remove_slot(0);
        edited.insert_slot(0, Slot::nominal("<c>"));
        edited.rename("q");
        let change = vocab.replace_predicate(&mut idx, edited).unwrap();
        let note = Notification::PredicateChanged(change);
        p.apply_notification(&vocab, &note).unwrap();

        assert_eq!(p.to_string(), "q(, 2.0)");
        p.validate(&vocab, false).unwrap();
    }

    #[test]
    fn noop_change_leaves_record_untouched() {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let pve = vocab
            .add_predicate(&mut idx, PredicateVocabElement::new("p").with_slot(Slot::integer("<a>")))
            .unwrap();
        let p = Predicate::with_args(&vocab, pve, vec![DataValue::int(3)]).unwrap();
        let before = p.to_db_string();
        let same = vocab.predicate(pve).unwrap().clone();
        let change = vocab.replace_predicate(&mut idx, same).unwrap();
        assert!(change.is_noop());
        let mut after = p.copy_blind();
        after
            .apply_notification(&vocab, &Notification::PredicateChanged(change))
            .unwrap();
        assert_eq!(after.to_db_string(), before);
    }

    #[test]
    fn deletion_unbinds_own_and_resets_untyped_nested() {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let inner = vocab
            .add_matrix(
                &mut idx,
                MatrixVocabElement::new("inner", MatrixType::Integer).with_slot(Slot::integer("<v>")),
            )
            .unwrap();
        let outer = vocab
            .add_matrix(
                &mut idx,
                MatrixVocabElement::new("outer", MatrixType::Matrix)
                    .with_slot(Slot::untyped("<u>"))
                    .with_slot(Slot::col_predicate("<cp>")),
            )
            .unwrap();
        let nested = ColPred::bound(&vocab, inner).unwrap();
        let mut cp = ColPred::construct(
            &vocab,
            outer,
            &[
                None,
                None,
                None,
                Some(DataValue::col_predicate(nested.copy_blind())),
                Some(DataValue::col_predicate(nested)),
            ],
        )
        .unwrap();
        vocab.remove_matrix(&mut idx, inner).unwrap();
        cp.apply_notification(&vocab, &Notification::MatrixDeleted(inner))
            .unwrap();
        assert_eq!(cp.to_string(), "outer(0, 00:00:00:000, 00:00:00:000, <u>, ())");
        assert_eq!(cp.arg(3).unwrap().kind(), ValueKind::Undefined);
        let mut ids = std::collections::BTreeSet::new();
        cp.referenced_vocab_ids(&mut ids);
        assert!(!ids.contains(&inner));

        cp.apply_notification(&vocab, &Notification::MatrixDeleted(outer))
            .unwrap();
        assert!(!cp.is_bound());
    }
}
