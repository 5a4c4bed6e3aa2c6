// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The database: vocabulary, identity index and data cells behind one
//! handle, with schema-change broadcast.
//!
//! Every mutating operation is all-or-nothing: on a contract violation the
//! vocabulary, the index and the cells are restored to their state before
//! the call and the violation is returned.
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, instrument, warn};

use crate::cascade::{Cascade, Notification, VocabChange};
use crate::config::DbConfig;
use crate::error::{ContractViolation, DbResult};
use crate::ident::ElementId;
use crate::index::{DbIndex, EntryKind, IdentityIndex, IndexEntry};
use crate::record::{ColPred, Predicate};
use crate::vocab::{
    MatrixVocabElement, PredicateVocabElement, SchemaAuthority, VocabElement, VocabList,
};

/// State captured before a mutation so it can be rolled back.
struct Snapshot {
    vocab: VocabList,
    index: DbIndex,
    cells: BTreeMap<ElementId, ColPred>,
}

/// In-memory database of data cells, each holding one canonical column
/// predicate.
#[derive(Debug)]
pub struct Database {
    config: DbConfig,
    vocab: VocabList,
    index: DbIndex,
    cells: BTreeMap<ElementId, ColPred>,
}

impl Database {
    /// Empty database configured by `config`.
    #[instrument]
    pub fn new(config: DbConfig) -> DbResult<Self> {
        config.validate()?;
        info!(tps = config.ticks_per_second, "database created");
        Ok(Self {
            config,
            vocab: VocabList::new(config.ticks_per_second),
            index: DbIndex::new(),
            cells: BTreeMap::new(),
        })
    }

    /// Configuration the database was created with.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// The vocabulary.
    pub fn vocab(&self) -> &VocabList {
        &self.vocab
    }

    /// The identity index.
    pub fn index(&self) -> &DbIndex {
        &self.index
    }

    /// Canonical record of `cell_id`.
    pub fn cell(&self, cell_id: ElementId) -> Option<&ColPred> {
        self.cells.get(&cell_id)
    }

    /// Cells in id order.
    pub fn cells(&self) -> impl Iterator<Item = (ElementId, &ColPred)> + '_ {
        self.cells.iter().map(|(id, cp)| (*id, cp))
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Column predicate bound to `ve_id` with default arguments, in the
    /// configured query-variable mode.
    pub fn new_col_pred(&self, ve_id: ElementId) -> DbResult<ColPred> {
        let mut cp = ColPred::bound(&self.vocab, ve_id)?;
        cp.set_query_vars_allowed(self.config.allow_query_vars);
        Ok(cp)
    }

    /// Predicate bound to `ve_id` with default arguments, in the configured
    /// query-variable mode.
    pub fn new_predicate(&self, ve_id: ElementId) -> DbResult<Predicate> {
        let mut p = Predicate::bound(&self.vocab, ve_id)?;
        p.set_query_vars_allowed(self.config.allow_query_vars);
        Ok(p)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            vocab: self.vocab.clone(),
            index: self.index.clone(),
            cells: self
                .cells
                .iter()
                .map(|(id, cp)| (*id, cp.copy_blind()))
                .collect(),
        }
    }

    fn restore(&mut self, saved: Snapshot) {
        self.vocab = saved.vocab;
        self.index = saved.index;
        self.cells = saved.cells;
    }

    fn atomically<T>(
        &mut self,
        op: &'static str,
        body: impl FnOnce(&mut Self) -> DbResult<T>,
    ) -> DbResult<T> {
        let saved = self.snapshot();
        match body(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(op, %err, "operation failed; rolling back");
                self.restore(saved);
                Err(err)
            }
        }
    }

    /// Adds a matrix element.
    #[instrument(skip(self, mve), fields(name = %mve.name()))]
    pub fn add_matrix_ve(&mut self, mve: MatrixVocabElement) -> DbResult<ElementId> {
        self.atomically("Database::add_matrix_ve", |db| {
            db.vocab.add_matrix(&mut db.index, mve)
        })
    }

    /// Adds a predicate element.
    #[instrument(skip(self, pve), fields(name = %pve.name()))]
    pub fn add_predicate_ve(&mut self, pve: PredicateVocabElement) -> DbResult<ElementId> {
        self.atomically("Database::add_predicate_ve", |db| {
            db.vocab.add_predicate(&mut db.index, pve)
        })
    }

    /// Replaces a matrix element with an edited copy and cascades the change
    /// into every cell holding a record bound to it.
    #[instrument(skip(self, mve), fields(ve = %mve.id()))]
    pub fn replace_matrix_ve(&mut self, mve: MatrixVocabElement) -> DbResult<VocabChange> {
        self.atomically("Database::replace_matrix_ve", |db| db.cascade_matrix_edit(mve))
    }

    /// Replaces a predicate element with an edited copy and cascades the
    /// change.
    #[instrument(skip(self, pve), fields(ve = %pve.id()))]
    pub fn replace_predicate_ve(&mut self, pve: PredicateVocabElement) -> DbResult<VocabChange> {
        self.atomically("Database::replace_predicate_ve", |db| db.cascade_predicate_edit(pve))
    }

    fn cascade_matrix_edit(&mut self, mve: MatrixVocabElement) -> DbResult<VocabChange> {
        let cells = self.affected_cells(mve.id())?;
        self.deregister_cells(&cells)?;
        let change = self.vocab.replace_matrix(&mut self.index, mve)?;
        self.broadcast(&cells, &Notification::MatrixChanged(change.clone()))?;
        Ok(change)
    }

    fn cascade_predicate_edit(&mut self, pve: PredicateVocabElement) -> DbResult<VocabChange> {
        let cells = self.affected_cells(pve.id())?;
        self.deregister_cells(&cells)?;
        let change = self.vocab.replace_predicate(&mut self.index, pve)?;
        self.broadcast(&cells, &Notification::PredicateChanged(change.clone()))?;
        Ok(change)
    }

    /// Deletes a matrix element and cascades the deletion.
    #[instrument(skip(self))]
    pub fn delete_matrix_ve(&mut self, ve_id: ElementId) -> DbResult<MatrixVocabElement> {
        self.atomically("Database::delete_matrix_ve", |db| {
            db.vocab.matrix(ve_id)?;
            let cells = db.affected_cells(ve_id)?;
            db.deregister_cells(&cells)?;
            let removed = db.vocab.remove_matrix(&mut db.index, ve_id)?;
            db.broadcast(&cells, &Notification::MatrixDeleted(ve_id))?;
            Ok(removed)
        })
    }

    /// Deletes a predicate element and cascades the deletion. Elements whose
    /// slots approved it are then edited to drop the approval, and that edit
    /// is cascaded too so bound values mirror the narrowed set.
    #[instrument(skip(self))]
    pub fn delete_predicate_ve(&mut self, ve_id: ElementId) -> DbResult<PredicateVocabElement> {
        self.atomically("Database::delete_predicate_ve", |db| {
            db.vocab.predicate(ve_id)?;
            let approvers = db.vocab.without_approval_of(ve_id);
            let cells = db.affected_cells(ve_id)?;
            db.deregister_cells(&cells)?;
            let removed = db.vocab.take_predicate(&mut db.index, ve_id)?;
            db.broadcast(&cells, &Notification::PredicateDeleted(ve_id))?;
            for edited in approvers {
                debug!(ve = %edited.id(), pve = %ve_id, "withdrawing approval of deleted predicate");
                match edited {
                    VocabElement::Matrix(mve) => db.cascade_matrix_edit(mve)?,
                    VocabElement::Predicate(pve) => db.cascade_predicate_edit(pve)?,
                };
            }
            Ok(removed)
        })
    }

    /// Cells holding at least one record subscribed to `ve_id`, ascending.
    fn affected_cells(&self, ve_id: ElementId) -> DbResult<BTreeSet<ElementId>> {
        let mut cells = BTreeSet::new();
        for record_id in self.vocab.listeners(ve_id) {
            let entry = self.index.get(record_id).ok_or_else(|| {
                ContractViolation::corrupt(
                    "Database::affected_cells",
                    format!("listener {record_id} is not in the index"),
                )
            })?;
            cells.insert(entry.cell_id);
        }
        Ok(cells)
    }

    fn deregister_cells(&mut self, cells: &BTreeSet<ElementId>) -> DbResult<()> {
        for cell_id in cells {
            let cp = self.cells.get(cell_id).ok_or(ContractViolation::NotFound {
                op: "Database::deregister_cells",
                what: "data cell",
                id: *cell_id,
            })?;
            cp.deregister_from(&mut self.vocab)?;
        }
        Ok(())
    }

    /// Applies `note` to each (already deregistered) cell: the canonical
    /// record is blind-copied, updated, reconciled with the index under the
    /// matching cascade, committed and re-registered.
    fn broadcast(&mut self, cells: &BTreeSet<ElementId>, note: &Notification) -> DbResult<()> {
        let cascade = note.cascade();
        for &cell_id in cells {
            let old = self.cells.get(&cell_id).ok_or(ContractViolation::NotFound {
                op: "Database::broadcast",
                what: "data cell",
                id: cell_id,
            })?;
            let mut new = old.copy_blind();
            new.apply_notification(&self.vocab, note)?;
            new.validate_replacement(&self.vocab, old, cascade)?;
            new.update_index_for_replacement(&mut self.index, &self.vocab, old, cell_id, cascade)?;
            new.register_with(&mut self.vocab)?;
            debug!(cell = %cell_id, record = %new, "cell updated");
            self.cells.insert(cell_id, new);
        }
        info!(ve = %note.ve_id(), ?cascade, cells = cells.len(), "cascade complete");
        Ok(())
    }

    /// Inserts `cp` as the canonical record of a new cell. Every identity in
    /// the tree must be INVALID.
    #[instrument(skip(self, cp), fields(ve = %cp.ve_id()))]
    pub fn insert_cell(&mut self, mut cp: ColPred) -> DbResult<ElementId> {
        self.atomically("Database::insert_cell", move |db| {
            cp.validate(&db.vocab, true)?;
            let cell_id = db
                .index
                .add(IndexEntry::record(EntryKind::Cell, ElementId::INVALID))?;
            cp.adopt_cell(cell_id);
            cp.insert_in_index(&mut db.index, cell_id)?;
            cp.register_with(&mut db.vocab)?;
            debug!(cell = %cell_id, record = %cp.id(), "cell inserted");
            db.cells.insert(cell_id, cp);
            Ok(cell_id)
        })
    }

    /// Makes `cp` the canonical record of `cell_id`.
    ///
    /// `cp` is normally an edited copy of the current record; arguments that
    /// kept their identity are replaced in place, the rest are swapped.
    #[instrument(skip(self, cp))]
    pub fn replace_cell(&mut self, cell_id: ElementId, mut cp: ColPred) -> DbResult<()> {
        const OP: &str = "Database::replace_cell";
        self.atomically(OP, move |db| {
            let old = db.cells.get(&cell_id).ok_or(ContractViolation::NotFound {
                op: OP,
                what: "data cell",
                id: cell_id,
            })?;
            if cp.id().is_valid() && cp.cell_id() != cell_id {
                return Err(ContractViolation::index(
                    OP,
                    format!("record {} belongs to cell {}", cp.id(), cp.cell_id()),
                ));
            }
            cp.adopt_cell(cell_id);
            cp.validate_replacement(&db.vocab, old, Cascade::None)?;
            old.deregister_from(&mut db.vocab)?;
            cp.update_index_for_replacement(&mut db.index, &db.vocab, old, cell_id, Cascade::None)?;
            cp.register_with(&mut db.vocab)?;
            db.cells.insert(cell_id, cp);
            Ok(())
        })
    }

    /// Removes a cell and its record tree.
    #[instrument(skip(self))]
    pub fn remove_cell(&mut self, cell_id: ElementId) -> DbResult<ColPred> {
        const OP: &str = "Database::remove_cell";
        self.atomically(OP, |db| {
            let cp = db.cells.remove(&cell_id).ok_or(ContractViolation::NotFound {
                op: OP,
                what: "data cell",
                id: cell_id,
            })?;
            cp.deregister_from(&mut db.vocab)?;
            cp.remove_from_index(&mut db.index, cell_id)?;
            let entry = db.index.remove(cell_id)?;
            if entry.kind != EntryKind::Cell {
                return Err(ContractViolation::corrupt(
                    OP,
                    format!("index held {} under cell id {cell_id}", entry.kind),
                ));
            }
            Ok(cp)
        })
    }

    /// Verifies that every cell's record tree is congruent with the
    /// vocabulary and registered in the index.
    pub fn check_congruence(&self) -> DbResult<()> {
        const OP: &str = "Database::check_congruence";
        for (cell_id, cp) in &self.cells {
            if cp.cell_id() != *cell_id {
                return Err(ContractViolation::corrupt(
                    OP,
                    format!("cell {cell_id} holds a record of cell {}", cp.cell_id()),
                ));
            }
            if !self.index.contains(cp.id()) {
                return Err(ContractViolation::index(
                    OP,
                    format!("record {} of cell {cell_id} is not in the index", cp.id()),
                ));
            }
            cp.validate(&self.vocab, false)?;
        }
        Ok(())
    }
}
