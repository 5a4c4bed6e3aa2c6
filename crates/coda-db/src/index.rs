// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identity index: the map from [`ElementId`] to the canonical element kind.
//!
//! The index is the authority on which identities are live. It does not own
//! the elements themselves (cells own records, records own values, the
//! vocabulary owns its elements); it records what each live identity is and
//! where it lives, so replacement can be checked against it.
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ContractViolation, DbResult};
use crate::ident::ElementId;
use crate::value::ValueKind;

/// Kind of element registered under an identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EntryKind {
    /// A record-shaped (matrix) vocabulary element.
    MatrixVocab,
    /// A nested-predicate vocabulary element.
    PredicateVocab,
    /// A slot of a vocabulary element.
    FormalArg,
    /// A data cell owning one canonical column predicate.
    Cell,
    /// A column predicate record.
    ColPred,
    /// A nested predicate record.
    Predicate,
    /// A typed value of the given kind.
    Value(ValueKind),
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatrixVocab => f.write_str("MatrixVocabElement"),
            Self::PredicateVocab => f.write_str("PredicateVocabElement"),
            Self::FormalArg => f.write_str("FormalArgument"),
            Self::Cell => f.write_str("DataCell"),
            Self::ColPred => f.write_str("ColPred"),
            Self::Predicate => f.write_str("Predicate"),
            Self::Value(kind) => f.write_str(kind.tag()),
        }
    }
}

/// What the index knows about one live identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IndexEntry {
    /// Element kind; `replace` may never change it.
    pub kind: EntryKind,
    /// Owning data cell, or INVALID for vocabulary entries and cells.
    pub cell_id: ElementId,
    /// Bound slot for typed values, owning element for slots, else INVALID.
    pub farg_id: ElementId,
}

impl IndexEntry {
    /// Entry for a vocabulary element or slot.
    pub fn vocab(kind: EntryKind, owner: ElementId) -> Self {
        Self {
            kind,
            cell_id: ElementId::INVALID,
            farg_id: owner,
        }
    }

    /// Entry for a record or cell living in `cell_id`.
    pub fn record(kind: EntryKind, cell_id: ElementId) -> Self {
        Self {
            kind,
            cell_id,
            farg_id: ElementId::INVALID,
        }
    }

    /// Entry for a typed value bound to `farg_id` living in `cell_id`.
    pub fn value(kind: ValueKind, cell_id: ElementId, farg_id: ElementId) -> Self {
        Self {
            kind: EntryKind::Value(kind),
            cell_id,
            farg_id,
        }
    }
}

/// Consumed interface of the identity service.
///
/// Implementations must never reuse an identity and must reject `remove` or
/// `replace` of an identity that is not live.
pub trait IdentityIndex {
    /// Registers a new element and returns its freshly assigned identity.
    fn add(&mut self, entry: IndexEntry) -> DbResult<ElementId>;
    /// Deregisters `id`, returning what was registered under it.
    fn remove(&mut self, id: ElementId) -> DbResult<IndexEntry>;
    /// Swaps the entry registered under `id`; the kind must not change.
    fn replace(&mut self, id: ElementId, entry: IndexEntry) -> DbResult<()>;
    /// Looks up a live identity.
    fn get(&self, id: ElementId) -> Option<&IndexEntry>;
    /// Returns `true` if `id` is live.
    fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }
}

/// In-memory identity index backed by an ordered map.
#[derive(Clone, Debug)]
pub struct DbIndex {
    next_id: u64,
    entries: BTreeMap<ElementId, IndexEntry>,
}

impl Default for DbIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DbIndex {
    /// Creates an empty index whose first allocated id is 1.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }

    /// Number of live identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no identity is live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The id the next `add` will hand out.
    pub fn next_id(&self) -> ElementId {
        ElementId(self.next_id)
    }

    /// Iterates live entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &IndexEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Live identities owned by `cell_id`, in ascending order.
    pub fn ids_in_cell(&self, cell_id: ElementId) -> Vec<ElementId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.cell_id == cell_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Debug dump: `((DBIndex) (nextID: N) (index_size: N) (index_contents: (...)))`.
    pub fn to_db_string(&self) -> String {
        let contents = self
            .entries
            .iter()
            .map(|(id, entry)| {
                format!(
                    "({id} {} (cellID {}) (fargID {}))",
                    entry.kind, entry.cell_id, entry.farg_id
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "((DBIndex) (nextID: {}) (index_size: {}) (index_contents: ({contents})))",
            self.next_id,
            self.entries.len()
        )
    }
}

impl IdentityIndex for DbIndex {
    fn add(&mut self, entry: IndexEntry) -> DbResult<ElementId> {
        let id = ElementId(self.next_id);
        if self.entries.contains_key(&id) {
            return Err(ContractViolation::index(
                "DbIndex::add",
                format!("next id {id} already in use"),
            ));
        }
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| ContractViolation::index("DbIndex::add", "next id wrapped around"))?;
        self.entries.insert(id, entry);
        Ok(id)
    }

    fn remove(&mut self, id: ElementId) -> DbResult<IndexEntry> {
        if !id.is_valid() {
            return Err(ContractViolation::invalid_id(
                "DbIndex::remove",
                "target id is INVALID",
            ));
        }
        self.entries.remove(&id).ok_or_else(|| {
            ContractViolation::index("DbIndex::remove", format!("{id} not in index"))
        })
    }

    fn replace(&mut self, id: ElementId, entry: IndexEntry) -> DbResult<()> {
        if !id.is_valid() {
            return Err(ContractViolation::invalid_id(
                "DbIndex::replace",
                "target id is INVALID",
            ));
        }
        let Some(slot) = self.entries.get_mut(&id) else {
            return Err(ContractViolation::index(
                "DbIndex::replace",
                format!("can't replace {id}: not in index"),
            ));
        };
        if slot.kind != entry.kind {
            return Err(ContractViolation::index(
                "DbIndex::replace",
                format!("type mis-match: {} -> {}", slot.kind, entry.kind),
            ));
        }
        *slot = entry;
        Ok(())
    }

    fn get(&self, id: ElementId) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_allocated_from_one_and_never_reused() {
        let mut idx = DbIndex::new();
        let a = idx.add(IndexEntry::record(EntryKind::Cell, ElementId::INVALID)).unwrap();
        let b = idx.add(IndexEntry::record(EntryKind::ColPred, a)).unwrap();
        assert_eq!(a, ElementId(1));
        assert_eq!(b, ElementId(2));
        idx.remove(b).unwrap();
        let c = idx.add(IndexEntry::record(EntryKind::ColPred, a)).unwrap();
        assert_eq!(c, ElementId(3));
        assert!(!idx.contains(b));
    }

    #[test]
    fn replace_rejects_kind_change_and_unknown_ids() {
        let mut idx = DbIndex::new();
        let id = idx
            .add(IndexEntry::value(ValueKind::Int, ElementId(9), ElementId(4)))
            .unwrap();
        let err = idx
            .replace(id, IndexEntry::value(ValueKind::Float, ElementId(9), ElementId(4)))
            .unwrap_err();
        assert!(matches!(err, ContractViolation::IndexState { .. }));
        assert!(idx
            .replace(ElementId(77), IndexEntry::value(ValueKind::Int, ElementId(9), ElementId(4)))
            .is_err());
        idx.replace(id, IndexEntry::value(ValueKind::Int, ElementId(10), ElementId(4)))
            .unwrap();
        assert_eq!(idx.get(id).unwrap().cell_id, ElementId(10));
    }

    #[test]
    fn remove_of_invalid_or_missing_id_fails() {
        let mut idx = DbIndex::new();
        assert!(matches!(
            idx.remove(ElementId::INVALID),
            Err(ContractViolation::InvalidId { .. })
        ));
        assert!(matches!(
            idx.remove(ElementId(5)),
            Err(ContractViolation::IndexState { .. })
        ));
    }

    #[test]
    fn db_string_lists_entries_in_id_order() {
        let mut idx = DbIndex::new();
        let cell = idx.add(IndexEntry::record(EntryKind::Cell, ElementId::INVALID)).unwrap();
        idx.add(IndexEntry::value(ValueKind::Int, cell, ElementId(8)))
            .unwrap();
        assert_eq!(
            idx.to_db_string(),
            "((DBIndex) (nextID: 3) (index_size: 2) (index_contents: \
             ((1 DataCell (cellID 0) (fargID 0)), (2 IntDataValue (cellID 1) (fargID 8)))))"
        );
        assert_eq!(idx.ids_in_cell(cell), vec![ElementId(2)]);
    }
}
