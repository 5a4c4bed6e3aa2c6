// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::collections::BTreeSet;

use coda_db::{ColPred, DataValue, Database, DbConfig, ElementId, IdentityIndex, SchemaAuthority};

/// Database with default configuration.
pub fn new_db() -> Database {
    Database::new(DbConfig::default()).expect("default config is valid")
}

/// Ids the index files under `cell`.
pub fn ids_in_cell(db: &Database, cell: ElementId) -> BTreeSet<ElementId> {
    db.index().ids_in_cell(cell).into_iter().collect()
}

/// Every element id any record in any cell is bound to.
pub fn bound_elements(db: &Database) -> BTreeSet<ElementId> {
    let mut out = BTreeSet::new();
    for (_, cp) in db.cells() {
        cp.referenced_vocab_ids(&mut out);
    }
    out
}

/// `(cell, display, debug dump)` of every cell, in cell order.
pub fn render_cells(db: &Database) -> Vec<(ElementId, String, String)> {
    db.cells()
        .map(|(id, cp)| (id, cp.to_string(), cp.to_db_string()))
        .collect()
}

/// Identities of the arguments of `cp`, in slot order.
pub fn arg_ids(cp: &ColPred) -> Vec<ElementId> {
    cp.args().iter().map(DataValue::id).collect()
}

/// Identities of the arguments of the column predicate nested in argument
/// `n` of `cp`.
pub fn nested_arg_ids(cp: &ColPred, n: usize) -> Vec<ElementId> {
    let nested = cp
        .arg(n)
        .expect("argument exists")
        .as_col_pred()
        .expect("argument holds a column predicate");
    arg_ids(nested)
}

/// Asserts the database is congruent and every cell record is indexed.
pub fn assert_congruent(db: &Database) {
    db.check_congruence().expect("database is congruent");
    for (cell, cp) in db.cells() {
        assert!(db.index().contains(cp.id()), "record of cell {cell} indexed");
        if cp.is_bound() {
            let shape = db.vocab().matrix(cp.ve_id()).expect("bound to a matrix");
            assert_eq!(cp.num_args(), shape.cp_fargs().len());
            for (arg, slot) in cp.args().iter().zip(shape.cp_fargs()) {
                assert_eq!(arg.farg_id(), slot.id());
            }
        }
    }
}
