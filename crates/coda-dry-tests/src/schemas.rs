// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canned schemas and records used across the test suites.

use coda_db::{ColPred, DataValue, Database, DbResult, ElementId, MatrixType, TimeStamp};

use crate::vocab::{MatrixBuilder, PredicateBuilder};

/// Name of the single-float matrix element.
pub const FLOAT_MVE: &str = "float_mve";
/// Name of the single-integer matrix element.
pub const INT_MVE: &str = "int_mve";
/// Name of the single-text matrix element.
pub const TEXT_MVE: &str = "text_mve";
/// Name of the mixed matrix element.
pub const MATRIX_MVE: &str = "matrix_mve";
/// Name of the two-slot predicate element.
pub const PVE0: &str = "pve0";

/// FLOAT matrix element `float_mve(<val>)`.
pub fn float_mve(db: &mut Database) -> DbResult<ElementId> {
    MatrixBuilder::new(FLOAT_MVE, MatrixType::Float)
        .float("<val>")
        .add_to(db)
}

/// INTEGER matrix element `int_mve(<val>)`.
pub fn int_mve(db: &mut Database) -> DbResult<ElementId> {
    MatrixBuilder::new(INT_MVE, MatrixType::Integer)
        .integer("<val>")
        .add_to(db)
}

/// TEXT matrix element `text_mve(<val>)`.
pub fn text_mve(db: &mut Database) -> DbResult<ElementId> {
    MatrixBuilder::new(TEXT_MVE, MatrixType::Text)
        .text("<val>")
        .add_to(db)
}

/// MATRIX element `matrix_mve(<u>, <cp>, <f>)`: an untyped slot, a
/// column-predicate slot and a float slot.
pub fn matrix_mve(db: &mut Database) -> DbResult<ElementId> {
    MatrixBuilder::new(MATRIX_MVE, MatrixType::Matrix)
        .untyped("<u>")
        .col_predicate("<cp>")
        .float("<f>")
        .add_to(db)
}

/// Predicate element `pve0(<arg1>, <arg2>)`: an integer and an untyped slot.
pub fn pve0(db: &mut Database) -> DbResult<ElementId> {
    PredicateBuilder::new(PVE0)
        .integer("<arg1>")
        .untyped("<arg2>")
        .add_to(db)
}

/// Arguments `(ord, onset, offset)` of a column predicate, timestamps in
/// ticks at the database tick rate.
pub fn cell_header(db: &Database, ord: i64, onset: i64, offset: i64) -> DbResult<[DataValue; 3]> {
    let tps = db.config().ticks_per_second;
    Ok([
        DataValue::int(ord),
        DataValue::time_stamp(TimeStamp::new(tps, onset)?),
        DataValue::time_stamp(TimeStamp::new(tps, offset)?),
    ])
}

/// Column predicate over `float_mve` holding `val`.
pub fn float_cp(
    db: &Database,
    mve: ElementId,
    ord: i64,
    onset: i64,
    offset: i64,
    val: f64,
) -> DbResult<ColPred> {
    let [o, on, off] = cell_header(db, ord, onset, offset)?;
    ColPred::construct(
        db.vocab(),
        mve,
        &[Some(o), Some(on), Some(off), Some(DataValue::float(val))],
    )
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use coda_db::DbConfig;

    #[test]
    fn float_cp_renders_like_the_classic_fixture() {
        let mut db = Database::new(DbConfig::default()).unwrap();
        let mve = float_mve(&mut db).unwrap();
        let cp = float_cp(&db, mve, 11, 11, 660, 11.0).unwrap();
        assert_eq!(cp.to_string(), "float_mve(11, 00:00:00:011, 00:00:11:000, 11.0)");
    }

    #[test]
    fn canned_schemas_coexist() {
        let mut db = Database::new(DbConfig::default()).unwrap();
        for add in [float_mve, int_mve, text_mve, matrix_mve, pve0] {
            add(&mut db).unwrap();
        }
        assert_eq!(db.vocab().len(), 5);
        assert!(db.vocab().find(PVE0).is_some());
    }
}
