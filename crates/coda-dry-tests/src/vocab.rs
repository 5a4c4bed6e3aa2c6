// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Builders for vocabulary elements.
//!
//! # Example
//!
//! ```
//! use coda_db::{Database, DbConfig, MatrixType, SchemaAuthority};
//! use coda_dry_tests::vocab::MatrixBuilder;
//!
//! let mut db = Database::new(DbConfig::default()).unwrap();
//! let mve = MatrixBuilder::new("trial", MatrixType::Matrix)
//!     .integer("<n>")
//!     .nominal("<tag>")
//!     .add_to(&mut db)
//!     .unwrap();
//! assert_eq!(db.vocab().matrix(mve).unwrap().cp_fargs().len(), 5);
//! ```

use coda_db::{
    Database, DbResult, ElementId, MatrixType, MatrixVocabElement, PredicateVocabElement, Slot,
};

/// Slot-appending shorthands shared by both builders.
macro_rules! slot_shorthands {
    () => {
        /// Appends an integer slot.
        pub fn integer(self, name: &str) -> Self {
            self.slot(Slot::integer(name))
        }

        /// Appends a float slot.
        pub fn float(self, name: &str) -> Self {
            self.slot(Slot::float(name))
        }

        /// Appends a nominal slot.
        pub fn nominal(self, name: &str) -> Self {
            self.slot(Slot::nominal(name))
        }

        /// Appends a quote-string slot.
        pub fn quote_string(self, name: &str) -> Self {
            self.slot(Slot::quote_string(name))
        }

        /// Appends a text slot.
        pub fn text(self, name: &str) -> Self {
            self.slot(Slot::text(name))
        }

        /// Appends a timestamp slot.
        pub fn time_stamp(self, name: &str) -> Self {
            self.slot(Slot::time_stamp(name))
        }

        /// Appends a predicate slot.
        pub fn predicate(self, name: &str) -> Self {
            self.slot(Slot::predicate(name))
        }

        /// Appends a column-predicate slot.
        pub fn col_predicate(self, name: &str) -> Self {
            self.slot(Slot::col_predicate(name))
        }

        /// Appends an untyped slot.
        pub fn untyped(self, name: &str) -> Self {
            self.slot(Slot::untyped(name))
        }
    };
}

/// Builder for [`MatrixVocabElement`] values.
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    mve: MatrixVocabElement,
}

impl MatrixBuilder {
    /// Starts a matrix element with no slots.
    pub fn new(name: &str, matrix_type: MatrixType) -> Self {
        Self {
            mve: MatrixVocabElement::new(name, matrix_type),
        }
    }

    /// Appends `slot`.
    pub fn slot(mut self, slot: Slot) -> Self {
        self.mve = self.mve.with_slot(slot);
        self
    }

    slot_shorthands!();

    /// Marks the element variable-length.
    pub fn var_len(mut self) -> Self {
        self.mve = self.mve.with_var_len(true);
        self
    }

    /// The element, not yet registered.
    pub fn build(self) -> MatrixVocabElement {
        self.mve
    }

    /// Registers the element with `db` and returns its id.
    pub fn add_to(self, db: &mut Database) -> DbResult<ElementId> {
        db.add_matrix_ve(self.mve)
    }
}

/// Builder for [`PredicateVocabElement`] values.
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    pve: PredicateVocabElement,
}

impl PredicateBuilder {
    /// Starts a predicate element with no slots.
    pub fn new(name: &str) -> Self {
        Self {
            pve: PredicateVocabElement::new(name),
        }
    }

    /// Appends `slot`.
    pub fn slot(mut self, slot: Slot) -> Self {
        self.pve = self.pve.with_slot(slot);
        self
    }

    slot_shorthands!();

    /// Marks the element variable-length.
    pub fn var_len(mut self) -> Self {
        self.pve = self.pve.with_var_len(true);
        self
    }

    /// The element, not yet registered.
    pub fn build(self) -> PredicateVocabElement {
        self.pve
    }

    /// Registers the element with `db` and returns its id.
    pub fn add_to(self, db: &mut Database) -> DbResult<ElementId> {
        db.add_predicate_ve(self.pve)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use coda_db::{DbConfig, FargType};

    #[test]
    fn predicate_builder_keeps_slot_order() {
        let pve = PredicateBuilder::new("p")
            .untyped("<a>")
            .col_predicate("<b>")
            .var_len()
            .build();
        let types: Vec<_> = pve.fargs().iter().map(Slot::farg_type).collect();
        assert_eq!(types, vec![FargType::Untyped, FargType::ColPredicate]);
        assert!(pve.var_len());
    }

    #[test]
    fn add_to_rejects_duplicate_names() {
        let mut db = Database::new(DbConfig::default()).unwrap();
        PredicateBuilder::new("dup").integer("<a>").add_to(&mut db).unwrap();
        assert!(MatrixBuilder::new("dup", MatrixType::Integer)
            .integer("<a>")
            .add_to(&mut db)
            .is_err());
        assert_eq!(db.vocab().len(), 1);
    }
}
