// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The single error taxonomy of the core.
//!
//! Every failure surfaced by this crate is a broken precondition or invariant,
//! never a recoverable user-input error. Callers are expected to abandon the
//! in-flight edit. Messages name the failing operation first, then the
//! offending field or argument index, so test harnesses can assert on them.
use thiserror::Error;

use crate::ident::ElementId;

/// Contract violations raised by records, values, the vocabulary and the index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// An identity was INVALID where a live one is required, or set where a
    /// fresh (INVALID) one is required.
    #[error("{op}: invalid identity: {detail}")]
    InvalidId {
        /// Operation that detected the violation.
        op: &'static str,
        /// What was wrong with the identity.
        detail: String,
    },
    /// An identity did not resolve to an element of the expected kind.
    #[error("{op}: {what} {id} not found")]
    NotFound {
        /// Operation that detected the violation.
        op: &'static str,
        /// Kind of element that was expected.
        what: &'static str,
        /// The unresolved identity.
        id: ElementId,
    },
    /// A typed value does not fit the slot it is being assigned to.
    #[error("{op}: {detail}")]
    TypeMismatch {
        /// Operation that detected the violation.
        op: &'static str,
        /// Slot index and the expected/actual kinds.
        detail: String,
    },
    /// Argument count does not match the element's slot count.
    #[error("{op}: arity mismatch: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Operation that detected the violation.
        op: &'static str,
        /// Slot count of the bound element.
        expected: usize,
        /// Argument count supplied.
        actual: usize,
    },
    /// A value's slot binding (slot id, slot type, owning element) disagrees
    /// with the slot it is being compared against.
    #[error("{op}: slot mismatch: {detail}")]
    SlotMismatch {
        /// Operation that detected the violation.
        op: &'static str,
        /// Which binding field disagreed.
        detail: String,
    },
    /// The identity index is not in the state the operation requires.
    #[error("{op}: index state: {detail}")]
    IndexState {
        /// Operation that detected the violation.
        op: &'static str,
        /// Description of the inconsistency.
        detail: String,
    },
    /// A vocabulary definition or edit is malformed.
    #[error("{op}: schema: {detail}")]
    Schema {
        /// Operation that detected the violation.
        op: &'static str,
        /// Description of the malformed definition.
        detail: String,
    },
    /// A payload is not a legal value for its kind.
    #[error("{op}: invalid value: {detail}")]
    InvalidValue {
        /// Operation that detected the violation.
        op: &'static str,
        /// Description of the illegal value.
        detail: String,
    },
    /// Internal invariant violated (structural corruption).
    #[error("{op}: internal invariant violated: {detail}")]
    Corrupt {
        /// Operation that detected the violation.
        op: &'static str,
        /// Description of the broken invariant.
        detail: String,
    },
}

impl ContractViolation {
    /// Shorthand for [`ContractViolation::InvalidId`].
    pub(crate) fn invalid_id(op: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidId {
            op,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`ContractViolation::TypeMismatch`].
    pub(crate) fn type_mismatch(op: &'static str, detail: impl Into<String>) -> Self {
        Self::TypeMismatch {
            op,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`ContractViolation::SlotMismatch`].
    pub(crate) fn slot(op: &'static str, detail: impl Into<String>) -> Self {
        Self::SlotMismatch {
            op,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`ContractViolation::IndexState`].
    pub(crate) fn index(op: &'static str, detail: impl Into<String>) -> Self {
        Self::IndexState {
            op,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`ContractViolation::Schema`].
    pub(crate) fn schema(op: &'static str, detail: impl Into<String>) -> Self {
        Self::Schema {
            op,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`ContractViolation::InvalidValue`].
    pub(crate) fn value(op: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidValue {
            op,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`ContractViolation::Corrupt`].
    pub(crate) fn corrupt(op: &'static str, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            op,
            detail: detail.into(),
        }
    }
}

/// Result alias used throughout the core.
pub type DbResult<T> = Result<T, ContractViolation>;
