// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! coda-db: typed observational-data records kept congruent with a mutable
//! vocabulary.
//!
//! A [`Database`] owns the vocabulary ([`VocabList`]), the identity index
//! ([`DbIndex`]) and one canonical column predicate per data cell. Records are
//! edited as copies and committed back; vocabulary edits and deletions are
//! broadcast to every record bound to the affected element so the stored data
//! never drifts from its schema.
#![forbid(unsafe_code)]

/// Schema-change notifications, cascade markers and slot mappings.
pub mod cascade;
/// Database configuration.
pub mod config;
/// The database handle.
pub mod database;
/// Error taxonomy.
pub mod error;
/// Formal argument slots.
pub mod farg;
/// Identifiers.
pub mod ident;
/// The identity index.
pub mod index;
/// Lexical rules for names and string payloads.
pub mod lexicon;
/// Column predicates and nested predicates.
pub mod record;
/// Time stamps.
pub mod timestamp;
/// Typed argument values.
pub mod value;
/// Vocabulary elements and the vocabulary list.
pub mod vocab;

pub use cascade::{Cascade, Notification, SchemaKind, SlotMapping, VocabChange};
pub use config::{DbConfig, DB_CONFIG_KEY};
pub use database::Database;
pub use error::{ContractViolation, DbResult};
pub use farg::{FargType, Slot, SlotRange};
pub use ident::ElementId;
pub use index::{DbIndex, EntryKind, IdentityIndex, IndexEntry};
pub use record::{ColPred, ColumnShape, Predicate, PredicateShape, Record, RecordKind, Shape};
pub use timestamp::{TimeStamp, DEFAULT_TPS, MAX_TPS, MIN_TPS};
pub use value::{format_float, DataValue, Payload, ValueKind};
pub use vocab::{
    MatrixType, MatrixVocabElement, PredicateVocabElement, SchemaAuthority, VocabElement,
    VocabList, CP_FIXED_SLOTS,
};
