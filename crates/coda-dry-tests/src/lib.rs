// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Coda crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`schemas`] - Canned vocabulary elements and records
//! - [`vocab`] - Builders for matrix and predicate elements

pub mod config;
pub mod schemas;
pub mod vocab;

pub use config::InMemoryConfigStore;
pub use schemas::{
    cell_header, float_cp, float_mve, int_mve, matrix_mve, pve0, text_mve, FLOAT_MVE, INT_MVE,
    MATRIX_MVE, PVE0, TEXT_MVE,
};
pub use vocab::{MatrixBuilder, PredicateBuilder};
