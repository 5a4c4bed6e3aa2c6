// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config port for Coda tools.
//!
//! [`ConfigService`] turns typed values into JSON blobs and hands them to a
//! [`ConfigStore`]. [`FsConfigStore`] is the filesystem-backed store; tests
//! use an in-memory fake instead.
#![forbid(unsafe_code)]

/// Filesystem-backed store.
pub mod fs;
/// Storage port and JSON service.
pub mod service;

pub use fs::FsConfigStore;
pub use service::{ConfigError, ConfigService, ConfigStore};
