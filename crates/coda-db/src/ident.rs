// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier utilities.
use std::fmt;

/// Strongly typed identity of an element held in the identity index.
///
/// Every vocabulary element, slot, data cell, record and typed value that is
/// registered with the index owns exactly one `ElementId`. Ids are allocated
/// by the index in ascending order starting at 1; `0` is reserved for
/// [`ElementId::INVALID`], the "not yet registered" / "not bound" sentinel.
///
/// Copies of an element carry the same id as their source. Only the index
/// decides which instance is canonical for a given id.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementId(pub u64);

impl ElementId {
    /// Sentinel for "no identity".
    pub const INVALID: Self = Self(0);

    /// Returns `true` unless this is [`ElementId::INVALID`].
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ElementId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_is_zero_and_default() {
        assert_eq!(ElementId::INVALID, ElementId(0));
        assert_eq!(ElementId::default(), ElementId::INVALID);
        assert!(!ElementId::INVALID.is_valid());
        assert!(ElementId(7).is_valid());
    }

    #[test]
    fn display_is_the_bare_number() {
        assert_eq!(ElementId(42).to_string(), "42");
        assert_eq!(ElementId::INVALID.to_string(), "0");
    }
}
