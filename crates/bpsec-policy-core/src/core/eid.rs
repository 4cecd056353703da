// crates/bpsec-policy-core/src/core/eid.rs
// ============================================================================
// Module: Endpoint Identifier Interning
// Description: EID string interner and wildcard EID comparison.
// Purpose: Deduplicate EID strings referenced by rule filters.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Rule filters hold [`EidHandle`] values rather than owned strings. The
//! interner never mutates or releases a string once interned; the whole
//! dictionary is dropped only when the owning engine is torn down.
//!
//! [`eid_match`] implements the prefix wildcard comparison used by both the
//! filter predicate and the prefix indices.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// EID wildcard terminator.
pub const EID_WILDCARD: char = '*';

/// EID wildcard terminator as a byte.
const EID_WILDCARD_BYTE: u8 = b'*';

/// Universal wildcard key substituted for an absent search field.
pub const UNIVERSAL_WILDCARD: &str = "*";

// ============================================================================
// SECTION: Interner
// ============================================================================

/// Handle to an interned EID string.
///
/// # Invariants
/// - Two handles from the same interner are equal iff their strings are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EidHandle(u32);

/// Interned EID dictionary.
#[derive(Debug, Default, Clone)]
pub struct EidInterner {
    /// Interned strings by handle offset.
    strings: Vec<Box<str>>,
    /// Reverse lookup keyed by string bytes.
    lookup: HashMap<Box<str>, EidHandle>,
}

impl EidInterner {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns an EID, returning the existing handle when already present.
    ///
    /// Returns `None` only when the handle space is exhausted.
    pub fn intern(&mut self, eid: &str) -> Option<EidHandle> {
        if let Some(handle) = self.lookup.get(eid) {
            return Some(*handle);
        }
        let handle = EidHandle(u32::try_from(self.strings.len()).ok()?);
        let stored: Box<str> = eid.into();
        self.strings.push(stored.clone());
        self.lookup.insert(stored, handle);
        Some(handle)
    }

    /// Returns the handle of an already interned EID.
    #[must_use]
    pub fn lookup(&self, eid: &str) -> Option<EidHandle> {
        self.lookup.get(eid).copied()
    }

    /// Resolves a handle to its string.
    #[must_use]
    pub fn resolve(&self, handle: EidHandle) -> Option<&str> {
        self.strings.get(handle.0 as usize).map(AsRef::as_ref)
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true when nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Drops every interned string. Outstanding handles become dangling and
    /// must not be resolved afterwards.
    pub fn clear(&mut self) {
        self.strings.clear();
        self.lookup.clear();
    }
}

// ============================================================================
// SECTION: Wildcard Matching
// ============================================================================

/// Compares two EIDs where either side may carry a wildcard terminator.
///
/// The wildcard stands for "this prefix plus anything, including nothing".
/// Absent EIDs never match.
#[must_use]
pub fn eid_match(first: Option<&str>, second: Option<&str>) -> bool {
    let (Some(first), Some(second)) = (first, second) else {
        return false;
    };
    let first = first.as_bytes();
    let second = second.as_bytes();
    let end = first.len().max(second.len());
    for index in 0..end {
        if index > first.len() || index > second.len() {
            return false;
        }
        let left = first.get(index).copied();
        let right = second.get(index).copied();
        if left == Some(EID_WILDCARD_BYTE) || right == Some(EID_WILDCARD_BYTE) {
            return true;
        }
        if left != right {
            return false;
        }
    }
    true
}

/// Returns true when the EID ends in the wildcard terminator.
#[must_use]
pub fn is_wildcard_eid(eid: &str) -> bool {
    eid.ends_with(EID_WILDCARD)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::EidInterner;
    use super::eid_match;

    #[test]
    fn intern_returns_same_handle_for_same_string() {
        let mut interner = EidInterner::new();
        let first = interner.intern("ipn:2.1").unwrap();
        let second = interner.intern("ipn:2.1").unwrap();
        let other = interner.intern("ipn:2.2").unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(interner.resolve(first), Some("ipn:2.1"));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn wildcard_on_either_side_matches_prefix() {
        assert!(eid_match(Some("ipn:2.*"), Some("ipn:2.1")));
        assert!(eid_match(Some("ipn:2.1"), Some("ipn:2.*")));
        assert!(eid_match(Some("ipn:2.*"), Some("ipn:2.")));
        assert!(eid_match(Some("*"), Some("dtn://node")));
        assert!(!eid_match(Some("ipn:3.*"), Some("ipn:2.1")));
    }

    #[test]
    fn exact_comparison_requires_equal_length() {
        assert!(eid_match(Some("ipn:2.1"), Some("ipn:2.1")));
        assert!(!eid_match(Some("ipn:2.1"), Some("ipn:2.10")));
        assert!(!eid_match(Some("ipn:2.10"), Some("ipn:2.1")));
        assert!(eid_match(Some(""), Some("")));
    }

    #[test]
    fn absent_eid_never_matches() {
        assert!(!eid_match(None, Some("ipn:2.1")));
        assert!(!eid_match(Some("*"), None));
        assert!(!eid_match(None, None));
    }
}
