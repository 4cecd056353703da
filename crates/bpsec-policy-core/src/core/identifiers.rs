// crates/bpsec-policy-core/src/core/identifiers.rs
// ============================================================================
// Module: BPSec Policy Identifiers
// Description: Strongly typed identifiers for rules, event sets, and blocks.
// Purpose: Keep rule ids, block numbers, and block types from being confused.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers used across the policy engine. Rule ids are caller supplied
//! and stable across renumbering; event set names are unique across the
//! store. Block numbers and block types are both integers on the wire, so
//! they get distinct wrappers here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Rule Identifiers
// ============================================================================

/// Caller-supplied rule identifier.
///
/// # Invariants
/// - Unique across the rule store; independent of the rule's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(u16);

impl RuleId {
    /// Creates a new rule identifier.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u16> for RuleId {
    fn from(value: u16) -> Self {
        Self::new(value)
    }
}

/// Event set name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventSetName(String);

impl EventSetName {
    /// Creates a new event set name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the reserved name of the anonymous event set owned by `rule`.
    #[must_use]
    pub fn anonymous(rule: RuleId) -> Self {
        Self(format!("{ANONYMOUS_EVENT_SET_PREFIX}rule-{rule}"))
    }

    /// Returns true when the name lies in the reserved anonymous namespace.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.0.starts_with(ANONYMOUS_EVENT_SET_PREFIX)
    }
}

impl fmt::Display for EventSetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for EventSetName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventSetName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventSetName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Prefix reserved for anonymous event set names.
pub const ANONYMOUS_EVENT_SET_PREFIX: &str = "~";

// ============================================================================
// SECTION: Block Identifiers
// ============================================================================

/// Block type code as carried in a canonical bundle block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockType(u64);

impl BlockType {
    /// Primary block.
    pub const PRIMARY: Self = Self(0);
    /// Payload block.
    pub const PAYLOAD: Self = Self(1);
    /// Block integrity block.
    pub const BLOCK_INTEGRITY: Self = Self(11);
    /// Block confidentiality block.
    pub const BLOCK_CONFIDENTIALITY: Self = Self(12);

    /// Creates a block type from its code.
    #[must_use]
    pub const fn new(code: u64) -> Self {
        Self(code)
    }

    /// Returns the raw block type code.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Block number of a block within one bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// The primary block is always block number zero.
    pub const PRIMARY: Self = Self(0);
    /// The payload block is always block number one.
    pub const PAYLOAD: Self = Self(1);

    /// Creates a block number.
    #[must_use]
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    /// Returns the raw block number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true for the primary or payload block.
    #[must_use]
    pub const fn is_structural(self) -> bool {
        self.0 == Self::PRIMARY.0 || self.0 == Self::PAYLOAD.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Security Context Identifiers
// ============================================================================

/// Security context identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScId(i16);

impl ScId {
    /// Sentinel for "no supported security context".
    pub const UNSUPPORTED: Self = Self(0);

    /// Creates a security context identifier.
    #[must_use]
    pub const fn new(id: i16) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i16 {
        self.0
    }

    /// Returns true unless this is the unsupported sentinel.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        self.0 != Self::UNSUPPORTED.0
    }
}

impl fmt::Display for ScId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Security service offered by a security operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityService {
    /// Block integrity (BIB).
    Integrity,
    /// Block confidentiality (BCB).
    Confidentiality,
}

impl SecurityService {
    /// Returns the service code used in filters and records.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Integrity => 1,
            Self::Confidentiality => 2,
        }
    }

    /// Parses a service code; zero and unknown codes yield `None`.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Integrity),
            2 => Some(Self::Confidentiality),
            _ => None,
        }
    }

    /// Returns the security block type carrying this service.
    #[must_use]
    pub const fn block_type(self) -> BlockType {
        match self {
            Self::Integrity => BlockType::BLOCK_INTEGRITY,
            Self::Confidentiality => BlockType::BLOCK_CONFIDENTIALITY,
        }
    }

    /// Maps a security block type back to its service.
    #[must_use]
    pub const fn from_block_type(block_type: BlockType) -> Option<Self> {
        match block_type.get() {
            11 => Some(Self::Integrity),
            12 => Some(Self::Confidentiality),
            _ => None,
        }
    }

    /// Returns a stable label for the service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integrity => "bib",
            Self::Confidentiality => "bcb",
        }
    }
}
