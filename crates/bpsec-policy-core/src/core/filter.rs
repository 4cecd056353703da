// crates/bpsec-policy-core/src/core/filter.rs
// ============================================================================
// Module: Rule Filters
// Description: Rule match criteria, role masks, and specificity scoring.
// Purpose: Build validated filters and compute their cached scores.
// Dependencies: crate::core::{eid, identifiers}, serde
// ============================================================================

//! ## Overview
//! A [`Filter`] records which criteria a rule constrains and caches a
//! specificity score. Filters are built once from a [`FilterSpec`]; the score
//! only changes when a filter is rebuilt.
//!
//! Scoring: each concrete EID criterion adds [`SCORE_FULL`], each EID ending
//! in the wildcard terminator adds [`SCORE_PARTIAL`], and a block type or
//! security context id adds [`SCORE_FULL`] each. The service never scores.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::eid::EidHandle;
use crate::core::eid::EidInterner;
use crate::core::eid::is_wildcard_eid;
use crate::core::identifiers::BlockType;
use crate::core::identifiers::ScId;
use crate::core::identifiers::SecurityService;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Score contributed by a fully specified criterion.
pub const SCORE_FULL: u16 = 2;
/// Score contributed by a wildcard EID criterion.
pub const SCORE_PARTIAL: u16 = 1;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Security role bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMask(u8);

impl RoleMask {
    /// No role.
    pub const NONE: Self = Self(0);
    /// Security source.
    pub const SOURCE: Self = Self(0x01);
    /// Security verifier.
    pub const VERIFIER: Self = Self(0x02);
    /// Security acceptor.
    pub const ACCEPTOR: Self = Self(0x04);
    /// Every legal role bit.
    pub const ALL: Self = Self(0x07);

    /// Creates a role mask, discarding non-role bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true when no role bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true when both masks share a role.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Union of two masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Parses a role name (`s`, `source`, `sec_source`, and so on).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "s" | "source" | "sec_source" => Some(Self::SOURCE),
            "v" | "verifier" | "sec_verifier" => Some(Self::VERIFIER),
            "a" | "acceptor" | "sec_acceptor" => Some(Self::ACCEPTOR),
            _ => None,
        }
    }

    /// Returns the canonical name of a single-role mask.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0x01 => Some("sec_source"),
            0x02 => Some("sec_verifier"),
            0x04 => Some("sec_acceptor"),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Filter Flags
// ============================================================================

/// Criteria-present bit set, including the role bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterFlags(u8);

impl FilterFlags {
    /// Bundle source criterion present.
    pub const USE_BUNDLE_SOURCE: Self = Self(0x08);
    /// Bundle destination criterion present.
    pub const USE_BUNDLE_DESTINATION: Self = Self(0x10);
    /// Security source criterion present.
    pub const USE_SECURITY_SOURCE: Self = Self(0x20);
    /// Block type criterion present.
    pub const USE_BLOCK_TYPE: Self = Self(0x40);
    /// Security context id criterion present.
    pub const USE_SC_ID: Self = Self(0x80);
    /// Any EID criterion.
    pub const ANY_EID: Self = Self(0x08 | 0x10 | 0x20);

    /// Creates flags from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true when every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true when any bit of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Sets the bits of `other`.
    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Returns the role bits.
    #[must_use]
    pub const fn roles(self) -> RoleMask {
        RoleMask::from_bits(self.0)
    }

    /// Returns true when no criterion is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// SECTION: EID Fields
// ============================================================================

/// The three EID-valued filter fields, also naming the three rule indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EidField {
    /// Bundle source EID.
    BundleSource,
    /// Bundle destination EID.
    BundleDestination,
    /// Security source EID.
    SecuritySource,
}

impl EidField {
    /// All fields in index order.
    pub const ALL: [Self; 3] = [Self::BundleSource, Self::BundleDestination, Self::SecuritySource];

    /// Returns the filter flag recording presence of this field.
    #[must_use]
    pub const fn flag(self) -> FilterFlags {
        match self {
            Self::BundleSource => FilterFlags::USE_BUNDLE_SOURCE,
            Self::BundleDestination => FilterFlags::USE_BUNDLE_DESTINATION,
            Self::SecuritySource => FilterFlags::USE_SECURITY_SOURCE,
        }
    }

    /// Offset of the field in per-field arrays.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::BundleSource => 0,
            Self::BundleDestination => 1,
            Self::SecuritySource => 2,
        }
    }
}

/// Interned EID criterion with its cached length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EidCriterion {
    /// Interned EID.
    pub handle: EidHandle,
    /// Byte length of the EID string.
    pub len: usize,
    /// Whether the EID ends in the wildcard terminator.
    pub wildcard: bool,
}

// ============================================================================
// SECTION: Filter
// ============================================================================

/// Caller input for building a filter.
///
/// # Invariants
/// - Empty EID strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Bundle source EID.
    pub bundle_source: Option<String>,
    /// Bundle destination EID.
    pub bundle_destination: Option<String>,
    /// Security source EID.
    pub security_source: Option<String>,
    /// Target block type.
    pub block_type: Option<BlockType>,
    /// Roles the rule applies to.
    pub roles: RoleMask,
    /// Security context id; the unsupported sentinel counts as absent.
    pub sc_id: Option<ScId>,
    /// Security service (not scored).
    pub service: Option<SecurityService>,
}

impl FilterSpec {
    /// Returns the EID string for a field, treating empty strings as absent.
    #[must_use]
    pub fn eid(&self, field: EidField) -> Option<&str> {
        let value = match field {
            EidField::BundleSource => self.bundle_source.as_deref(),
            EidField::BundleDestination => self.bundle_destination.as_deref(),
            EidField::SecuritySource => self.security_source.as_deref(),
        };
        value.filter(|eid| !eid.is_empty())
    }
}

/// Rule match filter.
///
/// # Invariants
/// - A valid filter carries at least one EID criterion.
/// - `score` equals [`Filter::compute_score`] at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Criteria-present flags including role bits.
    flags: FilterFlags,
    /// EID criteria in [`EidField::ALL`] order.
    eids: [Option<EidCriterion>; 3],
    /// Target block type.
    block_type: Option<BlockType>,
    /// Security context id.
    sc_id: Option<ScId>,
    /// Security service.
    service: Option<SecurityService>,
    /// Cached specificity score.
    score: u16,
}

impl Filter {
    /// Builds a filter, interning its EIDs.
    ///
    /// When no EID is present the returned filter has empty flags; callers
    /// must treat [`Filter::is_valid`] returning false as an error. Returns
    /// `None` only when the interner cannot allocate a handle.
    pub fn build(spec: &FilterSpec, interner: &mut EidInterner) -> Option<Self> {
        let mut eids = [None; 3];
        let mut flags = FilterFlags::default();
        for field in EidField::ALL {
            if let Some(eid) = spec.eid(field) {
                let handle = interner.intern(eid)?;
                eids[field.offset()] = Some(EidCriterion {
                    handle,
                    len: eid.len(),
                    wildcard: is_wildcard_eid(eid),
                });
                flags.insert(field.flag());
            }
        }
        if !flags.intersects(FilterFlags::ANY_EID) {
            return Some(Self::empty());
        }
        flags.insert(FilterFlags::from_bits(spec.roles.bits()));
        if spec.block_type.is_some() {
            flags.insert(FilterFlags::USE_BLOCK_TYPE);
        }
        let sc_id = spec.sc_id.filter(|id| id.is_supported());
        if sc_id.is_some() {
            flags.insert(FilterFlags::USE_SC_ID);
        }
        let mut filter = Self {
            flags,
            eids,
            block_type: spec.block_type,
            sc_id,
            service: spec.service,
            score: 0,
        };
        filter.score = filter.compute_score();
        Some(filter)
    }

    /// Filter with no criteria.
    const fn empty() -> Self {
        Self {
            flags: FilterFlags::from_bits(0),
            eids: [None; 3],
            block_type: None,
            sc_id: None,
            service: None,
            score: 0,
        }
    }

    /// Returns true when at least one EID criterion is present.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.flags.intersects(FilterFlags::ANY_EID)
    }

    /// Recomputes the specificity score from the present criteria.
    #[must_use]
    pub fn compute_score(&self) -> u16 {
        let mut score = 0;
        for criterion in self.eids.iter().flatten() {
            score += if criterion.wildcard { SCORE_PARTIAL } else { SCORE_FULL };
        }
        if self.flags.contains(FilterFlags::USE_BLOCK_TYPE) {
            score += SCORE_FULL;
        }
        if self.flags.contains(FilterFlags::USE_SC_ID) {
            score += SCORE_FULL;
        }
        score
    }

    /// Cached specificity score.
    #[must_use]
    pub const fn score(&self) -> u16 {
        self.score
    }

    /// Criteria-present flags.
    #[must_use]
    pub const fn flags(&self) -> FilterFlags {
        self.flags
    }

    /// Role bits of the filter.
    #[must_use]
    pub const fn roles(&self) -> RoleMask {
        self.flags.roles()
    }

    /// EID criterion for a field.
    #[must_use]
    pub const fn eid(&self, field: EidField) -> Option<EidCriterion> {
        self.eids[field.offset()]
    }

    /// Target block type criterion.
    #[must_use]
    pub const fn block_type(&self) -> Option<BlockType> {
        self.block_type
    }

    /// Security context id criterion.
    #[must_use]
    pub const fn sc_id(&self) -> Option<ScId> {
        self.sc_id
    }

    /// Security service.
    #[must_use]
    pub const fn service(&self) -> Option<SecurityService> {
        self.service
    }

    /// Rebuilds a filter from persisted parts, recomputing the score.
    pub(crate) fn from_parts(
        roles: RoleMask,
        eids: [Option<EidCriterion>; 3],
        block_type: Option<BlockType>,
        sc_id: Option<ScId>,
        service: Option<SecurityService>,
    ) -> Self {
        let mut flags = FilterFlags::from_bits(roles.bits());
        for field in EidField::ALL {
            if eids[field.offset()].is_some() {
                flags.insert(field.flag());
            }
        }
        if block_type.is_some() {
            flags.insert(FilterFlags::USE_BLOCK_TYPE);
        }
        if sc_id.is_some() {
            flags.insert(FilterFlags::USE_SC_ID);
        }
        let mut filter = Self {
            flags,
            eids,
            block_type,
            sc_id,
            service,
            score: 0,
        };
        filter.score = filter.compute_score();
        filter
    }

    /// Reconstructs the caller input that produced this filter.
    #[must_use]
    pub fn to_spec(&self, interner: &EidInterner) -> FilterSpec {
        let eid = |field: EidField| {
            self.eid(field)
                .and_then(|criterion| interner.resolve(criterion.handle))
                .map(str::to_string)
        };
        FilterSpec {
            bundle_source: eid(EidField::BundleSource),
            bundle_destination: eid(EidField::BundleDestination),
            security_source: eid(EidField::SecuritySource),
            block_type: self.block_type,
            roles: self.roles(),
            sc_id: self.sc_id,
            service: self.service,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::EidField;
    use super::Filter;
    use super::FilterFlags;
    use super::FilterSpec;
    use super::RoleMask;
    use crate::core::eid::EidInterner;
    use crate::core::identifiers::BlockType;
    use crate::core::identifiers::ScId;

    #[test]
    fn filter_without_eids_has_empty_flags() {
        let mut interner = EidInterner::new();
        let spec = FilterSpec {
            bundle_source: Some(String::new()),
            block_type: Some(BlockType::PAYLOAD),
            roles: RoleMask::ACCEPTOR,
            ..FilterSpec::default()
        };
        let filter = Filter::build(&spec, &mut interner).unwrap();
        assert!(!filter.is_valid());
        assert!(filter.flags().is_empty());
        assert!(interner.is_empty());
    }

    #[test]
    fn unsupported_sc_id_is_not_a_criterion() {
        let mut interner = EidInterner::new();
        let spec = FilterSpec {
            bundle_destination: Some("ipn:2.1".to_string()),
            sc_id: Some(ScId::UNSUPPORTED),
            ..FilterSpec::default()
        };
        let filter = Filter::build(&spec, &mut interner).unwrap();
        assert!(!filter.flags().contains(FilterFlags::USE_SC_ID));
        assert_eq!(filter.score(), 2);
    }

    #[test]
    fn score_counts_each_criterion() {
        let mut interner = EidInterner::new();
        let spec = FilterSpec {
            bundle_source: Some("ipn:1.*".to_string()),
            bundle_destination: Some("ipn:2.1".to_string()),
            block_type: Some(BlockType::PAYLOAD),
            sc_id: Some(ScId::new(1)),
            roles: RoleMask::SOURCE,
            ..FilterSpec::default()
        };
        let filter = Filter::build(&spec, &mut interner).unwrap();
        assert_eq!(filter.score(), 1 + 2 + 2 + 2);
        assert_eq!(filter.roles(), RoleMask::SOURCE);
        assert!(filter.eid(EidField::BundleSource).unwrap().wildcard);
        assert_eq!(filter.to_spec(&interner), spec);
    }

    #[test]
    fn role_names_parse_aliases() {
        assert_eq!(RoleMask::from_name("s"), Some(RoleMask::SOURCE));
        assert_eq!(RoleMask::from_name("sec_verifier"), Some(RoleMask::VERIFIER));
        assert_eq!(RoleMask::from_name("acceptor"), Some(RoleMask::ACCEPTOR));
        assert_eq!(RoleMask::from_name("relay"), None);
        assert_eq!(RoleMask::from_bits(0xff), RoleMask::ALL);
    }
}
