// crates/bpsec-policy-core/src/core/rule.rs
// ============================================================================
// Module: Policy Rules
// Description: Rule records, security context parameters, and search tags.
// Purpose: Define the data a rule carries and the query used to match it.
// Dependencies: crate::core::{arena, event, filter, identifiers}, crate::interfaces
// ============================================================================

//! ## Overview
//! A [`Rule`] pairs a [`Filter`] with an event set and security context
//! parameters. Its `position` is its offset in the engine's ordered rule
//! collection and is renumbered on removal; its [`RuleId`] never changes.
//! [`SearchTag`] is the ephemeral query built per bundle-processing call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::arena::EventSetHandle;
use crate::core::event::Event;
use crate::core::filter::EidField;
use crate::core::filter::Filter;
use crate::core::filter::FilterSpec;
use crate::core::filter::RoleMask;
use crate::core::identifiers::BlockType;
use crate::core::identifiers::EventSetName;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ScId;
use crate::core::identifiers::SecurityService;
use crate::interfaces::RecordId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum rule description length in bytes.
pub const MAX_RULE_DESC_LEN: usize = 64;
/// Maximum number of rules an engine holds.
pub const MAX_RULES: usize = 255;
/// Maximum security context parameter value length in bytes.
pub const MAX_SC_PARAM_LEN: usize = 65_535;

// ============================================================================
// SECTION: Rule Flags
// ============================================================================

/// Administrative rule flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RuleFlags(u8);

impl RuleFlags {
    /// Rule owns an anonymous, rule-private event set.
    pub const ANONYMOUS_EVENT_SET: Self = Self(0x01);

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
}

// ============================================================================
// SECTION: Security Context Parameters
// ============================================================================

/// Well-known security context parameter ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScParamKind {
    /// Key file name.
    KeyFile,
    /// Initialization vector.
    Iv,
    /// Salt.
    Salt,
    /// Integrity check value.
    Icv,
    /// Integrity signature.
    IntSig,
    /// Bundle encryption key.
    Bek,
    /// Bundle encryption key integrity check value.
    BekIcv,
}

impl ScParamKind {
    /// All kinds in id order.
    pub const ALL: [Self; 7] =
        [Self::KeyFile, Self::Iv, Self::Salt, Self::Icv, Self::IntSig, Self::Bek, Self::BekIcv];

    /// Parameter id.
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::KeyFile => 1,
            Self::Iv => 2,
            Self::Salt => 3,
            Self::Icv => 4,
            Self::IntSig => 5,
            Self::Bek => 6,
            Self::BekIcv => 7,
        }
    }

    /// Administrative name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::KeyFile => "key_file",
            Self::Iv => "iv",
            Self::Salt => "salt",
            Self::Icv => "icv",
            Self::IntSig => "intsig",
            Self::Bek => "bek",
            Self::BekIcv => "bekicv",
        }
    }

    /// Parses an administrative name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Security context parameter configured on a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScParam {
    /// Parameter id.
    pub id: u16,
    /// Raw parameter value.
    pub value: Vec<u8>,
}

impl ScParam {
    /// Creates a parameter from its id and value.
    #[must_use]
    pub fn new(id: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }

    /// Creates a parameter from its administrative name.
    #[must_use]
    pub fn named(name: &str, value: impl Into<Vec<u8>>) -> Option<Self> {
        ScParamKind::from_name(name).map(|kind| Self::new(kind.id(), value))
    }
}

/// Returns the first parameter with the given id.
#[must_use]
pub fn find_sc_param(params: &[ScParam], id: u16) -> Option<&ScParam> {
    params.iter().find(|param| param.id == id)
}

// ============================================================================
// SECTION: Rule
// ============================================================================

/// Stored policy rule.
///
/// # Invariants
/// - `position` equals the rule's offset in the engine's ordered collection.
/// - `filter.is_valid()` holds.
/// - `flags` has [`RuleFlags::ANONYMOUS_EVENT_SET`] iff the rule owns its set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Caller-supplied identifier.
    pub(crate) id: RuleId,
    /// Human description.
    pub(crate) description: String,
    /// Dense position in the ordered collection.
    pub(crate) position: usize,
    /// Administrative flags.
    pub(crate) flags: RuleFlags,
    /// Match filter.
    pub(crate) filter: Filter,
    /// Security context parameters in configuration order.
    pub(crate) sc_params: Vec<ScParam>,
    /// Event set used by this rule.
    pub(crate) event_set: EventSetHandle,
    /// Persisted record address when stored.
    pub(crate) record: Option<RecordId>,
}

impl Rule {
    /// Caller-supplied identifier.
    #[must_use]
    pub const fn id(&self) -> RuleId {
        self.id
    }

    /// Human description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Position in the ordered collection.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Administrative flags.
    #[must_use]
    pub const fn flags(&self) -> RuleFlags {
        self.flags
    }

    /// Match filter.
    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Cached filter score.
    #[must_use]
    pub const fn score(&self) -> u16 {
        self.filter.score()
    }

    /// Ordering key; higher ranks win, ties broken by later position.
    #[must_use]
    pub const fn rank(&self) -> (u16, usize) {
        (self.filter.score(), self.position)
    }

    /// Security context parameters.
    #[must_use]
    pub fn sc_params(&self) -> &[ScParam] {
        &self.sc_params
    }

    /// Handle of the rule's event set.
    #[must_use]
    pub const fn event_set(&self) -> EventSetHandle {
        self.event_set
    }

    /// Returns true when the rule owns an anonymous event set.
    #[must_use]
    pub const fn owns_event_set(&self) -> bool {
        self.flags.contains(RuleFlags::ANONYMOUS_EVENT_SET)
    }
}

/// Event set a new rule should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEventSet {
    /// Shared, named event set that must already exist.
    Named(EventSetName),
    /// Rule-private event set created with the rule.
    Anonymous {
        /// Event bindings for the private set.
        events: Vec<Event>,
    },
}

/// Caller input for creating a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    /// Caller-supplied identifier.
    pub id: RuleId,
    /// Human description.
    pub description: String,
    /// Match criteria.
    pub filter: FilterSpec,
    /// Security context parameters.
    pub sc_params: Vec<ScParam>,
    /// Event set the rule uses.
    pub event_set: RuleEventSet,
}

// ============================================================================
// SECTION: Search Tag
// ============================================================================

/// Rule query built per bundle-processing call.
///
/// # Invariants
/// - Empty EID strings are treated as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchTag<'a> {
    /// Bundle source EID.
    pub bundle_source: Option<&'a str>,
    /// Bundle destination EID.
    pub bundle_destination: Option<&'a str>,
    /// Security source EID.
    pub security_source: Option<&'a str>,
    /// Target block type.
    pub block_type: Option<BlockType>,
    /// Roles of the querying node.
    pub roles: RoleMask,
    /// Security context id; the unsupported sentinel counts as absent.
    pub sc_id: Option<ScId>,
    /// Restrict to rules using this event set.
    pub event_set: Option<&'a str>,
    /// Security service.
    pub service: Option<SecurityService>,
}

impl<'a> SearchTag<'a> {
    /// EID for a field, treating empty strings as absent.
    #[must_use]
    pub fn eid(&self, field: EidField) -> Option<&'a str> {
        let value = match field {
            EidField::BundleSource => self.bundle_source,
            EidField::BundleDestination => self.bundle_destination,
            EidField::SecuritySource => self.security_source,
        };
        value.filter(|eid| !eid.is_empty())
    }

    /// Security context id when specified and supported.
    #[must_use]
    pub fn effective_sc_id(&self) -> Option<ScId> {
        self.sc_id.filter(|id| id.is_supported())
    }
}
