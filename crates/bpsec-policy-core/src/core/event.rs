// crates/bpsec-policy-core/src/core/event.rs
// ============================================================================
// Module: Security Operation Events
// Description: Lifecycle event ids, optional processing actions, and legality.
// Purpose: Validate event/action configuration before it reaches an event set.
// Dependencies: serde, smallvec
// ============================================================================

//! ## Overview
//! Thirteen security operation lifecycle events may each be bound to a set of
//! optional processing actions. Every event has a fixed legality mask;
//! [`validate_actions`] intersects a requested mask with it, and
//! [`Event::new`] refuses any request that would lose a bit. Reserved actions
//! are accepted by the legality masks but have no executor; see
//! [`Action::is_reserved`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

// ============================================================================
// SECTION: Event Identifiers
// ============================================================================

/// Security operation lifecycle event.
///
/// # Invariants
/// - Each variant maps to a distinct bit in [`EventMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventId {
    /// Node is the security source for an operation.
    SourceForSop,
    /// Operation was added at the security source.
    SopAddedAtSource,
    /// Operation could not be added because of misconfiguration.
    SopMisconfiguredAtSource,
    /// Node is a security verifier for an operation.
    VerifierForSop,
    /// Verifier lacks configuration for an operation.
    SopMisconfiguredAtVerifier,
    /// Expected operation absent at the verifier.
    SopMissingAtVerifier,
    /// Operation failed verification.
    SopCorruptedAtVerifier,
    /// Operation verified.
    SopVerified,
    /// Node is the security acceptor for an operation.
    AcceptorForSop,
    /// Acceptor lacks configuration for an operation.
    SopMisconfiguredAtAcceptor,
    /// Expected operation absent at the acceptor.
    SopMissingAtAcceptor,
    /// Operation failed processing at the acceptor.
    SopCorruptedAtAcceptor,
    /// Operation processed at the acceptor.
    SopProcessed,
}

impl EventId {
    /// All events in bit order.
    pub const ALL: [Self; 13] = [
        Self::SourceForSop,
        Self::SopAddedAtSource,
        Self::SopMisconfiguredAtSource,
        Self::VerifierForSop,
        Self::SopMisconfiguredAtVerifier,
        Self::SopMissingAtVerifier,
        Self::SopCorruptedAtVerifier,
        Self::SopVerified,
        Self::AcceptorForSop,
        Self::SopMisconfiguredAtAcceptor,
        Self::SopMissingAtAcceptor,
        Self::SopCorruptedAtAcceptor,
        Self::SopProcessed,
    ];

    /// Returns the event's bit.
    #[must_use]
    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Maps a single bit back to its event.
    #[must_use]
    pub fn from_bit(bit: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.bit() == bit)
    }

    /// Canonical event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SourceForSop => "source_for_sop",
            Self::SopAddedAtSource => "sop_added_at_source",
            Self::SopMisconfiguredAtSource => "sop_misconfigured_at_source",
            Self::VerifierForSop => "verifier_for_sop",
            Self::SopMisconfiguredAtVerifier => "sop_misconfigured_at_verifier",
            Self::SopMissingAtVerifier => "sop_missing_at_verifier",
            Self::SopCorruptedAtVerifier => "sop_corrupted_at_verifier",
            Self::SopVerified => "sop_verified",
            Self::AcceptorForSop => "acceptor_for_sop",
            Self::SopMisconfiguredAtAcceptor => "sop_misconfigured_at_acceptor",
            Self::SopMissingAtAcceptor => "sop_missing_at_acceptor",
            Self::SopCorruptedAtAcceptor => "sop_corrupted_at_acceptor",
            Self::SopProcessed => "sop_processed",
        }
    }

    /// Parses a canonical event name or its short alias.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let event = match name {
            "source_for_sop" | "src_for_sop" => Self::SourceForSop,
            "sop_added_at_source" | "sop_added_at_src" => Self::SopAddedAtSource,
            "sop_misconfigured_at_source" | "sop_misconf_at_src" => Self::SopMisconfiguredAtSource,
            "verifier_for_sop" => Self::VerifierForSop,
            "sop_misconfigured_at_verifier" | "sop_misconf_at_verifier" => {
                Self::SopMisconfiguredAtVerifier
            }
            "sop_missing_at_verifier" => Self::SopMissingAtVerifier,
            "sop_corrupted_at_verifier" | "sop_corrupt_at_verifier" => {
                Self::SopCorruptedAtVerifier
            }
            "sop_verified" => Self::SopVerified,
            "acceptor_for_sop" => Self::AcceptorForSop,
            "sop_misconfigured_at_acceptor" | "sop_misconf_at_acceptor" => {
                Self::SopMisconfiguredAtAcceptor
            }
            "sop_missing_at_acceptor" => Self::SopMissingAtAcceptor,
            "sop_corrupted_at_acceptor" | "sop_corrupt_at_acceptor" => {
                Self::SopCorruptedAtAcceptor
            }
            "sop_processed" => Self::SopProcessed,
            _ => return None,
        };
        Some(event)
    }

    /// Actions that may legally be configured for this event.
    #[must_use]
    pub const fn legal_actions(self) -> ActionMask {
        let report = ActionMask::REPORT_REASON_CODE.bits();
        let dnf = ActionMask::DO_NOT_FORWARD.bits();
        let storage = ActionMask::REQUEST_STORAGE.bits();
        let target_bpcf = ActionMask::OVERRIDE_TARGET_BPCF.bits();
        let sop_bpcf = ActionMask::OVERRIDE_SOP_BPCF.bits();
        let bits = match self {
            Self::SourceForSop
            | Self::SopAddedAtSource
            | Self::VerifierForSop
            | Self::AcceptorForSop => report,
            Self::SopMisconfiguredAtSource => dnf | storage | report,
            Self::SopMisconfiguredAtVerifier
            | Self::SopCorruptedAtVerifier
            | Self::SopMisconfiguredAtAcceptor
            | Self::SopCorruptedAtAcceptor => ActionMask::ALL.bits(),
            Self::SopMissingAtVerifier | Self::SopMissingAtAcceptor => {
                dnf | storage | report | target_bpcf
            }
            Self::SopVerified => report | target_bpcf | sop_bpcf,
            Self::SopProcessed => report | target_bpcf,
        };
        ActionMask::from_bits(bits)
    }
}

/// Set of configured events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMask(u16);

impl EventMask {
    /// Creates a mask from raw bits, discarding unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & 0x1fff)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns true when the event's bit is set.
    #[must_use]
    pub const fn contains(self, event: EventId) -> bool {
        self.0 & event.bit() != 0
    }

    /// Sets the event's bit.
    pub const fn insert(&mut self, event: EventId) {
        self.0 |= event.bit();
    }

    /// Clears the event's bit.
    pub const fn remove(&mut self, event: EventId) {
        self.0 &= !event.bit();
    }

    /// Returns true when no event is configured.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Optional processing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Remove the security operation's block.
    RemoveSop,
    /// Remove the security operation's target block.
    RemoveSopTarget,
    /// Remove every security operation targeting the same block.
    RemoveAllTargetSops,
    /// Stop forwarding the bundle.
    DoNotForward,
    /// Retain the bundle in storage (reserved).
    RequestStorage,
    /// Send a status report with a reason code.
    ReportReasonCode,
    /// Override the target block processing control flags (reserved).
    OverrideTargetBpcf,
    /// Override the security block processing control flags (reserved).
    OverrideSopBpcf,
}

impl Action {
    /// All actions in bit order.
    pub const ALL: [Self; 8] = [
        Self::RemoveSop,
        Self::RemoveSopTarget,
        Self::RemoveAllTargetSops,
        Self::DoNotForward,
        Self::RequestStorage,
        Self::ReportReasonCode,
        Self::OverrideTargetBpcf,
        Self::OverrideSopBpcf,
    ];

    /// Implemented actions in execution order.
    pub const EXECUTION_ORDER: [Self; 5] = [
        Self::RemoveSop,
        Self::RemoveSopTarget,
        Self::RemoveAllTargetSops,
        Self::DoNotForward,
        Self::ReportReasonCode,
    ];

    /// Reserved actions without an executor.
    pub const RESERVED: [Self; 3] =
        [Self::RequestStorage, Self::OverrideTargetBpcf, Self::OverrideSopBpcf];

    /// Returns the action's bit.
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Returns true for reserved actions.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::RequestStorage | Self::OverrideTargetBpcf | Self::OverrideSopBpcf)
    }

    /// Canonical action name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RemoveSop => "remove_sop",
            Self::RemoveSopTarget => "remove_sop_target",
            Self::RemoveAllTargetSops => "remove_all_target_sops",
            Self::DoNotForward => "do_not_forward",
            Self::RequestStorage => "request_storage",
            Self::ReportReasonCode => "report_reason_code",
            Self::OverrideTargetBpcf => "override_target_bpcf",
            Self::OverrideSopBpcf => "override_sop_bpcf",
        }
    }

    /// Parses an action name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

/// Set of configured actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionMask(u8);

impl ActionMask {
    /// No action.
    pub const NONE: Self = Self(0);
    /// See [`Action::RemoveSop`].
    pub const REMOVE_SOP: Self = Self(0x01);
    /// See [`Action::RemoveSopTarget`].
    pub const REMOVE_SOP_TARGET: Self = Self(0x02);
    /// See [`Action::RemoveAllTargetSops`].
    pub const REMOVE_ALL_TARGET_SOPS: Self = Self(0x04);
    /// See [`Action::DoNotForward`].
    pub const DO_NOT_FORWARD: Self = Self(0x08);
    /// See [`Action::RequestStorage`].
    pub const REQUEST_STORAGE: Self = Self(0x10);
    /// See [`Action::ReportReasonCode`].
    pub const REPORT_REASON_CODE: Self = Self(0x20);
    /// See [`Action::OverrideTargetBpcf`].
    pub const OVERRIDE_TARGET_BPCF: Self = Self(0x40);
    /// See [`Action::OverrideSopBpcf`].
    pub const OVERRIDE_SOP_BPCF: Self = Self(0x80);
    /// Every action.
    pub const ALL: Self = Self(0xff);
    /// Reserved actions.
    pub const RESERVED: Self = Self(0x10 | 0x40 | 0x80);

    /// Creates a mask from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true when the action's bit is set.
    #[must_use]
    pub const fn contains(self, action: Action) -> bool {
        self.0 & action.bit() != 0
    }

    /// Intersection of two masks.
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Union of two masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true when no action is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Builds a mask from a list of actions.
    #[must_use]
    pub fn from_actions(actions: &[Action]) -> Self {
        Self(actions.iter().fold(0, |bits, action| bits | action.bit()))
    }

    /// Actions set in this mask, in bit order.
    pub fn actions(self) -> impl Iterator<Item = Action> {
        Action::ALL.into_iter().filter(move |action| self.contains(*action))
    }
}

impl From<Action> for ActionMask {
    fn from(action: Action) -> Self {
        Self(action.bit())
    }
}

/// Intersects a requested action mask with the event's legality mask.
#[must_use]
pub const fn validate_actions(event: EventId, requested: ActionMask) -> ActionMask {
    requested.intersection(event.legal_actions())
}

// ============================================================================
// SECTION: Action Parameters
// ============================================================================

/// Parameter attached to a parameterised action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionParam {
    /// Status report reason code for [`Action::ReportReasonCode`].
    ReasonCode {
        /// Reason code carried in the status report.
        code: u8,
    },
    /// Flags override for [`Action::OverrideTargetBpcf`].
    TargetFlagsOverride {
        /// Bits to replace.
        mask: u8,
        /// Replacement values.
        value: u8,
    },
    /// Flags override for [`Action::OverrideSopBpcf`].
    SopFlagsOverride {
        /// Bits to replace.
        mask: u8,
        /// Replacement values.
        value: u8,
    },
}

impl ActionParam {
    /// The action this parameter configures.
    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Self::ReasonCode { .. } => Action::ReportReasonCode,
            Self::TargetFlagsOverride { .. } => Action::OverrideTargetBpcf,
            Self::SopFlagsOverride { .. } => Action::OverrideSopBpcf,
        }
    }
}

/// Inline parameter list; at most one entry per parameterised action.
pub type ActionParams = SmallVec<[ActionParam; 3]>;

// ============================================================================
// SECTION: Status Report Reasons
// ============================================================================

/// Security-related bundle status report reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityReason {
    /// Missing security operation.
    MissingSecurityOperation,
    /// Unknown security operation.
    UnknownSecurityOperation,
    /// Unexpected security operation.
    UnexpectedSecurityOperation,
    /// Failed security operation.
    FailedSecurityOperation,
    /// Conflicting security operation.
    ConflictingSecurityOperation,
}

impl SecurityReason {
    /// Status report reason code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::MissingSecurityOperation => 12,
            Self::UnknownSecurityOperation => 13,
            Self::UnexpectedSecurityOperation => 14,
            Self::FailedSecurityOperation => 15,
            Self::ConflictingSecurityOperation => 16,
        }
    }

    /// Maps a reason code back to a security reason.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            12 => Some(Self::MissingSecurityOperation),
            13 => Some(Self::UnknownSecurityOperation),
            14 => Some(Self::UnexpectedSecurityOperation),
            15 => Some(Self::FailedSecurityOperation),
            16 => Some(Self::ConflictingSecurityOperation),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// Event-to-action binding held by an event set.
///
/// # Invariants
/// - `actions` is non-empty and within the event's legality mask.
/// - `params` holds at most one entry per parameterised action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Lifecycle event id.
    id: EventId,
    /// Enabled actions.
    actions: ActionMask,
    /// Action parameters.
    params: ActionParams,
}

/// Reasons an event could not be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRejection {
    /// No action requested.
    Empty,
    /// Requested actions outside the legality mask.
    Illegal {
        /// Bits stripped by validation.
        stripped: ActionMask,
    },
    /// Reserved actions rejected in strict mode.
    Reserved {
        /// Reserved bits requested.
        reserved: ActionMask,
    },
    /// A parameter was supplied twice or for an action that is not enabled.
    InvalidParams,
}

impl Event {
    /// Creates an event, failing outright when any requested action is illegal.
    ///
    /// # Errors
    ///
    /// Returns [`EventRejection`] when the request is empty, strips a bit,
    /// or carries inconsistent parameters.
    pub fn new(
        id: EventId,
        requested: ActionMask,
        params: &[ActionParam],
    ) -> Result<Self, EventRejection> {
        let validated = validate_actions(id, requested);
        if validated != requested {
            return Err(EventRejection::Illegal {
                stripped: ActionMask::from_bits(requested.bits() & !validated.bits()),
            });
        }
        if validated.is_empty() {
            return Err(EventRejection::Empty);
        }
        let mut seen = ActionMask::NONE;
        for param in params {
            let action = param.action();
            if !validated.contains(action) || seen.contains(action) {
                return Err(EventRejection::InvalidParams);
            }
            seen = seen.union(action.into());
        }
        Ok(Self {
            id,
            actions: validated,
            params: params.iter().copied().collect(),
        })
    }

    /// Creates an event and additionally rejects reserved actions.
    ///
    /// # Errors
    ///
    /// Returns [`EventRejection`] as [`Event::new`], or
    /// [`EventRejection::Reserved`] when a reserved action is requested.
    pub fn new_strict(
        id: EventId,
        requested: ActionMask,
        params: &[ActionParam],
    ) -> Result<Self, EventRejection> {
        let reserved = requested.intersection(ActionMask::RESERVED);
        if !reserved.is_empty() {
            return Err(EventRejection::Reserved {
                reserved,
            });
        }
        Self::new(id, requested, params)
    }

    /// Lifecycle event id.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.id
    }

    /// Enabled actions.
    #[must_use]
    pub const fn actions(&self) -> ActionMask {
        self.actions
    }

    /// Action parameters.
    #[must_use]
    pub fn params(&self) -> &[ActionParam] {
        &self.params
    }

    /// Configured status report reason code, if any.
    #[must_use]
    pub fn reason_code(&self) -> Option<u8> {
        self.params.iter().find_map(|param| match param {
            ActionParam::ReasonCode {
                code,
            } => Some(*code),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Action;
    use super::ActionMask;
    use super::ActionParam;
    use super::Event;
    use super::EventId;
    use super::EventRejection;
    use super::validate_actions;

    #[test]
    fn event_bits_are_distinct() {
        let mut seen = 0_u16;
        for event in EventId::ALL {
            assert_eq!(seen & event.bit(), 0);
            seen |= event.bit();
            assert_eq!(EventId::from_bit(event.bit()), Some(event));
            assert_eq!(EventId::from_name(event.name()), Some(event));
        }
        assert_eq!(seen, 0x1fff);
    }

    #[test]
    fn aliases_resolve_to_canonical_events() {
        assert_eq!(EventId::from_name("src_for_sop"), Some(EventId::SourceForSop));
        assert_eq!(EventId::from_name("sop_added_at_src"), Some(EventId::SopAddedAtSource));
        assert_eq!(
            EventId::from_name("sop_corrupt_at_acceptor"),
            Some(EventId::SopCorruptedAtAcceptor)
        );
        assert_eq!(EventId::from_name("sop_lost"), None);
    }

    #[test]
    fn validation_strips_illegal_bits() {
        let requested = ActionMask::REMOVE_SOP.union(ActionMask::REPORT_REASON_CODE);
        assert_eq!(
            validate_actions(EventId::SopAddedAtSource, requested),
            ActionMask::REPORT_REASON_CODE
        );
        assert_eq!(validate_actions(EventId::SopCorruptedAtVerifier, requested), requested);
    }

    #[test]
    fn creation_fails_when_any_bit_is_stripped() {
        let requested = ActionMask::REMOVE_SOP.union(ActionMask::OVERRIDE_TARGET_BPCF);
        let result = Event::new(EventId::SopAddedAtSource, requested, &[]);
        assert!(matches!(result, Err(EventRejection::Illegal { .. })));
        assert_eq!(
            Event::new(EventId::SopVerified, ActionMask::NONE, &[]),
            Err(EventRejection::Empty)
        );
    }

    #[test]
    fn params_must_match_enabled_actions() {
        let params = [ActionParam::ReasonCode {
            code: 12,
        }];
        let event =
            Event::new(EventId::SopMissingAtAcceptor, ActionMask::REPORT_REASON_CODE, &params);
        assert_eq!(event.map(|event| event.reason_code()), Ok(Some(12)));
        let rejected =
            Event::new(EventId::SopMissingAtAcceptor, ActionMask::DO_NOT_FORWARD, &params);
        assert_eq!(rejected, Err(EventRejection::InvalidParams));
    }

    #[test]
    fn strict_mode_rejects_reserved_actions() {
        let requested = ActionMask::from(Action::RequestStorage);
        assert!(Event::new(EventId::SopCorruptedAtAcceptor, requested, &[]).is_ok());
        assert!(matches!(
            Event::new_strict(EventId::SopCorruptedAtAcceptor, requested, &[]),
            Err(EventRejection::Reserved { .. })
        ));
    }
}
