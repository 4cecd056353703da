// crates/bpsec-policy-core/src/runtime/telemetry.rs
// ============================================================================
// Module: Policy Telemetry Labels
// Description: Stable labels for policy mutations, dispatches, and actions.
// Purpose: Give audit records and metrics a fixed vocabulary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Labels used by [`crate::runtime::audit`] records. Each enum serializes to
//! the same string its `as_str` returns, so log pipelines can match on them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::Action;
use crate::core::PolicyError;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Administrative policy operation.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOperation {
    /// Event set created.
    AddEventSet,
    /// Event set deleted.
    DeleteEventSet,
    /// Event added to a set.
    AddEvent,
    /// Event cleared from a set.
    ClearEvent,
    /// Rule inserted.
    InsertRule,
    /// Rule removed.
    RemoveRule,
}

impl PolicyOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddEventSet => "add_event_set",
            Self::DeleteEventSet => "delete_event_set",
            Self::AddEvent => "add_event",
            Self::ClearEvent => "clear_event",
            Self::InsertRule => "insert_rule",
            Self::RemoveRule => "remove_rule",
        }
    }
}

/// Administrative operation outcome.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    /// State changed.
    Applied,
    /// Nothing to do; the requested state already held.
    Unchanged,
    /// Rejected by validation or a conflict.
    Rejected,
    /// Store or allocation failure.
    Failed,
}

impl OperationOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// Classifies an operation error.
    #[must_use]
    pub const fn from_error(error: &PolicyError) -> Self {
        if error.is_system() { Self::Failed } else { Self::Rejected }
    }
}

/// Dispatcher result for one event occurrence.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// No rule matched the security operation.
    NoRule,
    /// A rule matched but its event set does not configure the event.
    NotConfigured,
    /// The configured actions were carried out.
    Applied,
}

impl DispatchStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoRule => "no_rule",
            Self::NotConfigured => "not_configured",
            Self::Applied => "applied",
        }
    }
}

/// Result of one enabled processing action.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The bundle was changed or a report was sent.
    Applied,
    /// Enabled, but nothing in the bundle to act on.
    Skipped,
    /// Reserved action with no implementation.
    Unsupported,
    /// The bundle collaborator returned an error.
    Failed,
}

impl ActionOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Unsupported => "unsupported",
            Self::Failed => "failed",
        }
    }
}

/// Processing side a dispatch ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideLabel {
    /// Outbound bundle at the security source.
    Sender,
    /// Inbound bundle at a verifier or acceptor.
    Receiver,
}

impl SideLabel {
    /// Returns a stable label for the side.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }
}

/// One action outcome as recorded in a dispatch audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ActionRecord {
    /// Action label.
    pub action: &'static str,
    /// Outcome.
    pub outcome: ActionOutcome,
}

impl ActionRecord {
    /// Pairs an action with its outcome.
    #[must_use]
    pub const fn new(action: Action, outcome: ActionOutcome) -> Self {
        Self {
            action: action.name(),
            outcome,
        }
    }
}
