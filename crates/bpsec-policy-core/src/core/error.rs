// crates/bpsec-policy-core/src/core/error.rs
// ============================================================================
// Module: Policy Errors
// Description: Error taxonomy shared by every policy engine operation.
// Purpose: Keep logical failures distinct from system failures.
// Dependencies: crate::core::event, thiserror
// ============================================================================

//! ## Overview
//! Engine operations return `Result<T, PolicyError>`. Logical failures
//! (invalid input, conflicts, corrupt records) leave engine state untouched;
//! [`PolicyError::System`] reports allocation or store-transaction failures
//! and is always distinguishable via [`PolicyError::is_system`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::event::EventRejection;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy engine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Input rejected before any mutation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Referenced rule or event set does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Persisted record failed to decode.
    #[error("corrupt record: {0}")]
    Corruption(String),
    /// Allocation or store failure.
    #[error("system error: {0}")]
    System(String),
}

impl PolicyError {
    /// Returns true for system failures.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }

    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Corruption(_) => "corruption",
            Self::System(_) => "system",
        }
    }
}

impl From<EventRejection> for PolicyError {
    fn from(rejection: EventRejection) -> Self {
        match rejection {
            EventRejection::Empty => Self::InvalidArgument("event enables no actions".to_string()),
            EventRejection::Illegal {
                stripped,
            } => Self::Conflict(format!(
                "actions {:#04x} are not legal for this event",
                stripped.bits()
            )),
            EventRejection::Reserved {
                reserved,
            } => Self::Conflict(format!(
                "reserved actions {:#04x} are not supported",
                reserved.bits()
            )),
            EventRejection::InvalidParams => {
                Self::InvalidArgument("action parameters do not match enabled actions".to_string())
            }
        }
    }
}
