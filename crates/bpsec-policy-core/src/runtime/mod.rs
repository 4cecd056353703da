// crates/bpsec-policy-core/src/runtime/mod.rs
// ============================================================================
// Module: BPSec Policy Runtime
// Description: Policy engine, indexed matching, action dispatch, and audit.
// Purpose: Maintain the rule database and apply it to bundle processing.
// Dependencies: crate::{core, interfaces}, serde_json
// ============================================================================

//! ## Overview
//! The runtime owns the rule database. [`PolicyEngine`] performs every
//! mutation as validate, persist, then publish, so the in-memory view never
//! runs ahead of the store. Matching and dispatch are read-only over the
//! engine and can share it behind [`SharedPolicyEngine`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod dispatch;
pub mod engine;
pub mod index;
pub mod matching;
pub mod store;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::PolicyAuditSink;
pub use audit::PolicyChangeEvent;
pub use audit::PolicyDispatchEvent;
pub use audit::PolicyRestoreEvent;
pub use audit::StderrAuditSink;
pub use dispatch::DEFAULT_REASON_CODE;
pub use dispatch::DispatchReport;
pub use dispatch::ProcessingSide;
pub use dispatch::SecurityOperationRef;
pub use engine::PolicyEngine;
pub use engine::PolicyEngineConfig;
pub use engine::RestoreSummary;
pub use engine::SharedPolicyEngine;
pub use index::PrefixIndex;
pub use store::InMemoryPolicyStore;
pub use telemetry::ActionOutcome;
pub use telemetry::DispatchStatus;
pub use telemetry::OperationOutcome;
pub use telemetry::PolicyOperation;
