// crates/bpsec-policy-core/src/lib.rs
// ============================================================================
// Module: BPSec Policy Core Library
// Description: Public API surface for the BPSec policy engine.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! BPSec policy core decides which Bundle Protocol Security operations apply
//! to a bundle. Rules pair a filter over bundle and block attributes with an
//! event set describing what to do when a security operation is processed,
//! fails, or is missing. The engine keeps rules in priority order, answers
//! best-match queries through per-EID prefix indices, and carries out the
//! configured actions through an abstract bundle interface.
//!
//! Persistence goes through [`interfaces::PolicyStore`]; the in-memory store
//! lives here and a `SQLite` store lives in `bpsec-policy-store-sqlite`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::BundleMutator;
pub use interfaces::MutatorError;
pub use interfaces::PolicyStore;
pub use interfaces::RecordId;
pub use interfaces::RecordList;
pub use interfaces::SecurityContextCatalog;
pub use interfaces::SharedPolicyStore;
pub use interfaces::StoreError;
pub use interfaces::StoredRecord;
pub use runtime::ActionOutcome;
pub use runtime::DispatchReport;
pub use runtime::DispatchStatus;
pub use runtime::FileAuditSink;
pub use runtime::InMemoryPolicyStore;
pub use runtime::NoopAuditSink;
pub use runtime::PolicyAuditSink;
pub use runtime::PolicyEngine;
pub use runtime::PolicyEngineConfig;
pub use runtime::ProcessingSide;
pub use runtime::RestoreSummary;
pub use runtime::SecurityOperationRef;
pub use runtime::SharedPolicyEngine;
pub use runtime::StderrAuditSink;
