// crates/bpsec-policy-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Policy Store
// Description: Durable PolicyStore backend using SQLite WAL.
// Purpose: Persist BPSec policy rules and event sets across restarts.
// Dependencies: bpsec-policy-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`PolicyStore`] implementation that
//! keeps the engine's rule and event set records in append order. Record
//! bytes are opaque here; the engine's codec validates them during restore.
//! Security posture: storage inputs are untrusted and every read is bounded
//! by [`MAX_RECORD_BYTES`].
//!
//! [`PolicyStore`]: bpsec_policy_core::PolicyStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_RECORD_BYTES;
pub use store::SqlitePolicyStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
