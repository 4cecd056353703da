// crates/bpsec-policy-config/src/lib.rs
// ============================================================================
// Module: BPSec Policy Config Library
// Description: Configuration model, validation, and engine bootstrap.
// Purpose: Single source of truth for bpsec-policy.toml semantics.
// Dependencies: bpsec-policy-core, bpsec-policy-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `bpsec-policy-config` defines the configuration model for the BPSec policy
//! engine: engine limits, the record store backend, the audit sink, and
//! declarative event sets and rules. Validation is strict and fails closed;
//! [`BpsecPolicyConfig::build_engine`] turns a validated file into a running
//! engine.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
