// crates/bpsec-policy-core/src/core/mod.rs
// ============================================================================
// Module: BPSec Policy Core Types
// Description: Rule, filter, event, and event set model plus record codec.
// Purpose: Provide the validated data model the policy runtime operates on.
// Dependencies: serde, smallvec, thiserror
// ============================================================================

//! ## Overview
//! Core types describe what a policy rule is: a filter over bundle and block
//! attributes, an event set binding lifecycle events to processing actions,
//! and the security context parameters to use. Nothing here touches storage
//! or a bundle; see [`crate::runtime`] for that.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod arena;
pub mod codec;
pub mod eid;
pub mod error;
pub mod event;
pub mod event_set;
pub mod filter;
pub mod identifiers;
pub mod rule;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use arena::EventSetHandle;
pub use arena::RuleHandle;
pub use codec::CodecError;
pub use codec::RecordReader;
pub use codec::RecordWriter;
pub use codec::RuleRecord;
pub use codec::RuleRecordEventSet;
pub use eid::EID_WILDCARD;
pub use eid::EidHandle;
pub use eid::EidInterner;
pub use eid::UNIVERSAL_WILDCARD;
pub use eid::eid_match;
pub use eid::is_wildcard_eid;
pub use error::PolicyError;
pub use event::Action;
pub use event::ActionMask;
pub use event::ActionParam;
pub use event::ActionParams;
pub use event::Event;
pub use event::EventId;
pub use event::EventMask;
pub use event::EventRejection;
pub use event::SecurityReason;
pub use event::validate_actions;
pub use event_set::EventSet;
pub use event_set::MAX_EVENT_SET_DESC_LEN;
pub use event_set::MAX_EVENT_SET_NAME_LEN;
pub use event_set::validate_user_name;
pub use filter::EidCriterion;
pub use filter::EidField;
pub use filter::Filter;
pub use filter::FilterFlags;
pub use filter::FilterSpec;
pub use filter::RoleMask;
pub use filter::SCORE_FULL;
pub use filter::SCORE_PARTIAL;
pub use identifiers::ANONYMOUS_EVENT_SET_PREFIX;
pub use identifiers::BlockNumber;
pub use identifiers::BlockType;
pub use identifiers::EventSetName;
pub use identifiers::RuleId;
pub use identifiers::ScId;
pub use identifiers::SecurityService;
pub use rule::MAX_RULE_DESC_LEN;
pub use rule::MAX_RULES;
pub use rule::MAX_SC_PARAM_LEN;
pub use rule::Rule;
pub use rule::RuleEventSet;
pub use rule::RuleFlags;
pub use rule::RuleSpec;
pub use rule::ScParam;
pub use rule::ScParamKind;
pub use rule::SearchTag;
pub use rule::find_sc_param;
