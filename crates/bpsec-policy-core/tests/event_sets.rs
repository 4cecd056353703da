// crates/bpsec-policy-core/tests/event_sets.rs
// ============================================================================
// Module: Event Set Tests
// Description: Event creation, event set membership, and reference counting.
// Purpose: Ensure invalid configuration is rejected without partial mutation.
// ============================================================================

//! Integration tests for event and event set management.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use bpsec_policy_core::ActionMask;
use bpsec_policy_core::ActionParam;
use bpsec_policy_core::EventId;
use bpsec_policy_core::EventSetName;
use bpsec_policy_core::FilterSpec;
use bpsec_policy_core::PolicyEngine;
use bpsec_policy_core::PolicyEngineConfig;
use bpsec_policy_core::PolicyError;
use bpsec_policy_core::RuleEventSet;
use bpsec_policy_core::RuleId;
use bpsec_policy_core::RuleSpec;
use bpsec_policy_core::SecurityReason;

fn engine_with_set(name: &str) -> PolicyEngine {
    let mut engine = PolicyEngine::in_memory(PolicyEngineConfig::default());
    engine.add_event_set(EventSetName::new(name), Some("test set".to_string())).unwrap();
    engine
}

fn rule_using(id: u16, event_set: RuleEventSet) -> RuleSpec {
    RuleSpec {
        id: RuleId::new(id),
        description: String::new(),
        filter: FilterSpec {
            bundle_source: Some("ipn:1.*".to_string()),
            ..FilterSpec::default()
        },
        sc_params: Vec::new(),
        event_set,
    }
}

#[test]
fn illegal_action_fails_creation_outright() {
    let engine = engine_with_set("s");
    let requested = ActionMask::REMOVE_SOP.union(ActionMask::OVERRIDE_TARGET_BPCF);
    let err = engine.create_event(EventId::SopAddedAtSource, requested, &[]).unwrap_err();
    assert!(matches!(err, PolicyError::Conflict(_)));
    assert!(engine.get_event("s", EventId::SopAddedAtSource).is_none());
}

#[test]
fn empty_request_and_orphan_parameters_are_invalid() {
    let engine = engine_with_set("s");
    let err = engine.create_event(EventId::SopVerified, ActionMask::NONE, &[]).unwrap_err();
    assert!(matches!(err, PolicyError::InvalidArgument(_)));

    let orphan = [ActionParam::ReasonCode {
        code: 12,
    }];
    let err = engine
        .create_event(EventId::SopCorruptedAtVerifier, ActionMask::REMOVE_SOP, &orphan)
        .unwrap_err();
    assert!(matches!(err, PolicyError::InvalidArgument(_)));
}

#[test]
fn strict_mode_rejects_reserved_actions() {
    let config = PolicyEngineConfig {
        reject_unsupported_actions: true,
        ..PolicyEngineConfig::default()
    };
    let engine = PolicyEngine::in_memory(config);
    let err = engine
        .create_event(EventId::SopMissingAtVerifier, ActionMask::REQUEST_STORAGE, &[])
        .unwrap_err();
    assert!(matches!(err, PolicyError::Conflict(_)));

    let lenient = PolicyEngine::in_memory(PolicyEngineConfig::default());
    let event = lenient
        .create_event(EventId::SopMissingAtVerifier, ActionMask::REQUEST_STORAGE, &[])
        .unwrap();
    assert!(event.actions().contains(bpsec_policy_core::Action::RequestStorage));
}

#[test]
fn duplicate_event_is_a_conflict_and_leaves_the_set_unchanged() {
    let mut engine = engine_with_set("s");
    let code = SecurityReason::FailedSecurityOperation.code();
    let event = engine
        .create_event(
            EventId::SopCorruptedAtVerifier,
            ActionMask::REMOVE_SOP.union(ActionMask::REPORT_REASON_CODE),
            &[ActionParam::ReasonCode {
                code,
            }],
        )
        .unwrap();
    engine.add_event("s", event.clone()).unwrap();
    let mask = engine.get_event_set("s").unwrap().mask();

    let err = engine.add_event("s", event).unwrap_err();
    assert!(matches!(err, PolicyError::Conflict(_)));
    let set = engine.get_event_set("s").unwrap();
    assert_eq!(set.mask(), mask);
    assert_eq!(set.events().len(), 1);
    assert_eq!(set.event(EventId::SopCorruptedAtVerifier).unwrap().reason_code(), Some(code));
}

#[test]
fn clear_event_drops_the_binding() {
    let mut engine = engine_with_set("s");
    let event = engine.create_event(EventId::SopVerified, ActionMask::REPORT_REASON_CODE, &[]).unwrap();
    engine.add_event("s", event).unwrap();
    assert!(engine.clear_event("s", EventId::SopVerified).unwrap());
    assert!(!engine.clear_event("s", EventId::SopVerified).unwrap());
    assert!(engine.get_event_set("s").unwrap().mask().is_empty());
    let err = engine.clear_event("missing", EventId::SopVerified).unwrap_err();
    assert!(matches!(err, PolicyError::NotFound(_)));
}

#[test]
fn duplicate_and_reserved_names_are_rejected() {
    let mut engine = engine_with_set("s");
    let err = engine.add_event_set(EventSetName::new("s"), None).unwrap_err();
    assert!(matches!(err, PolicyError::Conflict(_)));
    let err = engine.add_event_set(EventSetName::new("~mine"), None).unwrap_err();
    assert!(matches!(err, PolicyError::InvalidArgument(_)));
    let err = engine.add_event_set(EventSetName::new("x".repeat(33)), None).unwrap_err();
    assert!(matches!(err, PolicyError::InvalidArgument(_)));
    assert_eq!(engine.list_event_sets().count(), 1);
}

#[test]
fn referenced_event_set_cannot_be_deleted_until_released() {
    let mut engine = engine_with_set("shared");
    let named = || RuleEventSet::Named(EventSetName::new("shared"));
    engine.insert_rule(rule_using(1, named())).unwrap();
    engine.insert_rule(rule_using(2, named())).unwrap();
    assert_eq!(engine.get_event_set("shared").unwrap().rule_count(), 2);

    let err = engine.delete_event_set("shared").unwrap_err();
    assert!(matches!(err, PolicyError::Conflict(_)));

    engine.remove_by_id(RuleId::new(1)).unwrap();
    assert!(engine.delete_event_set("shared").is_err());
    engine.remove_by_id(RuleId::new(2)).unwrap();
    assert_eq!(engine.get_event_set("shared").unwrap().rule_count(), 0);
    assert!(engine.delete_event_set("shared").unwrap());
    assert!(!engine.delete_event_set("shared").unwrap());
}

#[test]
fn anonymous_event_set_lives_and_dies_with_its_rule() {
    let mut engine = PolicyEngine::in_memory(PolicyEngineConfig::default());
    let event = engine.create_event(EventId::SopProcessed, ActionMask::REPORT_REASON_CODE, &[]).unwrap();
    let handle = engine
        .insert_rule(rule_using(
            7,
            RuleEventSet::Anonymous {
                events: vec![event],
            },
        ))
        .unwrap();
    let rule = engine.rule(handle).unwrap();
    assert!(rule.owns_event_set());
    let set = engine.rule_event_set(rule).unwrap();
    assert_eq!(set.name().as_str(), "~rule-7");
    assert!(set.event(EventId::SopProcessed).is_some());
    assert_eq!(engine.list_event_sets().count(), 0);

    let set_handle = rule.event_set();
    assert!(engine.remove_rule(handle).unwrap());
    assert!(engine.event_set(set_handle).is_none());
    assert!(engine.rule(handle).is_none());
}

#[test]
fn anonymous_event_with_duplicate_ids_rejects_the_rule() {
    let mut engine = PolicyEngine::in_memory(PolicyEngineConfig::default());
    let event = engine.create_event(EventId::SopProcessed, ActionMask::REPORT_REASON_CODE, &[]).unwrap();
    let err = engine
        .insert_rule(rule_using(
            1,
            RuleEventSet::Anonymous {
                events: vec![event.clone(), event],
            },
        ))
        .unwrap_err();
    assert!(matches!(err, PolicyError::Conflict(_)));
    assert_eq!(engine.rules_len(), 0);
}
