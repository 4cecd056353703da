// crates/bpsec-policy-core/tests/dispatch.rs
// ============================================================================
// Module: Dispatcher Tests
// Description: Action execution order, side-specific behavior, and audit.
// Purpose: Ensure configured actions reach the bundle exactly as configured.
// ============================================================================

//! Integration tests for the policy action dispatcher.

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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use bpsec_policy_core::Action;
use bpsec_policy_core::ActionMask;
use bpsec_policy_core::ActionOutcome;
use bpsec_policy_core::ActionParam;
use bpsec_policy_core::BlockNumber;
use bpsec_policy_core::BlockType;
use bpsec_policy_core::BundleMutator;
use bpsec_policy_core::DispatchStatus;
use bpsec_policy_core::EventId;
use bpsec_policy_core::EventSetName;
use bpsec_policy_core::FilterSpec;
use bpsec_policy_core::MutatorError;
use bpsec_policy_core::PolicyAuditSink;
use bpsec_policy_core::PolicyEngine;
use bpsec_policy_core::PolicyEngineConfig;
use bpsec_policy_core::PolicyError;
use bpsec_policy_core::ProcessingSide;
use bpsec_policy_core::RoleMask;
use bpsec_policy_core::RuleEventSet;
use bpsec_policy_core::RuleId;
use bpsec_policy_core::RuleSpec;
use bpsec_policy_core::ScId;
use bpsec_policy_core::SecurityOperationRef;
use bpsec_policy_core::SecurityService;
use bpsec_policy_core::runtime::PolicyDispatchEvent;

// ============================================================================
// SECTION: Test Doubles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Delete(u64),
    Detach(u64, u64),
    Corrupt,
    Suspend,
    Report(u8),
}

/// Bundle with extension blocks and the security blocks targeting them.
#[derive(Default)]
struct RecordingBundle {
    blocks: BTreeMap<u64, BlockType>,
    targets: BTreeMap<u64, Vec<u64>>,
    calls: Vec<Call>,
    fail_reports: bool,
}

impl RecordingBundle {
    fn with_bib_over_payload() -> Self {
        let mut bundle = Self::default();
        bundle.blocks.insert(2, BlockType::BLOCK_INTEGRITY);
        bundle.blocks.insert(3, BlockType::new(7));
        bundle.blocks.insert(4, BlockType::BLOCK_INTEGRITY);
        bundle.targets.insert(2, vec![1, 3]);
        bundle.targets.insert(4, vec![3]);
        bundle
    }
}

impl BundleMutator for RecordingBundle {
    fn bundle_source(&self) -> Option<String> {
        Some("ipn:1.1".to_string())
    }

    fn bundle_destination(&self) -> Option<String> {
        Some("ipn:2.1".to_string())
    }

    fn block_type(&self, number: BlockNumber) -> Option<BlockType> {
        self.blocks.get(&number.get()).copied()
    }

    fn delete_block(&mut self, number: BlockNumber) -> Result<bool, MutatorError> {
        self.calls.push(Call::Delete(number.get()));
        self.targets.remove(&number.get());
        Ok(self.blocks.remove(&number.get()).is_some())
    }

    fn detach_target(
        &mut self,
        security_block: BlockNumber,
        target: BlockNumber,
    ) -> Result<bool, MutatorError> {
        self.calls.push(Call::Detach(security_block.get(), target.get()));
        let Some(targets) = self.targets.get_mut(&security_block.get()) else {
            return Ok(false);
        };
        let before = targets.len();
        targets.retain(|number| *number != target.get());
        Ok(targets.len() != before)
    }

    fn security_blocks_targeting(&self, target: BlockNumber) -> Vec<BlockNumber> {
        self.targets
            .iter()
            .filter(|(_, targets)| targets.contains(&target.get()))
            .map(|(block, _)| BlockNumber::new(*block))
            .collect()
    }

    fn mark_corrupt(&mut self) {
        self.calls.push(Call::Corrupt);
    }

    fn suspend(&mut self) -> Result<(), MutatorError> {
        self.calls.push(Call::Suspend);
        Ok(())
    }

    fn send_status_report(&mut self, reason_code: u8) -> Result<(), MutatorError> {
        if self.fail_reports {
            return Err(MutatorError::Report("link down".to_string()));
        }
        self.calls.push(Call::Report(reason_code));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingAudit {
    dispatches: Mutex<Vec<PolicyDispatchEvent>>,
}

impl PolicyAuditSink for RecordingAudit {
    fn record_dispatch(&self, event: &PolicyDispatchEvent) {
        self.dispatches.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

const SOP: SecurityOperationRef<'static> = SecurityOperationRef {
    block_number: BlockNumber::new(2),
    sc_id: ScId::new(1),
    security_source: Some("ipn:1.1"),
    service: SecurityService::Integrity,
};

fn engine_with(events: &[(EventId, ActionMask, Vec<ActionParam>)]) -> PolicyEngine {
    engine_with_filter(
        FilterSpec {
            bundle_destination: Some("ipn:2.*".to_string()),
            service: Some(SecurityService::Integrity),
            ..FilterSpec::default()
        },
        events,
    )
}

fn engine_with_filter(
    filter: FilterSpec,
    events: &[(EventId, ActionMask, Vec<ActionParam>)],
) -> PolicyEngine {
    let mut engine = PolicyEngine::in_memory(PolicyEngineConfig::default());
    engine.add_event_set(EventSetName::new("actions"), None).unwrap();
    for (id, actions, params) in events {
        let event = engine.create_event(*id, *actions, params).unwrap();
        engine.add_event("actions", event).unwrap();
    }
    engine
        .insert_rule(RuleSpec {
            id: RuleId::new(5),
            description: "integrity to node 2".to_string(),
            filter,
            sc_params: Vec::new(),
            event_set: RuleEventSet::Named(EventSetName::new("actions")),
        })
        .unwrap();
    engine
}

fn verified_report_engine(filter: FilterSpec) -> PolicyEngine {
    engine_with_filter(filter, &[(EventId::SopVerified, ActionMask::REPORT_REASON_CODE, vec![])])
}

fn dispatch_status(engine: &PolicyEngine, side: ProcessingSide) -> DispatchStatus {
    let mut bundle = RecordingBundle::with_bib_over_payload();
    let report = engine
        .handle_event(&mut bundle, side, EventId::SopVerified, Some(&SOP), BlockNumber::PAYLOAD)
        .unwrap();
    report.status
}

fn receiver() -> ProcessingSide {
    ProcessingSide::Receiver(RoleMask::VERIFIER)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn no_matching_rule_is_a_silent_no_op() {
    let engine = PolicyEngine::in_memory(PolicyEngineConfig::default());
    let mut bundle = RecordingBundle::with_bib_over_payload();
    let report = engine
        .handle_event(&mut bundle, receiver(), EventId::SopVerified, Some(&SOP), BlockNumber::PAYLOAD)
        .unwrap();
    assert_eq!(report.status, DispatchStatus::NoRule);
    assert!(report.actions.is_empty());
    assert!(bundle.calls.is_empty());
}

#[test]
fn unconfigured_event_is_a_silent_no_op() {
    let engine = engine_with(&[(EventId::SopVerified, ActionMask::REPORT_REASON_CODE, vec![])]);
    let mut bundle = RecordingBundle::with_bib_over_payload();
    let report = engine
        .handle_event(
            &mut bundle,
            receiver(),
            EventId::SopMissingAtVerifier,
            Some(&SOP),
            BlockNumber::PAYLOAD,
        )
        .unwrap();
    assert_eq!(report.status, DispatchStatus::NotConfigured);
    assert_eq!(report.rule, Some(RuleId::new(5)));
    assert!(bundle.calls.is_empty());
}

#[test]
fn actions_run_in_fixed_order_at_the_receiver() {
    let all = ActionMask::REPORT_REASON_CODE
        .union(ActionMask::DO_NOT_FORWARD)
        .union(ActionMask::REMOVE_SOP_TARGET)
        .union(ActionMask::REMOVE_SOP);
    let engine = engine_with(&[(
        EventId::SopCorruptedAtVerifier,
        all,
        vec![ActionParam::ReasonCode {
            code: 15,
        }],
    )]);
    let mut bundle = RecordingBundle::with_bib_over_payload();
    let report = engine
        .handle_event(
            &mut bundle,
            receiver(),
            EventId::SopCorruptedAtVerifier,
            Some(&SOP),
            BlockNumber::new(3),
        )
        .unwrap();

    assert_eq!(report.status, DispatchStatus::Applied);
    let order: Vec<Action> = report.actions.iter().map(|(action, _)| *action).collect();
    assert_eq!(
        order,
        vec![
            Action::RemoveSop,
            Action::RemoveSopTarget,
            Action::DoNotForward,
            Action::ReportReasonCode
        ]
    );
    assert_eq!(bundle.calls, vec![
        Call::Delete(2),
        Call::Detach(2, 3),
        Call::Suspend,
        Call::Report(15)
    ]);
    assert_eq!(report.outcome(Action::RemoveSop), Some(ActionOutcome::Applied));
    assert_eq!(report.outcome(Action::RemoveSopTarget), Some(ActionOutcome::Skipped));
    assert!(bundle.blocks.contains_key(&3));
}

#[test]
fn sender_target_removal_deletes_extension_targets_and_abandons_on_payload() {
    let engine = engine_with(&[(
        EventId::SopCorruptedAtVerifier,
        ActionMask::REMOVE_SOP_TARGET,
        vec![],
    )]);
    let mut bundle = RecordingBundle::with_bib_over_payload();
    engine
        .handle_event(
            &mut bundle,
            ProcessingSide::Sender,
            EventId::SopCorruptedAtVerifier,
            Some(&SOP),
            BlockNumber::new(3),
        )
        .unwrap();
    assert_eq!(bundle.calls, vec![Call::Detach(2, 3), Call::Delete(3)]);

    let mut bundle = RecordingBundle::with_bib_over_payload();
    engine
        .handle_event(
            &mut bundle,
            ProcessingSide::Sender,
            EventId::SopCorruptedAtVerifier,
            Some(&SOP),
            BlockNumber::PAYLOAD,
        )
        .unwrap();
    assert_eq!(bundle.calls, vec![Call::Detach(2, 1), Call::Corrupt]);
}

#[test]
fn do_not_forward_abandons_at_the_sender() {
    let engine = engine_with(&[(
        EventId::SopMisconfiguredAtSource,
        ActionMask::DO_NOT_FORWARD,
        vec![],
    )]);
    let mut bundle = RecordingBundle::with_bib_over_payload();
    engine
        .handle_event(
            &mut bundle,
            ProcessingSide::Sender,
            EventId::SopMisconfiguredAtSource,
            Some(&SOP),
            BlockNumber::PAYLOAD,
        )
        .unwrap();
    assert_eq!(bundle.calls, vec![Call::Corrupt]);
}

#[test]
fn remove_all_target_sops_deletes_every_security_block_on_the_target() {
    let engine = engine_with(&[(
        EventId::SopCorruptedAtAcceptor,
        ActionMask::REMOVE_ALL_TARGET_SOPS,
        vec![],
    )]);
    let mut bundle = RecordingBundle::with_bib_over_payload();
    let report = engine
        .handle_event(
            &mut bundle,
            ProcessingSide::Receiver(RoleMask::ACCEPTOR),
            EventId::SopCorruptedAtAcceptor,
            Some(&SOP),
            BlockNumber::new(3),
        )
        .unwrap();
    assert_eq!(bundle.calls, vec![Call::Delete(2), Call::Delete(4)]);
    assert_eq!(report.outcome(Action::RemoveAllTargetSops), Some(ActionOutcome::Applied));
}

#[test]
fn reserved_actions_are_reported_unsupported_and_failures_do_not_stop_dispatch() {
    let requested = ActionMask::REPORT_REASON_CODE
        .union(ActionMask::REMOVE_SOP)
        .union(ActionMask::REQUEST_STORAGE)
        .union(ActionMask::OVERRIDE_SOP_BPCF);
    let engine = engine_with(&[(EventId::SopCorruptedAtVerifier, requested, vec![])]);
    let audit = Arc::new(RecordingAudit::default());
    let engine = engine.with_audit(audit.clone());
    let mut bundle = RecordingBundle::with_bib_over_payload();
    bundle.fail_reports = true;

    let report = engine
        .handle_event(
            &mut bundle,
            receiver(),
            EventId::SopCorruptedAtVerifier,
            Some(&SOP),
            BlockNumber::PAYLOAD,
        )
        .unwrap();
    assert_eq!(report.outcome(Action::RemoveSop), Some(ActionOutcome::Applied));
    assert_eq!(report.outcome(Action::ReportReasonCode), Some(ActionOutcome::Failed));
    assert_eq!(report.outcome(Action::RequestStorage), Some(ActionOutcome::Unsupported));
    assert_eq!(report.outcome(Action::OverrideSopBpcf), Some(ActionOutcome::Unsupported));
    assert_eq!(report.outcome(Action::DoNotForward), None);
    let order: Vec<Action> = report.actions.iter().map(|(action, _)| *action).collect();
    assert_eq!(order, vec![
        Action::RemoveSop,
        Action::ReportReasonCode,
        Action::RequestStorage,
        Action::OverrideSopBpcf
    ]);

    let dispatches = audit.dispatches.lock().unwrap();
    assert_eq!(dispatches.len(), 1);
    let line = serde_json::to_value(&dispatches[0]).unwrap();
    assert_eq!(line["event"], "policy_dispatch");
    assert_eq!(line["sop_event"], "sop_corrupted_at_verifier");
    assert_eq!(line["side"], "receiver");
    assert_eq!(line["rule_id"], 5);
    assert_eq!(line["status"], "applied");
    assert_eq!(line["actions"].as_array().unwrap().len(), 4);
}

#[test]
fn report_without_configured_code_uses_default() {
    let engine = engine_with(&[(EventId::SopVerified, ActionMask::REPORT_REASON_CODE, vec![])]);
    let mut bundle = RecordingBundle::with_bib_over_payload();
    engine
        .handle_event(&mut bundle, receiver(), EventId::SopVerified, Some(&SOP), BlockNumber::PAYLOAD)
        .unwrap();
    assert_eq!(bundle.calls, vec![Call::Report(bpsec_policy_core::runtime::DEFAULT_REASON_CODE)]);
}

#[test]
fn missing_extension_target_is_not_found() {
    let engine = engine_with(&[]);
    let mut bundle = RecordingBundle::with_bib_over_payload();
    let err = engine
        .handle_event(&mut bundle, receiver(), EventId::SopVerified, Some(&SOP), BlockNumber::new(9))
        .unwrap_err();
    assert!(matches!(err, PolicyError::NotFound(_)));
}

#[test]
fn rule_without_service_fires_on_both_sides() {
    let engine = verified_report_engine(FilterSpec {
        bundle_destination: Some("ipn:2.*".to_string()),
        ..FilterSpec::default()
    });
    let mut bundle = RecordingBundle::with_bib_over_payload();
    let report = engine
        .handle_event(&mut bundle, receiver(), EventId::SopVerified, Some(&SOP), BlockNumber::PAYLOAD)
        .unwrap();
    assert_eq!(report.status, DispatchStatus::Applied);
    assert_eq!(report.rule, Some(RuleId::new(5)));
    assert_eq!(bundle.calls, vec![Call::Report(bpsec_policy_core::runtime::DEFAULT_REASON_CODE)]);
    assert_eq!(dispatch_status(&engine, ProcessingSide::Sender), DispatchStatus::Applied);
}

#[test]
fn rule_service_does_not_gate_dispatch() {
    let engine = verified_report_engine(FilterSpec {
        bundle_destination: Some("ipn:2.*".to_string()),
        service: Some(SecurityService::Confidentiality),
        ..FilterSpec::default()
    });
    assert_eq!(dispatch_status(&engine, receiver()), DispatchStatus::Applied);
    assert_eq!(dispatch_status(&engine, ProcessingSide::Sender), DispatchStatus::Applied);
}

#[test]
fn rule_role_must_match_the_processing_side() {
    let engine = verified_report_engine(FilterSpec {
        bundle_destination: Some("ipn:2.*".to_string()),
        roles: RoleMask::ACCEPTOR,
        ..FilterSpec::default()
    });
    assert_eq!(dispatch_status(&engine, receiver()), DispatchStatus::NoRule);
    assert_eq!(dispatch_status(&engine, ProcessingSide::Sender), DispatchStatus::NoRule);
    assert_eq!(
        dispatch_status(&engine, ProcessingSide::Receiver(RoleMask::ACCEPTOR)),
        DispatchStatus::Applied
    );

    let source_only = verified_report_engine(FilterSpec {
        bundle_destination: Some("ipn:2.*".to_string()),
        roles: RoleMask::SOURCE,
        ..FilterSpec::default()
    });
    assert_eq!(dispatch_status(&source_only, ProcessingSide::Sender), DispatchStatus::Applied);
    assert_eq!(dispatch_status(&source_only, receiver()), DispatchStatus::NoRule);
}

#[test]
fn rule_security_context_must_match_the_operation() {
    let other_context = verified_report_engine(FilterSpec {
        bundle_destination: Some("ipn:2.*".to_string()),
        sc_id: Some(ScId::new(2)),
        ..FilterSpec::default()
    });
    assert_eq!(dispatch_status(&other_context, receiver()), DispatchStatus::NoRule);
    assert_eq!(dispatch_status(&other_context, ProcessingSide::Sender), DispatchStatus::NoRule);

    let same_context = verified_report_engine(FilterSpec {
        bundle_destination: Some("ipn:2.*".to_string()),
        sc_id: Some(SOP.sc_id),
        ..FilterSpec::default()
    });
    assert_eq!(dispatch_status(&same_context, receiver()), DispatchStatus::Applied);
    assert_eq!(dispatch_status(&same_context, ProcessingSide::Sender), DispatchStatus::Applied);
}
