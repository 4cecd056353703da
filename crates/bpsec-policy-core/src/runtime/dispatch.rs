// crates/bpsec-policy-core/src/runtime/dispatch.rs
// ============================================================================
// Module: Policy Action Dispatcher
// Description: Executes the optional processing actions a rule configures.
// Purpose: React to security operation events on outbound and inbound bundles.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The bundle pipeline calls [`PolicyEngine::handle_event`] once per
//! security operation event. The dispatcher builds a [`SearchTag`] from the
//! bundle and the security operation, takes the best rule, and, when that
//! rule's event set configures the event, carries out the enabled actions in
//! fixed order through a [`BundleMutator`].
//!
//! No matching rule, or a rule whose event set lacks the event, is a silent
//! no-op. Reserved actions are reported as [`ActionOutcome::Unsupported`].
//! The dispatcher keeps no state between calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::Action;
use crate::core::BlockNumber;
use crate::core::BlockType;
use crate::core::Event;
use crate::core::EventId;
use crate::core::PolicyError;
use crate::core::RoleMask;
use crate::core::RuleId;
use crate::core::ScId;
use crate::core::SearchTag;
use crate::core::SecurityService;
use crate::interfaces::BundleMutator;
use crate::interfaces::MutatorError;
use crate::runtime::audit::PolicyDispatchEvent;
use crate::runtime::audit::PolicyDispatchEventParams;
use crate::runtime::engine::PolicyEngine;
use crate::runtime::telemetry::ActionOutcome;
use crate::runtime::telemetry::ActionRecord;
use crate::runtime::telemetry::DispatchStatus;
use crate::runtime::telemetry::SideLabel;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Reason code sent when a report action has no configured code.
pub const DEFAULT_REASON_CODE: u8 = 0;

/// Where in the bundle pipeline the event occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingSide {
    /// Outbound bundle at the security source.
    Sender,
    /// Inbound bundle; the role is verifier or acceptor.
    Receiver(RoleMask),
}

impl ProcessingSide {
    /// Role bits placed in the search tag.
    #[must_use]
    pub const fn roles(self) -> RoleMask {
        match self {
            Self::Sender => RoleMask::SOURCE,
            Self::Receiver(role) => role,
        }
    }

    /// Telemetry label.
    #[must_use]
    pub const fn label(self) -> SideLabel {
        match self {
            Self::Sender => SideLabel::Sender,
            Self::Receiver(_) => SideLabel::Receiver,
        }
    }
}

/// Security operation an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityOperationRef<'a> {
    /// Block number of the security block (BIB or BCB).
    pub block_number: BlockNumber,
    /// Security context id.
    pub sc_id: ScId,
    /// Security source EID.
    pub security_source: Option<&'a str>,
    /// Security service. Not part of the dispatch search tag; only
    /// [`PolicyEngine::sender_rule`] selects by service.
    pub service: SecurityService,
}

/// Outcome of one dispatcher call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Dispatch status.
    pub status: DispatchStatus,
    /// Matched rule id.
    pub rule: Option<RuleId>,
    /// Enabled actions with their outcomes, in execution order.
    pub actions: Vec<(Action, ActionOutcome)>,
}

impl DispatchReport {
    /// Outcome recorded for an action, if it was enabled.
    #[must_use]
    pub fn outcome(&self, action: Action) -> Option<ActionOutcome> {
        self.actions.iter().find(|(enabled, _)| *enabled == action).map(|(_, outcome)| *outcome)
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

impl PolicyEngine {
    /// Handles one security operation event.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NotFound`] when the target is an extension block
    /// the bundle does not contain. Collaborator failures while carrying out
    /// an action are reported as [`ActionOutcome::Failed`], not as errors.
    pub fn handle_event(
        &self,
        mutator: &mut dyn BundleMutator,
        side: ProcessingSide,
        event: EventId,
        sop: Option<&SecurityOperationRef<'_>>,
        target: BlockNumber,
    ) -> Result<DispatchReport, PolicyError> {
        let block_type = resolve_target_type(&*mutator, target)?;
        let bundle_source = mutator.bundle_source();
        let bundle_destination = mutator.bundle_destination();
        let tag = SearchTag {
            bundle_source: bundle_source.as_deref(),
            bundle_destination: bundle_destination.as_deref(),
            security_source: sop.and_then(|sop| sop.security_source),
            block_type: Some(block_type),
            roles: side.roles(),
            sc_id: sop.map(|sop| sop.sc_id),
            event_set: None,
            service: None,
        };

        let report = match self.get_best_match(&tag) {
            None => DispatchReport {
                status: DispatchStatus::NoRule,
                rule: None,
                actions: Vec::new(),
            },
            Some(rule) => {
                let binding = self.rule_event_set(rule).and_then(|set| set.event(event));
                match binding {
                    None => DispatchReport {
                        status: DispatchStatus::NotConfigured,
                        rule: Some(rule.id()),
                        actions: Vec::new(),
                    },
                    Some(binding) => DispatchReport {
                        status: DispatchStatus::Applied,
                        rule: Some(rule.id()),
                        actions: run_actions(mutator, side, binding, sop, target),
                    },
                }
            }
        };

        self.audit.record_dispatch(&PolicyDispatchEvent::new(PolicyDispatchEventParams {
            sop_event: event.name(),
            side: side.label(),
            rule_id: report.rule.map(RuleId::get),
            status: report.status,
            actions: report
                .actions
                .iter()
                .map(|(action, outcome)| ActionRecord::new(*action, *outcome))
                .collect(),
        }));
        Ok(report)
    }
}

/// Resolves the block type of a target block number.
fn resolve_target_type(
    mutator: &dyn BundleMutator,
    target: BlockNumber,
) -> Result<BlockType, PolicyError> {
    if target == BlockNumber::PRIMARY {
        return Ok(BlockType::PRIMARY);
    }
    if target == BlockNumber::PAYLOAD {
        return Ok(BlockType::PAYLOAD);
    }
    mutator
        .block_type(target)
        .ok_or_else(|| PolicyError::NotFound(format!("target block {target} is not in the bundle")))
}

/// Runs every enabled action of `event` in execution order, then reports
/// reserved actions as unsupported.
fn run_actions(
    mutator: &mut dyn BundleMutator,
    side: ProcessingSide,
    event: &Event,
    sop: Option<&SecurityOperationRef<'_>>,
    target: BlockNumber,
) -> Vec<(Action, ActionOutcome)> {
    Action::EXECUTION_ORDER
        .into_iter()
        .chain(Action::RESERVED)
        .filter(|action| event.actions().contains(*action))
        .map(|action| {
            let result = match action {
                Action::RemoveSop => remove_sop(mutator, sop),
                Action::RemoveSopTarget => remove_sop_target(mutator, side, sop, target),
                Action::RemoveAllTargetSops => remove_all_target_sops(mutator, target),
                Action::DoNotForward => do_not_forward(mutator, side),
                Action::ReportReasonCode => mutator
                    .send_status_report(event.reason_code().unwrap_or(DEFAULT_REASON_CODE))
                    .map(|()| ActionOutcome::Applied),
                Action::RequestStorage | Action::OverrideTargetBpcf | Action::OverrideSopBpcf => {
                    Ok(ActionOutcome::Unsupported)
                }
            };
            (action, result.unwrap_or(ActionOutcome::Failed))
        })
        .collect()
}

/// Maps a block-found flag to an outcome.
const fn found(found: bool) -> ActionOutcome {
    if found { ActionOutcome::Applied } else { ActionOutcome::Skipped }
}

/// Deletes the security block itself.
fn remove_sop(
    mutator: &mut dyn BundleMutator,
    sop: Option<&SecurityOperationRef<'_>>,
) -> Result<ActionOutcome, MutatorError> {
    let Some(sop) = sop else {
        return Ok(ActionOutcome::Skipped);
    };
    mutator.delete_block(sop.block_number).map(found)
}

/// Drops the target from the security block. At the sender the target block
/// is also removed; a primary or payload target abandons the bundle instead.
fn remove_sop_target(
    mutator: &mut dyn BundleMutator,
    side: ProcessingSide,
    sop: Option<&SecurityOperationRef<'_>>,
    target: BlockNumber,
) -> Result<ActionOutcome, MutatorError> {
    let Some(sop) = sop else {
        return Ok(ActionOutcome::Skipped);
    };
    if !mutator.detach_target(sop.block_number, target)? {
        return Ok(ActionOutcome::Skipped);
    }
    if side == ProcessingSide::Sender {
        if target.is_structural() {
            mutator.mark_corrupt();
        } else {
            mutator.delete_block(target)?;
        }
    }
    Ok(ActionOutcome::Applied)
}

/// Deletes every security block targeting `target`.
fn remove_all_target_sops(
    mutator: &mut dyn BundleMutator,
    target: BlockNumber,
) -> Result<ActionOutcome, MutatorError> {
    let mut removed = false;
    for block in mutator.security_blocks_targeting(target) {
        removed |= mutator.delete_block(block)?;
    }
    Ok(found(removed))
}

/// Abandons the bundle at the sender; suspends it at the receiver.
fn do_not_forward(
    mutator: &mut dyn BundleMutator,
    side: ProcessingSide,
) -> Result<ActionOutcome, MutatorError> {
    match side {
        ProcessingSide::Sender => mutator.mark_corrupt(),
        ProcessingSide::Receiver(_) => mutator.suspend()?,
    }
    Ok(ActionOutcome::Applied)
}
