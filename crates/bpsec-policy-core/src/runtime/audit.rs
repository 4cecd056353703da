// crates/bpsec-policy-core/src/runtime/audit.rs
// ============================================================================
// Module: Policy Audit Logging
// Description: Structured audit events for policy changes and dispatches.
// Purpose: Emit JSON-line audit records without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every administrative mutation, dispatcher call, and store restore yields
//! one audit record. Sinks serialize records as JSON lines; deployments pick
//! stderr, an append-only file, or nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::runtime::telemetry::ActionRecord;
use crate::runtime::telemetry::DispatchStatus;
use crate::runtime::telemetry::OperationOutcome;
use crate::runtime::telemetry::PolicyOperation;
use crate::runtime::telemetry::SideLabel;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Administrative mutation audit payload.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyChangeEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation performed.
    pub operation: PolicyOperation,
    /// Rule id or event set name the operation addressed.
    pub subject: String,
    /// Operation outcome.
    pub outcome: OperationOutcome,
    /// Error kind label when rejected or failed.
    pub error_kind: Option<&'static str>,
    /// Free-form detail.
    pub detail: Option<String>,
}

/// Dispatcher audit payload.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyDispatchEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Lifecycle event label.
    pub sop_event: &'static str,
    /// Processing side.
    pub side: SideLabel,
    /// Matched rule id.
    pub rule_id: Option<u16>,
    /// Dispatch status.
    pub status: DispatchStatus,
    /// Per-action outcomes in execution order.
    pub actions: Vec<ActionRecord>,
}

/// Store restore audit payload.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyRestoreEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event sets restored.
    pub event_sets: usize,
    /// Rules restored.
    pub rules: usize,
    /// Records skipped as corrupt.
    pub skipped: usize,
}

/// Inputs required to construct a change event.
pub struct PolicyChangeEventParams {
    /// Operation performed.
    pub operation: PolicyOperation,
    /// Rule id or event set name.
    pub subject: String,
    /// Operation outcome.
    pub outcome: OperationOutcome,
    /// Error kind label.
    pub error_kind: Option<&'static str>,
    /// Free-form detail.
    pub detail: Option<String>,
}

/// Inputs required to construct a dispatch event.
pub struct PolicyDispatchEventParams {
    /// Lifecycle event label.
    pub sop_event: &'static str,
    /// Processing side.
    pub side: SideLabel,
    /// Matched rule id.
    pub rule_id: Option<u16>,
    /// Dispatch status.
    pub status: DispatchStatus,
    /// Per-action outcomes.
    pub actions: Vec<ActionRecord>,
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

impl PolicyChangeEvent {
    /// Creates a change event with a consistent timestamp.
    #[must_use]
    pub fn new(params: PolicyChangeEventParams) -> Self {
        Self {
            event: "policy_change",
            timestamp_ms: now_ms(),
            operation: params.operation,
            subject: params.subject,
            outcome: params.outcome,
            error_kind: params.error_kind,
            detail: params.detail,
        }
    }
}

impl PolicyDispatchEvent {
    /// Creates a dispatch event with a consistent timestamp.
    #[must_use]
    pub fn new(params: PolicyDispatchEventParams) -> Self {
        Self {
            event: "policy_dispatch",
            timestamp_ms: now_ms(),
            sop_event: params.sop_event,
            side: params.side,
            rule_id: params.rule_id,
            status: params.status,
            actions: params.actions,
        }
    }
}

impl PolicyRestoreEvent {
    /// Creates a restore event with a consistent timestamp.
    #[must_use]
    pub fn new(event_sets: usize, rules: usize, skipped: usize) -> Self {
        Self {
            event: "policy_restore",
            timestamp_ms: now_ms(),
            event_sets,
            rules,
            skipped,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for policy events.
pub trait PolicyAuditSink: Send + Sync {
    /// Record an administrative mutation.
    fn record_change(&self, _event: &PolicyChangeEvent) {}

    /// Record a dispatcher call.
    fn record_dispatch(&self, _event: &PolicyDispatchEvent) {}

    /// Record a store restore.
    fn record_restore(&self, _event: &PolicyRestoreEvent) {}
}

/// Writes one JSON line.
fn write_line(writer: &mut impl Write, event: &impl Serialize) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
        let _ = writer.flush();
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl PolicyAuditSink for StderrAuditSink {
    fn record_change(&self, event: &PolicyChangeEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_dispatch(&self, event: &PolicyDispatchEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_restore(&self, event: &PolicyRestoreEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes a record under the file lock.
    fn append(&self, event: &impl Serialize) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
        }
    }
}

impl PolicyAuditSink for FileAuditSink {
    fn record_change(&self, event: &PolicyChangeEvent) {
        self.append(event);
    }

    fn record_dispatch(&self, event: &PolicyDispatchEvent) {
        self.append(event);
    }

    fn record_restore(&self, event: &PolicyRestoreEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl PolicyAuditSink for NoopAuditSink {}
