// crates/aggregation-store-core/src/audit.rs
// ============================================================================
// Module: Aggregation Store Audit Logging
// Description: Structured audit events for repository operations.
// Purpose: Emit JSON-line audit records without a hard logging dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every repository operation and lifecycle transition produces a
//! [`RepositoryAuditEvent`]; every statement compiled at start produces a
//! [`StatementAuditEvent`] carrying the generated CQL. Events are routed
//! through a [`RepositoryAuditSink`] so deployments can forward them to their
//! own pipeline. Payload bytes are never recorded.

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

use crate::core::ConsistencyLevel;
use crate::core::StatementKind;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Repository operation classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryOperation {
    /// Repository start.
    Start,
    /// Repository stop.
    Stop,
    /// Result insert.
    Add,
    /// Point read.
    Get,
    /// Confirmation by exchange id.
    Confirm,
    /// Unconditional removal.
    Remove,
    /// Key enumeration.
    GetKeys,
    /// Key and exchange id enumeration.
    Scan,
}

/// Operation outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Operation succeeded.
    Ok,
    /// Operation succeeded and found no row.
    NotFound,
    /// Confirmation matched only rows that had already changed.
    Stale,
    /// Operation failed.
    Error,
}

/// Repository audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Backing table.
    pub table: String,
    /// Operation performed.
    pub operation: RepositoryOperation,
    /// Aggregation key when the operation targets one group.
    pub aggregation_key: Option<String>,
    /// Exchange id when known.
    pub exchange_id: Option<String>,
    /// Operation outcome.
    pub outcome: AuditOutcome,
    /// Error message or counters.
    pub detail: Option<String>,
}

/// Inputs for constructing a repository audit event.
#[derive(Debug, Clone)]
pub struct RepositoryAuditEventParams {
    /// Backing table.
    pub table: String,
    /// Operation performed.
    pub operation: RepositoryOperation,
    /// Aggregation key when the operation targets one group.
    pub aggregation_key: Option<String>,
    /// Exchange id when known.
    pub exchange_id: Option<String>,
    /// Operation outcome.
    pub outcome: AuditOutcome,
    /// Error message or counters.
    pub detail: Option<String>,
}

/// Statement compilation audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct StatementAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Backing table.
    pub table: String,
    /// Statement kind.
    pub kind: StatementKind,
    /// Generated CQL text.
    pub cql: String,
    /// Consistency level bound to the statement.
    pub consistency: ConsistencyLevel,
}

impl RepositoryAuditEvent {
    /// Creates a new repository audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RepositoryAuditEventParams) -> Self {
        Self {
            event: "repository_audit",
            timestamp_ms: now_ms(),
            table: params.table,
            operation: params.operation,
            aggregation_key: params.aggregation_key,
            exchange_id: params.exchange_id,
            outcome: params.outcome,
            detail: params.detail,
        }
    }
}

impl StatementAuditEvent {
    /// Creates a new statement audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        kind: StatementKind,
        cql: impl Into<String>,
        consistency: ConsistencyLevel,
    ) -> Self {
        Self {
            event: "statement_prepared",
            timestamp_ms: now_ms(),
            table: table.into(),
            kind,
            cql: cql.into(),
            consistency,
        }
    }
}

/// Returns the current time in milliseconds since the epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for repository events.
pub trait RepositoryAuditSink: Send + Sync {
    /// Record a repository operation event.
    fn record(&self, event: &RepositoryAuditEvent);

    /// Record a statement compilation event.
    fn record_statement(&self, _event: &StatementAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl RepositoryAuditSink for StderrAuditSink {
    fn record(&self, event: &RepositoryAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_statement(&self, event: &StatementAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
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

    /// Serializes and appends one event line.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl RepositoryAuditSink for FileAuditSink {
    fn record(&self, event: &RepositoryAuditEvent) {
        self.append(event);
    }

    fn record_statement(&self, event: &StatementAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl RepositoryAuditSink for NoopAuditSink {
    fn record(&self, _event: &RepositoryAuditEvent) {}
}
