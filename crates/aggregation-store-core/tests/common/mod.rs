// crates/aggregation-store-core/tests/common/mod.rs
// =============================================================================
// Module: Repository Test Helpers
// Description: Shared fixtures for aggregation repository integration tests.
// Purpose: Build repositories, recording sinks, and interleaving sessions.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only fixtures panic on setup failure."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use aggregation_store_core::AggregationKey;
use aggregation_store_core::AggregationRepository;
use aggregation_store_core::BoundStatement;
use aggregation_store_core::ColumnName;
use aggregation_store_core::CqlValue;
use aggregation_store_core::Exchange;
use aggregation_store_core::FixedPrefix;
use aggregation_store_core::InMemorySession;
use aggregation_store_core::JsonCodec;
use aggregation_store_core::PreparedStatement;
use aggregation_store_core::PrefixColumn;
use aggregation_store_core::RepositoryAuditEvent;
use aggregation_store_core::RepositoryAuditSink;
use aggregation_store_core::RepositorySettings;
use aggregation_store_core::ResultSet;
use aggregation_store_core::Row;
use aggregation_store_core::RunningRepository;
use aggregation_store_core::Session;
use aggregation_store_core::SessionError;
use aggregation_store_core::SessionSource;
use aggregation_store_core::SharedSession;
use aggregation_store_core::StatementAuditEvent;
use aggregation_store_core::StatementKind;
use aggregation_store_core::StatementTemplate;
use aggregation_store_core::TableName;
use serde_json::json;

/// Repository type used by most suites.
pub type ExchangeRepository = RunningRepository<JsonCodec<Exchange>>;

/// Settings for table `aggregation` with a single `repository` prefix column.
pub fn settings_with_prefix(prefix: &str) -> RepositorySettings {
    let fixed_prefix = FixedPrefix::new(vec![PrefixColumn::new(
        ColumnName::new("repository").unwrap(),
        prefix,
    )])
    .unwrap();
    RepositorySettings::new(TableName::new("aggregation").unwrap()).with_fixed_prefix(fixed_prefix)
}

/// Starts a repository over a borrowed session.
pub fn start_borrowed(session: SharedSession, settings: RepositorySettings) -> ExchangeRepository {
    AggregationRepository::new(settings, JsonCodec::new(), SessionSource::Borrowed(session))
        .unwrap()
        .start()
        .unwrap()
}

/// Starts a repository over a fresh in-memory session.
pub fn start_in_memory(prefix: &str) -> (Arc<InMemorySession>, ExchangeRepository) {
    let session = Arc::new(InMemorySession::new());
    let repository = start_borrowed(session.clone(), settings_with_prefix(prefix));
    (session, repository)
}

/// Builds an exchange with a string body.
pub fn exchange(id: &str, body: &str) -> Exchange {
    Exchange::new(id, json!(body))
}

/// Builds an aggregation key.
pub fn key(value: &str) -> AggregationKey {
    AggregationKey::new(value)
}

// =============================================================================
// Manual clock
// =============================================================================

/// Clock that only moves when told to.
#[derive(Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Advances the clock.
    pub fn advance_ms(&self, delta: u64) {
        self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }

    /// Returns a session clock reading this manual clock.
    pub fn as_clock(&self) -> Arc<dyn Fn() -> u64 + Send + Sync> {
        let now_ms = Arc::clone(&self.now_ms);
        Arc::new(move || now_ms.load(Ordering::SeqCst))
    }
}

// =============================================================================
// Recording audit sink
// =============================================================================

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub events: Mutex<Vec<RepositoryAuditEvent>>,
    pub statements: Mutex<Vec<StatementAuditEvent>>,
}

impl RepositoryAuditSink for RecordingAuditSink {
    fn record(&self, event: &RepositoryAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn record_statement(&self, event: &StatementAuditEvent) {
        self.statements.lock().unwrap().push(event.clone());
    }
}

// =============================================================================
// Interleaving session
// =============================================================================

/// Hook run once before a chosen statement kind executes.
pub type Hook = Box<dyn FnOnce() + Send>;

/// Session wrapper that runs a hook just before the first execution of a
/// statement kind, modelling a concurrent writer landing between steps.
pub struct InterleavingSession {
    inner: SharedSession,
    trigger: StatementKind,
    hook: Mutex<Option<Hook>>,
}

impl InterleavingSession {
    /// Wraps a session without a hook installed.
    pub fn new(inner: SharedSession, trigger: StatementKind) -> Self {
        Self {
            inner,
            trigger,
            hook: Mutex::new(None),
        }
    }

    /// Installs the hook.
    pub fn set_hook(&self, hook: Hook) {
        *self.hook.lock().unwrap() = Some(hook);
    }
}

impl Session for InterleavingSession {
    fn prepare(&self, template: &StatementTemplate) -> Result<PreparedStatement, SessionError> {
        self.inner.prepare(template)
    }

    fn execute(&self, statement: &BoundStatement) -> Result<ResultSet, SessionError> {
        if statement.template().kind == self.trigger {
            let hook = self.hook.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
        }
        self.inner.execute(statement)
    }
}

// =============================================================================
// Failing session
// =============================================================================

/// Session that refuses to prepare one statement kind.
pub struct RejectingSession {
    pub inner: Arc<InMemorySession>,
    pub reject: StatementKind,
    /// Error returned from `close` after the inner session is closed.
    pub close_error: Option<&'static str>,
}

impl Session for RejectingSession {
    fn prepare(&self, template: &StatementTemplate) -> Result<PreparedStatement, SessionError> {
        if template.kind == self.reject {
            return Err(SessionError::Prepare(format!("{} rejected", template.kind)));
        }
        self.inner.prepare(template)
    }

    fn execute(&self, statement: &BoundStatement) -> Result<ResultSet, SessionError> {
        self.inner.execute(statement)
    }

    fn close(&self) -> Result<(), SessionError> {
        self.inner.close()?;
        match self.close_error {
            Some(message) => Err(SessionError::Connection(message.to_string())),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Foreign row session
// =============================================================================

/// Session that echoes the `repository` prefix column on scans and mixes in
/// extra rows, modelling a backend that leaks rows across prefixes.
pub struct ForeignRowSession {
    pub inner: Arc<InMemorySession>,
    pub extra: Vec<Row>,
}

impl Session for ForeignRowSession {
    fn prepare(&self, template: &StatementTemplate) -> Result<PreparedStatement, SessionError> {
        self.inner.prepare(template)
    }

    fn execute(&self, statement: &BoundStatement) -> Result<ResultSet, SessionError> {
        let result = self.inner.execute(statement)?;
        if statement.template().kind != StatementKind::SelectKeyAndId {
            return Ok(result);
        }
        let prefix = statement.values().first().cloned().unwrap();
        let mut rows: Vec<Row> = result
            .rows()
            .iter()
            .cloned()
            .map(|row| row.with_column("repository", prefix.clone()))
            .collect();
        rows.extend(self.extra.iter().cloned());
        Ok(ResultSet::from_rows(rows))
    }
}

/// Builds a scan row as another prefix would return it.
pub fn scan_row(prefix: &str, key: &str, exchange_id: &str) -> Row {
    Row::new()
        .with_column("repository", CqlValue::from(prefix))
        .with_column("aggregation_key", CqlValue::from(key))
        .with_column("exchange_id", CqlValue::from(exchange_id))
}
