// crates/aggregation-store-core/src/runtime/repository.rs
// ============================================================================
// Module: Aggregation Store Repository
// Description: add/get/confirm/remove/get_keys over a storage session.
// Purpose: Buffer in-flight aggregation results and remove them race-safely.
// Dependencies: serde, thiserror, crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! The repository is a two-state lifecycle. [`AggregationRepository`] holds
//! validated settings, the statement templates, the codec, and the session
//! source; [`AggregationRepository::start`] acquires or adopts a session,
//! compiles every statement, and returns a [`RunningRepository`] that exposes
//! the operations. [`RunningRepository::stop`] closes the session only when
//! the repository created it and hands back the stopped repository.
//!
//! Confirmation resolves an exchange id to its aggregation keys by scanning
//! the fixed prefix and then deletes each match with a compare-and-delete on
//! the exchange id column. A write that replaces the row between the scan and
//! the delete makes the delete a no-op, so only the confirmed version is ever
//! removed. The repository holds no locks of its own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::audit::AuditOutcome;
use crate::audit::NoopAuditSink;
use crate::audit::RepositoryAuditEvent;
use crate::audit::RepositoryAuditEventParams;
use crate::audit::RepositoryAuditSink;
use crate::audit::RepositoryOperation;
use crate::audit::StatementAuditEvent;
use crate::core::AggregateResult;
use crate::core::AggregationKey;
use crate::core::CqlValue;
use crate::core::ExchangeId;
use crate::core::KeyComposer;
use crate::core::RepositorySettings;
use crate::core::ResultIdentity;
use crate::interfaces::CodecContext;
use crate::interfaces::CodecError;
use crate::interfaces::ResultCodec;
use crate::interfaces::RowError;
use crate::interfaces::SessionConnector;
use crate::interfaces::SessionError;
use crate::interfaces::SharedSession;
use crate::runtime::statements::StatementSet;
use crate::runtime::statements::StatementTemplates;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Repository operation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never include payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Backing store connectivity or execution failure.
    #[error("storage error: {0}")]
    Storage(#[from] SessionError),
    /// Result could not be marshalled; nothing was written.
    #[error("encode error: {0}")]
    Encode(String),
    /// Stored payload could not be unmarshalled.
    #[error("decode error: {0}")]
    Decode(String),
    /// Session acquisition or statement compilation failed during start.
    #[error("startup error: {0}")]
    Startup(String),
    /// Settings failed validation.
    #[error("invalid repository settings: {0}")]
    Invalid(String),
}

impl From<RowError> for RepositoryError {
    fn from(error: RowError) -> Self {
        Self::Storage(SessionError::from(error))
    }
}

impl From<CodecError> for RepositoryError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::Encode(message) => Self::Encode(message),
            CodecError::Decode(message) => Self::Decode(message),
        }
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Where the repository gets its session.
pub enum SessionSource {
    /// Externally owned session; adopted at start and never closed.
    Borrowed(SharedSession),
    /// Session created by the connector at start and closed at stop.
    Owned(Box<dyn SessionConnector>),
}

impl SessionSource {
    /// Returns true when the repository owns the session lifecycle.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

/// What a confirmation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfirmOutcome {
    /// Rows whose exchange id matched during the scan.
    pub matched: usize,
    /// Rows removed by the compare-and-delete.
    pub deleted: usize,
    /// Matched rows that changed before the delete and were left in place.
    pub stale: usize,
}

// ============================================================================
// SECTION: Stopped Repository
// ============================================================================

/// A configured repository that has not been started.
pub struct AggregationRepository<C> {
    /// Validated settings.
    settings: RepositorySettings,
    /// Key composer for the fixed prefix.
    composer: KeyComposer,
    /// Statement templates compiled at start.
    templates: StatementTemplates,
    /// Result codec.
    codec: C,
    /// Session source.
    source: SessionSource,
    /// Audit sink.
    audit: Arc<dyn RepositoryAuditSink>,
}

impl<C: ResultCodec> AggregationRepository<C> {
    /// Validates settings and builds the statement templates.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Invalid`] when settings fail validation.
    pub fn new(
        settings: RepositorySettings,
        codec: C,
        source: SessionSource,
    ) -> Result<Self, RepositoryError> {
        let composer =
            KeyComposer::new(&settings).map_err(|err| RepositoryError::Invalid(err.to_string()))?;
        let templates = StatementTemplates::build(&settings, &composer);
        Ok(Self {
            settings,
            composer,
            templates,
            codec,
            source,
            audit: Arc::new(NoopAuditSink),
        })
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn RepositoryAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    /// Returns the statement templates.
    #[must_use]
    pub const fn templates(&self) -> &StatementTemplates {
        &self.templates
    }

    /// Returns true when the repository owns its session.
    #[must_use]
    pub const fn owns_session(&self) -> bool {
        self.source.is_owned()
    }

    /// Acquires or adopts the session and compiles every statement.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Startup`] when the session cannot be opened or
    /// any statement fails to prepare. An owned session is closed on failure.
    pub fn start(self) -> Result<RunningRepository<C>, RepositoryError> {
        let session = match &self.source {
            SessionSource::Borrowed(session) => Arc::clone(session),
            SessionSource::Owned(connector) => match connector.connect() {
                Ok(session) => session,
                Err(err) => {
                    let error = RepositoryError::Startup(err.to_string());
                    self.record(RepositoryOperation::Start, None, None, Err(&error));
                    return Err(error);
                }
            },
        };
        let statements = match StatementSet::compile(session.as_ref(), &self.templates) {
            Ok(statements) => statements,
            Err(err) => {
                let mut message = err.to_string();
                if self.source.is_owned()
                    && let Err(close_err) = session.close()
                {
                    message = format!("{message}; close failed: {close_err}");
                }
                let error = RepositoryError::Startup(message);
                self.record(RepositoryOperation::Start, None, None, Err(&error));
                return Err(error);
            }
        };
        for prepared in statements.all() {
            let template = prepared.template();
            self.audit.record_statement(&StatementAuditEvent::new(
                self.settings.table.to_string(),
                template.kind,
                prepared.native(),
                template.consistency,
            ));
        }
        self.record(RepositoryOperation::Start, None, None, Ok(AuditOutcome::Ok));
        Ok(RunningRepository {
            repository: self,
            session,
            statements,
        })
    }

    /// Emits a repository audit event.
    fn record(
        &self,
        operation: RepositoryOperation,
        aggregation_key: Option<&AggregationKey>,
        exchange_id: Option<&ExchangeId>,
        outcome: Result<AuditOutcome, &RepositoryError>,
    ) {
        self.record_detail(
            operation,
            aggregation_key,
            exchange_id,
            outcome.map(|outcome| (outcome, None)),
        );
    }

    /// Emits an audit event carrying an optional detail on success.
    fn record_detail(
        &self,
        operation: RepositoryOperation,
        aggregation_key: Option<&AggregationKey>,
        exchange_id: Option<&ExchangeId>,
        outcome: Result<(AuditOutcome, Option<String>), &RepositoryError>,
    ) {
        let (outcome, detail) = match outcome {
            Ok(recorded) => recorded,
            Err(error) => (AuditOutcome::Error, Some(error.to_string())),
        };
        self.audit.record(&RepositoryAuditEvent::new(RepositoryAuditEventParams {
            table: self.settings.table.to_string(),
            operation,
            aggregation_key: aggregation_key.map(|key| key.as_str().to_string()),
            exchange_id: exchange_id.map(|id| id.as_str().to_string()),
            outcome,
            detail,
        }));
    }
}

// ============================================================================
// SECTION: Running Repository
// ============================================================================

/// A started repository with a live session and compiled statements.
///
/// # Invariants
/// - Safe to share across threads; every operation takes `&self`.
pub struct RunningRepository<C> {
    /// Stopped-state configuration, returned by [`RunningRepository::stop`].
    repository: AggregationRepository<C>,
    /// Live session.
    session: SharedSession,
    /// Compiled statements.
    statements: StatementSet,
}

impl<C: ResultCodec> RunningRepository<C> {
    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &RepositorySettings {
        &self.repository.settings
    }

    /// Returns the compiled statements.
    #[must_use]
    pub const fn statements(&self) -> &StatementSet {
        &self.statements
    }

    /// Returns the live session.
    #[must_use]
    pub const fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Stores a result under a group key, replacing any previous row.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Encode`] when marshalling fails (nothing is
    /// written) or [`RepositoryError::Storage`] when the insert fails.
    pub fn add(&self, key: &AggregationKey, result: C::Value) -> Result<C::Value, RepositoryError> {
        let outcome = self.insert(key, &result);
        self.repository.record(
            RepositoryOperation::Add,
            Some(key),
            Some(result.exchange_id()),
            outcome.as_ref().map(|()| AuditOutcome::Ok),
        );
        outcome.map(|()| result)
    }

    /// Reads the current result of a group.
    ///
    /// Returns `Ok(None)` when no row exists.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] on read failure or
    /// [`RepositoryError::Decode`] when the stored payload is unreadable.
    pub fn get(&self, key: &AggregationKey) -> Result<Option<C::Value>, RepositoryError> {
        let outcome = self.select(key);
        let exchange_id = outcome.as_ref().ok().and_then(|value| value.as_ref()).map(|value| {
            value.exchange_id()
        });
        self.repository.record(
            RepositoryOperation::Get,
            Some(key),
            exchange_id,
            outcome.as_ref().map(|value| {
                if value.is_some() { AuditOutcome::Ok } else { AuditOutcome::NotFound }
            }),
        );
        outcome
    }

    /// Removes every row under the fixed prefix whose exchange id matches,
    /// unless the row was replaced after the scan.
    ///
    /// Unknown, expired, and already-confirmed ids succeed with zero matches.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] when the scan or a delete fails.
    pub fn confirm(&self, exchange_id: &ExchangeId) -> Result<ConfirmOutcome, RepositoryError> {
        let outcome = self.confirm_matches(exchange_id);
        self.repository.record_detail(
            RepositoryOperation::Confirm,
            None,
            Some(exchange_id),
            outcome.as_ref().map(|outcome| {
                let recorded = if outcome.matched == 0 {
                    AuditOutcome::NotFound
                } else if outcome.deleted == 0 {
                    AuditOutcome::Stale
                } else {
                    AuditOutcome::Ok
                };
                let counters = format!(
                    "matched={} deleted={} stale={}",
                    outcome.matched, outcome.deleted, outcome.stale
                );
                (recorded, Some(counters))
            }),
        );
        outcome
    }

    /// Deletes a group's row unconditionally. Absent rows succeed.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] when the delete fails.
    pub fn remove(&self, key: &AggregationKey) -> Result<(), RepositoryError> {
        let outcome = self.delete(key);
        self.repository.record(
            RepositoryOperation::Remove,
            Some(key),
            None,
            outcome.as_ref().map(|()| AuditOutcome::Ok),
        );
        outcome
    }

    /// Returns the distinct group keys stored under the fixed prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] when the scan fails.
    pub fn get_keys(&self) -> Result<BTreeSet<AggregationKey>, RepositoryError> {
        let outcome = self
            .scan_identities()
            .map(|rows| rows.into_iter().map(|identity| identity.aggregation_key).collect());
        self.repository.record(
            RepositoryOperation::GetKeys,
            None,
            None,
            outcome.as_ref().map(|_| AuditOutcome::Ok),
        );
        outcome
    }

    /// Returns every `(key, exchange id)` pair stored under the fixed prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] when the scan fails.
    pub fn scan(&self) -> Result<Vec<ResultIdentity>, RepositoryError> {
        let outcome = self.scan_identities();
        self.repository.record(
            RepositoryOperation::Scan,
            None,
            None,
            outcome.as_ref().map(|_| AuditOutcome::Ok),
        );
        outcome
    }

    /// Releases an owned session and returns the stopped repository.
    ///
    /// Borrowed sessions are left open.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] when closing an owned session fails.
    pub fn stop(self) -> Result<AggregationRepository<C>, RepositoryError> {
        let outcome = if self.repository.source.is_owned() {
            self.session.close().map_err(RepositoryError::from)
        } else {
            Ok(())
        };
        self.repository.record(
            RepositoryOperation::Stop,
            None,
            None,
            outcome.as_ref().map(|()| AuditOutcome::Ok),
        );
        outcome.map(|()| self.repository)
    }

    // ------------------------------------------------------------------------
    // Statement execution
    // ------------------------------------------------------------------------

    /// Builds the codec context for a key.
    fn context<'a>(&'a self, key: &'a AggregationKey) -> CodecContext<'a> {
        CodecContext {
            table: &self.repository.settings.table,
            aggregation_key: key,
        }
    }

    /// Marshals and upserts a result.
    fn insert(&self, key: &AggregationKey, result: &C::Value) -> Result<(), RepositoryError> {
        let payload = self.repository.codec.marshal(&self.context(key), result)?;
        let mut values = self.repository.composer.compose_key(key);
        values.push(CqlValue::Text(result.exchange_id().as_str().to_string()));
        values.push(CqlValue::Blob(payload));
        let bound = self.statements.insert.bind(values)?;
        self.session.execute(&bound)?;
        Ok(())
    }

    /// Point-reads and unmarshals a result.
    fn select(&self, key: &AggregationKey) -> Result<Option<C::Value>, RepositoryError> {
        let bound = self.statements.select_by_key.bind(self.repository.composer.compose_key(key))?;
        let rows = self.session.execute(&bound)?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let payload = row.get_bytes(self.repository.composer.payload_column().as_str())?;
        let value = self.repository.codec.unmarshal(&self.context(key), payload)?;
        Ok(Some(value))
    }

    /// Deletes a row unconditionally.
    fn delete(&self, key: &AggregationKey) -> Result<(), RepositoryError> {
        let bound = self.statements.delete_by_key.bind(self.repository.composer.compose_key(key))?;
        self.session.execute(&bound)?;
        Ok(())
    }

    /// Scans the fixed prefix for key and exchange id pairs.
    ///
    /// Each row's key is recovered through [`KeyComposer::decompose_key`].
    /// Prefix columns echoed by the session must carry this instance's
    /// values; rows with a foreign prefix are skipped.
    fn scan_identities(&self) -> Result<Vec<ResultIdentity>, RepositoryError> {
        let composer = &self.repository.composer;
        let bound = self.statements.select_key_and_id.bind(composer.prefix_values().to_vec())?;
        let rows = self.session.execute(&bound)?;
        let mut identities = Vec::with_capacity(rows.rows().len());
        for row in rows.rows() {
            let key = row.get_string(composer.key_column().as_str())?;
            let mut values: Vec<CqlValue> = composer
                .prefix_columns()
                .iter()
                .zip(composer.prefix_values())
                .map(|(column, expected)| row.get(column.as_str()).unwrap_or(expected).clone())
                .collect();
            values.push(CqlValue::Text(key.to_string()));
            let Some(aggregation_key) = composer.decompose_key(&values) else {
                continue;
            };
            identities.push(ResultIdentity {
                aggregation_key,
                exchange_id: ExchangeId::new(
                    row.get_string(composer.exchange_id_column().as_str())?,
                ),
            });
        }
        Ok(identities)
    }

    /// Compare-and-deletes every scanned row holding the exchange id.
    fn confirm_matches(&self, exchange_id: &ExchangeId) -> Result<ConfirmOutcome, RepositoryError> {
        let mut outcome = ConfirmOutcome::default();
        for identity in self.scan_identities()? {
            if identity.exchange_id != *exchange_id {
                continue;
            }
            outcome.matched += 1;
            let mut values = self.repository.composer.compose_key(&identity.aggregation_key);
            values.push(CqlValue::Text(exchange_id.as_str().to_string()));
            let bound = self.statements.conditional_delete.bind(values)?;
            match self.session.execute(&bound)?.applied()? {
                Some(true) => outcome.deleted += 1,
                Some(false) => outcome.stale += 1,
                None => {
                    return Err(RepositoryError::Storage(SessionError::Execution(
                        "conditional delete returned no applied flag".to_string(),
                    )));
                }
            }
        }
        Ok(outcome)
    }
}
