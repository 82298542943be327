// crates/aggregation-store-core/tests/lifecycle.rs
// ============================================================================
// Module: Repository Lifecycle Tests
// Description: Start/stop behavior for owned and borrowed sessions.
// Purpose: Ensure startup failures are fatal and only owned sessions are closed.
// Dependencies: aggregation-store-core
// ============================================================================

//! ## Overview
//! A repository adopts a borrowed session and leaves it open at stop, while a
//! session it created through a connector is closed at stop and on a failed
//! start. Any statement the session refuses to prepare aborts start.

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
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;

use aggregation_store_core::AggregationRepository;
use aggregation_store_core::AuditOutcome;
use aggregation_store_core::Exchange;
use aggregation_store_core::InMemoryConnector;
use aggregation_store_core::InMemorySession;
use aggregation_store_core::JsonCodec;
use aggregation_store_core::RepositoryError;
use aggregation_store_core::RepositoryOperation;
use aggregation_store_core::SessionConnector;
use aggregation_store_core::SessionError;
use aggregation_store_core::SessionSource;
use aggregation_store_core::SharedSession;
use aggregation_store_core::StatementKind;
use common::RecordingAuditSink;
use common::RejectingSession;
use common::exchange;
use common::key;
use common::settings_with_prefix;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Connector that hands out a pre-built session.
struct FixedConnector {
    session: Arc<RejectingSession>,
}

impl SessionConnector for FixedConnector {
    fn connect(&self) -> Result<SharedSession, SessionError> {
        Ok(self.session.clone())
    }
}

/// Connector that never connects.
struct UnreachableConnector;

impl SessionConnector for UnreachableConnector {
    fn connect(&self) -> Result<SharedSession, SessionError> {
        Err(SessionError::Connection("no contact points reachable".to_string()))
    }
}

/// Shared connector wrapper so tests can inspect sessions after handing it over.
struct SharedConnector(Arc<InMemoryConnector>);

impl SessionConnector for SharedConnector {
    fn connect(&self) -> Result<SharedSession, SessionError> {
        self.0.connect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn borrowed_session_stays_open_after_stop() {
    let session = Arc::new(InMemorySession::new());
    let repository = AggregationRepository::new(
        settings_with_prefix("orders"),
        JsonCodec::<Exchange>::new(),
        SessionSource::Borrowed(session.clone()),
    )
    .unwrap();
    assert!(!repository.owns_session());

    let running = repository.start().unwrap();
    running.add(&key("k"), exchange("e1", "a")).unwrap();
    running.stop().unwrap();

    assert!(!session.is_closed());
    assert_eq!(session.row_count("aggregation").unwrap(), 1);
}

#[test]
fn owned_session_is_closed_at_stop() {
    let connector = Arc::new(InMemoryConnector::new());
    let repository = AggregationRepository::new(
        settings_with_prefix("orders"),
        JsonCodec::<Exchange>::new(),
        SessionSource::Owned(Box::new(SharedConnector(connector.clone()))),
    )
    .unwrap();
    assert!(repository.owns_session());
    assert_eq!(connector.connect_count(), 0);

    let running = repository.start().unwrap();
    assert_eq!(connector.connect_count(), 1);
    running.add(&key("k"), exchange("e1", "a")).unwrap();
    let stopped = running.stop().unwrap();

    let session = connector.last_session().unwrap();
    assert!(session.is_closed());

    let restarted = stopped.start().unwrap();
    assert_eq!(connector.connect_count(), 2);
    assert!(!connector.last_session().unwrap().is_closed());
    restarted.stop().unwrap();
}

#[test]
fn statement_compile_failure_aborts_start_for_each_kind() {
    for kind in [
        StatementKind::Insert,
        StatementKind::SelectByKey,
        StatementKind::DeleteByKey,
        StatementKind::SelectKeyAndId,
        StatementKind::ConditionalDelete,
    ] {
        let session = Arc::new(RejectingSession {
            inner: Arc::new(InMemorySession::new()),
            reject: kind,
            close_error: None,
        });
        let result = AggregationRepository::new(
            settings_with_prefix("orders"),
            JsonCodec::<Exchange>::new(),
            SessionSource::Borrowed(session.clone()),
        )
        .unwrap()
        .start();

        match result {
            Err(RepositoryError::Startup(message)) => assert!(message.contains(kind.as_str())),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("start succeeded despite rejected {kind}"),
        }
        assert!(!session.inner.is_closed(), "borrowed session closed on failed start");
    }
}

#[test]
fn owned_session_is_closed_when_start_fails() {
    let session = Arc::new(RejectingSession {
        inner: Arc::new(InMemorySession::new()),
        reject: StatementKind::ConditionalDelete,
        close_error: None,
    });
    let sink = Arc::new(RecordingAuditSink::default());
    let result = AggregationRepository::new(
        settings_with_prefix("orders"),
        JsonCodec::<Exchange>::new(),
        SessionSource::Owned(Box::new(FixedConnector {
            session: session.clone(),
        })),
    )
    .unwrap()
    .with_audit_sink(sink.clone())
    .start();

    assert!(matches!(result, Err(RepositoryError::Startup(_))));
    assert!(session.inner.is_closed());
    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, RepositoryOperation::Start);
    assert_eq!(events[0].outcome, AuditOutcome::Error);
}

#[test]
fn close_failure_after_failed_start_is_reported() {
    let session = Arc::new(RejectingSession {
        inner: Arc::new(InMemorySession::new()),
        reject: StatementKind::Insert,
        close_error: Some("socket already reset"),
    });
    let result = AggregationRepository::new(
        settings_with_prefix("orders"),
        JsonCodec::<Exchange>::new(),
        SessionSource::Owned(Box::new(FixedConnector {
            session: session.clone(),
        })),
    )
    .unwrap()
    .start();

    match result {
        Err(RepositoryError::Startup(message)) => {
            assert!(message.contains("insert rejected"));
            assert!(message.contains("close failed"));
            assert!(message.contains("socket already reset"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("start succeeded despite rejected insert"),
    }
    assert!(session.inner.is_closed());
}

#[test]
fn unreachable_backend_is_a_startup_error() {
    let result = AggregationRepository::new(
        settings_with_prefix("orders"),
        JsonCodec::<Exchange>::new(),
        SessionSource::Owned(Box::new(UnreachableConnector)),
    )
    .unwrap()
    .start();
    match result {
        Err(RepositoryError::Startup(message)) => assert!(message.contains("no contact points")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("start succeeded without a session"),
    }
}

#[test]
fn invalid_settings_are_rejected_before_start() {
    let mut settings = settings_with_prefix("orders");
    settings.payload_column = settings.key_column.clone();
    let result = AggregationRepository::new(
        settings,
        JsonCodec::<Exchange>::new(),
        SessionSource::Borrowed(Arc::new(InMemorySession::new())),
    );
    assert!(matches!(result, Err(RepositoryError::Invalid(_))));
}
