// crates/aggregation-store-core/tests/statements.rs
// ============================================================================
// Module: Statement Set Tests
// Description: Template derivation, CQL rendering, and consistency routing.
// Purpose: Ensure every statement is built from the same column ordering.
// Dependencies: aggregation-store-core
// ============================================================================

//! ## Overview
//! Checks the CQL text of each template, that time-to-live appears only on
//! inserts, and that reads and writes reach the session at their own
//! consistency levels.

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

use aggregation_store_core::ColumnName;
use aggregation_store_core::ConsistencyLevel;
use aggregation_store_core::CqlValue;
use aggregation_store_core::ExchangeId;
use aggregation_store_core::FixedPrefix;
use aggregation_store_core::InMemorySession;
use aggregation_store_core::KeyComposer;
use aggregation_store_core::PrefixColumn;
use aggregation_store_core::RepositorySettings;
use aggregation_store_core::SessionError;
use aggregation_store_core::StatementKind;
use aggregation_store_core::StatementTemplates;
use aggregation_store_core::TableName;
use common::exchange;
use common::key;
use common::settings_with_prefix;
use common::start_borrowed;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn two_column_settings() -> RepositorySettings {
    let prefix = FixedPrefix::new(vec![
        PrefixColumn::new(ColumnName::new("tenant").unwrap(), "acme"),
        PrefixColumn::new(ColumnName::new("route").unwrap(), "orders"),
    ])
    .unwrap();
    let mut settings = RepositorySettings::new(TableName::new("camel.aggregation").unwrap())
        .with_fixed_prefix(prefix)
        .with_ttl_seconds(3600);
    settings.read_consistency = ConsistencyLevel::LocalQuorum;
    settings.write_consistency = ConsistencyLevel::All;
    settings
}

fn templates_for(settings: &RepositorySettings) -> StatementTemplates {
    StatementTemplates::build(settings, &KeyComposer::new(settings).unwrap())
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

#[test]
fn templates_render_cql() {
    let templates = templates_for(&two_column_settings());
    assert_eq!(
        templates.insert.cql(),
        "INSERT INTO camel.aggregation(tenant,route,aggregation_key,exchange_id,exchange) VALUES \
         (?,?,?,?,?) USING TTL 3600"
    );
    assert_eq!(
        templates.select_by_key.cql(),
        "SELECT tenant,route,aggregation_key,exchange_id,exchange FROM camel.aggregation WHERE \
         tenant=? AND route=? AND aggregation_key=?"
    );
    assert_eq!(
        templates.delete_by_key.cql(),
        "DELETE FROM camel.aggregation WHERE tenant=? AND route=? AND aggregation_key=?"
    );
    assert_eq!(
        templates.select_key_and_id.cql(),
        "SELECT aggregation_key,exchange_id FROM camel.aggregation WHERE tenant=? AND route=?"
    );
    assert_eq!(
        templates.conditional_delete.cql(),
        "DELETE FROM camel.aggregation WHERE tenant=? AND route=? AND aggregation_key=? IF \
         exchange_id=?"
    );
}

#[test]
fn prefix_scan_without_prefix_has_no_filter() {
    let settings = RepositorySettings::new(TableName::new("aggregation").unwrap());
    let templates = templates_for(&settings);
    assert_eq!(templates.select_key_and_id.cql(), "SELECT aggregation_key,exchange_id FROM aggregation");
    assert_eq!(templates.insert.cql(), "INSERT INTO aggregation(aggregation_key,exchange_id,exchange) VALUES (?,?,?)");
}

#[test]
fn ttl_is_only_applied_to_inserts() {
    let templates = templates_for(&two_column_settings());
    for template in templates.all() {
        let expected = (template.kind == StatementKind::Insert).then_some(3600);
        assert_eq!(template.ttl_seconds, expected, "{}", template.kind);
    }
}

#[test]
fn reads_and_writes_carry_their_own_consistency() {
    let templates = templates_for(&two_column_settings());
    for template in templates.all() {
        let expected = if template.kind.is_read() {
            ConsistencyLevel::LocalQuorum
        } else {
            ConsistencyLevel::All
        };
        assert_eq!(template.consistency, expected, "{}", template.kind);
    }
}

// ============================================================================
// SECTION: Execution
// ============================================================================

#[test]
fn session_observes_configured_consistency_per_category() {
    let session = Arc::new(InMemorySession::new());
    let mut settings = settings_with_prefix("orders");
    settings.read_consistency = ConsistencyLevel::One;
    settings.write_consistency = ConsistencyLevel::Quorum;
    let repository = start_borrowed(session.clone(), settings);

    repository.add(&key("k"), exchange("e1", "a")).unwrap();
    repository.get(&key("k")).unwrap();
    repository.get_keys().unwrap();
    repository.confirm(&ExchangeId::new("e1")).unwrap();
    repository.remove(&key("k")).unwrap();

    let usage = session.usage().unwrap();
    let observed: Vec<_> = usage.keys().copied().collect();
    assert_eq!(
        observed,
        vec![
            (StatementKind::Insert, ConsistencyLevel::Quorum),
            (StatementKind::SelectByKey, ConsistencyLevel::One),
            (StatementKind::DeleteByKey, ConsistencyLevel::Quorum),
            (StatementKind::SelectKeyAndId, ConsistencyLevel::One),
            (StatementKind::ConditionalDelete, ConsistencyLevel::Quorum),
        ]
    );
    assert_eq!(usage[&(StatementKind::SelectKeyAndId, ConsistencyLevel::One)], 2);
}

#[test]
fn binding_checks_arity_and_types() {
    let session = Arc::new(InMemorySession::new());
    let repository = start_borrowed(session, settings_with_prefix("orders"));
    let delete = &repository.statements().delete_by_key;

    let too_few = delete.bind(vec![CqlValue::from("orders")]);
    assert!(matches!(too_few, Err(SessionError::Execution(_))));

    let wrong_type = delete.bind(vec![CqlValue::from("orders"), CqlValue::Blob(vec![1])]);
    assert!(matches!(wrong_type, Err(SessionError::Execution(_))));

    assert!(delete.bind(vec![CqlValue::from("orders"), CqlValue::from("k")]).is_ok());
}
