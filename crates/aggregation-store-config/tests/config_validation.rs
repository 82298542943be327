//! Config parsing and validation tests for aggregation-store-config.
// crates/aggregation-store-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate defaults, repository settings, and audit pairing.
// Purpose: Ensure invalid configuration fails closed before connecting.
// =============================================================================

use std::fs;

use aggregation_store_config::AggregationStoreConfig;
use aggregation_store_config::AuditSinkKind;
use aggregation_store_config::ConfigError;
use aggregation_store_config::MAX_CONFIG_FILE_SIZE;
use aggregation_store_config::PrefixValueConfig;
use aggregation_store_core::ConsistencyLevel;
use aggregation_store_core::CqlValue;

mod common;

use common::TestResult;
use common::assert_invalid;
use common::minimal_config;

#[test]
fn minimal_config_uses_defaults() -> TestResult {
    let config = minimal_config()?;
    config.validate().map_err(|err| err.to_string())?;
    let settings = config.repository_settings().map_err(|err| err.to_string())?;
    if settings.key_column.as_str() != "aggregation_key"
        || settings.exchange_id_column.as_str() != "exchange_id"
        || settings.payload_column.as_str() != "exchange"
    {
        return Err("default column names were not applied".to_string());
    }
    if settings.read_consistency != ConsistencyLevel::LocalOne
        || settings.write_consistency != ConsistencyLevel::LocalOne
    {
        return Err("default consistency should be local_one".to_string());
    }
    if config.session.backend != "memory" || config.audit.sink != AuditSinkKind::None {
        return Err("default session and audit were not applied".to_string());
    }
    Ok(())
}

#[test]
fn full_config_maps_to_settings() -> TestResult {
    let config = AggregationStoreConfig::from_toml_str(
        r#"
[repository]
table = "camel.aggregation"
key_column = "group_key"
ttl_seconds = 3600
read_consistency = "local_quorum"
write_consistency = "quorum"
fixed_prefix = [
  { column = "repository", value = "orders" },
  { column = "active", value = true },
]

[session]
backend = "sqlite"
[session.options]
path = "aggregation.db"
busy_timeout_ms = 2500
journal_mode = "delete"
"#,
    )
    .map_err(|err| err.to_string())?;
    let settings = config.repository_settings().map_err(|err| err.to_string())?;
    if settings.table.to_string() != "camel.aggregation" || settings.ttl_seconds != Some(3600) {
        return Err("table or ttl not mapped".to_string());
    }
    if settings.read_consistency != ConsistencyLevel::LocalQuorum
        || settings.write_consistency != ConsistencyLevel::Quorum
    {
        return Err("consistency levels not mapped".to_string());
    }
    let values: Vec<&CqlValue> =
        settings.fixed_prefix.columns().iter().map(|column| &column.value).collect();
    if values != vec![&CqlValue::from("orders"), &CqlValue::Boolean(true)] {
        return Err(format!("prefix values not mapped in order: {}", values.len()));
    }
    if config.repository.fixed_prefix[1].value != PrefixValueConfig::Boolean(true) {
        return Err("boolean prefix value not parsed".to_string());
    }
    Ok(())
}

#[test]
fn unknown_fields_are_parse_errors() -> TestResult {
    let result = AggregationStoreConfig::from_toml_str(
        "[repository]\ntable = \"aggregation\"\nkeyspace = \"camel\"\n",
    );
    match result {
        Err(ConfigError::Parse(_)) => Ok(()),
        Err(other) => Err(format!("expected parse error, got {other}")),
        Ok(_) => Err("unknown field accepted".to_string()),
    }
}

#[test]
fn invalid_identifiers_are_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.repository.table = "bad-table".to_string();
    assert_invalid(config.validate(), "repository.table")?;

    let mut config = minimal_config()?;
    config.repository.payload_column = "1payload".to_string();
    assert_invalid(config.validate(), "repository.payload_column")?;
    Ok(())
}

#[test]
fn colliding_columns_are_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.repository.exchange_id_column = "aggregation_key".to_string();
    assert_invalid(config.validate(), "repository")?;

    let config = common::config_from_toml(
        r#"
[repository]
table = "aggregation"
fixed_prefix = [{ column = "exchange", value = "x" }]
"#,
    )?;
    assert_invalid(config.validate(), "repository")?;
    Ok(())
}

#[test]
fn zero_ttl_is_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.repository.ttl_seconds = Some(0);
    assert_invalid(config.validate(), "ttl")?;
    Ok(())
}

#[test]
fn audit_file_sink_requires_path() -> TestResult {
    let mut config = minimal_config()?;
    config.audit.sink = AuditSinkKind::File;
    assert_invalid(config.validate(), "audit.path is required")?;

    config.audit.sink = AuditSinkKind::Stderr;
    config.audit.path = Some("audit.log".into());
    assert_invalid(config.validate(), "only valid for the file sink")?;
    Ok(())
}

#[test]
fn load_reads_file_and_enforces_size_limit() -> TestResult {
    let temp = tempfile::TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("aggregation-store.toml");
    fs::write(&path, common::MINIMAL_TOML).map_err(|err| err.to_string())?;
    AggregationStoreConfig::load(Some(&path)).map_err(|err| err.to_string())?;

    let oversized = temp.path().join("oversized.toml");
    let mut content = common::MINIMAL_TOML.to_string();
    content.push_str(&"#".repeat(MAX_CONFIG_FILE_SIZE));
    fs::write(&oversized, content).map_err(|err| err.to_string())?;
    assert_invalid(AggregationStoreConfig::load(Some(&oversized)), "size limit")?;

    let missing = temp.path().join("missing.toml");
    match AggregationStoreConfig::load(Some(&missing)) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("expected io error, got {other}")),
        Ok(_) => Err("missing file loaded".to_string()),
    }
}

#[test]
fn load_rejects_non_utf8() -> TestResult {
    let temp = tempfile::TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("binary.toml");
    fs::write(&path, [0xff, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_invalid(AggregationStoreConfig::load(Some(&path)), "utf-8")?;
    Ok(())
}

#[test]
fn sqlite_option_values_are_checked_at_validation() -> TestResult {
    let cases = [
        ("path = \"aggregation.db\"\njournal_mode = \"bogus\"", "journal_mode must be wal or delete"),
        ("path = \"aggregation.db\"\nsync_mode = \"off\"", "sync_mode must be full or normal"),
        ("path = \"aggregation.db\"\nbusy_timeout_ms = -5", "busy_timeout_ms must be non-negative"),
        ("path = \"   \"", "session.options.path must be non-empty"),
    ];
    for (options, needle) in cases {
        let config = common::config_from_toml(&format!(
            "[repository]\ntable = \"aggregation\"\n[session]\nbackend = \"sqlite\"\n[session.options]\n{options}\n"
        ))?;
        assert_invalid(config.validate(), needle)?;
    }
    Ok(())
}
