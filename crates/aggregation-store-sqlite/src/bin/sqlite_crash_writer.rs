//! `SQLite` crash writer for aggregation durability tests.
// crates/aggregation-store-sqlite/src/bin/sqlite_crash_writer.rs
// ============================================================================
// Binary: SQLite Crash Writer
// Description: Writes aggregation groups then aborts without closing.
// Purpose: Support recovery tests for groups written before a crash.
// Dependencies: aggregation-store-core, aggregation-store-sqlite, serde_json
// ============================================================================

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use aggregation_store_core::AggregationKey;
use aggregation_store_core::AggregationRepository;
use aggregation_store_core::ColumnName;
use aggregation_store_core::Exchange;
use aggregation_store_core::ExchangeId;
use aggregation_store_core::FixedPrefix;
use aggregation_store_core::JsonCodec;
use aggregation_store_core::PrefixColumn;
use aggregation_store_core::RepositorySettings;
use aggregation_store_core::SessionSource;
use aggregation_store_core::TableName;
use aggregation_store_sqlite::SqliteJournalMode;
use aggregation_store_sqlite::SqliteSession;
use aggregation_store_sqlite::SqliteSessionConfig;
use aggregation_store_sqlite::SqliteSyncMode;
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let path = args.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing sqlite path")
    })?;
    let groups: usize = args.next().map_or(Ok(3), |value| value.parse())?;

    let config = SqliteSessionConfig {
        path: PathBuf::from(path),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteJournalMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    };
    let session = Arc::new(SqliteSession::open(config)?);
    let prefix = FixedPrefix::new(vec![PrefixColumn::new(ColumnName::new("repository")?, "crash")])?;
    let settings = RepositorySettings::new(TableName::new("aggregation")?).with_fixed_prefix(prefix);
    let repository = AggregationRepository::new(
        settings,
        JsonCodec::<Exchange>::new(),
        SessionSource::Borrowed(session),
    )?
    .start()?;

    for index in 0 .. groups {
        let key = AggregationKey::new(format!("k{index}"));
        repository.add(&key, Exchange::new(format!("e{index}"), json!({ "index": index })))?;
    }
    repository.confirm(&ExchangeId::new("e0"))?;

    std::process::abort();
}
