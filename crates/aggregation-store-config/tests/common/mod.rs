// crates/aggregation-store-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across aggregation-store-config suites.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use aggregation_store_config::AggregationStoreConfig;
use aggregation_store_config::ConfigError;

/// Result type used by config suites.
pub type TestResult = Result<(), String>;

/// Minimal valid configuration text.
pub const MINIMAL_TOML: &str = r#"
[repository]
table = "aggregation"
"#;

/// Parses a TOML string without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<AggregationStoreConfig, String> {
    toml::from_str(toml_str).map_err(|err: toml::de::Error| err.to_string())
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<AggregationStoreConfig, String> {
    config_from_toml(MINIMAL_TOML)
}

/// Asserts that a result failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
