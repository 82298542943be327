// crates/aggregation-store-cli/src/main.rs
// ============================================================================
// Module: Aggregation Store CLI Entry Point
// Description: Operator commands for inspecting and repairing aggregation state.
// Purpose: Run recovery sweeps and manual confirms against a configured store.
// Dependencies: clap, aggregation-store-config, aggregation-store-core, serde_json
// ============================================================================

//! ## Overview
//! The aggregation store CLI opens the repository described by a config file,
//! runs one operation, and stops the repository again. Results are written to
//! stdout as JSON lines; errors go to stderr with a failure exit code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use aggregation_store_config::AggregationStoreConfig;
use aggregation_store_config::build_repository;
use aggregation_store_core::AggregationKey;
use aggregation_store_core::ConfirmOutcome;
use aggregation_store_core::Exchange;
use aggregation_store_core::ExchangeId;
use aggregation_store_core::JsonCodec;
use aggregation_store_core::RunningRepository;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "aggregation-store", disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List in-flight aggregation keys with their exchange ids.
    Keys(ConfigArgs),
    /// Print the stored exchange for a key.
    Get(KeyCommand),
    /// Confirm an exchange id, deleting rows that still hold it.
    Confirm(ConfirmCommand),
    /// Remove the row for a key unconditionally.
    Remove(KeyCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigArgs),
}

/// Shared config path argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to aggregation-store.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for commands addressing one aggregation key.
#[derive(Args, Debug)]
struct KeyCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Aggregation key.
    #[arg(value_name = "KEY")]
    key: String,
}

/// Arguments for `confirm`.
#[derive(Args, Debug)]
struct ConfirmCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Exchange id to confirm.
    #[arg(value_name = "EXCHANGE_ID")]
    exchange_id: String,
}

// ============================================================================
// SECTION: Output Records
// ============================================================================

/// `get` output line.
#[derive(Serialize)]
struct GetRecord<'a> {
    /// Requested key.
    aggregation_key: &'a str,
    /// Whether a row was present.
    found: bool,
    /// Stored exchange, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    exchange: Option<Exchange>,
}

/// `confirm` output line.
#[derive(Serialize)]
struct ConfirmRecord<'a> {
    /// Confirmed exchange id.
    exchange_id: &'a str,
    /// Confirmation counters.
    #[serde(flatten)]
    outcome: ConfirmOutcome,
}

/// `remove` output line.
#[derive(Serialize)]
struct RemoveRecord<'a> {
    /// Removed key.
    aggregation_key: &'a str,
    /// Always true on success; removal of an absent key is not an error.
    removed: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Repository type driven by the CLI.
type ExchangeRepository = RunningRepository<JsonCodec<Exchange>>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Keys(args) => command_keys(&args),
        Commands::Get(command) => command_get(&command),
        Commands::Confirm(command) => command_confirm(&command),
        Commands::Remove(command) => command_remove(&command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(args) => command_config_validate(&args),
        },
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `keys`.
fn command_keys(args: &ConfigArgs) -> CliResult<ExitCode> {
    with_repository(args.config.as_deref(), |repository| {
        let identities = repository
            .scan()
            .map_err(|err| CliError::new(format!("scan failed: {err}")))?;
        for identity in &identities {
            write_json_line(identity)?;
        }
        Ok(ExitCode::SUCCESS)
    })
}

/// Executes `get`.
fn command_get(command: &KeyCommand) -> CliResult<ExitCode> {
    with_repository(command.config.config.as_deref(), |repository| {
        let exchange = repository
            .get(&AggregationKey::new(command.key.as_str()))
            .map_err(|err| CliError::new(format!("get failed: {err}")))?;
        write_json_line(&GetRecord {
            aggregation_key: &command.key,
            found: exchange.is_some(),
            exchange,
        })?;
        Ok(ExitCode::SUCCESS)
    })
}

/// Executes `confirm`.
fn command_confirm(command: &ConfirmCommand) -> CliResult<ExitCode> {
    with_repository(command.config.config.as_deref(), |repository| {
        let outcome = repository
            .confirm(&ExchangeId::new(command.exchange_id.as_str()))
            .map_err(|err| CliError::new(format!("confirm failed: {err}")))?;
        write_json_line(&ConfirmRecord {
            exchange_id: &command.exchange_id,
            outcome,
        })?;
        Ok(ExitCode::SUCCESS)
    })
}

/// Executes `remove`.
fn command_remove(command: &KeyCommand) -> CliResult<ExitCode> {
    with_repository(command.config.config.as_deref(), |repository| {
        repository
            .remove(&AggregationKey::new(command.key.as_str()))
            .map_err(|err| CliError::new(format!("remove failed: {err}")))?;
        write_json_line(&RemoveRecord {
            aggregation_key: &command.key,
            removed: true,
        })?;
        Ok(ExitCode::SUCCESS)
    })
}

/// Executes `config validate`.
fn command_config_validate(args: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(args.config.as_deref())?;
    write_stdout_line("config valid").map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads configuration, mapping failures to CLI errors.
fn load_config(path: Option<&Path>) -> CliResult<AggregationStoreConfig> {
    AggregationStoreConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Starts the configured repository, runs `action`, and stops it.
fn with_repository<T>(
    path: Option<&Path>,
    action: impl FnOnce(&ExchangeRepository) -> CliResult<T>,
) -> CliResult<T> {
    let config = load_config(path)?;
    let repository = build_repository(&config, JsonCodec::<Exchange>::new())
        .map_err(|err| CliError::new(format!("failed to build repository: {err}")))?
        .start()
        .map_err(|err| CliError::new(format!("failed to start repository: {err}")))?;
    let result = action(&repository);
    let stopped = repository
        .stop()
        .map(|_| ())
        .map_err(|err| CliError::new(format!("failed to stop repository: {err}")));
    let value = result?;
    stopped?;
    Ok(value)
}

/// Serializes a record as one JSON line on stdout.
fn write_json_line<T: Serialize>(value: &T) -> CliResult<()> {
    let line = serde_json::to_string(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    write_stdout_line(&line).map_err(|err| output_error("stdout", &err))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write to {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
