// crates/query-stats-cli/src/main.rs
// ============================================================================
// Module: Query Stats CLI Entry Point
// Description: Command dispatcher for local ingestion, parsing and config checks.
// Purpose: Run the ingest pipeline outside its event trigger.
// Dependencies: clap, query-stats-cli, query-stats-config, query-stats-core, serde_json
// ============================================================================

//! ## Overview
//! `query-stats ingest` feeds one subscription event (file or stdin) through
//! the pipeline and prints the invocation outcome as JSON. `query-stats
//! parse` turns raw proxy log lines from stdin into JSON records without
//! enrichment or persistence. `query-stats config validate` loads and checks
//! a configuration file. Inputs are size limited before they are read.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use query_stats_cli::runner::RunMode;
use query_stats_cli::runner::build_pipeline;
use query_stats_config::QueryStatsConfig;
use query_stats_core::LogRecordParser;
use query_stats_core::ParseFailurePolicy;
use query_stats_core::ParseReport;
use query_stats_core::ParserSettings;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an event read from a file or stdin.
const MAX_EVENT_BYTES: usize = 8 * 1024 * 1024;
/// Maximum size of raw log text read by `parse`.
const MAX_PARSE_INPUT_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "query-stats", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Process one CloudWatch Logs subscription event.
    Ingest(IngestCommand),
    /// Parse raw proxy log lines from stdin.
    Parse(ParseCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `ingest`.
#[derive(Args, Debug)]
struct IngestCommand {
    /// Config file path (defaults to query-stats.toml or `QUERY_STATS_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Event file; stdin is read when absent.
    #[arg(long, value_name = "PATH")]
    event: Option<PathBuf>,
    /// Skip inventory lookups and keep rows in memory.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
}

/// Arguments for `parse`.
#[derive(Args, Debug)]
struct ParseCommand {
    /// Service name stamped on every record.
    #[arg(long, value_name = "NAME")]
    service_name: Option<String>,
    /// Skip malformed lines instead of failing.
    #[arg(long, action = ArgAction::SetTrue)]
    skip_invalid: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to query-stats.toml or `QUERY_STATS_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
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

/// Errors raised by size-limited reads.
#[derive(Debug)]
enum ReadLimitError {
    /// I/O failure.
    Io(std::io::Error),
    /// Input exceeds the configured limit.
    TooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

impl ReadLimitError {
    /// Renders the error for `source`.
    fn describe(&self, source: &str) -> String {
        match self {
            Self::Io(err) => format!("failed to read {source}: {err}"),
            Self::TooLarge {
                size,
                limit,
            } => format!("{source} is {size} bytes, limit is {limit}"),
        }
    }
}

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
        Commands::Ingest(command) => command_ingest(&command),
        Commands::Parse(command) => command_parse(&command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `ingest`.
fn command_ingest(command: &IngestCommand) -> CliResult<ExitCode> {
    let config = QueryStatsConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let event = match &command.event {
        Some(path) => read_bytes_with_limit(path, MAX_EVENT_BYTES)
            .map_err(|err| CliError::new(err.describe(&path.display().to_string())))?,
        None => read_stdin_with_limit(MAX_EVENT_BYTES)
            .map_err(|err| CliError::new(err.describe("stdin")))?,
    };
    let mode = if command.dry_run { RunMode::DryRun } else { RunMode::Live };
    let pipeline = build_pipeline(&config, mode)
        .map_err(|err| CliError::new(format!("failed to start pipeline: {err}")))?;

    let outcome = pipeline.handle(&event);
    let rendered = serde_json::to_string(&outcome)
        .map_err(|err| CliError::new(format!("failed to render outcome: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(if outcome.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Executes `parse`.
fn command_parse(command: &ParseCommand) -> CliResult<ExitCode> {
    let input = read_stdin_with_limit(MAX_PARSE_INPUT_BYTES)
        .map_err(|err| CliError::new(err.describe("stdin")))?;
    let text = String::from_utf8(input)
        .map_err(|_| CliError::new("stdin must be utf-8".to_string()))?;
    let parser = LogRecordParser::new(parser_settings(command));
    let report = parser.parse(text.lines()).map_err(|err| CliError::new(err.to_string()))?;

    for line in render_records(&report)? {
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    for rejected in &report.rejected {
        write_stderr_line(&format!("skipped: {rejected}"))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `config validate`.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = QueryStatsConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parser settings for the `parse` command.
fn parser_settings(command: &ParseCommand) -> ParserSettings {
    let defaults = ParserSettings::default();
    ParserSettings {
        service_name: command.service_name.clone().unwrap_or(defaults.service_name),
        failure_policy: if command.skip_invalid {
            ParseFailurePolicy::SkipRecord
        } else {
            ParseFailurePolicy::FailBatch
        },
    }
}

/// Renders parsed records as JSON lines.
fn render_records(report: &ParseReport) -> CliResult<Vec<String>> {
    report
        .records
        .iter()
        .map(|record| {
            serde_json::to_string(record)
                .map_err(|err| CliError::new(format!("failed to render record: {err}")))
        })
        .collect()
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    read_with_limit(file, max_bytes)
}

/// Reads stdin while enforcing a hard size limit.
fn read_stdin_with_limit(max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    read_with_limit(std::io::stdin().lock(), max_bytes)
}

/// Reads at most `max_bytes` from `reader`, failing when more is available.
fn read_with_limit<R: Read>(reader: R, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let read_limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let mut bytes = Vec::new();
    reader.take(read_limit).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
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

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
