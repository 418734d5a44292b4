//! Binary entry point for the scribe CLI.
//!
//! ## Usage
//!
//! ```bash
//! # List what a cache holds
//! scribe inspect .scribe/model.json
//!
//! # Compare the previous run with the current one (exit 1 on differences)
//! scribe diff previous.json current.json --format json
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use scribe::cli::{log_filter, resolve_format, run_diff, run_inspect, EXIT_DIFFERENCES_FOUND};
use scribe::config::{Config, OutputFormat};
use scribe::error::{OutputErrorCode, ScribeError};
use scribe::output::{emit_response, render_diff_text, render_inspect_text, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Inspect and compare scribe model caches.
#[derive(Parser, Debug)]
#[command(name = "scribe", version, about = "Inspect and compare scribe model caches")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Report format (default: from config, else text).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Log level for tracing output (default: RUST_LOG, else config).
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Config file (default: ./scribe.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the declarations stored in a cache.
    Inspect {
        /// Cache file to read.
        cache: PathBuf,
    },
    /// Compare two caches and report what must be regenerated.
    Diff {
        /// Cache from the previous run.
        old: PathBuf,
        /// Cache from the current run.
        new: PathBuf,
    },
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::discover(cli.global.config.as_deref(), Path::new(".")) {
        Ok(config) => config,
        Err(err) => {
            let format = cli.global.format.unwrap_or_default();
            return report_error(&ScribeError::from(err), format);
        }
    };
    let format = resolve_format(cli.global.format, &config);

    let flag = cli.global.log_level.map(LogLevel::to_tracing_level);
    let filter = match log_filter(flag, &config) {
        Ok(filter) => filter,
        Err(err) => return report_error(&err, format),
    };
    init_tracing(filter, config.log.json);

    match execute(&cli.command, format) {
        Ok(code) => code,
        Err(err) => report_error(&err, format),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(filter: EnvFilter, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Execute the CLI command.
fn execute(command: &Command, format: OutputFormat) -> Result<ExitCode, ScribeError> {
    let mut stdout = io::stdout();
    match command {
        Command::Inspect { cache } => {
            let response = run_inspect(cache)?;
            match format {
                OutputFormat::Json => emit_response(&response, &mut stdout)?,
                OutputFormat::Text => render_inspect_text(&response, &mut stdout)?,
            }
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Diff { old, new } => {
            let response = run_diff(old, new)?;
            match format {
                OutputFormat::Json => emit_response(&response, &mut stdout)?,
                OutputFormat::Text => render_diff_text(&response, &mut stdout)?,
            }
            stdout.flush()?;
            if response.has_differences() {
                Ok(ExitCode::from(EXIT_DIFFERENCES_FOUND))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Print an error in the requested format and map it to an exit code.
fn report_error(err: &ScribeError, format: OutputFormat) -> ExitCode {
    let error_code = OutputErrorCode::from(err);
    match format {
        OutputFormat::Json => {
            let _ = emit_response(&ErrorResponse::from_error(err), &mut io::stdout());
            let _ = io::stdout().flush();
        }
        OutputFormat::Text => {
            eprintln!("error: {}", err);
        }
    }
    ExitCode::from(error_code.code())
}
