//! Proctor CLI - Command-line interface for Synheart Proctor
//!
//! Commands:
//! - replay: Replay a recorded input event stream into a report (batch mode)
//! - run: Process streaming input from stdin, emitting live status (streaming mode)
//! - validate: Validate input event schema
//! - doctor: Diagnose configuration and environment
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use synheart_proctor::schema::{InputEvent, InputEventAdapter, ValidationIssue, SCHEMA_VERSION};
use synheart_proctor::{
    FileReportSink, ProctorConfig, ProctorError, ReplaySession, SaveReceipt, PRODUCER_NAME,
    PROCTOR_VERSION,
};

/// Proctor - On-device integrity monitoring for proctored sessions
#[derive(Parser)]
#[command(name = "proctor")]
#[command(author = "Synheart AI Inc")]
#[command(version = PROCTOR_VERSION)]
#[command(about = "Turn gaze and focus events into exam integrity reports", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded event stream into a report (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "text")]
        output_format: ReportFormat,

        /// Student identifier printed in the report
        #[arg(long, default_value = "unknown")]
        student_id: String,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Wall-clock instant of timestamp 0 (RFC 3339)
        #[arg(long)]
        started_at: Option<String>,

        /// Stop the session at this timestamp instead of the last event
        #[arg(long)]
        end_ms: Option<i64>,

        /// Also save the text report into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Process streaming input from stdin (streaming mode)
    Run {
        /// Student identifier printed in the report
        #[arg(long, default_value = "unknown")]
        student_id: String,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Wall-clock instant of timestamp 0 (RFC 3339)
        #[arg(long)]
        started_at: Option<String>,

        /// Directory the final report is saved into
        #[arg(long, default_value = ".")]
        report_dir: PathBuf,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate input event schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Engine configuration (JSON), for landmark slot checks
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check that reports can be written here
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum ReportFormat {
    /// Plain-text integrity report
    Text,
    /// JSON summary
    Json,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (proctor.input_event.v1)
    Input,
    /// Engine configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(e);
            ExitCode::FAILURE
        }
    }
}

fn print_error(e: ProctorCliError) {
    eprintln!(
        "{}",
        serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
    );
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<(), ProctorCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            student_id,
            config,
            started_at,
            end_ms,
            report_dir,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            &student_id,
            config.as_deref(),
            started_at.as_deref(),
            end_ms,
            report_dir.as_deref(),
        ),

        Commands::Run {
            student_id,
            config,
            started_at,
            report_dir,
            flush,
        } => cmd_run(
            &student_id,
            config.as_deref(),
            started_at.as_deref(),
            &report_dir,
            flush,
        ),

        Commands::Validate {
            input,
            input_format,
            config,
            json,
        } => cmd_validate(&input, input_format, config.as_deref(), json),

        Commands::Doctor {
            config,
            report_dir,
            json,
        } => cmd_doctor(config.as_deref(), report_dir.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: ReportFormat,
    student_id: &str,
    config: Option<&Path>,
    started_at: Option<&str>,
    end_ms: Option<i64>,
    report_dir: Option<&Path>,
) -> Result<(), ProctorCliError> {
    let config = load_config(config)?;
    let events = read_events(input, input_format)?;

    if events.is_empty() {
        return Err(ProctorCliError::NoEvents);
    }

    let mut session = ReplaySession::start_at(student_id, config, parse_origin(started_at)?)?;
    for event in &events {
        session.push(event)?;
    }
    let report = session.finish(end_ms)?;

    let output_data = match output_format {
        ReportFormat::Text => report,
        ReportFormat::Json => session.summary_json()? + "\n",
    };

    if let Some(dir) = report_dir {
        let receipt = session.controller_mut().save_report(&FileReportSink::new(dir))?;
        tracing::info!(location = %receipt.location, "report saved");
    }

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    student_id: &str,
    config: Option<&Path>,
    started_at: Option<&str>,
    report_dir: &Path,
    flush: bool,
) -> Result<(), ProctorCliError> {
    let config = load_config(config)?;
    let mut session = ReplaySession::start_at(student_id, config, parse_origin(started_at)?)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    // The session is finished and saved even when the stream breaks off
    let streamed = stream_events(&mut session, stdin.lock(), &mut stdout, flush);
    let report = session.finish(None)?;
    let receipt = persist_report(&mut session, &report, report_dir, &mut stdout)?;
    eprintln!("Report saved to {}", receipt.location);

    match streamed? {
        0 => Ok(()),
        rejected => Err(ProctorCliError::RecordsRejected(rejected)),
    }
}

/// Push every input line into the session, emitting live status as NDJSON.
///
/// Malformed or rejected records are reported on stderr and skipped. Returns
/// how many were skipped; I/O errors end the stream.
fn stream_events<R: BufRead, W: Write>(
    session: &mut ReplaySession,
    input: R,
    out: &mut W,
    flush: bool,
) -> Result<usize, ProctorCliError> {
    let mut rejected = 0;

    for (line_num, line) in input.lines().enumerate() {
        let line = line?;
        let pushed = InputEventAdapter::parse_line(&line, line_num + 1).and_then(|event| {
            event.map_or(Ok(None), |event| session.push(&event))
        });

        match pushed {
            Ok(Some(status)) => {
                writeln!(out, "{}", serde_json::to_string(&status)?)?;
                if flush {
                    out.flush()?;
                }
            }
            Ok(None) => {}
            Err(e) => {
                rejected += 1;
                tracing::warn!(line = line_num + 1, error = %e, "record rejected");
                print_error(ProctorCliError::Engine(e));
            }
        }
    }

    Ok(rejected)
}

/// Save the report, falling back to `out` when the sink refuses it
fn persist_report<W: Write>(
    session: &mut ReplaySession,
    report: &str,
    report_dir: &Path,
    out: &mut W,
) -> Result<SaveReceipt, ProctorCliError> {
    match session
        .controller_mut()
        .save_report(&FileReportSink::new(report_dir))
    {
        Ok(receipt) => Ok(receipt),
        Err(e) => {
            tracing::error!(error = %e, "report not saved; writing it to stdout");
            if let Err(write_err) = out.write_all(report.as_bytes()).and_then(|()| out.flush()) {
                tracing::error!(error = %write_err, "report could not be written to stdout");
            }
            Err(e.into())
        }
    }
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    json: bool,
) -> Result<(), ProctorCliError> {
    let config = load_config(config)?;
    let events = read_events(input, input_format)?;

    let results = InputEventAdapter::validate_events(&events, &config.landmarks);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results.iter().map(ValidationIssue::from).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Event {} (index {}): {}",
                    err.event_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.message
                );
            }
        }
    }

    if report.invalid_events > 0 {
        Err(ProctorCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    report_dir: Option<&Path>,
    json: bool,
) -> Result<(), ProctorCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "proctor_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Proctor version {}", PROCTOR_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    if let Some(config_path) = config {
        let check = match fs::read_to_string(config_path) {
            Ok(content) => match ProctorConfig::from_json(&content) {
                Ok(cfg) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid (gaze {} ms, absence {} ms, {} custom tolerances)",
                        cfg.gaze_tolerance_ms,
                        cfg.absence_tolerance_ms,
                        cfg.custom_tolerances_ms.len()
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        };
        checks.push(check);
    }

    if let Some(dir) = report_dir {
        let check = match fs::metadata(dir) {
            Ok(meta) if !meta.is_dir() => DoctorCheck {
                name: "report_dir".to_string(),
                status: CheckStatus::Error,
                message: format!("{} is not a directory", dir.display()),
            },
            Ok(meta) if meta.permissions().readonly() => DoctorCheck {
                name: "report_dir".to_string(),
                status: CheckStatus::Error,
                message: format!("{} is read-only", dir.display()),
            },
            Ok(_) => DoctorCheck {
                name: "report_dir".to_string(),
                status: CheckStatus::Ok,
                message: format!("Reports will be written to {}", dir.display()),
            },
            Err(_) => DoctorCheck {
                name: "report_dir".to_string(),
                status: CheckStatus::Warning,
                message: "Report directory does not exist (created on first save)".to_string(),
            },
        };
        checks.push(check);
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PROCTOR_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Proctor Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ProctorCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), ProctorCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One JSON object per line, timestamps in ms since session start:");
                println!();
                println!("1. frame - Classification result from the vision pipeline");
                println!("   - faces: array of faces, each an array of {{ x, y }} landmarks");
                println!("   - an empty or missing faces array means nobody is in view");
                println!();
                println!("2. page_hidden - The page became hidden (tab switch, minimize)");
                println!();
                println!("3. window_blur - The window lost input focus");
                println!();
                println!("Timestamps must be non-decreasing within a stream.");
            }
        }
        SchemaType::Config => {
            if json_schema {
                println!("{}", get_config_json_schema());
            } else {
                println!("{}", ProctorConfig::default().to_json()?);
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, ProctorCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_events(input: &Path, format: InputFormat) -> Result<Vec<InputEvent>, ProctorCliError> {
    let input_data = read_input(input)?;
    let events = match format {
        InputFormat::Ndjson => InputEventAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => InputEventAdapter::parse_array(&input_data)?,
    };
    Ok(events)
}

fn load_config(path: Option<&Path>) -> Result<ProctorConfig, ProctorCliError> {
    match path {
        Some(path) => Ok(ProctorConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(ProctorConfig::default()),
    }
}

fn parse_origin(started_at: Option<&str>) -> Result<DateTime<Utc>, ProctorCliError> {
    match started_at {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ProctorCliError::InvalidTimestamp(format!("{s}: {e}"))),
        None => Ok(DateTime::<Utc>::default()),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/proctor.input_event.v1.json",
        "title": "proctor.input_event.v1",
        "description": "Synheart Proctor input event schema",
        "type": "object",
        "required": ["schema_version", "timestamp_ms", "kind"],
        "properties": {
            "schema_version": {
                "type": "string",
                "const": SCHEMA_VERSION
            },
            "event_id": { "type": "string" },
            "timestamp_ms": { "type": "integer", "minimum": 0 },
            "kind": {
                "type": "string",
                "enum": ["frame", "page_hidden", "window_blur"]
            },
            "faces": {
                "type": "array",
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["x", "y"],
                        "properties": {
                            "x": { "type": "number" },
                            "y": { "type": "number" },
                            "z": { "type": "number" }
                        }
                    }
                }
            }
        }
    })
    .to_string()
}

fn get_config_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/proctor.config.json",
        "title": "proctor.config",
        "type": "object",
        "properties": {
            "gaze_tolerance_ms": { "type": "integer", "minimum": 1 },
            "absence_tolerance_ms": { "type": "integer", "minimum": 1 },
            "custom_tolerances_ms": {
                "type": "object",
                "additionalProperties": { "type": "integer", "minimum": 0 }
            },
            "horizontal_threshold": { "type": "number", "exclusiveMinimum": 0, "exclusiveMaximum": 0.5 },
            "vertical_threshold": { "type": "number", "exclusiveMinimum": 0, "exclusiveMaximum": 0.5 },
            "max_faces": { "type": "integer", "minimum": 2 },
            "landmarks": {
                "type": "object",
                "properties": {
                    "nose_tip": { "type": "integer" },
                    "left_edge": { "type": "integer" },
                    "right_edge": { "type": "integer" },
                    "chin": { "type": "integer" },
                    "forehead": { "type": "integer" }
                }
            },
            "echo_landmarks": { "type": "boolean" }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum ProctorCliError {
    Io(io::Error),
    Engine(ProctorError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
    InvalidTimestamp(String),
    RecordsRejected(usize),
}

impl From<io::Error> for ProctorCliError {
    fn from(e: io::Error) -> Self {
        ProctorCliError::Io(e)
    }
}

impl From<ProctorError> for ProctorCliError {
    fn from(e: ProctorError) -> Self {
        ProctorCliError::Engine(e)
    }
}

impl From<serde_json::Error> for ProctorCliError {
    fn from(e: serde_json::Error) -> Self {
        ProctorCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ProctorCliError> for CliError {
    fn from(e: ProctorCliError) -> Self {
        match e {
            ProctorCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ProctorCliError::Engine(e) => {
                let (code, hint) = match &e {
                    ProctorError::Validation(_) => (
                        "VALIDATION_ERROR",
                        "Run 'proctor validate' for details",
                    ),
                    ProctorError::ParseError(_) | ProctorError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure input matches proctor.input_event.v1 schema",
                    ),
                    ProctorError::InvalidCategory(_) => (
                        "CATEGORY_ERROR",
                        "Custom category names must not reuse built-in ones",
                    ),
                    ProctorError::InvalidConfig(_) => (
                        "CONFIG_ERROR",
                        "Run 'proctor schema config' for the expected fields",
                    ),
                    ProctorError::PersistenceFailed(_) | ProctorError::Io(_) => (
                        "PERSISTENCE_ERROR",
                        "Check the report directory exists and is writable",
                    ),
                    _ => ("ENGINE_ERROR", "Run 'proctor doctor' to check the setup"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ProctorCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ProctorCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ProctorCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            ProctorCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            ProctorCliError::RecordsRejected(count) => CliError {
                code: "RECORDS_REJECTED".to_string(),
                message: format!("{} records were skipped", count),
                hint: Some("Run 'proctor validate' on the recording".to_string()),
            },
            ProctorCliError::InvalidTimestamp(msg) => CliError {
                code: "INVALID_TIMESTAMP".to_string(),
                message: msg,
                hint: Some("Use RFC 3339, e.g. 2024-01-15T14:00:00Z".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationIssue>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
