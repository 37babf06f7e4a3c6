//! Run Archiver - Command-line interface for the verified run transfer engine.
//!
//! Copies one instrument run to the archive, verifies it and sends the report.
//! Exit codes: 0 when the transfer verified, 1 when it completed but did not
//! verify, 2 when it could not be carried out.

mod logging;

use std::path::PathBuf;
use std::time::Instant;

use archiver_engine::{
    load_settings, Category, CensusRecord, CopyOutcome, CopySet, DriveProfile, EngineError,
    LogStatus, Notifier, Phase, Platform, ProgressCallback, RunId, RunRequest, Settings,
    SmtpNotifier, SourceSelection, TracingNotifier, TransferOrchestrator, TransferResult,
    DEFAULT_CONFIG_FILE, DEFAULT_THREADS,
};
use clap::Parser;
use tracing::{error, info, warn};

/// Run Archiver - copy an instrument run to the archive and verify it
#[derive(Parser, Debug)]
#[command(name = "run-archiver")]
#[command(version = "0.1.0")]
#[command(about = "Copy instrument run data to the archive, verify it and report the result")]
struct Args {
    /// Run identifier, e.g. 202310261058_VZGEN1_VMSC10202
    #[arg(value_name = "RUN_ID")]
    run_id: String,

    /// Categories to copy: raw_data, analysis, output (default: all three)
    #[arg(long = "copy-type", value_name = "TYPE", num_args = 1..)]
    copy_type: Vec<String>,

    /// Copy threads for tools that support them
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_THREADS,
        value_parser = clap::value_parser!(u32).range(1..=128)
    )]
    threads: u32,

    /// Copy from the external hard disk instead of the analysis computer
    #[arg(long)]
    disk: bool,

    /// Copy from the test data root and notify developers only
    #[arg(long)]
    debug: bool,

    /// Settings file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log the report instead of emailing it
    #[arg(long)]
    no_notify: bool,
}

impl Args {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Equivalent command line, quoted in reports so a run can be repeated.
    fn invocation(&self) -> String {
        let mut parts = vec!["run-archiver".to_string(), self.run_id.clone()];
        if !self.copy_type.is_empty() {
            parts.push("--copy-type".to_string());
            parts.extend(self.copy_type.iter().cloned());
        }
        if self.threads != DEFAULT_THREADS {
            parts.push(format!("--threads {}", self.threads));
        }
        if self.disk {
            parts.push("--disk".to_string());
        }
        if self.debug {
            parts.push("--debug".to_string());
        }
        if let Some(config) = &self.config {
            parts.push(format!("--config {}", config.display()));
        }
        if self.no_notify {
            parts.push("--no-notify".to_string());
        }
        parts.join(" ")
    }

    fn source_selection(&self) -> SourceSelection {
        SourceSelection {
            alternate: self.disk,
            debug: self.debug,
        }
    }
}

/// CLI implementation of ProgressCallback, reporting through the log
struct CliProgress {
    start_time: Instant,
}

impl CliProgress {
    fn new() -> Self {
        CliProgress {
            start_time: Instant::now(),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_census(&self, category: Category, phase: Phase, record: &CensusRecord) {
        info!(
            "{} transfer: {}: {} files, {} folders, {}",
            phase,
            category,
            record.files,
            record.folders,
            Self::format_bytes(record.bytes)
        );
    }

    fn on_copy_started(&self, category: Category) {
        info!("Copying {}...", category);
    }

    fn on_copy_completed(&self, outcome: &CopyOutcome) {
        if outcome.classification.is_failure() {
            error!("{}", outcome.message);
        }
    }

    fn on_log_checked(&self, status: &LogStatus) {
        if !status.valid {
            warn!("{} log: {}", status.category, status.reason);
        }
    }

    fn on_run_completed(&self, result: &TransferResult) {
        let elapsed = Self::format_duration(self.start_time.elapsed());
        if result.overall_succeeded {
            info!("Transfer verified for run: {} ({})", result.run_id, elapsed);
        } else {
            let mismatched: Vec<String> = result.mismatched().map(|c| c.to_string()).collect();
            warn!(
                "Transfer NOT verified for run: {} ({}); mismatched: [{}], incomplete logs: {}",
                result.run_id,
                elapsed,
                mismatched.join(", "),
                result.any_log_invalid()
            );
        }
    }

    fn on_run_aborted(&self, error: &EngineError) {
        let elapsed = Self::format_duration(self.start_time.elapsed());
        error!("Transfer aborted after {}: {}", elapsed, error);
    }
}

/// Parse arguments, run the transfer and exit with its status
fn main() {
    let args = Args::parse();

    let context = Context::resolve(&args);
    let log_root = context.as_ref().ok().map(|c| c.profile.log_root.as_path());
    let guard = logging::init_logger(log_root);
    info!("### DATA TRANSFER STARTED ###");

    let exit_code = exit_code(context.and_then(|c| transfer(&args, c)));
    info!("{}", closing_banner(exit_code));

    // process::exit skips destructors; flush the file log first
    drop(guard);
    std::process::exit(exit_code);
}

fn exit_code(outcome: Result<bool, String>) -> i32 {
    match outcome {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(msg) => {
            error!("{}", msg);
            2
        }
    }
}

fn closing_banner(exit_code: i32) -> &'static str {
    match exit_code {
        0 => "### DATA TRANSFER COMPLETED ###",
        1 => "### DATA TRANSFER FAILED VERIFICATION ###",
        _ => "### DATA TRANSFER FAILED ###",
    }
}

/// Everything resolved from the arguments and settings before a run starts.
struct Context {
    run_id: RunId,
    copy_set: CopySet,
    settings: Settings,
    platform: Platform,
    profile: DriveProfile,
}

impl Context {
    fn resolve(args: &Args) -> Result<Self, String> {
        let run_id = RunId::new(args.run_id.as_str()).map_err(|e| e.to_string())?;
        let copy_set = parse_copy_set(&args.copy_type)?;

        let settings = load_settings(&args.config_path()).map_err(|e| e.to_string())?;
        let platform = Platform::detect().map_err(|e| e.to_string())?;
        let profile = settings
            .drive_profile(platform, args.source_selection())
            .map_err(|e| e.to_string())?;

        Ok(Context {
            run_id,
            copy_set,
            settings,
            platform,
            profile,
        })
    }
}

fn parse_copy_set(values: &[String]) -> Result<CopySet, String> {
    if values.is_empty() {
        return Ok(CopySet::all());
    }
    let categories = values
        .iter()
        .map(|v| v.parse::<Category>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    CopySet::new(categories).map_err(|e| e.to_string())
}

fn notifier(args: &Args, settings: &Settings, platform: Platform) -> Box<dyn Notifier> {
    if args.no_notify {
        return Box::new(TracingNotifier);
    }
    let n = &settings.notifier;
    let addressees = n.addressees(platform, args.debug).to_vec();
    info!("Report will be sent to: {}", addressees.join(", "));
    Box::new(SmtpNotifier::new(n.smtp_server.clone(), n.sender.clone(), addressees))
}

/// Main CLI logic - separated for testability
///
/// Returns whether the transfer verified.
#[cfg(test)]
fn run_cli(args: &Args) -> Result<bool, String> {
    transfer(args, Context::resolve(args)?)
}

fn transfer(args: &Args, context: Context) -> Result<bool, String> {
    let Context {
        run_id,
        copy_set,
        settings,
        platform,
        profile,
    } = context;

    info!(
        run = %run_id,
        copy_types = %copy_set.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", "),
        threads = args.threads,
        disk = args.disk,
        debug = args.debug,
        "transfer requested"
    );

    let mut request = RunRequest::new(run_id, copy_set);
    request.threads = args.threads;
    request.invocation = args.invocation();

    let backend = profile.backend();
    let orchestrator =
        TransferOrchestrator::new(request, profile, backend, notifier(args, &settings, platform));

    let progress = CliProgress::new();
    let result = orchestrator
        .run(Some(&progress))
        .map_err(|e| e.to_string())?;

    Ok(result.overall_succeeded)
}
