use std::env;
use std::fs;
use std::path::Path;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Master log of every run, kept in the configured log root.
pub const LOG_FILE_NAME: &str = "run-archiver.log";

/// Install stdout logging and, when `log_dir` is usable, an appending file log.
///
/// The returned guard flushes the file log when dropped; keep it alive for the
/// whole process.
pub fn init_logger(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let mut file_error = None;
    let (file_layer, guard) = match log_dir {
        Some(dir) => match fs::create_dir_all(dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                file_error = Some((dir.to_path_buf(), e));
                (None, None)
            }
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_ansi(true),
        )
        .with(file_layer)
        .with(filter_layer)
        .init();

    match (log_dir, file_error) {
        (_, Some((dir, e))) => {
            warn!(log_root = %dir.display(), error = %e, "file logging disabled")
        }
        (Some(dir), None) => info!(log = %dir.join(LOG_FILE_NAME).display(), "logging to file"),
        (None, None) => {}
    }

    guard
}
