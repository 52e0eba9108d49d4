//! Tracing setup for the docqna server.
//!
//! Events go to stdout and to a log file. Uploads can run for minutes while every chunk is
//! summarized, so the file side is non-blocking and rotated daily under `logs/`, keeping one
//! week of history. `DOCQNA_LOG_FILE` pins logging to a single appended file instead.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_DIR: &str = "logs";
const LOG_PREFIX: &str = "docqna";
const RETAINED_LOG_FILES: usize = 7;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where file logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// One file, appended across restarts.
    Pinned(PathBuf),
    /// Daily files `docqna.<date>.log` in a directory, oldest pruned.
    Rotating { dir: PathBuf, retained: usize },
}

impl LogTarget {
    fn from_env_value(pinned: Option<String>) -> Self {
        match pinned.filter(|value| !value.trim().is_empty()) {
            Some(path) => LogTarget::Pinned(PathBuf::from(path)),
            None => LogTarget::Rotating {
                dir: PathBuf::from(LOG_DIR),
                retained: RETAINED_LOG_FILES,
            },
        }
    }
}

/// Install the stdout and file layers. `RUST_LOG` filters both (default `info`).
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let target = LogTarget::from_env_value(std::env::var("DOCQNA_LOG_FILE").ok());
    if let Some(writer) = open_writer(&target) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Returns `None`, after reporting on stderr, when the target cannot be opened.
fn open_writer(target: &LogTarget) -> Option<NonBlocking> {
    let (non_blocking, guard) = match target {
        LogTarget::Pinned(path) => {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    return None;
                }
            }
        }
        LogTarget::Rotating { dir, retained } => {
            match RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_PREFIX)
                .filename_suffix("log")
                .max_log_files(*retained)
                .build(dir)
            {
                Ok(appender) => tracing_appender::non_blocking(appender),
                Err(err) => {
                    eprintln!("Failed to open log directory {}: {err}", dir.display());
                    return None;
                }
            }
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
