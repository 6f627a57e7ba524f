use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::Subscriber;
use tracing_subscriber::EnvFilter;

use crate::errors::{PatcherError, Result};

pub const LOG_FILE: &str = "patcher.log";
const FILTER_ENV: &str = "OTOSHI_LOG";
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Routes patcher logs to a daily-rolling file under `log_dir`.
///
/// A host that already installed a global subscriber keeps it; patcher events then flow
/// to the host's subscriber and no file is opened.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .map_err(|err| PatcherError::filesystem("create log dir", log_dir, err))?;
    if LOG_GUARD.get().is_some() {
        return Ok(log_dir.to_path_buf());
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = Subscriber::builder()
        .with_env_filter(filter())
        .with_writer(non_blocking)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("global subscriber already set, not writing {}", LOG_FILE);
        return Ok(log_dir.to_path_buf());
    }
    let _ = LOG_GUARD.set(guard);
    Ok(log_dir.to_path_buf())
}

/// `OTOSHI_LOG` wins over `RUST_LOG`; both take standard `EnvFilter` directives.
fn filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
