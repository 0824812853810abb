//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and a JSON
//! file, plus helpers that emit one structured line per reclamation event.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs the subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let pid = process::id();

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(env_filter(&log_level));

        let log_dir = PathBuf::from("log");
        let file_layer = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                // Log file name carries environment, PID and start time
                let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
                let file_appender = tracing_appender::rolling::never(
                    &log_dir,
                    format!("{environment}.{pid}.{timestamp}.log"),
                );
                let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                // The writer must outlive every span; keep the guard for the process lifetime
                std::mem::forget(guard);
                Some(
                    fmt::layer()
                        .with_writer(file_writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(env_filter(&log_level)),
                )
            }
            Err(e) => {
                eprintln!("Failed to create log directory {}: {e}", log_dir.display());
                None
            }
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        // Another subscriber (e.g. a test harness) may already be installed
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_dir = %log_dir.display(),
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// `RUST_LOG` when set, otherwise the environment default
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("DISPATCHER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log the outcome of one reclamation phase
pub fn log_reclamation_phase(
    phase: &str,
    candidates: usize,
    deleted: usize,
    failed: usize,
    status: &str,
) {
    tracing::info!(
        phase = %phase,
        candidates = candidates,
        deleted = deleted,
        failed = failed,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "🧹 RECLAMATION_PHASE"
    );
}

/// Log an entity left in place because a re-check contradicted the orphan test
pub fn log_reclamation_skip(phase: &str, entity: &str, id: i64, reason: &str) {
    tracing::warn!(
        phase = %phase,
        entity = %entity,
        id = id,
        reason = %reason,
        timestamp = %Utc::now().to_rfc3339(),
        "⏭️ RECLAMATION_SKIP"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_helpers_do_not_require_subscriber() {
        log_reclamation_phase("orphan_tasks", 3, 2, 1, "completed");
        log_reclamation_skip("orphan_tasks", "exec_context", 7, "still cached");
        log_error("reclamation", "orphan_tasks", "boom", None);
    }
}
