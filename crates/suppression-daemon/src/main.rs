//! The suppression refresh daemon: wires the store, hub,
//! and engine together and serves the HTTP surface, modeled on
//! `crates/tsa-daemon`'s `main.rs`.

mod config;
mod error;
mod http;
mod logging;
mod metrics;

use clap::Parser;
use config::SuppressionConfig;
use logging::{DiagnosticFormat, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use suppression_engine::{Engine, EngineConfig};
use suppression_hub::Hub;
use suppression_store::Store;

/// The suppression refresh and global suppression daemon.
#[derive(Debug, Parser)]
#[command(about, version=version_info::kumo_version())]
struct Opt {
    /// Path to a `SuppressionConfig` toml file. Defaults are used for
    /// anything the file omits.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to write rotating diagnostic logs to. Logs go to
    /// stdout when unset.
    #[arg(long)]
    diag_log_dir: Option<PathBuf>,

    /// Diagnostic log format.
    #[arg(long, value_enum, default_value = "full")]
    diag_format: DiagnosticFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opt::parse();

    LoggingConfig {
        log_dir: opts.diag_log_dir.clone(),
        format: opts.diag_format,
    }
    .init();

    let config = match &opts.config {
        Some(path) => SuppressionConfig::load(path)?,
        None => {
            let mut config = SuppressionConfig::default();
            if let Ok(token) = std::env::var("OPTIZMO_API_TOKEN") {
                config.optizmo_token = token;
            }
            if let Ok(tz) = std::env::var("SUPPRESSION_TIMEZONE") {
                config.timezone = tz;
            }
            config
        }
    };

    tracing::info!(listen_addr = %config.listen_addr, database_path = %config.database_path, "starting suppression daemon");

    let store = Store::open(&config.database_path)?;

    let hub = Hub::new(store.clone());
    hub.warmup().await?;

    let engine_config = EngineConfig::new(&config.timezone, config.optizmo_token.clone(), config.default_org_id);
    let engine = Engine::new(store, engine_config);
    engine.start().await;

    let state = http::AppState {
        hub,
        engine,
        config: Arc::new(config.clone()),
    };

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "http listener bound");

    axum::serve(listener, router).await?;

    Ok(())
}
