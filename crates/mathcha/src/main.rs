//! # Mathcha demo server
//!
//! Serves arithmetic CAPTCHAs over HTTP.
//!
//! ## Architecture
//! ```text
//! Client → /challenge → CaptchaManager → latex → dvipng → /image/{key}
//!        → /verify    → CaptchaManager::check → cleanup
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod routes;
mod state;

use crate::config::AppConfig;
use crate::state::AppState;

/// Mathcha - arithmetic CAPTCHA demo server
#[derive(Parser, Debug)]
#[command(name = "mathcha")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/mathcha.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Working directory for sources and images (overrides config)
    #[arg(long, env = "MATHCHA_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before clap reads env overrides
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("🧮 Starting Mathcha v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    let state = AppState::new(config.clone())?;
    info!(
        work_dir = %config.captcha.work_dir.display(),
        typesetter = %config.captcha.typesetter.display(),
        rasterizer = %config.captcha.rasterizer.display(),
        "✅ CAPTCHA manager ready"
    );

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("🚀 Mathcha listening on {}", config.listen_addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("🛑 Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("👋 Mathcha shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
