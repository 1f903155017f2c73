//! 日志系统
//!
//! tracing subscriber setup shared by the CLI and the HTTP server

use crate::config::LOG_LEVEL_ENV;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,scoreboard_readiness=debug";

/// Build the log filter
///
/// Precedence: explicit level, then `READINESS_LOG`, then `RUST_LOG`, then
/// the built-in default.
pub fn build_filter(log_level: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = log_level {
        return EnvFilter::try_new(level).with_context(|| format!("invalid log level: {level}"));
    }
    if let Ok(filter) = EnvFilter::try_from_env(LOG_LEVEL_ENV) {
        return Ok(filter);
    }
    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
}

/// 初始化日志系统
///
/// # Arguments
/// * `log_level` - filter directive (`debug`, `warn,scoreboard_readiness=trace`, ...)
/// * `log_file` - also append plain (non-ANSI) output to this file
///
/// # Examples
/// ```no_run
/// use scoreboard_readiness::utils::logger::init_logger;
///
/// init_logger(Some("debug"), None).unwrap();
/// ```
pub fn init_logger(log_level: Option<&str>, log_file: Option<PathBuf>) -> Result<()> {
    let env_filter = build_filter(log_level)?;

    // Probe output goes to stdout, so logs go to stderr
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Arc::new(file))
            .with_target(true)
            .with_ansi(false)
            .with_level(true);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    tracing::debug!("Logger initialized");
    Ok(())
}
