//! Error types for the readiness reporter
//!
//! The aggregation core itself never fails: malformed records, missing
//! records and process table failures are all recovered locally. The errors
//! below cover the edges around it (opening a scoreboard, loading
//! configuration, binding the HTTP listener).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type ReadinessResult<T> = Result<T, ReadinessError>;

/// Top-level error for the library surface
#[derive(Error, Debug)]
pub enum ReadinessError {
    #[error("Scoreboard error: {0}")]
    Scoreboard(#[from] ScoreboardError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Process table error: {0}")]
    ProcessTable(#[from] ProcessTableError),

    #[error("Server error: {message}")]
    Server {
        message: String,
        #[source]
        source: Option<io::Error>,
    },
}

impl ReadinessError {
    pub fn server(message: impl Into<String>, source: io::Error) -> Self {
        ReadinessError::Server {
            message: message.into(),
            source: Some(source),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScoreboardError {
    #[error("scoreboard directory {path} is not accessible: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write status for pid {pid}: {source}")]
    Write {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ProcessTableError {
    /// The host has no supported way of listing processes; callers fall back
    /// to the scoreboard's own key set.
    #[error("process enumeration is not supported on this platform")]
    Unsupported,
    #[error("failed to query process table: {0}")]
    Query(String),
    #[error("failed to run `{command}`: {source}")]
    Command {
        command: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid enumeration mode: {value}. Allowed values: native, ps, scoreboard")]
    InvalidMode { value: String },
    #[error("Invalid bind address: {value}")]
    InvalidBind { value: String },
    #[error("Readiness path must start with '/': {value}")]
    InvalidPath { value: String },
}
