use crate::core::process_table::EnumerationMode;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_PATH: &str = "/readiness";
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
/// Status code a worker publishes while it is handling a request.
pub const BUSY_MARKER: &str = "A";
/// Directory scoreboards keep one `status_<pid>` file per worker.
pub const STATUS_FILE_PREFIX: &str = "status_";

pub const ENV_PREFIX: &str = "READINESS";
pub const LOG_LEVEL_ENV: &str = "READINESS_LOG";

/// Where worker status records are read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreboardSource {
    Directory { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Request path answered by the probe
    pub path: String,
    /// Remote addresses allowed to query the probe; empty allows everyone
    pub allow: Vec<String>,
    /// No scoreboard means the probe always reports "no data"
    pub scoreboard: Option<ScoreboardSource>,
    pub mode: EnumerationMode,
    /// Parent pid of the workers; defaults to the parent of this process
    pub supervisor_pid: Option<u32>,
    pub bind: String,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            allow: Vec::new(),
            scoreboard: None,
            mode: EnumerationMode::default(),
            supervisor_pid: None,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl ReadinessConfig {
    /// Load configuration from an optional file (toml, json or yaml, picked by
    /// extension) overlaid with `READINESS_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `READINESS_SCOREBOARD__KIND=directory` and
    /// `READINESS_SCOREBOARD__PATH=/var/run/app/scoreboard`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("allow")
                .try_parsing(true),
        );

        let loaded: ReadinessConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath {
                value: self.path.clone(),
            });
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| ConfigError::InvalidBind {
            value: self.bind.clone(),
        })
    }
}
