//! readiness 命令行参数
//!
//! clap definitions for `probe` and `serve` plus the overlay of flags onto
//! loaded configuration

use crate::config::{ReadinessConfig, ScoreboardSource};
use crate::core::process_table::EnumerationMode;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "readiness",
    version,
    about = "Report whether a pre-forking server has idle workers to take traffic"
)]
pub struct Cli {
    /// Configuration file (toml, json or yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `warn,scoreboard_readiness=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Evaluate readiness once and print the report (exit 0 when ready)
    Probe {
        /// Print the JSON report instead of plain text
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Serve the readiness endpoint over HTTP
    Serve {
        /// Listen address
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
        /// Request path answered by the probe
        #[arg(long)]
        path: Option<String>,
        /// Remote address allowed to query the probe (repeatable)
        #[arg(long = "allow", value_name = "ADDR")]
        allow: Vec<String>,
        #[command(flatten)]
        source: SourceArgs,
    },
}

/// Where the scoreboard lives and how workers are enumerated
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceArgs {
    /// Directory scoreboard with one `status_<pid>` file per worker
    #[arg(long, value_name = "DIR")]
    pub scoreboard_dir: Option<PathBuf>,

    /// Worker enumeration mode
    #[arg(long, value_enum)]
    pub mode: Option<EnumerationMode>,

    /// Parent pid of the workers (defaults to the parent of this process)
    #[arg(long, value_name = "PID")]
    pub supervisor_pid: Option<u32>,
}

impl SourceArgs {
    /// Overlay the flags that were given on top of loaded configuration
    pub fn apply(&self, config: &mut ReadinessConfig) {
        if let Some(path) = &self.scoreboard_dir {
            config.scoreboard = Some(ScoreboardSource::Directory { path: path.clone() });
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(pid) = self.supervisor_pid {
            config.supervisor_pid = Some(pid);
        }
    }
}

impl Cli {
    /// 尝试解析命令行参数（用于测试或自定义 argv）
    pub fn try_parse_args_from<I, T>(iter: I) -> Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(iter)
    }

    /// Load configuration and apply command line overrides
    pub fn resolve_config(&self) -> Result<ReadinessConfig, crate::error::ConfigError> {
        let mut config = ReadinessConfig::load(self.config.as_deref())?;

        match &self.command {
            Commands::Probe { source, .. } => source.apply(&mut config),
            Commands::Serve {
                bind,
                path,
                allow,
                source,
            } => {
                source.apply(&mut config);
                if let Some(bind) = bind {
                    config.bind = bind.clone();
                }
                if let Some(path) = path {
                    config.path = path.clone();
                }
                if !allow.is_empty() {
                    config.allow = allow.clone();
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}
