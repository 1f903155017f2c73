//! Worker process enumeration
//!
//! Determines which worker pids are currently children of the supervising
//! process. The process table is the source of truth when it can be read;
//! the scoreboard's own key set is the fallback.
//!
//! Platform strategy:
//! - Linux/macOS: psutil for the native process table
//! - Windows: sysinfo
//! - `ps` command output parsing is available as an explicit mode

#[cfg(unix)]
use psutil::process::processes;

#[cfg(windows)]
use sysinfo::{ProcessesToUpdate, System};

use crate::core::models::WorkerId;
use crate::error::ProcessTableError;
use crate::utils::leading_integer;
use serde::{Deserialize, Serialize};
use std::process::Command;
use tracing::{debug, warn};

/// One row of the process table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessEntry {
    pub parent: u32,
    pub pid: u32,
}

/// Capability to list every process on the host
pub trait ProcessLister: Send + Sync {
    /// `Err(ProcessTableError::Unsupported)` makes the enumerator fall back to
    /// the scoreboard keys; any other error yields an empty worker set.
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcessTableError>;
}

/// How the worker set is determined
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationMode {
    /// Platform process table APIs
    #[default]
    Native,
    /// `ps -e -o ppid,pid` output
    #[serde(rename = "ps")]
    #[value(name = "ps")]
    PsCommand,
    /// Trust the scoreboard keys, no process table query
    Scoreboard,
}

impl std::str::FromStr for EnumerationMode {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(EnumerationMode::Native),
            "ps" => Ok(EnumerationMode::PsCommand),
            "scoreboard" => Ok(EnumerationMode::Scoreboard),
            other => Err(crate::error::ConfigError::InvalidMode {
                value: other.to_string(),
            }),
        }
    }
}

/// Native process table, sorted by pid
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProcessTable;

impl ProcessLister for NativeProcessTable {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcessTableError> {
        let mut entries = list_native()?;
        entries.sort_by_key(|entry| entry.pid);
        Ok(entries)
    }
}

/// Unix implementation using psutil
#[cfg(unix)]
fn list_native() -> Result<Vec<ProcessEntry>, ProcessTableError> {
    let all = processes().map_err(|err| ProcessTableError::Query(err.to_string()))?;

    // Processes can exit between the directory scan and the stat read;
    // those rows are simply dropped.
    Ok(all
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|process| {
            let parent = process.ppid().ok()??;
            Some(ProcessEntry {
                parent,
                pid: process.pid(),
            })
        })
        .collect())
}

/// Windows implementation using a fresh sysinfo snapshot
#[cfg(windows)]
fn list_native() -> Result<Vec<ProcessEntry>, ProcessTableError> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    Ok(system
        .processes()
        .values()
        .filter_map(|process| {
            process.parent().map(|parent| ProcessEntry {
                parent: parent.as_u32(),
                pid: process.pid().as_u32(),
            })
        })
        .collect())
}

#[cfg(not(any(unix, windows)))]
fn list_native() -> Result<Vec<ProcessEntry>, ProcessTableError> {
    Err(ProcessTableError::Unsupported)
}

/// Process table read from `ps` output
#[derive(Debug, Clone)]
pub struct PsCommandTable {
    program: String,
}

impl Default for PsCommandTable {
    fn default() -> Self {
        Self {
            program: "ps".to_string(),
        }
    }
}

impl PsCommandTable {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ProcessLister for PsCommandTable {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcessTableError> {
        if cfg!(windows) {
            return Err(ProcessTableError::Unsupported);
        }

        let command = format!("{} -e -o ppid,pid", self.program);
        let output = Command::new(&self.program)
            .args(["-e", "-o", "ppid,pid"])
            .env("LC_ALL", "C")
            .output()
            .map_err(|source| ProcessTableError::Command {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProcessTableError::Query(format!(
                "`{command}` exited with {}",
                output.status
            )));
        }

        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `ppid pid` rows. Lines that do not start with a digit (the header,
/// blank lines) are skipped; malformed numbers become zero.
pub fn parse_ps_output(output: &str) -> Vec<ProcessEntry> {
    output
        .lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with(|c: char| c.is_ascii_digit()))
        .map(|line| {
            let mut fields = line.splitn(2, char::is_whitespace);
            let parent = fields.next().map(lenient_pid).unwrap_or(0);
            let pid = fields.next().map(lenient_pid).unwrap_or(0);
            ProcessEntry { parent, pid }
        })
        .collect()
}

fn lenient_pid(field: &str) -> u32 {
    leading_integer(field)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(0)
}

/// Determines the candidate worker set for one readiness query
pub struct WorkerEnumerator {
    mode: EnumerationMode,
    lister: Option<Box<dyn ProcessLister>>,
}

impl std::fmt::Debug for WorkerEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerEnumerator")
            .field("mode", &self.mode)
            .finish()
    }
}

impl WorkerEnumerator {
    pub fn new(mode: EnumerationMode) -> Self {
        let lister: Option<Box<dyn ProcessLister>> = match mode {
            EnumerationMode::Native => Some(Box::new(NativeProcessTable)),
            EnumerationMode::PsCommand => Some(Box::new(PsCommandTable::default())),
            EnumerationMode::Scoreboard => None,
        };
        Self { mode, lister }
    }

    /// Query the given process table instead of the built-in ones
    pub fn with_lister(lister: impl ProcessLister + 'static) -> Self {
        Self {
            mode: EnumerationMode::Native,
            lister: Some(Box::new(lister)),
        }
    }

    pub fn mode(&self) -> EnumerationMode {
        self.mode
    }

    /// Children of `supervisor` according to the process table, or
    /// `fallback` verbatim when no table is consulted.
    pub fn enumerate(&self, supervisor: u32, fallback: &[WorkerId]) -> Vec<WorkerId> {
        let Some(lister) = &self.lister else {
            return fallback.to_vec();
        };

        match lister.list_processes() {
            Ok(entries) => entries
                .into_iter()
                .filter(|entry| entry.parent == supervisor)
                .map(|entry| WorkerId::new(entry.pid))
                .collect(),
            Err(ProcessTableError::Unsupported) => {
                debug!("process table unsupported, using scoreboard keys");
                fallback.to_vec()
            }
            Err(err) => {
                warn!(error = %err, "process table query failed, reporting no workers");
                Vec::new()
            }
        }
    }
}

impl Default for WorkerEnumerator {
    fn default() -> Self {
        Self::new(EnumerationMode::default())
    }
}
