//! Worker 状态数据模型
//!
//! Worker status records as published to the scoreboard, the normalized
//! per-worker view and the aggregate readiness verdict.

use crate::config::BUSY_MARKER;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Process id of a worker, unique among running workers at enumeration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u32);

impl WorkerId {
    pub const fn new(pid: u32) -> Self {
        Self(pid)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for WorkerId {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(Self)
    }
}

/// Open field mapping exactly as a worker wrote it
pub type RawStatusRecord = Map<String, Value>;

/// Outcome of decoding the bytes stored for one worker
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecord {
    Parsed(RawStatusRecord),
    /// Bytes were present but are not a JSON object (torn write, garbage,
    /// wrong type). Treated as an empty record downstream.
    Unparsable,
}

impl ParsedRecord {
    /// Decode raw scoreboard bytes. Absent and empty inputs decode to an
    /// empty record.
    pub fn from_bytes(bytes: Option<&[u8]>) -> Self {
        let bytes = match bytes {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
            _ => return ParsedRecord::Parsed(Map::new()),
        };

        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(fields)) => ParsedRecord::Parsed(fields),
            _ => ParsedRecord::Unparsable,
        }
    }

    pub fn is_unparsable(&self) -> bool {
        matches!(self, ParsedRecord::Unparsable)
    }

    pub fn into_fields(self) -> RawStatusRecord {
        match self {
            ParsedRecord::Parsed(fields) => fields,
            ParsedRecord::Unparsable => Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerActivity {
    Busy,
    Idle,
}

impl WorkerActivity {
    /// Only the exact busy marker counts as busy; any other code, a
    /// non-string value or no status at all is idle.
    pub fn classify(status: Option<&Value>) -> Self {
        match status {
            Some(Value::String(code)) if code == BUSY_MARKER => WorkerActivity::Busy,
            _ => WorkerActivity::Idle,
        }
    }
}

/// Closed display view of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedWorkerStatus {
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Seconds since the worker last updated its record; may be negative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ss: Option<i64>,
}

impl NormalizedWorkerStatus {
    pub const COLUMNS: [&'static str; 8] = [
        "pid",
        "status",
        "remote_addr",
        "host",
        "method",
        "uri",
        "protocol",
        "ss",
    ];

    /// A worker with nothing known beyond its pid
    pub fn bare(pid: WorkerId) -> Self {
        Self {
            pid: pid.as_u32(),
            status: None,
            remote_addr: None,
            host: None,
            method: None,
            uri: None,
            protocol: None,
            ss: None,
        }
    }

    /// Column values in display order, empty for absent fields
    pub fn columns(&self) -> [String; 8] {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        [
            self.pid.to_string(),
            text(&self.status),
            text(&self.remote_addr),
            text(&self.host),
            text(&self.method),
            text(&self.uri),
            text(&self.protocol),
            self.ss.map(|ss| ss.to_string()).unwrap_or_default(),
        ]
    }
}

/// Aggregate answer to one readiness query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessVerdict {
    /// Epoch seconds at which the reporter started
    pub uptime: i64,
    #[serde(rename = "busyWorkers")]
    pub busy_count: usize,
    #[serde(rename = "idleWorkers")]
    pub idle_count: usize,
    pub stats: Vec<NormalizedWorkerStatus>,
    pub ready: bool,
}

impl ReadinessVerdict {
    pub fn worker_count(&self) -> usize {
        self.busy_count + self.idle_count
    }
}
