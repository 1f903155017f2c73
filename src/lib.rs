//! Scoreboard Readiness Library
//!
//! Decides whether a pre-forking server is ready for traffic by reading the
//! worker scoreboard, reconciling it against the live process table and
//! counting idle workers.

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod platform;
pub mod readiness;
pub mod scoreboard;
pub mod server;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::core::aggregator::{RecordSource, StatusAggregator};
pub use crate::core::models::{
    NormalizedWorkerStatus, ParsedRecord, RawStatusRecord, ReadinessVerdict, WorkerActivity,
    WorkerId,
};
pub use crate::core::process_table::{
    EnumerationMode, NativeProcessTable, ProcessEntry, ProcessLister, PsCommandTable,
    WorkerEnumerator,
};
pub use error::{ReadinessError, ReadinessResult, ScoreboardError};
pub use readiness::{ProbeOutcome, ProbeRequest, ProbeResponse, ProbeStatus, ReadinessProbe};
pub use scoreboard::{DirectoryScoreboard, InMemoryScoreboard, Scoreboard, ScoreboardSnapshot};
