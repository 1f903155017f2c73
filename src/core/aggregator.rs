//! Status aggregation
//!
//! Folds the scoreboard records of the enumerated workers into a
//! [`ReadinessVerdict`]. Aggregation has no failure path: every worker id
//! produces exactly one normalized entry, whatever state its record is in.

use crate::core::models::{
    NormalizedWorkerStatus, ParsedRecord, RawStatusRecord, ReadinessVerdict, WorkerActivity,
    WorkerId,
};
use crate::utils::leading_integer;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Read access to raw worker records by pid
pub trait RecordSource {
    fn fetch(&self, id: WorkerId) -> Option<&[u8]>;
}

impl RecordSource for BTreeMap<WorkerId, Vec<u8>> {
    fn fetch(&self, id: WorkerId) -> Option<&[u8]> {
        self.get(&id).map(Vec::as_slice)
    }
}

impl RecordSource for HashMap<WorkerId, Vec<u8>> {
    fn fetch(&self, id: WorkerId) -> Option<&[u8]> {
        self.get(&id).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusAggregator {
    started_at: DateTime<Utc>,
}

impl StatusAggregator {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self { started_at }
    }

    pub fn started_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn aggregate_now<S>(&self, ids: &[WorkerId], source: &S) -> ReadinessVerdict
    where
        S: RecordSource + ?Sized,
    {
        self.aggregate(ids, source, Utc::now())
    }

    pub fn aggregate<S>(&self, ids: &[WorkerId], source: &S, now: DateTime<Utc>) -> ReadinessVerdict
    where
        S: RecordSource + ?Sized,
    {
        let mut busy_count = 0;
        let mut idle_count = 0;
        let mut stats = Vec::with_capacity(ids.len());

        for &id in ids {
            let parsed = ParsedRecord::from_bytes(source.fetch(id));
            if parsed.is_unparsable() {
                debug!(pid = %id, "unparsable scoreboard record, treating worker as idle");
            }
            let fields = parsed.into_fields();

            match WorkerActivity::classify(fields.get("status")) {
                WorkerActivity::Busy => busy_count += 1,
                WorkerActivity::Idle => idle_count += 1,
            }

            stats.push(normalize(id, &fields, now.timestamp()));
        }

        ReadinessVerdict {
            uptime: self.started_at.timestamp(),
            busy_count,
            idle_count,
            stats,
            ready: idle_count > 0,
        }
    }
}

/// Project an open record onto the display fields. `time`, `ppid`,
/// `uptime` and any unknown keys never reach the output.
fn normalize(id: WorkerId, fields: &RawStatusRecord, now: i64) -> NormalizedWorkerStatus {
    let text = |key: &str| fields.get(key).and_then(display_text);

    NormalizedWorkerStatus {
        pid: fields
            .get("pid")
            .and_then(record_pid)
            .unwrap_or_else(|| id.as_u32()),
        status: text("status"),
        remote_addr: text("remote_addr"),
        host: text("host"),
        method: text("method"),
        uri: text("uri"),
        protocol: text("protocol"),
        ss: fields
            .get("time")
            .filter(|time| !time.is_null())
            .map(|time| now.saturating_sub(lenient_timestamp(time))),
    }
}

fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Null | Value::Bool(false) | Value::Array(_) | Value::Object(_) => None,
    }
}

fn record_pid(value: &Value) -> Option<u32> {
    let pid = match value {
        Value::Number(number) => number.as_i64()?,
        Value::String(text) => leading_integer(text)?,
        _ => return None,
    };
    u32::try_from(pid).ok().filter(|pid| *pid > 0)
}

/// Integer seconds from whatever a worker stored; unusable values count as 0
fn lenient_timestamp(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64))
            .unwrap_or(0),
        Value::String(text) => leading_integer(text).unwrap_or(0),
        _ => 0,
    }
}
