//! Readiness probe handling
//!
//! Framework independent: takes the parts of a request the probe cares
//! about and produces status, content type and body. The HTTP server and
//! the one-shot CLI both go through [`ReadinessProbe::handle`].

use crate::config::{ReadinessConfig, DEFAULT_PATH};
use crate::core::aggregator::StatusAggregator;
use crate::core::models::{NormalizedWorkerStatus, ReadinessVerdict, WorkerId};
use crate::core::process_table::WorkerEnumerator;
use crate::error::ReadinessResult;
use crate::platform;
use crate::scoreboard::{open_scoreboard, Scoreboard, ScoreboardSnapshot};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

static JSON_QUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bjson\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Ok,
    Forbidden,
    ServiceUnavailable,
}

impl ProbeStatus {
    pub fn code(self) -> u16 {
        match self {
            ProbeStatus::Ok => 200,
            ProbeStatus::Forbidden => 403,
            ProbeStatus::ServiceUnavailable => 503,
        }
    }
}

/// The parts of an incoming request the probe looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeRequest {
    pub remote_addr: Option<String>,
    pub query: Option<String>,
}

impl ProbeRequest {
    pub fn wants_json(&self) -> bool {
        self.query
            .as_deref()
            .map(|query| JSON_QUERY.is_match(query))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: ProbeStatus,
    pub content_type: &'static str,
    pub body: String,
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// No scoreboard configured, nothing to aggregate
    NoData { uptime: i64 },
    Verdict(ReadinessVerdict),
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Verdict(verdict) if verdict.ready)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub path: String,
    pub allow: Vec<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            allow: Vec::new(),
        }
    }
}

pub struct ReadinessProbe {
    settings: ProbeSettings,
    scoreboard: Option<Arc<dyn Scoreboard>>,
    enumerator: WorkerEnumerator,
    supervisor_pid: u32,
    aggregator: StatusAggregator,
}

impl std::fmt::Debug for ReadinessProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessProbe")
            .field("settings", &self.settings)
            .field("has_scoreboard", &self.scoreboard.is_some())
            .field("enumerator", &self.enumerator)
            .field("supervisor_pid", &self.supervisor_pid)
            .field("aggregator", &self.aggregator)
            .finish()
    }
}

impl ReadinessProbe {
    pub fn new(
        settings: ProbeSettings,
        scoreboard: Option<Arc<dyn Scoreboard>>,
        enumerator: WorkerEnumerator,
        supervisor_pid: u32,
    ) -> Self {
        Self {
            settings,
            scoreboard,
            enumerator,
            supervisor_pid,
            aggregator: StatusAggregator::started_now(),
        }
    }

    /// Build a probe from configuration, opening the configured scoreboard
    pub fn from_config(config: &ReadinessConfig) -> ReadinessResult<Self> {
        let scoreboard = config.scoreboard.as_ref().map(open_scoreboard).transpose()?;
        let supervisor_pid = config
            .supervisor_pid
            .unwrap_or_else(platform::supervisor_pid);

        Ok(Self::new(
            ProbeSettings {
                path: config.path.clone(),
                allow: config.allow.clone(),
            },
            scoreboard,
            WorkerEnumerator::new(config.mode),
            supervisor_pid,
        ))
    }

    pub fn with_aggregator(mut self, aggregator: StatusAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    pub fn matches(&self, path: &str) -> bool {
        path == self.settings.path
    }

    pub fn allowed(&self, remote_addr: Option<&str>) -> bool {
        if self.settings.allow.is_empty() {
            return true;
        }
        remote_addr
            .map(|addr| self.settings.allow.iter().any(|allowed| allowed == addr))
            .unwrap_or(false)
    }

    pub fn evaluate(&self, now: DateTime<Utc>) -> ProbeOutcome {
        let Some(scoreboard) = &self.scoreboard else {
            return ProbeOutcome::NoData {
                uptime: self.aggregator.started_at().timestamp(),
            };
        };

        let snapshot = scoreboard.fetch_all().unwrap_or_else(|err| {
            warn!(error = %err, "scoreboard read failed, treating it as empty");
            ScoreboardSnapshot::new()
        });
        let known: Vec<WorkerId> = snapshot.keys().copied().collect();
        let workers = self.enumerator.enumerate(self.supervisor_pid, &known);

        ProbeOutcome::Verdict(self.aggregator.aggregate(&workers, &snapshot, now))
    }

    pub fn handle(&self, request: &ProbeRequest) -> ProbeResponse {
        self.handle_at(request, Utc::now())
    }

    pub fn handle_at(&self, request: &ProbeRequest, now: DateTime<Utc>) -> ProbeResponse {
        if !self.allowed(request.remote_addr.as_deref()) {
            return ProbeResponse {
                status: ProbeStatus::Forbidden,
                content_type: CONTENT_TYPE_TEXT,
                body: "Forbidden".to_string(),
            };
        }

        respond(&self.evaluate(now), request.wants_json(), now)
    }
}

/// Turn an outcome into a response. "No data" is always plain text.
pub fn respond(outcome: &ProbeOutcome, json: bool, now: DateTime<Utc>) -> ProbeResponse {
    match outcome {
        ProbeOutcome::NoData { uptime } => ProbeResponse {
            status: ProbeStatus::ServiceUnavailable,
            content_type: CONTENT_TYPE_TEXT,
            body: render_header(*uptime, now),
        },
        ProbeOutcome::Verdict(verdict) => {
            let status = if verdict.ready {
                ProbeStatus::Ok
            } else {
                ProbeStatus::ServiceUnavailable
            };
            if json {
                ProbeResponse {
                    status,
                    content_type: CONTENT_TYPE_JSON,
                    body: render_json(verdict),
                }
            } else {
                ProbeResponse {
                    status,
                    content_type: CONTENT_TYPE_TEXT,
                    body: render_text(verdict, now),
                }
            }
        }
    }
}

fn render_header(uptime: i64, now: DateTime<Utc>) -> String {
    format!("Uptime: {} ({} seconds)\n", uptime, now.timestamp() - uptime)
}

/// Plain-text report: uptime header, counters, separator, column header and
/// one line per worker with trailing whitespace trimmed.
pub fn render_text(verdict: &ReadinessVerdict, now: DateTime<Utc>) -> String {
    let mut body = render_header(verdict.uptime, now);
    body.push_str(&format!("BusyWorkers: {}\n", verdict.busy_count));
    body.push_str(&format!("IdleWorkers: {}\n", verdict.idle_count));
    body.push_str("--\n");
    body.push_str(&NormalizedWorkerStatus::COLUMNS.join(" "));
    for worker in &verdict.stats {
        body.push('\n');
        body.push_str(worker.columns().join(" ").trim_end());
    }
    body
}

pub fn render_json(verdict: &ReadinessVerdict) -> String {
    // Serializing plain structs with string keys cannot fail
    serde_json::to_string(verdict).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process_table::EnumerationMode;
    use crate::scoreboard::InMemoryScoreboard;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_100, 0).single().unwrap()
    }

    fn probe(board: Option<InMemoryScoreboard>, allow: &[&str]) -> ReadinessProbe {
        ReadinessProbe::new(
            ProbeSettings {
                path: "/readiness".to_string(),
                allow: allow.iter().map(|a| a.to_string()).collect(),
            },
            board.map(|b| Arc::new(b) as Arc<dyn Scoreboard>),
            WorkerEnumerator::new(EnumerationMode::Scoreboard),
            1,
        )
        .with_aggregator(StatusAggregator::new(now() - Duration::seconds(100)))
    }

    fn request(query: Option<&str>) -> ProbeRequest {
        ProbeRequest {
            remote_addr: Some("127.0.0.1".to_string()),
            query: query.map(str::to_string),
        }
    }

    #[test]
    fn test_path_matching() {
        let probe = probe(None, &[]);
        assert!(probe.matches("/readiness"));
        assert!(!probe.matches("/readiness/"));
        assert!(!probe.matches("/"));
    }

    #[test]
    fn test_allow_list() {
        let open = probe(None, &[]);
        assert!(open.allowed(None));
        assert!(open.allowed(Some("192.168.1.1")));

        let restricted = probe(None, &["127.0.0.1"]);
        assert!(restricted.allowed(Some("127.0.0.1")));
        assert!(!restricted.allowed(Some("10.0.0.1")));
        assert!(!restricted.allowed(None));
    }

    #[test]
    fn test_forbidden_response() {
        let probe = probe(Some(InMemoryScoreboard::new()), &["10.0.0.1"]);
        let response = probe.handle_at(&request(None), now());
        assert_eq!(response.status, ProbeStatus::Forbidden);
        assert_eq!(response.status.code(), 403);
        assert_eq!(response.content_type, CONTENT_TYPE_TEXT);
        assert_eq!(response.body, "Forbidden");
    }

    #[test]
    fn test_no_scoreboard_is_unavailable() {
        let probe = probe(None, &[]);
        let outcome = probe.evaluate(now());
        assert_eq!(outcome, ProbeOutcome::NoData { uptime: 1_700_000_000 });
        assert!(!outcome.is_ready());

        let response = probe.handle_at(&request(Some("json")), now());
        assert_eq!(response.status.code(), 503);
        assert_eq!(response.content_type, CONTENT_TYPE_TEXT);
        assert_eq!(response.body, "Uptime: 1700000000 (100 seconds)\n");
    }

    #[test]
    fn test_text_report() {
        let board = InMemoryScoreboard::new();
        board.update(
            WorkerId::new(11),
            r#"{"status":"A","time":1700000095,"remote_addr":"10.1.1.1","host":"app","method":"GET","uri":"/","protocol":"HTTP/1.1"}"#,
        );
        board.update(WorkerId::new(12), r#"{"status":"_"}"#);

        let response = probe(Some(board), &[]).handle_at(&request(None), now());
        assert_eq!(response.status, ProbeStatus::Ok);
        assert_eq!(response.content_type, CONTENT_TYPE_TEXT);
        assert_eq!(
            response.body,
            "Uptime: 1700000000 (100 seconds)\n\
             BusyWorkers: 1\n\
             IdleWorkers: 1\n\
             --\n\
             pid status remote_addr host method uri protocol ss\n\
             11 A 10.1.1.1 app GET / HTTP/1.1 5\n\
             12 _"
        );
    }

    #[test]
    fn test_json_report_when_all_busy() {
        let board = InMemoryScoreboard::new();
        board.update(WorkerId::new(11), r#"{"status":"A"}"#);

        let response = probe(Some(board), &[]).handle_at(&request(Some("format=json")), now());
        assert_eq!(response.status, ProbeStatus::ServiceUnavailable);
        assert_eq!(response.content_type, CONTENT_TYPE_JSON);

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "uptime": 1_700_000_000,
                "busyWorkers": 1,
                "idleWorkers": 0,
                "stats": [{"pid": 11, "status": "A"}],
                "ready": false
            })
        );
    }

    #[test]
    fn test_json_query_matching() {
        assert!(request(Some("json")).wants_json());
        assert!(request(Some("a=1&json")).wants_json());
        assert!(request(Some("format=json")).wants_json());
        assert!(!request(Some("jsonp=1")).wants_json());
        assert!(!request(Some("")).wants_json());
        assert!(!request(None).wants_json());
    }

    #[test]
    fn test_empty_scoreboard_is_not_ready() {
        let response = probe(Some(InMemoryScoreboard::new()), &[]).handle_at(&request(None), now());
        assert_eq!(response.status.code(), 503);
        assert!(response
            .body
            .ends_with("BusyWorkers: 0\nIdleWorkers: 0\n--\npid status remote_addr host method uri protocol ss"));
    }
}
