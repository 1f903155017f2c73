//! readiness 子命令实现
//!
//! `probe` evaluates once and returns the rendered response; `serve` runs
//! the HTTP endpoint until ctrl-c.

pub mod parser;

pub use parser::*;

use crate::config::ReadinessConfig;
use crate::error::ReadinessResult;
use crate::readiness::{respond, ProbeResponse, ReadinessProbe};
use chrono::Utc;

/// Evaluate once from the command line. The allow list only guards the HTTP
/// endpoint, so it is not applied here.
pub fn run_probe(config: &ReadinessConfig, json: bool) -> ReadinessResult<ProbeResponse> {
    let probe = ReadinessProbe::from_config(config)?;
    let now = Utc::now();
    Ok(respond(&probe.evaluate(now), json, now))
}

pub async fn run_serve(config: &ReadinessConfig) -> ReadinessResult<()> {
    let addr = config.bind_addr()?;
    let probe = ReadinessProbe::from_config(config)?;
    crate::server::serve(probe, addr).await
}
