//! HTTP surface for the readiness probe
//!
//! Serves the configured probe path with axum; every other path is 404.

use crate::error::{ReadinessError, ReadinessResult};
use crate::readiness::{ProbeRequest, ProbeResponse, ReadinessProbe};
use axum::extract::{ConnectInfo, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub fn router(probe: Arc<ReadinessProbe>) -> Router {
    let path = probe.settings().path.clone();
    Router::new()
        .route(&path, get(readiness))
        .with_state(probe)
}

pub async fn readiness(
    State(probe): State<Arc<ReadinessProbe>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    RawQuery(query): RawQuery,
) -> Response {
    let request = ProbeRequest {
        remote_addr: Some(remote.ip().to_string()),
        query,
    };

    // Scoreboard reads and the process table query block
    match tokio::task::spawn_blocking(move || probe.handle(&request)).await {
        Ok(response) => into_http(response),
        Err(err) => {
            error!(error = %err, "readiness evaluation panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn into_http(response: ProbeResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, response.content_type)],
        response.body,
    )
        .into_response()
}

/// Bind `addr` and serve until ctrl-c
pub async fn serve(probe: ReadinessProbe, addr: SocketAddr) -> ReadinessResult<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| ReadinessError::server(format!("failed to bind {addr}"), err))?;
    serve_on(listener, probe, shutdown_signal()).await
}

pub async fn serve_on<F>(listener: TcpListener, probe: ReadinessProbe, shutdown: F) -> ReadinessResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if let Ok(local) = listener.local_addr() {
        info!(addr = %local, path = %probe.settings().path, "readiness endpoint listening");
    }

    let app = router(Arc::new(probe)).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| ReadinessError::server("readiness server failed", err))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down readiness endpoint");
}
