//! HTTP endpoint tests over a real socket

use scoreboard_readiness::readiness::{ProbeSettings, CONTENT_TYPE_JSON};
use scoreboard_readiness::server::serve_on;
use scoreboard_readiness::{
    EnumerationMode, InMemoryScoreboard, ReadinessProbe, Scoreboard, WorkerEnumerator, WorkerId,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

struct RunningServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl RunningServer {
    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

async fn start(board: Option<InMemoryScoreboard>, allow: Vec<String>) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let probe = ReadinessProbe::new(
        ProbeSettings {
            path: "/readiness".to_string(),
            allow,
        },
        board.map(|b| Arc::new(b) as Arc<dyn Scoreboard>),
        WorkerEnumerator::new(EnumerationMode::Scoreboard),
        1,
    );

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        serve_on(listener, probe, async move {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    RunningServer {
        addr,
        shutdown: Some(tx),
        handle,
    }
}

async fn get(addr: SocketAddr, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

fn idle_board() -> InMemoryScoreboard {
    let board = InMemoryScoreboard::new();
    board.update(WorkerId::new(10), r#"{"status":"_"}"#);
    board.update(WorkerId::new(11), r#"{"status":"A"}"#);
    board
}

#[tokio::test]
async fn readiness_json_when_idle_workers_exist() {
    let server = start(Some(idle_board()), Vec::new()).await;

    let response = get(server.addr, "/readiness?json").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response
        .to_ascii_lowercase()
        .contains(&format!("content-type: {CONTENT_TYPE_JSON}")));
    assert!(response.contains(r#""busyWorkers":1"#));
    assert!(response.contains(r#""idleWorkers":1"#));
    assert!(response.contains(r#""ready":true"#));

    server.stop().await;
}

#[tokio::test]
async fn readiness_text_is_default() {
    let server = start(Some(idle_board()), Vec::new()).await;

    let response = get(server.addr, "/readiness").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response
        .to_ascii_lowercase()
        .contains("content-type: text/plain"));
    assert!(response.contains("BusyWorkers: 1\nIdleWorkers: 1\n--\n"));

    server.stop().await;
}

#[tokio::test]
async fn readiness_without_scoreboard_is_unavailable() {
    let server = start(None, Vec::new()).await;

    let response = get(server.addr, "/readiness").await;
    assert!(response.starts_with("HTTP/1.1 503"), "{response}");
    assert!(response.contains("Uptime: "));

    server.stop().await;
}

#[tokio::test]
async fn readiness_rejects_addresses_outside_allow_list() {
    let server = start(Some(idle_board()), vec!["192.0.2.1".to_string()]).await;

    let response = get(server.addr, "/readiness").await;
    assert!(response.starts_with("HTTP/1.1 403"), "{response}");
    assert!(response.ends_with("Forbidden"));

    server.stop().await;
}

#[tokio::test]
async fn other_paths_are_not_found() {
    let server = start(Some(idle_board()), Vec::new()).await;

    let response = get(server.addr, "/").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");

    server.stop().await;
}
