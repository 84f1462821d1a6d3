//! The core property the architecture exists to guarantee: the health
//! surface stays fast while worker threads burn unbounded CPU.

mod common;

use common::artifact;
use fileforge::data_model::WorkerMessage;
use fileforge::monitor::{MonitorConfig, ResponsivenessMonitor};
use fileforge::server::{build_router, AppState};
use fileforge::worker::{spawn_pathological_worker, WorkerConfig};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

async fn start_server(dir: &tempfile::TempDir) -> SocketAddr {
    let monitor = ResponsivenessMonitor::new(MonitorConfig::default());
    monitor.spawn_probes();
    let state = AppState {
        monitor,
        worker_cfg: WorkerConfig {
            thumbnail_dir: dir.path().to_path_buf(),
            ..WorkerConfig::default()
        },
        max_upload_bytes: 10 * 1024 * 1024,
    };
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_answers_100_probes_while_5_heavy_workers_run() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    // Five workers running unyielding synchronous computation on their own
    // OS threads for the whole probe window.
    let mut receivers = Vec::new();
    for i in 0..5 {
        let art = artifact(&format!("load-{i}.bin"), Vec::new());
        receivers.push(spawn_pathological_worker(art, Duration::from_secs(3)));
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let url = format!("http://{addr}/health");

    for i in 0..100 {
        let started = Instant::now();
        let response = client
            .get(&url)
            .send()
            .await
            .unwrap_or_else(|e| panic!("health probe {i} failed: {e}"));
        assert_eq!(response.status(), 200);
        let elapsed = started.elapsed();
        assert!(
            elapsed < Duration::from_millis(500),
            "health probe {i} exceeded bound: {elapsed:?}"
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    // Each pathological worker still honors the single-terminal contract.
    for mut rx in receivers {
        let mut terminal = None;
        let mut count = 0;
        while let Some(message) = rx.recv().await {
            if matches!(
                message,
                WorkerMessage::Complete(_) | WorkerMessage::Error { .. }
            ) {
                count += 1;
            }
            terminal = Some(message);
        }
        assert_eq!(count, 1);
        assert!(matches!(terminal, Some(WorkerMessage::Complete(_))));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_load_never_shows_up_as_scheduler_lag() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_server(&dir).await;

    let art = artifact("load.bin", Vec::new());
    let mut rx = spawn_pathological_worker(art, Duration::from_secs(1));

    tokio::time::sleep(Duration::from_millis(500)).await;
    let body: serde_json::Value = reqwest::get(format!("http://{addr}/api/monitor/live"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["blocking_detected"], false);
    assert_eq!(body["scheduler_status"], "free");

    while rx.recv().await.is_some() {}
}
