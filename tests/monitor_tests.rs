use fileforge::monitor::{MonitorConfig, ResponsivenessMonitor};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn completed_requests_prune_after_grace_period() {
    let monitor = ResponsivenessMonitor::new(MonitorConfig::default());
    let id = monitor.begin_request("GET", "/health").await;
    monitor.finish_request(id).await;

    let snap = monitor.snapshot().await;
    assert_eq!(snap.requests.len(), 1);
    assert_eq!(snap.requests_in_progress, 0);

    // Still visible just before the 5 s grace period elapses.
    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert_eq!(monitor.snapshot().await.requests.len(), 1);

    // Pruned shortly after it.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(monitor.snapshot().await.requests.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn in_progress_requests_are_never_pruned() {
    let monitor = ResponsivenessMonitor::new(MonitorConfig::default());
    let _id = monitor.begin_request("POST", "/api/files/upload").await;

    tokio::time::sleep(Duration::from_secs(60)).await;

    let snap = monitor.snapshot().await;
    assert_eq!(snap.requests.len(), 1);
    assert_eq!(snap.requests_in_progress, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn lag_probe_latches_blocking_flag_when_runtime_is_starved() {
    let cfg = MonitorConfig {
        lag_probe_interval: Duration::from_millis(10),
        lag_threshold: Duration::from_millis(50),
        ..MonitorConfig::default()
    };
    let monitor = ResponsivenessMonitor::new(cfg);
    monitor.spawn_probes();

    // Let the probe loop start its first sleep.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!monitor.snapshot().await.blocking_detected);

    // Starve the single-threaded runtime the way synchronous work inside
    // the serving context would.
    std::thread::sleep(Duration::from_millis(300));

    // Yield so the probe can observe its late resumption.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snap = monitor.snapshot().await;
    assert!(snap.blocking_detected);
}

#[tokio::test]
async fn snapshot_reports_uptime_and_memory() {
    let monitor = ResponsivenessMonitor::new(MonitorConfig::default());
    let snap = monitor.snapshot().await;
    if cfg!(target_os = "linux") {
        assert!(snap.memory.vsize_mb > 0);
    }
    assert!(snap.requests.is_empty());
    assert_eq!(snap.scheduler_status(), "free");
}
