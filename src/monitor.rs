//! In-process responsiveness monitor.
//!
//! A single instance is created at process start and passed around as a
//! cheap cloneable handle. Two background loops sample scheduler lag and
//! memory; request tracking is fed by the server's middleware. Nothing here
//! ever hands out a mutable reference to internal state: readers get an
//! owned [`MonitorSnapshot`].

use crate::utils::memory::{self, MemorySnapshot};
use crate::utils::prometheus_metrics::{REQUESTS_IN_FLIGHT, SCHEDULER_LAG_MS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Sampling cadence and retention knobs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between scheduler lag probes.
    pub lag_probe_interval: Duration,
    /// Lag above this raises a scheduler-blocked signal.
    pub lag_threshold: Duration,
    /// Interval between memory snapshots.
    pub memory_probe_interval: Duration,
    /// How long completed requests stay visible before pruning.
    pub completed_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            lag_probe_interval: Duration::from_millis(100),
            lag_threshold: Duration::from_millis(1000),
            memory_probe_interval: Duration::from_secs(1),
            completed_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    InProgress,
    Completed,
}

/// One tracked HTTP request. Created at arrival, completed when the
/// response finishes, pruned a grace period after completion.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: u64,
    pub method: String,
    pub path: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub status: RequestStatus,
    pub duration_ms: Option<u64>,
}

/// Read-only request view for the live-metrics surface.
#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    pub method: String,
    pub path: String,
    pub status: RequestStatus,
    /// Total duration for completed requests, elapsed-so-far otherwise.
    pub duration_ms: u64,
}

/// Severity of the latest lag sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LagSeverity {
    Normal,
    Critical,
    Nuclear,
}

/// Owned, immutable snapshot of the monitor's state.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub scheduler_lag_ms: f64,
    pub blocking_detected: bool,
    pub severity: LagSeverity,
    pub requests_in_progress: usize,
    pub requests: Vec<RequestView>,
    pub memory: MemorySnapshot,
    pub uptime_secs: u64,
    pub timestamp: DateTime<Utc>,
}

impl MonitorSnapshot {
    /// Derived scheduler status for the live-metrics surface.
    pub fn scheduler_status(&self) -> &'static str {
        if self.severity == LagSeverity::Normal {
            "free"
        } else {
            "blocked"
        }
    }
}

#[derive(Default)]
struct Sampled {
    lag_ms: f64,
    blocking_detected: bool,
    memory: MemorySnapshot,
    requests: HashMap<u64, RequestRecord>,
}

struct MonitorInner {
    cfg: MonitorConfig,
    started: Instant,
    next_id: AtomicU64,
    sampled: RwLock<Sampled>,
}

/// Process-wide responsiveness monitor. One instance per process, shared by
/// cloning the handle.
#[derive(Clone)]
pub struct ResponsivenessMonitor {
    inner: Arc<MonitorInner>,
}

impl ResponsivenessMonitor {
    pub fn new(cfg: MonitorConfig) -> Self {
        ResponsivenessMonitor {
            inner: Arc::new(MonitorInner {
                cfg,
                started: Instant::now(),
                next_id: AtomicU64::new(1),
                sampled: RwLock::new(Sampled {
                    memory: memory::snapshot(),
                    ..Sampled::default()
                }),
            }),
        }
    }

    /// Starts the lag and memory probe loops. Call once at process start;
    /// both loops run for the life of the process.
    pub fn spawn_probes(&self) {
        let lag_monitor = self.clone();
        tokio::spawn(async move { lag_monitor.run_lag_probe().await });

        let mem_monitor = self.clone();
        tokio::spawn(async move { mem_monitor.run_memory_probe().await });
    }

    /// Measures how late the scheduler resumes us after a nominal sleep.
    /// Work done on worker threads cannot show up here; only blocking
    /// inside the serving runtime itself produces lag.
    async fn run_lag_probe(&self) {
        let interval = self.inner.cfg.lag_probe_interval;
        loop {
            let start = Instant::now();
            tokio::time::sleep(interval).await;
            let lag = start.elapsed().saturating_sub(interval);
            let lag_ms = lag.as_secs_f64() * 1000.0;

            SCHEDULER_LAG_MS.set(lag_ms);
            let mut sampled = self.inner.sampled.write().await;
            sampled.lag_ms = lag_ms;
            if lag > self.inner.cfg.lag_threshold {
                sampled.blocking_detected = true;
                drop(sampled);
                warn!(
                    lag_ms,
                    severity = ?severity_for(lag_ms),
                    "scheduler-blocked: serving context failed to resume on time"
                );
            }
        }
    }

    async fn run_memory_probe(&self) {
        let mut ticker = tokio::time::interval(self.inner.cfg.memory_probe_interval);
        loop {
            ticker.tick().await;
            let snap = memory::snapshot();
            self.inner.sampled.write().await.memory = snap;
        }
    }

    /// Registers an inbound request and returns its tracking id.
    pub async fn begin_request(&self, method: &str, path: &str) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let record = RequestRecord {
            id,
            method: method.to_string(),
            path: path.to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            status: RequestStatus::InProgress,
            duration_ms: None,
        };
        self.inner.sampled.write().await.requests.insert(id, record);
        REQUESTS_IN_FLIGHT.inc();
        id
    }

    /// Marks a request completed and schedules its removal after the
    /// configured grace period, so the active set stays bounded.
    pub async fn finish_request(&self, id: u64) {
        {
            let mut sampled = self.inner.sampled.write().await;
            let Some(record) = sampled.requests.get_mut(&id) else {
                return;
            };
            record.status = RequestStatus::Completed;
            record.duration_ms = Some(record.started.elapsed().as_millis() as u64);
        }
        REQUESTS_IN_FLIGHT.dec();

        let monitor = self.clone();
        let grace = self.inner.cfg.completed_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            monitor.inner.sampled.write().await.requests.remove(&id);
            debug!(request_id = id, "pruned completed request record");
        });
    }

    /// Read-only snapshot of the latest samples and the request set.
    pub async fn snapshot(&self) -> MonitorSnapshot {
        let sampled = self.inner.sampled.read().await;
        let mut requests: Vec<RequestView> = sampled
            .requests
            .values()
            .map(|r| RequestView {
                method: r.method.clone(),
                path: r.path.clone(),
                status: r.status,
                duration_ms: r
                    .duration_ms
                    .unwrap_or_else(|| r.started.elapsed().as_millis() as u64),
            })
            .collect();
        requests.sort_by(|a, b| a.path.cmp(&b.path));

        let requests_in_progress = sampled
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::InProgress)
            .count();

        MonitorSnapshot {
            scheduler_lag_ms: sampled.lag_ms,
            blocking_detected: sampled.blocking_detected,
            severity: severity_for(sampled.lag_ms),
            requests_in_progress,
            requests,
            memory: sampled.memory,
            uptime_secs: self.inner.started.elapsed().as_secs(),
            timestamp: Utc::now(),
        }
    }
}

fn severity_for(lag_ms: f64) -> LagSeverity {
    if lag_ms > 5000.0 {
        LagSeverity::Nuclear
    } else if lag_ms > 1000.0 {
        LagSeverity::Critical
    } else {
        LagSeverity::Normal
    }
}
