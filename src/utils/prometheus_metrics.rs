// src/utils/prometheus_metrics.rs

use once_cell::sync::Lazy;
use prometheus::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};

// Metrics from the Dispatcher
pub static JOBS_SUBMITTED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "dispatcher_jobs_submitted_total",
        "Total number of processing jobs accepted and handed to a worker."
    )
    .expect("Failed to register JOBS_SUBMITTED_TOTAL counter")
});

pub static JOBS_COMPLETED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "dispatcher_jobs_completed_total",
        "Total number of jobs that reached the completed state."
    )
    .expect("Failed to register JOBS_COMPLETED_TOTAL counter")
});

pub static JOBS_FAILED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "dispatcher_jobs_failed_total",
        "Total number of jobs that reached the failed state (worker error or crash)."
    )
    .expect("Failed to register JOBS_FAILED_TOTAL counter")
});

pub static UPLOADS_REJECTED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "dispatcher_uploads_rejected_total",
        "Total number of uploads rejected before any worker was launched."
    )
    .expect("Failed to register UPLOADS_REJECTED_TOTAL counter")
});

pub static ACTIVE_JOBS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "dispatcher_active_jobs",
        "Number of jobs currently running in worker threads."
    )
    .expect("Failed to register ACTIVE_JOBS gauge")
});

pub static JOB_PROCESSING_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "dispatcher_job_processing_duration_seconds",
        "Histogram of job durations (from submission to terminal reply)."
    )
    .expect("Failed to register JOB_PROCESSING_DURATION_SECONDS histogram")
});

// Metrics from the Responsiveness Monitor
pub static SCHEDULER_LAG_MS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "monitor_scheduler_lag_ms",
        "Latest scheduler lag sample in milliseconds."
    )
    .expect("Failed to register SCHEDULER_LAG_MS gauge")
});

pub static REQUESTS_IN_FLIGHT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "monitor_requests_in_flight",
        "Number of HTTP requests currently in progress."
    )
    .expect("Failed to register REQUESTS_IN_FLIGHT gauge")
});
