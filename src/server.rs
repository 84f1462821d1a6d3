use crate::config::ServerArgs;
use crate::data_model::Artifact;
use crate::dispatcher::{dispatch, JobOutcome};
use crate::error::{ProcessingError, Result};
use crate::monitor::{MonitorConfig, ResponsivenessMonitor};
use crate::utils::memory::MemorySnapshot;
use crate::utils::prometheus_metrics::UPLOADS_REJECTED_TOTAL;
use crate::worker::WorkerConfig;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

// The application state, shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub monitor: ResponsivenessMonitor,
    pub worker_cfg: WorkerConfig,
    pub max_upload_bytes: usize,
}

/// Pulls exactly one artifact out of the multipart body. Rejections here
/// happen before any job is created or worker launched.
async fn read_artifact(multipart: &mut Multipart, max_bytes: usize) -> Result<Artifact> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ProcessingError::InvalidUpload(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field
            .file_name()
            .unwrap_or("upload.bin")
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ProcessingError::InvalidUpload(format!("failed to read upload: {e}")))?;

        if bytes.is_empty() {
            return Err(ProcessingError::InvalidUpload("uploaded file is empty".into()));
        }
        if bytes.len() > max_bytes {
            return Err(ProcessingError::InvalidUpload(format!(
                "file of {} bytes exceeds the {} byte limit",
                bytes.len(),
                max_bytes
            )));
        }

        return Ok(Artifact {
            job_id: Uuid::new_v4(),
            original_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(ProcessingError::InvalidUpload("no file uploaded".into()))
}

async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let started = Instant::now();

    let artifact = match read_artifact(&mut multipart, state.max_upload_bytes).await {
        Ok(artifact) => artifact,
        Err(e) => {
            UPLOADS_REJECTED_TOTAL.inc();
            error!(error = %e, "upload rejected before dispatch");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Upload rejected",
                    "details": e.to_string(),
                    "elapsed_ms": started.elapsed().as_millis() as u64,
                })),
            )
                .into_response();
        }
    };

    let outcome = dispatch(artifact, state.worker_cfg.clone()).await;
    let uptime_secs = state.monitor.snapshot().await.uptime_secs;
    job_response(outcome, uptime_secs)
}

/// Assembles the single terminal reply for a dispatched job.
fn job_response(outcome: JobOutcome, uptime_secs: u64) -> Response {
    let job = &outcome.job;
    if outcome.succeeded() {
        Json(json!({
            "message": "File processed successfully in worker thread",
            "file": job.artifact,
            "processing": job.result,
            "progress": job.progress,
            "performance": {
                "total_ms": outcome.elapsed_ms,
                "timestamp": Utc::now(),
                "uptime_secs": uptime_secs,
                "serving_context_blocked": false,
                "memory": {
                    "before": outcome.memory_before,
                    "after": outcome.memory_after,
                    "growth_mb": MemorySnapshot::growth_mb(
                        outcome.memory_before,
                        outcome.memory_after
                    ),
                },
            },
        }))
        .into_response()
    } else {
        let details = job.failure_detail().unwrap_or("unknown failure");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "File processing failed",
                "details": details,
                "progress": job.progress,
                "elapsed_ms": outcome.elapsed_ms,
            })),
        )
            .into_response()
    }
}

/// The health surface the external watchdog depends on. Reads only cached
/// monitor state, so it stays fast regardless of in-flight worker load.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.monitor.snapshot().await;
    Json(json!({
        "status": "healthy",
        "timestamp": snap.timestamp,
        "uptime_secs": snap.uptime_secs,
        "memory": {
            "used_mb": snap.memory.rss_mb,
            "total_mb": snap.memory.vsize_mb,
        },
    }))
}

/// Live-metrics surface backed by the responsiveness monitor's snapshot.
async fn live_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.monitor.snapshot().await;
    Json(json!({
        "status": if snap.blocking_detected { "degraded" } else { "healthy" },
        "scheduler_lag_ms": snap.scheduler_lag_ms,
        "scheduler_status": snap.scheduler_status(),
        "severity": snap.severity,
        "blocking_detected": snap.blocking_detected,
        "requests_in_progress": snap.requests_in_progress,
        "request_queue": snap.requests,
        "memory": snap.memory,
        "uptime_secs": snap.uptime_secs,
        "timestamp": snap.timestamp,
    }))
}

// Prometheus exposition endpoint
async fn metrics_handler() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "could not encode prometheus metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    match String::from_utf8(buffer) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "prometheus metrics were not valid UTF-8");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

/// Synthetic-load route: runs the pathological worker against an empty
/// artifact. Only compiled in when the `pathological` feature is enabled.
#[cfg(feature = "pathological")]
async fn pathological_handler(State(state): State<AppState>) -> impl IntoResponse {
    use crate::data_model::ProcessingJob;
    use crate::dispatcher::relay_messages;
    use crate::worker::spawn_pathological_worker;
    use std::time::Duration;

    let artifact = Artifact {
        job_id: Uuid::new_v4(),
        original_name: "synthetic-load".into(),
        content_type: "application/octet-stream".into(),
        bytes: Vec::new(),
    };
    let started = Instant::now();
    let mut job = ProcessingJob::new(artifact.info());
    let rx = spawn_pathological_worker(artifact, Duration::from_secs(30));
    job.mark_running();
    relay_messages(&mut job, rx).await;

    Json(json!({
        "message": "Synthetic load completed in worker thread; serving context never blocked",
        "job": job,
        "elapsed_ms": started.elapsed().as_millis() as u64,
    }))
}

/// Registers every request with the monitor and logs its completion.
async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let id = state.monitor.begin_request(&method, &path).await;
    let started = Instant::now();

    let response = next.run(req).await;

    state.monitor.finish_request(id).await;
    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "request finished"
    );
    response
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/files/upload", post(upload_handler))
        .route("/api/monitor/live", get(live_metrics_handler))
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "pathological")]
    let router = router.route("/api/files/upload-pathological", post(pathological_handler));

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}

// The main function to run the server
pub async fn run_server(args: ServerArgs) -> Result<()> {
    if args.max_upload_mb == 0 {
        return Err(ProcessingError::ConfigError(
            "max upload size must be at least 1 MB".into(),
        ));
    }
    std::fs::create_dir_all(&args.thumbnail_dir)?;

    let monitor = ResponsivenessMonitor::new(MonitorConfig::default());
    monitor.spawn_probes();

    let state = AppState {
        monitor,
        worker_cfg: WorkerConfig {
            thumbnail_dir: args.thumbnail_dir.clone(),
            suspicious_threshold: args.suspicious_threshold,
            ..WorkerConfig::default()
        },
        max_upload_bytes: args.max_upload_bytes(),
    };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
