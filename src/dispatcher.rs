//! Dispatcher: owns one [`ProcessingJob`] per upload, launches its Worker
//! Unit, relays the worker's messages into the job, and produces exactly
//! one terminal outcome. Concurrent invocations are fully independent; the
//! only state shared across jobs is the thumbnail directory, where
//! filenames are job-id-derived.

use crate::data_model::{Artifact, JobState, ProcessingJob, WorkerMessage};
use crate::error::ProcessingError;
use crate::utils::memory::{self, MemorySnapshot};
use crate::utils::prometheus_metrics::{
    ACTIVE_JOBS, JOBS_COMPLETED_TOTAL, JOBS_FAILED_TOTAL, JOBS_SUBMITTED_TOTAL,
    JOB_PROCESSING_DURATION_SECONDS,
};
use crate::worker::{spawn_worker, WorkerConfig};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Everything needed to assemble the single reply for one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: ProcessingJob,
    pub elapsed_ms: u64,
    pub memory_before: MemorySnapshot,
    pub memory_after: MemorySnapshot,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.job.state == JobState::Completed
    }
}

/// Runs one artifact through a Worker Unit and awaits its terminal state.
///
/// The caller only ever gets the outcome back once, which is what makes the
/// exactly-one-reply property hold at the HTTP layer.
pub async fn dispatch(artifact: Artifact, cfg: WorkerConfig) -> JobOutcome {
    let started = Instant::now();
    let memory_before = memory::snapshot();

    let mut job = ProcessingJob::new(artifact.info());
    info!(
        job_id = %job.id,
        name = %job.artifact.original_name,
        size = job.artifact.size,
        "dispatching upload to worker"
    );
    JOBS_SUBMITTED_TOTAL.inc();
    ACTIVE_JOBS.inc();
    let timer = JOB_PROCESSING_DURATION_SECONDS.start_timer();

    let rx = spawn_worker(artifact, cfg);
    job.mark_running();
    relay_messages(&mut job, rx).await;

    timer.observe_duration();
    ACTIVE_JOBS.dec();
    match &job.state {
        JobState::Completed => JOBS_COMPLETED_TOTAL.inc(),
        JobState::Failed(detail) => {
            JOBS_FAILED_TOTAL.inc();
            warn!(job_id = %job.id, detail = %detail, "job failed");
        }
        // relay_messages always leaves the job terminal.
        other => warn!(job_id = %job.id, state = ?other, "job ended in non-terminal state"),
    }

    JobOutcome {
        job,
        elapsed_ms: started.elapsed().as_millis() as u64,
        memory_before,
        memory_after: memory::snapshot(),
    }
}

/// Drains worker messages into the job until a terminal message arrives.
///
/// A channel that closes without a terminal message means the worker thread
/// died (panic or premature exit); that is mapped to a failed job so the
/// caller never waits forever.
pub async fn relay_messages(job: &mut ProcessingJob, mut rx: UnboundedReceiver<WorkerMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            WorkerMessage::Progress(event) => {
                debug!(
                    job_id = %job.id,
                    percent = event.percent,
                    message = %event.message,
                    "progress"
                );
                job.record_progress(event);
            }
            WorkerMessage::Complete(result) => {
                job.complete(*result);
                return;
            }
            WorkerMessage::Error { error } => {
                job.fail(error);
                return;
            }
        }
    }

    if !job.state.is_terminal() {
        warn!(job_id = %job.id, "worker channel closed without a terminal message");
        let fault = ProcessingError::WorkerCrashed(
            "worker terminated unexpectedly before sending a result".into(),
        );
        job.fail(fault.to_string());
    }
}
