use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One uploaded artifact, exactly as it crosses the worker boundary.
///
/// The bytes are moved into the worker thread by value; nothing is shared
/// by reference across the boundary.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub job_id: Uuid,
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Metadata view of an artifact, safe to echo back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub id: Uuid,
    pub original_name: String,
    pub size: usize,
    pub content_type: String,
}

impl Artifact {
    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            id: self.job_id,
            original_name: self.original_name.clone(),
            size: self.bytes.len(),
            content_type: self.content_type.clone(),
        }
    }
}

/// Lifecycle state of a processing job.
///
/// Transitions are monotonic: Submitted -> Running -> Progressing* ->
/// Completed | Failed. Terminal states are sticky.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Running,
    Progressing,
    Completed,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }
}

/// A single progress report from the worker. Append-only; ordering is
/// arrival order on the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn now(percent: u8, message: impl Into<String>) -> Self {
        ProgressEvent {
            percent,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Image properties extracted during the metadata stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub size_bytes: usize,
}

/// Reference to one derived thumbnail written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailRef {
    pub path: PathBuf,
    pub bytes: u64,
}

/// A thumbnail generated at one of the configured target sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizedThumbnail {
    pub size: u32,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Clean,
    Suspicious,
}

/// Outcome of the chunked signature scan over the artifact bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub status: ScanStatus,
    pub patterns_found: usize,
    pub scanned_bytes: usize,
}

/// The structured result of a completed worker pipeline. Immutable once
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub kind: String,
    pub metadata: ImageMetadata,
    pub thumbnail: ThumbnailRef,
    pub sizes: Vec<SizedThumbnail>,
    pub security: ScanReport,
    pub processing_ms: u64,
}

/// Messages sent from a Worker Unit to its Dispatcher.
///
/// Exactly one of `Complete`/`Error` is sent per worker, exactly once, and
/// it is the last message on the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Progress(ProgressEvent),
    Complete(Box<WorkerResult>),
    Error { error: String },
}

/// One offloaded unit of work, owned exclusively by the Dispatcher
/// invocation that created it. Lives for a single request lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub artifact: ArtifactInfo,
    pub state: JobState,
    pub progress: Vec<ProgressEvent>,
    pub result: Option<WorkerResult>,
}

impl ProcessingJob {
    pub fn new(artifact: ArtifactInfo) -> Self {
        ProcessingJob {
            id: artifact.id,
            artifact,
            state: JobState::Submitted,
            progress: Vec::new(),
            result: None,
        }
    }

    /// Marks the job as handed to a worker. No-op once terminal.
    pub fn mark_running(&mut self) {
        if !self.state.is_terminal() {
            self.state = JobState::Running;
        }
    }

    /// Appends a progress event. No-op once terminal.
    pub fn record_progress(&mut self, event: ProgressEvent) {
        if self.state.is_terminal() {
            return;
        }
        self.progress.push(event);
        self.state = JobState::Progressing;
    }

    /// Terminal transition to Completed. Ignored if already terminal.
    pub fn complete(&mut self, result: WorkerResult) {
        if self.state.is_terminal() {
            return;
        }
        self.result = Some(result);
        self.state = JobState::Completed;
    }

    /// Terminal transition to Failed. Ignored if already terminal.
    pub fn fail(&mut self, detail: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Failed(detail.into());
    }

    pub fn failure_detail(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed(detail) => Some(detail),
            _ => None,
        }
    }
}
