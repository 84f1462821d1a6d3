//! Worker Unit: the isolated execution context for CPU-bound processing.
//!
//! Each worker runs on its own OS thread with the artifact bytes moved in
//! by value. It communicates with its dispatcher purely over an unbounded
//! mpsc channel carrying [`WorkerMessage`] values; send order is preserved
//! and the terminal message (`Complete` or `Error`) is always last. A
//! panicking worker drops its sender, which the dispatcher observes as
//! channel closure without a terminal message.

use crate::data_model::{
    Artifact, ImageMetadata, ProgressEvent, ScanReport, ScanStatus, SizedThumbnail, ThumbnailRef,
    WorkerMessage, WorkerResult,
};
use crate::error::{ProcessingError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Byte patterns the signature scan looks for in the artifact.
pub const SIGNATURE_PATTERNS: [&str; 5] = ["exec", "eval", "script", "virus", "malware"];

/// The scan walks the artifact in chunks of this size so a cooperative
/// execution model could yield between chunks. On a dedicated thread this
/// is only a cache-friendliness property, not a correctness one.
pub const SCAN_CHUNK_SIZE: usize = 10_000;

/// Per-worker pipeline settings, owned by the server and cloned into each
/// worker thread.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory derived thumbnails are written to.
    pub thumbnail_dir: PathBuf,
    /// Secondary thumbnail target sizes, in pixels.
    pub thumbnail_sizes: Vec<u32>,
    /// Signature matches above this count classify the artifact as suspicious.
    pub suspicious_threshold: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            thumbnail_dir: PathBuf::from("uploads/thumbnails"),
            thumbnail_sizes: vec![100, 300, 500, 800],
            suspicious_threshold: 5,
        }
    }
}

impl WorkerConfig {
    /// Filenames are derived from the job id alone, so concurrently
    /// completing jobs can never collide on the shared thumbnail area.
    pub fn main_thumbnail_path(&self, job_id: Uuid) -> PathBuf {
        self.thumbnail_dir.join(format!("{job_id}_thumb.jpg"))
    }

    pub fn sized_thumbnail_path(&self, job_id: Uuid, size: u32) -> PathBuf {
        self.thumbnail_dir.join(format!("{job_id}_{size}.jpg"))
    }
}

/// Launches a worker thread for one artifact and returns the receiving end
/// of its message channel. The artifact is moved into the thread; no memory
/// is shared with the caller.
pub fn spawn_worker(artifact: Artifact, cfg: WorkerConfig) -> UnboundedReceiver<WorkerMessage> {
    let (tx, rx) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name(format!("worker-{}", artifact.job_id))
        .spawn(move || {
            let job_id = artifact.job_id;
            let started = Instant::now();
            info!(job_id = %job_id, name = %artifact.original_name, "worker started");

            match run_pipeline(&artifact, &cfg, &tx, started) {
                Ok(result) => {
                    info!(job_id = %job_id, ms = result.processing_ms, "worker completed");
                    let _ = tx.send(WorkerMessage::Complete(Box::new(result)));
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "worker pipeline failed");
                    let _ = tx.send(WorkerMessage::Error {
                        error: e.to_string(),
                    });
                }
            }
        });

    if let Err(e) = spawned {
        // Thread creation itself failed; surface it on the channel the
        // dispatcher is about to read so the contract still holds.
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(WorkerMessage::Error {
            error: format!("failed to spawn worker thread: {e}"),
        });
        return rx;
    }

    rx
}

fn run_pipeline(
    artifact: &Artifact,
    cfg: &WorkerConfig,
    tx: &UnboundedSender<WorkerMessage>,
    started: Instant,
) -> Result<WorkerResult> {
    let bytes = &artifact.bytes;
    report(tx, 10, "Worker started, reading artifact data...");

    report(tx, 20, "Analyzing image metadata...");
    let format =
        image::guess_format(bytes).map_err(|e| stage_error("metadata-extraction", e))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| stage_error("metadata-extraction", e))?;
    let metadata = ImageMetadata {
        width: img.width(),
        height: img.height(),
        format: format_name(format).to_string(),
        size_bytes: bytes.len(),
    };

    report(tx, 30, "Generating thumbnails...");
    std::fs::create_dir_all(&cfg.thumbnail_dir)
        .map_err(|e| stage_error("thumbnail-generation", e))?;
    report(tx, 35, "Creating main thumbnail...");
    let thumbnail = write_thumbnail(&img, 200, cfg.main_thumbnail_path(artifact.job_id))
        .map_err(|e| stage_error("thumbnail-generation", e))?;

    report(tx, 60, "Creating multiple sizes...");
    let mut sizes = Vec::with_capacity(cfg.thumbnail_sizes.len());
    for (i, &size) in cfg.thumbnail_sizes.iter().enumerate() {
        let path = cfg.sized_thumbnail_path(artifact.job_id, size);
        let thumb = write_thumbnail(&img, size, path.clone())
            .map_err(|e| stage_error("sized-thumbnails", e))?;
        sizes.push(SizedThumbnail {
            size,
            path,
            bytes: thumb.bytes,
        });
        // Percent stays within [60, 80) however many target sizes are configured.
        let percent = 60 + ((i + 1) * 15 / cfg.thumbnail_sizes.len().max(1)) as u8;
        report(tx, percent, format!("Generated {size}px thumbnail"));
    }

    report(tx, 80, "Performing security scan...");
    let security = scan_signatures(bytes, cfg.suspicious_threshold);
    debug!(
        patterns = security.patterns_found,
        status = ?security.status,
        "signature scan finished"
    );

    report(tx, 100, "Processing complete!");

    Ok(WorkerResult {
        kind: "image".to_string(),
        metadata,
        thumbnail,
        sizes,
        security,
        processing_ms: started.elapsed().as_millis().max(1) as u64,
    })
}

fn stage_error(stage: &str, e: impl std::fmt::Display) -> ProcessingError {
    ProcessingError::WorkerStage {
        stage: stage.to_string(),
        detail: e.to_string(),
    }
}

fn report(tx: &UnboundedSender<WorkerMessage>, percent: u8, message: impl Into<String>) {
    // The dispatcher may have gone away; a closed channel just means nobody
    // is listening any more, which is not the worker's problem.
    let _ = tx.send(WorkerMessage::Progress(ProgressEvent::now(
        percent, message,
    )));
}

fn write_thumbnail(img: &DynamicImage, size: u32, path: PathBuf) -> Result<ThumbnailRef> {
    let thumb = img.resize_to_fill(size, size, FilterType::Triangle);
    thumb
        .to_rgb8()
        .save_with_format(&path, ImageFormat::Jpeg)?;
    let bytes = std::fs::metadata(&path)?.len();
    Ok(ThumbnailRef { path, bytes })
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        _ => "unknown",
    }
}

/// Scans the artifact in bounded chunks for the known signature patterns.
/// Each pattern found in a chunk counts once; matches spanning a chunk
/// boundary are not counted.
pub fn scan_signatures(bytes: &[u8], suspicious_threshold: usize) -> ScanReport {
    let mut patterns_found = 0;
    for chunk in bytes.chunks(SCAN_CHUNK_SIZE) {
        for signature in SIGNATURE_PATTERNS {
            if contains_ignore_case(chunk, signature.as_bytes()) {
                patterns_found += 1;
            }
        }
    }

    let status = if patterns_found > suspicious_threshold {
        ScanStatus::Suspicious
    } else {
        ScanStatus::Clean
    };

    ScanReport {
        status,
        patterns_found,
        scanned_bytes: bytes.len(),
    }
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

/// Benchmark/fault-injection fixture: burns CPU on its worker thread for
/// `burn_for` without yielding or reporting intermediate progress, then
/// sends a single synthetic `Complete`. Not part of the production
/// contract; the HTTP route exposing it only exists under the
/// `pathological` feature.
pub fn spawn_pathological_worker(
    artifact: Artifact,
    burn_for: std::time::Duration,
) -> UnboundedReceiver<WorkerMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let started = Instant::now();
        let mut waste = 0.0f64;
        let mut i = 0u64;
        while started.elapsed() < burn_for {
            waste += (i as f64).sqrt() * (i as f64).sin() * (i as f64).cos();
            i = i.wrapping_add(1);
        }
        debug!(job_id = %artifact.job_id, waste, iterations = i, "synthetic load finished");

        let result = WorkerResult {
            kind: "synthetic-load".to_string(),
            metadata: ImageMetadata {
                width: 0,
                height: 0,
                format: "none".to_string(),
                size_bytes: artifact.bytes.len(),
            },
            thumbnail: ThumbnailRef {
                path: PathBuf::new(),
                bytes: 0,
            },
            sizes: Vec::new(),
            security: ScanReport {
                status: ScanStatus::Clean,
                patterns_found: 0,
                scanned_bytes: 0,
            },
            processing_ms: started.elapsed().as_millis() as u64,
        };
        let _ = tx.send(WorkerMessage::Complete(Box::new(result)));
    });
    rx
}
