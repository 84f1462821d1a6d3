mod common;

use common::{artifact, noise_png};
use fileforge::data_model::{ScanStatus, WorkerMessage};
use fileforge::worker::{spawn_worker, WorkerConfig};
use tokio::sync::mpsc::UnboundedReceiver;

fn test_config(dir: &tempfile::TempDir) -> WorkerConfig {
    WorkerConfig {
        thumbnail_dir: dir.path().to_path_buf(),
        ..WorkerConfig::default()
    }
}

async fn drain(mut rx: UnboundedReceiver<WorkerMessage>) -> Vec<WorkerMessage> {
    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }
    messages
}

#[tokio::test]
async fn pipeline_emits_ordered_progress_then_single_complete() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(&dir);
    let art = artifact("photo.png", noise_png(64, 48));
    let job_id = art.job_id;

    let messages = drain(spawn_worker(art, cfg.clone())).await;

    // The terminal message is last and unique.
    let terminals = messages
        .iter()
        .filter(|m| matches!(m, WorkerMessage::Complete(_) | WorkerMessage::Error { .. }))
        .count();
    assert_eq!(terminals, 1);
    let WorkerMessage::Complete(result) = messages.last().unwrap() else {
        panic!("expected a Complete terminal message");
    };

    // Progress percents are non-decreasing and bounded.
    let mut last = 0u8;
    for message in &messages {
        if let WorkerMessage::Progress(event) = message {
            assert!(event.percent >= last, "percent regressed: {:?}", event);
            assert!(event.percent <= 100);
            last = event.percent;
        }
    }
    assert_eq!(last, 100);

    assert_eq!(result.kind, "image");
    assert_eq!(result.metadata.width, 64);
    assert_eq!(result.metadata.height, 48);
    assert_eq!(result.metadata.format, "png");
    assert!(result.processing_ms > 0);

    // Derived artifacts land under job-id-derived names.
    assert_eq!(result.thumbnail.path, cfg.main_thumbnail_path(job_id));
    assert!(result.thumbnail.path.exists());
    assert!(result.thumbnail.bytes > 0);
    assert_eq!(result.sizes.len(), cfg.thumbnail_sizes.len());
    for sized in &result.sizes {
        assert_eq!(sized.path, cfg.sized_thumbnail_path(job_id, sized.size));
        assert!(sized.path.exists());
    }

    assert_eq!(result.security.status, ScanStatus::Clean);
    assert!(result.security.scanned_bytes > 0);
}

#[tokio::test]
async fn undecodable_artifact_yields_single_error_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let art = artifact("not-an-image.png", b"definitely not image bytes".to_vec());

    let messages = drain(spawn_worker(art, test_config(&dir))).await;

    let Some(WorkerMessage::Error { error }) = messages.last() else {
        panic!("expected an Error terminal message, got {:?}", messages.last());
    };
    assert!(!error.is_empty());
    assert_eq!(
        messages
            .iter()
            .filter(|m| matches!(m, WorkerMessage::Complete(_) | WorkerMessage::Error { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn concurrent_jobs_never_collide_on_thumbnail_names() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(&dir);

    let a = artifact("a.png", noise_png(32, 32));
    let b = artifact("b.png", noise_png(32, 32));
    let (id_a, id_b) = (a.job_id, b.job_id);

    let (msgs_a, msgs_b) = tokio::join!(
        drain(spawn_worker(a, cfg.clone())),
        drain(spawn_worker(b, cfg.clone()))
    );

    for (messages, id) in [(msgs_a, id_a), (msgs_b, id_b)] {
        let WorkerMessage::Complete(result) = messages.last().unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(result.thumbnail.path, cfg.main_thumbnail_path(id));
        assert!(result.thumbnail.path.exists());
    }
}
