mod common;

use common::*;
use packcam::core::orchestrator::Orchestrator;
use packcam::core::status::Cue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

fn orchestrator(dir: &std::path::Path) -> (Orchestrator, Arc<ScriptedBackend>, Arc<RecordingStatusSink>, Arc<RecordingCuePlayer>) {
    let backend = ScriptedBackend::new();
    let status = Arc::new(RecordingStatusSink::default());
    let cues = Arc::new(RecordingCuePlayer::default());
    let orchestrator = Orchestrator::new(test_config(dir), backend.clone(), status.clone(), cues.clone()).unwrap();
    (orchestrator, backend, status, cues)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scanned_label_records_until_stopped_by_operator() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, backend, status, cues) = orchestrator(dir.path());
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    orchestrator.start(Some(report_tx)).unwrap();

    let first_sweep = tokio::time::timeout(WAIT, report_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first_sweep.deleted_count, 0);

    assert!(wait_until_async(WAIT, || status.saw("1", "Waiting") && status.saw("2", "Waiting")).await);
    backend.show_label(1, "ORD100");
    assert!(wait_until_async(WAIT, || status.saw("1", "Recording:ORD100")).await);
    backend.hide_label(1);

    let active = orchestrator.active_recordings();
    assert_eq!(active.len(), 1);
    assert_eq!((active[0].camera_id.as_str(), active[0].order_code.as_str()), ("1", "ORD100"));
    let in_progress = orchestrator.find_in_archive("ORD100").unwrap().unwrap();
    assert!(in_progress.recording_now);

    let record = tokio::task::block_in_place(|| orchestrator.stop_recording("1")).unwrap().unwrap();
    assert_eq!(record.file_name, "ORD100.mp4");
    assert!(orchestrator.active_recordings().is_empty());
    assert!(cues.played().contains(&Cue::RecordingStopped));
    assert!(orchestrator.stop_recording("ghost").is_err());
    let listed = orchestrator.list_archive().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].recording_now);
    assert_eq!(listed[0].camera_display(), "Bench");

    orchestrator.shutdown().await;
    let layout = orchestrator.coordinator().layout().clone();
    assert!(layout.video_path("ORD100").exists());
    assert!(layout.metadata_path("ORD100").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn label_seen_by_two_cameras_is_recorded_once() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, backend, status, _cues) = orchestrator(dir.path());
    orchestrator.start(None).unwrap();

    backend.show_label(1, "ORD200");
    assert!(wait_until_async(WAIT, || status.saw("1", "Recording:ORD200")).await);
    backend.show_label(2, "ORD200");
    assert!(wait_until_async(WAIT, || status.saw("2", "Busy:ORD200@Bench")).await);
    backend.hide_label(1);
    backend.hide_label(2);

    let active = orchestrator.active_recordings();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].camera_id, "1");

    orchestrator.shutdown().await;
    assert!(orchestrator.active_recordings().is_empty());
    assert_eq!(backend.writers_opened().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_finalizes_active_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, backend, status, _cues) = orchestrator(dir.path());
    orchestrator.start(None).unwrap();

    backend.show_label(2, "ORD300");
    assert!(wait_until_async(WAIT, || status.saw("2", "Recording:ORD300")).await);

    let started = std::time::Instant::now();
    orchestrator.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(8));

    let layout = orchestrator.coordinator().layout();
    let record = packcam::core::persistence::read_metadata(&layout.metadata_path("ORD300")).unwrap();
    assert_eq!(record.camera_name, "Dock");
    assert!(orchestrator.active_recordings().is_empty());
    assert!(!orchestrator.shutdown_signal().is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unreachable_camera_reconnects_when_it_comes_back() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, backend, status, _cues) = orchestrator(dir.path());
    backend.set_unreachable(2, true);
    orchestrator.start(None).unwrap();

    assert!(wait_until_async(WAIT, || status.saw("2", "ConnectionError")).await);
    assert!(!status.saw("2", "Connected"));
    assert!(status.saw("1", "Connected") || wait_until_async(WAIT, || status.saw("1", "Connected")).await);

    backend.set_unreachable(2, false);
    assert!(wait_until_async(WAIT, || status.saw("2", "Connected")).await);

    orchestrator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reload_rebuilds_cameras_and_saves_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, backend, status, _cues) = orchestrator(dir.path());
    orchestrator.start(None).unwrap();

    backend.show_label(1, "ORD400");
    assert!(wait_until_async(WAIT, || status.saw("1", "Recording:ORD400")).await);
    backend.hide_label(1);

    let mut new_config = test_config(dir.path());
    new_config.cameras.truncate(1);
    new_config.cameras[0].name = "Bench 2".into();
    orchestrator.reload(new_config).await.unwrap();

    assert!(orchestrator.coordinator().layout().metadata_path("ORD400").exists());
    assert_eq!(orchestrator.cameras().len(), 1);
    assert_eq!(orchestrator.cameras().get("1").unwrap().name(), "Bench 2");
    assert!(orchestrator.active_recordings().is_empty());

    orchestrator.shutdown().await;
}

#[test]
fn hung_device_open_does_not_hold_up_exit() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, backend, _status, _cues) = orchestrator(dir.path());
    backend.stall_capture_opens(Duration::from_secs(30));
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();

    let started = Instant::now();
    runtime.block_on(async {
        orchestrator.start(None).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        orchestrator.shutdown().await;
    });
    drop(runtime);

    // Bounded by shutdown_join_timeout_secs (2 s) plus slack, not by the 30 s open.
    assert!(started.elapsed() < Duration::from_secs(8), "{:?}", started.elapsed());
}
