//! Exports off the caller's task

use posecam::export::{read_manifest, CalibrationExporter};
use posecam::ingest::normalize;
use posecam::testing::{known_good_frame, synthetic_frame};
use posecam::CalibrationRecord;
use tempfile::tempdir;

fn recording(count: u64, start: f64) -> Vec<CalibrationRecord> {
    (0..count)
        .map(|i| normalize(&synthetic_frame(i, start + i as f64 * 0.1), Some(i)))
        .collect()
}

#[tokio::test]
async fn test_async_photo_export() {
    let dir = tempdir().unwrap();
    let record = normalize(&known_good_frame(), None);

    let path = CalibrationExporter::new()
        .export_photo_async(record, "photo_async.jpg".to_string(), dir.path().to_path_buf())
        .await
        .unwrap();

    assert_eq!(path, dir.path().join("photo_async_calibration.json"));
}

#[tokio::test]
async fn test_async_empty_video_is_noop() {
    let dir = tempdir().unwrap();
    let result = CalibrationExporter::new()
        .export_video_async(Vec::new(), "v.mp4".to_string(), dir.path().to_path_buf())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_parallel_exports_to_distinct_files() {
    let dir = tempdir().unwrap();
    let exporter = CalibrationExporter::new();

    let (a, b) = futures::join!(
        exporter.export_video_async(recording(4, 1.0), "a.mp4".to_string(), dir.path().to_path_buf()),
        exporter.export_video_async(recording(7, 2.0), "b.mp4".to_string(), dir.path().to_path_buf()),
    );

    let a = read_manifest(&a.unwrap().unwrap()).unwrap();
    let b = read_manifest(&b.unwrap().unwrap()).unwrap();
    assert_eq!(a.total_frames, 4);
    assert_eq!(b.total_frames, 7);
    assert_eq!(a.video_file_name, "a.mp4");
    assert_eq!(b.video_file_name, "b.mp4");
}

#[tokio::test]
async fn test_async_export_error_is_returned() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"x").unwrap();

    let result = CalibrationExporter::new()
        .export_video_async(recording(1, 0.0), "v.mp4".to_string(), blocker)
        .await;
    assert!(result.is_err());
}
