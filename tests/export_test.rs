//! Sidecar export: naming, overwrite, empty recordings and on-disk shape

use posecam::export::{read_manifest, read_photo_sidecar, CalibrationExporter, ExportManifest};
use posecam::ingest::normalize;
use posecam::testing::{known_good_frame, synthetic_frame};
use posecam::types::RawTrackingState;
use posecam::{CalibrationError, CalibrationRecord};
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

fn recording(count: u64) -> Vec<CalibrationRecord> {
    (0..count)
        .map(|i| normalize(&synthetic_frame(i, 100.0 + i as f64 / 30.0), Some(i)))
        .collect()
}

fn as_f32(value: &Value) -> f32 {
    value.as_f64().expect("number") as f32
}

fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn test_photo_sidecar_naming() {
    let dir = tempdir().unwrap();
    let record = normalize(&known_good_frame(), None);

    let path = CalibrationExporter::new()
        .export_photo(&record, "photo_abc123.jpg", dir.path())
        .unwrap();

    assert_eq!(path, dir.path().join("photo_abc123_calibration.json"));
    assert!(path.exists());
}

#[test]
fn test_reexport_overwrites_without_duplicates() {
    let dir = tempdir().unwrap();
    let exporter = CalibrationExporter::new();

    let first = normalize(&synthetic_frame(0, 1.0), None);
    let second = normalize(&synthetic_frame(1, 2.0), None);
    exporter.export_photo(&first, "photo_abc123.jpg", dir.path()).unwrap();
    exporter.export_photo(&second, "photo_abc123.jpg", dir.path()).unwrap();

    assert_eq!(file_names(dir.path()), vec!["photo_abc123_calibration.json"]);
    let parsed = read_photo_sidecar(&dir.path().join("photo_abc123_calibration.json")).unwrap();
    assert_eq!(parsed.timestamp(), 2.0);
}

#[test]
fn test_empty_video_export_writes_nothing() {
    let dir = tempdir().unwrap();
    let result = CalibrationExporter::new()
        .export_video(&[], "video_1.mp4", dir.path())
        .unwrap();

    assert!(result.is_none());
    assert!(file_names(dir.path()).is_empty());
}

#[test]
fn test_video_manifest_fields() {
    let dir = tempdir().unwrap();
    let frames = recording(5);

    let path = CalibrationExporter::new()
        .export_video(&frames, "video_1.mp4", dir.path())
        .unwrap()
        .unwrap();
    assert_eq!(path, dir.path().join("video_1_calibration.json"));

    let manifest = read_manifest(&path).unwrap();
    assert_eq!(manifest.video_file_name, "video_1.mp4");
    assert_eq!(manifest.total_frames, 5);
    assert_eq!(manifest.recording_start_time, frames[0].timestamp());
    assert_eq!(manifest.recording_end_time, frames[4].timestamp());
    assert_eq!(manifest.session_start_time, frames[0].timestamp());
    assert_eq!(manifest.frames, frames);
    assert!(manifest.has_contiguous_indices());
}

#[test]
fn test_record_json_shape() {
    let dir = tempdir().unwrap();
    let mut frame = known_good_frame();
    frame.tracking_state = RawTrackingState::limited("excessiveMotion");
    let record = normalize(&frame, None);

    let path = CalibrationExporter::new()
        .export_photo(&record, "shape.jpg", dir.path())
        .unwrap();
    let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

    let intrinsics = &value["intrinsics"];
    assert_eq!(as_f32(&intrinsics["focal_length"]["fx"]), 1598.2262);
    assert_eq!(as_f32(&intrinsics["focal_length"]["fy"]), 1598.2262);
    assert_eq!(as_f32(&intrinsics["principal_point"]["cx"]), 954.47565);
    assert_eq!(as_f32(&intrinsics["principal_point"]["cy"]), 714.5876);
    assert_eq!(intrinsics["image_resolution"]["width"], 1920);
    assert_eq!(intrinsics["image_resolution"]["height"], 1440);
    assert_eq!(as_f32(&intrinsics["matrix"][2][0]), 954.47565);

    let extrinsics = &value["extrinsics"];
    let translation: Vec<f32> = (0..3)
        .map(|i| as_f32(&extrinsics["translation_vector"][i]))
        .collect();
    assert_eq!(translation, vec![0.0123, -0.0456, 0.789]);
    assert!(extrinsics["rotation_matrix"].is_array());
    assert!(extrinsics["transform_matrix"].is_array());
    assert!(extrinsics["euler_angles"]["roll"].is_number());

    assert!(value["projection_matrix"].is_array());
    assert_eq!(value["timestamp"], serde_json::json!(85732.416783));
    assert!(value["frame_index"].is_null());
    assert_eq!(value["tracking_state"], "limited");
    assert_eq!(value["tracking_state_reason"], "excessive_motion");
}

#[test]
fn test_keys_are_sorted_and_indented() {
    let dir = tempdir().unwrap();
    let path = CalibrationExporter::new()
        .export_video(&recording(2), "video_2.mp4", dir.path())
        .unwrap()
        .unwrap();
    let text = fs::read_to_string(path).unwrap();

    let top_level: Vec<&str> = text
        .lines()
        .filter(|l| l.starts_with("  \"") && !l.starts_with("   "))
        .map(|l| l.trim_start().split('"').nth(1).unwrap())
        .collect();
    assert_eq!(
        top_level,
        vec![
            "frames",
            "recordingEndTime",
            "recordingStartTime",
            "sessionStartTime",
            "totalFrames",
            "videoFileName"
        ]
    );
    assert!(text.ends_with("}\n"));
}

#[test]
fn test_exports_are_byte_identical() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let frames = recording(3);
    let exporter = CalibrationExporter::new();

    let pa = exporter.export_video(&frames, "v.mp4", a.path()).unwrap().unwrap();
    let pb = exporter.export_video(&frames, "v.mp4", b.path()).unwrap().unwrap();
    assert_eq!(fs::read(pa).unwrap(), fs::read(pb).unwrap());
}

#[test]
fn test_unwritable_directory_is_io_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, b"file").unwrap();

    let record = normalize(&known_good_frame(), None);
    let err = CalibrationExporter::new()
        .export_photo(&record, "photo.jpg", &blocker)
        .unwrap_err();

    assert!(matches!(err, CalibrationError::Io(_)));
    assert!(err.is_recoverable());
}

#[test]
fn test_failed_export_leaves_recording_usable() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocked");
    fs::write(&blocker, b"file").unwrap();
    let frames = recording(3);
    let exporter = CalibrationExporter::new();

    assert!(exporter.export_video(&frames, "v.mp4", &blocker).is_err());
    // Same records can still be exported elsewhere
    let path = exporter.export_video(&frames, "v.mp4", dir.path()).unwrap();
    assert!(path.is_some());
}

#[test]
fn test_manifest_with_session_start() {
    let dir = tempdir().unwrap();
    let manifest = ExportManifest::from_records("v.mp4", &recording(3))
        .unwrap()
        .with_session_start_time(99.5);

    let path = CalibrationExporter::new()
        .with_indent(4)
        .export_manifest(&manifest, dir.path())
        .unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n    \"sessionStartTime\": 99.5"));
    assert_eq!(read_manifest(&path).unwrap().session_start_time, 99.5);
}

#[test]
fn test_nan_angle_is_rejected_before_writing() {
    let dir = tempdir().unwrap();
    let mut frame = known_good_frame();
    frame.euler_angles.yaw = f32::NAN;
    let record = normalize(&frame, None);

    let err = CalibrationExporter::new()
        .export_photo(&record, "photo_nan.jpg", dir.path())
        .unwrap_err();

    assert!(matches!(err, CalibrationError::InvalidArgument(_)));
    assert!(file_names(dir.path()).is_empty());
}

#[test]
fn test_non_finite_frame_fails_whole_manifest() {
    let dir = tempdir().unwrap();
    let mut frames = recording(3);
    let mut frame = synthetic_frame(3, 100.1);
    frame.camera_transform[3][0] = f32::INFINITY;
    frames.push(normalize(&frame, Some(3)));

    let err = CalibrationExporter::new()
        .export_video(&frames, "v.mp4", dir.path())
        .unwrap_err();
    assert!(matches!(err, CalibrationError::InvalidArgument(_)));
    assert!(file_names(dir.path()).is_empty());

    let manifest = ExportManifest::from_records("w.mp4", &recording(2))
        .unwrap()
        .with_session_start_time(f64::NAN);
    assert!(CalibrationExporter::new()
        .export_manifest(&manifest, dir.path())
        .is_err());
    assert!(file_names(dir.path()).is_empty());
}
