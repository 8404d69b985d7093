//! Reading sidecars back and pairing them with media on disk

use posecam::export::{find_pairs, read_sidecar, CalibrationExporter, Sidecar};
use posecam::ingest::normalize;
use posecam::testing::{known_good_frame, synthetic_frame};
use posecam::CalibrationRecord;
use std::fs;
use tempfile::tempdir;

fn recording(count: u64) -> Vec<CalibrationRecord> {
    (0..count)
        .map(|i| normalize(&synthetic_frame(i, 10.0 + i as f64 * 0.5), Some(i)))
        .collect()
}

#[test]
fn test_read_sidecar_detects_kind() {
    let dir = tempdir().unwrap();
    let exporter = CalibrationExporter::new();
    let record = normalize(&known_good_frame(), None);

    let photo = exporter.export_photo(&record, "p.jpg", dir.path()).unwrap();
    let video = exporter
        .export_video(&recording(3), "v.mp4", dir.path())
        .unwrap()
        .unwrap();

    match read_sidecar(&photo).unwrap() {
        Sidecar::Photo(parsed) => assert_eq!(parsed.timestamp(), record.timestamp()),
        other => panic!("expected photo sidecar, got {:?}", other),
    }
    let video = read_sidecar(&video).unwrap();
    assert_eq!(video.frame_count(), 3);
    assert!(matches!(video, Sidecar::Video(ref m) if m.video_file_name == "v.mp4"));
}

#[test]
fn test_read_sidecar_missing_file() {
    let dir = tempdir().unwrap();
    let err = read_sidecar(&dir.path().join("absent_calibration.json")).unwrap_err();
    assert!(matches!(err, posecam::CalibrationError::Io(_)));
}

#[test]
fn test_read_sidecar_malformed_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken_calibration.json");
    fs::write(&path, "{ \"frames\": ").unwrap();
    assert!(matches!(
        read_sidecar(&path),
        Err(posecam::CalibrationError::Serialization(_))
    ));
}

#[test]
fn test_find_pairs_matches_media_by_stem() {
    let dir = tempdir().unwrap();
    let exporter = CalibrationExporter::new();
    let record = normalize(&known_good_frame(), None);

    fs::write(dir.path().join("photo_1.jpg"), b"jpeg").unwrap();
    exporter.export_photo(&record, "photo_1.jpg", dir.path()).unwrap();
    fs::write(dir.path().join("video_1.mp4"), b"mp4").unwrap();
    exporter
        .export_video(&recording(2), "video_1.mp4", dir.path())
        .unwrap();
    // Sidecar whose media was moved away
    exporter.export_photo(&record, "photo_2.jpg", dir.path()).unwrap();
    fs::write(dir.path().join("notes.txt"), b"unrelated").unwrap();

    let pairs = find_pairs(dir.path(), "_calibration").unwrap();
    assert_eq!(pairs.len(), 3);

    assert_eq!(pairs[0].calibration, dir.path().join("photo_1_calibration.json"));
    assert_eq!(pairs[0].media, Some(dir.path().join("photo_1.jpg")));
    assert_eq!(pairs[1].calibration, dir.path().join("photo_2_calibration.json"));
    assert_eq!(pairs[1].media, None);
    assert_eq!(pairs[2].media, Some(dir.path().join("video_1.mp4")));
}

#[test]
fn test_find_pairs_custom_suffix() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("shot.png"), b"png").unwrap();
    fs::write(dir.path().join("shot.cal.json"), b"{}").unwrap();
    fs::write(dir.path().join("shot_calibration.json"), b"{}").unwrap();

    let pairs = find_pairs(dir.path(), ".cal").unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].calibration, dir.path().join("shot.cal.json"));
    assert_eq!(pairs[0].media, Some(dir.path().join("shot.png")));
}

#[test]
fn test_find_pairs_empty_directory() {
    let dir = tempdir().unwrap();
    assert!(find_pairs(dir.path(), "_calibration").unwrap().is_empty());
}

#[test]
fn test_find_pairs_missing_directory() {
    let dir = tempdir().unwrap();
    assert!(find_pairs(&dir.path().join("nope"), "_calibration").is_err());
}
