use serde::{Deserialize, Serialize};

use crate::types::CalibrationRecord;

/// Video sidecar: the full frame sequence of one recording window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub frames: Vec<CalibrationRecord>,
    pub video_file_name: String,
    /// Timestamp of the first buffered record
    pub recording_start_time: f64,
    /// Timestamp of the last buffered record
    pub recording_end_time: f64,
    pub total_frames: usize,
    /// Tracking timestamp corresponding to video PTS 0
    pub session_start_time: f64,
}

/// A frame whose timestamp disagrees with the decoded video
#[derive(Debug, Clone, PartialEq)]
pub struct Misalignment {
    pub frame_index: usize,
    pub expected_timestamp: f64,
    pub video_timestamp: f64,
}

impl ExportManifest {
    /// Build a manifest for `records`; `None` for an empty recording.
    pub fn from_records(
        video_file_name: impl Into<String>,
        records: &[CalibrationRecord],
    ) -> Option<Self> {
        let first = records.first()?.timestamp();
        let last = records.last()?.timestamp();

        Some(Self {
            frames: records.to_vec(),
            video_file_name: video_file_name.into(),
            recording_start_time: first,
            recording_end_time: last,
            total_frames: records.len(),
            session_start_time: first,
        })
    }

    /// Use a video timeline origin other than the first record.
    pub fn with_session_start_time(mut self, session_start_time: f64) -> Self {
        self.session_start_time = session_start_time;
        self
    }

    pub fn duration_secs(&self) -> f64 {
        self.recording_end_time - self.recording_start_time
    }

    /// PTS each frame should have in the paired video
    pub fn expected_pts(&self) -> Vec<f64> {
        self.frames
            .iter()
            .map(|r| r.timestamp() - self.session_start_time)
            .collect()
    }

    /// Compare decoded video PTS against frame timestamps.
    ///
    /// Frame `i` is aligned when `session_start_time + video_pts[i]` is
    /// within `tolerance` seconds of its timestamp. Frames missing on either
    /// side are reported with a NaN counterpart.
    pub fn misaligned_frames(&self, video_pts: &[f64], tolerance: f64) -> Vec<Misalignment> {
        let len = self.frames.len().max(video_pts.len());
        (0..len)
            .filter_map(|i| {
                let expected = self.frames.get(i).map_or(f64::NAN, |r| r.timestamp());
                let actual = video_pts
                    .get(i)
                    .map_or(f64::NAN, |pts| pts + self.session_start_time);
                let aligned = (expected - actual).abs() < tolerance;
                (!aligned).then_some(Misalignment {
                    frame_index: i,
                    expected_timestamp: expected,
                    video_timestamp: actual,
                })
            })
            .collect()
    }

    /// Frame indices are `0..total_frames` with no gaps or repeats
    pub fn has_contiguous_indices(&self) -> bool {
        self.total_frames == self.frames.len()
            && self
                .frames
                .iter()
                .enumerate()
                .all(|(i, r)| r.frame_index() == Some(i as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize;
    use crate::testing::synthetic_frame;

    fn records(timestamps: &[f64]) -> Vec<CalibrationRecord> {
        timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| normalize(&synthetic_frame(i as u64, *ts), Some(i as u64)))
            .collect()
    }

    #[test]
    fn test_empty_records_have_no_manifest() {
        assert!(ExportManifest::from_records("video.mp4", &[]).is_none());
    }

    #[test]
    fn test_times_come_from_records() {
        let manifest = ExportManifest::from_records("clip.mp4", &records(&[100.0, 100.5, 101.25]))
            .unwrap();
        assert_eq!(manifest.video_file_name, "clip.mp4");
        assert_eq!(manifest.recording_start_time, 100.0);
        assert_eq!(manifest.recording_end_time, 101.25);
        assert_eq!(manifest.session_start_time, 100.0);
        assert_eq!(manifest.total_frames, 3);
        assert_eq!(manifest.duration_secs(), 1.25);
        assert!(manifest.has_contiguous_indices());
    }

    #[test]
    fn test_alignment_check() {
        let manifest = ExportManifest::from_records("clip.mp4", &records(&[10.0, 10.5, 11.0]))
            .unwrap();
        assert_eq!(manifest.expected_pts(), vec![0.0, 0.5, 1.0]);
        assert!(manifest.misaligned_frames(&[0.0, 0.5, 1.0], 1e-3).is_empty());

        let bad = manifest.misaligned_frames(&[0.0, 0.6, 1.0], 1e-3);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].frame_index, 1);

        // A missing video frame is reported too
        let short = manifest.misaligned_frames(&[0.0, 0.5], 1e-3);
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].frame_index, 2);
        assert!(short[0].video_timestamp.is_nan());
    }

    #[test]
    fn test_serialized_keys_are_camel_case() {
        let manifest = ExportManifest::from_records("clip.mp4", &records(&[1.0])).unwrap();
        let value = serde_json::to_value(&manifest).unwrap();
        for key in [
            "frames",
            "videoFileName",
            "recordingStartTime",
            "recordingEndTime",
            "totalFrames",
            "sessionStartTime",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
