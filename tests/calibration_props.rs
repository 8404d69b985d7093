//! Property-based tests for calibration records and the session recorder
//!
//! Run with: cargo test --test calibration_props

use posecam::export::to_canonical_vec;
use posecam::ingest::normalize;
use posecam::testing::synthetic_frame;
use posecam::types::{intrinsic_matrix, EulerAngles, ImageResolution, Matrix4};
use posecam::{CalibrationRecord, LimitedReason, SessionRecorder, TrackingQuality};
use proptest::prelude::*;

fn quality_strategy() -> impl Strategy<Value = TrackingQuality> {
    prop_oneof![
        Just(TrackingQuality::Normal),
        Just(TrackingQuality::Unavailable),
        (0..LimitedReason::ALL.len()).prop_map(|i| TrackingQuality::Limited(LimitedReason::ALL[i])),
    ]
}

fn matrix4_strategy() -> impl Strategy<Value = Matrix4> {
    prop::array::uniform4(prop::array::uniform4(-100.0f32..100.0))
}

prop_compose! {
    fn record_strategy()(
        fx in 100.0f32..5000.0,
        fy in 100.0f32..5000.0,
        cx in 0.0f32..4000.0,
        cy in 0.0f32..3000.0,
        width in 1u32..8192,
        height in 1u32..8192,
        transform in matrix4_strategy(),
        projection in matrix4_strategy(),
        roll in -3.2f32..3.2,
        pitch in -3.2f32..3.2,
        yaw in -3.2f32..3.2,
        timestamp in 0.0f64..1.0e6,
        frame_index in proptest::option::of(0u64..1_000_000),
        quality in quality_strategy(),
    ) -> CalibrationRecord {
        CalibrationRecord::new(
            intrinsic_matrix(fx, fy, cx, cy),
            ImageResolution::new(width, height),
            transform,
            EulerAngles { roll, pitch, yaw },
            projection,
            timestamp,
            frame_index,
            quality,
        )
    }
}

fn close(a: f32, b: f32) -> bool {
    (a as f64 - b as f64).abs() <= 1e-6 * (1.0 + (a as f64).abs())
}

proptest! {
    /// Derived fields are exact copies of the source matrices
    #[test]
    fn derived_fields_match_matrices(record in record_strategy()) {
        let k = record.intrinsic_matrix();
        prop_assert_eq!(record.focal_length().fx, k[0][0]);
        prop_assert_eq!(record.focal_length().fy, k[1][1]);
        prop_assert_eq!(record.principal_point().cx, k[2][0]);
        prop_assert_eq!(record.principal_point().cy, k[2][1]);

        let t = record.transform_matrix();
        for column in 0..3 {
            for row in 0..3 {
                prop_assert_eq!(record.rotation_matrix()[column][row], t[column][row]);
            }
        }
        prop_assert_eq!(record.translation_vector(), [t[3][0], t[3][1], t[3][2]]);
    }

    /// Serialized then parsed records agree within 1e-6; state and index exactly
    #[test]
    fn json_round_trip(record in record_strategy()) {
        let bytes = to_canonical_vec(&record, 2).unwrap();
        let parsed: CalibrationRecord = serde_json::from_slice(&bytes).unwrap();

        prop_assert_eq!(parsed.tracking_quality(), record.tracking_quality());
        prop_assert_eq!(parsed.frame_index(), record.frame_index());
        prop_assert!((parsed.timestamp() - record.timestamp()).abs() <= 1e-6);
        prop_assert_eq!(parsed.image_resolution(), record.image_resolution());

        for column in 0..4 {
            for row in 0..4 {
                prop_assert!(close(
                    parsed.transform_matrix()[column][row],
                    record.transform_matrix()[column][row]
                ));
                prop_assert!(close(
                    parsed.projection_matrix()[column][row],
                    record.projection_matrix()[column][row]
                ));
            }
        }
        for column in 0..3 {
            for row in 0..3 {
                prop_assert!(close(
                    parsed.intrinsic_matrix()[column][row],
                    record.intrinsic_matrix()[column][row]
                ));
            }
        }
        let (a, b) = (parsed.euler_angles(), record.euler_angles());
        prop_assert!(close(a.roll, b.roll) && close(a.pitch, b.pitch) && close(a.yaw, b.yaw));
    }

    /// Canonical output is byte-identical across runs
    #[test]
    fn canonical_output_is_stable(record in record_strategy()) {
        let first = to_canonical_vec(&record, 2).unwrap();
        let reparsed: CalibrationRecord = serde_json::from_slice(&first).unwrap();
        prop_assert_eq!(first, to_canonical_vec(&reparsed, 2).unwrap());
    }

    /// Every window yields indices 0..N-1 in order
    #[test]
    fn frame_indices_are_contiguous(count in 0usize..200) {
        let recorder = SessionRecorder::new();
        recorder.start();
        for i in 0..count {
            recorder.append(normalize(&synthetic_frame(i as u64, i as f64), None));
        }
        let frames = recorder.stop();

        prop_assert_eq!(frames.len(), count);
        for (i, frame) in frames.iter().enumerate() {
            prop_assert_eq!(frame.frame_index(), Some(i as u64));
            prop_assert_eq!(frame.timestamp(), i as f64);
        }
    }

    /// Appends while idle never reach a later window
    #[test]
    fn idle_appends_are_discarded(before in 0usize..20, during in 0usize..20, after in 0usize..20) {
        let recorder = SessionRecorder::new();
        let record = |i: usize| normalize(&synthetic_frame(i as u64, i as f64), None);

        for i in 0..before {
            prop_assert_eq!(recorder.append(record(i)), None);
        }
        recorder.start();
        for i in 0..during {
            recorder.append(record(i));
        }
        prop_assert_eq!(recorder.stop().len(), during);
        for i in 0..after {
            prop_assert_eq!(recorder.append(record(i)), None);
        }
        prop_assert!(recorder.stop().is_empty());
    }

    /// Restarting discards the previous window entirely
    #[test]
    fn restart_clears_previous_window(first in 0usize..50, second in 0usize..50) {
        let recorder = SessionRecorder::new();
        recorder.start();
        for i in 0..first {
            recorder.append(normalize(&synthetic_frame(i as u64, i as f64), None));
        }
        recorder.start();
        for i in 0..second {
            recorder.append(normalize(&synthetic_frame(i as u64, 1000.0 + i as f64), None));
        }
        let frames = recorder.stop();

        prop_assert_eq!(frames.len(), second);
        prop_assert!(frames.iter().all(|f| f.timestamp() >= 1000.0));
        prop_assert_eq!(frames.first().and_then(|f| f.frame_index()), (second > 0).then_some(0));
    }
}
