//! On-disk JSON shape of calibration sidecars
//!
//! These documents are the serde view of [`CalibrationRecord`] and
//! [`ExportManifest`](super::ExportManifest). Field names are the persisted
//! keys; key ordering is applied by the canonical writer, not here.

use serde::{Deserialize, Serialize};

use crate::types::{
    CalibrationRecord, EulerAngles, FocalLength, ImageResolution, Matrix3, Matrix4,
    PrincipalPoint, TrackingQuality, Vector3,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrinsicsDocument {
    pub matrix: Matrix3,
    pub focal_length: FocalLength,
    pub principal_point: PrincipalPoint,
    pub image_resolution: ImageResolution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtrinsicsDocument {
    pub transform_matrix: Matrix4,
    pub rotation_matrix: Matrix3,
    pub translation_vector: Vector3,
    pub euler_angles: EulerAngles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDocument {
    pub intrinsics: IntrinsicsDocument,
    pub extrinsics: ExtrinsicsDocument,
    pub projection_matrix: Matrix4,
    pub timestamp: f64,
    pub frame_index: Option<u64>,
    pub tracking_state: String,
    pub tracking_state_reason: Option<String>,
}

impl From<CalibrationRecord> for RecordDocument {
    fn from(record: CalibrationRecord) -> Self {
        let quality = record.tracking_quality();
        RecordDocument {
            intrinsics: IntrinsicsDocument {
                matrix: *record.intrinsic_matrix(),
                focal_length: record.focal_length(),
                principal_point: record.principal_point(),
                image_resolution: record.image_resolution(),
            },
            extrinsics: ExtrinsicsDocument {
                transform_matrix: *record.transform_matrix(),
                rotation_matrix: *record.rotation_matrix(),
                translation_vector: record.translation_vector(),
                euler_angles: record.euler_angles(),
            },
            projection_matrix: *record.projection_matrix(),
            timestamp: record.timestamp(),
            frame_index: record.frame_index(),
            tracking_state: quality.state_str().to_string(),
            tracking_state_reason: quality.reason_str().map(str::to_string),
        }
    }
}

// Derived fields are recomputed from the matrices rather than trusted from
// the file, so a parsed record upholds the same invariants as a fresh one.
impl From<RecordDocument> for CalibrationRecord {
    fn from(doc: RecordDocument) -> Self {
        CalibrationRecord::new(
            doc.intrinsics.matrix,
            doc.intrinsics.image_resolution,
            doc.extrinsics.transform_matrix,
            doc.extrinsics.euler_angles,
            doc.projection_matrix,
            doc.timestamp,
            doc.frame_index,
            TrackingQuality::from_parts(
                &doc.tracking_state,
                doc.tracking_state_reason.as_deref(),
            ),
        )
    }
}
