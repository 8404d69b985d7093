//! Core calibration types
//!
//! Matrices are column-major and indexed `[column][row]`, the layout used by
//! the tracking providers this crate consumes. The intrinsic matrix therefore
//! holds the principal point in its third column:
//!
//! ```text
//! K[0] = [fx, 0,  0]
//! K[1] = [0,  fy, 0]
//! K[2] = [cx, cy, 1]
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::export::schema::RecordDocument;

/// 3x3 matrix, `[column][row]`
pub type Matrix3 = [[f32; 3]; 3];
/// 4x4 matrix, `[column][row]`
pub type Matrix4 = [[f32; 4]; 4];
pub type Vector3 = [f32; 3];

pub const IDENTITY3: Matrix3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

pub const IDENTITY4: Matrix4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Upper-left 3x3 block of a pose transform.
pub fn rotation_of(transform: &Matrix4) -> Matrix3 {
    let mut rotation = [[0.0f32; 3]; 3];
    for (column, out) in rotation.iter_mut().enumerate() {
        out.copy_from_slice(&transform[column][..3]);
    }
    rotation
}

/// Translation column of a pose transform.
pub fn translation_of(transform: &Matrix4) -> Vector3 {
    [transform[3][0], transform[3][1], transform[3][2]]
}

/// Build an intrinsic matrix from focal length and principal point.
pub fn intrinsic_matrix(fx: f32, fy: f32, cx: f32, cy: f32) -> Matrix3 {
    [[fx, 0.0, 0.0], [0.0, fy, 0.0], [cx, cy, 1.0]]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalLength {
    pub fx: f32,
    pub fy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrincipalPoint {
    pub cx: f32,
    pub cy: f32,
}

/// Pixel dimensions the intrinsics were computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageResolution {
    pub width: u32,
    pub height: u32,
}

impl ImageResolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Provider-supplied orientation in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Why tracking is limited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitedReason {
    ExcessiveMotion,
    InsufficientFeatures,
    Initializing,
    Relocalizing,
    Unknown,
}

impl LimitedReason {
    pub const ALL: [LimitedReason; 5] = [
        LimitedReason::ExcessiveMotion,
        LimitedReason::InsufficientFeatures,
        LimitedReason::Initializing,
        LimitedReason::Relocalizing,
        LimitedReason::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitedReason::ExcessiveMotion => "excessive_motion",
            LimitedReason::InsufficientFeatures => "insufficient_features",
            LimitedReason::Initializing => "initializing",
            LimitedReason::Relocalizing => "relocalizing",
            LimitedReason::Unknown => "unknown",
        }
    }

    /// Map a provider reason to a known value.
    ///
    /// Accepts snake_case and camelCase spellings; anything else is `Unknown`.
    pub fn from_provider(raw: &str) -> Self {
        let folded: String = raw
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "excessivemotion" => LimitedReason::ExcessiveMotion,
            "insufficientfeatures" => LimitedReason::InsufficientFeatures,
            "initializing" => LimitedReason::Initializing,
            "relocalizing" => LimitedReason::Relocalizing,
            _ => {
                log::debug!("Unrecognized tracking reason '{}', mapping to unknown", raw);
                LimitedReason::Unknown
            }
        }
    }
}

/// Tracking quality of a normalized record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingQuality {
    Normal,
    Limited(LimitedReason),
    Unavailable,
}

impl TrackingQuality {
    /// Value of the `tracking_state` JSON field
    pub fn state_str(&self) -> &'static str {
        match self {
            TrackingQuality::Normal => "normal",
            TrackingQuality::Limited(_) => "limited",
            TrackingQuality::Unavailable => "not_available",
        }
    }

    /// Value of the `tracking_state_reason` JSON field
    pub fn reason_str(&self) -> Option<&'static str> {
        match self {
            TrackingQuality::Limited(reason) => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Rebuild from the two persisted fields. Unknown states read back as
    /// `Unavailable`; a limited state without a reason reads as `Unknown`.
    pub fn from_parts(state: &str, reason: Option<&str>) -> Self {
        match state {
            "normal" => TrackingQuality::Normal,
            "limited" => TrackingQuality::Limited(
                reason
                    .map(LimitedReason::from_provider)
                    .unwrap_or(LimitedReason::Unknown),
            ),
            "not_available" => TrackingQuality::Unavailable,
            other => {
                log::warn!("Unrecognized tracking state '{}', treating as not_available", other);
                TrackingQuality::Unavailable
            }
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, TrackingQuality::Normal)
    }
}

/// Tracking state as reported by a provider, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawTrackingState {
    Normal,
    Limited { reason: Option<String> },
    NotAvailable,
}

impl RawTrackingState {
    pub fn limited(reason: impl Into<String>) -> Self {
        RawTrackingState::Limited {
            reason: Some(reason.into()),
        }
    }
}

/// RGB24 pixels attached to a provider frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<u8>>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::new(data),
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }
}

/// One frame handed over by a tracking provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFrame {
    pub intrinsics: Matrix3,
    pub image_resolution: ImageResolution,
    pub camera_transform: Matrix4,
    pub projection_matrix: Matrix4,
    pub euler_angles: EulerAngles,
    /// Seconds, monotonic within a tracking session
    pub timestamp: f64,
    pub tracking_state: RawTrackingState,
    pub image: Option<FrameImage>,
}

/// Normalized per-frame calibration
///
/// Derived fields (focal length, principal point, rotation, translation)
/// are computed once at construction and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordDocument", from = "RecordDocument")]
pub struct CalibrationRecord {
    intrinsic_matrix: Matrix3,
    focal_length: FocalLength,
    principal_point: PrincipalPoint,
    image_resolution: ImageResolution,
    transform_matrix: Matrix4,
    rotation_matrix: Matrix3,
    translation_vector: Vector3,
    euler_angles: EulerAngles,
    projection_matrix: Matrix4,
    timestamp: f64,
    frame_index: Option<u64>,
    tracking_quality: TrackingQuality,
}

impl CalibrationRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        intrinsic_matrix: Matrix3,
        image_resolution: ImageResolution,
        transform_matrix: Matrix4,
        euler_angles: EulerAngles,
        projection_matrix: Matrix4,
        timestamp: f64,
        frame_index: Option<u64>,
        tracking_quality: TrackingQuality,
    ) -> Self {
        Self {
            intrinsic_matrix,
            focal_length: FocalLength {
                fx: intrinsic_matrix[0][0],
                fy: intrinsic_matrix[1][1],
            },
            principal_point: PrincipalPoint {
                cx: intrinsic_matrix[2][0],
                cy: intrinsic_matrix[2][1],
            },
            image_resolution,
            transform_matrix,
            rotation_matrix: rotation_of(&transform_matrix),
            translation_vector: translation_of(&transform_matrix),
            euler_angles,
            projection_matrix,
            timestamp,
            frame_index,
            tracking_quality,
        }
    }

    /// Same record positioned at `index` within a recording window.
    pub fn with_frame_index(mut self, index: u64) -> Self {
        self.frame_index = Some(index);
        self
    }

    pub fn intrinsic_matrix(&self) -> &Matrix3 {
        &self.intrinsic_matrix
    }

    pub fn focal_length(&self) -> FocalLength {
        self.focal_length
    }

    pub fn principal_point(&self) -> PrincipalPoint {
        self.principal_point
    }

    pub fn image_resolution(&self) -> ImageResolution {
        self.image_resolution
    }

    pub fn transform_matrix(&self) -> &Matrix4 {
        &self.transform_matrix
    }

    pub fn rotation_matrix(&self) -> &Matrix3 {
        &self.rotation_matrix
    }

    pub fn translation_vector(&self) -> Vector3 {
        self.translation_vector
    }

    pub fn euler_angles(&self) -> EulerAngles {
        self.euler_angles
    }

    pub fn projection_matrix(&self) -> &Matrix4 {
        &self.projection_matrix
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }

    pub fn tracking_quality(&self) -> TrackingQuality {
        self.tracking_quality
    }

    /// First field holding NaN or infinity. JSON has no encoding for
    /// either, so such a record can't be exported.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        let angles = self.euler_angles;
        if !all_finite(self.intrinsic_matrix.iter().flatten()) {
            Some("intrinsic_matrix")
        } else if !all_finite(self.transform_matrix.iter().flatten()) {
            Some("transform_matrix")
        } else if !all_finite(self.projection_matrix.iter().flatten()) {
            Some("projection_matrix")
        } else if !all_finite(&[angles.roll, angles.pitch, angles.yaw]) {
            Some("euler_angles")
        } else if !self.timestamp.is_finite() {
            Some("timestamp")
        } else {
            None
        }
    }
}

fn all_finite<'a>(values: impl IntoIterator<Item = &'a f32>) -> bool {
    values.into_iter().all(|v| v.is_finite())
}
