//! Calibration sidecar export
//!
//! Records and manifests are written as sorted-key, indented JSON next to
//! the media they describe, and can be read back and paired with it.

pub mod canonical;
pub mod exporter;
pub mod manifest;
pub mod reader;
pub mod schema;

pub use canonical::{to_canonical_string, to_canonical_vec};
pub use exporter::{CalibrationExporter, DEFAULT_INDENT, DEFAULT_SIDECAR_SUFFIX};
pub use manifest::{ExportManifest, Misalignment};
pub use reader::{
    find_pairs, read_manifest, read_photo_sidecar, read_sidecar, Sidecar, SidecarPair,
    ALIGNMENT_TOLERANCE_SECS,
};
