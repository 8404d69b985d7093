//! Loading sidecars back and pairing them with their media

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{CalibrationError, Result};
use crate::export::manifest::ExportManifest;
use crate::types::CalibrationRecord;

/// Tolerance used when matching video PTS against frame timestamps
pub const ALIGNMENT_TOLERANCE_SECS: f64 = 1e-3;

/// A parsed sidecar of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Sidecar {
    Photo(CalibrationRecord),
    Video(ExportManifest),
}

impl Sidecar {
    pub fn frame_count(&self) -> usize {
        match self {
            Sidecar::Photo(_) => 1,
            Sidecar::Video(manifest) => manifest.total_frames,
        }
    }
}

/// A sidecar found on disk and the media file it describes, if present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarPair {
    pub calibration: PathBuf,
    pub media: Option<PathBuf>,
}

pub fn read_photo_sidecar(path: &Path) -> Result<CalibrationRecord> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn read_manifest(path: &Path) -> Result<ExportManifest> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read a sidecar, telling the kinds apart by the manifest's `frames` key.
pub fn read_sidecar(path: &Path) -> Result<Sidecar> {
    let bytes = fs::read(path)?;
    let value: Value = serde_json::from_slice(&bytes)?;
    if !value.is_object() {
        return Err(CalibrationError::InvalidArgument(format!(
            "{} is not a calibration sidecar",
            path.display()
        )));
    }

    if value.get("frames").is_some() {
        Ok(Sidecar::Video(serde_json::from_value(value)?))
    } else {
        Ok(Sidecar::Photo(serde_json::from_value(value)?))
    }
}

/// List every `*{suffix}.json` in `directory` with its media file.
///
/// Media is any other file in the directory with the same stem; a sidecar
/// whose media is missing is still listed. Results are sorted by path.
pub fn find_pairs(directory: &Path, suffix: &str) -> Result<Vec<SidecarPair>> {
    let mut sidecars = Vec::new();
    let mut others = Vec::new();

    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match media_stem(&path, suffix) {
            Some(stem) => sidecars.push((stem, path)),
            None => others.push(path),
        }
    }

    let mut pairs: Vec<SidecarPair> = sidecars
        .into_iter()
        .map(|(stem, calibration)| {
            let media = others
                .iter()
                .filter(|p| p.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str()))
                .min()
                .cloned();
            if media.is_none() {
                log::debug!("No media found for {}", calibration.display());
            }
            SidecarPair { calibration, media }
        })
        .collect();

    pairs.sort_by(|a, b| a.calibration.cmp(&b.calibration));
    Ok(pairs)
}

/// Stem of the media a sidecar path belongs to, or `None` for other files.
fn media_stem(path: &Path, suffix: &str) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_suffix(suffix)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
