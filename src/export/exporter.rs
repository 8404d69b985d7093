//! Sidecar writer
//!
//! Every sidecar lands at `{directory}/{media stem}{suffix}.json`. Writes go
//! to a hidden temp file in the same directory and are renamed into place,
//! so a reader never observes a half-written sidecar and re-exporting the
//! same media name replaces the previous file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::ExportSettings;
use crate::errors::{CalibrationError, Result};
use crate::export::canonical::to_canonical_vec;
use crate::export::manifest::ExportManifest;
use crate::types::CalibrationRecord;

pub const DEFAULT_SIDECAR_SUFFIX: &str = "_calibration";
pub const DEFAULT_INDENT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationExporter {
    indent: usize,
    suffix: String,
}

impl Default for CalibrationExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationExporter {
    pub fn new() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            suffix: DEFAULT_SIDECAR_SUFFIX.to_string(),
        }
    }

    pub fn from_config(settings: &ExportSettings) -> Self {
        Self {
            indent: settings.indent,
            suffix: settings.sidecar_suffix.clone(),
        }
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// `photo_abc.jpg` -> `photo_abc_calibration.json`
    pub fn sidecar_file_name(&self, base_file_name: &str) -> Result<String> {
        let stem = Path::new(base_file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CalibrationError::InvalidArgument(format!(
                    "cannot derive a sidecar name from '{}'",
                    base_file_name
                ))
            })?;
        Ok(format!("{}{}.json", stem, self.suffix))
    }

    pub fn sidecar_path(&self, base_file_name: &str, directory: &Path) -> Result<PathBuf> {
        Ok(directory.join(self.sidecar_file_name(base_file_name)?))
    }

    /// Write a single record next to a photo.
    pub fn export_photo(
        &self,
        record: &CalibrationRecord,
        base_file_name: &str,
        directory: &Path,
    ) -> Result<PathBuf> {
        let path = self.sidecar_path(base_file_name, directory)?;
        ensure_finite(record)?;
        let bytes = to_canonical_vec(record, self.indent)?;
        write_atomic(&path, &bytes)?;
        log::info!("Exported photo calibration to {}", path.display());
        Ok(path)
    }

    /// Write a manifest for a recording. Returns `Ok(None)` without touching
    /// the filesystem when `records` is empty.
    pub fn export_video(
        &self,
        records: &[CalibrationRecord],
        base_file_name: &str,
        directory: &Path,
    ) -> Result<Option<PathBuf>> {
        match ExportManifest::from_records(base_file_name, records) {
            Some(manifest) => self.export_manifest(&manifest, directory).map(Some),
            None => {
                log::info!("No calibration frames recorded for {}, skipping export", base_file_name);
                Ok(None)
            }
        }
    }

    /// Write a prepared manifest, named after its `video_file_name`.
    pub fn export_manifest(&self, manifest: &ExportManifest, directory: &Path) -> Result<PathBuf> {
        let path = self.sidecar_path(&manifest.video_file_name, directory)?;
        if !manifest.session_start_time.is_finite() {
            return Err(CalibrationError::InvalidArgument(format!(
                "session start time of {} is not finite",
                manifest.video_file_name
            )));
        }
        manifest.frames.iter().try_for_each(ensure_finite)?;
        let bytes = to_canonical_vec(manifest, self.indent)?;
        write_atomic(&path, &bytes)?;
        log::info!(
            "Exported {} calibration frames to {}",
            manifest.total_frames,
            path.display()
        );
        Ok(path)
    }

    /// [`export_photo`](Self::export_photo) on the blocking pool.
    pub async fn export_photo_async(
        &self,
        record: CalibrationRecord,
        base_file_name: String,
        directory: PathBuf,
    ) -> Result<PathBuf> {
        let exporter = self.clone();
        tokio::task::spawn_blocking(move || {
            exporter.export_photo(&record, &base_file_name, &directory)
        })
        .await?
    }

    /// [`export_video`](Self::export_video) on the blocking pool.
    pub async fn export_video_async(
        &self,
        records: Vec<CalibrationRecord>,
        base_file_name: String,
        directory: PathBuf,
    ) -> Result<Option<PathBuf>> {
        let exporter = self.clone();
        tokio::task::spawn_blocking(move || {
            exporter.export_video(&records, &base_file_name, &directory)
        })
        .await?
    }
}

/// serde_json writes NaN and infinity as `null`, which the reader rejects.
fn ensure_finite(record: &CalibrationRecord) -> Result<()> {
    match record.non_finite_field() {
        Some(field) => Err(CalibrationError::InvalidArgument(format!(
            "{} of frame at {} is not finite",
            field,
            record.timestamp()
        ))),
        None => Ok(()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(directory)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("sidecar.json");
    let temp_path = directory.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}
