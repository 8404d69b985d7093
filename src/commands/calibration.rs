use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tauri::command;

use crate::commands::config::current_config;
use crate::export::CalibrationExporter;
use crate::ingest::FrameSampleIngestor;
use crate::recorder::{RecorderStatus, SessionRecorder};
use crate::types::{CalibrationRecord, ProviderFrame};

lazy_static::lazy_static! {
    static ref INGESTOR: Arc<FrameSampleIngestor> = {
        let ingestor = Arc::new(FrameSampleIngestor::new());
        ingestor.attach_recorder(RECORDER.clone());
        ingestor
    };
    static ref RECORDER: Arc<SessionRecorder> = Arc::new(SessionRecorder::new());
    static ref LAST_RECORDING: Mutex<Vec<CalibrationRecord>> = Mutex::new(Vec::new());
}

/// Shared ingestor the host feeds tracking frames into
pub fn ingestor() -> Arc<FrameSampleIngestor> {
    INGESTOR.clone()
}

/// Hand a provider frame to the plugin. Called from the host's tracking
/// callback, not from the webview.
pub fn ingest_provider_frame(frame: ProviderFrame) -> CalibrationRecord {
    INGESTOR.ingest(frame)
}

/// Drop the current snapshot, e.g. when tracking is paused.
pub fn reset_tracking() {
    INGESTOR.reset();
}

fn resolve_directory(directory: Option<String>) -> Result<PathBuf, String> {
    match directory {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(current_config()?.output_directory()),
    }
}

fn exporter() -> Result<CalibrationExporter, String> {
    Ok(CalibrationExporter::from_config(&current_config()?.export))
}

/// Latest calibration, or `None` before the first tracked frame
#[command]
pub async fn get_current_calibration() -> Result<Option<CalibrationRecord>, String> {
    Ok(INGESTOR.current_snapshot())
}

/// Open a recording window. Returns its wall-clock start (RFC 3339).
#[command]
pub async fn start_calibration_recording() -> Result<String, String> {
    let started_at = RECORDER.start();
    Ok(started_at.to_rfc3339())
}

/// Close the recording window and keep its frames for export.
/// Returns the number of frames recorded.
#[command]
pub async fn stop_calibration_recording() -> Result<usize, String> {
    let frames = RECORDER.stop();
    let count = frames.len();
    *LAST_RECORDING
        .lock()
        .map_err(|e| format!("Failed to store recording: {}", e))? = frames;
    Ok(count)
}

#[command]
pub async fn get_recording_status() -> Result<RecorderStatus, String> {
    Ok(RECORDER.status())
}

/// Export the current snapshot next to `base_file_name`.
/// Returns the sidecar path, or `None` without a snapshot.
#[command]
pub async fn export_photo_calibration(
    base_file_name: String,
    directory: Option<String>,
) -> Result<Option<String>, String> {
    let record = match INGESTOR.current_snapshot() {
        Some(record) => record,
        None => {
            log::warn!("No calibration available for {}", base_file_name);
            return Ok(None);
        }
    };

    let directory = resolve_directory(directory)?;
    let path = exporter()?
        .export_photo_async(record, base_file_name, directory)
        .await
        .map_err(|e| {
            log::error!("Photo calibration export failed: {}", e);
            e.to_string()
        })?;
    Ok(Some(path.to_string_lossy().to_string()))
}

/// Export the last stopped recording for `base_file_name`.
/// Returns `None` when that recording was empty.
#[command]
pub async fn export_video_calibration(
    base_file_name: String,
    directory: Option<String>,
) -> Result<Option<String>, String> {
    let records = LAST_RECORDING
        .lock()
        .map_err(|e| format!("Failed to read recording: {}", e))?
        .clone();

    let directory = resolve_directory(directory)?;
    let path = exporter()?
        .export_video_async(records, base_file_name, directory)
        .await
        .map_err(|e| {
            log::error!("Video calibration export failed: {}", e);
            e.to_string()
        })?;
    Ok(path.map(|p| p.to_string_lossy().to_string()))
}
