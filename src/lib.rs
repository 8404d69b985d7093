//! posecam: camera pose and lens calibration capture
//!
//! Consumes per-frame output of a positional tracking provider, normalizes
//! it into calibration records and exports them as JSON sidecars next to
//! the captured photo or video.
//!
//! # Features
//! - Live calibration snapshot and drop-oldest subscriptions
//! - Recording windows with sequential frame indices
//! - Deterministic, sorted-key JSON sidecars
//! - Optional H.264/MP4 video sink (`recording`)
//! - Optional Tauri plugin commands (`plugin`)
//!
//! # Usage
//! ```rust,ignore
//! use posecam::{CaptureSession, PosecamConfig, RecordingTarget, MediaName};
//!
//! let config = PosecamConfig::load_or_default();
//! let session = CaptureSession::new(Box::new(provider), &config);
//! session.start()?;
//! session.start_recording(RecordingTarget::calibration_only(MediaName::video()))?;
//! // ...
//! let outcome = session.stop_recording();
//! ```
//!
//! As a Tauri plugin:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(posecam::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod config;
pub mod errors;
pub mod export;
pub mod ingest;
pub mod media;
pub mod recorder;
pub mod session;
pub mod timing;
pub mod types;

#[cfg(feature = "recording")]
pub mod recording;

#[cfg(feature = "plugin")]
pub mod commands;

// Testing utilities - synthetic providers for offline testing
pub mod testing;

// Re-exports for convenience
pub use crate::config::PosecamConfig;
pub use errors::{CalibrationError, Result};
pub use export::{CalibrationExporter, ExportManifest, Sidecar, SidecarPair};
pub use ingest::{FrameSampleIngestor, Subscription};
pub use media::MediaName;
pub use recorder::{RecorderState, RecorderStatus, SessionRecorder};
pub use session::{
    CaptureSession, FrameWrite, PhotoCapture, RecordingOutcome, RecordingTarget, TrackingProvider,
    VideoSink, VideoSummary,
};
pub use types::{
    CalibrationRecord, FrameImage, LimitedReason, ProviderFrame, RawTrackingState,
    TrackingQuality,
};

#[cfg(feature = "recording")]
pub use recording::Mp4VideoSink;

#[cfg(feature = "plugin")]
use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the posecam plugin with all commands
#[cfg(feature = "plugin")]
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("posecam")
        .invoke_handler(tauri::generate_handler![
            // Calibration commands
            commands::calibration::get_current_calibration,
            commands::calibration::start_calibration_recording,
            commands::calibration::stop_calibration_recording,
            commands::calibration::get_recording_status,
            commands::calibration::export_photo_calibration,
            commands::calibration::export_video_calibration,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::get_export_config,
        ])
        .build()
}

/// Initialize logging
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "posecam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        features: enabled_features(),
    }
}

fn enabled_features() -> Vec<String> {
    let mut features = Vec::new();
    if cfg!(feature = "recording") {
        features.push("recording".to_string());
    }
    if cfg!(feature = "plugin") {
        features.push("plugin".to_string());
    }
    features
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub features: Vec<String>,
}
