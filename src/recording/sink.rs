//! MP4 video sink combining encoder and muxer

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use muxide::api::{Metadata, MuxerBuilder, VideoCodec};

use super::encoder::{EncoderSettings, H264Encoder};
use crate::config::RecordingSettings;
use crate::errors::{CalibrationError, Result};
use crate::session::{FrameWrite, VideoSink, VideoSummary};
use crate::types::FrameImage;

struct Active {
    encoder: H264Encoder,
    muxer: muxide::api::Muxer<BufWriter<File>>,
}

/// [`VideoSink`] writing H.264 in MP4
///
/// The file is created on the first frame, which also fixes the video
/// dimensions. Frames are written at the caller's PTS, so the video
/// timeline matches the calibration manifest.
pub struct Mp4VideoSink {
    output_path: PathBuf,
    settings: RecordingSettings,
    title: Option<String>,
    active: Option<Active>,
    frames: u64,
    skipped_empty: u64,
    last_pts: f64,
    failed: bool,
}

impl Mp4VideoSink {
    pub fn new<P: AsRef<Path>>(output_path: P, settings: RecordingSettings) -> Self {
        Self {
            output_path: output_path.as_ref().to_path_buf(),
            settings,
            title: None,
            active: None,
            frames: 0,
            skipped_empty: 0,
            last_pts: 0.0,
            failed: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    fn open(&self, width: u32, height: u32) -> Result<Active> {
        let encoder =
            H264Encoder::with_settings(width, height, EncoderSettings::from(&self.settings))?;

        if let Some(parent) = self.output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&self.output_path)?);

        let mut metadata = Metadata::new().with_current_time();
        if let Some(ref title) = self.title {
            metadata = metadata.with_title(title);
        }

        let muxer = MuxerBuilder::new(writer)
            .video(VideoCodec::H264, width, height, self.settings.fps)
            .with_fast_start(self.settings.fast_start)
            .with_metadata(metadata)
            .build()
            .map_err(|e| CalibrationError::Encoding(format!("Failed to create muxer: {}", e)))?;

        log::info!(
            "Recording {}x{} H.264 to {} ({} bps target)",
            width,
            height,
            self.output_path.display(),
            self.settings.effective_bitrate()
        );
        Ok(Active { encoder, muxer })
    }

    fn write(&mut self, image: &FrameImage, pts_secs: f64) -> Result<FrameWrite> {
        if self.active.is_none() {
            match self.open(image.width, image.height) {
                Ok(active) => self.active = Some(active),
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| CalibrationError::NotReady("muxer not open".to_string()))?;

        if active.encoder.dimensions() != (image.width, image.height) {
            let (width, height) = active.encoder.dimensions();
            return Err(CalibrationError::Encoding(format!(
                "Frame dimensions {}x{} don't match recording {}x{}",
                image.width, image.height, width, height
            )));
        }

        let encoded = active.encoder.encode_rgb(&image.data)?;
        if encoded.data.is_empty() {
            // Rate control skipped the frame; the container is still fine
            self.skipped_empty += 1;
            return Ok(FrameWrite::Dropped);
        }

        if let Err(e) = active
            .muxer
            .write_video(pts_secs, &encoded.data, encoded.is_keyframe)
        {
            // The container is unusable after a mux error
            self.failed = true;
            return Err(CalibrationError::Encoding(format!("Failed to write frame: {}", e)));
        }

        self.frames += 1;
        self.last_pts = pts_secs;
        Ok(FrameWrite::Written)
    }
}

impl VideoSink for Mp4VideoSink {
    fn is_ready(&self) -> bool {
        !self.failed
    }

    fn append(&mut self, image: &FrameImage, pts_secs: f64) -> Result<FrameWrite> {
        if self.failed {
            return Err(CalibrationError::NotReady(format!(
                "{} failed earlier",
                self.output_path.display()
            )));
        }

        self.write(image, pts_secs)
    }

    fn finish(self: Box<Self>) -> Result<VideoSummary> {
        let this = *self;
        let active = match this.active {
            Some(active) => active,
            None => {
                log::info!("No video frames written, {} not created", this.output_path.display());
                return Ok(VideoSummary {
                    frames: 0,
                    duration_secs: 0.0,
                    path: None,
                });
            }
        };

        let stats = active.muxer.finish_with_stats().map_err(|e| {
            CalibrationError::Encoding(format!("Failed to finalize recording: {}", e))
        })?;

        if this.skipped_empty > 0 {
            log::debug!("Encoder produced {} empty frames", this.skipped_empty);
        }
        log::info!(
            "Finished {} with {} frames, {} bytes",
            this.output_path.display(),
            stats.video_frames,
            stats.bytes_written
        );

        Ok(VideoSummary {
            frames: this.frames,
            duration_secs: stats.duration_secs.max(this.last_pts),
            path: Some(this.output_path),
        })
    }
}
