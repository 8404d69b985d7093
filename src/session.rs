//! Capture session orchestration
//!
//! A [`CaptureSession`] owns a tracking provider and drives frames through
//! the ingestor, the recorder and an optional video sink. Frame handling and
//! recording start share one lock, so arming a recording is atomic with
//! respect to frames: the first frame handled after
//! [`start_recording`](CaptureSession::start_recording) returns is frame
//! index 0 of the calibration window and PTS 0 of the video.
//!
//! While a video sink is attached, a frame only enters the calibration
//! buffer if it was also written to the video, keeping the two aligned.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::config::PosecamConfig;
use crate::errors::{CalibrationError, Result};
use crate::export::{CalibrationExporter, ExportManifest};
use crate::ingest::{FrameSampleIngestor, Subscription};
use crate::media::{save_rgb_photo, MediaName};
use crate::recorder::SessionRecorder;
use crate::timing::PtsTimeline;
use crate::types::{CalibrationRecord, FrameImage, ProviderFrame};

const FRAME_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Source of tracked frames
pub trait TrackingProvider: Send {
    /// Begin or resume tracking. `reset` discards accumulated world state.
    fn start(&mut self, reset: bool) -> Result<()>;

    fn pause(&mut self);

    /// Wait up to `timeout` for the next frame. `Ok(None)` means nothing
    /// arrived yet; an error ends the capture loop.
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<ProviderFrame>>;
}

/// Encoder collaborator receiving the frames of a recording
pub trait VideoSink: Send {
    /// False while the encoder cannot take another frame; such frames are
    /// skipped for both video and calibration.
    fn is_ready(&self) -> bool;

    /// `Ok(FrameWrite::Dropped)` when the encoder discarded the frame
    /// without failing, e.g. a rate-control skip.
    fn append(&mut self, image: &FrameImage, pts_secs: f64) -> Result<FrameWrite>;

    fn finish(self: Box<Self>) -> Result<VideoSummary>;
}

/// What a [`VideoSink`] did with an accepted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameWrite {
    Written,
    Dropped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSummary {
    pub frames: u64,
    pub duration_secs: f64,
    pub path: Option<PathBuf>,
}

/// What to record into
pub struct RecordingTarget {
    pub media_file_name: String,
    pub sink: Option<Box<dyn VideoSink>>,
}

impl RecordingTarget {
    /// Buffer calibration only; the media file is produced elsewhere.
    pub fn calibration_only(media_file_name: impl Into<String>) -> Self {
        Self {
            media_file_name: media_file_name.into(),
            sink: None,
        }
    }

    pub fn with_sink(media_file_name: impl Into<String>, sink: Box<dyn VideoSink>) -> Self {
        Self {
            media_file_name: media_file_name.into(),
            sink: Some(sink),
        }
    }
}

/// Result of closing a recording
#[derive(Debug)]
pub struct RecordingOutcome {
    pub media_file_name: String,
    pub frames: usize,
    /// `None` when nothing was recorded or the export failed
    pub sidecar: Option<PathBuf>,
    pub video: Option<VideoSummary>,
    /// Frames left out of both outputs: sink busy or failing, encoder
    /// drop, missing image or out-of-order timestamp
    pub skipped_frames: u64,
    /// Recoverable failures, in the order they happened
    pub errors: Vec<String>,
}

#[derive(Debug)]
pub struct PhotoCapture {
    pub record: CalibrationRecord,
    pub media: Option<PathBuf>,
    pub sidecar: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
    Paused,
}

struct ActiveRecording {
    media_file_name: String,
    sink: Option<Box<dyn VideoSink>>,
    timeline: PtsTimeline,
    skipped: u64,
    errors: Vec<String>,
}

impl ActiveRecording {
    /// Feed one frame to the sink. True when the frame belongs in the
    /// calibration buffer.
    fn write_video(&mut self, timestamp: f64, image: Option<&FrameImage>) -> bool {
        let sink = match self.sink.as_mut() {
            Some(sink) => sink,
            None => return true,
        };

        if !sink.is_ready() {
            log::debug!("Video sink busy, skipping frame at {:.6}", timestamp);
            self.skipped += 1;
            return false;
        }
        let image = match image {
            Some(image) => image,
            None => {
                log::debug!("Frame at {:.6} has no image, skipping", timestamp);
                self.skipped += 1;
                return false;
            }
        };
        let pts = match self.timeline.advance(timestamp) {
            Ok(pts) => pts,
            Err(e) => {
                log::warn!("{}", e);
                self.skipped += 1;
                return false;
            }
        };

        match sink.append(image, pts) {
            Ok(FrameWrite::Written) => true,
            Ok(FrameWrite::Dropped) => {
                log::debug!("Encoder dropped frame at pts {:.6}", pts);
                self.skipped += 1;
                false
            }
            Err(e) => {
                log::error!("Video sink rejected frame at pts {:.6}: {}", pts, e);
                self.errors.push(e.to_string());
                self.skipped += 1;
                false
            }
        }
    }
}

struct Inner {
    provider: Mutex<Box<dyn TrackingProvider>>,
    ingestor: Arc<FrameSampleIngestor>,
    recorder: Arc<SessionRecorder>,
    exporter: CalibrationExporter,
    output_directory: PathBuf,
    reset_on_resume: bool,
    state: Mutex<SessionState>,
    recording: Mutex<Option<ActiveRecording>>,
    capture_thread: Mutex<Option<JoinHandle<()>>>,
    stop_flag: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CaptureSession {
    inner: Arc<Inner>,
}

impl CaptureSession {
    pub fn new(provider: Box<dyn TrackingProvider>, config: &PosecamConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider: Mutex::new(provider),
                ingestor: Arc::new(FrameSampleIngestor::with_queue_capacity(
                    config.capture.live_queue_capacity,
                )),
                recorder: Arc::new(SessionRecorder::new()),
                exporter: CalibrationExporter::from_config(&config.export),
                output_directory: config.output_directory(),
                reset_on_resume: config.capture.reset_tracking_on_resume,
                state: Mutex::new(SessionState::Stopped),
                recording: Mutex::new(None),
                capture_thread: Mutex::new(None),
                stop_flag: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    pub fn ingestor(&self) -> &Arc<FrameSampleIngestor> {
        &self.inner.ingestor
    }

    pub fn recorder(&self) -> &Arc<SessionRecorder> {
        &self.inner.recorder
    }

    pub fn output_directory(&self) -> &Path {
        &self.inner.output_directory
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    pub fn subscribe(&self) -> Subscription {
        self.inner.ingestor.subscribe()
    }

    /// Latest calibration, `None` until tracking delivers a frame.
    pub fn current_calibration(&self) -> Option<CalibrationRecord> {
        self.inner.ingestor.current_snapshot()
    }

    /// Start tracking and spawn the capture thread.
    ///
    /// A fresh session resets the provider; resuming from pause resets it
    /// only when `reset_tracking_on_resume` is set.
    pub fn start(&self) -> Result<()> {
        let mut state = lock(&self.inner.state);
        let reset = match *state {
            SessionState::Running => {
                return Err(CalibrationError::InvalidArgument(
                    "capture session already running".to_string(),
                ))
            }
            SessionState::Stopped => true,
            SessionState::Paused => self.inner.reset_on_resume,
        };

        lock(&self.inner.provider).start(reset)?;
        self.inner.stop_flag.store(false, Ordering::Relaxed);

        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name("posecam-tracking".to_string())
            .spawn(move || capture_loop(inner))?;
        *lock(&self.inner.capture_thread) = Some(handle);
        *state = SessionState::Running;

        log::info!("Capture session started (reset: {})", reset);
        Ok(())
    }

    /// Stop the capture thread and pause the provider. The live snapshot is
    /// cleared; an open recording stays open.
    pub fn pause(&self, join_timeout: Duration) -> Result<()> {
        {
            let state = lock(&self.inner.state);
            if *state != SessionState::Running {
                return Ok(());
            }
        }

        self.join_capture_thread(join_timeout)?;
        lock(&self.inner.provider).pause();
        self.inner.ingestor.reset();
        *lock(&self.inner.state) = SessionState::Paused;
        log::info!("Capture session paused");
        Ok(())
    }

    /// The provider recovered from an interruption (e.g. the camera was
    /// taken away). Drops the stale snapshot and restarts tracking from
    /// scratch; `reset_tracking_on_resume` only applies to pause/resume.
    pub fn interruption_ended(&self) -> Result<()> {
        self.inner.ingestor.reset();
        if self.state() == SessionState::Running {
            lock(&self.inner.provider).start(true)?;
            log::info!("Tracking restarted after interruption");
        }
        Ok(())
    }

    /// Stop the capture thread; the session can be started again.
    pub fn stop(&self, join_timeout: Duration) -> Result<()> {
        if self.state() == SessionState::Stopped {
            return Ok(());
        }
        self.join_capture_thread(join_timeout)?;
        lock(&self.inner.provider).pause();
        self.inner.ingestor.reset();
        *lock(&self.inner.state) = SessionState::Stopped;
        log::info!("Capture session stopped");
        Ok(())
    }

    fn join_capture_thread(&self, join_timeout: Duration) -> Result<()> {
        self.inner.stop_flag.store(true, Ordering::Relaxed);
        let handle = lock(&self.inner.capture_thread).take();

        if let Some(handle) = handle {
            let start = Instant::now();
            while !handle.is_finished() {
                if start.elapsed() >= join_timeout {
                    *lock(&self.inner.capture_thread) = Some(handle);
                    return Err(CalibrationError::Task(
                        "capture thread did not stop in time".to_string(),
                    ));
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
        Ok(())
    }

    /// Handle one provider frame. Push-based providers call this directly.
    pub fn on_frame(&self, frame: ProviderFrame) -> CalibrationRecord {
        handle_frame(&self.inner, frame)
    }

    /// Pull frames on the calling thread until `stop` is set or the
    /// provider fails.
    pub fn pump(&self, stop: &AtomicBool) -> Result<()> {
        pump_frames(&self.inner, stop)
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.inner.recording).is_some()
    }

    /// Arm the calibration window and the video sink together.
    pub fn start_recording(&self, target: RecordingTarget) -> Result<DateTime<Utc>> {
        let mut recording = lock(&self.inner.recording);
        if let Some(active) = recording.as_ref() {
            return Err(CalibrationError::InvalidArgument(format!(
                "already recording {}",
                active.media_file_name
            )));
        }

        let started_at = self.inner.recorder.start();
        log::info!("Recording {}", target.media_file_name);
        *recording = Some(ActiveRecording {
            media_file_name: target.media_file_name,
            sink: target.sink,
            timeline: PtsTimeline::new(),
            skipped: 0,
            errors: Vec::new(),
        });
        Ok(started_at)
    }

    /// Close the recording, finish the video and export its sidecar.
    ///
    /// Returns `None` when no recording was open. Sink and export failures
    /// are reported in the outcome, never as an error.
    pub fn stop_recording(&self) -> Option<RecordingOutcome> {
        let (active, frames) = {
            let mut recording = lock(&self.inner.recording);
            let active = recording.take()?;
            (active, self.inner.recorder.stop())
        };

        let ActiveRecording {
            media_file_name,
            sink,
            timeline,
            skipped,
            mut errors,
        } = active;

        let video = match sink {
            Some(sink) => match sink.finish() {
                Ok(summary) => Some(summary),
                Err(e) => {
                    log::error!("Failed to finish video {}: {}", media_file_name, e);
                    errors.push(e.to_string());
                    None
                }
            },
            None => None,
        };

        let sidecar = match ExportManifest::from_records(media_file_name.clone(), &frames) {
            Some(manifest) => {
                let manifest = match timeline.origin() {
                    Some(origin) => manifest.with_session_start_time(origin),
                    None => manifest,
                };
                match self
                    .inner
                    .exporter
                    .export_manifest(&manifest, &self.inner.output_directory)
                {
                    Ok(path) => Some(path),
                    Err(e) => {
                        log::error!("Failed to export calibration for {}: {}", media_file_name, e);
                        errors.push(e.to_string());
                        None
                    }
                }
            }
            None => {
                log::info!("No calibration frames recorded for {}", media_file_name);
                None
            }
        };

        Some(RecordingOutcome {
            media_file_name,
            frames: frames.len(),
            sidecar,
            video,
            skipped_frames: skipped,
            errors,
        })
    }

    /// Export the current snapshot as a photo sidecar, saving the frame's
    /// image alongside when it has one. `Ok(None)` without a snapshot.
    pub fn capture_photo(&self, base_file_name: Option<String>) -> Result<Option<PhotoCapture>> {
        let frame = match self.inner.ingestor.latest_frame() {
            Some(frame) => frame,
            None => return Ok(None),
        };
        let record = self.inner.ingestor.normalize(&frame, None);
        let name = base_file_name.unwrap_or_else(MediaName::photo);
        let directory = &self.inner.output_directory;

        let media = match frame.image.as_ref() {
            Some(image) => {
                let path = directory.join(&name);
                save_rgb_photo(image, &path)?;
                Some(path)
            }
            None => None,
        };

        let sidecar = self.inner.exporter.export_photo(&record, &name, directory)?;
        Ok(Some(PhotoCapture {
            record,
            media,
            sidecar,
        }))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop(Duration::from_millis(500)) {
            log::warn!("Error stopping capture session in drop: {}", e);
        }
    }
}

fn handle_frame(inner: &Inner, frame: ProviderFrame) -> CalibrationRecord {
    let mut recording = lock(&inner.recording);
    let image = frame.image.clone();
    let timestamp = frame.timestamp;
    let record = inner.ingestor.ingest(frame);

    if let Some(active) = recording.as_mut() {
        if active.write_video(timestamp, image.as_ref()) {
            inner.recorder.append(record.clone());
        }
    }
    record
}

fn pump_frames(inner: &Inner, stop: &AtomicBool) -> Result<()> {
    while !stop.load(Ordering::Relaxed) {
        let next = lock(&inner.provider).next_frame(FRAME_POLL_TIMEOUT)?;
        if let Some(frame) = next {
            handle_frame(inner, frame);
        }
    }
    Ok(())
}

fn capture_loop(inner: Arc<Inner>) {
    let stop = inner.stop_flag.clone();
    if let Err(e) = pump_frames(&inner, &stop) {
        log::error!("Tracking provider failed: {}", e);
        inner.ingestor.reset();
    }
    log::debug!("Capture thread exiting");
}
