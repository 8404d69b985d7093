//! Synthetic tracking data
//!
//! The known-good sample reproduces a frame captured on a 1920x1440 back
//! camera, so tests can pin exact numeric output without hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::errors::{CalibrationError, Result};
use crate::session::{FrameWrite, TrackingProvider, VideoSink, VideoSummary};
use crate::types::{
    intrinsic_matrix, EulerAngles, FrameImage, ImageResolution, Matrix4, ProviderFrame,
    RawTrackingState,
};

/// Projection matrix reported alongside the known-good sample
pub const KNOWN_GOOD_PROJECTION: Matrix4 = [
    [1.6647911, 0.0, 0.0, 0.0],
    [0.0, 2.2197216, 0.0, 0.0],
    [0.0057463646, -0.0074720383, -0.999998, -1.0],
    [0.0, 0.0, -0.001999998, 0.0],
];

/// A real frame: device held in portrait, 0.79 m in front of the origin.
pub fn known_good_frame() -> ProviderFrame {
    ProviderFrame {
        intrinsics: intrinsic_matrix(1598.2262, 1598.2262, 954.47565, 714.5876),
        image_resolution: ImageResolution::new(1920, 1440),
        camera_transform: [
            [0.0, 1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0123, -0.0456, 0.789, 1.0],
        ],
        projection_matrix: KNOWN_GOOD_PROJECTION,
        euler_angles: EulerAngles {
            roll: -1.5707964,
            pitch: 0.0,
            yaw: 0.0,
        },
        timestamp: 85732.416783,
        tracking_state: RawTrackingState::Normal,
        image: None,
    }
}

/// Frame `index` of a camera orbiting the origin at 1 m, yawing to face it.
pub fn synthetic_frame(index: u64, timestamp: f64) -> ProviderFrame {
    let angle = (index as f32) * 0.01;
    let (sin, cos) = angle.sin_cos();

    ProviderFrame {
        intrinsics: intrinsic_matrix(1450.0, 1450.0, 960.0, 720.0),
        image_resolution: ImageResolution::new(1920, 1440),
        camera_transform: [
            [cos, 0.0, -sin, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [sin, 0.0, cos, 0.0],
            [sin, 0.0, cos, 1.0],
        ],
        projection_matrix: KNOWN_GOOD_PROJECTION,
        euler_angles: EulerAngles {
            roll: 0.0,
            pitch: 0.0,
            yaw: angle,
        },
        timestamp,
        tracking_state: RawTrackingState::Normal,
        image: None,
    }
}

/// RGB gradient that shifts every frame
pub fn synthetic_image(index: u64, width: u32, height: u32) -> FrameImage {
    let mut data = vec![0u8; (width * height * 3) as usize];
    let base = (index % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    FrameImage::new(width, height, data)
}

/// Counters shared with a [`SyntheticTracker`] after it is boxed away
#[derive(Debug, Default)]
pub struct TrackerCounters {
    pub starts: AtomicU64,
    pub resets: AtomicU64,
    pub pauses: AtomicU64,
    pub frames: AtomicU64,
}

/// Deterministic [`TrackingProvider`]
///
/// Emits frames at a fixed rate on a monotonic clock. After a reset the
/// first `warmup_frames` report `Limited(initializing)`.
pub struct SyntheticTracker {
    fps: f64,
    start_time: f64,
    next_index: u64,
    max_frames: Option<u64>,
    image_size: Option<(u32, u32)>,
    warmup_frames: u64,
    warmup_remaining: u64,
    realtime: bool,
    running: bool,
    counters: Arc<TrackerCounters>,
}

impl SyntheticTracker {
    pub fn new(fps: f64) -> Self {
        Self {
            fps: if fps > 0.0 { fps } else { 30.0 },
            start_time: 1000.0,
            next_index: 0,
            max_frames: None,
            image_size: None,
            warmup_frames: 0,
            warmup_remaining: 0,
            realtime: false,
            running: false,
            counters: Arc::new(TrackerCounters::default()),
        }
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    /// Stop producing frames after `max_frames`.
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn with_images(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some((width, height));
        self
    }

    pub fn with_warmup(mut self, frames: u64) -> Self {
        self.warmup_frames = frames;
        self
    }

    /// Sleep one frame interval per frame instead of returning immediately.
    pub fn realtime(mut self) -> Self {
        self.realtime = true;
        self
    }

    pub fn counters(&self) -> Arc<TrackerCounters> {
        self.counters.clone()
    }

    fn exhausted(&self) -> bool {
        self.max_frames.is_some_and(|max| self.next_index >= max)
    }

    /// Produce the next frame regardless of run state.
    pub fn generate(&mut self) -> ProviderFrame {
        let index = self.next_index;
        self.next_index += 1;

        let timestamp = self.start_time + index as f64 / self.fps;
        let mut frame = synthetic_frame(index, timestamp);
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            frame.tracking_state = RawTrackingState::limited("initializing");
        }
        if let Some((width, height)) = self.image_size {
            frame.image = Some(synthetic_image(index, width, height));
        }
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        frame
    }
}

impl TrackingProvider for SyntheticTracker {
    fn start(&mut self, reset: bool) -> Result<()> {
        self.running = true;
        self.counters.starts.fetch_add(1, Ordering::Relaxed);
        if reset {
            self.warmup_remaining = self.warmup_frames;
            self.counters.resets.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.running = false;
        self.counters.pauses.fetch_add(1, Ordering::Relaxed);
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<ProviderFrame>> {
        if !self.running || self.exhausted() {
            std::thread::sleep(timeout.min(Duration::from_millis(5)));
            return Ok(None);
        }
        if self.realtime {
            std::thread::sleep(Duration::from_secs_f64(1.0 / self.fps).min(timeout));
        }
        Ok(Some(self.generate()))
    }
}

/// What a [`MemoryVideoSink`] received
#[derive(Debug, Default)]
pub struct SinkLog {
    pub pts: Mutex<Vec<f64>>,
    pub ready: AtomicBool,
    pub finished: AtomicBool,
}

impl SinkLog {
    pub fn pts(&self) -> Vec<f64> {
        self.pts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }
}

/// [`VideoSink`] that keeps presentation timestamps in memory
pub struct MemoryVideoSink {
    log: Arc<SinkLog>,
    fail_at: Option<usize>,
    drop_at: Option<usize>,
    fail_on_finish: bool,
    attempts: usize,
}

impl MemoryVideoSink {
    pub fn new() -> (Self, Arc<SinkLog>) {
        let log = Arc::new(SinkLog::default());
        log.set_ready(true);
        (
            Self {
                log: log.clone(),
                fail_at: None,
                drop_at: None,
                fail_on_finish: false,
                attempts: 0,
            },
            log,
        )
    }

    /// Reject the `attempt`-th call to `append` (zero-based).
    pub fn failing_at(mut self, attempt: usize) -> Self {
        self.fail_at = Some(attempt);
        self
    }

    /// Report the `attempt`-th call to `append` as dropped by the encoder,
    /// the way a rate-control skip would.
    pub fn dropping_at(mut self, attempt: usize) -> Self {
        self.drop_at = Some(attempt);
        self
    }

    pub fn failing_on_finish(mut self) -> Self {
        self.fail_on_finish = true;
        self
    }
}

impl VideoSink for MemoryVideoSink {
    fn is_ready(&self) -> bool {
        self.log.ready.load(Ordering::Relaxed)
    }

    fn append(&mut self, image: &FrameImage, pts_secs: f64) -> Result<FrameWrite> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.fail_at == Some(attempt) {
            return Err(CalibrationError::Encoding(format!(
                "synthetic failure at append {}",
                attempt
            )));
        }
        if !image.is_valid() {
            return Err(CalibrationError::Encoding("invalid frame image".to_string()));
        }
        if self.drop_at == Some(attempt) {
            return Ok(FrameWrite::Dropped);
        }
        self.log
            .pts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pts_secs);
        Ok(FrameWrite::Written)
    }

    fn finish(self: Box<Self>) -> Result<VideoSummary> {
        self.log.finished.store(true, Ordering::Relaxed);
        if self.fail_on_finish {
            return Err(CalibrationError::Encoding("synthetic finish failure".to_string()));
        }
        let pts = self.log.pts();
        Ok(VideoSummary {
            frames: pts.len() as u64,
            duration_secs: pts.last().copied().unwrap_or(0.0),
            path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_image_correct_size() {
        let image = synthetic_image(0, 64, 48);
        assert!(image.is_valid());
        assert_eq!(image.data.len(), 64 * 48 * 3);
    }

    #[test]
    fn test_synthetic_images_differ() {
        let a = synthetic_image(0, 8, 8);
        let b = synthetic_image(1, 8, 8);
        assert_ne!(a.data[0], b.data[0]);
    }

    #[test]
    fn test_tracker_timestamps_follow_fps() {
        let mut tracker = SyntheticTracker::new(20.0).with_start_time(50.0);
        tracker.start(true).unwrap();
        let a = tracker.next_frame(Duration::ZERO).unwrap().unwrap();
        let b = tracker.next_frame(Duration::ZERO).unwrap().unwrap();
        assert_eq!(a.timestamp, 50.0);
        assert!((b.timestamp - 50.05).abs() < 1e-9);
    }

    #[test]
    fn test_tracker_idle_until_started() {
        let mut tracker = SyntheticTracker::new(30.0);
        assert!(tracker.next_frame(Duration::from_millis(1)).unwrap().is_none());
        tracker.start(false).unwrap();
        assert!(tracker.next_frame(Duration::from_millis(1)).unwrap().is_some());
        tracker.pause();
        assert!(tracker.next_frame(Duration::from_millis(1)).unwrap().is_none());
        assert_eq!(tracker.counters().pauses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_warmup_after_reset() {
        let mut tracker = SyntheticTracker::new(30.0).with_warmup(2);
        tracker.start(true).unwrap();
        let states: Vec<_> = (0..3)
            .map(|_| tracker.generate().tracking_state)
            .collect();
        assert_eq!(states[0], RawTrackingState::limited("initializing"));
        assert_eq!(states[1], RawTrackingState::limited("initializing"));
        assert_eq!(states[2], RawTrackingState::Normal);
    }

    #[test]
    fn test_max_frames() {
        let mut tracker = SyntheticTracker::new(30.0).with_max_frames(2);
        tracker.start(true).unwrap();
        assert!(tracker.next_frame(Duration::ZERO).unwrap().is_some());
        assert!(tracker.next_frame(Duration::ZERO).unwrap().is_some());
        assert!(tracker.next_frame(Duration::ZERO).unwrap().is_none());
    }

    #[test]
    fn test_memory_sink_failure_injection() {
        let (sink, received) = MemoryVideoSink::new();
        let mut sink = sink.failing_at(1);
        let image = synthetic_image(0, 4, 4);
        sink.append(&image, 0.0).unwrap();
        assert!(sink.append(&image, 0.1).is_err());
        sink.append(&image, 0.2).unwrap();
        assert_eq!(received.pts(), vec![0.0, 0.2]);

        let summary = Box::new(sink).finish().unwrap();
        assert_eq!(summary.frames, 2);
        assert!(received.finished.load(Ordering::Relaxed));
    }

    #[test]
    fn test_memory_sink_drop_injection() {
        let (sink, received) = MemoryVideoSink::new();
        let mut sink = sink.dropping_at(0);
        let image = synthetic_image(0, 4, 4);
        assert_eq!(sink.append(&image, 0.0).unwrap(), FrameWrite::Dropped);
        assert_eq!(sink.append(&image, 0.1).unwrap(), FrameWrite::Written);
        assert_eq!(received.pts(), vec![0.1]);
    }
}
