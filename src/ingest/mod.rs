//! Frame ingestion and live fan-out
//!
//! The [`FrameSampleIngestor`] sits at the producer edge of the pipeline: the
//! tracking provider's per-frame callback hands it a [`ProviderFrame`], which
//! is normalized into a [`CalibrationRecord`], forwarded to an attached
//! [`SessionRecorder`] and pushed to every live [`Subscription`].
//!
//! Each subscription owns a bounded drop-oldest queue, so a slow or absent
//! reader only ever loses its own stale records; the producer never waits.

mod queue;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::recorder::SessionRecorder;
use crate::types::{
    CalibrationRecord, LimitedReason, ProviderFrame, RawTrackingState, TrackingQuality,
};
use queue::DropOldestQueue;

/// Default depth of a live subscription queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Map a provider tracking state onto the normalized quality enum.
pub fn classify_tracking(state: &RawTrackingState) -> TrackingQuality {
    match state {
        RawTrackingState::Normal => TrackingQuality::Normal,
        RawTrackingState::Limited { reason } => TrackingQuality::Limited(
            reason
                .as_deref()
                .map(LimitedReason::from_provider)
                .unwrap_or(LimitedReason::Unknown),
        ),
        RawTrackingState::NotAvailable => TrackingQuality::Unavailable,
    }
}

/// Convert a provider frame into a calibration record. Pure and infallible.
pub fn normalize(frame: &ProviderFrame, frame_index: Option<u64>) -> CalibrationRecord {
    CalibrationRecord::new(
        frame.intrinsics,
        frame.image_resolution,
        frame.camera_transform,
        frame.euler_angles,
        frame.projection_matrix,
        frame.timestamp,
        frame_index,
        classify_tracking(&frame.tracking_state),
    )
}

/// Receiving end of the live record stream
pub struct Subscription {
    queue: Arc<DropOldestQueue<CalibrationRecord>>,
}

impl Subscription {
    /// Next record, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<CalibrationRecord> {
        self.queue.pop_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<CalibrationRecord> {
        self.queue.try_pop()
    }

    /// Newest pending record, discarding anything older.
    pub fn latest(&self) -> Option<CalibrationRecord> {
        let mut newest = None;
        while let Some(record) = self.queue.try_pop() {
            newest = Some(record);
        }
        newest
    }

    /// Records evicted because this subscriber fell behind
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.close();
    }
}

pub struct FrameSampleIngestor {
    latest: Mutex<Option<ProviderFrame>>,
    subscribers: Mutex<Vec<Weak<DropOldestQueue<CalibrationRecord>>>>,
    recorder: Mutex<Option<Arc<SessionRecorder>>>,
    queue_capacity: usize,
    frames_ingested: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FrameSampleIngestor {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            latest: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            recorder: Mutex::new(None),
            queue_capacity: queue_capacity.max(1),
            frames_ingested: AtomicU64::new(0),
        }
    }

    /// Convert a provider frame; see [`normalize`].
    pub fn normalize(&self, frame: &ProviderFrame, frame_index: Option<u64>) -> CalibrationRecord {
        normalize(frame, frame_index)
    }

    /// Producer callback: remember the frame, record it, and publish it.
    ///
    /// Returns the live (unindexed) record.
    pub fn ingest(&self, frame: ProviderFrame) -> CalibrationRecord {
        let record = normalize(&frame, None);
        *lock(&self.latest) = Some(frame);
        self.frames_ingested.fetch_add(1, Ordering::Relaxed);

        let recorder = lock(&self.recorder).clone();
        if let Some(recorder) = recorder {
            recorder.append(record.clone());
        }

        self.publish(&record);
        record
    }

    /// Push `record` to every live subscriber without blocking.
    pub fn publish(&self, record: &CalibrationRecord) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|weak| match weak.upgrade() {
            Some(queue) => queue.push(record.clone()),
            None => false,
        });
    }

    /// Latest provider frame, normalized; `None` until a frame arrives or
    /// after [`reset`](Self::reset).
    pub fn current_snapshot(&self) -> Option<CalibrationRecord> {
        lock(&self.latest)
            .as_ref()
            .map(|frame| normalize(frame, None))
    }

    /// Raw copy of the latest provider frame
    pub fn latest_frame(&self) -> Option<ProviderFrame> {
        lock(&self.latest).clone()
    }

    /// Forget the latest frame (tracking paused or interrupted).
    pub fn reset(&self) {
        if lock(&self.latest).take().is_some() {
            log::debug!("Cleared latest tracking frame");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let queue = Arc::new(DropOldestQueue::new(self.queue_capacity));
        lock(&self.subscribers).push(Arc::downgrade(&queue));
        log::debug!("Added live subscriber (capacity {})", self.queue_capacity);
        Subscription { queue }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|weak| weak.upgrade().is_some_and(|q| !q.is_closed()));
        subscribers.len()
    }

    /// Route every ingested record to `recorder` as well.
    pub fn attach_recorder(&self, recorder: Arc<SessionRecorder>) {
        *lock(&self.recorder) = Some(recorder);
    }

    pub fn detach_recorder(&self) -> Option<Arc<SessionRecorder>> {
        lock(&self.recorder).take()
    }

    pub fn frames_ingested(&self) -> u64 {
        self.frames_ingested.load(Ordering::Relaxed)
    }
}

impl Default for FrameSampleIngestor {
    fn default() -> Self {
        Self::new()
    }
}
