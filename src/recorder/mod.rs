//! Session recorder
//!
//! A two-state machine (`Idle`, `Recording`) that buffers calibration records
//! while a recording window is open. All transitions and buffer mutations go
//! through one mutex, so `stop()` is a barrier: an `append()` that acquired
//! the lock first is in the returned buffer, one that acquires it afterwards
//! sees `Idle` and is discarded.

mod state;

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::CalibrationRecord;
pub use state::{RecorderState, RecorderStatus};
use state::RecordingWindow;

#[derive(Debug, Default)]
struct Inner {
    state: RecorderState,
    window: Option<RecordingWindow>,
}

#[derive(Debug, Default)]
pub struct SessionRecorder {
    inner: Mutex<Inner>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a fresh window, discarding any previous buffer.
    ///
    /// Calling this while already recording restarts the window.
    pub fn start(&self) -> DateTime<Utc> {
        let started_at = Utc::now();
        let mut inner = self.lock();

        if inner.state == RecorderState::Recording {
            let discarded = inner.window.as_ref().map_or(0, |w| w.buffer.len());
            log::info!("Restarting calibration recording, discarding {} frames", discarded);
        } else {
            log::info!("Starting calibration recording");
        }

        inner.window = Some(RecordingWindow::open(started_at));
        inner.state = RecorderState::Recording;
        started_at
    }

    /// Buffer `record` at the next frame index. Returns the assigned index,
    /// or `None` when idle.
    pub fn append(&self, record: CalibrationRecord) -> Option<u64> {
        let mut inner = self.lock();
        if inner.state != RecorderState::Recording {
            return None;
        }

        let window = inner.window.as_mut()?;
        let index = window.push(record);
        log::trace!("Buffered calibration frame {}", index);
        Some(index)
    }

    /// Close the window and return its records in order.
    ///
    /// The buffer is kept until the next `start()`. Stopping while idle
    /// returns an empty vec.
    pub fn stop(&self) -> Vec<CalibrationRecord> {
        let mut inner = self.lock();
        if inner.state != RecorderState::Recording {
            log::debug!("stop() while idle, nothing to return");
            return Vec::new();
        }

        inner.state = RecorderState::Idle;
        match inner.window.as_mut() {
            Some(window) => {
                window.is_active = false;
                log::info!(
                    "Stopped calibration recording with {} frames",
                    window.buffer.len()
                );
                window.buffer.clone()
            }
            None => Vec::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    pub fn status(&self) -> RecorderStatus {
        let inner = self.lock();
        let window = inner.window.as_ref();
        let active = window.filter(|w| w.is_active);
        RecorderStatus {
            state: inner.state,
            buffered_frames: active.map_or(0, |w| w.buffer.len()),
            window_started_at: window.map(|w| w.start_wall_clock),
            first_timestamp: active.and_then(|w| w.buffer.first()).map(|r| r.timestamp()),
            last_timestamp: active.and_then(|w| w.buffer.last()).map(|r| r.timestamp()),
        }
    }
}
