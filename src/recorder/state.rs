//! Recorder state machine values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CalibrationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
}

/// Buffer for one recording window.
///
/// Survives `stop()` frozen; replaced wholesale by the next `start()`.
#[derive(Debug)]
pub(crate) struct RecordingWindow {
    pub(crate) is_active: bool,
    pub(crate) buffer: Vec<CalibrationRecord>,
    pub(crate) next_index: u64,
    pub(crate) start_wall_clock: DateTime<Utc>,
}

impl RecordingWindow {
    pub(crate) fn open(start_wall_clock: DateTime<Utc>) -> Self {
        Self {
            is_active: true,
            buffer: Vec::new(),
            next_index: 0,
            start_wall_clock,
        }
    }

    pub(crate) fn push(&mut self, record: CalibrationRecord) -> u64 {
        let index = self.next_index;
        self.buffer.push(record.with_frame_index(index));
        self.next_index += 1;
        index
    }
}

/// Read-only view of the recorder for status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderStatus {
    pub state: RecorderState,
    pub buffered_frames: usize,
    pub window_started_at: Option<DateTime<Utc>>,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
}
