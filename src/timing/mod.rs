//! Presentation timestamps for recorded video
//!
//! Tracking timestamps are seconds on the provider's monotonic clock. The
//! video sink wants PTS starting at zero, so the first submitted frame
//! becomes the origin and every later frame is expressed relative to it.
//! The origin is what the manifest records as `sessionStartTime`.

use crate::errors::{CalibrationError, Result};

#[derive(Debug, Clone, Default)]
pub struct PtsTimeline {
    origin: Option<f64>,
    last: Option<f64>,
    frames: u64,
}

impl PtsTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracking timestamp mapped to PTS 0, once the first frame is in
    pub fn origin(&self) -> Option<f64> {
        self.origin
    }

    /// Accept `timestamp` and return its PTS.
    ///
    /// Fails with [`CalibrationError::OutOfOrder`] unless it is strictly
    /// later than the previously accepted timestamp; the timeline is left
    /// unchanged in that case.
    pub fn advance(&mut self, timestamp: f64) -> Result<f64> {
        if let Some(previous) = self.last {
            if timestamp <= previous {
                return Err(CalibrationError::OutOfOrder {
                    previous,
                    current: timestamp,
                });
            }
        }

        let origin = *self.origin.get_or_insert(timestamp);
        self.last = Some(timestamp);
        self.frames += 1;
        Ok(timestamp - origin)
    }

    /// PTS `timestamp` would get, without accepting it
    pub fn peek(&self, timestamp: f64) -> Option<f64> {
        self.origin.map(|origin| timestamp - origin)
    }

    pub fn last_pts(&self) -> Option<f64> {
        match (self.origin, self.last) {
            (Some(origin), Some(last)) => Some(last - origin),
            _ => None,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
