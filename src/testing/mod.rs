//! Testing utilities for posecam
//!
//! Synthetic tracking providers, sample frames and an in-memory video sink
//! for exercising the pipeline without a device.

pub mod synthetic_data;

pub use synthetic_data::{
    known_good_frame, synthetic_frame, synthetic_image, MemoryVideoSink, SinkLog,
    SyntheticTracker, TrackerCounters, KNOWN_GOOD_PROJECTION,
};
