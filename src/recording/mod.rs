//! Video recording for posecam
//!
//! An MP4 [`VideoSink`](crate::session::VideoSink) built on:
//! - openh264 for H.264 encoding
//! - muxide for MP4 muxing
//!
//! # Example
//! ```rust,ignore
//! use posecam::recording::Mp4VideoSink;
//! use posecam::session::RecordingTarget;
//!
//! let name = posecam::MediaName::video();
//! let sink = Mp4VideoSink::new(dir.join(&name), config.recording.clone());
//! session.start_recording(RecordingTarget::with_sink(name, Box::new(sink)))?;
//! ```

mod encoder;
mod sink;

pub use encoder::{EncodedFrame, EncoderSettings, H264Encoder};
pub use sink::Mp4VideoSink;
