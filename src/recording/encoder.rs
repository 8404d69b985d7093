//! H.264 encoder wrapper using openh264

use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate, FrameType};
use openh264::formats::YUVBuffer;
use openh264::OpenH264API;

use crate::config::RecordingSettings;
use crate::errors::{CalibrationError, Result};

/// Rate control handed to openh264
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderSettings {
    pub bitrate_bps: u32,
    pub max_frame_rate: f64,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::from(&RecordingSettings::default())
    }
}

impl From<&RecordingSettings> for EncoderSettings {
    fn from(settings: &RecordingSettings) -> Self {
        Self {
            bitrate_bps: settings.effective_bitrate(),
            max_frame_rate: settings.fps,
        }
    }
}

/// H.264 encoder for fixed-size RGB24 frames
pub struct H264Encoder {
    encoder: Encoder,
    settings: EncoderSettings,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl H264Encoder {
    /// Dimensions must be even for 4:2:0 subsampling.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_settings(width, height, EncoderSettings::default())
    }

    pub fn with_settings(width: u32, height: u32, settings: EncoderSettings) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(CalibrationError::Encoding(format!(
                "H.264 needs non-zero even dimensions, got {}x{}",
                width, height
            )));
        }

        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(settings.bitrate_bps))
            .max_frame_rate(FrameRate::from_hz(settings.max_frame_rate as f32));
        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| CalibrationError::Encoding(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            settings,
            width,
            height,
            frame_count: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn settings(&self) -> EncoderSettings {
        self.settings
    }

    /// Encode one frame to Annex B NAL units.
    pub fn encode_rgb(&mut self, rgb_data: &[u8]) -> Result<EncodedFrame> {
        let expected_size = (self.width * self.height * 3) as usize;
        if rgb_data.len() != expected_size {
            return Err(CalibrationError::Encoding(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected_size,
                rgb_data.len()
            )));
        }

        let yuv = YUVBuffer::from_vec(
            rgb_to_yuv420(rgb_data, self.width, self.height),
            self.width as usize,
            self.height as usize,
        );
        let bitstream = self
            .encoder
            .encode(&yuv)
            .map_err(|e| CalibrationError::Encoding(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;
        Ok(EncodedFrame {
            is_keyframe: matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I),
            data: bitstream.to_vec(),
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// RGB24 to planar YUV420, BT.601
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let rgb_idx = (y * w + x) * 3;
            let r = rgb[rgb_idx] as i32;
            let g = rgb[rgb_idx + 1] as i32;
            let b = rgb[rgb_idx + 2] as i32;

            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            // Chroma from the top-left pixel of each 2x2 block
            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}
