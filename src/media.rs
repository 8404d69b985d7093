//! Media file naming and still-photo output

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use uuid::Uuid;

use crate::errors::{CalibrationError, Result};
use crate::types::FrameImage;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Unique base names for captured media
pub struct MediaName;

impl MediaName {
    /// `photo_<uuid>.jpg`
    pub fn photo() -> String {
        format!("photo_{}.jpg", Uuid::new_v4())
    }

    /// `video_<uuid>.mp4`
    pub fn video() -> String {
        Self::video_with_extension("mp4")
    }

    pub fn video_with_extension(extension: &str) -> String {
        format!("video_{}.{}", Uuid::new_v4(), extension.trim_start_matches('.'))
    }
}

/// Save an RGB24 frame; JPEG for `.jpg`/`.jpeg`, PNG otherwise.
pub fn save_rgb_photo(image: &FrameImage, path: &Path) -> Result<()> {
    if !image.is_valid() {
        return Err(CalibrationError::InvalidArgument(format!(
            "frame image is {}x{} with {} bytes, expected {}",
            image.width,
            image.height,
            image.data.len(),
            image.expected_len()
        )));
    }

    let rgb = image::RgbImage::from_raw(image.width, image.height, image.data.to_vec())
        .ok_or_else(|| {
            CalibrationError::InvalidArgument("failed to create image from frame data".to_string())
        })?;
    let dynamic_img = image::DynamicImage::ImageRgb8(rgb);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let result = match extension.as_deref() {
        Some("jpg") | Some("jpeg") => {
            let file = BufWriter::new(File::create(path)?);
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(file, DEFAULT_JPEG_QUALITY);
            dynamic_img.write_with_encoder(encoder)
        }
        _ => dynamic_img.save_with_format(path, image::ImageFormat::Png),
    };

    result.map_err(|e| CalibrationError::Encoding(format!("failed to save photo: {}", e)))?;
    log::info!("Saved photo to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique_and_prefixed() {
        let a = MediaName::photo();
        let b = MediaName::photo();
        assert_ne!(a, b);
        assert!(a.starts_with("photo_") && a.ends_with(".jpg"));

        let video = MediaName::video();
        assert!(video.starts_with("video_") && video.ends_with(".mp4"));
        assert!(MediaName::video_with_extension(".mov").ends_with(".mov"));
    }

    #[test]
    fn test_save_png_and_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let image = FrameImage::new(4, 2, vec![128; 4 * 2 * 3]);

        let png = dir.path().join("still.png");
        save_rgb_photo(&image, &png).unwrap();
        let decoded = image::open(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));

        let jpg = dir.path().join("sub").join("still.jpg");
        save_rgb_photo(&image, &jpg).unwrap();
        assert!(fs::metadata(&jpg).unwrap().len() > 0);
    }

    #[test]
    fn test_rejects_short_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let image = FrameImage::new(4, 4, vec![0; 10]);
        let err = save_rgb_photo(&image, &dir.path().join("bad.png")).unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidArgument(_)));
    }
}
