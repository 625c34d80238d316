// THEORY:
// Encoding sits at both ends of the external analysis call. The shutter turns the
// live frame into a high quality JPEG at full camera resolution; before upload that
// JPEG is shrunk so its longer side fits the analysis service's budget. The
// animator later decodes the same bytes back into pixels for its backdrop.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, RgbImage, RgbaImage};

use crate::core_modules::device::Frame;

/// JPEG quality of the committed capture (0.95 on the 0-1 scale).
pub const CAPTURE_JPEG_QUALITY: u8 = 95;
/// Longest side allowed for the uploaded image.
pub const UPLOAD_MAX_DIMENSION: u32 = 1024;
/// JPEG quality of the uploaded image (0.85 on the 0-1 scale).
pub const UPLOAD_JPEG_QUALITY: u8 = 85;

const JPEG_MIME: &str = "image/jpeg";

/// A compressed still image.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub mime: &'static str,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>`, as browsers and the analysis service expect.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    pub fn decode_rgba(&self) -> Result<RgbaImage, ImageError> {
        Ok(image::load_from_memory(&self.bytes)?.to_rgba8())
    }
}

fn encode_rgb_jpeg(rgb: &RgbImage, quality: u8) -> Result<EncodedImage, ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(rgb)?;
    Ok(EncodedImage {
        bytes: buffer.into_inner().into(),
        width: rgb.width(),
        height: rgb.height(),
        mime: JPEG_MIME,
    })
}

/// Encodes a full-resolution frame as JPEG. Alpha is discarded.
pub fn encode_frame(frame: &Frame, quality: u8) -> Result<EncodedImage, ImageError> {
    let rgba = frame.to_rgba_image().ok_or_else(|| {
        ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::DimensionMismatch))
    })?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
    encode_rgb_jpeg(&rgb, quality)
}

/// Target size for upload: the longer side is capped at `max_dimension`, aspect
/// ratio kept, rounding to the nearest pixel.
pub fn upload_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let scaled = |side: u32, ratio: f64| ((side as f64 * ratio).round() as u32).max(1);
    if width > height && width > max_dimension {
        (max_dimension, scaled(height, max_dimension as f64 / width as f64))
    } else if height > max_dimension {
        (scaled(width, max_dimension as f64 / height as f64), max_dimension)
    } else {
        (width, height)
    }
}

/// Shrinks an image for upload. Images already within bounds are returned as-is.
pub fn optimize_for_upload(image: &EncodedImage) -> Result<EncodedImage, ImageError> {
    let (width, height) = upload_dimensions(image.width, image.height, UPLOAD_MAX_DIMENSION);
    if (width, height) == (image.width, image.height) {
        return Ok(image.clone());
    }

    let decoded = image::load_from_memory(&image.bytes)?;
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3).to_rgb8();
    let optimized = encode_rgb_jpeg(&resized, UPLOAD_JPEG_QUALITY)?;
    log::debug!(
        "image optimized: {}x{} -> {}x{}, {}KB -> {}KB",
        image.width,
        image.height,
        width,
        height,
        image.bytes.len() / 1024,
        optimized.bytes.len() / 1024
    );
    Ok(optimized)
}
