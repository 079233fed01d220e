//! Photo preparation for the vision endpoint.
//!
//! Photos are downscaled so the longer edge is at most [`MAX_EDGE`] pixels,
//! re-encoded as JPEG and wrapped in a `data:` URI.

use std::path::Path;

use base64::Engine as _;
use image::ImageEncoder;
use image::imageops::FilterType;

use crate::error::{EchoError, Result};

/// Longest edge of a prepared photo, in pixels.
pub const MAX_EDGE: u32 = 1024;

/// JPEG quality used for re-encoding.
pub const JPEG_QUALITY: u8 = 80;

/// Prepare raw photo bytes for upload.
///
/// Input that cannot be decoded is passed through unchanged as a data URI
/// with the caller's MIME type.
///
/// # Errors
///
/// Returns [`EchoError::Photo`] if `mime` is not an image type or `bytes`
/// is empty.
pub fn prepare_photo(bytes: &[u8], mime: &str) -> Result<String> {
    if !mime.starts_with("image/") {
        return Err(EchoError::Photo(format!("not an image: {mime}")));
    }
    if bytes.is_empty() {
        return Err(EchoError::Photo("photo is empty".into()));
    }

    match downscale_to_jpeg(bytes) {
        Ok(jpeg) => Ok(data_uri("image/jpeg", &jpeg)),
        Err(e) => {
            tracing::warn!(error = %e, mime, "photo compression failed, sending original");
            Ok(data_uri(mime, bytes))
        }
    }
}

/// Read and prepare a photo file. The MIME type is inferred from the
/// extension.
///
/// # Errors
///
/// Returns [`EchoError::Io`] if the file cannot be read and
/// [`EchoError::Photo`] if the extension is not a known image type.
pub fn prepare_photo_file(path: &Path) -> Result<String> {
    let mime = mime_for_path(path).ok_or_else(|| {
        EchoError::Photo(format!("unsupported photo type: {}", path.display()))
    })?;
    let bytes = std::fs::read(path)?;
    prepare_photo(&bytes, mime)
}

/// Image MIME type for a file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// Size that fits within `max` on the longer edge, aspect preserved.
/// Images already small enough are left alone.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scaled = |short: u32, long: u32| -> u32 {
        let v = (f64::from(short) * f64::from(max) / f64::from(long)).round();
        (v as u32).max(1)
    };
    if width > height {
        (max, scaled(height, width))
    } else {
        (scaled(width, height), max)
    }
}

fn downscale_to_jpeg(bytes: &[u8]) -> std::result::Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let (w, h) = fit_within(img.width(), img.height(), MAX_EDGE);
    let img = if (w, h) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Triangle)
    };
    let rgb = img.to_rgb8();

    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{b64}")
}
