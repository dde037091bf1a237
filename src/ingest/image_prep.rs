// src/ingest/image_prep.rs
//! Image probing and size reduction before remote OCR.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ImageReader};
use serde::Serialize;

const JPEG_QUALITY: u8 = 85;
/// Aim slightly below the limit; JPEG size does not scale exactly with pixel count.
const TARGET_HEADROOM: f64 = 0.9;

/// Cheap metadata reported alongside fallback results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

/// Read dimensions and format from the header without decoding pixels.
pub fn probe(bytes: &[u8]) -> Option<ImageMeta> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let format = reader
        .format()
        .and_then(|f| f.extensions_str().first().map(|e| e.to_string()));
    let (width, height) = reader.into_dimensions().ok()?;
    Some(ImageMeta {
        width,
        height,
        format,
    })
}

/// Image bytes ready for upload.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub resized: bool,
}

/// Downscale images above `max_bytes` by `sqrt(0.9 * max / size)` per side
/// (Lanczos3) and re-encode as JPEG. Smaller images, and images that cannot be
/// decoded, pass through unchanged.
pub fn prepare_for_upload(bytes: &[u8], mime_type: &str, max_bytes: usize) -> PreparedImage {
    let passthrough = || PreparedImage {
        bytes: bytes.to_vec(),
        mime_type: mime_type.to_string(),
        resized: false,
    };
    if bytes.len() <= max_bytes || max_bytes == 0 {
        return passthrough();
    }

    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!(error = %e, size = bytes.len(), "image decode failed; uploading as-is");
            return passthrough();
        }
    };

    let ratio = (TARGET_HEADROOM * max_bytes as f64 / bytes.len() as f64).sqrt();
    let width = ((f64::from(img.width()) * ratio) as u32).max(1);
    let height = ((f64::from(img.height()) * ratio) as u32).max(1);
    let rgb = img.resize(width, height, FilterType::Lanczos3).to_rgb8();

    let mut out = Vec::new();
    if let Err(e) = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb) {
        tracing::debug!(error = %e, "jpeg re-encode failed; uploading as-is");
        return passthrough();
    }

    tracing::debug!(
        original = bytes.len(),
        reduced = out.len(),
        width,
        height,
        "image downscaled for OCR"
    );
    PreparedImage {
        bytes: out,
        mime_type: "image/jpeg".to_string(),
        resized: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        // noisy pixels so PNG compression cannot shrink the file much
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503)) as u8;
            image::Rgb([v, v.wrapping_mul(7), v.wrapping_add(y as u8)])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn probe_reads_dimensions_and_format() {
        let meta = probe(&png(12, 7)).unwrap();
        assert_eq!((meta.width, meta.height), (12, 7));
        assert_eq!(meta.format.as_deref(), Some("png"));
        assert!(probe(b"not an image").is_none());
    }

    #[test]
    fn small_images_pass_through() {
        let bytes = png(8, 8);
        let out = prepare_for_upload(&bytes, "image/png", bytes.len());
        assert!(!out.resized);
        assert_eq!(out.bytes, bytes);
        assert_eq!(out.mime_type, "image/png");
    }

    #[test]
    fn large_images_are_downscaled_to_jpeg() {
        let bytes = png(200, 200);
        let limit = bytes.len() / 4;
        let out = prepare_for_upload(&bytes, "image/png", limit);
        assert!(out.resized);
        assert_eq!(out.mime_type, "image/jpeg");
        let meta = probe(&out.bytes).unwrap();
        assert!(meta.width < 200 && meta.height < 200);
    }

    #[test]
    fn undecodable_oversized_input_passes_through() {
        let bytes = vec![7u8; 64];
        let out = prepare_for_upload(&bytes, "image/png", 16);
        assert!(!out.resized);
        assert_eq!(out.bytes, bytes);
    }
}
