//! Page encoding: `RgbImage` → baseline JPEG bytes.
//!
//! PDF readers can display JPEG data natively (`/DCTDecode`), so each page is
//! stored exactly as these bytes with no further re-encoding. Photos from
//! Telegram are JPEG already; re-encoding at quality 90 keeps them visually
//! identical while normalising odd inputs (PNG with alpha, WebP) to a format
//! every reader handles.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::debug;

/// Encode a page raster as JPEG at the given quality (1–100).
pub fn encode_page(img: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;

    debug!(
        "Encoded {}x{} page → {} bytes JPEG",
        img.width(),
        img.height(),
        buf.len()
    );

    Ok(buf)
}
