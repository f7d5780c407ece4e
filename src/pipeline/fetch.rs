//! Image fetching: transport reference → bytes → decoded RGB raster.
//!
//! Decoding a 12-megapixel JPEG takes tens of milliseconds of pure CPU, so it
//! runs in `spawn_blocking` rather than on a Tokio worker thread.

use crate::error::{Img2PdfError, Result};
use crate::event::{DecodedPage, ImageRef, PendingImage};
use crate::transport::Transport;
use image::RgbImage;
use std::sync::Arc;
use tracing::debug;

/// Downloads images through the transport and decodes them.
#[derive(Clone)]
pub struct ImageFetcher {
    transport: Arc<dyn Transport>,
}

impl ImageFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch and decode one image, keeping its sequence position.
    pub async fn fetch(&self, item: &PendingImage) -> Result<DecodedPage> {
        let bytes = self.transport.download(&item.image).await?;
        debug!("Fetched {} ({} bytes)", item.image, bytes.len());

        let image = item.image.clone();
        let raster = tokio::task::spawn_blocking(move || decode_image(&image, &bytes))
            .await
            .map_err(|e| Img2PdfError::Internal(format!("Decode task panicked: {}", e)))??;

        Ok(DecodedPage {
            sequence: item.sequence,
            raster,
        })
    }
}

/// Decode raw bytes into an 8-bit RGB raster; alpha is discarded.
pub fn decode_image(image: &ImageRef, bytes: &[u8]) -> Result<RgbImage> {
    let decoded = image::load_from_memory(bytes).map_err(|source| Img2PdfError::Decode {
        file_id: image.0.clone(),
        source,
    })?;
    debug!(
        "Decoded {} → {}x{} px ({:?})",
        image,
        decoded.width(),
        decoded.height(),
        decoded.color()
    );
    Ok(decoded.to_rgb8())
}
