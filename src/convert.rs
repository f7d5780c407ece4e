//! Conversion entry points: items → PDF → reply.
//!
//! [`Converter`] is the one place where a failed conversion becomes a chat
//! message. Everything below it (fetch, decode, build) returns
//! `Result<_, Img2PdfError>` and propagates with `?`; everything above it (the
//! request handler, the album aggregator) just calls in and moves on.
//!
//! Album items are fetched concurrently and may complete in any order, so
//! the decoded pages are sorted by sequence position before the PDF is built.

use crate::aggregator::{AlbumSink, CompletedAlbum};
use crate::config::BotConfig;
use crate::error::{Img2PdfError, Result};
use crate::event::{ChatId, DecodedPage, ImageEvent, PendingImage};
use crate::pipeline::document::DocumentBuilder;
use crate::pipeline::fetch::ImageFetcher;
use crate::transport::Transport;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Fetches, builds and delivers documents.
pub struct Converter {
    transport: Arc<dyn Transport>,
    fetcher: ImageFetcher,
    builder: DocumentBuilder,
    filename: String,
    fetch_concurrency: usize,
}

impl Converter {
    pub fn new(transport: Arc<dyn Transport>, config: &BotConfig) -> Self {
        Self {
            fetcher: ImageFetcher::new(Arc::clone(&transport)),
            transport,
            builder: DocumentBuilder::new(config.page_dpi, config.jpeg_quality),
            filename: config.document_filename.clone(),
            fetch_concurrency: config.fetch_concurrency,
        }
    }

    /// Convert items into one PDF, one page per item in sequence order.
    ///
    /// # Errors
    /// The first fetch or decode failure aborts the whole conversion; no
    /// partial document is produced.
    pub async fn convert(&self, items: &[PendingImage]) -> Result<Vec<u8>> {
        // Collected up front so the stream holds no borrowing closure and the
        // future stays `Send` for the aggregator's timer task.
        let fetches: Vec<_> = items.iter().map(|item| self.fetcher.fetch(item)).collect();
        let mut pages: Vec<DecodedPage> = stream::iter(fetches)
            .buffer_unordered(self.fetch_concurrency)
            .try_collect()
            .await?;

        // buffer_unordered yields in completion order.
        pages.sort_by_key(|p| p.sequence);

        let rasters = pages.into_iter().map(|p| p.raster).collect();
        self.builder.build(rasters).await
    }

    /// Convert a standalone image and reply.
    pub async fn convert_standalone(&self, event: &ImageEvent) {
        let start = Instant::now();
        info!(
            "Converting standalone image {} from user {} in chat {}",
            event.image, event.originator_id, event.chat_id
        );
        let result = self.convert(&[event.pending()]).await;
        self.deliver(event.chat_id, &format!("image {}", event.image), 1, result, start)
            .await;
    }

    /// Convert a finalized album and reply.
    pub async fn convert_album(&self, album: CompletedAlbum) {
        let start = Instant::now();
        info!(
            "Converting album {} ({} images) from user {} in chat {}",
            album.album_id,
            album.items.len(),
            album.originator_id,
            album.chat_id
        );
        let result = self.convert(&album.items).await;
        self.deliver(
            album.chat_id,
            &format!("album {}", album.album_id),
            album.items.len(),
            result,
            start,
        )
        .await;
    }

    /// Send the document, or exactly one error message.
    async fn deliver(
        &self,
        chat_id: ChatId,
        what: &str,
        pages: usize,
        result: Result<Vec<u8>>,
        start: Instant,
    ) {
        let err = match result {
            Ok(bytes) => {
                let size = bytes.len();
                match self.transport.send_document(chat_id, &self.filename, bytes).await {
                    Ok(()) => {
                        info!(
                            "Sent {} page(s), {} bytes for {} to chat {} in {}ms",
                            pages,
                            size,
                            what,
                            chat_id,
                            start.elapsed().as_millis()
                        );
                        return;
                    }
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        error!(kind = ?err.kind(), "Conversion of {} for chat {} failed: {}", what, chat_id, err);
        self.report(chat_id, &err).await;
    }

    async fn report(&self, chat_id: ChatId, err: &Img2PdfError) {
        if let Err(e) = self.transport.send_text(chat_id, err.user_message()).await {
            warn!("Could not report error to chat {}: {}", chat_id, e);
        }
    }
}

#[async_trait]
impl AlbumSink for Converter {
    async fn album_ready(&self, album: CompletedAlbum) {
        self.convert_album(album).await;
    }
}
