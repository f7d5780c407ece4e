//! Inbound event routing.
//!
//! ```text
//! InboundEvent ─┬─ Command ──────────────▶ send_text(WELCOME_MESSAGE)
//!               └─ Image ─┬─ no album id ─▶ Converter::convert_standalone (awaited)
//!                         └─ album id ────▶ AlbumAggregator::add (returns at once)
//! ```

use crate::aggregator::{AlbumAggregator, AlbumSink};
use crate::config::BotConfig;
use crate::convert::Converter;
use crate::event::{ChatId, Command, ImageEvent, InboundEvent};
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reply to `/start` and `/help`.
pub const WELCOME_MESSAGE: &str = "\
Hi! I'm a bot that converts images into PDF files.

Just send me one or more images, and I'll send you back a PDF file.
Images sent together as an album become one PDF with one page per image.";

/// Routes each inbound event to the right path.
pub struct RequestHandler {
    transport: Arc<dyn Transport>,
    converter: Arc<Converter>,
    aggregator: AlbumAggregator,
}

impl RequestHandler {
    pub fn new(transport: Arc<dyn Transport>, config: &BotConfig) -> Self {
        let converter = Arc::new(Converter::new(Arc::clone(&transport), config));
        let aggregator = AlbumAggregator::new(
            config.album_window,
            Arc::clone(&converter) as Arc<dyn AlbumSink>,
        );
        Self {
            transport,
            converter,
            aggregator,
        }
    }

    /// The album aggregator fed by this handler.
    pub fn aggregator(&self) -> &AlbumAggregator {
        &self.aggregator
    }

    pub async fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::Command { chat_id, command } => self.handle_command(chat_id, command).await,
            InboundEvent::Image(image) => self.handle_image(image).await,
        }
    }

    async fn handle_command(&self, chat_id: ChatId, command: Command) {
        debug!("Command {:?} in chat {}", command, chat_id);
        match command {
            Command::Start | Command::Help => {
                if let Err(e) = self.transport.send_text(chat_id, WELCOME_MESSAGE).await {
                    warn!("Could not send welcome message to chat {}: {}", chat_id, e);
                }
            }
        }
    }

    /// Standalone images are converted before this returns; album parts are
    /// buffered and converted later by the aggregator's timer.
    pub async fn handle_image(&self, event: ImageEvent) {
        match event.album_id.clone() {
            None => self.converter.convert_standalone(&event).await,
            Some(album_id) => {
                debug!(
                    "Image {} (seq {}) belongs to album {}",
                    event.image, event.sequence, album_id
                );
                self.aggregator
                    .add(album_id, event.pending(), event.chat_id, event.originator_id);
            }
        }
    }
}
