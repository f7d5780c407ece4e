//! The messaging-transport seam.
//!
//! Everything the bot needs from the chat platform fits in three calls.
//! Implementations must be `Send + Sync`: album finalizers call them from
//! timer tasks running concurrently with inbound message handling.

use crate::error::Result;
use crate::event::{ChatId, ImageRef};
use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve an image reference to its raw bytes.
    ///
    /// Errors are expected to be [`crate::Img2PdfError::Fetch`].
    async fn download(&self, image: &ImageRef) -> Result<Vec<u8>>;

    /// Send a plain text message.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Send a binary document with the given file name.
    async fn send_document(&self, chat_id: ChatId, filename: &str, bytes: Vec<u8>) -> Result<()>;
}
