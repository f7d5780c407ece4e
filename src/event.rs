//! Inbound events and the identifiers they carry.
//!
//! These types are transport-neutral: the Telegram adapter in
//! [`crate::telegram`] builds them from `teloxide` messages, and tests build
//! them by hand.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination chat for replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// The user who sent the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Transport-supplied identifier shared by every part of one album.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumId(pub String);

/// Opaque handle the transport can resolve to image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(pub String);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlbumId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One inbound image notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEvent {
    pub chat_id: ChatId,
    pub originator_id: UserId,
    /// Monotonic per chat (the message id); used only to order album pages.
    pub sequence: i64,
    /// Present only when the image is part of a multi-image batch.
    pub album_id: Option<AlbumId>,
    pub image: ImageRef,
}

impl ImageEvent {
    /// The part of the event buffered by the aggregator.
    pub fn pending(&self) -> PendingImage {
        PendingImage {
            sequence: self.sequence,
            image: self.image.clone(),
        }
    }
}

/// An image waiting to be fetched, tagged with its sequence position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingImage {
    pub sequence: i64,
    pub image: ImageRef,
}

/// A fetched and decoded page, still tagged with its sequence position so
/// send order can be restored after concurrent fetching.
#[derive(Debug, Clone)]
pub struct DecodedPage {
    pub sequence: i64,
    pub raster: RgbImage,
}

/// Bot commands. Anything else starting with `/` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Help,
}

impl Command {
    /// Parse a message text as a command.
    ///
    /// Accepts the `/cmd@botname` form Telegram uses in group chats and
    /// ignores any trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim_start().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Everything the request handler reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command { chat_id: ChatId, command: Command },
    Image(ImageEvent),
}
