//! Error types for the edgequake-img2pdf library.
//!
//! A single error type, [`Img2PdfError`], covers every failure point. The
//! variants fall into two groups:
//!
//! * **Per-request** ([`ErrorKind::Fetch`], [`ErrorKind::Decode`],
//!   [`ErrorKind::Encode`], [`ErrorKind::Delivery`]): one image or one album
//!   could not be turned into a PDF. These are caught once, in
//!   [`crate::convert::Converter`], logged with context and turned into a
//!   single chat message via [`Img2PdfError::user_message`]. Processing of
//!   other images and albums is unaffected.
//!
//! * **Fatal** ([`ErrorKind::Config`]): the bot cannot start at all. Returned
//!   from [`crate::config::BotConfigBuilder::build`] before any update is
//!   polled.
//!
//! The `Display` text carries diagnostic detail for the operational log; the
//! chat only ever sees the fixed, informal [`Img2PdfError::user_message`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors returned by the edgequake-img2pdf library.
#[derive(Debug, Error)]
pub enum Img2PdfError {
    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The transport could not resolve or download the image bytes.
    #[error("Failed to fetch image '{file_id}': {reason}")]
    Fetch { file_id: String, reason: String },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// Bytes were downloaded but are not a valid or supported image.
    #[error("Image '{file_id}' could not be decoded: {source}")]
    Decode {
        file_id: String,
        #[source]
        source: image::ImageError,
    },

    // ── Encode errors ─────────────────────────────────────────────────────
    /// The PDF could not be assembled (no pages, JPEG or PDF write failure).
    #[error("Document assembly failed: {0}")]
    Encode(String),

    // ── Delivery errors ───────────────────────────────────────────────────
    /// A reply (text or document) could not be sent to the chat.
    #[error("Failed to deliver reply to chat {chat_id}: {reason}")]
    Delivery { chat_id: i64, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Startup configuration is missing or invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Img2PdfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Fetch,
    Decode,
    Encode,
    Delivery,
    Config,
    Internal,
}

impl Img2PdfError {
    /// Shorthand for a [`Img2PdfError::Fetch`] built from any displayable cause.
    pub fn fetch(file_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            file_id: file_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a [`Img2PdfError::Delivery`].
    pub fn delivery(chat_id: i64, reason: impl std::fmt::Display) -> Self {
        Self::Delivery {
            chat_id,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Delivery { .. } => ErrorKind::Delivery,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The message shown to the user in the chat.
    ///
    /// Never contains file ids, paths or library error text; those go to
    /// the log line written next to it.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Fetch => "Sorry, I couldn't download your image. Please try sending it again.",
            ErrorKind::Decode => "Sorry, that file doesn't look like an image I can read.",
            ErrorKind::Encode => "Oops! Something went wrong while creating the PDF.",
            ErrorKind::Delivery => "Oops! I couldn't send you the PDF. Please try again.",
            ErrorKind::Config | ErrorKind::Internal => {
                "Oops! Something went wrong on my side. Please try again later."
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Img2PdfError>;
