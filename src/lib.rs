//! # edgequake-img2pdf
//!
//! A Telegram bot that turns photos into PDF documents: send one image, get a
//! one-page PDF back; send an album, get one PDF with a page per image, in
//! the order the images were sent.
//!
//! ## Why is there an aggregator?
//!
//! Telegram delivers an album as N independent messages that share a
//! `media_group_id`. Nothing marks the last one. The
//! [`AlbumAggregator`] buffers the parts and waits for a short silence (2 s
//! by default) after the latest part before treating the album as complete.
//! It is the only component with shared state, and it guarantees each album
//! is converted exactly once even when a timer fires just as a new part
//! arrives.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Telegram update
//!  │
//!  ├─ 1. Route    command / standalone image / album part   (handler)
//!  ├─ 2. Group    album parts until W of silence            (aggregator)
//!  ├─ 3. Fetch    getFile + download, decode to RGB         (pipeline::fetch)
//!  ├─ 4. Order    sort pages by message id                  (convert)
//!  ├─ 5. Build    JPEG-encode pages, assemble PDF           (pipeline::document)
//!  └─ 6. Reply    sendDocument, or one error message        (convert)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2pdf::BotConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BotConfig::builder()
//!         .token_opt(std::env::var("TELEGRAM_TOKEN").ok())
//!         .build()?;
//!     edgequake_img2pdf::telegram::run(config, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature    | Default | Description |
//! |------------|---------|-------------|
//! | `telegram` | on      | Telegram transport (`teloxide`) and the polling loop |
//! | `cli`      | on      | Enables the `img2pdf-bot` binary (clap + anyhow + tracing-subscriber) |
//!
//! Without `telegram` the crate is a transport-agnostic library: implement
//! [`Transport`] and feed [`RequestHandler::handle`] yourself.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aggregator;
pub mod config;
pub mod convert;
pub mod error;
pub mod event;
pub mod handler;
pub mod pipeline;
#[cfg(feature = "telegram")]
pub mod telegram;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use aggregator::{AlbumAggregator, AlbumSink, CompletedAlbum};
pub use config::{BotConfig, BotConfigBuilder, DEFAULT_ALBUM_WINDOW, DEFAULT_DOCUMENT_FILENAME};
pub use convert::Converter;
pub use error::{ErrorKind, Img2PdfError};
pub use event::{
    AlbumId, ChatId, Command, DecodedPage, ImageEvent, ImageRef, InboundEvent, PendingImage, UserId,
};
pub use handler::{RequestHandler, WELCOME_MESSAGE};
pub use pipeline::document::DocumentBuilder;
pub use pipeline::fetch::ImageFetcher;
pub use transport::Transport;
