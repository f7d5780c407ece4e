//! Pipeline stages for image-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without a transport.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ encode ──▶ document
//! (bytes → RGB)  (RGB → JPEG)  (JPEGs → PDF)
//! ```
//!
//! 1. [`fetch`]    : download through the [`crate::transport::Transport`] and
//!    decode in `spawn_blocking`
//! 2. [`encode`]   : JPEG-encode each raster for embedding
//! 3. [`document`] : lay out one page per raster; runs in `spawn_blocking`

pub mod document;
pub mod encode;
pub mod fetch;
