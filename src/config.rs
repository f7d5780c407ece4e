//! Configuration for the image-to-PDF bot.
//!
//! All runtime behaviour is controlled through [`BotConfig`], built via its
//! [`BotConfigBuilder`]. The builder is the only way to obtain a config, so a
//! missing bot token is caught in [`BotConfigBuilder::build`] before any
//! update is polled.

use crate::error::Img2PdfError;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;

/// Default silence window after the last album item before the album is
/// considered complete.
pub const DEFAULT_ALBUM_WINDOW: Duration = Duration::from_secs(2);

/// File name attached to every produced document.
pub const DEFAULT_DOCUMENT_FILENAME: &str = "file.pdf";

/// Configuration for the bot.
///
/// # Example
/// ```rust
/// use edgequake_img2pdf::BotConfig;
/// use std::time::Duration;
///
/// let config = BotConfig::builder()
///     .token("123456:ABC-DEF")
///     .album_window_ms(1500)
///     .build()
///     .unwrap();
/// assert_eq!(config.album_window, Duration::from_millis(1500));
/// ```
#[derive(Clone)]
pub struct BotConfig {
    /// Bot API token. Required; never logged.
    pub token: SecretString,

    /// Silence window `W`. Default: 2 s.
    ///
    /// An album is finalized `W` after its *last* item arrived. Telegram
    /// delivers the parts of one album within a few hundred milliseconds of
    /// each other, so 2 s leaves headroom on slow links without making the
    /// user wait noticeably.
    pub album_window: Duration,

    /// Name of the file attached to the reply. Default: `file.pdf`.
    pub document_filename: String,

    /// Pixel density used to derive the physical page size. Default: 100.
    ///
    /// A 1280 × 960 photo becomes a 921.6 × 691.2 pt page at 100 DPI.
    pub page_dpi: f32,

    /// JPEG quality (1–100) used when embedding each page. Default: 90.
    pub jpeg_quality: u8,

    /// Number of album items fetched and decoded at once. Default: 4.
    pub fetch_concurrency: usize,

    /// Timeout for one file download in seconds. Default: 60.
    pub download_timeout_secs: u64,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("album_window", &self.album_window)
            .field("document_filename", &self.document_filename)
            .field("page_dpi", &self.page_dpi)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl BotConfig {
    /// Create a new builder for `BotConfig`.
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder::default()
    }

    /// The raw token, for handing to the transport client.
    pub fn expose_token(&self) -> &str {
        self.token.expose_secret()
    }
}

/// Builder for [`BotConfig`].
pub struct BotConfigBuilder {
    token: Option<SecretString>,
    album_window: Duration,
    document_filename: String,
    page_dpi: f32,
    jpeg_quality: u8,
    fetch_concurrency: usize,
    download_timeout_secs: u64,
}

impl Default for BotConfigBuilder {
    fn default() -> Self {
        Self {
            token: None,
            album_window: DEFAULT_ALBUM_WINDOW,
            document_filename: DEFAULT_DOCUMENT_FILENAME.to_string(),
            page_dpi: 100.0,
            jpeg_quality: 90,
            fetch_concurrency: 4,
            download_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for BotConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfigBuilder")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("album_window", &self.album_window)
            .finish_non_exhaustive()
    }
}

impl BotConfigBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::new(token.into()));
        self
    }

    /// Like [`Self::token`] but accepts the value as read from the
    /// environment, where it may be absent.
    pub fn token_opt(mut self, token: Option<String>) -> Self {
        self.token = token.map(SecretString::new);
        self
    }

    pub fn album_window(mut self, window: Duration) -> Self {
        self.album_window = window;
        self
    }

    pub fn album_window_ms(self, ms: u64) -> Self {
        self.album_window(Duration::from_millis(ms))
    }

    pub fn document_filename(mut self, name: impl Into<String>) -> Self {
        self.document_filename = name.into();
        self
    }

    pub fn page_dpi(mut self, dpi: f32) -> Self {
        self.page_dpi = dpi.clamp(36.0, 600.0);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BotConfig, Img2PdfError> {
        let token = match self.token {
            Some(t) if !t.expose_secret().trim().is_empty() => t,
            _ => {
                return Err(Img2PdfError::Config(
                    "TELEGRAM_TOKEN is not set; provide it in the environment, a .env file or --token"
                        .into(),
                ))
            }
        };
        if self.album_window.is_zero() {
            return Err(Img2PdfError::Config(
                "Album window must be at least 1 ms".into(),
            ));
        }
        if self.document_filename.trim().is_empty() {
            return Err(Img2PdfError::Config(
                "Document filename must not be empty".into(),
            ));
        }
        Ok(BotConfig {
            token,
            album_window: self.album_window,
            document_filename: self.document_filename,
            page_dpi: self.page_dpi,
            jpeg_quality: self.jpeg_quality,
            fetch_concurrency: self.fetch_concurrency,
            download_timeout_secs: self.download_timeout_secs,
        })
    }
}
