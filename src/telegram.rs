//! Telegram Bot API transport.
//!
//! Three pieces:
//! * [`TelegramTransport`] implements [`Transport`] over a `teloxide::Bot`.
//! * [`inbound_event`] maps a Telegram [`Message`] to an [`InboundEvent`].
//! * [`run`] long-polls `getUpdates` and hands each message to a
//!   [`RequestHandler`] on its own task, so a slow standalone conversion never
//!   delays the parts of somebody else's album.

use crate::config::BotConfig;
use crate::error::{Img2PdfError, Result};
use crate::event::{AlbumId, ChatId, Command, ImageEvent, ImageRef, InboundEvent, UserId};
use crate::handler::RequestHandler;
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use teloxide::{
    payloads::GetUpdatesSetters,
    requests::{Request, Requester},
    types::{
        AllowedUpdate, BotCommand, ChatId as TgChatId, InputFile, MediaKind, Message, MessageKind,
        UpdateKind,
    },
    ApiError, Bot, RequestError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const FILE_ENDPOINT: &str = "https://api.telegram.org/file/bot";

/// Long-polling timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;

/// Delay after a failed `getUpdates` call.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// [`Transport`] backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    http: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(bot: Bot, download_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()
            .map_err(|e| Img2PdfError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self { bot, http })
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn download(&self, image: &ImageRef) -> Result<Vec<u8>> {
        let file = self
            .bot
            .get_file(image.0.clone())
            .await
            .map_err(|e| Img2PdfError::fetch(&image.0, e))?;

        // The URL embeds the token; strip it from any error text.
        let url = format!("{}{}/{}", FILE_ENDPOINT, self.bot.token(), file.path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Img2PdfError::fetch(&image.0, e.without_url()))?;

        if !response.status().is_success() {
            return Err(Img2PdfError::fetch(
                &image.0,
                format!("HTTP {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Img2PdfError::fetch(&image.0, e.without_url()))?;
        Ok(bytes.to_vec())
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(TgChatId(chat_id.0), text)
            .await
            .map_err(|e| Img2PdfError::delivery(chat_id.0, e))?;
        Ok(())
    }

    async fn send_document(&self, chat_id: ChatId, filename: &str, bytes: Vec<u8>) -> Result<()> {
        let input = InputFile::memory(bytes).file_name(filename.to_string());
        self.bot
            .send_document(TgChatId(chat_id.0), input)
            .await
            .map_err(|e| Img2PdfError::delivery(chat_id.0, e))?;
        Ok(())
    }
}

/// Map a Telegram message to an inbound event.
///
/// Recognised: photos (largest size wins), documents with an `image/*` MIME
/// type (images sent "as file"), and the `/start` and `/help` commands.
/// Everything else returns `None`.
pub fn inbound_event(msg: &Message) -> Option<InboundEvent> {
    let chat_id = ChatId(msg.chat.id.0);
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };

    let (file_id, album_id) = match &common.media_kind {
        MediaKind::Photo(p) => {
            let largest = p.photo.last()?;
            (
                largest.file.id.clone(),
                p.media_group_id.as_ref().map(ToString::to_string),
            )
        }
        MediaKind::Document(d) => {
            let is_image = d
                .document
                .mime_type
                .as_ref()
                .is_some_and(|m| m.essence_str().starts_with("image/"));
            if !is_image {
                return None;
            }
            (
                d.document.file.id.clone(),
                d.media_group_id.as_ref().map(ToString::to_string),
            )
        }
        MediaKind::Text(t) => {
            return Command::parse(&t.text).map(|command| InboundEvent::Command { chat_id, command });
        }
        _ => return None,
    };

    Some(InboundEvent::Image(ImageEvent {
        chat_id,
        originator_id: UserId(msg.from.as_ref().map(|u| u.id.0).unwrap_or_default()),
        sequence: i64::from(msg.id.0),
        album_id: album_id.map(AlbumId),
        image: ImageRef(file_id),
    }))
}

/// Connect, then poll for updates until `cancel` fires.
///
/// # Errors
/// Returns [`Img2PdfError::Config`] when Telegram rejects the token, and
/// [`Img2PdfError::Internal`] when the API cannot be reached at startup.
pub async fn run(config: BotConfig, cancel: CancellationToken) -> Result<()> {
    // Client timeout must exceed the long-polling timeout, otherwise the
    // HTTP client aborts getUpdates before Telegram answers.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(POLL_TIMEOUT_SECS) + 15))
        .build()
        .map_err(|e| Img2PdfError::Internal(format!("HTTP client: {}", e)))?;
    let bot = Bot::with_client(config.expose_token(), client);

    let me = bot.get_me().await.map_err(startup_error)?;
    bot.delete_webhook().await.map_err(startup_error)?;

    let commands = vec![
        BotCommand::new("start", "Show what this bot does"),
        BotCommand::new("help", "How to convert images to PDF"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("Failed to register bot commands: {}", e);
    }

    info!(
        username = ?me.username,
        album_window_ms = config.album_window.as_millis() as u64,
        "Telegram bot connected"
    );

    let transport = Arc::new(TelegramTransport::new(
        bot.clone(),
        Duration::from_secs(config.download_timeout_secs),
    )?);
    let handler = Arc::new(RequestHandler::new(transport, &config));

    let mut offset: i32 = 0;
    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message]);

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!("Got {} update(s)", updates.len());
                for update in updates {
                    offset = update.id.as_offset();
                    let UpdateKind::Message(msg) = update.kind else {
                        continue;
                    };
                    let Some(event) = inbound_event(&msg) else {
                        debug!("Ignoring message {} in chat {}", msg.id.0, msg.chat.id.0);
                        continue;
                    };
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move { handler.handle(event).await });
                }
            }
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                error!("Another instance is polling with this token; stopping");
                break;
            }
            Err(e) => {
                warn!("getUpdates failed: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(POLL_BACKOFF) => {}
                }
            }
        }
    }

    let dropped = handler.aggregator().shutdown();
    if dropped > 0 {
        warn!("Discarded {} unfinished album(s) at shutdown", dropped);
    }
    info!("Telegram polling stopped");
    Ok(())
}

fn startup_error(e: RequestError) -> Img2PdfError {
    match e {
        RequestError::Api(ApiError::InvalidToken) => {
            Img2PdfError::Config("Telegram rejected the bot token".into())
        }
        other => Img2PdfError::Internal(format!("Telegram API unreachable: {}", other)),
    }
}
