//! End-to-end tests for the request handler, album aggregation and PDF
//! delivery, run against an in-memory transport.
//!
//! The transport serves PNGs whose width encodes their identity; documents
//! are built at 72 DPI so each page's MediaBox width equals the source image
//! width in pixels. That lets every test check page order by reading back
//! the PDF.
//!
//! Run with:
//!   cargo test --test bot

use async_trait::async_trait;
use edgequake_img2pdf::{
    AlbumId, BotConfig, ChatId, Command, ErrorKind, ImageEvent, ImageRef, Img2PdfError,
    InboundEvent, RequestHandler, Transport, UserId, WELCOME_MESSAGE,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const WINDOW: Duration = Duration::from_millis(150);
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

// ── Test transport ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text { chat: ChatId, text: String },
    Document { chat: ChatId, filename: String, bytes: Vec<u8> },
}

struct MockTransport {
    files: HashMap<String, Vec<u8>>,
    unreachable: HashSet<String>,
    reject_documents: bool,
    downloads: Mutex<Vec<String>>,
    tx: mpsc::UnboundedSender<Sent>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn download(&self, image: &ImageRef) -> Result<Vec<u8>, Img2PdfError> {
        self.downloads.lock().unwrap().push(image.0.clone());
        if self.unreachable.contains(&image.0) {
            return Err(Img2PdfError::fetch(&image.0, "HTTP 502"));
        }
        self.files
            .get(&image.0)
            .cloned()
            .ok_or_else(|| Img2PdfError::fetch(&image.0, "HTTP 404"))
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), Img2PdfError> {
        self.tx
            .send(Sent::Text {
                chat: chat_id,
                text: text.to_string(),
            })
            .ok();
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), Img2PdfError> {
        if self.reject_documents {
            return Err(Img2PdfError::delivery(chat_id.0, "Forbidden: bot was blocked by the user"));
        }
        self.tx
            .send(Sent::Document {
                chat: chat_id,
                filename: filename.to_string(),
                bytes,
            })
            .ok();
        Ok(())
    }
}

struct Harness {
    handler: Arc<RequestHandler>,
    transport: Arc<MockTransport>,
    rx: mpsc::UnboundedReceiver<Sent>,
}

#[derive(Default)]
struct HarnessBuilder {
    files: HashMap<String, Vec<u8>>,
    unreachable: HashSet<String>,
    reject_documents: bool,
}

impl HarnessBuilder {
    /// Serve a PNG of the given width under `file_id`.
    fn image(mut self, file_id: &str, width: u32) -> Self {
        self.files.insert(file_id.to_string(), png(width, 8));
        self
    }

    fn raw(mut self, file_id: &str, bytes: &[u8]) -> Self {
        self.files.insert(file_id.to_string(), bytes.to_vec());
        self
    }

    fn unreachable(mut self, file_id: &str) -> Self {
        self.unreachable.insert(file_id.to_string());
        self
    }

    fn reject_documents(mut self) -> Self {
        self.reject_documents = true;
        self
    }

    fn build(self) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(MockTransport {
            files: self.files,
            unreachable: self.unreachable,
            reject_documents: self.reject_documents,
            downloads: Mutex::new(Vec::new()),
            tx,
        });
        let config = BotConfig::builder()
            .token("test-token")
            .album_window(WINDOW)
            .page_dpi(72.0)
            .build()
            .expect("valid config");
        let handler = Arc::new(RequestHandler::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            &config,
        ));
        Harness {
            handler,
            transport,
            rx,
        }
    }
}

impl Harness {
    async fn next(&mut self) -> Sent {
        tokio::time::timeout(REPLY_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for a reply")
            .expect("transport dropped")
    }

    /// Wait several windows and assert nothing else was sent.
    async fn assert_quiet(&mut self) {
        tokio::time::sleep(WINDOW * 4).await;
        if let Ok(extra) = self.rx.try_recv() {
            panic!("unexpected extra reply: {}", describe(&extra));
        }
    }

    /// Feed an event without waiting for its conversion.
    fn spawn(&self, event: ImageEvent) {
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move { handler.handle(InboundEvent::Image(event)).await });
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 100, 50]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn photo(chat: i64, seq: i64, album: Option<&str>, file_id: &str) -> ImageEvent {
    ImageEvent {
        chat_id: ChatId(chat),
        originator_id: UserId(chat as u64),
        sequence: seq,
        album_id: album.map(AlbumId::from),
        image: ImageRef::from(file_id),
    }
}

/// MediaBox widths of every page, in page order.
fn page_widths(pdf: &[u8]) -> Vec<i64> {
    let doc = lopdf::Document::load_mem(pdf).expect("valid PDF");
    doc.get_pages()
        .into_values()
        .map(|id| {
            let media_box = doc
                .get_dictionary(id)
                .unwrap()
                .get(b"MediaBox")
                .unwrap()
                .as_array()
                .unwrap()
                .clone();
            media_box[2].as_i64().unwrap()
        })
        .collect()
}

fn describe(sent: &Sent) -> String {
    match sent {
        Sent::Text { chat, text } => format!("text to {chat}: {text:?}"),
        Sent::Document { chat, bytes, .. } => {
            format!("document to {chat}: {} bytes", bytes.len())
        }
    }
}

fn expect_document(sent: Sent, chat: i64) -> Vec<i64> {
    match sent {
        Sent::Document {
            chat: to,
            filename,
            bytes,
        } => {
            assert_eq!(to, ChatId(chat));
            assert_eq!(filename, "file.pdf");
            page_widths(&bytes)
        }
        other => panic!("expected a document, got {}", describe(&other)),
    }
}

fn expect_text(sent: Sent, chat: i64) -> String {
    match sent {
        Sent::Text { chat: to, text } => {
            assert_eq!(to, ChatId(chat));
            text
        }
        other => panic!("expected a text, got {}", describe(&other)),
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_help_command_sends_usage() {
    let mut h = HarnessBuilder::default().build();
    h.handler
        .handle(InboundEvent::Command {
            chat_id: ChatId(5),
            command: Command::Help,
        })
        .await;
    assert_eq!(expect_text(h.next().await, 5), WELCOME_MESSAGE);
    h.assert_quiet().await;
}

// ── Standalone images ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_standalone_image_gives_one_page_document() {
    let mut h = HarnessBuilder::default().image("solo", 40).build();
    h.handler
        .handle(InboundEvent::Image(photo(1, 10, None, "solo")))
        .await;

    assert_eq!(expect_document(h.next().await, 1), vec![40]);
    assert_eq!(h.handler.aggregator().open_albums(), 0);
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_standalone_corrupt_image_reports_decode_error() {
    let mut h = HarnessBuilder::default()
        .raw("broken", b"\x89PNG\r\n\x1a\nthen garbage")
        .build();
    h.handler
        .handle(InboundEvent::Image(photo(1, 10, None, "broken")))
        .await;

    let expected = Img2PdfError::Decode {
        file_id: String::new(),
        source: image::load_from_memory(b"x").unwrap_err(),
    };
    assert_eq!(expect_text(h.next().await, 1), expected.user_message());
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_rejected_document_reports_once() {
    let mut h = HarnessBuilder::default()
        .image("solo", 40)
        .reject_documents()
        .build();
    h.handler
        .handle(InboundEvent::Image(photo(1, 10, None, "solo")))
        .await;

    let text = expect_text(h.next().await, 1);
    assert_eq!(text, Img2PdfError::delivery(1, "x").user_message());
    h.assert_quiet().await;
}

// ── Albums ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_album_out_of_order_gives_one_ordered_document() {
    let mut h = HarnessBuilder::default()
        .image("p1", 11)
        .image("p2", 22)
        .image("p3", 33)
        .image("p4", 44)
        .build();

    // Network reordering: message ids arrive 103, 101, 104, 102.
    for (seq, file) in [(103, "p3"), (101, "p1"), (104, "p4"), (102, "p2")] {
        h.handler
            .handle(InboundEvent::Image(photo(1, seq, Some("album-1"), file)))
            .await;
    }
    assert!(h.handler.aggregator().contains(&AlbumId::from("album-1")));

    assert_eq!(expect_document(h.next().await, 1), vec![11, 22, 33, 44]);
    assert!(!h.handler.aggregator().contains(&AlbumId::from("album-1")));
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_album_split_by_long_gap() {
    let mut h = HarnessBuilder::default()
        .image("first", 10)
        .image("second", 20)
        .build();

    h.handler
        .handle(InboundEvent::Image(photo(1, 1, Some("g"), "first")))
        .await;
    assert_eq!(expect_document(h.next().await, 1), vec![10]);

    tokio::time::sleep(WINDOW).await;
    h.handler
        .handle(InboundEvent::Image(photo(1, 2, Some("g"), "second")))
        .await;
    assert_eq!(expect_document(h.next().await, 1), vec![20]);
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_interleaved_albums_do_not_mix() {
    let mut h = HarnessBuilder::default()
        .image("a1", 11)
        .image("a2", 12)
        .image("b1", 21)
        .image("b2", 22)
        .image("b3", 23)
        .build();

    h.spawn(photo(1, 1, Some("A"), "a1"));
    h.spawn(photo(2, 1, Some("B"), "b1"));
    h.spawn(photo(2, 3, Some("B"), "b3"));
    h.spawn(photo(1, 2, Some("A"), "a2"));
    h.spawn(photo(2, 2, Some("B"), "b2"));

    let mut by_chat = HashMap::new();
    for _ in 0..2 {
        match h.next().await {
            Sent::Document { chat, bytes, .. } => {
                assert!(by_chat.insert(chat, page_widths(&bytes)).is_none());
            }
            other => panic!("unexpected {}", describe(&other)),
        }
    }
    assert_eq!(by_chat[&ChatId(1)], vec![11, 12]);
    assert_eq!(by_chat[&ChatId(2)], vec![21, 22, 23]);
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_concurrent_finalize_delivers_once() {
    let mut h = HarnessBuilder::default()
        .image("p1", 10)
        .image("p2", 20)
        .build();
    let id = AlbumId::from("race");

    h.handler
        .handle(InboundEvent::Image(photo(1, 1, Some("race"), "p1")))
        .await;
    h.handler
        .handle(InboundEvent::Image(photo(1, 2, Some("race"), "p2")))
        .await;

    // Both manual triggers run well before the timer is due.
    let agg = h.handler.aggregator().clone();
    let (a, b) = tokio::join!(agg.finalize_now(&id), agg.finalize_now(&id));
    assert!(a ^ b, "exactly one manual trigger must win (got {a}, {b})");

    assert_eq!(expect_document(h.next().await, 1), vec![10, 20]);
    // The aborted timer must not deliver a second copy.
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_finalize_racing_timer_delivers_once() {
    const ALBUMS: i64 = 20;
    let mut builder = HarnessBuilder::default();
    for i in 0..ALBUMS {
        builder = builder.image(&format!("p{i}"), 10);
    }
    let mut h = builder.build();

    let mut triggers = Vec::new();
    for i in 0..ALBUMS {
        let album = format!("race-{i}");
        h.handler
            .handle(InboundEvent::Image(photo(i, 1, Some(&album), &format!("p{i}"))))
            .await;
        // Fire the manual trigger right when the timer is due.
        let agg = h.handler.aggregator().clone();
        triggers.push(tokio::spawn(async move {
            tokio::time::sleep(WINDOW).await;
            agg.finalize_now(&AlbumId(album)).await
        }));
    }

    let mut delivered = HashMap::new();
    for _ in 0..ALBUMS {
        match h.next().await {
            Sent::Document { chat, .. } => *delivered.entry(chat).or_insert(0) += 1,
            other => panic!("unexpected {}", describe(&other)),
        }
    }
    for trigger in triggers {
        trigger.await.unwrap();
    }

    assert_eq!(delivered.len(), ALBUMS as usize);
    assert!(delivered.values().all(|&n| n == 1));
    assert_eq!(h.handler.aggregator().open_albums(), 0);
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_album_fetch_failure_reports_once_and_clears() {
    let mut h = HarnessBuilder::default()
        .image("ok-1", 10)
        .unreachable("gone")
        .image("ok-3", 30)
        .image("later", 40)
        .build();
    let id = AlbumId::from("broken-album");

    for (seq, file) in [(1, "ok-1"), (2, "gone"), (3, "ok-3")] {
        h.handler
            .handle(InboundEvent::Image(photo(1, seq, Some("broken-album"), file)))
            .await;
    }

    let text = expect_text(h.next().await, 1);
    assert_eq!(text, Img2PdfError::fetch("x", "y").user_message());
    assert!(!h.handler.aggregator().contains(&id));
    h.assert_quiet().await;

    // Reusing the id starts a fresh album with only the new item.
    h.handler
        .handle(InboundEvent::Image(photo(1, 4, Some("broken-album"), "later")))
        .await;
    assert_eq!(expect_document(h.next().await, 1), vec![40]);
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_album_parts_are_not_fetched_before_completion() {
    let mut h = HarnessBuilder::default().image("p1", 10).build();
    h.handler
        .handle(InboundEvent::Image(photo(1, 1, Some("g"), "p1")))
        .await;
    assert!(h.transport.downloads.lock().unwrap().is_empty());

    expect_document(h.next().await, 1);
    assert_eq!(*h.transport.downloads.lock().unwrap(), vec!["p1".to_string()]);
}

// ── Startup ──────────────────────────────────────────────────────────────────

#[test]
fn test_missing_token_is_fatal_config_error() {
    let err = tokio_test::assert_err!(BotConfig::builder().token_opt(None).build());
    assert_eq!(err.kind(), ErrorKind::Config);

    let config = tokio_test::assert_ok!(BotConfig::builder().token("123:abc").build());
    assert_eq!(config.album_window, Duration::from_secs(2));
}
