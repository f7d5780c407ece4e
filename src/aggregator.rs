//! Album aggregation: group the parts of a Telegram album into one request.
//!
//! Telegram delivers an album as independent messages that share a
//! `media_group_id`, with no marker for the last part. The aggregator buffers
//! parts per album and restarts a silence timer on every arrival; when the
//! timer runs out without a new part, the album is complete and is handed to
//! an [`AlbumSink`].
//!
//! ## Exactly-once finalize
//!
//! ```text
//! add(A, p1) ── timer g1 ──┐
//! add(A, p2) ── abort g1, timer g2 ──(W)── take(A, g2) ── sink.album_ready
//!                          └─(fired late)── take(A, g1) ── generation mismatch, no-op
//! ```
//!
//! The registry is the only shared mutable state. It sits behind one
//! `std::sync::Mutex` that is held for map bookkeeping only, never across an
//! `.await`, so a slow conversion never delays `add` for another album.
//!
//! Finalizing removes the album from the registry in the same critical
//! section that checks for it. Whoever removes it owns the items; everyone
//! else sees "already gone" and returns. Each timer also remembers the
//! generation stamp it was scheduled with, and only removes the album when
//! that stamp is still current: a timer that fired just as a new part
//! arrived (so `abort()` came too late) cannot finalize the album early.

use crate::event::{AlbumId, ChatId, PendingImage, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A finalized album, ready for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedAlbum {
    pub album_id: AlbumId,
    pub chat_id: ChatId,
    pub originator_id: UserId,
    /// Sorted by `sequence`, ascending.
    pub items: Vec<PendingImage>,
}

/// Receives each album exactly once, after its silence window elapsed.
///
/// Called outside the registry lock, on the album's timer task. Albums
/// finalize independently, so implementations may be invoked concurrently.
#[async_trait]
pub trait AlbumSink: Send + Sync + 'static {
    async fn album_ready(&self, album: CompletedAlbum);
}

struct AlbumBuffer {
    chat_id: ChatId,
    originator_id: UserId,
    items: Vec<PendingImage>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    albums: HashMap<AlbumId, AlbumBuffer>,
    next_generation: u64,
}

struct Shared {
    window: Duration,
    registry: Mutex<Registry>,
    sink: Arc<dyn AlbumSink>,
}

/// Which finalize path is asking.
#[derive(Clone, Copy)]
enum Trigger {
    /// A timer scheduled with this generation.
    Timer(u64),
    /// An explicit [`AlbumAggregator::finalize_now`] call.
    Manual,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Every critical section leaves the map consistent, so a panic
        // elsewhere while holding the lock does not invalidate it.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically check for the album and remove it.
    fn take(&self, album_id: &AlbumId, trigger: Trigger) -> Option<AlbumBuffer> {
        let mut registry = self.lock();
        if let Trigger::Timer(generation) = trigger {
            match registry.albums.get(album_id) {
                Some(buffer) if buffer.generation == generation => {}
                Some(_) => {
                    debug!("Album {}: stale timer g{} ignored", album_id, generation);
                    return None;
                }
                None => return None,
            }
        }
        registry.albums.remove(album_id)
    }
}

/// Groups album parts by album id and finalizes each album once.
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Clone)]
pub struct AlbumAggregator {
    shared: Arc<Shared>,
}

impl AlbumAggregator {
    pub fn new(window: Duration, sink: Arc<dyn AlbumSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                window,
                registry: Mutex::new(Registry::default()),
                sink,
            }),
        }
    }

    /// The silence window `W`.
    pub fn window(&self) -> Duration {
        self.shared.window
    }

    /// Buffer one album part and (re)start the album's silence timer.
    ///
    /// `chat_id` and `originator_id` are recorded from the first part only.
    /// Never blocks beyond the registry lock.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime: the timer is a spawned task.
    pub fn add(&self, album_id: AlbumId, item: PendingImage, chat_id: ChatId, originator_id: UserId) {
        let mut registry = self.shared.lock();
        registry.next_generation += 1;
        let generation = registry.next_generation;

        let buffer = registry.albums.entry(album_id.clone()).or_insert_with(|| {
            debug!("Album {}: opened for chat {} by user {}", album_id, chat_id, originator_id);
            AlbumBuffer {
                chat_id,
                originator_id,
                items: Vec::new(),
                generation,
                timer: None,
            }
        });

        buffer.items.push(item);
        buffer.generation = generation;
        if let Some(previous) = buffer.timer.take() {
            previous.abort();
        }
        buffer.timer = Some(self.schedule(album_id.clone(), generation));

        debug!(
            "Album {}: {} item(s) buffered, finalizing in {:?} unless more arrive",
            album_id,
            buffer.items.len(),
            self.shared.window
        );
    }

    fn schedule(&self, album_id: AlbumId, generation: u64) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(shared.window).await;
            // Our own handle is inside the buffer; it is dropped (detached)
            // with it, never aborted, since that would cancel this task.
            if let Some(buffer) = shared.take(&album_id, Trigger::Timer(generation)) {
                let album = complete(album_id, buffer);
                info!(
                    "Album {}: complete with {} item(s) for chat {}",
                    album.album_id,
                    album.items.len(),
                    album.chat_id
                );
                shared.sink.album_ready(album).await;
            }
        })
    }

    /// Finalize an album immediately instead of waiting for its timer.
    ///
    /// Returns `true` if this call finalized the album, `false` if it was
    /// already finalized (or never existed). The pending timer is aborted and
    /// would be a no-op anyway.
    pub async fn finalize_now(&self, album_id: &AlbumId) -> bool {
        let Some(mut buffer) = self.shared.take(album_id, Trigger::Manual) else {
            return false;
        };
        if let Some(timer) = buffer.timer.take() {
            timer.abort();
        }
        let album = complete(album_id.clone(), buffer);
        info!(
            "Album {}: finalized early with {} item(s)",
            album.album_id,
            album.items.len()
        );
        self.shared.sink.album_ready(album).await;
        true
    }

    /// Number of albums still collecting parts.
    pub fn open_albums(&self) -> usize {
        self.shared.lock().albums.len()
    }

    /// Whether the album is still collecting parts.
    pub fn contains(&self, album_id: &AlbumId) -> bool {
        self.shared.lock().albums.contains_key(album_id)
    }

    /// Abort every pending timer and drop every open album.
    ///
    /// Returns the number of albums discarded.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<(AlbumId, AlbumBuffer)> = self.shared.lock().albums.drain().collect();
        let count = drained.len();
        for (album_id, buffer) in drained {
            if let Some(timer) = buffer.timer {
                timer.abort();
            }
            warn!(
                "Album {}: discarded at shutdown with {} item(s)",
                album_id,
                buffer.items.len()
            );
        }
        count
    }
}

/// Turn a removed buffer into the sink payload, restoring send order.
fn complete(album_id: AlbumId, buffer: AlbumBuffer) -> CompletedAlbum {
    let mut items = buffer.items;
    items.sort_by_key(|item| item.sequence);
    CompletedAlbum {
        album_id,
        chat_id: buffer.chat_id,
        originator_id: buffer.originator_id,
        items,
    }
}
