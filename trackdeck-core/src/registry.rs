//! Per-route registry of mounted card waveform widgets.

use crate::events::{EventBus, PlayerEvent};
use crate::media::{CardHandle, WaveformWidget, WidgetId};
use crate::song::SongId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "trackdeck::registry";

/// A mounted widget and the card it lives in
#[derive(Clone)]
pub struct RegistryEntry {
    pub song_id: SongId,
    pub widget_id: WidgetId,
    pub widget: Arc<dyn WaveformWidget>,
    pub card: Arc<dyn CardHandle>,
    pub audio_url: String,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("song_id", &self.song_id)
            .field("widget_id", &self.widget_id)
            .field("document_index", &self.card.document_index())
            .field("audio_url", &self.audio_url)
            .finish_non_exhaustive()
    }
}

/// Registry of the widgets mounted on the current page, kept in document
/// order. Entries never outlive the route they were created on.
pub struct WaveformRegistry {
    entries: RwLock<Vec<RegistryEntry>>,
    next_id: AtomicU64,
    ready: Mutex<HashMap<WidgetId, oneshot::Sender<()>>>,
    events: EventBus,
}

impl WaveformRegistry {
    #[must_use]
    pub fn new(events: EventBus) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            ready: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// Reserve an id for a widget about to be created
    pub fn allocate_id(&self) -> WidgetId {
        WidgetId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Receiver that resolves once `widget_id` reports ready. Dropped
    /// senders (the route left first) resolve it with an error.
    pub fn ready_signal(&self, widget_id: WidgetId) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(widget_id, tx);
        rx
    }

    /// Widget `widget_id` fired its ready event
    pub fn mark_ready(&self, widget_id: WidgetId) -> bool {
        let sender = self
            .ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&widget_id);
        sender.is_some_and(|tx| tx.send(()).is_ok())
    }

    /// Insert an entry at its document position. Re-registering a widget id
    /// replaces the old entry.
    pub async fn register(&self, entry: RegistryEntry) {
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.widget_id != entry.widget_id);
        let index = entry.card.document_index();
        let pos = entries.partition_point(|e| e.card.document_index() <= index);
        debug!(
            target: LOG_TARGET,
            "Registered {} for {} at position {}", entry.widget_id, entry.song_id, pos
        );
        entries.insert(pos, entry);
    }

    /// Destroy every widget and clear the registry. Disposal failures are
    /// logged and skipped. Returns how many entries were removed.
    pub async fn unregister_all(&self) -> usize {
        let drained: Vec<RegistryEntry> = self.entries.write().await.drain(..).collect();
        self.ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        for entry in &drained {
            entry.widget.pause();
            if let Err(e) = entry.widget.destroy() {
                warn!(
                    target: LOG_TARGET,
                    "Failed to destroy {} for {}: {}", entry.widget_id, entry.song_id, e
                );
            }
        }

        let count = drained.len();
        info!(target: LOG_TARGET, "Cleared {} waveform widgets", count);
        self.events.emit(PlayerEvent::WidgetsCleared { count });
        count
    }

    pub async fn find_by_song_id(&self, song_id: &SongId) -> Option<RegistryEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| &e.song_id == song_id)
            .cloned()
    }

    pub async fn find_by_widget(&self, widget_id: WidgetId) -> Option<RegistryEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.widget_id == widget_id)
            .cloned()
    }

    /// Entries whose card is laid out, in document order
    pub async fn ordered_visible_entries(&self) -> Vec<RegistryEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.card.is_displayed())
            .cloned()
            .collect()
    }

    /// Show the playing icon on the active song's card and clear it on
    /// every other card.
    pub async fn sync_play_icons(&self, active: Option<&SongId>, playing: bool) {
        for entry in self.entries.read().await.iter() {
            entry
                .card
                .set_playing(playing && active == Some(&entry.song_id));
        }
    }

    pub async fn set_card_favorite(&self, song_id: &SongId, favorite: bool) {
        for entry in self.entries.read().await.iter() {
            if &entry.song_id == song_id {
                entry.card.set_favorite(favorite);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
