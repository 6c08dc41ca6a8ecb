//! Favorites: a single set of song ids, propagated one way to every surface.

use crate::events::{EventBus, PlayerEvent};
use crate::song::SongId;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;

const LOG_TARGET: &str = "trackdeck::favorites";

pub struct Favorites {
    ids: RwLock<HashSet<SongId>>,
    events: EventBus,
}

impl Favorites {
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            ids: RwLock::new(HashSet::new()),
            events,
        }
    }

    /// Restore from a persisted snapshot without emitting events
    pub async fn restore(&self, ids: impl IntoIterator<Item = SongId>) {
        let mut set = self.ids.write().await;
        set.clear();
        set.extend(ids);
    }

    /// Set a song's favorite flag. Emits one event only when it changes.
    pub async fn set(&self, song_id: &SongId, favorite: bool) -> bool {
        let changed = {
            let mut set = self.ids.write().await;
            if favorite {
                set.insert(song_id.clone())
            } else {
                set.remove(song_id)
            }
        };
        if changed {
            debug!(target: LOG_TARGET, "Favorite {} -> {}", song_id, favorite);
            self.events.emit(PlayerEvent::FavoriteChanged {
                song_id: song_id.clone(),
                is_favorite: favorite,
            });
        }
        changed
    }

    /// Flip a song's favorite flag; returns the new value
    pub async fn toggle(&self, song_id: &SongId) -> bool {
        let now = !self.contains(song_id).await;
        self.set(song_id, now).await;
        now
    }

    pub async fn contains(&self, song_id: &SongId) -> bool {
        self.ids.read().await.contains(song_id)
    }

    /// Sorted snapshot for persistence
    pub async fn snapshot(&self) -> Vec<SongId> {
        let mut ids: Vec<SongId> = self.ids.read().await.iter().cloned().collect();
        ids.sort();
        ids
    }
}
