//! Next/previous track navigation and source handoff.

use crate::filter::FilterState;
use crate::media::MediaBackend;
use crate::registry::WaveformRegistry;
use crate::session::{ActivationToken, ActiveSource, PlaybackSession};
use crate::song::{Song, SongId};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "trackdeck::navigation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// What asked for the navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTrigger {
    /// Button press or keyboard shortcut
    User,
    /// The authoritative source finished the track
    TrackEnded,
}

/// Which kind of source the target was started on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// Handed off to the target card's mounted widget
    Card,
    /// A new standalone audio element
    Standalone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Switched {
        song_id: SongId,
        mode: NavigationMode,
        autoplay: bool,
    },
    /// Already at the start or end of the list; nothing changed
    AtBoundary,
    /// Track ended on the last song; the source was released
    Released,
    /// The active song is not in the navigation list
    NotInList,
    NoActiveSong,
    /// The target could not be started; previous state retained
    Failed,
}

/// Index of the neighbour of `current` in a list of `len`, without wrapping
#[must_use]
pub fn target_index(len: usize, current: usize, direction: Direction) -> Option<usize> {
    match direction {
        Direction::Next => current.checked_add(1).filter(|i| *i < len),
        Direction::Previous => current.checked_sub(1).filter(|i| *i < len),
    }
}

pub struct NavigationController {
    session: Arc<PlaybackSession>,
    registry: Arc<WaveformRegistry>,
    backend: Arc<dyn MediaBackend>,
    pending_decode: Mutex<Option<JoinHandle<bool>>>,
}

impl NavigationController {
    #[must_use]
    pub fn new(
        session: Arc<PlaybackSession>,
        registry: Arc<WaveformRegistry>,
        backend: Arc<dyn MediaBackend>,
    ) -> Self {
        Self {
            session,
            registry,
            backend,
            pending_decode: Mutex::new(None),
        }
    }

    /// Move to the neighbouring track in the current display order.
    ///
    /// When the active song's card is mounted and displayed, walks the
    /// displayed cards in page order. Otherwise walks the filtered list while
    /// any filter is active, else the full catalog. Never wraps around.
    pub async fn navigate(
        &self,
        direction: Direction,
        trigger: NavigationTrigger,
        catalog: &[Song],
        filters: &FilterState,
    ) -> NavigationOutcome {
        let Some(current) = self.session.active_song_id().await else {
            debug!(target: LOG_TARGET, "Navigate {:?} with no active song", direction);
            return NavigationOutcome::NoActiveSong;
        };

        let order = match self.page_order(&current).await {
            Some(cards) => cards,
            None => filters.navigation_order(catalog),
        };
        let Some(index) = order.iter().position(|id| id == &current) else {
            info!(
                target: LOG_TARGET,
                "Active song {} not in navigation list ({} songs)", current, order.len()
            );
            return NavigationOutcome::NotInList;
        };

        let Some(target) = target_index(order.len(), index, direction) else {
            if trigger == NavigationTrigger::TrackEnded {
                info!(target: LOG_TARGET, "Reached end of list after {}", current);
                self.session.release_source().await;
                return NavigationOutcome::Released;
            }
            debug!(target: LOG_TARGET, "Navigate {:?} at list boundary", direction);
            return NavigationOutcome::AtBoundary;
        };

        let Some(song) = catalog.iter().find(|s| s.id == order[target]) else {
            warn!(target: LOG_TARGET, "Song {} missing from catalog", order[target]);
            return NavigationOutcome::NotInList;
        };

        let autoplay = match trigger {
            NavigationTrigger::TrackEnded => true,
            NavigationTrigger::User => self.session.is_playing().await,
        };

        match self.switch_to(song.clone(), autoplay).await {
            Some(mode) => NavigationOutcome::Switched {
                song_id: song.id.clone(),
                mode,
                autoplay,
            },
            None => NavigationOutcome::Failed,
        }
    }

    /// Song ids of the displayed cards in page order, if `current` is one
    /// of them.
    async fn page_order(&self, current: &SongId) -> Option<Vec<SongId>> {
        let cards: Vec<SongId> = self
            .registry
            .ordered_visible_entries()
            .await
            .into_iter()
            .map(|e| e.song_id)
            .collect();
        cards.contains(current).then_some(cards)
    }

    /// Make `song` active, preferring its mounted card widget.
    ///
    /// The previous source is paused by the session before the new one is
    /// installed. Returns `None` if no source could be created.
    pub async fn switch_to(&self, song: Song, autoplay: bool) -> Option<NavigationMode> {
        let entry = self
            .registry
            .find_by_song_id(&song.id)
            .await
            .filter(|e| e.card.is_displayed());

        if let Some(entry) = entry {
            info!(target: LOG_TARGET, "Handoff to {} ({})", entry.widget_id, song.id);
            let decoded = entry.widget.decoded_peaks();
            let duration = entry.widget.duration();
            self.session
                .activate(
                    song,
                    ActiveSource::Widget {
                        id: entry.widget_id,
                        widget: entry.widget.clone(),
                    },
                )
                .await;
            entry.widget.seek_to(0.0);
            if let Some(peaks) = decoded {
                self.session
                    .report_widget_decoded(entry.widget_id, peaks, Some(duration))
                    .await;
            }
            if autoplay {
                self.session.start().await;
            } else {
                self.session.set_playing(false).await;
            }
            return Some(NavigationMode::Card);
        }

        let audio = match self.backend.create_audio(&song.audio_url) {
            Ok(audio) => audio,
            Err(e) => {
                warn!(
                    target: LOG_TARGET,
                    "Cannot create audio for {} ({}): {}", song.id, song.audio_url, e
                );
                return None;
            }
        };
        info!(target: LOG_TARGET, "Standalone playback of {}", song.id);

        let needs_decode = song.instant_waveform().is_none();
        let url = song.audio_url.clone();
        let token = self
            .session
            .activate(song, ActiveSource::Standalone(audio))
            .await;
        if autoplay {
            self.session.start().await;
        } else {
            self.session.set_playing(false).await;
        }
        if needs_decode {
            self.spawn_decode(url, token);
        }
        Some(NavigationMode::Standalone)
    }

    fn spawn_decode(&self, url: String, token: ActivationToken) {
        let session = self.session.clone();
        let backend = self.backend.clone();
        let handle = tokio::spawn(async move {
            match backend.decode_peaks(&url).await {
                Ok(decoded) => {
                    session
                        .report_decoded(&token, decoded.peaks, Some(decoded.duration))
                        .await
                }
                Err(e) => {
                    warn!(
                        target: LOG_TARGET,
                        "Waveform decode failed for {} ({}): {}", token.song_id(), url, e
                    );
                    false
                }
            }
        });
        *self
            .pending_decode
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// The most recently started standalone decode, if any
    pub fn take_pending_decode(&self) -> Option<JoinHandle<bool>> {
        self.pending_decode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
