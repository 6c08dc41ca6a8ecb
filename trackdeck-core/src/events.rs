//! Player events and the broadcast bus that carries them.
//!
//! Every state change in the core is announced exactly once on the bus at the
//! point it happens. Views subscribe and project; nothing polls.

use crate::session::{PlaybackPhase, SourceKind};
use crate::song::{Song, SongId};
use std::time::Duration;
use tokio::sync::broadcast;

/// Default channel capacity for the event bus
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Events emitted by the playback core
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// A song became the active song
    SongActivated { song: Song, source: SourceKind },
    /// The playback phase changed
    StateChanged {
        song_id: Option<SongId>,
        phase: PlaybackPhase,
    },
    /// Position report from the authoritative source
    PositionSync {
        position: Duration,
        duration: Duration,
        /// Whether the waveform should be redrawn for this update
        redraw: bool,
    },
    /// Decoded amplitude data is available for the active song
    PeaksReady { song_id: SongId },
    /// The authoritative source reported a decode or network failure
    PlaybackFailed {
        song_id: SongId,
        url: String,
        message: String,
    },
    /// A favorite was toggled
    FavoriteChanged { song_id: SongId, is_favorite: bool },
    /// A route transition started; widget-backed sources are gone
    TransitionStarted,
    /// A route transition finished and the new page has settled
    TransitionFinished,
    /// All registered waveform widgets were destroyed
    WidgetsCleared { count: usize },
}

/// Cloneable sender side of the player event channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to player events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; having no subscribers is not an error
    pub fn emit(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
