use crate::events::PlayerEvent;
use crate::favorites::Favorites;
use crate::master_view::{MasterPlayerView, PlayerBarSurface};
use crate::registry::WaveformRegistry;
use crate::session::{PlaybackSession, SessionSnapshot};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const LOG_TARGET: &str = "trackdeck::bridge";

/// Projects player events onto the player bar and the per-card icons.
///
/// This is the only consumer that writes to view surfaces; every update is
/// driven by an event, nothing polls.
pub struct ViewBridge {
    session: Arc<PlaybackSession>,
    registry: Arc<WaveformRegistry>,
    favorites: Arc<Favorites>,
    view: MasterPlayerView,
    surface: Arc<dyn PlayerBarSurface>,
}

impl ViewBridge {
    #[must_use]
    pub fn new(
        session: Arc<PlaybackSession>,
        registry: Arc<WaveformRegistry>,
        favorites: Arc<Favorites>,
        view: MasterPlayerView,
        surface: Arc<dyn PlayerBarSurface>,
    ) -> Self {
        Self {
            session,
            registry,
            favorites,
            view,
            surface,
        }
    }

    /// Spawn the bridge task on `rx` until the channel closes or `cancel`
    /// fires. Subscribe before spawning so no event is missed.
    pub fn spawn(
        self,
        mut rx: broadcast::Receiver<PlayerEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!(target: LOG_TARGET, "View bridge cancelled");
                        break;
                    }
                    received = rx.recv() => match received {
                        Ok(event) => self.handle_event(event).await,
                        Err(RecvError::Closed) => {
                            info!(target: LOG_TARGET, "Player event channel closed");
                            break;
                        }
                        Err(RecvError::Lagged(n)) => {
                            info!(target: LOG_TARGET, "Missed {} player events, resyncing", n);
                            self.refresh().await;
                        }
                    },
                }
            }
        })
    }

    /// Apply one event to the views
    pub async fn handle_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::SongActivated { .. }
            | PlayerEvent::StateChanged { .. }
            | PlayerEvent::PlaybackFailed { .. }
            | PlayerEvent::TransitionFinished => {
                self.refresh().await;
            }
            PlayerEvent::PositionSync { redraw, .. } => {
                let snapshot = self.session.snapshot().await;
                let favorite = self.is_favorite(&snapshot).await;
                self.surface
                    .apply(&MasterPlayerView::project(&snapshot, favorite));
                if redraw {
                    trace!(target: LOG_TARGET, "Redraw at {:?}", snapshot.position);
                    self.view.redraw(self.surface.as_ref(), &snapshot);
                }
            }
            PlayerEvent::PeaksReady { song_id } => {
                debug!(target: LOG_TARGET, "Peaks ready for {}", song_id);
                let snapshot = self.session.snapshot().await;
                self.view.redraw(self.surface.as_ref(), &snapshot);
            }
            PlayerEvent::FavoriteChanged {
                song_id,
                is_favorite,
            } => {
                self.registry.set_card_favorite(&song_id, is_favorite).await;
                if self.session.active_song_id().await.as_ref() == Some(&song_id) {
                    self.refresh().await;
                }
            }
            PlayerEvent::TransitionStarted => {
                debug!(target: LOG_TARGET, "Transition started, redraws suspended");
            }
            PlayerEvent::WidgetsCleared { count } => {
                debug!(target: LOG_TARGET, "{} card widgets cleared", count);
            }
        }
    }

    /// Re-project the full session onto every surface
    pub async fn refresh(&self) {
        let snapshot = self.session.snapshot().await;
        let favorite = self.is_favorite(&snapshot).await;
        self.view.refresh(self.surface.as_ref(), &snapshot, favorite);
        self.registry
            .sync_play_icons(snapshot.song_id(), snapshot.is_playing())
            .await;
    }

    async fn is_favorite(&self, snapshot: &SessionSnapshot) -> bool {
        match snapshot.song_id() {
            Some(id) => self.favorites.contains(id).await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::master_view::PlayIcon;
    use crate::media::{CardHandle, WidgetId};
    use crate::registry::RegistryEntry;
    use crate::session::ActiveSource;
    use crate::song::{Song, SongId};
    use crate::testing::{MockAudio, MockCard, MockSurface, MockWidget};

    struct Fixture {
        events: EventBus,
        session: Arc<PlaybackSession>,
        registry: Arc<WaveformRegistry>,
        favorites: Arc<Favorites>,
        surface: Arc<MockSurface>,
    }

    fn fixture() -> Fixture {
        let events = EventBus::default();
        Fixture {
            session: PlaybackSession::new(events.clone()),
            registry: WaveformRegistry::new(events.clone()),
            favorites: Arc::new(Favorites::new(events.clone())),
            surface: MockSurface::new(),
            events,
        }
    }

    fn bridge(f: &Fixture) -> ViewBridge {
        ViewBridge::new(
            f.session.clone(),
            f.registry.clone(),
            f.favorites.clone(),
            MasterPlayerView::default(),
            f.surface.clone(),
        )
    }

    #[tokio::test]
    async fn test_refresh_projects_session_and_card_icons() {
        let f = fixture();
        let card = MockCard::new("a", 0);
        f.registry
            .register(RegistryEntry {
                song_id: SongId::from("a"),
                widget_id: WidgetId(1),
                widget: MockWidget::new(),
                card: card.clone() as Arc<dyn CardHandle>,
                audio_url: "a.mp3".into(),
            })
            .await;
        f.session
            .activate(
                Song::new("a", "Alpha", "Nova", "a.mp3"),
                ActiveSource::Standalone(MockAudio::new("a.mp3")),
            )
            .await;
        f.session.start().await;

        bridge(&f).refresh().await;
        let model = f.surface.last_model().unwrap();
        assert!(model.visible);
        assert_eq!(model.title, "Alpha");
        assert_eq!(model.play_icon, PlayIcon::Pause);
        assert!(card.shows_playing());
    }

    #[tokio::test]
    async fn test_redraw_only_when_requested() {
        let f = fixture();
        let bridge = bridge(&f);
        bridge
            .handle_event(PlayerEvent::PositionSync {
                position: std::time::Duration::ZERO,
                duration: std::time::Duration::ZERO,
                redraw: false,
            })
            .await;
        assert_eq!(f.surface.frame_count(), 0);
        assert_eq!(f.surface.model_count(), 1);

        bridge
            .handle_event(PlayerEvent::PeaksReady {
                song_id: SongId::from("a"),
            })
            .await;
        assert_eq!(f.surface.frame_count(), 1);
    }

    #[tokio::test]
    async fn test_page_without_canvas_only_gets_text() {
        let f = fixture();
        f.surface.remove_canvas();
        bridge(&f)
            .handle_event(PlayerEvent::TransitionFinished)
            .await;
        assert_eq!(f.surface.model_count(), 1);
        assert_eq!(f.surface.frame_count(), 0);
    }

    #[tokio::test]
    async fn test_favorite_propagates_to_card_and_bar() {
        let f = fixture();
        let card = MockCard::new("a", 0);
        f.registry
            .register(RegistryEntry {
                song_id: SongId::from("a"),
                widget_id: WidgetId(1),
                widget: MockWidget::new(),
                card: card.clone() as Arc<dyn CardHandle>,
                audio_url: "a.mp3".into(),
            })
            .await;
        f.session
            .activate(
                Song::new("a", "Alpha", "Nova", "a.mp3"),
                ActiveSource::Standalone(MockAudio::new("a.mp3")),
            )
            .await;

        let rx = f.events.subscribe();
        let cancel = CancellationToken::new();
        let task = bridge(&f).spawn(rx, cancel.clone());

        f.favorites.set(&SongId::from("a"), true).await;
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !card.shows_favorite() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !f.surface.last_model().is_some_and(|m| m.is_favorite) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        task.await.unwrap();
    }
}
