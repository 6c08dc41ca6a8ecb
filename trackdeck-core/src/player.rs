//! Top-level owner wiring the core's services together.
//!
//! A host creates one [`Player`] per browsing session and forwards widget,
//! audio, keyboard, scroll and route events into it. Everything the player
//! owns is passed by reference to the components that need it.

use crate::bridge::ViewBridge;
use crate::catalog::{Catalog, FeaturedPolicy, SongRepository};
use crate::config::TrackdeckConfig;
use crate::error::Result;
use crate::events::{EventBus, PlayerEvent};
use crate::favorites::Favorites;
use crate::filter::FilterState;
use crate::keyboard::{command_for_key, KeyCommand};
use crate::lifecycle::{LifecycleCoordinator, PageInitializer, RouteHook};
use crate::master_view::{MasterPlayerView, PlayerBarSurface};
use crate::media::{same_handle, AudioElement, AudioEvent, MediaBackend, WidgetEvent, WidgetId};
use crate::mounter::{MountReport, WaveformMounter};
use crate::navigation::{Direction, NavigationController, NavigationOutcome, NavigationTrigger};
use crate::registry::WaveformRegistry;
use crate::renderer::{seek_fraction, RendererStyle, WaveformCanvasRenderer};
use crate::session::{ActiveSource, PlaybackSession, SourceOrigin};
use crate::song::{Song, SongId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "trackdeck::player";

pub struct Player {
    events: EventBus,
    session: Arc<PlaybackSession>,
    registry: Arc<WaveformRegistry>,
    favorites: Arc<Favorites>,
    catalog: Arc<Catalog>,
    filters: RwLock<FilterState>,
    featured_policy: FeaturedPolicy,
    mounter: Arc<WaveformMounter>,
    navigation: NavigationController,
    lifecycle: LifecycleCoordinator,
    renderer: WaveformCanvasRenderer,
    seek_grace: Duration,
}

impl Player {
    /// Build the player and all of its services from `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the waveform colors cannot be parsed.
    pub fn new(
        config: &TrackdeckConfig,
        repository: Arc<dyn SongRepository>,
        backend: Arc<dyn MediaBackend>,
        pages: Arc<dyn PageInitializer>,
    ) -> Result<Self> {
        let renderer = WaveformCanvasRenderer::new(RendererStyle::from_config(&config.waveform)?);
        let events = EventBus::new(config.playback.event_capacity);
        let session = PlaybackSession::new(events.clone());
        let registry = WaveformRegistry::new(events.clone());
        let favorites = Arc::new(Favorites::new(events.clone()));
        let catalog = Arc::new(Catalog::new(repository));
        let mounter = Arc::new(WaveformMounter::new(
            registry.clone(),
            backend.clone(),
            &config.waveform,
        ));
        let navigation = NavigationController::new(session.clone(), registry.clone(), backend);
        let lifecycle = LifecycleCoordinator::new(
            session.clone(),
            registry.clone(),
            mounter.clone(),
            pages,
            catalog.clone(),
            config.lifecycle.clone(),
        );

        Ok(Self {
            events,
            session,
            registry,
            favorites,
            catalog,
            filters: RwLock::new(FilterState::new()),
            featured_policy: config.catalog.featured.clone(),
            mounter,
            navigation,
            lifecycle,
            renderer,
            seek_grace: config.playback.seek_resume_grace(),
        })
    }

    /// Subscribe to player events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Start projecting events onto `surface` until `cancel` fires
    #[must_use]
    pub fn spawn_view_bridge(
        &self,
        surface: Arc<dyn PlayerBarSurface>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let rx = self.events.subscribe();
        ViewBridge::new(
            self.session.clone(),
            self.registry.clone(),
            self.favorites.clone(),
            MasterPlayerView::new(self.renderer.clone()),
            surface,
        )
        .spawn(rx, cancel)
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<PlaybackSession> {
        &self.session
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<WaveformRegistry> {
        &self.registry
    }

    #[must_use]
    pub const fn favorites(&self) -> &Arc<Favorites> {
        &self.favorites
    }

    #[must_use]
    pub const fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    #[must_use]
    pub const fn lifecycle(&self) -> &LifecycleCoordinator {
        &self.lifecycle
    }

    pub async fn songs(&self) -> Arc<Vec<Song>> {
        self.catalog.songs().await
    }

    pub async fn featured(&self) -> Vec<Song> {
        self.catalog.featured(&self.featured_policy).await
    }

    /// Current filter state
    pub async fn filters(&self) -> FilterState {
        self.filters.read().await.clone()
    }

    /// Mutate the filter state; returns the new visible song ids
    pub async fn update_filters(&self, update: impl FnOnce(&mut FilterState)) -> Vec<SongId> {
        let songs = self.catalog.songs().await;
        let mut filters = self.filters.write().await;
        update(&mut filters);
        filters.visible_song_ids(&songs)
    }

    /// Play button on a card or list row: toggles the active song, starts
    /// any other song. Unknown ids are logged and ignored.
    pub async fn play_song(&self, song_id: &SongId) -> bool {
        if self.session.active_song_id().await.as_ref() == Some(song_id)
            && !matches!(self.session.source().await, ActiveSource::None)
        {
            return self.session.toggle().await.is_some();
        }
        match self.catalog.require(song_id).await {
            Ok(song) => self.navigation.switch_to(song, true).await.is_some(),
            Err(e) => {
                info!(target: LOG_TARGET, "Ignoring play request: {}", e);
                false
            }
        }
    }

    /// Master bar play/pause button
    pub async fn toggle_play(&self) -> Option<bool> {
        self.session.toggle().await
    }

    /// Seek the authoritative source, then give it a grace period to resume
    /// before forcing playback if it was playing.
    pub async fn seek(&self, fraction: f64) {
        let Some(was_playing) = self.session.seek(fraction).await else {
            debug!(target: LOG_TARGET, "Seek with no active source");
            return;
        };
        if was_playing {
            tokio::time::sleep(self.seek_grace).await;
            if self.session.resume_if_stalled().await {
                debug!(target: LOG_TARGET, "Resumed playback after seek");
            }
        }
    }

    /// Click on the master bar waveform at `click_x` of `width`
    pub async fn click_waveform(&self, click_x: f64, width: f64) {
        self.seek(seek_fraction(click_x, width)).await;
    }

    pub async fn navigate(&self, direction: Direction, trigger: NavigationTrigger) -> NavigationOutcome {
        let songs = self.catalog.songs().await;
        let filters = self.filters.read().await.clone();
        self.navigation
            .navigate(direction, trigger, &songs, &filters)
            .await
    }

    /// Handle a global key press. Returns whether the key was consumed.
    pub async fn handle_key(&self, key: &str, text_input_focused: bool) -> bool {
        let Some(command) = command_for_key(key, text_input_focused) else {
            return false;
        };
        match command {
            KeyCommand::TogglePlay => {
                self.toggle_play().await;
            }
            KeyCommand::Previous => {
                self.navigate(Direction::Previous, NavigationTrigger::User).await;
            }
            KeyCommand::Next => {
                self.navigate(Direction::Next, NavigationTrigger::User).await;
            }
        }
        true
    }

    pub async fn toggle_favorite(&self, song_id: &SongId) -> bool {
        self.favorites.toggle(song_id).await
    }

    /// Event reported by a card widget
    pub async fn handle_widget_event(&self, widget_id: WidgetId, event: WidgetEvent) {
        let origin = SourceOrigin::Widget(widget_id);
        match event {
            WidgetEvent::Ready => {
                self.registry.mark_ready(widget_id);
            }
            WidgetEvent::Decode => {
                let Some(entry) = self.registry.find_by_widget(widget_id).await else {
                    return;
                };
                if let Some(peaks) = entry.widget.decoded_peaks() {
                    self.session
                        .report_widget_decoded(widget_id, peaks, Some(entry.widget.duration()))
                        .await;
                }
            }
            WidgetEvent::Interaction { fraction } => {
                self.widget_interaction(widget_id, fraction).await;
            }
            WidgetEvent::TimeUpdate { current, duration } => {
                self.session.report_time(origin, current, duration).await;
            }
            WidgetEvent::Play => {
                self.session.report_play_state(origin, true).await;
            }
            WidgetEvent::Pause => {
                self.session.report_play_state(origin, false).await;
            }
            WidgetEvent::Finish => {
                if self.session.report_ended(origin).await {
                    self.navigate(Direction::Next, NavigationTrigger::TrackEnded)
                        .await;
                }
            }
            WidgetEvent::Error { message } => {
                self.session.report_error(origin, &message).await;
            }
        }
    }

    async fn widget_interaction(&self, widget_id: WidgetId, fraction: f64) {
        let Some(entry) = self.registry.find_by_widget(widget_id).await else {
            warn!(target: LOG_TARGET, "Interaction from unknown {}", widget_id);
            return;
        };
        let source = self.session.source().await;
        let active = self.session.active_song_id().await;

        // The authoritative widget, or a mirror of the standalone source
        let drives_session = source.accepts(SourceOrigin::Widget(widget_id))
            || (matches!(source, ActiveSource::Standalone(_))
                && active.as_ref() == Some(&entry.song_id));
        if drives_session {
            self.seek(fraction).await;
            return;
        }

        let Some(song) = self.catalog.find(&entry.song_id).await else {
            warn!(target: LOG_TARGET, "Card {} has no catalog entry", entry.song_id);
            return;
        };
        if self.navigation.switch_to(song, true).await.is_some() {
            self.session.seek(fraction).await;
        }
    }

    /// Event reported by a standalone audio element. Events from elements
    /// that are no longer authoritative are dropped.
    pub async fn handle_audio_event(&self, audio: &Arc<dyn AudioElement>, event: AudioEvent) {
        let current = match self.session.source().await {
            ActiveSource::Standalone(active) => same_handle(&active, audio),
            _ => false,
        };
        if !current {
            debug!(target: LOG_TARGET, "Ignoring {:?} from stale element {}", event, audio.src());
            return;
        }

        let origin = SourceOrigin::Standalone;
        match event {
            AudioEvent::LoadedMetadata { duration } => {
                self.session
                    .report_time(origin, audio.current_time(), duration)
                    .await;
            }
            AudioEvent::TimeUpdate { current, duration } => {
                self.session.report_time(origin, current, duration).await;
            }
            AudioEvent::Play => {
                self.session.report_play_state(origin, true).await;
            }
            AudioEvent::Pause => {
                self.session.report_play_state(origin, false).await;
            }
            AudioEvent::Ended => {
                if self.session.report_ended(origin).await {
                    self.navigate(Direction::Next, NavigationTrigger::TrackEnded)
                        .await;
                }
            }
            AudioEvent::Error { message } => {
                self.session.report_error(origin, &message).await;
            }
        }
    }

    /// Mount widgets for cards scrolled into range
    pub async fn on_scroll(&self) -> MountReport {
        let songs = self.catalog.songs().await;
        self.mounter.mount_visible(&songs).await
    }

    /// Forward a route-transition hook
    pub async fn on_route_hook(&self, hook: RouteHook) {
        self.lifecycle.on_hook(hook).await;
    }
}
