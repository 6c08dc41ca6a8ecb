//! Route transition handling.
//!
//! The page framework calls four hooks per navigation, in order:
//! `BeforeLeave`, `BeforeEnter`, `Enter`, `After`. Card widgets are destroyed
//! on leave and rebuilt on enter; the playback session itself is never torn
//! down.

use crate::catalog::Catalog;
use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::media::CardHandle;
use crate::mounter::WaveformMounter;
use crate::registry::WaveformRegistry;
use crate::session::PlaybackSession;
use crate::song::SongId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "trackdeck::lifecycle";

/// Kind of page being entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// Full catalog listing with filters
    Catalog,
    /// Featured songs list
    Featured,
    /// Any page without song cards
    Other,
}

/// Named route-transition hook points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteHook {
    BeforeLeave,
    BeforeEnter(PageKind),
    Enter(PageKind),
    After,
}

impl RouteHook {
    /// Whether `self` may directly follow `previous`
    const fn follows(self, previous: Option<Self>) -> bool {
        matches!(
            (previous, self),
            (None | Some(Self::After), Self::BeforeLeave | Self::BeforeEnter(_))
                | (Some(Self::BeforeLeave), Self::BeforeEnter(_))
                | (Some(Self::BeforeEnter(_)), Self::Enter(_))
                | (Some(Self::Enter(_)), Self::After)
        )
    }
}

/// Renders a page's content and returns its song cards
#[async_trait]
pub trait PageInitializer: Send + Sync {
    /// Run the page's full initialization.
    ///
    /// # Errors
    ///
    /// Returns an error if the page's required DOM is missing.
    async fn initialize(&self, page: PageKind) -> Result<Vec<Arc<dyn CardHandle>>>;
}

struct LifecycleState {
    last_hook: Option<RouteHook>,
    entering: Option<PageKind>,
    relink_song: Option<SongId>,
    relink_cancel: CancellationToken,
    relink_task: Option<JoinHandle<bool>>,
}

pub struct LifecycleCoordinator {
    session: Arc<PlaybackSession>,
    registry: Arc<WaveformRegistry>,
    mounter: Arc<WaveformMounter>,
    pages: Arc<dyn PageInitializer>,
    catalog: Arc<Catalog>,
    config: LifecycleConfig,
    state: Mutex<LifecycleState>,
}

impl LifecycleCoordinator {
    #[must_use]
    pub fn new(
        session: Arc<PlaybackSession>,
        registry: Arc<WaveformRegistry>,
        mounter: Arc<WaveformMounter>,
        pages: Arc<dyn PageInitializer>,
        catalog: Arc<Catalog>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            session,
            registry,
            mounter,
            pages,
            catalog,
            config,
            state: Mutex::new(LifecycleState {
                last_hook: None,
                entering: None,
                relink_song: None,
                relink_cancel: CancellationToken::new(),
                relink_task: None,
            }),
        }
    }

    /// Dispatch a hook from the page framework. Hooks arriving out of order
    /// are logged and still run.
    pub async fn on_hook(&self, hook: RouteHook) {
        {
            let mut state = self.state.lock().await;
            if !hook.follows(state.last_hook) {
                warn!(
                    target: LOG_TARGET,
                    "Route hook {:?} after {:?}", hook, state.last_hook
                );
            }
            state.last_hook = Some(hook);
        }

        match hook {
            RouteHook::BeforeLeave => {
                self.before_leave().await;
            }
            RouteHook::BeforeEnter(page) => self.before_enter(page).await,
            RouteHook::Enter(page) => {
                self.enter(page).await;
            }
            RouteHook::After => {
                self.after().await;
            }
        }
    }

    /// Suspend redraws and destroy every card widget. Standalone audio keeps
    /// playing. Returns how many widgets were destroyed.
    pub async fn before_leave(&self) -> usize {
        {
            let mut state = self.state.lock().await;
            state.relink_cancel.cancel();
            state.relink_song = None;
            state.relink_task = None;
        }
        self.session.teardown_for_navigation().await;
        self.mounter.clear().await;
        let destroyed = self.registry.unregister_all().await;
        info!(target: LOG_TARGET, "Route leave: destroyed {} widgets", destroyed);
        destroyed
    }

    pub async fn before_enter(&self, page: PageKind) {
        debug!(target: LOG_TARGET, "Preparing to enter {:?}", page);
        self.state.lock().await.entering = Some(page);
    }

    /// Initialize the new page, mount its visible widgets, wait for the
    /// settle delay, then resume redraws. Returns the song that needs
    /// relinking to a card, if any.
    pub async fn enter(&self, page: PageKind) -> Option<SongId> {
        let announced = self.state.lock().await.entering.take();
        if announced.is_some_and(|p| p != page) {
            warn!(
                target: LOG_TARGET,
                "Entering {:?} but {:?} was announced", page, announced
            );
        }

        let cards = match self.pages.initialize(page).await {
            Ok(cards) => cards,
            Err(e) => {
                warn!(target: LOG_TARGET, "Page init failed for {:?}: {}", page, e);
                Vec::new()
            }
        };
        info!(target: LOG_TARGET, "Entered {:?} with {} cards", page, cards.len());

        if !cards.is_empty() {
            self.mounter.observe(cards).await;
            let songs = self.catalog.songs().await;
            self.mounter.mount_visible(&songs).await;
        }

        tokio::time::sleep(self.config.settle_delay()).await;
        let relink = self.session.restore_after_navigation().await;
        self.state.lock().await.relink_song = relink.clone();
        relink
    }

    /// Start best-effort relinking of a still-playing standalone source to
    /// its freshly mounted card, on the configured retry schedule.
    pub async fn after(&self) {
        let mut state = self.state.lock().await;
        let Some(song_id) = state.relink_song.take() else {
            return;
        };

        let cancel = CancellationToken::new();
        state.relink_cancel = cancel.clone();
        let schedule: Vec<Duration> = self
            .config
            .relink_schedule_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect();
        state.relink_task = Some(tokio::spawn(relink(
            self.session.clone(),
            self.registry.clone(),
            song_id,
            schedule,
            cancel,
        )));
    }

    /// Handle of the relink task started by the last `After` hook
    pub async fn take_relink_task(&self) -> Option<JoinHandle<bool>> {
        self.state.lock().await.relink_task.take()
    }
}

/// Try to link `song_id`'s card widget as the session's mirror at each
/// offset of `schedule` (measured from the start). Returns whether it linked.
async fn relink(
    session: Arc<PlaybackSession>,
    registry: Arc<WaveformRegistry>,
    song_id: SongId,
    schedule: Vec<Duration>,
    cancel: CancellationToken,
) -> bool {
    let mut elapsed = Duration::ZERO;
    for (attempt, at) in schedule.into_iter().enumerate() {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!(target: LOG_TARGET, "Relink of {} cancelled", song_id);
                return false;
            }
            () = tokio::time::sleep(at.saturating_sub(elapsed)) => {}
        }
        elapsed = elapsed.max(at);

        if session.active_song_id().await.as_ref() != Some(&song_id) {
            debug!(target: LOG_TARGET, "Active song changed, dropping relink of {}", song_id);
            return false;
        }

        let entry = registry
            .find_by_song_id(&song_id)
            .await
            .filter(|e| e.card.is_displayed());
        if let Some(entry) = entry {
            if session
                .link_mirror(&song_id, entry.widget_id, entry.widget.clone())
                .await
            {
                registry
                    .sync_play_icons(Some(&song_id), session.is_playing().await)
                    .await;
                return true;
            }
        }
        debug!(
            target: LOG_TARGET,
            "Relink attempt {} for {}: no mounted card yet", attempt + 1, song_id
        );
    }
    info!(target: LOG_TARGET, "No card found for {} after relink schedule", song_id);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SongRepository;
    use crate::config::WaveformConfig;
    use crate::events::EventBus;
    use crate::media::AudioElement;
    use crate::session::{ActiveSource, SourceKind};
    use crate::song::Song;
    use crate::testing::{MockAudio, MockBackend, MockCard, MockPages};

    struct StaticRepository;

    #[async_trait]
    impl SongRepository for StaticRepository {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch_all(&self) -> Result<Vec<Song>> {
            Ok(vec![
                Song::new("a", "A", "X", "a.mp3"),
                Song::new("b", "B", "X", "b.mp3"),
            ])
        }
    }

    struct Fixture {
        session: Arc<PlaybackSession>,
        registry: Arc<WaveformRegistry>,
        pages: Arc<MockPages>,
        coordinator: LifecycleCoordinator,
    }

    fn fixture() -> Fixture {
        let events = EventBus::default();
        let session = PlaybackSession::new(events.clone());
        let registry = WaveformRegistry::new(events);
        let backend = MockBackend::new();
        let mounter = Arc::new(WaveformMounter::new(
            registry.clone(),
            backend,
            &WaveformConfig::default(),
        ));
        let pages = MockPages::new();
        let coordinator = LifecycleCoordinator::new(
            session.clone(),
            registry.clone(),
            mounter,
            pages.clone(),
            Arc::new(Catalog::new(Arc::new(StaticRepository))),
            LifecycleConfig::default(),
        );
        Fixture {
            session,
            registry,
            pages,
            coordinator,
        }
    }

    async fn navigate_to(f: &Fixture, page: PageKind) {
        f.coordinator.on_hook(RouteHook::BeforeLeave).await;
        f.coordinator.on_hook(RouteHook::BeforeEnter(page)).await;
        f.coordinator.on_hook(RouteHook::Enter(page)).await;
        f.coordinator.on_hook(RouteHook::After).await;
    }

    #[test]
    fn test_hook_order() {
        assert!(RouteHook::BeforeLeave.follows(None));
        assert!(RouteHook::BeforeEnter(PageKind::Catalog).follows(Some(RouteHook::BeforeLeave)));
        assert!(RouteHook::Enter(PageKind::Catalog)
            .follows(Some(RouteHook::BeforeEnter(PageKind::Catalog))));
        assert!(RouteHook::After.follows(Some(RouteHook::Enter(PageKind::Other))));
        assert!(!RouteHook::After.follows(Some(RouteHook::BeforeLeave)));
        assert!(!RouteHook::Enter(PageKind::Other).follows(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_mounts_cards_and_clears_transition() {
        let f = fixture();
        f.pages.set_cards(
            PageKind::Catalog,
            vec![MockCard::new("a", 0), MockCard::new("b", 1)],
        );

        navigate_to(&f, PageKind::Catalog).await;
        assert_eq!(f.registry.len().await, 2);
        assert!(!f.session.is_transitioning().await);
        assert_eq!(*f.pages.calls.lock().unwrap(), vec![PageKind::Catalog]);

        // Leaving destroys every widget but keeps the registry usable
        assert_eq!(f.coordinator.before_leave().await, 2);
        assert!(f.registry.find_by_song_id(&SongId::from("a")).await.is_none());
        assert!(f.session.is_transitioning().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standalone_survives_and_relinks() {
        let f = fixture();
        let audio = MockAudio::new("b.mp3");
        f.session
            .activate(Song::new("b", "B", "X", "b.mp3"), ActiveSource::Standalone(audio.clone()))
            .await;
        f.session.start().await;
        let card_b = MockCard::new("b", 1);
        f.pages
            .set_cards(PageKind::Featured, vec![MockCard::new("a", 0), card_b.clone()]);

        navigate_to(&f, PageKind::Featured).await;
        assert!(!audio.is_paused());

        let linked = f.coordinator.take_relink_task().await.unwrap().await.unwrap();
        assert!(linked);
        let snap = f.session.snapshot().await;
        assert_eq!(snap.source, Some(SourceKind::Standalone));
        assert!(snap.mirror.is_some());
        assert!(card_b.shows_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_relink_gives_up_without_card() {
        let f = fixture();
        f.session
            .activate(
                Song::new("b", "B", "X", "b.mp3"),
                ActiveSource::Standalone(MockAudio::new("b.mp3")),
            )
            .await;

        navigate_to(&f, PageKind::Other).await;
        let linked = f.coordinator.take_relink_task().await.unwrap().await.unwrap();
        assert!(!linked);
        assert!(f.session.snapshot().await.mirror.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_leave_cancels_pending_relink() {
        let f = fixture();
        f.session
            .activate(
                Song::new("b", "B", "X", "b.mp3"),
                ActiveSource::Standalone(MockAudio::new("b.mp3")),
            )
            .await;

        navigate_to(&f, PageKind::Other).await;
        let task = f.coordinator.take_relink_task().await.unwrap();
        f.coordinator.on_hook(RouteHook::BeforeLeave).await;
        assert!(!task.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_init_failure_degrades_to_empty_page() {
        struct BrokenPages;

        #[async_trait]
        impl PageInitializer for BrokenPages {
            async fn initialize(&self, _page: PageKind) -> Result<Vec<Arc<dyn CardHandle>>> {
                Err(crate::error::CoreError::PageInit {
                    reason: "missing #song-list".into(),
                })
            }
        }

        let events = EventBus::default();
        let session = PlaybackSession::new(events.clone());
        let registry = WaveformRegistry::new(events);
        let mounter = Arc::new(WaveformMounter::new(
            registry.clone(),
            MockBackend::new(),
            &WaveformConfig::default(),
        ));
        let coordinator = LifecycleCoordinator::new(
            session.clone(),
            registry.clone(),
            mounter,
            Arc::new(BrokenPages),
            Arc::new(Catalog::new(Arc::new(StaticRepository))),
            LifecycleConfig::default(),
        );
        coordinator.before_leave().await;
        assert_eq!(coordinator.enter(PageKind::Catalog).await, None);
        assert!(registry.is_empty().await);
        assert!(!session.is_transitioning().await);
    }
}
