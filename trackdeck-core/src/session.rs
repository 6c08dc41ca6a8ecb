//! The single source of truth for what is currently playing.
//!
//! [`PlaybackSession`] owns the active song, the one authoritative media
//! source, the playback phase, position and decoded peaks. It outlives route
//! transitions: a teardown only drops widget-backed sources (their DOM is
//! going away), a standalone audio element keeps playing.

use crate::error::Result;
use crate::events::{EventBus, PlayerEvent};
use crate::media::{same_handle, AudioElement, WaveformWidget, WidgetId};
use crate::song::{Song, SongId};
use crate::time::{progress_fraction, secs_to_duration};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

const LOG_TARGET: &str = "trackdeck::session";

/// Playback phase of the active song
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
}

/// Named transitions of the playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTrigger {
    Activate,
    Play,
    Pause,
    Finish,
    Fail,
    Clear,
}

impl PlaybackPhase {
    /// Apply a trigger. Play/pause/finish/fail on an idle session are ignored.
    #[must_use]
    pub const fn on(self, trigger: PhaseTrigger) -> Self {
        match (self, trigger) {
            (_, PhaseTrigger::Activate) => Self::Loading,
            (_, PhaseTrigger::Clear) | (Self::Idle, _) => Self::Idle,
            (_, PhaseTrigger::Play) => Self::Playing,
            (Self::Ended, PhaseTrigger::Pause) | (_, PhaseTrigger::Finish) => Self::Ended,
            (_, PhaseTrigger::Pause | PhaseTrigger::Fail) => Self::Paused,
        }
    }

    #[must_use]
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Which kind of handle is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    None,
    Standalone,
    Widget,
}

/// Where a time or state report came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceOrigin {
    Standalone,
    Widget(WidgetId),
}

/// The authoritative media source. At most one exists at any instant.
#[derive(Clone, Default)]
pub enum ActiveSource {
    #[default]
    None,
    Standalone(Arc<dyn AudioElement>),
    Widget {
        id: WidgetId,
        widget: Arc<dyn WaveformWidget>,
    },
}

impl fmt::Debug for ActiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Standalone(audio) => f.debug_tuple("Standalone").field(&audio.src()).finish(),
            Self::Widget { id, .. } => f.debug_tuple("Widget").field(id).finish(),
        }
    }
}

impl ActiveSource {
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::None => SourceKind::None,
            Self::Standalone(_) => SourceKind::Standalone,
            Self::Widget { .. } => SourceKind::Widget,
        }
    }

    /// Whether reports from `origin` come from this source
    #[must_use]
    pub fn accepts(&self, origin: SourceOrigin) -> bool {
        match (self, origin) {
            (Self::Standalone(_), SourceOrigin::Standalone) => true,
            (Self::Widget { id, .. }, SourceOrigin::Widget(other)) => *id == other,
            _ => false,
        }
    }

    /// Whether this is the same underlying handle as `other`
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Standalone(a), Self::Standalone(b)) => same_handle(a, b),
            (Self::Widget { id: a, .. }, Self::Widget { id: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Whether the handle itself reports playing right now
    #[must_use]
    pub fn is_playing(&self) -> bool {
        match self {
            Self::None => false,
            Self::Standalone(audio) => !audio.is_paused(),
            Self::Widget { widget, .. } => widget.is_playing(),
        }
    }

    fn play(&self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Standalone(audio) => audio.play(),
            Self::Widget { widget, .. } => widget.play(),
        }
    }

    fn pause(&self) {
        match self {
            Self::None => {}
            Self::Standalone(audio) => audio.pause(),
            Self::Widget { widget, .. } => widget.pause(),
        }
    }

    fn seek(&self, fraction: f64, known_duration: Duration) {
        match self {
            Self::None => {}
            Self::Standalone(audio) => {
                let duration = audio
                    .duration()
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .unwrap_or_else(|| known_duration.as_secs_f64());
                audio.seek(fraction * duration);
            }
            Self::Widget { widget, .. } => widget.seek_to(fraction),
        }
    }
}

/// Proof of which activation a piece of asynchronous work belongs to.
///
/// Decode results carry the token they were started under; once the session
/// has moved on, the token no longer matches and the result is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationToken {
    generation: u64,
    song_id: SongId,
}

impl ActivationToken {
    #[must_use]
    pub const fn song_id(&self) -> &SongId {
        &self.song_id
    }
}

/// Read-only view of the session for projections
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub song: Option<Song>,
    pub source: Option<SourceKind>,
    pub phase: PlaybackPhase,
    pub position: Duration,
    pub duration: Duration,
    pub peaks: Option<Arc<Vec<f32>>>,
    pub is_transitioning: bool,
    pub mirror: Option<WidgetId>,
}

impl SessionSnapshot {
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.phase.is_playing()
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        progress_fraction(self.position, self.duration)
    }

    /// The player bar is shown iff there is an active song or an
    /// authoritative handle of either kind.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.song.is_some()
            || matches!(
                self.source,
                Some(SourceKind::Standalone | SourceKind::Widget)
            )
    }

    #[must_use]
    pub fn song_id(&self) -> Option<&SongId> {
        self.song.as_ref().map(|s| &s.id)
    }
}

struct SessionInner {
    song: Option<Song>,
    source: ActiveSource,
    phase: PlaybackPhase,
    position: Duration,
    duration: Duration,
    peaks: Option<Arc<Vec<f32>>>,
    transitioning: bool,
    generation: u64,
    /// Card widget following a standalone source visually
    mirror: Option<(WidgetId, Arc<dyn WaveformWidget>)>,
}

impl SessionInner {
    fn apply(&mut self, trigger: PhaseTrigger, events: &EventBus) {
        let next = self.phase.on(trigger);
        if next != self.phase {
            debug!(target: LOG_TARGET, "Phase {:?} -> {:?} ({:?})", self.phase, next, trigger);
            self.phase = next;
            events.emit(PlayerEvent::StateChanged {
                song_id: self.song.as_ref().map(|s| s.id.clone()),
                phase: next,
            });
        }
    }

    fn song_context(&self) -> (String, String) {
        self.song.as_ref().map_or_else(
            || ("<none>".to_string(), "<none>".to_string()),
            |s| (s.id.to_string(), s.audio_url.clone()),
        )
    }
}

/// Process-wide playback state, shared by reference between components
pub struct PlaybackSession {
    inner: RwLock<SessionInner>,
    events: EventBus,
}

impl PlaybackSession {
    /// Create a new, idle session
    #[must_use]
    pub fn new(events: EventBus) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(SessionInner {
                song: None,
                source: ActiveSource::None,
                phase: PlaybackPhase::Idle,
                position: Duration::ZERO,
                duration: Duration::ZERO,
                peaks: None,
                transitioning: false,
                generation: 0,
                mirror: None,
            }),
            events,
        })
    }

    /// Make `song` the active song with `source` as the authoritative handle.
    ///
    /// Any previous source is paused before the new one is installed.
    pub async fn activate(&self, song: Song, source: ActiveSource) -> ActivationToken {
        let mut inner = self.inner.write().await;

        if !inner.source.same_as(&source) {
            inner.source.pause();
        }
        inner.mirror = None;
        inner.generation += 1;

        let (peaks, duration) = song.instant_waveform().map_or((None, Duration::ZERO), |(p, d)| {
            (Some(Arc::new(p.to_vec())), secs_to_duration(d))
        });
        inner.peaks = peaks;
        inner.duration = duration;
        inner.position = Duration::ZERO;

        info!(
            target: LOG_TARGET,
            "Activating {} - {} [{}] via {:?}",
            song.artist, song.title, song.id, source
        );

        let token = ActivationToken {
            generation: inner.generation,
            song_id: song.id.clone(),
        };
        let kind = source.kind();
        let has_peaks = inner.peaks.is_some();
        inner.source = source;
        inner.song = Some(song.clone());
        inner.apply(PhaseTrigger::Activate, &self.events);

        self.events.emit(PlayerEvent::SongActivated { song, source: kind });
        if has_peaks {
            self.events.emit(PlayerEvent::PeaksReady {
                song_id: token.song_id.clone(),
            });
        }
        token
    }

    /// Whether `token` still identifies the current activation
    pub async fn is_current(&self, token: &ActivationToken) -> bool {
        let inner = self.inner.read().await;
        inner.generation == token.generation
            && inner.song.as_ref().is_some_and(|s| s.id == token.song_id)
    }

    /// Update position from `origin`. Returns whether the waveform should be
    /// redrawn; reports from a non-authoritative origin are ignored.
    pub async fn report_time(&self, origin: SourceOrigin, current: f64, duration: f64) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.source.accepts(origin) {
            trace!(target: LOG_TARGET, "Ignoring time report from {:?}", origin);
            return false;
        }

        inner.position = secs_to_duration(current);
        let duration = secs_to_duration(duration);
        if !duration.is_zero() {
            inner.duration = duration;
        }

        if let Some((_, mirror)) = &inner.mirror {
            mirror.seek_to(progress_fraction(inner.position, inner.duration));
        }

        let redraw = !inner.transitioning && inner.peaks.is_some();
        self.events.emit(PlayerEvent::PositionSync {
            position: inner.position,
            duration: inner.duration,
            redraw,
        });
        redraw
    }

    /// Store decoded peaks for the activation identified by `token`.
    ///
    /// Returns `false` (and changes nothing) if the session has moved on.
    pub async fn report_decoded(
        &self,
        token: &ActivationToken,
        peaks: Vec<f32>,
        duration: Option<f64>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        let current = inner.generation == token.generation
            && inner.song.as_ref().is_some_and(|s| s.id == token.song_id);
        if !current {
            debug!(
                target: LOG_TARGET,
                "Discarding stale decode for {} (session moved on)", token.song_id
            );
            return false;
        }
        Self::store_peaks(&mut inner, &self.events, peaks, duration);
        true
    }

    /// Store peaks decoded by a card widget, only if that widget is the
    /// authoritative source.
    pub async fn report_widget_decoded(
        &self,
        widget_id: WidgetId,
        peaks: Vec<f32>,
        duration: Option<f64>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.source.accepts(SourceOrigin::Widget(widget_id)) {
            debug!(target: LOG_TARGET, "Discarding decode from inactive {}", widget_id);
            return false;
        }
        Self::store_peaks(&mut inner, &self.events, peaks, duration);
        true
    }

    fn store_peaks(
        inner: &mut SessionInner,
        events: &EventBus,
        peaks: Vec<f32>,
        duration: Option<f64>,
    ) {
        if let Some(duration) = duration.map(secs_to_duration).filter(|d| !d.is_zero()) {
            inner.duration = duration;
        }
        inner.peaks = Some(Arc::new(peaks));
        if let Some(song) = &inner.song {
            events.emit(PlayerEvent::PeaksReady {
                song_id: song.id.clone(),
            });
        }
    }

    /// Set the play state directly (controller-initiated).
    pub async fn set_playing(&self, playing: bool) {
        let mut inner = self.inner.write().await;
        let trigger = if playing {
            PhaseTrigger::Play
        } else {
            PhaseTrigger::Pause
        };
        inner.apply(trigger, &self.events);
    }

    /// Play state reported by a media handle. Ignored unless `origin` is
    /// authoritative.
    pub async fn report_play_state(&self, origin: SourceOrigin, playing: bool) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.source.accepts(origin) {
            return false;
        }
        let trigger = if playing {
            PhaseTrigger::Play
        } else {
            PhaseTrigger::Pause
        };
        inner.apply(trigger, &self.events);
        true
    }

    /// Natural end of track from `origin`. Returns whether it was accepted.
    pub async fn report_ended(&self, origin: SourceOrigin) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.source.accepts(origin) {
            return false;
        }
        inner.position = inner.duration;
        inner.apply(PhaseTrigger::Finish, &self.events);
        true
    }

    /// Decode or network failure from `origin`: logged with song context, the
    /// session reverts to paused. Never propagates.
    pub async fn report_error(&self, origin: SourceOrigin, message: &str) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.source.accepts(origin) {
            debug!(target: LOG_TARGET, "Ignoring error from inactive {:?}: {}", origin, message);
            return false;
        }
        let (song_id, url) = inner.song_context();
        warn!(
            target: LOG_TARGET,
            "Playback failed for {} ({}): {}", song_id, url, message
        );
        inner.source.pause();
        inner.apply(PhaseTrigger::Fail, &self.events);
        if let Some(song) = &inner.song {
            self.events.emit(PlayerEvent::PlaybackFailed {
                song_id: song.id.clone(),
                url: song.audio_url.clone(),
                message: message.to_string(),
            });
        }
        true
    }

    /// Toggle the authoritative source. Returns the new playing state, or
    /// `None` if there is nothing to toggle.
    pub async fn toggle(&self) -> Option<bool> {
        let mut inner = self.inner.write().await;
        if matches!(inner.source, ActiveSource::None) {
            return None;
        }

        if inner.phase.is_playing() {
            inner.source.pause();
            inner.apply(PhaseTrigger::Pause, &self.events);
            return Some(false);
        }

        if let Err(e) = inner.source.play() {
            let (song_id, url) = inner.song_context();
            warn!(target: LOG_TARGET, "Play request for {} ({}) rejected: {}", song_id, url, e);
            inner.apply(PhaseTrigger::Fail, &self.events);
            return Some(false);
        }
        inner.apply(PhaseTrigger::Play, &self.events);
        Some(true)
    }

    /// Start the authoritative source, e.g. after a handoff.
    pub async fn start(&self) -> bool {
        let mut inner = self.inner.write().await;
        if matches!(inner.source, ActiveSource::None) {
            return false;
        }
        match inner.source.play() {
            Ok(()) => {
                inner.apply(PhaseTrigger::Play, &self.events);
                true
            }
            Err(e) => {
                let (song_id, url) = inner.song_context();
                warn!(target: LOG_TARGET, "Failed to start {} ({}): {}", song_id, url, e);
                inner.apply(PhaseTrigger::Fail, &self.events);
                false
            }
        }
    }

    /// Seek the authoritative source to `fraction` of the track.
    ///
    /// Returns whether the session was playing before the seek, or `None` if
    /// there is no source.
    pub async fn seek(&self, fraction: f64) -> Option<bool> {
        let mut inner = self.inner.write().await;
        if matches!(inner.source, ActiveSource::None) {
            return None;
        }
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let was_playing = inner.phase.is_playing();
        inner.source.seek(fraction, inner.duration);
        inner.position = inner.duration.mul_f64(fraction);
        debug!(target: LOG_TARGET, "Seek to {:.3} (was playing: {})", fraction, was_playing);
        Some(was_playing)
    }

    /// After a seek grace period: restart the source if the session still
    /// expects playback but the handle reports paused.
    pub async fn resume_if_stalled(&self) -> bool {
        let inner = self.inner.read().await;
        if !inner.phase.is_playing() || inner.source.is_playing() {
            return false;
        }
        match inner.source.play() {
            Ok(()) => true,
            Err(e) => {
                warn!(target: LOG_TARGET, "Resume after seek failed: {}", e);
                false
            }
        }
    }

    /// Drop the authoritative source without clearing the active song.
    ///
    /// Used when navigation runs off the end of the list: the bar keeps
    /// showing the last track's metadata.
    pub async fn release_source(&self) {
        let mut inner = self.inner.write().await;
        inner.source.pause();
        inner.source = ActiveSource::None;
        inner.mirror = None;
        inner.apply(PhaseTrigger::Finish, &self.events);
    }

    /// Route is leaving. Widget-backed sources are dropped (their container
    /// is about to be destroyed); a standalone element keeps playing.
    ///
    /// Returns the id of the widget that was authoritative, if any.
    pub async fn teardown_for_navigation(&self) -> Option<WidgetId> {
        let mut inner = self.inner.write().await;
        inner.transitioning = true;
        inner.mirror = None;

        let dropped = match &inner.source {
            ActiveSource::Widget { id, widget } => {
                widget.pause();
                Some(*id)
            }
            _ => None,
        };
        if dropped.is_some() {
            inner.source = ActiveSource::None;
            inner.apply(PhaseTrigger::Pause, &self.events);
        }

        info!(
            target: LOG_TARGET,
            "Teardown for navigation (dropped widget source: {:?})", dropped
        );
        self.events.emit(PlayerEvent::TransitionStarted);
        dropped
    }

    /// Route has entered and settled. Returns the active song id if a
    /// standalone source is still running without a card to mirror it.
    pub async fn restore_after_navigation(&self) -> Option<SongId> {
        let mut inner = self.inner.write().await;
        inner.transitioning = false;
        self.events.emit(PlayerEvent::TransitionFinished);

        match (&inner.song, &inner.source, &inner.mirror) {
            (Some(song), ActiveSource::Standalone(_), None) => Some(song.id.clone()),
            _ => None,
        }
    }

    /// Link a freshly mounted card widget as the visual mirror of the
    /// standalone source. Only succeeds for the active song.
    pub async fn link_mirror(
        &self,
        song_id: &SongId,
        widget_id: WidgetId,
        widget: Arc<dyn WaveformWidget>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        let matches = inner.song.as_ref().is_some_and(|s| &s.id == song_id)
            && matches!(inner.source, ActiveSource::Standalone(_));
        if !matches {
            return false;
        }
        widget.seek_to(progress_fraction(inner.position, inner.duration));
        inner.mirror = Some((widget_id, widget));
        info!(target: LOG_TARGET, "Linked {} as mirror for {}", widget_id, song_id);
        true
    }

    /// Current authoritative source
    pub async fn source(&self) -> ActiveSource {
        self.inner.read().await.source.clone()
    }

    pub async fn active_song(&self) -> Option<Song> {
        self.inner.read().await.song.clone()
    }

    pub async fn active_song_id(&self) -> Option<SongId> {
        self.inner.read().await.song.as_ref().map(|s| s.id.clone())
    }

    pub async fn is_playing(&self) -> bool {
        self.inner.read().await.phase.is_playing()
    }

    pub async fn is_transitioning(&self) -> bool {
        self.inner.read().await.transitioning
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            song: inner.song.clone(),
            source: Some(inner.source.kind()),
            phase: inner.phase,
            position: inner.position,
            duration: inner.duration,
            peaks: inner.peaks.clone(),
            is_transitioning: inner.transitioning,
            mirror: inner.mirror.as_ref().map(|(id, _)| *id),
        }
    }
}
