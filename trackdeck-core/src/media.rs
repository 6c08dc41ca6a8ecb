//! Contracts for the media collaborators the core drives.
//!
//! The host environment supplies implementations: a standalone audio element,
//! a per-card waveform widget (which decodes and plays its own audio), the
//! card a widget is mounted in, and a backend that creates all of these.

use crate::error::Result;
use crate::song::SongId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Identity of a mounted waveform widget, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget#{}", self.0)
    }
}

/// A standalone audio element playing a single URL.
pub trait AudioElement: Send + Sync {
    /// Source URL this element was created for
    fn src(&self) -> &str;

    /// Request playback; resuming is asynchronous on the host side.
    ///
    /// # Errors
    ///
    /// Returns an error if the host rejects the play request outright.
    fn play(&self) -> Result<()>;

    fn pause(&self);

    fn is_paused(&self) -> bool;

    /// Current position in seconds
    fn current_time(&self) -> f64;

    /// Total duration in seconds, once metadata has loaded
    fn duration(&self) -> Option<f64>;

    /// Seek to an absolute position in seconds
    fn seek(&self, seconds: f64);
}

/// A third-party waveform widget embedded in a song card.
pub trait WaveformWidget: Send + Sync {
    /// Begin loading audio. With precomputed peaks and duration the widget
    /// skips decoding and becomes ready immediately.
    fn load(&self, url: &str, peaks: Option<&[f32]>, duration: Option<f64>);

    /// Decoded amplitude data, once the `Decode` event has fired
    fn decoded_peaks(&self) -> Option<Vec<f32>>;

    fn duration(&self) -> f64;

    fn current_time(&self) -> f64;

    /// Seek to a fraction of the duration in `[0, 1]`
    fn seek_to(&self, fraction: f64);

    fn is_playing(&self) -> bool;

    /// # Errors
    ///
    /// Returns an error if the widget cannot start playback.
    fn play(&self) -> Result<()>;

    fn pause(&self);

    /// Release the widget's decode context.
    ///
    /// # Errors
    ///
    /// Returns an error if the host fails to release resources; callers log
    /// and continue.
    fn destroy(&self) -> Result<()>;
}

/// A rendered song card on the current page.
pub trait CardHandle: Send + Sync {
    fn song_id(&self) -> &SongId;

    /// Position of the card in the document, used for ordering
    fn document_index(&self) -> usize;

    /// Whether the card is laid out and visible (not `display: none`)
    fn is_displayed(&self) -> bool;

    /// Distance in pixels from the scrollable list's viewport; zero when the
    /// card intersects it.
    fn distance_to_viewport(&self) -> f64;

    fn set_playing(&self, playing: bool);

    fn set_favorite(&self, favorite: bool);

    /// Fade the card's waveform in
    fn reveal_waveform(&self);
}

/// Events a waveform widget reports back to the core
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    Ready,
    Decode,
    /// User clicked the waveform at a fraction of its width
    Interaction { fraction: f64 },
    TimeUpdate { current: f64, duration: f64 },
    Play,
    Pause,
    Finish,
    Error { message: String },
}

/// Events a standalone audio element reports back to the core
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    LoadedMetadata { duration: f64 },
    TimeUpdate { current: f64, duration: f64 },
    Play,
    Pause,
    Ended,
    Error { message: String },
}

/// Result of decoding a URL into waveform data
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub peaks: Vec<f32>,
    pub duration: f64,
}

/// Visual options passed to a widget at creation time
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetStyle {
    pub wave_color: String,
    pub progress_color: String,
    pub bar_width: f32,
    pub bar_gap: f32,
    pub height: u32,
}

/// Factory for media collaborators
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Create a standalone audio element for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot create an audio element.
    fn create_audio(&self, url: &str) -> Result<Arc<dyn AudioElement>>;

    /// Create a waveform widget inside `card`.
    ///
    /// # Errors
    ///
    /// Returns an error if the card's container is gone or the widget fails
    /// to initialize.
    fn create_widget(
        &self,
        card: &Arc<dyn CardHandle>,
        style: &WidgetStyle,
    ) -> Result<Arc<dyn WaveformWidget>>;

    /// Fetch and decode `url` into peaks for standalone display.
    ///
    /// # Errors
    ///
    /// Returns an error on network or codec failure.
    async fn decode_peaks(&self, url: &str) -> Result<DecodedAudio>;
}

/// Pointer identity for trait-object handles, ignoring vtables.
pub(crate) fn same_handle<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
