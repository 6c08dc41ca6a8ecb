//! In-memory media collaborators for unit tests.

use crate::error::{CoreError, Result};
use crate::lifecycle::{PageInitializer, PageKind};
use crate::master_view::{MasterBarModel, PlayerBarSurface};
use crate::media::{
    AudioElement, CardHandle, DecodedAudio, MediaBackend, WaveformWidget, WidgetStyle,
};
use crate::renderer::CanvasSize;
use crate::song::SongId;
use async_trait::async_trait;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Default)]
struct AudioState {
    playing: bool,
    time: f64,
    duration: Option<f64>,
    seeks: Vec<f64>,
    plays: u32,
    fail_next_play: bool,
}

pub struct MockAudio {
    src: String,
    state: Mutex<AudioState>,
}

impl MockAudio {
    pub fn new(src: &str) -> Arc<Self> {
        Arc::new(Self {
            src: src.to_string(),
            state: Mutex::new(AudioState::default()),
        })
    }

    pub fn set_duration(&self, duration: f64) {
        lock(&self.state).duration = Some(duration);
    }

    pub fn fail_next_play(&self) {
        lock(&self.state).fail_next_play = true;
    }

    /// Simulate the element stalling (paused without being asked)
    pub fn stall(&self) {
        lock(&self.state).playing = false;
    }

    pub fn last_seek(&self) -> Option<f64> {
        lock(&self.state).seeks.last().copied()
    }

    pub fn play_count(&self) -> u32 {
        lock(&self.state).plays
    }
}

impl AudioElement for MockAudio {
    fn src(&self) -> &str {
        &self.src
    }

    fn play(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_next_play {
            state.fail_next_play = false;
            return Err(CoreError::Playback {
                song_id: String::new(),
                url: self.src.clone(),
                reason: "play rejected".into(),
            });
        }
        state.plays += 1;
        state.playing = true;
        Ok(())
    }

    fn pause(&self) {
        lock(&self.state).playing = false;
    }

    fn is_paused(&self) -> bool {
        !lock(&self.state).playing
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).time
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.state).duration
    }

    fn seek(&self, seconds: f64) {
        let mut state = lock(&self.state);
        state.time = seconds;
        state.seeks.push(seconds);
    }
}

#[derive(Default)]
struct WidgetState {
    playing: bool,
    duration: f64,
    loaded: Option<(String, bool)>,
    seeks: Vec<f64>,
    destroyed: bool,
    fail_destroy: bool,
    peaks: Option<Vec<f32>>,
}

pub struct MockWidget {
    state: Mutex<WidgetState>,
}

impl MockWidget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(WidgetState::default()),
        })
    }

    pub fn fail_destroy(&self) {
        lock(&self.state).fail_destroy = true;
    }

    pub fn set_decoded(&self, peaks: Vec<f32>) {
        lock(&self.state).peaks = Some(peaks);
    }

    pub fn last_seek(&self) -> Option<f64> {
        lock(&self.state).seeks.last().copied()
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// URL loaded and whether precomputed peaks were supplied
    pub fn loaded(&self) -> Option<(String, bool)> {
        lock(&self.state).loaded.clone()
    }
}

impl WaveformWidget for MockWidget {
    fn load(&self, url: &str, peaks: Option<&[f32]>, duration: Option<f64>) {
        let mut state = lock(&self.state);
        state.loaded = Some((url.to_string(), peaks.is_some()));
        if let Some(peaks) = peaks {
            state.peaks = Some(peaks.to_vec());
        }
        state.duration = duration.unwrap_or_default();
    }

    fn decoded_peaks(&self) -> Option<Vec<f32>> {
        lock(&self.state).peaks.clone()
    }

    fn duration(&self) -> f64 {
        lock(&self.state).duration
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn seek_to(&self, fraction: f64) {
        lock(&self.state).seeks.push(fraction);
    }

    fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    fn play(&self) -> Result<()> {
        lock(&self.state).playing = true;
        Ok(())
    }

    fn pause(&self) {
        lock(&self.state).playing = false;
    }

    fn destroy(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.playing = false;
        state.destroyed = true;
        if state.fail_destroy {
            return Err(CoreError::WidgetDisposal {
                reason: "container already detached".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct CardState {
    displayed: bool,
    distance: f64,
    playing: bool,
    favorite: bool,
    revealed: bool,
}

pub struct MockCard {
    song_id: SongId,
    index: usize,
    state: Mutex<CardState>,
}

impl MockCard {
    pub fn new(song_id: &str, index: usize) -> Arc<Self> {
        Arc::new(Self {
            song_id: SongId::from(song_id),
            index,
            state: Mutex::new(CardState {
                displayed: true,
                ..CardState::default()
            }),
        })
    }

    pub fn set_displayed(&self, displayed: bool) {
        lock(&self.state).displayed = displayed;
    }

    pub fn set_distance(&self, distance: f64) {
        lock(&self.state).distance = distance;
    }

    pub fn shows_playing(&self) -> bool {
        lock(&self.state).playing
    }

    pub fn shows_favorite(&self) -> bool {
        lock(&self.state).favorite
    }

    pub fn is_revealed(&self) -> bool {
        lock(&self.state).revealed
    }
}

impl CardHandle for MockCard {
    fn song_id(&self) -> &SongId {
        &self.song_id
    }

    fn document_index(&self) -> usize {
        self.index
    }

    fn is_displayed(&self) -> bool {
        lock(&self.state).displayed
    }

    fn distance_to_viewport(&self) -> f64 {
        lock(&self.state).distance
    }

    fn set_playing(&self, playing: bool) {
        lock(&self.state).playing = playing;
    }

    fn set_favorite(&self, favorite: bool) {
        lock(&self.state).favorite = favorite;
    }

    fn reveal_waveform(&self) {
        lock(&self.state).revealed = true;
    }
}

/// Backend that records every handle it creates.
///
/// Decodes resolve immediately with configured results unless a gate is set
/// for the URL, in which case they wait for the gate to be notified.
#[derive(Default)]
pub struct MockBackend {
    pub audios: Mutex<Vec<Arc<MockAudio>>>,
    pub widgets: Mutex<Vec<(SongId, Arc<MockWidget>)>>,
    decodes: Mutex<HashMap<String, DecodedAudio>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_decode(&self, url: &str, peaks: Vec<f32>, duration: f64) {
        lock(&self.decodes).insert(url.to_string(), DecodedAudio { peaks, duration });
    }

    pub fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.gates).insert(url.to_string(), gate.clone());
        gate
    }

    pub fn last_audio(&self) -> Option<Arc<MockAudio>> {
        lock(&self.audios).last().cloned()
    }

    pub fn widget_for(&self, song_id: &str) -> Option<Arc<MockWidget>> {
        lock(&self.widgets)
            .iter()
            .rev()
            .find(|(id, _)| id.as_str() == song_id)
            .map(|(_, w)| w.clone())
    }

    pub fn widget_count(&self) -> usize {
        lock(&self.widgets).len()
    }
}

#[async_trait]
impl MediaBackend for MockBackend {
    fn create_audio(&self, url: &str) -> Result<Arc<dyn AudioElement>> {
        let audio = MockAudio::new(url);
        lock(&self.audios).push(audio.clone());
        Ok(audio)
    }

    fn create_widget(
        &self,
        card: &Arc<dyn CardHandle>,
        _style: &WidgetStyle,
    ) -> Result<Arc<dyn WaveformWidget>> {
        let widget = MockWidget::new();
        lock(&self.widgets).push((card.song_id().clone(), widget.clone()));
        Ok(widget)
    }

    async fn decode_peaks(&self, url: &str) -> Result<DecodedAudio> {
        let gate = lock(&self.gates).get(url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.decodes)
            .get(url)
            .cloned()
            .ok_or_else(|| CoreError::Decode {
                url: url.to_string(),
                reason: "no test data".into(),
            })
    }
}

/// Page initializer returning a fixed set of cards per page kind
#[derive(Default)]
pub struct MockPages {
    pages: Mutex<HashMap<PageKind, Vec<Arc<MockCard>>>>,
    pub calls: Mutex<Vec<PageKind>>,
}

impl MockPages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_cards(&self, page: PageKind, cards: Vec<Arc<MockCard>>) {
        lock(&self.pages).insert(page, cards);
    }
}

#[async_trait]
impl PageInitializer for MockPages {
    async fn initialize(&self, page: PageKind) -> Result<Vec<Arc<dyn CardHandle>>> {
        lock(&self.calls).push(page);
        Ok(lock(&self.pages)
            .get(&page)
            .map(|cards| {
                cards
                    .iter()
                    .map(|c| c.clone() as Arc<dyn CardHandle>)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Player bar that records what it was told to show
pub struct MockSurface {
    models: Mutex<Vec<MasterBarModel>>,
    frames: Mutex<Vec<RgbaImage>>,
    canvas: Mutex<Option<CanvasSize>>,
}

impl MockSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            models: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
            canvas: Mutex::new(Some(CanvasSize::new(60.0, 12.0, 1.0))),
        })
    }

    pub fn remove_canvas(&self) {
        *lock(&self.canvas) = None;
    }

    pub fn last_model(&self) -> Option<MasterBarModel> {
        lock(&self.models).last().cloned()
    }

    pub fn model_count(&self) -> usize {
        lock(&self.models).len()
    }

    pub fn frame_count(&self) -> usize {
        lock(&self.frames).len()
    }
}

impl PlayerBarSurface for MockSurface {
    fn apply(&self, model: &MasterBarModel) {
        lock(&self.models).push(model.clone());
    }

    fn canvas_size(&self) -> Option<CanvasSize> {
        *lock(&self.canvas)
    }

    fn draw_waveform(&self, frame: &RgbaImage) {
        lock(&self.frames).push(frame.clone());
    }
}
