//! Projection of the playback session onto the persistent player bar.

use crate::renderer::{CanvasSize, WaveformCanvasRenderer};
use crate::session::SessionSnapshot;
use crate::song::Stem;
use crate::time::DurationExt;
use image::RgbaImage;
use tracing::{debug, warn};

const LOG_TARGET: &str = "trackdeck::master_view";

/// Which glyph the play button shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayIcon {
    /// Nothing is playing; pressing the button starts playback
    #[default]
    Play,
    Pause,
}

/// Everything the player bar displays
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MasterBarModel {
    /// When false the bar is hidden and its layout space reclaimed
    pub visible: bool,
    pub title: String,
    pub artist: String,
    pub cover_art_url: Option<String>,
    pub key_text: String,
    pub bpm_text: String,
    pub duration_text: String,
    pub elapsed_text: String,
    /// `None` hides the stems affordance
    pub stems: Option<Vec<Stem>>,
    pub play_icon: PlayIcon,
    pub is_favorite: bool,
    pub progress: f64,
}

/// The host's player bar
pub trait PlayerBarSurface: Send + Sync {
    fn apply(&self, model: &MasterBarModel);

    /// Waveform canvas size, or `None` if the canvas is not in the document
    fn canvas_size(&self) -> Option<CanvasSize>;

    fn draw_waveform(&self, frame: &RgbaImage);
}

/// Stateless projection from session snapshots to bar models and frames
#[derive(Debug, Clone, Default)]
pub struct MasterPlayerView {
    renderer: WaveformCanvasRenderer,
}

impl MasterPlayerView {
    #[must_use]
    pub const fn new(renderer: WaveformCanvasRenderer) -> Self {
        Self { renderer }
    }

    /// Build the bar model for `snapshot`
    #[must_use]
    pub fn project(snapshot: &SessionSnapshot, is_favorite: bool) -> MasterBarModel {
        let Some(song) = &snapshot.song else {
            return MasterBarModel {
                visible: snapshot.is_visible(),
                ..MasterBarModel::default()
            };
        };

        let stems = match song.stems.parse() {
            Ok(stems) if stems.is_empty() => None,
            Ok(stems) => Some(stems),
            Err(e) => {
                warn!(
                    target: LOG_TARGET,
                    "Hiding stems for {}: malformed stem metadata: {}", song.id, e
                );
                None
            }
        };

        MasterBarModel {
            visible: snapshot.is_visible(),
            title: song.title.clone(),
            artist: song.artist.clone(),
            cover_art_url: song.cover_art_url.clone(),
            key_text: song.key.clone().unwrap_or_else(|| "-".to_string()),
            bpm_text: song
                .bpm
                .map_or_else(|| "-".to_string(), |bpm| format!("{bpm} BPM")),
            duration_text: snapshot.duration.clock_text(),
            elapsed_text: snapshot.position.clock_text(),
            stems,
            play_icon: if snapshot.is_playing() {
                PlayIcon::Pause
            } else {
                PlayIcon::Play
            },
            is_favorite,
            progress: snapshot.progress(),
        }
    }

    /// Render the waveform frame for `snapshot`, or `None` while a route
    /// transition is in flight. Missing peaks draw the placeholder.
    #[must_use]
    pub fn frame(&self, snapshot: &SessionSnapshot, size: CanvasSize) -> Option<RgbaImage> {
        if snapshot.is_transitioning {
            debug!(target: LOG_TARGET, "Skipping waveform redraw during transition");
            return None;
        }
        let peaks = snapshot.peaks.as_deref().map_or(&[][..], Vec::as_slice);
        Some(self.renderer.render(peaks, snapshot.progress(), size))
    }

    /// Apply the model and, if the canvas exists, a fresh frame
    pub fn refresh(&self, surface: &dyn PlayerBarSurface, snapshot: &SessionSnapshot, is_favorite: bool) {
        surface.apply(&Self::project(snapshot, is_favorite));
        self.redraw(surface, snapshot);
    }

    /// Redraw only the waveform
    pub fn redraw(&self, surface: &dyn PlayerBarSurface, snapshot: &SessionSnapshot) {
        let Some(size) = surface.canvas_size() else {
            debug!(target: LOG_TARGET, "No waveform canvas on this page");
            return;
        };
        if let Some(frame) = self.frame(snapshot, size) {
            surface.draw_waveform(&frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{PlaybackPhase, SourceKind};
    use crate::song::{Song, StemMetadata};
    use std::sync::Arc;
    use std::time::Duration;

    fn snapshot(song: Song) -> SessionSnapshot {
        SessionSnapshot {
            song: Some(song),
            source: Some(SourceKind::Standalone),
            phase: PlaybackPhase::Playing,
            position: Duration::from_secs(65),
            duration: Duration::from_secs(130),
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn test_project_fills_text_fields() {
        let song = Song::new("a", "Alpha", "Nova", "a.mp3")
            .with_key("F#m")
            .with_bpm(128)
            .with_cover_art("a.jpg");
        let model = MasterPlayerView::project(&snapshot(song), true);

        assert!(model.visible);
        assert_eq!(model.title, "Alpha");
        assert_eq!(model.key_text, "F#m");
        assert_eq!(model.bpm_text, "128 BPM");
        assert_eq!(model.elapsed_text, "1:05");
        assert_eq!(model.duration_text, "2:10");
        assert_eq!(model.play_icon, PlayIcon::Pause);
        assert!(model.is_favorite);
        assert!((model.progress - 0.5).abs() < 1e-9);
        assert_eq!(model.stems, None);
    }

    #[test]
    fn test_invalid_stem_json_hides_stems() {
        let song = Song::new("a", "Alpha", "Nova", "a.mp3")
            .with_stems(StemMetadata::from_raw(serde_json::Value::String("{not json".into())));
        let model = MasterPlayerView::project(&snapshot(song), false);
        assert!(model.visible);
        assert_eq!(model.stems, None);
    }

    #[test]
    fn test_stem_list_from_text_column() {
        let song = Song::new("a", "Alpha", "Nova", "a.mp3").with_stems(StemMetadata::from_raw(
            serde_json::Value::String(r#"[{"name":"drums","url":"d.wav"}]"#.into()),
        ));
        let model = MasterPlayerView::project(&snapshot(song), false);
        assert_eq!(model.stems.unwrap()[0].name, "drums");
    }

    #[test]
    fn test_idle_session_hides_bar() {
        let model = MasterPlayerView::project(&SessionSnapshot::default(), false);
        assert!(!model.visible);
        assert_eq!(model.play_icon, PlayIcon::Play);
    }

    #[test]
    fn test_no_frame_during_transition() {
        let view = MasterPlayerView::default();
        let mut snap = snapshot(Song::new("a", "A", "X", "a.mp3"));
        snap.peaks = Some(Arc::new(vec![0.5; 16]));
        let size = CanvasSize::new(40.0, 10.0, 1.0);

        assert!(view.frame(&snap, size).is_some());
        snap.is_transitioning = true;
        assert!(view.frame(&snap, size).is_none());
    }
}
