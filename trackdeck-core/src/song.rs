//! Song records as held in the in-memory catalog.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, unique song identifier assigned by the remote table store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(String);

impl SongId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SongId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SongId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single downloadable stem (e.g. "drums", "vocals").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stem {
    pub name: String,
    pub url: String,
}

/// Stem metadata exactly as the table store delivered it.
///
/// The store holds either a JSON array of `{name, url}` objects or a JSON
/// document serialized into a text column, so parsing is deferred until the
/// player bar needs the list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StemMetadata(serde_json::Value);

impl StemMetadata {
    /// Wrap a raw value from the table store.
    #[must_use]
    pub const fn from_raw(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Build metadata from an already-typed stem list.
    #[must_use]
    pub fn from_stems(stems: &[Stem]) -> Self {
        Self(serde_json::Value::Array(
            stems
                .iter()
                .map(|s| serde_json::json!({ "name": s.name, "url": s.url }))
                .collect(),
        ))
    }

    /// Parse into a stem list.
    ///
    /// # Errors
    ///
    /// Returns an error if the value (or the JSON text it contains) is not an
    /// array of `{name, url}` objects.
    pub fn parse(&self) -> Result<Vec<Stem>> {
        match &self.0 {
            serde_json::Value::Null => Ok(Vec::new()),
            serde_json::Value::String(text) if text.trim().is_empty() => Ok(Vec::new()),
            serde_json::Value::String(text) => Ok(serde_json::from_str(text)?),
            other => Ok(Vec::<Stem>::deserialize(other)?),
        }
    }
}

/// Immutable song record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub cover_art_url: Option<String>,
    /// Musical key, e.g. "F#m"
    pub key: Option<String>,
    pub bpm: Option<u32>,
    pub audio_url: String,
    #[serde(default)]
    pub stems: StemMetadata,
    /// Normalized amplitude per sample, computed offline
    #[serde(default)]
    pub precomputed_peaks: Option<Vec<f32>>,
    /// Duration in seconds matching `precomputed_peaks`
    #[serde(default)]
    pub precomputed_duration: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Song {
    /// Create a song with the required fields; optional fields start empty.
    pub fn new(
        id: impl Into<SongId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            cover_art_url: None,
            key: None,
            bpm: None,
            audio_url: audio_url.into(),
            stems: StemMetadata::default(),
            precomputed_peaks: None,
            precomputed_duration: None,
            tags: Vec::new(),
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_cover_art(mut self, url: impl Into<String>) -> Self {
        self.cover_art_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub const fn with_bpm(mut self, bpm: u32) -> Self {
        self.bpm = Some(bpm);
        self
    }

    #[must_use]
    pub fn with_stems(mut self, stems: StemMetadata) -> Self {
        self.stems = stems;
        self
    }

    #[must_use]
    pub fn with_precomputed_waveform(mut self, peaks: Vec<f32>, duration_secs: f64) -> Self {
        self.precomputed_peaks = Some(peaks);
        self.precomputed_duration = Some(duration_secs);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Precomputed peaks and duration, only when both are present and usable.
    ///
    /// Widgets given these skip decoding the audio file entirely.
    #[must_use]
    pub fn instant_waveform(&self) -> Option<(&[f32], f64)> {
        match (&self.precomputed_peaks, self.precomputed_duration) {
            (Some(peaks), Some(duration))
                if !peaks.is_empty() && duration.is_finite() && duration > 0.0 =>
            {
                Some((peaks.as_slice(), duration))
            }
            _ => None,
        }
    }

    /// Case-insensitive keyword match against title, artist, key and tags.
    ///
    /// `keyword` must already be lowercase.
    #[must_use]
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        self.title.to_lowercase().contains(keyword)
            || self.artist.to_lowercase().contains(keyword)
            || self
                .key
                .as_ref()
                .is_some_and(|k| k.to_lowercase().contains(keyword))
            || self.tags.iter().any(|t| t.to_lowercase().contains(keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stems_from_array() {
        let meta = StemMetadata::from_raw(serde_json::json!([
            { "name": "drums", "url": "https://cdn.example/drums.wav" },
            { "name": "bass", "url": "https://cdn.example/bass.wav" }
        ]));
        let stems = meta.parse().unwrap();
        assert_eq!(stems.len(), 2);
        assert_eq!(stems[0].name, "drums");
        assert_eq!(stems[1].url, "https://cdn.example/bass.wav");
    }

    #[test]
    fn test_stems_from_json_text() {
        let meta = StemMetadata::from_raw(serde_json::Value::String(
            r#"[{"name":"vocals","url":"v.wav"}]"#.to_string(),
        ));
        let stems = meta.parse().unwrap();
        assert_eq!(stems, vec![Stem { name: "vocals".into(), url: "v.wav".into() }]);
    }

    #[test]
    fn test_stems_invalid_json_text_is_error() {
        let meta = StemMetadata::from_raw(serde_json::Value::String("{not json".to_string()));
        assert!(meta.parse().is_err());
    }

    #[test]
    fn test_stems_missing_is_empty() {
        assert!(StemMetadata::default().parse().unwrap().is_empty());
        let blank = StemMetadata::from_raw(serde_json::Value::String("   ".into()));
        assert!(blank.parse().unwrap().is_empty());
    }

    #[test]
    fn test_instant_waveform_requires_both_fields() {
        let song = Song::new("a", "Title", "Artist", "a.mp3");
        assert!(song.instant_waveform().is_none());

        let song = song.with_precomputed_waveform(vec![0.1, 0.5], 12.0);
        let (peaks, duration) = song.instant_waveform().unwrap();
        assert_eq!(peaks.len(), 2);
        assert!((duration - 12.0).abs() < f64::EPSILON);

        let mut broken = song;
        broken.precomputed_duration = Some(f64::NAN);
        assert!(broken.instant_waveform().is_none());
    }

    #[test]
    fn test_matches_keyword() {
        let song = Song::new("a", "Midnight Drive", "Nova", "a.mp3")
            .with_key("F#m")
            .with_tag("Synthwave");
        assert!(song.matches_keyword("midnight"));
        assert!(song.matches_keyword("nova"));
        assert!(song.matches_keyword("f#m"));
        assert!(song.matches_keyword("synth"));
        assert!(!song.matches_keyword("jazz"));
    }
}
