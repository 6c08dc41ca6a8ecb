//! Mapping from table-store rows to [`Song`] records.
//!
//! Rows come from a loosely typed store: ids may be numbers or strings, BPM
//! may be stored as text, and peak arrays are sometimes serialized into a text
//! column. Everything loose is captured as a JSON value and normalized here.

use crate::error::{CatalogError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use trackdeck_core::{Song, StemMetadata};

/// One row of the songs table
#[derive(Debug, Clone, Deserialize)]
pub struct SongRow {
    pub id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default, alias = "cover_url", alias = "cover_art")]
    pub cover_art_url: Option<String>,
    #[serde(default, alias = "musical_key")]
    pub key: Option<String>,
    #[serde(default)]
    pub bpm: Value,
    #[serde(default, alias = "audio", alias = "mp3_url")]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub stems: Value,
    #[serde(default, alias = "precomputed_peaks", alias = "peaks")]
    pub waveform_peaks: Value,
    #[serde(default, alias = "precomputed_duration", alias = "duration_seconds")]
    pub duration: Value,
    #[serde(default)]
    pub tags: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl SongRow {
    /// Convert the row at position `row` into a song.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidRow`] when the id or audio URL is
    /// missing. Malformed optional fields are dropped instead.
    pub fn into_song(self, row: usize) -> Result<Song> {
        let id = match &self.id {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(CatalogError::InvalidRow {
                    row,
                    reason: "missing id".into(),
                })
            }
        };
        let audio_url = match self.audio_url {
            Some(url) if !url.trim().is_empty() => url,
            _ => {
                return Err(CatalogError::InvalidRow {
                    row,
                    reason: format!("song {id} has no audio url"),
                })
            }
        };

        let mut song = Song::new(
            id,
            self.title.unwrap_or_default(),
            self.artist.unwrap_or_default(),
            audio_url,
        )
        .with_stems(StemMetadata::from_raw(self.stems));

        song.cover_art_url = self.cover_art_url.filter(|url| !url.is_empty());
        song.key = self.key.filter(|key| !key.trim().is_empty());
        song.bpm = parse_bpm(&self.bpm);
        song.tags = parse_tags(&self.tags);
        song.created_at = self.created_at;

        if let (Some(peaks), Some(duration)) =
            (parse_peaks(&self.waveform_peaks), as_f64(&self.duration))
        {
            song = song.with_precomputed_waveform(peaks, duration);
        }
        Ok(song)
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_bpm(value: &Value) -> Option<u32> {
    as_f64(value)
        .filter(|bpm| *bpm > 0.0 && *bpm < f64::from(u16::MAX))
        .map(|bpm| bpm.round() as u32)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_peaks(value: &Value) -> Option<Vec<f32>> {
    let parsed;
    let array = match value {
        Value::Array(items) => items,
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text).ok()?;
            parsed.as_array()?
        }
        _ => return None,
    };
    let peaks: Vec<f32> = array
        .iter()
        .filter_map(Value::as_f64)
        .filter(|p| p.is_finite())
        .map(|p| p as f32)
        .collect();
    (!peaks.is_empty()).then_some(peaks)
}

fn parse_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}
