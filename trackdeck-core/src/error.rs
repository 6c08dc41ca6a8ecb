use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please edit it with your catalog settings and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Catalog errors
    #[error("Song repository {repository} failed: {reason}")]
    CatalogFetchFailed { repository: String, reason: String },

    #[error("Song not found: {id}")]
    SongNotFound { id: String },

    // Media errors
    #[error("Playback of {song_id} ({url}) failed: {reason}")]
    Playback {
        song_id: String,
        url: String,
        reason: String,
    },

    #[error("Failed to decode waveform for {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Media backend cannot create {what}: {reason}")]
    MediaUnavailable { what: String, reason: String },

    #[error("Failed to dispose waveform widget: {reason}")]
    WidgetDisposal { reason: String },

    #[error("Page initialization failed: {reason}")]
    PageInit { reason: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
