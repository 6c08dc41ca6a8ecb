use crate::catalog::FeaturedPolicy;
use crate::error::{CoreError, Result};
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::media::WidgetStyle;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackdeckConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub repositories: RepositoriesConfig,
    #[serde(default)]
    pub waveform: WaveformConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Name of the `[repositories.<name>]` table to fetch songs from
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default)]
    pub featured: FeaturedPolicy,
}

fn default_repository() -> String {
    "rest".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            featured: FeaturedPolicy::default(),
        }
    }
}

/// Per-repository settings, parsed lazily by the crate that owns them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoriesConfig(HashMap<String, toml::Value>);

impl RepositoriesConfig {
    /// Parse the `[repositories.<name>]` table as `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table exists but does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.0
            .get(name)
            .map(|value| {
                value.clone().try_into().map_err(|e: toml::de::Error| {
                    CoreError::ConfigInvalid {
                        message: format!("repositories.{name}: {e}"),
                    }
                })
            })
            .transpose()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformConfig {
    #[serde(default = "default_bar_width")]
    pub bar_width: f32,
    #[serde(default = "default_bar_gap")]
    pub bar_gap: f32,
    #[serde(default = "default_played_color")]
    pub played_color: String,
    #[serde(default = "default_unplayed_color")]
    pub unplayed_color: String,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Cards within this many pixels of the viewport get a widget
    #[serde(default = "default_lazy_margin")]
    pub lazy_margin_px: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Reveal a batch after this long even if some widgets are not ready
    #[serde(default = "default_batch_timeout")]
    pub batch_ready_timeout_ms: u64,
}

const fn default_bar_width() -> f32 {
    2.0
}

const fn default_bar_gap() -> f32 {
    1.0
}

fn default_played_color() -> String {
    "#FF5500".to_string()
}

fn default_unplayed_color() -> String {
    "#9A9A9A".to_string()
}

const fn default_height() -> u32 {
    48
}

const fn default_lazy_margin() -> f64 {
    300.0
}

const fn default_batch_size() -> usize {
    8
}

const fn default_batch_timeout() -> u64 {
    5000
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            bar_width: default_bar_width(),
            bar_gap: default_bar_gap(),
            played_color: default_played_color(),
            unplayed_color: default_unplayed_color(),
            height: default_height(),
            lazy_margin_px: default_lazy_margin(),
            batch_size: default_batch_size(),
            batch_ready_timeout_ms: default_batch_timeout(),
        }
    }
}

impl WaveformConfig {
    #[must_use]
    pub const fn batch_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_ready_timeout_ms)
    }

    /// Style options handed to each card widget
    #[must_use]
    pub fn widget_style(&self) -> WidgetStyle {
        WidgetStyle {
            wave_color: self.unplayed_color.clone(),
            progress_color: self.played_color.clone(),
            bar_width: self.bar_width,
            bar_gap: self.bar_gap,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Delay after page init before redraws resume
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Retry schedule for relinking a standalone source to its card
    #[serde(default = "default_relink_schedule")]
    pub relink_schedule_ms: Vec<u64>,
}

const fn default_settle_delay() -> u64 {
    100
}

fn default_relink_schedule() -> Vec<u64> {
    vec![50, 300, 600]
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            relink_schedule_ms: default_relink_schedule(),
        }
    }
}

impl LifecycleConfig {
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// How long to let a seeked element resume before forcing play
    #[serde(default = "default_seek_grace")]
    pub seek_resume_grace_ms: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

const fn default_seek_grace() -> u64 {
    150
}

const fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            seek_resume_grace_ms: default_seek_grace(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl PlaybackConfig {
    #[must_use]
    pub const fn seek_resume_grace(&self) -> Duration {
        Duration::from_millis(self.seek_resume_grace_ms)
    }
}

impl TrackdeckConfig {
    /// Get the config file path (~/.config/trackdeck/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location, creating a template on first run
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or
    /// `ConfigNotFound` after writing a fresh template.
    pub fn load_or_create(repository_templates: Option<&[&str]>) -> Result<Self> {
        Self::load_or_create_at(&Self::config_path(), repository_templates)
    }

    /// Load config from `path`, creating a template there if it is missing
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or
    /// `ConfigNotFound` after writing a fresh template.
    pub fn load_or_create_at(path: &Path, repository_templates: Option<&[&str]>) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, build_config_template(repository_templates))?;
            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config document
    ///
    /// # Errors
    ///
    /// Returns an error on TOML syntax errors or invalid values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.waveform.bar_width <= 0.0 || self.waveform.bar_gap < 0.0 {
            return Err(CoreError::ConfigInvalid {
                message: "waveform.bar_width must be positive and bar_gap non-negative".into(),
            });
        }
        if self.waveform.batch_size == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "waveform.batch_size must be at least 1".into(),
            });
        }
        for (field, color) in [
            ("waveform.played_color", &self.waveform.played_color),
            ("waveform.unplayed_color", &self.waveform.unplayed_color),
        ] {
            if parse_color(color).is_none() {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{field}: invalid color {color:?}"),
                });
            }
        }
        if self.catalog.repository.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "catalog.repository".into(),
            });
        }
        Ok(())
    }
}

/// Parse a hex color string (`#RRGGBB` or `#RRGGBBAA`) to an RGBA tuple
#[must_use]
pub fn parse_color(hex: &str) -> Option<(u8, u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b, 255))
        }
        8 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            let a = u8::from_str_radix(&hex[6..8], 16).ok()?;
            Some((r, g, b, a))
        }
        _ => None,
    }
}

/// Base template followed by each repository crate's fragment
#[must_use]
pub fn build_config_template(repository_templates: Option<&[&str]>) -> String {
    let mut template = CONFIG_TEMPLATE.to_string();
    for fragment in repository_templates.unwrap_or_default() {
        template.push('\n');
        template.push_str(fragment);
    }
    template
}

const CONFIG_TEMPLATE: &str = r##"# Trackdeck Configuration
# ~/.config/trackdeck/config.toml

[catalog]
# Which [repositories.<name>] table supplies the song catalog
repository = "rest"

[catalog.featured]
# "newest" (by created_at), "first" (catalog order) or "ids"
policy = "newest"
count = 6

[waveform]
bar_width = 2.0
bar_gap = 1.0
played_color = "#FF5500"
unplayed_color = "#9A9A9A"
height = 48
# Cards closer than this (pixels) to the viewport get a waveform widget
lazy_margin_px = 300.0
batch_size = 8
# Fade a batch in after this long even if a widget is still loading
batch_ready_timeout_ms = 5000

[lifecycle]
settle_delay_ms = 100
relink_schedule_ms = [50, 300, 600]

[playback]
seek_resume_grace_ms = 150
event_capacity = 64
"##;
