pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod favorites;
pub mod filter;
pub mod keyboard;
pub mod lifecycle;
pub mod master_view;
pub mod media;
pub mod mounter;
pub mod navigation;
pub mod paths;
pub mod player;
pub mod registry;
pub mod renderer;
pub mod session;
pub mod song;
pub mod time;

#[cfg(test)]
mod testing;

pub use bridge::ViewBridge;
pub use catalog::{Catalog, FeaturedPolicy, SongRepository};
pub use config::{
    build_config_template, parse_color, CatalogConfig, LifecycleConfig, PlaybackConfig,
    RepositoriesConfig, TrackdeckConfig, WaveformConfig,
};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use error::{CoreError, Result};
pub use events::{EventBus, PlayerEvent, DEFAULT_EVENT_CAPACITY};
pub use favorites::Favorites;
pub use filter::{Filter, FilterGroup, FilterState, FilterValue, SortOrder};
pub use keyboard::{command_for_key, KeyCommand};
pub use lifecycle::{LifecycleCoordinator, PageInitializer, PageKind, RouteHook};
pub use master_view::{MasterBarModel, MasterPlayerView, PlayIcon, PlayerBarSurface};
pub use media::{
    AudioElement, AudioEvent, CardHandle, DecodedAudio, MediaBackend, WaveformWidget,
    WidgetEvent, WidgetId, WidgetStyle,
};
pub use mounter::{MountReport, WaveformMounter};
pub use navigation::{
    target_index, Direction, NavigationController, NavigationMode, NavigationOutcome,
    NavigationTrigger,
};
pub use paths::{config_dir, config_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use player::Player;
pub use registry::{RegistryEntry, WaveformRegistry};
pub use renderer::{bar_amplitudes, seek_fraction, CanvasSize, RendererStyle, WaveformCanvasRenderer};
pub use session::{
    ActivationToken, ActiveSource, PhaseTrigger, PlaybackPhase, PlaybackSession,
    SessionSnapshot, SourceKind, SourceOrigin,
};
pub use song::{Song, SongId, Stem, StemMetadata};
pub use time::DurationExt;
