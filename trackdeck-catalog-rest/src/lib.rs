//! Song repository backed by a PostgREST-style table store.

mod config;
mod error;
mod row;

pub use config::{RestRepositoryConfig, CONFIG_TEMPLATE as REST_CONFIG_TEMPLATE, REPOSITORY_NAME};
pub use error::{CatalogError, Result};
pub use row::SongRow;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;
use tracing::{debug, info, warn};
use trackdeck_core::{CoreError, Song, SongRepository, TrackdeckConfig};

const LOG_TARGET: &str = "trackdeck::catalog::rest";

/// Remote table store holding one row per song
pub struct RestSongRepository {
    client: ClientWithMiddleware,
    url: String,
}

impl RestSongRepository {
    /// Build a repository with a retrying HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is incomplete or the HTTP client
    /// cannot be created.
    pub fn new(config: &RestRepositoryConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("apikey", header_value(&config.api_key)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", config.api_key))?,
        );

        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("Trackdeck/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            url: config.select_url(),
        })
    }

    /// Build from the `[repositories.rest]` section, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the section exists but is invalid.
    pub fn from_config(config: &TrackdeckConfig) -> Result<Option<Self>> {
        RestRepositoryConfig::from_repositories(&config.repositories)?
            .map(|rest| Self::new(&rest))
            .transpose()
    }

    /// URL queried by [`SongRepository::fetch_all`]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_rows(&self) -> Result<Vec<Song>> {
        debug!(target: LOG_TARGET, "GET {}", self.url);
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(target: LOG_TARGET, "Table store returned status: {}", status);
            return Err(CatalogError::Status {
                status,
                url: self.url.clone(),
            });
        }
        let body = response.text().await?;
        parse_songs(&body)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        CatalogError::Config(CoreError::ConfigInvalid {
            message: "repositories.rest.api_key contains invalid header characters".into(),
        })
    })
}

/// Parse a JSON array of rows, skipping rows that cannot become songs.
///
/// # Errors
///
/// Returns an error if the body is not a JSON array of objects.
pub fn parse_songs(body: &str) -> Result<Vec<Song>> {
    let rows: Vec<SongRow> = serde_json::from_str(body)?;
    let total = rows.len();
    let songs: Vec<Song> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match row.into_song(index) {
            Ok(song) => Some(song),
            Err(e) => {
                warn!(target: LOG_TARGET, "Skipping row: {}", e);
                None
            }
        })
        .collect();
    if songs.len() < total {
        info!(
            target: LOG_TARGET,
            "Loaded {} of {} rows", songs.len(), total
        );
    }
    Ok(songs)
}

#[async_trait]
impl SongRepository for RestSongRepository {
    fn name(&self) -> &'static str {
        REPOSITORY_NAME
    }

    async fn fetch_all(&self) -> std::result::Result<Vec<Song>, CoreError> {
        let songs = self.fetch_rows().await?;
        info!(target: LOG_TARGET, "Fetched {} songs", songs.len());
        Ok(songs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RestRepositoryConfig {
        RestRepositoryConfig {
            base_url: "https://store.example".into(),
            api_key: "anon-key".into(),
            table: "song library".into(),
            order: None,
            timeout_secs: 10,
            max_retries: 3,
        }
    }

    #[test]
    fn test_new_builds_encoded_url() {
        let repo = RestSongRepository::new(&config()).unwrap();
        assert_eq!(repo.url(), "https://store.example/rest/v1/song%20library?select=*");
        assert_eq!(repo.name(), "rest");
    }

    #[test]
    fn test_new_rejects_missing_key() {
        let mut config = config();
        config.api_key = String::new();
        let err = RestSongRepository::new(&config).err().unwrap();
        assert!(matches!(
            CoreError::from(err),
            CoreError::ConfigMissingField { ref field } if field == "repositories.rest.api_key"
        ));
    }

    #[test]
    fn test_from_config_without_section() {
        let config = TrackdeckConfig::from_toml_str("").unwrap();
        assert!(RestSongRepository::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_from_config_with_section() {
        let toml = r#"
[repositories.rest]
base_url = "https://store.example"
api_key = "anon"
order = "created_at.desc"
"#;
        let config = TrackdeckConfig::from_toml_str(toml).unwrap();
        let repo = RestSongRepository::from_config(&config).unwrap().unwrap();
        assert_eq!(
            repo.url(),
            "https://store.example/rest/v1/songs?select=*&order=created_at.desc"
        );
    }

    #[test]
    fn test_parse_songs_skips_bad_rows() {
        let body = r#"[
            {"id": 1, "title": "Alpha", "audio_url": "a.mp3"},
            {"id": 2, "title": "No audio"},
            {"id": "3", "title": "Gamma", "audio_url": "c.mp3"}
        ]"#;
        let songs = parse_songs(body).unwrap();
        let ids: Vec<&str> = songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_parse_songs_rejects_non_array() {
        let err = parse_songs(r#"{"message": "JWT expired"}"#).unwrap_err();
        assert!(matches!(err, CatalogError::Json(_)));
        assert!(matches!(
            CoreError::from(err),
            CoreError::CatalogFetchFailed { ref repository, .. } if repository == "rest"
        ));
    }
}
