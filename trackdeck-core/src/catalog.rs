//! Song repository contract and the cached in-memory catalog.

use crate::error::{CoreError, Result};
use crate::song::{Song, SongId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

const LOG_TARGET: &str = "trackdeck::catalog";

/// Remote source of song records
#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Get the repository name
    fn name(&self) -> &'static str;

    /// Fetch every song, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or returns malformed data.
    async fn fetch_all(&self) -> Result<Vec<Song>>;
}

/// Which songs count as "featured"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FeaturedPolicy {
    /// Most recently created songs, newest first
    Newest { count: usize },
    /// The first songs in catalog order
    First { count: usize },
    /// An explicit list of ids, in the given order
    Ids { ids: Vec<SongId> },
}

impl Default for FeaturedPolicy {
    fn default() -> Self {
        Self::Newest { count: 6 }
    }
}

impl FeaturedPolicy {
    /// Apply the policy to a catalog
    #[must_use]
    pub fn select(&self, songs: &[Song]) -> Vec<Song> {
        match self {
            Self::Newest { count } => {
                let mut newest: Vec<&Song> = songs.iter().collect();
                // Stable sort keeps catalog order among undated songs
                newest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                newest.into_iter().take(*count).cloned().collect()
            }
            Self::First { count } => songs.iter().take(*count).cloned().collect(),
            Self::Ids { ids } => ids
                .iter()
                .filter_map(|id| songs.iter().find(|s| &s.id == id))
                .cloned()
                .collect(),
        }
    }
}

/// Catalog fetched once per session.
///
/// The first successful fetch is cached; concurrent callers share the
/// in-flight request. A failed fetch is logged, yields an empty catalog, and
/// is retried by the next caller.
pub struct Catalog {
    repository: Arc<dyn SongRepository>,
    songs: OnceCell<Arc<Vec<Song>>>,
}

impl Catalog {
    #[must_use]
    pub fn new(repository: Arc<dyn SongRepository>) -> Self {
        Self {
            repository,
            songs: OnceCell::new(),
        }
    }

    /// All songs, fetching on first use
    pub async fn songs(&self) -> Arc<Vec<Song>> {
        let result = self
            .songs
            .get_or_try_init(|| async {
                info!(
                    target: LOG_TARGET,
                    "Fetching catalog from {}",
                    self.repository.name()
                );
                let songs = self.repository.fetch_all().await?;
                info!(target: LOG_TARGET, "Catalog loaded: {} songs", songs.len());
                Ok::<_, CoreError>(Arc::new(songs))
            })
            .await;

        match result {
            Ok(songs) => songs.clone(),
            Err(e) => {
                error!(
                    target: LOG_TARGET,
                    "Failed to fetch catalog from {}: {}",
                    self.repository.name(),
                    e
                );
                Arc::new(Vec::new())
            }
        }
    }

    /// Songs if the catalog has already been fetched
    #[must_use]
    pub fn cached(&self) -> Option<Arc<Vec<Song>>> {
        self.songs.get().cloned()
    }

    pub async fn find(&self, id: &SongId) -> Option<Song> {
        self.songs().await.iter().find(|s| &s.id == id).cloned()
    }

    /// Like [`Catalog::find`], for callers that report the miss.
    ///
    /// # Errors
    ///
    /// Returns `SongNotFound` if no song has `id`.
    pub async fn require(&self, id: &SongId) -> Result<Song> {
        self.find(id).await.ok_or_else(|| CoreError::SongNotFound {
            id: id.to_string(),
        })
    }

    pub async fn featured(&self, policy: &FeaturedPolicy) -> Vec<Song> {
        policy.select(&self.songs().await)
    }
}
