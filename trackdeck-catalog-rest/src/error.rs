use thiserror::Error;
use trackdeck_core::CoreError;

use crate::config::REPOSITORY_NAME;

/// Errors from the REST table-store repository.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The HTTP client could not be built or the request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request failed after exhausting retries.
    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// The store answered with a non-success status.
    #[error("Table store returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The repository section is missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] CoreError),

    /// A row could not be turned into a song.
    #[error("Invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// Convenience type alias for Results with `CatalogError`.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<CatalogError> for CoreError {
    fn from(error: CatalogError) -> Self {
        if let CatalogError::Config(inner) = error {
            return inner;
        }
        Self::CatalogFetchFailed {
            repository: REPOSITORY_NAME.to_string(),
            reason: error.to_string(),
        }
    }
}
