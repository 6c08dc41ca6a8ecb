//! REST repository configuration.

use const_format::concatcp;
use serde::{Deserialize, Serialize};
use trackdeck_core::{CoreError, RepositoriesConfig};

/// Repository name used in config file
pub const REPOSITORY_NAME: &str = "rest";

/// Default table holding one row per song
pub const DEFAULT_TABLE: &str = "songs";

/// Settings for a PostgREST-style table store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestRepositoryConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Public (anon) API key sent as `apikey` and bearer token
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// Optional PostgREST ordering, e.g. `created_at.desc`
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_table() -> String {
    DEFAULT_TABLE.into()
}

const fn default_timeout() -> u64 {
    10
}

const fn default_max_retries() -> u32 {
    3
}

impl RestRepositoryConfig {
    /// Extract the REST config from the dynamic repositories config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed.
    pub fn from_repositories(repositories: &RepositoriesConfig) -> Result<Option<Self>, CoreError> {
        repositories.get(REPOSITORY_NAME)
    }

    /// Validate that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.base_url.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "repositories.rest.base_url".into(),
            });
        }
        if self.api_key.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "repositories.rest.api_key".into(),
            });
        }
        if self.table.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "repositories.rest.table".into(),
            });
        }
        Ok(())
    }

    /// Full URL selecting every row of the configured table
    #[must_use]
    pub fn select_url(&self) -> String {
        let mut url = format!(
            "{}/rest/v1/{}?select=*",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.table)
        );
        if let Some(order) = self.order.as_deref().filter(|o| !o.is_empty()) {
            url.push_str("&order=");
            url.push_str(&urlencoding::encode(order));
        }
        url
    }
}

/// Config template for the REST repository.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    "[repositories.",
    REPOSITORY_NAME,
    r#"]
# Table store project URL and public API key
base_url = ""
api_key = ""
table = ""#,
    DEFAULT_TABLE,
    r#""
# order = "created_at.desc"
timeout_secs = 10
max_retries = 3
"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use trackdeck_core::{build_config_template, TrackdeckConfig};

    #[test]
    fn test_template_round_trips() {
        let config =
            TrackdeckConfig::from_toml_str(&build_config_template(Some(&[CONFIG_TEMPLATE]))).unwrap();
        let rest = RestRepositoryConfig::from_repositories(&config.repositories)
            .unwrap()
            .unwrap();
        assert_eq!(rest.table, "songs");
        assert_eq!(rest.max_retries, 3);
        assert!(matches!(
            rest.validate(),
            Err(CoreError::ConfigMissingField { ref field }) if field == "repositories.rest.base_url"
        ));
    }

    #[test]
    fn test_select_url() {
        let config = RestRepositoryConfig {
            base_url: "https://store.example/".into(),
            api_key: "anon".into(),
            table: "songs".into(),
            order: Some("created_at.desc".into()),
            timeout_secs: 10,
            max_retries: 3,
        };
        assert!(config.validate().is_ok());
        assert_eq!(
            config.select_url(),
            "https://store.example/rest/v1/songs?select=*&order=created_at.desc"
        );
    }
}
