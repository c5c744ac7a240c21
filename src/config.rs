use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the search client and favorites store
#[derive(Debug, Deserialize, Clone)]
pub struct RecipleaseConfig {
    /// Application id issued by the recipe API
    pub app_id: String,
    /// Application key issued by the recipe API
    pub app_key: String,
    /// Search endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Results requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Maximum number of cached pages; unbounded when absent
    #[serde(default)]
    pub cache_capacity: Option<usize>,
    /// Location of the favorites document
    #[serde(default = "default_favorites_path")]
    pub favorites_path: PathBuf,
}

pub const DEFAULT_BASE_URL: &str = "https://api.edamam.com/search";
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// Default value functions
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_timeout() -> u64 {
    30
}

fn default_favorites_path() -> PathBuf {
    PathBuf::from("favorites.json")
}

impl RecipleaseConfig {
    /// Build a configuration from credentials, using defaults for everything else
    pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        RecipleaseConfig {
            app_id: app_id.into(),
            app_key: app_key.into(),
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout: default_timeout(),
            cache_capacity: None,
            favorites_path: default_favorites_path(),
        }
    }

    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPLEASE__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPLEASE__APP_KEY
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Reject blank credentials and a zero page size
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::Message("app_id must not be empty".to_string()));
        }
        if self.app_key.trim().is_empty() {
            return Err(ConfigError::Message("app_key must not be empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Message(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from file and environment variables
///
/// See [`RecipleaseConfig::load`] for the lookup order.
pub fn load_config() -> Result<RecipleaseConfig, ConfigError> {
    load_config_from("config")
}

fn load_config_from(file_name: &str) -> Result<RecipleaseConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name(file_name).required(false))
        .add_source(
            Environment::with_prefix("RECIPLEASE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: RecipleaseConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        assert_eq!(default_base_url(), "https://api.edamam.com/search");
        assert_eq!(default_page_size(), 20);
        assert_eq!(default_timeout(), 30);
        assert_eq!(default_favorites_path(), PathBuf::from("favorites.json"));
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = RecipleaseConfig::new("id", "key");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.cache_capacity.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_credentials() {
        assert!(RecipleaseConfig::new("  ", "key").validate().is_err());
        assert!(RecipleaseConfig::new("id", "").validate().is_err());

        let mut config = RecipleaseConfig::new("id", "key");
        config.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reciplease.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "app_id = \"file-id\"\napp_key = \"file-key\"\npage_size = 10\ncache_capacity = 64"
        )
        .unwrap();

        let config = load_config_from(path.with_extension("").to_str().unwrap()).unwrap();
        assert_eq!(config.app_id, "file-id");
        assert_eq!(config.app_key, "file-key");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.cache_capacity, Some(64));
        assert_eq!(config.base_url, default_base_url());
    }

    #[test]
    fn test_load_without_credentials_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        // No file and (normally) no RECIPLEASE__ variables: credentials are required
        if std::env::var("RECIPLEASE__APP_ID").is_err() {
            assert!(load_config_from(missing.to_str().unwrap()).is_err());
        }
    }
}
