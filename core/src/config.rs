use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::roster::DEFAULT_FETCH_WORKERS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Process configuration, loaded from `pilotdeck.toml`. Every field has a
/// default so a missing file behaves like an empty one; unknown keys are
/// rejected to catch typos early.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Base URL of the game's data API.
    pub api_base_url: String,
    /// OAuth token endpoint of the identity provider.
    pub token_url: String,
    /// OAuth client id issued for this application.
    pub client_id: String,
    /// TTL for cached character endpoints, in seconds.
    pub character_ttl_secs: u64,
    /// Interval of the background cache sweep, in seconds.
    pub sweep_interval_secs: u64,
    /// Concurrent character fetches during a roster pass.
    pub fetch_workers: usize,
    /// Static skill reference dataset.
    pub catalog_path: PathBuf,
    /// Directory holding `*.plan` files.
    pub plans_dir: PathBuf,
    /// Optional cache snapshot, loaded at startup and written on demand.
    pub cache_snapshot_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://esi.evetech.net/latest".to_string(),
            token_url: "https://login.eveonline.com/v2/oauth/token".to_string(),
            client_id: String::new(),
            character_ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            catalog_path: PathBuf::from("data/skills.json"),
            plans_dir: PathBuf::from("plans"),
            cache_snapshot_path: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Loads `path` if it exists, otherwise the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn character_ttl(&self) -> Duration {
        Duration::from_secs(self.character_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("pilotdeck.toml");
        std::fs::write(&path, "").expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(config.character_ttl(), Duration::from_secs(1800));
    }

    #[test]
    fn overrides_apply_and_the_rest_default() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("pilotdeck.toml");
        std::fs::write(
            &path,
            r#"
                api_base_url = "http://localhost:8080/v1"
                fetch_workers = 8
                cache_snapshot_path = "cache.json"
            "#,
        )
        .expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.api_base_url, "http://localhost:8080/v1");
        assert_eq!(config.fetch_workers, 8);
        assert_eq!(config.cache_snapshot_path, Some(PathBuf::from("cache.json")));
        assert_eq!(config.sweep_interval_secs, 60);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("pilotdeck.toml");
        std::fs::write(&path, "api_base_uri = \"typo\"\n").expect("write");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = Config::load_or_default(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config, Config::default());
    }
}
