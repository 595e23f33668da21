//! # Configuration
//!
//! Gridrealm reads a single TOML file with three sections:
//!
//! - `[world]` - world constants ([`WorldRules`]): grid size, monster cap,
//!   regeneration threshold, town center, quest floor and sweep interval
//! - [`StorageConfig`] - where the sled database and the monster seed file live
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gridrealm::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("World size: {}", config.world.world_size);
//!     Ok(())
//! }
//! ```
//!
//! ## File Format
//!
//! ```toml
//! [world]
//! world_size = 50
//! max_monsters = 300
//! regen_threshold = 10
//! town_center_x = 10
//! town_center_y = 10
//!
//! [storage]
//! data_dir = "./data"
//! seed_file = "./data/seeds/monsters.json"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every key has a default, so a partial file (or an empty section) is valid.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::world::WorldRules;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub world: WorldRules,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Overrides `<data_dir>/world.db`.
    #[serde(default)]
    pub db_path: Option<String>,
    /// JSON monster catalog loaded by `gridrealm init`.
    #[serde(default = "default_seed_file")]
    pub seed_file: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_seed_file() -> String {
    "./data/seeds/monsters.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_path: None,
            seed_file: default_seed_file(),
        }
    }
}

impl StorageConfig {
    /// Location of the sled database.
    pub fn db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.data_dir).join("world.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.world
            .validate()
            .map_err(|e| anyhow!("Invalid [world] section: {}", e))?;
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if log_level_filter(&self.logging.level).is_none() {
            return Err(anyhow!("Unknown logging.level '{}'", self.logging.level));
        }
        Ok(())
    }
}

/// Parse a level name as accepted in `[logging] level`.
pub fn log_level_filter(level: &str) -> Option<log::LevelFilter> {
    level.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_canonical_world() {
        let config = Config::default();
        assert_eq!(config.world.world_size, 50);
        assert_eq!(config.world.max_monsters, 300);
        assert_eq!(config.storage.db_path(), PathBuf::from("./data").join("world.db"));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [world]
            max_monsters = 40

            [storage]
            db_path = "/tmp/elsewhere.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.world.max_monsters, 40);
        assert_eq!(config.world.regen_threshold, 10);
        assert_eq!(config.storage.db_path(), PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.storage.seed_file, "./data/seeds/monsters.json");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.logging.level = "shouty".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.world.world_size = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn default_file_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        let path = path.to_str().expect("utf8 path");
        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = Config::load("/definitely/not/here.toml").await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
