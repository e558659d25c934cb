use std::path::{Path, PathBuf};
use thiserror::Error;
use trailmark_common::config::RecorderConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./trailmark.yaml
    /// 2. ~/.trailmark/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<RecorderConfig, ConfigError> {
        let local_config = PathBuf::from("./trailmark.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".trailmark").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(RecorderConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<RecorderConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: RecorderConfig = serde_yaml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }
}
