use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::client::MAX_PAGE_SIZE;
use crate::error::{Result, TriageError};
use crate::models::LabelNaming;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Message ids requested per list call (1-500)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Pages to follow; 0 follows every page token
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Metadata fetches in flight at once; 1 keeps the run fully serial
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_concurrent_requests: default_max_concurrent(),
            progress_interval: default_progress_interval(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LabelConfig {
    #[serde(default)]
    pub naming: LabelNaming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Exact answer that unlocks the move step
    #[serde(default = "default_confirm_word")]
    pub confirm_word: String,
    #[serde(default = "default_preview_samples")]
    pub preview_samples: usize,
    #[serde(default = "default_subject_width")]
    pub subject_width: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            confirm_word: default_confirm_word(),
            preview_samples: default_preview_samples(),
            subject_width: default_subject_width(),
        }
    }
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_max_pages() -> u32 {
    1
}

fn default_max_concurrent() -> usize {
    1
}

fn default_progress_interval() -> usize {
    50
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_confirm_word() -> String {
    "TAK".to_string()
}

fn default_preview_samples() -> usize {
    5
}

fn default_subject_width() -> usize {
    60
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TriageError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scan.page_size == 0 || self.scan.page_size > MAX_PAGE_SIZE {
            return Err(TriageError::ConfigError(format!(
                "scan.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.scan.max_concurrent_requests == 0 {
            return Err(TriageError::ConfigError(
                "scan.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.scan.max_concurrent_requests > 50 {
            return Err(TriageError::ConfigError(
                "scan.max_concurrent_requests cannot exceed 50 (to stay under Gmail API rate limits of 250 units/sec)".to_string(),
            ));
        }

        if self.scan.progress_interval == 0 {
            return Err(TriageError::ConfigError(
                "scan.progress_interval must be greater than 0".to_string(),
            ));
        }

        if self.scan.request_timeout_secs == 0 {
            return Err(TriageError::ConfigError(
                "scan.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.execution.confirm_word.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "execution.confirm_word cannot be empty".to_string(),
            ));
        }
        if self.execution.confirm_word.trim() != self.execution.confirm_word {
            return Err(TriageError::ConfigError(
                "execution.confirm_word cannot start or end with whitespace".to_string(),
            ));
        }

        if self.execution.subject_width == 0 {
            return Err(TriageError::ConfigError(
                "execution.subject_width must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
