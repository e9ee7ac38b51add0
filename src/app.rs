use crate::error::{ClientError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const BASE_URL_ENV: &str = "TALENTLINK_API_URL";
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub conversation_poll_secs: u64,
    pub thread_poll_secs: u64,
    pub notification_poll_secs: u64,
    pub scroll_threshold_px: f64,
    pub max_attachment_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 15,
            conversation_poll_secs: 5,
            thread_poll_secs: 3,
            notification_poll_secs: 5,
            scroll_threshold_px: 80.0,
            max_attachment_bytes: MAX_ATTACHMENT_BYTES,
        }
    }
}

impl AppConfig {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "talentlink", "talentlink")
    }

    pub fn config_path() -> Option<PathBuf> {
        Some(Self::project_dirs()?.config_dir().join("client.toml"))
    }

    pub fn data_dir() -> Option<PathBuf> {
        Some(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Reads the config file, falling back to defaults when it is missing or
    /// unreadable, then applies the environment override.
    pub fn load() -> Self {
        let mut config = Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|text| Self::from_toml(&text).ok())
            .unwrap_or_default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        config
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Normalised API root without a trailing slash.
    pub fn api_base(&self) -> Result<String> {
        let normalized = crate::utils::normalize_url(&self.base_url);
        let parsed = Url::parse(&normalized)
            .map_err(|e| ClientError::Config(format!("invalid base url {}: {}", self.base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::Config(format!("invalid base url {}", self.base_url)));
        }
        Ok(parsed.as_str().trim_end_matches('/').to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn conversation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.conversation_poll_secs.max(1))
    }

    pub fn thread_poll_interval(&self) -> Duration {
        Duration::from_secs(self.thread_poll_secs.max(1))
    }

    pub fn notification_poll_interval(&self) -> Duration {
        Duration::from_secs(self.notification_poll_secs.max(1))
    }
}
