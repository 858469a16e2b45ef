//! Client configuration.
//!
//! Loaded from defaults, then `<config_dir>/users-client/config.json`, then
//! the `USERS_API_BASE_URL` environment variable, each layer overriding the
//! previous one.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::FileStore;

pub const BASE_URL_ENV: &str = "USERS_API_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    pub timeout_secs: u64,
    /// Where the session token is persisted. `None` keeps it in memory.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
            session_file: FileStore::default_path(),
        }
    }
}

impl ClientConfig {
    pub fn load() -> Self {
        let mut config = Self::config_path()
            .and_then(|path| Self::from_file(&path))
            .unwrap_or_default();
        config.apply_env(std::env::var(BASE_URL_ENV).ok());
        config
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("users-client").join("config.json"))
    }

    /// `None` when the file is missing or unreadable.
    pub fn from_file(path: &std::path::Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read client config");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed client config");
                None
            }
        }
    }

    fn apply_env(&mut self, base_url: Option<String>) {
        if let Some(base_url) = base_url.filter(|s| !s.trim().is_empty()) {
            self.base_url = base_url;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
