// Nitpicker - Gallery Browser & Downloader for Mobile
// Copyright (C) 2025 Nitpicker contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Core configuration
//!
//! The host app hands us a JSON document (or nothing, in which case the
//! defaults below are used). Paths are always supplied by the host because
//! on Android the downloads directory lives under `getExternalFilesDir()`.

use crate::error::{NitpickerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default user agent for page fetches and transfers
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Mobile Safari/537.36";

/// Configuration for the download core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Base downloads directory; album folders are created below it
    pub downloads_root: PathBuf,

    /// SQLite database holding the task table
    pub database_path: PathBuf,

    /// Concurrent source-page resolutions for image files
    pub image_resolve_permits: usize,

    /// Concurrent image transfers
    pub image_download_workers: usize,

    /// Minimum delay between two progress writes for one task
    pub progress_interval_ms: u64,

    /// Bytes written per chunk
    pub chunk_size: usize,

    /// Whole-request timeout for page fetches
    pub request_timeout_secs: u64,

    /// Connect timeout for every request
    pub connect_timeout_secs: u64,

    /// Longest silence tolerated while waiting for response headers or the
    /// next body chunk of a transfer
    pub idle_timeout_secs: u64,

    /// User-Agent header
    pub user_agent: String,

    /// Host behind `https://get.<host>/file/<n>` download pages
    pub download_page_host: String,

    /// Album search site
    pub album_site_base: String,

    /// Site serving individual file pages
    pub file_site_base: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            downloads_root: PathBuf::from("./Downloads"),
            database_path: PathBuf::from("./nitpicker.db"),
            image_resolve_permits: 5,
            image_download_workers: 5,
            progress_interval_ms: 300,
            chunk_size: 8 * 1024,
            request_timeout_secs: 60,
            connect_timeout_secs: 15,
            idle_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            download_page_host: "bunkrr.su".to_string(),
            album_site_base: "https://bunkr-albums.io".to_string(),
            file_site_base: "https://bunkr.cr".to_string(),
        }
    }
}

impl CoreConfig {
    /// Config rooted in a single app data directory
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            downloads_root: data_dir.join("Downloads"),
            database_path: data_dir.join("nitpicker.db"),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await.map_err(|e| {
            NitpickerError::FileIoError(format!(
                "Failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }

    /// Load configuration, falling back to defaults when the file is missing
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if tokio::fs::try_exists(path.as_ref()).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.image_resolve_permits == 0 {
            return Err(NitpickerError::InvalidConfiguration(
                "image_resolve_permits must be at least 1".to_string(),
            ));
        }
        if self.image_download_workers == 0 {
            return Err(NitpickerError::InvalidConfiguration(
                "image_download_workers must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(NitpickerError::InvalidConfiguration(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err(NitpickerError::InvalidConfiguration(
                "idle_timeout_secs must be positive".to_string(),
            ));
        }
        if self.download_page_host.trim().is_empty() {
            return Err(NitpickerError::InvalidConfiguration(
                "download_page_host is empty".to_string(),
            ));
        }
        if self.album_site_base.trim().is_empty() || self.file_site_base.trim().is_empty() {
            return Err(NitpickerError::InvalidConfiguration(
                "site base URLs must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.image_resolve_permits, 5);
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(config.progress_interval(), Duration::from_millis(300));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CoreConfig::from_json(r#"{"image_download_workers": 2}"#).unwrap();
        assert_eq!(config.image_download_workers, 2);
        assert_eq!(config.image_resolve_permits, 5);
        assert_eq!(config.download_page_host, "bunkrr.su");
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let err = CoreConfig::from_json(r#"{"idle_timeout_secs": 0}"#).unwrap_err();
        assert!(matches!(err, NitpickerError::InvalidConfiguration(_)));
        assert_eq!(CoreConfig::default().idle_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_permits_rejected() {
        let err = CoreConfig::from_json(r#"{"image_resolve_permits": 0}"#).unwrap_err();
        assert!(matches!(err, NitpickerError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_with_data_dir() {
        let config = CoreConfig::with_data_dir("/data/app");
        assert_eq!(config.downloads_root, PathBuf::from("/data/app/Downloads"));
        assert_eq!(config.database_path, PathBuf::from("/data/app/nitpicker.db"));
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig::load_or_default(dir.path().join("none.json")).await.unwrap();
        assert_eq!(config.chunk_size, 8192);
    }
}
