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


//! Database models
//!
//! One row per queued file in `download_tasks`. Status is stored as its
//! variant name so the table stays readable from `sqlite3`.

use crate::error::{NitpickerError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

// ============================================================================
// ENUMS
// ============================================================================

/// Lifecycle state of a download task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
pub enum DownloadStatus {
    /// Waiting in queue
    Pending,
    /// Resolving the direct download URL
    FetchingUrl,
    /// Transfer in progress
    Downloading,
    /// Reserved, never entered by the orchestrator
    Paused,
    /// File fully on disk
    Completed,
    /// Last attempt failed, see `error`
    Error,
    /// Stopped by the user
    Cancelled,
}

impl DownloadStatus {
    pub const ALL: [DownloadStatus; 7] = [
        DownloadStatus::Pending,
        DownloadStatus::FetchingUrl,
        DownloadStatus::Downloading,
        DownloadStatus::Paused,
        DownloadStatus::Completed,
        DownloadStatus::Error,
        DownloadStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "Pending",
            DownloadStatus::FetchingUrl => "FetchingUrl",
            DownloadStatus::Downloading => "Downloading",
            DownloadStatus::Paused => "Paused",
            DownloadStatus::Completed => "Completed",
            DownloadStatus::Error => "Error",
            DownloadStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| NitpickerError::InvalidData(format!("Invalid task status: {}", s)))
    }

    /// Completed and Cancelled rows only change through delete or an explicit reset
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Cancelled)
    }

    /// Statuses that are not picked up by startup recovery
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Cancelled | DownloadStatus::Error
        )
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DOWNLOAD TASK
// ============================================================================

/// Durable download task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Stable id derived from the thumbnail URL (see `file::paths::stable_id`)
    pub id: String,
    pub file_name: String,
    /// Extension without the dot
    pub file_type: String,
    /// The file's intermediate page on the gallery site
    pub source_page_url: String,
    /// Resolved referer page, empty until resolution succeeds
    pub download_page_url: String,
    /// Resolved direct URL, empty until resolution succeeds
    pub file_url: String,
    pub thumbnail_url: String,
    pub album_title: String,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub status: DownloadStatus,
    pub file_path: Option<String>,
    pub error: Option<String>,
    /// Insertion time, unix millis
    pub created_at: i64,
}

impl DownloadTask {
    /// Fresh Pending task with empty URLs and no progress
    pub fn pending(
        id: String,
        file_name: String,
        file_type: String,
        source_page_url: String,
        thumbnail_url: String,
        album_title: String,
    ) -> Self {
        Self {
            id,
            file_name,
            file_type,
            source_page_url,
            download_page_url: String::new(),
            file_url: String::new(),
            thumbnail_url,
            album_title,
            total_bytes: 0,
            downloaded_bytes: 0,
            status: DownloadStatus::Pending,
            file_path: None,
            error: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Both URLs needed for the transfer are known
    pub fn has_resolved_urls(&self) -> bool {
        !self.file_url.trim().is_empty() && !self.download_page_url.trim().is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Map a `download_tasks` row
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            file_name: row.try_get("file_name")?,
            file_type: row.try_get("file_type")?,
            source_page_url: row.try_get("source_page_url")?,
            download_page_url: row.try_get("download_page_url")?,
            file_url: row.try_get("file_url")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            album_title: row.try_get("album_title")?,
            total_bytes: row.try_get::<i64, _>("total_bytes")?.max(0) as u64,
            downloaded_bytes: row.try_get::<i64, _>("downloaded_bytes")?.max(0) as u64,
            status: DownloadStatus::from_str(&status)?,
            file_path: row.try_get("file_path")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
