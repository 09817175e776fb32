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


//! UI-facing progress derived from the task store
//!
//! Nothing here holds state of its own. Every value is computed from the
//! latest store snapshot.

use crate::error::{NitpickerError, Result};
use crate::storage::{DownloadStatus, DownloadTask, TaskSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Progress row shown by the downloads screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct DownloadProgress {
    pub id: String,
    pub file_name: String,
    pub album_title: String,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    /// 0..=100
    pub progress_percent: u32,
    pub status: DownloadStatus,
    pub error: Option<String>,
    pub file_path: Option<String>,
}

impl From<&DownloadTask> for DownloadProgress {
    fn from(task: &DownloadTask) -> Self {
        Self {
            id: task.id.clone(),
            file_name: task.file_name.clone(),
            album_title: task.album_title.clone(),
            total_bytes: task.total_bytes,
            downloaded_bytes: task.downloaded_bytes,
            progress_percent: progress_percent(task.downloaded_bytes, task.total_bytes, task.status),
            status: task.status,
            error: task.error.clone(),
            file_path: task.file_path.clone(),
        }
    }
}

/// `floor(downloaded * 100 / total)`, or 0 when the total is unknown or the
/// task failed
#[uniffi::export]
pub fn progress_percent(downloaded_bytes: u64, total_bytes: u64, status: DownloadStatus) -> u32 {
    if total_bytes == 0 || status == DownloadStatus::Error {
        return 0;
    }
    let percent = (downloaded_bytes as u128 * 100) / total_bytes as u128;
    percent.min(100) as u32
}

/// Format a byte count for display (e.g. "2.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Live projection over the store's snapshot feed
#[derive(Debug, Clone)]
pub struct ProgressProjection {
    feed: watch::Receiver<TaskSnapshot>,
}

impl ProgressProjection {
    pub fn new(feed: watch::Receiver<TaskSnapshot>) -> Self {
        Self { feed }
    }

    /// Progress for every task, in store order
    pub fn current(&self) -> Vec<DownloadProgress> {
        self.feed.borrow().iter().map(DownloadProgress::from).collect()
    }

    pub fn get(&self, id: &str) -> Option<DownloadProgress> {
        self.feed
            .borrow()
            .iter()
            .find(|task| task.id == id)
            .map(DownloadProgress::from)
    }

    /// Wait for the next store change and return the new projection
    pub async fn changed(&mut self) -> Result<Vec<DownloadProgress>> {
        self.feed
            .changed()
            .await
            .map_err(|_| NitpickerError::internal("task store was dropped"))?;

        let snapshot = self.feed.borrow_and_update().clone();
        Ok(snapshot.iter().map(DownloadProgress::from).collect())
    }

    /// True once every task is Completed, Cancelled or Error
    pub fn all_settled(&self) -> bool {
        self.feed.borrow().iter().all(|task| task.status.is_settled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0, DownloadStatus::Downloading), 0);
        assert_eq!(progress_percent(999, 1000, DownloadStatus::Downloading), 99);
        assert_eq!(progress_percent(1000, 1000, DownloadStatus::Completed), 100);
        assert_eq!(progress_percent(500, 1000, DownloadStatus::Error), 0);
        assert_eq!(progress_percent(1, 3, DownloadStatus::Downloading), 33);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[tokio::test]
    async fn test_projection_follows_feed() {
        let mut task = DownloadTask::pending(
            "a".into(),
            "a.jpg".into(),
            "jpg".into(),
            "https://bunkr.cr/f/a".into(),
            "https://i-burger.bunkr.ru/t/a.png".into(),
            "Album".into(),
        );
        let (tx, rx) = watch::channel::<TaskSnapshot>(Arc::new(vec![task.clone()]));
        let mut projection = ProgressProjection::new(rx);
        assert_eq!(projection.current()[0].progress_percent, 0);
        assert!(!projection.all_settled());

        task.status = DownloadStatus::Downloading;
        task.total_bytes = 200;
        task.downloaded_bytes = 50;
        tx.send_replace(Arc::new(vec![task]));

        let rows = projection.changed().await.unwrap();
        assert_eq!(rows[0].progress_percent, 25);
        assert_eq!(projection.get("a").unwrap().downloaded_bytes, 50);
        assert!(projection.get("b").is_none());
    }
}
