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


//! Persistent task store
//!
//! The store is the only place task state is written. Every mutation is
//! committed to SQLite before the call returns, then a fresh snapshot of the
//! whole table is published on a `watch` channel. Mutations are serialized
//! by a single write lock so subscribers see snapshots in commit order.
//!
//! # Example
//! ```no_run
//! use nitpicker_core::storage::{Database, TaskStore};
//!
//! # async fn example() -> nitpicker_core::Result<()> {
//! let db = Database::new("./nitpicker.db").await?;
//! let store = TaskStore::open(db).await?;
//!
//! let mut feed = store.observe_all();
//! while feed.changed().await.is_ok() {
//!     let tasks = feed.borrow().clone();
//!     println!("{} tasks", tasks.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{NitpickerError, Result};
use crate::storage::models::{DownloadStatus, DownloadTask};
use crate::storage::{queries, Database};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Snapshot of every task, ordered by `created_at` descending
pub type TaskSnapshot = Arc<Vec<DownloadTask>>;

/// Durable task table with a live snapshot feed
#[derive(Debug)]
pub struct TaskStore {
    db: Database,
    write_lock: Mutex<()>,
    feed: watch::Sender<TaskSnapshot>,
}

impl TaskStore {
    /// Wrap an opened database and load the initial snapshot
    pub async fn open(db: Database) -> Result<Self> {
        let initial = queries::list_tasks(db.pool()).await?;
        let (feed, _) = watch::channel(Arc::new(initial));

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
            feed,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Live, ordered view of every task
    ///
    /// The receiver starts with the current snapshot and is notified after
    /// each committed mutation.
    pub fn observe_all(&self) -> watch::Receiver<TaskSnapshot> {
        self.feed.subscribe()
    }

    /// Current snapshot without subscribing
    pub fn snapshot(&self) -> TaskSnapshot {
        self.feed.borrow().clone()
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<DownloadTask>> {
        queries::find_task(self.db.pool(), id).await
    }

    /// One-shot ordered read, same order as [`Self::observe_all`]
    pub async fn list_all(&self) -> Result<Vec<DownloadTask>> {
        queries::list_tasks(self.db.pool()).await
    }

    /// Tasks that still have work to do (not Completed, Cancelled or Error)
    pub async fn get_active(&self) -> Result<Vec<DownloadTask>> {
        queries::list_active_tasks(self.db.pool()).await
    }

    pub async fn insert_or_replace(&self, task: &DownloadTask) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        queries::upsert_task(self.db.pool(), task).await?;
        self.publish().await
    }

    pub async fn update_urls(
        &self,
        id: &str,
        download_page_url: &str,
        file_url: &str,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let changed =
            queries::update_urls(self.db.pool(), id, download_page_url, file_url, None).await?;
        self.publish_if(changed).await
    }

    pub async fn update_urls_and_status(
        &self,
        id: &str,
        download_page_url: &str,
        file_url: &str,
        status: DownloadStatus,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let changed = queries::update_urls(
            self.db.pool(),
            id,
            download_page_url,
            file_url,
            Some(status),
        )
        .await?;
        self.publish_if(changed).await
    }

    /// `downloaded_bytes` is clamped to `total_bytes` when the total is known
    pub async fn update_progress(
        &self,
        id: &str,
        status: DownloadStatus,
        downloaded_bytes: u64,
        total_bytes: u64,
        error: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let changed = queries::update_progress(
            self.db.pool(),
            id,
            status,
            downloaded_bytes,
            total_bytes,
            error,
        )
        .await?;
        self.publish_if(changed).await
    }

    pub async fn update_completion(
        &self,
        id: &str,
        status: DownloadStatus,
        file_path: &str,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let changed = queries::update_completion(self.db.pool(), id, status, file_path).await?;
        self.publish_if(changed).await
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: DownloadStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let changed = queries::update_status(self.db.pool(), id, status, error).await?;
        self.publish_if(changed).await
    }

    pub async fn update_file_path(&self, id: &str, file_path: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let changed = queries::update_file_path(self.db.pool(), id, file_path).await?;
        self.publish_if(changed).await
    }

    /// Error -> Pending with progress, error, file path and resolved URLs
    /// cleared
    ///
    /// Returns the row as it was before the reset so the caller can remove
    /// the stale file.
    pub async fn reset_for_retry(&self, id: &str) -> Result<DownloadTask> {
        let _guard = self.write_lock.lock().await;

        let previous = queries::find_task(self.db.pool(), id)
            .await?
            .ok_or_else(|| NitpickerError::not_found(format!("download task {}", id)))?;

        if previous.status != DownloadStatus::Error {
            return Err(NitpickerError::InvalidState(format!(
                "Task {} is {}, only failed downloads can be retried",
                id, previous.status
            )));
        }

        let reset = DownloadTask {
            status: DownloadStatus::Pending,
            download_page_url: String::new(),
            file_url: String::new(),
            downloaded_bytes: 0,
            total_bytes: 0,
            error: None,
            file_path: None,
            ..previous.clone()
        };
        queries::upsert_task(self.db.pool(), &reset).await?;
        self.publish().await?;

        Ok(previous)
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let changed = queries::delete_task(self.db.pool(), id).await?;
        self.publish_if(changed).await
    }

    pub async fn delete_where_status_in(&self, statuses: &[DownloadStatus]) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let removed = queries::delete_tasks_with_status(self.db.pool(), statuses).await?;
        if removed > 0 {
            self.publish().await?;
        }
        Ok(removed)
    }

    // Must be called with the write lock held.
    async fn publish(&self) -> Result<()> {
        let tasks = queries::list_tasks(self.db.pool()).await?;
        self.feed.send_replace(Arc::new(tasks));
        Ok(())
    }

    async fn publish_if(&self, changed: bool) -> Result<bool> {
        if changed {
            self.publish().await?;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> DownloadTask {
        DownloadTask::pending(
            id.to_string(),
            format!("{}.jpg", id),
            "jpg".to_string(),
            format!("https://bunkr.cr/f/{}", id),
            format!("https://i-burger.bunkr.ru/thumbs/{}.png", id),
            "Album".to_string(),
        )
    }

    async fn store() -> TaskStore {
        TaskStore::open(Database::new_in_memory().await.unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_feed_publishes_after_mutation() {
        let store = store().await;
        let mut feed = store.observe_all();
        assert!(feed.borrow().is_empty());

        store.insert_or_replace(&task("a")).await.unwrap();
        feed.changed().await.unwrap();
        assert_eq!(feed.borrow().len(), 1);

        store
            .update_urls_and_status("a", "https://get.bunkrr.su/file/1", "https://cdn/a.jpg", DownloadStatus::Pending)
            .await
            .unwrap();
        feed.changed().await.unwrap();
        assert!(feed.borrow()[0].has_resolved_urls());
    }

    #[tokio::test]
    async fn test_update_urls_keeps_status_and_skips_settled_rows() {
        let store = store().await;
        store.insert_or_replace(&task("a")).await.unwrap();
        store
            .update_status("a", DownloadStatus::FetchingUrl, None)
            .await
            .unwrap();

        let changed = store
            .update_urls("a", "https://get.bunkrr.su/file/1", "https://cdn/a.jpg")
            .await
            .unwrap();
        assert!(changed);
        let row = store.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(row.download_page_url, "https://get.bunkrr.su/file/1");
        assert_eq!(row.file_url, "https://cdn/a.jpg");
        assert_eq!(row.status, DownloadStatus::FetchingUrl);

        store
            .update_status("a", DownloadStatus::Cancelled, Some("User cancelled"))
            .await
            .unwrap();
        let changed = store
            .update_urls("a", "https://get.bunkrr.su/file/2", "https://cdn/b.jpg")
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(store.get_by_id("a").await.unwrap().unwrap().file_url, "https://cdn/a.jpg");

        assert!(!store.update_urls("missing", "x", "y").await.unwrap());
    }

    #[tokio::test]
    async fn test_noop_update_does_not_publish() {
        let store = store().await;
        let feed = store.observe_all();

        let changed = store
            .update_status("missing", DownloadStatus::Error, Some("x"))
            .await
            .unwrap();
        assert!(!changed);
        assert!(!feed.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_is_immutable() {
        let store = store().await;
        store.insert_or_replace(&task("a")).await.unwrap();
        store
            .update_status("a", DownloadStatus::Cancelled, Some("User cancelled"))
            .await
            .unwrap();

        let changed = store
            .update_progress("a", DownloadStatus::Downloading, 5, 10, None)
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(
            store.get_by_id("a").await.unwrap().unwrap().status,
            DownloadStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_reset_for_retry_only_from_error() {
        let store = store().await;
        store.insert_or_replace(&task("a")).await.unwrap();
        assert!(matches!(
            store.reset_for_retry("a").await,
            Err(NitpickerError::InvalidState(_))
        ));

        store.update_file_path("a", "/tmp/a.jpg").await.unwrap();
        store
            .update_progress("a", DownloadStatus::Error, 4, 10, Some("boom"))
            .await
            .unwrap();

        let previous = store.reset_for_retry("a").await.unwrap();
        assert_eq!(previous.file_path.as_deref(), Some("/tmp/a.jpg"));

        let row = store.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(row.status, DownloadStatus::Pending);
        assert_eq!(row.downloaded_bytes, 0);
        assert!(row.error.is_none());
        assert!(row.file_path.is_none());
        assert!(!row.has_resolved_urls());
        assert_eq!(row.created_at, previous.created_at);
    }

    #[tokio::test]
    async fn test_get_active_and_bulk_delete() {
        let store = store().await;
        for id in ["a", "b", "c"] {
            store.insert_or_replace(&task(id)).await.unwrap();
        }
        store
            .update_status("a", DownloadStatus::Downloading, None)
            .await
            .unwrap();
        store
            .update_completion("b", DownloadStatus::Completed, "/tmp/b.jpg")
            .await
            .unwrap();
        store
            .update_status("c", DownloadStatus::Cancelled, None)
            .await
            .unwrap();

        let active = store.get_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a");

        let removed = store
            .delete_where_status_in(&[DownloadStatus::Completed, DownloadStatus::Cancelled])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.snapshot().len(), 1);

        assert!(store.delete_by_id("a").await.unwrap());
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
