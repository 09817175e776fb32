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


//! Database query functions for `download_tasks`
//!
//! Plain functions over a pool. Callers that need change notification go
//! through [`crate::storage::TaskStore`] instead of calling these directly.
//!
//! Every `UPDATE` is guarded so that Completed and Cancelled rows are left
//! alone; the functions return whether a row was actually changed.

use crate::error::Result;
use crate::storage::models::{DownloadStatus, DownloadTask};
use sqlx::SqlitePool;

const SELECT_TASK: &str = r#"
    SELECT id, file_name, file_type, source_page_url, download_page_url, file_url,
           thumbnail_url, album_title, total_bytes, downloaded_bytes, status,
           file_path, error, created_at
    FROM download_tasks
"#;

const ORDER_BY: &str = "ORDER BY created_at DESC, id ASC";

/// Rows in these states are only changed by delete or an explicit upsert
const MUTABLE_GUARD: &str = "status NOT IN ('Completed', 'Cancelled')";

// ============================================================================
// READS
// ============================================================================

/// Find a task by id
pub async fn find_task(pool: &SqlitePool, id: &str) -> Result<Option<DownloadTask>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_TASK))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(DownloadTask::from_row).transpose()
}

/// All tasks, newest first
pub async fn list_tasks(pool: &SqlitePool) -> Result<Vec<DownloadTask>> {
    let rows = sqlx::query(&format!("{} {}", SELECT_TASK, ORDER_BY))
        .fetch_all(pool)
        .await?;

    rows.iter().map(DownloadTask::from_row).collect()
}

/// Tasks that are not Completed, Cancelled or Error
pub async fn list_active_tasks(pool: &SqlitePool) -> Result<Vec<DownloadTask>> {
    let rows = sqlx::query(&format!(
        "{} WHERE status NOT IN ('Completed', 'Cancelled', 'Error') {}",
        SELECT_TASK, ORDER_BY
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(DownloadTask::from_row).collect()
}

// ============================================================================
// WRITES
// ============================================================================

/// Insert a task, replacing any row with the same id
pub async fn upsert_task(pool: &SqlitePool, task: &DownloadTask) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO download_tasks (
            id, file_name, file_type, source_page_url, download_page_url, file_url,
            thumbnail_url, album_title, total_bytes, downloaded_bytes, status,
            file_path, error, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&task.id)
    .bind(&task.file_name)
    .bind(&task.file_type)
    .bind(&task.source_page_url)
    .bind(&task.download_page_url)
    .bind(&task.file_url)
    .bind(&task.thumbnail_url)
    .bind(&task.album_title)
    .bind(task.total_bytes as i64)
    .bind(task.downloaded_bytes as i64)
    .bind(task.status.as_str())
    .bind(&task.file_path)
    .bind(&task.error)
    .bind(task.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record resolved URLs, optionally moving the status along with them
pub async fn update_urls(
    pool: &SqlitePool,
    id: &str,
    download_page_url: &str,
    file_url: &str,
    status: Option<DownloadStatus>,
) -> Result<bool> {
    let result = match status {
        Some(status) => {
            sqlx::query(&format!(
                "UPDATE download_tasks SET download_page_url = ?, file_url = ?, status = ?, error = NULL WHERE id = ? AND {}",
                MUTABLE_GUARD
            ))
            .bind(download_page_url)
            .bind(file_url)
            .bind(status.as_str())
            .bind(id)
            .execute(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "UPDATE download_tasks SET download_page_url = ?, file_url = ? WHERE id = ? AND {}",
                MUTABLE_GUARD
            ))
            .bind(download_page_url)
            .bind(file_url)
            .bind(id)
            .execute(pool)
            .await?
        }
    };

    Ok(result.rows_affected() > 0)
}

/// Write status and byte counters in one statement
pub async fn update_progress(
    pool: &SqlitePool,
    id: &str,
    status: DownloadStatus,
    downloaded_bytes: u64,
    total_bytes: u64,
    error: Option<&str>,
) -> Result<bool> {
    let downloaded_bytes = if total_bytes > 0 {
        downloaded_bytes.min(total_bytes)
    } else {
        downloaded_bytes
    };

    let result = sqlx::query(&format!(
        "UPDATE download_tasks SET status = ?, downloaded_bytes = ?, total_bytes = ?, error = ? WHERE id = ? AND {}",
        MUTABLE_GUARD
    ))
    .bind(status.as_str())
    .bind(downloaded_bytes as i64)
    .bind(total_bytes as i64)
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Final status plus path; downloaded bytes are set equal to total bytes
pub async fn update_completion(
    pool: &SqlitePool,
    id: &str,
    status: DownloadStatus,
    file_path: &str,
) -> Result<bool> {
    let result = sqlx::query(&format!(
        "UPDATE download_tasks SET status = ?, file_path = ?, downloaded_bytes = total_bytes, error = NULL WHERE id = ? AND {}",
        MUTABLE_GUARD
    ))
    .bind(status.as_str())
    .bind(file_path)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Set status and error message (`None` clears the message)
pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    status: DownloadStatus,
    error: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(&format!(
        "UPDATE download_tasks SET status = ?, error = ? WHERE id = ? AND {}",
        MUTABLE_GUARD
    ))
    .bind(status.as_str())
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record the destination path chosen for a transfer
pub async fn update_file_path(pool: &SqlitePool, id: &str, file_path: &str) -> Result<bool> {
    let result = sqlx::query(&format!(
        "UPDATE download_tasks SET file_path = ? WHERE id = ? AND {}",
        MUTABLE_GUARD
    ))
    .bind(file_path)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a single task
pub async fn delete_task(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM download_tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every task whose status is in `statuses`
pub async fn delete_tasks_with_status(
    pool: &SqlitePool,
    statuses: &[DownloadStatus],
) -> Result<u64> {
    if statuses.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!("DELETE FROM download_tasks WHERE status IN ({})", placeholders);

    let mut query = sqlx::query(&sql);
    for status in statuses {
        query = query.bind(status.as_str());
    }

    Ok(query.execute(pool).await?.rows_affected())
}
