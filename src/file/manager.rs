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


//! File operations shared by the executor, the orchestrator and the
//! local library
//!
//! # Key Operations
//! - Deletes that tolerate missing files and retry transient failures
//! - Directory creation
//! - Moves that never overwrite an existing file

use crate::error::{NitpickerError, Result};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;

/// Maximum retry attempts for file operations
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Delay between retry attempts
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Check if file exists
pub async fn file_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Length of a file on disk, `None` if it doesn't exist
pub async fn file_len(path: &Path) -> Option<u64> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Some(metadata.len()),
        _ => None,
    }
}

/// Ensure directory exists, creating parent directories as needed
pub async fn ensure_directory_exists(path: &Path) -> Result<()> {
    if matches!(fs::metadata(path).await, Ok(metadata) if metadata.is_dir()) {
        return Ok(());
    }

    fs::create_dir_all(path).await.map_err(|e| {
        NitpickerError::FileIoError(format!(
            "Failed to create directory {}: {}",
            path.display(),
            e
        ))
    })
}

/// Delete a file with retry; a missing file is not an error
pub async fn safe_delete(path: &Path) -> Result<()> {
    let mut attempts = 0;

    loop {
        attempts += 1;

        match safe_delete_once(path).await {
            Ok(()) => return Ok(()),
            Err(e) if attempts >= MAX_RETRY_ATTEMPTS => {
                return Err(NitpickerError::FileIoError(format!(
                    "Failed to delete file after {} attempts: {}: {}",
                    MAX_RETRY_ATTEMPTS,
                    path.display(),
                    e
                )));
            }
            Err(_) => {
                sleep(RETRY_DELAY).await;
            }
        }
    }
}

async fn safe_delete_once(path: &Path) -> Result<()> {
    if !file_exists(path).await {
        return Ok(());
    }

    fs::remove_file(path).await.map_err(|e| {
        NitpickerError::FileIoError(format!("Delete failed: {}: {}", path.display(), e))
    })
}

/// Best-effort delete of a partial download; failures are only logged
pub async fn discard_partial(path: &Path) {
    if let Err(e) = safe_delete(path).await {
        tracing::warn!("Could not remove partial file {}: {}", path.display(), e);
    }
}

/// Rename `source` to `destination`, refusing to replace an existing file
pub async fn move_no_overwrite(source: &Path, destination: &Path) -> Result<()> {
    if !file_exists(source).await {
        return Err(NitpickerError::FileNotFound(source.display().to_string()));
    }
    if file_exists(destination).await {
        return Err(NitpickerError::FileAlreadyExists(
            destination.display().to_string(),
        ));
    }

    if let Some(parent) = destination.parent() {
        ensure_directory_exists(parent).await?;
    }

    fs::rename(source, destination).await.map_err(|e| {
        NitpickerError::FileIoError(format!(
            "Move failed: {} -> {}: {}",
            source.display(),
            destination.display(),
            e
        ))
    })
}
