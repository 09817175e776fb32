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


//! Streamed transfer of one resolved task
//!
//! # Resume
//! 1. If the task has `downloaded_bytes > 0` and the file on disk has
//!    exactly that length, request `Range: bytes={downloaded}-` and append
//! 2. Otherwise truncate and start over, writing progress 0 first
//! 3. `416` on a ranged request: HEAD the file. If the server's length
//!    equals the file on disk the transfer is already done, else restart
//! 4. `200` on a ranged request means the range was ignored: restart
//!
//! Progress is written at most every `progress_interval` and always for the
//! final byte. Cancellation is checked between chunks; a cancelled transfer
//! keeps its partial file and records how far it got. Waiting longer than the
//! client's idle timeout for headers or the next chunk fails the transfer.

use crate::api::client::HttpClient;
use crate::config::CoreConfig;
use crate::error::{NitpickerError, Result};
use crate::file::manager::{discard_partial, file_len};
use crate::file::paths::prepare_download_path;
use crate::storage::{DownloadStatus, DownloadTask, TaskStore};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, RANGE, REFERER};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

/// Terminal result of one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed(PathBuf),
    Error(String),
    Cancelled,
}

#[derive(Debug)]
pub struct DownloadExecutor {
    client: HttpClient,
    store: Arc<TaskStore>,
    downloads_root: PathBuf,
    chunk_size: usize,
    progress_interval: Duration,
}

impl DownloadExecutor {
    pub fn new(client: HttpClient, store: Arc<TaskStore>, downloads_root: PathBuf) -> Self {
        Self {
            client,
            store,
            downloads_root,
            chunk_size: 8 * 1024,
            progress_interval: Duration::from_millis(300),
        }
    }

    pub fn from_config(client: HttpClient, store: Arc<TaskStore>, config: &CoreConfig) -> Self {
        Self::new(client, store, config.downloads_root.clone())
            .with_chunk_size(config.chunk_size)
            .with_progress_interval(config.progress_interval())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn downloads_root(&self) -> &Path {
        &self.downloads_root
    }

    /// Run the transfer for a task whose URLs are resolved
    ///
    /// Never returns an error: failures become [`DownloadOutcome::Error`]
    /// after the partial file has been removed.
    pub async fn execute(&self, task: &DownloadTask, cancel: &CancellationToken) -> DownloadOutcome {
        let mut destination = None;

        match self.transfer(task, cancel, &mut destination).await {
            Ok(Some(path)) => {
                tracing::info!(task_id = %task.id, "Download finished: {}", path.display());
                DownloadOutcome::Completed(path)
            }
            Ok(None) => {
                tracing::info!(task_id = %task.id, "Download cancelled");
                DownloadOutcome::Cancelled
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, "Download failed: {}", e);
                if let Some(path) = destination {
                    discard_partial(&path).await;
                }
                DownloadOutcome::Error(e.to_string())
            }
        }
    }

    /// `Ok(None)` when cancelled
    async fn transfer(
        &self,
        task: &DownloadTask,
        cancel: &CancellationToken,
        destination: &mut Option<PathBuf>,
    ) -> Result<Option<PathBuf>> {
        if !task.has_resolved_urls() {
            return Err(NitpickerError::InvalidState(format!(
                "Task {} has no resolved download URL",
                task.id
            )));
        }

        let path = self.destination(task).await?;
        *destination = Some(path.clone());

        let mut downloaded = task.downloaded_bytes;
        let mut resume_offset = 0u64;

        let on_disk = file_len(&path).await;
        if downloaded > 0 && on_disk == Some(downloaded) {
            tracing::debug!(task_id = %task.id, "Resuming from {} bytes", downloaded);
            resume_offset = downloaded;
        } else if downloaded > 0 {
            tracing::warn!(
                task_id = %task.id,
                "Partial file mismatch (on disk {:?}, recorded {}), restarting",
                on_disk,
                downloaded
            );
            downloaded = 0;
            self.restart(task, &path).await?;
        }

        let mut response = match self.send(task, resume_offset, cancel).await? {
            Some(response) => response,
            None => return Ok(None),
        };

        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE && resume_offset > 0 {
            let server_total = self.fetch_content_length(task, cancel).await;
            if cancel.is_cancelled() {
                return Ok(None);
            }

            if let (Some(server_total), Some(on_disk)) = (server_total, file_len(&path).await) {
                if server_total == on_disk {
                    tracing::info!(task_id = %task.id, "Range not satisfiable, file already complete");
                    self.store
                        .update_progress(&task.id, DownloadStatus::Downloading, on_disk, on_disk, None)
                        .await?;
                    return Ok(Some(path));
                }
            }

            tracing::warn!(task_id = %task.id, "Range not satisfiable, restarting");
            downloaded = 0;
            resume_offset = 0;
            self.restart(task, &path).await?;
            response = match self.send(task, 0, cancel).await? {
                Some(response) => response,
                None => return Ok(None),
            };
        }

        let status = response.status();
        if !status.is_success() {
            return Err(NitpickerError::UnexpectedStatusCode {
                status_code: status.as_u16(),
                url: task.file_url.clone(),
            });
        }

        if resume_offset > 0 && status != StatusCode::PARTIAL_CONTENT {
            tracing::warn!(task_id = %task.id, "Server ignored the range request, restarting");
            downloaded = 0;
            resume_offset = 0;
            self.restart(task, &path).await?;
        }

        let content_length = response.content_length().filter(|len| *len > 0);
        let mut total = match content_length {
            Some(len) if resume_offset > 0 => resume_offset + len,
            Some(len) => len,
            None => task.total_bytes,
        };

        self.store
            .update_progress(&task.id, DownloadStatus::Downloading, downloaded, total, None)
            .await?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(resume_offset > 0)
            .truncate(resume_offset == 0)
            .open(&path)
            .await
            .map_err(|e| {
                NitpickerError::FileIoError(format!("Failed to open {}: {}", path.display(), e))
            })?;

        let idle = self.client.idle_timeout();
        let mut stream = response.bytes_stream();
        let mut last_emit = Instant::now();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = timeout(idle, stream.next()) => Some(chunk),
            };

            let chunk = match next {
                None => {
                    self.persist_partial(task, &mut file, downloaded, total).await?;
                    return Ok(None);
                }
                Some(Err(_)) => {
                    file.flush().await?;
                    return Err(self.stalled(task));
                }
                Some(Ok(None)) => break,
                Some(Ok(Some(chunk))) => {
                    chunk.map_err(|e| NitpickerError::from_request(e, &task.file_url))?
                }
            };

            for piece in chunk.chunks(self.chunk_size) {
                if cancel.is_cancelled() {
                    self.persist_partial(task, &mut file, downloaded, total).await?;
                    return Ok(None);
                }

                file.write_all(piece).await?;
                downloaded += piece.len() as u64;

                let is_last_byte = total > 0 && downloaded == total;
                if is_last_byte || last_emit.elapsed() >= self.progress_interval {
                    file.flush().await?;
                    self.store
                        .update_progress(&task.id, DownloadStatus::Downloading, downloaded, total, None)
                        .await?;
                    last_emit = Instant::now();
                }
            }
        }

        file.flush().await?;
        file.sync_all().await?;

        if total > 0 && downloaded != total {
            return Err(NitpickerError::IncompleteDownload {
                expected: total,
                actual: downloaded,
            });
        }
        if total == 0 {
            total = downloaded;
        }

        self.store
            .update_progress(&task.id, DownloadStatus::Downloading, downloaded, total, None)
            .await?;

        Ok(Some(path))
    }

    /// Recorded path if its file still exists, otherwise a fresh one
    async fn destination(&self, task: &DownloadTask) -> Result<PathBuf> {
        if let Some(recorded) = task.file_path.as_deref().map(PathBuf::from) {
            if file_len(&recorded).await.is_some() {
                return Ok(recorded);
            }
        }

        let path = prepare_download_path(
            &self.downloads_root,
            &task.album_title,
            &task.id,
            &task.file_name,
        )
        .await?;
        self.store
            .update_file_path(&task.id, &path.to_string_lossy())
            .await?;

        Ok(path)
    }

    async fn restart(&self, task: &DownloadTask, path: &Path) -> Result<()> {
        discard_partial(path).await;
        self.store
            .update_progress(&task.id, DownloadStatus::Downloading, 0, task.total_bytes, None)
            .await?;
        Ok(())
    }

    /// `Ok(None)` if cancelled while waiting for the response headers
    async fn send(
        &self,
        task: &DownloadTask,
        resume_offset: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<reqwest::Response>> {
        let mut request = self
            .client
            .inner()
            .get(&task.file_url)
            .header(REFERER, &task.download_page_url);

        if resume_offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", resume_offset));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            response = timeout(self.client.idle_timeout(), request.send()) => match response {
                Ok(response) => response
                    .map(Some)
                    .map_err(|e| NitpickerError::from_request(e, &task.file_url)),
                Err(_) => Err(self.stalled(task)),
            },
        }
    }

    fn stalled(&self, task: &DownloadTask) -> NitpickerError {
        NitpickerError::TransferStalled {
            url: task.file_url.clone(),
            seconds: self.client.idle_timeout().as_secs(),
        }
    }

    /// Server-side size from a HEAD request
    ///
    /// `None` when unavailable, timed out or cancelled.
    async fn fetch_content_length(&self, task: &DownloadTask, cancel: &CancellationToken) -> Option<u64> {
        let request = self
            .client
            .inner()
            .head(&task.file_url)
            .header(REFERER, &task.download_page_url)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            response = timeout(self.client.idle_timeout(), request) => match response {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(task_id = %task.id, "HEAD timed out");
                    return None;
                }
            },
        };

        match response {
            Ok(response) if response.status().is_success() => response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok()),
            Ok(response) => {
                tracing::debug!(task_id = %task.id, "HEAD returned {}", response.status());
                None
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, "Failed to fetch content length: {}", e);
                None
            }
        }
    }

    /// Keep the partial file and record how much of it is valid
    async fn persist_partial(
        &self,
        task: &DownloadTask,
        file: &mut tokio::fs::File,
        downloaded: u64,
        total: u64,
    ) -> Result<()> {
        file.flush().await?;
        self.store
            .update_progress(&task.id, DownloadStatus::Downloading, downloaded, total, None)
            .await?;
        Ok(())
    }
}
