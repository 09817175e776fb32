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


//! Download orchestration
//!
//! Every task runs as one tokio job, registered by task id. Two lanes bound
//! the work:
//!
//! - **image**: resolution under `image_resolve_permits`, transfers under
//!   `image_download_workers`
//! - **other**: one permit held across resolution and transfer, so at most
//!   one non-image file is in flight at any time
//!
//! Each decision re-reads the row from the store, and store updates never
//! touch `Completed`/`Cancelled` rows, so a job that lost a race stops
//! without raising anything.
//!
//! Jobs hold a child of the orchestrator's shutdown token. A job cancelled
//! through [`DownloadOrchestrator::cancel`] ends `Cancelled`. A job stopped by
//! [`DownloadOrchestrator::shutdown`] leaves its row untouched so the next
//! [`DownloadOrchestrator::recover_interrupted`] picks it up again.

use crate::api::client::HttpClient;
use crate::api::models::FileInfo;
use crate::config::CoreConfig;
use crate::download::executor::{DownloadExecutor, DownloadOutcome};
use crate::download::lane::Lane;
use crate::download::progress::ProgressProjection;
use crate::download::resolver::UrlResolver;
use crate::error::{NitpickerError, Result};
use crate::file::manager::discard_partial;
use crate::file::paths::stable_id;
use crate::storage::{Database, DownloadStatus, DownloadTask, TaskStore};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore, SemaphorePermit};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

const CANCEL_GRACE: Duration = Duration::from_secs(2);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const USER_CANCELLED: &str = "User cancelled";

/// Permit counts for the image lane
///
/// The other lane always has exactly one permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneLimits {
    pub image_resolve_permits: usize,
    pub image_download_workers: usize,
}

impl Default for LaneLimits {
    fn default() -> Self {
        Self {
            image_resolve_permits: 5,
            image_download_workers: 5,
        }
    }
}

impl From<&CoreConfig> for LaneLimits {
    fn from(config: &CoreConfig) -> Self {
        Self {
            image_resolve_permits: config.image_resolve_permits,
            image_download_workers: config.image_download_workers,
        }
    }
}

/// Highest concurrency seen in each gated section since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LanePeaks {
    pub image_resolutions: usize,
    pub image_downloads: usize,
    pub other_sections: usize,
}

#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard(self)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct GaugeGuard<'a>(&'a Gauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct LaneGauges {
    image_resolutions: Gauge,
    image_downloads: Gauge,
    other_sections: Gauge,
}

/// Registry entry for a running job
///
/// The entry outlives any wind-down of the job, so a launch for the same id
/// is refused until the old job has really ended.
#[derive(Clone)]
struct ActiveJob {
    generation: u64,
    cancel: CancellationToken,
    finished: Shared<BoxFuture<'static, ()>>,
    abort: Arc<AbortHandle>,
}

impl fmt::Debug for ActiveJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveJob")
            .field("generation", &self.generation)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[derive(Debug)]
struct Inner {
    store: Arc<TaskStore>,
    resolver: UrlResolver,
    executor: DownloadExecutor,
    image_resolve: Semaphore,
    image_workers: Semaphore,
    other_gate: Semaphore,
    jobs: RwLock<HashMap<String, ActiveJob>>,
    next_generation: AtomicU64,
    shutdown: CancellationToken,
    gauges: LaneGauges,
}

/// Queue, cancel, retry and clean up downloads
///
/// Cheap to clone; clones share the same jobs and lanes.
#[derive(Debug, Clone)]
pub struct DownloadOrchestrator {
    inner: Arc<Inner>,
}

impl DownloadOrchestrator {
    pub fn new(
        store: Arc<TaskStore>,
        resolver: UrlResolver,
        executor: DownloadExecutor,
        limits: LaneLimits,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                resolver,
                executor,
                image_resolve: Semaphore::new(limits.image_resolve_permits.max(1)),
                image_workers: Semaphore::new(limits.image_download_workers.max(1)),
                other_gate: Semaphore::new(1),
                jobs: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
                gauges: LaneGauges::default(),
            }),
        }
    }

    /// Open the database and wire up client, resolver and executor
    pub async fn from_config(config: &CoreConfig) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.database_path).await?;
        if !db.quick_check().await? {
            tracing::warn!("Integrity check failed for {}", config.database_path.display());
        }
        let store = Arc::new(TaskStore::open(db).await?);
        let client = HttpClient::from_core_config(config)?;
        let resolver = UrlResolver::new(client.clone(), &config.download_page_host)?;
        let executor = DownloadExecutor::from_config(client, Arc::clone(&store), config);

        Ok(Self::new(store, resolver, executor, LaneLimits::from(config)))
    }

    /// [`Self::from_config`] followed by startup recovery
    pub async fn start(config: &CoreConfig) -> Result<Self> {
        let orchestrator = Self::from_config(config).await?;
        let recovered = orchestrator.recover_interrupted().await?;
        tracing::info!("Download orchestrator started, {} task(s) recovered", recovered);
        Ok(orchestrator)
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.inner.store
    }

    pub fn progress(&self) -> ProgressProjection {
        ProgressProjection::new(self.inner.store.observe_all())
    }

    pub fn lane_peaks(&self) -> LanePeaks {
        let gauges = &self.inner.gauges;
        LanePeaks {
            image_resolutions: gauges.image_resolutions.peak(),
            image_downloads: gauges.image_downloads.peak(),
            other_sections: gauges.other_sections.peak(),
        }
    }

    pub async fn active_job_count(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    pub async fn has_job(&self, id: &str) -> bool {
        self.inner.jobs.read().await.contains_key(id)
    }

    /// Queue files of one album and start their jobs
    ///
    /// Returns the task id of every file, in input order. Rows in `Error`
    /// start over from scratch, `Cancelled` rows keep their partial file so
    /// the transfer can resume. Rows that are already queued, running or
    /// completed are left alone.
    pub async fn enqueue(&self, files: &[FileInfo], album_title: &str) -> Result<Vec<String>> {
        let store = &self.inner.store;
        let mut ids = Vec::with_capacity(files.len());
        let mut launches: Vec<(String, Lane)> = Vec::new();

        for file in files {
            let id = stable_id(&file.thumbnail_url, &file.page_url);
            ids.push(id.clone());
            if launches.iter().any(|(queued, _)| *queued == id) {
                continue;
            }

            match store.get_by_id(&id).await? {
                Some(existing) if existing.status == DownloadStatus::Completed => {
                    tracing::debug!(task_id = %id, "Already downloaded, skipping");
                    continue;
                }
                Some(existing) if existing.status == DownloadStatus::Error => {
                    self.stop_job(&id, false).await;
                    if let Some(path) = &existing.file_path {
                        discard_partial(Path::new(path)).await;
                    }
                    let reset = DownloadTask {
                        status: DownloadStatus::Pending,
                        download_page_url: String::new(),
                        file_url: String::new(),
                        downloaded_bytes: 0,
                        total_bytes: 0,
                        file_path: None,
                        error: None,
                        ..existing
                    };
                    store.insert_or_replace(&reset).await?;
                    tracing::info!(task_id = %id, "Re-queued failed download");
                }
                Some(existing) if existing.status == DownloadStatus::Cancelled => {
                    self.stop_job(&id, false).await;
                    let reset = DownloadTask {
                        status: DownloadStatus::Pending,
                        download_page_url: String::new(),
                        file_url: String::new(),
                        error: None,
                        ..existing
                    };
                    store.insert_or_replace(&reset).await?;
                    tracing::info!(task_id = %id, "Re-queued cancelled download");
                }
                Some(_) => {}
                None => {
                    let task = DownloadTask::pending(
                        id.clone(),
                        file.file_name.clone(),
                        file.file_type.clone(),
                        file.page_url.clone(),
                        file.thumbnail_url.clone(),
                        album_title.to_string(),
                    );
                    store.insert_or_replace(&task).await?;
                }
            }

            launches.push((id, Lane::for_file_type(&file.file_type)));
        }

        for (id, lane) in &launches {
            self.launch(id, *lane).await;
        }

        tracing::info!(
            "Enqueued {} file(s) for album '{}', {} job(s) requested",
            files.len(),
            album_title,
            launches.len()
        );
        Ok(ids)
    }

    /// Stop a task and mark it `Cancelled` unless it already completed
    ///
    /// The partial file and recorded progress are kept for a later resume.
    /// Unknown ids are ignored.
    pub async fn cancel(&self, id: &str) -> Result<()> {
        self.stop_job(id, true).await;

        match self.inner.store.get_by_id(id).await? {
            Some(task) if task.status != DownloadStatus::Completed => {
                self.inner
                    .store
                    .update_status(id, DownloadStatus::Cancelled, Some(USER_CANCELLED))
                    .await?;
                tracing::info!(task_id = %id, "Download cancelled");
            }
            Some(_) => tracing::debug!(task_id = %id, "Cancel ignored, already completed"),
            None => tracing::debug!(task_id = %id, "Cancel ignored, no such task"),
        }
        Ok(())
    }

    /// Start a failed task again from zero
    pub async fn retry_download(&self, id: &str) -> Result<()> {
        let task = self
            .inner
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| NitpickerError::not_found(format!("download task {}", id)))?;

        if task.status != DownloadStatus::Error {
            return Err(NitpickerError::InvalidState(format!(
                "Task {} is {}, only failed downloads can be retried",
                id, task.status
            )));
        }

        self.stop_job(id, false).await;
        let previous = self.inner.store.reset_for_retry(id).await?;
        if let Some(path) = &previous.file_path {
            discard_partial(Path::new(path)).await;
        }

        tracing::info!(task_id = %id, "Retrying download");
        self.launch(id, Lane::for_file_type(&previous.file_type)).await;
        Ok(())
    }

    /// Remove every `Completed` and `Cancelled` row
    ///
    /// Files on disk are left where they are.
    pub async fn delete_completed_and_cancelled(&self) -> Result<u64> {
        let removed = self
            .inner
            .store
            .delete_where_status_in(&[DownloadStatus::Completed, DownloadStatus::Cancelled])
            .await?;
        tracing::info!("Removed {} finished task(s)", removed);
        Ok(removed)
    }

    /// Stop a task and forget it
    ///
    /// A completed file stays on disk; anything partial is removed.
    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        self.stop_job(id, true).await;

        let Some(task) = self.inner.store.get_by_id(id).await? else {
            return Ok(false);
        };
        let removed = self.inner.store.delete_by_id(id).await?;

        if task.status != DownloadStatus::Completed {
            if let Some(path) = &task.file_path {
                discard_partial(Path::new(path)).await;
            }
        }
        Ok(removed)
    }

    /// Relaunch every task that was queued or running when the process died
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let active = self.inner.store.get_active().await?;
        let mut launched = 0;

        for task in &active {
            if self.launch(&task.id, Lane::for_file_type(&task.file_type)).await {
                tracing::debug!(task_id = %task.id, status = %task.status, "Recovering task");
                launched += 1;
            }
        }

        if launched > 0 {
            tracing::info!("Recovered {} interrupted download(s)", launched);
        }
        Ok(launched)
    }

    /// Stop all jobs without touching their rows
    ///
    /// Nothing can be launched afterwards.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let jobs: Vec<(String, ActiveJob)> = self.inner.jobs.write().await.drain().collect();
        tracing::info!("Shutting down, stopping {} job(s)", jobs.len());

        for (id, job) in jobs {
            wind_down(&id, job, SHUTDOWN_GRACE).await;
        }

        if let Err(e) = self.inner.store.database().checkpoint().await {
            tracing::warn!("WAL checkpoint failed: {}", e);
        }
    }

    /// Start a job unless one is already registered for this id
    async fn launch(&self, id: &str, lane: Lane) -> bool {
        let mut jobs = self.inner.jobs.write().await;

        if self.inner.shutdown.is_cancelled() {
            tracing::warn!(task_id = %id, "Orchestrator is shut down, not launching");
            return false;
        }
        if jobs.contains_key(id) {
            tracing::debug!(task_id = %id, "Job already running");
            return false;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let cancel = self.inner.shutdown.child_token();
        let inner = Arc::clone(&self.inner);
        let job_id = id.to_string();
        let job_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            inner.run_job(job_id, lane, generation, job_cancel).await;
        });
        let abort = Arc::new(handle.abort_handle());
        let finished = handle.map(|_| ()).boxed().shared();

        jobs.insert(
            id.to_string(),
            ActiveJob {
                generation,
                cancel,
                finished,
                abort,
            },
        );
        true
    }

    /// Wait for the registered job of `id` to end, cancelling it first when
    /// asked, then unregister it
    ///
    /// The entry stays in the registry while the job winds down.
    async fn stop_job(&self, id: &str, cancel: bool) {
        let job = self.inner.jobs.read().await.get(id).cloned();
        let Some(job) = job else {
            return;
        };
        let generation = job.generation;

        if cancel {
            job.cancel.cancel();
        }
        wind_down(id, job, CANCEL_GRACE).await;

        let mut jobs = self.inner.jobs.write().await;
        if jobs.get(id).map(|job| job.generation) == Some(generation) {
            jobs.remove(id);
        }
    }
}

impl Inner {
    async fn run_job(
        self: Arc<Self>,
        id: String,
        lane: Lane,
        generation: u64,
        cancel: CancellationToken,
    ) {
        tracing::debug!(task_id = %id, lane = ?lane, generation, "Job started");

        let result = match lane {
            Lane::Image => self.run_image(&id, &cancel).await,
            Lane::Other => self.run_other(&id, &cancel).await,
        };

        if let Err(e) = result {
            if cancel.is_cancelled() {
                tracing::debug!(task_id = %id, "Job stopped after cancellation: {}", e);
            } else {
                tracing::error!(task_id = %id, "Job failed: {}", e);
                let message = e.to_string();
                if let Err(store_err) = self
                    .store
                    .update_status(&id, DownloadStatus::Error, Some(&message))
                    .await
                {
                    tracing::error!(task_id = %id, "Could not record failure: {}", store_err);
                }
            }
        }

        self.finalize(&id, generation, &cancel).await;
    }

    async fn run_image(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        if !self.prepare(id, cancel, Some(&self.image_resolve)).await? {
            return Ok(());
        }

        let Some(_worker) = acquire(&self.image_workers, cancel).await? else {
            return Ok(());
        };
        let _in_flight = self.gauges.image_downloads.enter();
        self.execute(id, cancel).await
    }

    async fn run_other(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        let Some(_gate) = acquire(&self.other_gate, cancel).await? else {
            return Ok(());
        };
        let _in_flight = self.gauges.other_sections.enter();

        if !self.prepare(id, cancel, None).await? {
            return Ok(());
        }
        self.execute(id, cancel).await
    }

    /// Resolve URLs if the row still lacks them
    ///
    /// `false` means the job should stop: the row is gone, settled, failed to
    /// resolve, or the job was cancelled.
    async fn prepare(
        &self,
        id: &str,
        cancel: &CancellationToken,
        resolve_permits: Option<&Semaphore>,
    ) -> Result<bool> {
        let Some(task) = self.store.get_by_id(id).await? else {
            tracing::debug!(task_id = %id, "Task removed before start");
            return Ok(false);
        };
        if task.status.is_settled() {
            return Ok(false);
        }
        if task.has_resolved_urls() {
            return Ok(true);
        }

        let _permit = match resolve_permits {
            Some(permits) => match acquire(permits, cancel).await? {
                Some(permit) => Some(permit),
                None => return Ok(false),
            },
            None => None,
        };
        let _resolving = resolve_permits.map(|_| self.gauges.image_resolutions.enter());

        // the row may have moved on while waiting for a permit
        let Some(task) = self.store.get_by_id(id).await? else {
            return Ok(false);
        };
        if task.status.is_settled() {
            return Ok(false);
        }
        if task.has_resolved_urls() {
            return Ok(true);
        }
        if !self
            .store
            .update_status(id, DownloadStatus::FetchingUrl, None)
            .await?
        {
            return Ok(false);
        }

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            resolved = self.resolver.resolve(&task) => resolved,
        };

        match resolved {
            Ok(urls) => {
                tracing::debug!(task_id = %id, "Resolved {}", urls.file_url);
                self.store
                    .update_urls_and_status(
                        id,
                        &urls.download_page_url,
                        &urls.file_url,
                        DownloadStatus::Pending,
                    )
                    .await
            }
            Err(e) => {
                tracing::warn!(task_id = %id, "URL resolution failed: {}", e);
                let message = format!("Failed to get download URL: {}", e);
                self.store
                    .update_status(id, DownloadStatus::Error, Some(&message))
                    .await?;
                Ok(false)
            }
        }
    }

    async fn execute(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        let Some(task) = self.store.get_by_id(id).await? else {
            return Ok(());
        };
        if task.status.is_settled() || !task.has_resolved_urls() || cancel.is_cancelled() {
            return Ok(());
        }
        if !self
            .store
            .update_status(id, DownloadStatus::Downloading, None)
            .await?
        {
            return Ok(());
        }

        match self.executor.execute(&task, cancel).await {
            DownloadOutcome::Completed(path) => {
                self.store
                    .update_completion(id, DownloadStatus::Completed, &path.to_string_lossy())
                    .await?;
            }
            DownloadOutcome::Error(message) => {
                self.store
                    .update_status(id, DownloadStatus::Error, Some(&message))
                    .await?;
            }
            DownloadOutcome::Cancelled => {
                tracing::debug!(task_id = %id, "Transfer stopped");
            }
        }
        Ok(())
    }

    /// Settle a cancelled row, then drop the registry entry
    ///
    /// The entry goes last so no new job for the id can start before the
    /// row has its final status.
    async fn finalize(&self, id: &str, generation: u64, cancel: &CancellationToken) {
        let superseded = matches!(
            self.jobs.read().await.get(id),
            Some(job) if job.generation != generation
        );

        if cancel.is_cancelled() && !self.shutdown.is_cancelled() && !superseded {
            self.mark_cancelled(id).await;
        }

        let mut jobs = self.jobs.write().await;
        if jobs.get(id).map(|job| job.generation) == Some(generation) {
            jobs.remove(id);
        }
    }

    async fn mark_cancelled(&self, id: &str) {
        match self.store.get_by_id(id).await {
            Ok(Some(task)) if !task.status.is_terminal() => {
                if let Err(e) = self
                    .store
                    .update_status(id, DownloadStatus::Cancelled, Some(USER_CANCELLED))
                    .await
                {
                    tracing::warn!(task_id = %id, "Could not mark cancelled: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(task_id = %id, "Could not read task after cancel: {}", e),
        }
    }
}

/// Wait for a permit unless the job is cancelled first
async fn acquire<'a>(
    permits: &'a Semaphore,
    cancel: &CancellationToken,
) -> Result<Option<SemaphorePermit<'a>>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        permit = permits.acquire() => permit
            .map(Some)
            .map_err(|_| NitpickerError::internal("lane semaphore closed")),
    }
}

async fn wind_down(id: &str, job: ActiveJob, grace: Duration) {
    if tokio::time::timeout(grace, job.finished).await.is_err() {
        tracing::warn!(task_id = %id, "Job did not stop within {:?}, aborting", grace);
        job.abort.abort();
    }
}
