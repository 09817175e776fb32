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


//! Nitpicker download core
//!
//! Shared by the Android and iOS shells: album scraping, a durable task
//! table and the download orchestrator that resolves and streams files into
//! album folders.
//!
//! ```no_run
//! use nitpicker_core::{CoreConfig, DownloadOrchestrator};
//!
//! # async fn example() -> nitpicker_core::Result<()> {
//! let config = CoreConfig::with_data_dir("/data/user/0/app/files");
//! let orchestrator = DownloadOrchestrator::start(&config).await?;
//! for row in orchestrator.progress().current() {
//!     println!("{} {}%", row.file_name, row.progress_percent);
//! }
//! # Ok(())
//! # }
//! ```

uniffi::setup_scaffolding!();

pub mod api;
pub mod config;
pub mod download;
pub mod error;
pub mod file;
pub mod logging;
pub mod storage;

// JNI bridge for Android
#[cfg(target_os = "android")]
mod jni_bridge;

pub use api::{Album, AlbumClient, AlbumPage, FileInfo, HttpClient};
pub use config::CoreConfig;
pub use download::{
    DownloadExecutor, DownloadOrchestrator, DownloadOutcome, DownloadProgress, Lane, LaneLimits,
    ProgressProjection, UrlResolver,
};
pub use error::{NitpickerError, Result};
pub use file::LocalLibrary;
pub use storage::{Database, DownloadStatus, DownloadTask, TaskStore};
