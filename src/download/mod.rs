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


//! Download pipeline
//!
//! [`lane`] classifies files, [`resolver`] turns a file page into a direct
//! URL, [`executor`] streams one file to disk and [`orchestrator`] decides
//! when each of those runs. [`progress`] is the read side for the UI.

pub mod executor;
pub mod lane;
pub mod orchestrator;
pub mod progress;
pub mod resolver;

// Re-export commonly used types
pub use executor::{DownloadExecutor, DownloadOutcome};
pub use lane::Lane;
pub use orchestrator::{DownloadOrchestrator, LaneLimits, LanePeaks};
pub use progress::{DownloadProgress, ProgressProjection};
pub use resolver::{ResolvedUrls, UrlResolver};
