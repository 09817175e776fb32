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


//! Durable download task storage
//!
//! A single SQLite table, `download_tasks`, holds one row per queued file.
//! It is the source of truth for status and progress; the in-memory job
//! registry in the orchestrator is reconciled against it, never the other
//! way around.
//!
//! # Layout
//! - [`database`]: pool setup and pragmas
//! - [`migrations`]: runtime schema migrations
//! - [`models`]: `DownloadTask` / `DownloadStatus`
//! - [`queries`]: raw SQL over the pool
//! - [`task_store`]: serialized writes + live snapshot feed

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod task_store;

pub use database::Database;
pub use models::{DownloadStatus, DownloadTask};
pub use task_store::{TaskSnapshot, TaskStore};
