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


//! Files on disk
//!
//! [`paths`] picks names and destinations, [`manager`] wraps the tokio
//! filesystem calls the downloader needs and [`library`] is the album
//! browser over the downloads root.

pub mod library;
pub mod manager;
pub mod paths;

// Re-export commonly used types
pub use library::{AlbumFolder, LocalLibrary, MediaFile, MediaKind};
pub use paths::{prepare_download_path, sanitize_filename, stable_id};
