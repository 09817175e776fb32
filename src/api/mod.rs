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


//! Gallery site access
//!
//! [`client`] owns the shared HTTP client, [`albums`] scrapes search results
//! and album listings into the types in [`models`].

pub mod albums;
pub mod client;
pub mod models;

// Re-export commonly used types
pub use albums::AlbumClient;
pub use client::{ClientConfig, HttpClient};
pub use models::{Album, AlbumPage, FileInfo};
