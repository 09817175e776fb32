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


//! Listing types scraped from the gallery site

use crate::file::paths::file_extension;
use serde::{Deserialize, Serialize};

/// One album card from a search result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub title: String,
    /// Number of files shown on the card (0 when unreadable)
    pub file_count: u32,
    /// Album link as found on the page; may be relative
    pub url: String,
}

/// First page of a search, with the page count for pagination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumPage {
    pub albums: Vec<Album>,
    pub max_page: u32,
}

/// One file listed inside an album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_name: String,
    /// Extension of `file_name` without the dot
    pub file_type: String,
    /// Display size as shown by the site (e.g. "2.4 MB")
    pub file_size: String,
    pub thumbnail_url: String,
    /// The file's own page, used for URL resolution
    pub page_url: String,
}

impl FileInfo {
    /// Build an entry, deriving `file_type` from the name
    pub fn new(
        file_name: impl Into<String>,
        file_size: impl Into<String>,
        thumbnail_url: impl Into<String>,
        page_url: impl Into<String>,
    ) -> Self {
        let file_name = file_name.into();
        let file_type = file_extension(&file_name).to_string();
        Self {
            file_name,
            file_type,
            file_size: file_size.into(),
            thumbnail_url: thumbnail_url.into(),
            page_url: page_url.into(),
        }
    }
}
