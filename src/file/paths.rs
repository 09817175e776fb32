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


//! Path generation and task ids
//!
//! Downloads land in `{downloads_root}/{album}/{id}.{ext}`. The id is the
//! thumbnail's file stem, which is also the task's primary key, so the
//! same file always maps to the same row and the same name on disk.

use crate::error::{NitpickerError, Result};
use crate::file::manager::{ensure_directory_exists, file_exists};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Folder used when an album has no title
pub const FALLBACK_ALBUM_FOLDER: &str = "Downloads";

/// Give up looking for a free `_(n)` name after this many tries
const MAX_COLLISION_ATTEMPTS: u32 = 100;

/// Replace characters that are invalid in file names on Android/Windows
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Folder name for an album title
pub fn album_folder_name(album_title: &str) -> String {
    let sanitized = sanitize_filename(album_title);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        FALLBACK_ALBUM_FOLDER.to_string()
    } else {
        sanitized
    }
}

/// Extension after the last dot, empty if there is none
pub fn file_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => &file_name[idx + 1..],
        None => "",
    }
}

/// Stable task id for a listed file
///
/// The last path segment of the thumbnail URL up to its first dot. When the
/// thumbnail doesn't yield one, a hash of the file's page URL is used.
pub fn stable_id(thumbnail_url: &str, page_url: &str) -> String {
    let without_query = thumbnail_url
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let segment = without_query.rsplit('/').next().unwrap_or_default();
    let stem = segment.split('.').next().unwrap_or_default().trim();

    if !stem.is_empty() {
        return stem.to_string();
    }

    let digest = Sha256::digest(page_url.as_bytes());
    format!("id_{}", &hex::encode(digest)[..16])
}

/// Pick the destination path for a task
///
/// Creates the album folder when possible and falls back to the downloads
/// root when it can't be created. Existing files get a `_(n)` suffix.
pub async fn prepare_download_path(
    downloads_root: &Path,
    album_title: &str,
    id: &str,
    file_name: &str,
) -> Result<PathBuf> {
    ensure_directory_exists(downloads_root).await?;

    let album_dir = downloads_root.join(album_folder_name(album_title));
    let target_dir = match ensure_directory_exists(&album_dir).await {
        Ok(()) => album_dir,
        Err(e) => {
            tracing::warn!(
                "Falling back to {} for {}: {}",
                downloads_root.display(),
                id,
                e
            );
            downloads_root.to_path_buf()
        }
    };

    avoid_collision(&target_dir, &sanitize_filename(id), file_extension(file_name)).await
}

/// First free name among `stem.ext`, `stem_(1).ext`, `stem_(2).ext`, ...
pub async fn avoid_collision(dir: &Path, stem: &str, extension: &str) -> Result<PathBuf> {
    let name = |suffix: Option<u32>| {
        let base = match suffix {
            Some(n) => format!("{}_({})", stem, n),
            None => stem.to_string(),
        };
        if extension.is_empty() {
            base
        } else {
            format!("{}.{}", base, extension)
        }
    };

    let candidate = dir.join(name(None));
    if !file_exists(&candidate).await {
        return Ok(candidate);
    }

    for counter in 1..=MAX_COLLISION_ATTEMPTS {
        let candidate = dir.join(name(Some(counter)));
        if !file_exists(&candidate).await {
            return Ok(candidate);
        }
    }

    Err(NitpickerError::InvalidPath(format!(
        "Could not determine unique filename for {} in {}",
        stem,
        dir.display()
    )))
}
