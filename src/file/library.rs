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


//! Local library of downloaded albums
//!
//! Every direct subdirectory of the downloads root is an album folder. Only
//! image and video files are listed inside it.

use crate::download::lane::is_image;
use crate::error::{NitpickerError, Result};
use crate::file::manager::{ensure_directory_exists, file_exists, move_no_overwrite, safe_delete};
use crate::file::paths::{file_extension, sanitize_filename};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;

/// Extensions listed as videos
pub const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "mkv", "webm", "avi", "mov", "wmv", "3gp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn for_file_name(name: &str) -> Option<Self> {
        let extension = file_extension(name);
        if extension.is_empty() {
            return None;
        }
        if is_image(extension) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
        {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumFolder {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub name: String,
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
    /// Milliseconds since the Unix epoch, 0 when unknown
    pub modified_ms: i64,
}

#[derive(Debug, Clone)]
pub struct LocalLibrary {
    root: PathBuf,
}

impl LocalLibrary {
    pub fn new<P: Into<PathBuf>>(downloads_root: P) -> Self {
        Self {
            root: downloads_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Album folders sorted by name; empty if the root doesn't exist yet
    pub async fn list_folders(&self) -> Result<Vec<AlbumFolder>> {
        if !file_exists(&self.root).await {
            return Ok(Vec::new());
        }

        let mut folders = Vec::new();
        let mut entries = read_dir(&self.root).await?;
        while let Some(entry) = next_entry(&mut entries, &self.root).await? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                folders.push(AlbumFolder {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.path(),
                });
            }
        }

        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    pub async fn create_folder(&self, name: &str) -> Result<PathBuf> {
        let path = self.folder_path(name)?;
        if file_exists(&path).await {
            return Err(NitpickerError::FileAlreadyExists(path.display().to_string()));
        }
        ensure_directory_exists(&path).await?;
        tracing::info!("Created album folder {}", path.display());
        Ok(path)
    }

    /// Rename an album folder; an existing target is never replaced
    pub async fn rename_folder(&self, old_name: &str, new_name: &str) -> Result<PathBuf> {
        let source = self.existing_folder(old_name).await?;
        let target = self.folder_path(new_name)?;
        if file_exists(&target).await {
            return Err(NitpickerError::FileAlreadyExists(target.display().to_string()));
        }

        fs::rename(&source, &target).await.map_err(|e| {
            NitpickerError::FileIoError(format!(
                "Rename failed: {} -> {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;
        tracing::info!("Renamed album folder {} -> {}", source.display(), target.display());
        Ok(target)
    }

    /// Delete an album folder and everything in it
    pub async fn delete_folder(&self, name: &str) -> Result<()> {
        let path = self.existing_folder(name).await?;
        fs::remove_dir_all(&path).await.map_err(|e| {
            NitpickerError::FileIoError(format!("Delete failed: {}: {}", path.display(), e))
        })?;
        tracing::info!("Deleted album folder {}", path.display());
        Ok(())
    }

    /// Media in a folder: videos first, then images, each by name
    pub async fn list_media(&self, folder: &str) -> Result<Vec<MediaFile>> {
        let dir = self.existing_folder(folder).await?;
        let mut media = Vec::new();

        let mut entries = read_dir(&dir).await?;
        while let Some(entry) = next_entry(&mut entries, &dir).await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(kind) = MediaKind::for_file_name(&name) else {
                continue;
            };
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let modified_ms = metadata
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);

            media.push(MediaFile {
                name,
                path: entry.path(),
                kind,
                size: metadata.len(),
                modified_ms,
            });
        }

        media.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        Ok(media)
    }

    /// Delete files, returning how many were actually removed
    pub async fn delete_files(&self, paths: &[PathBuf]) -> Result<usize> {
        let mut deleted = 0;
        for path in paths {
            if !file_exists(path).await {
                tracing::debug!("Skipping missing file {}", path.display());
                continue;
            }
            safe_delete(path).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Move files into another album folder (created if needed)
    ///
    /// Files whose name is already taken in the destination, and sources that
    /// no longer exist, are skipped. Any other failure doesn't stop the
    /// remaining moves, but the call then returns an error naming every file
    /// that could not be moved.
    pub async fn move_files(&self, paths: &[PathBuf], destination_folder: &str) -> Result<usize> {
        let destination = self.folder_path(destination_folder)?;
        ensure_directory_exists(&destination).await?;

        let mut moved = 0;
        let mut failed = Vec::new();
        for source in paths {
            let Some(name) = source.file_name() else {
                continue;
            };
            let target = destination.join(name);

            match move_no_overwrite(source, &target).await {
                Ok(()) => moved += 1,
                Err(e @ NitpickerError::FileAlreadyExists(_))
                | Err(e @ NitpickerError::FileNotFound(_)) => {
                    tracing::debug!("Skipping {}: {}", source.display(), e);
                }
                Err(e) => {
                    tracing::warn!("Could not move {}: {}", source.display(), e);
                    failed.push(source.display().to_string());
                }
            }
        }

        tracing::info!("Moved {} of {} file(s) to {}", moved, paths.len(), destination.display());
        if !failed.is_empty() {
            return Err(NitpickerError::FileIoError(format!(
                "Moved {} of {} file(s), could not move: {}",
                moved,
                paths.len(),
                failed.join(", ")
            )));
        }
        Ok(moved)
    }

    fn folder_path(&self, name: &str) -> Result<PathBuf> {
        let name = sanitize_filename(name);
        if name.is_empty() || name == "." || name == ".." {
            return Err(NitpickerError::InvalidInput(format!(
                "Invalid folder name: '{}'",
                name
            )));
        }
        Ok(self.root.join(name))
    }

    async fn existing_folder(&self, name: &str) -> Result<PathBuf> {
        let path = self.folder_path(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => Ok(path),
            _ => Err(NitpickerError::FileNotFound(path.display().to_string())),
        }
    }
}

async fn read_dir(dir: &Path) -> Result<fs::ReadDir> {
    fs::read_dir(dir).await.map_err(|e| {
        NitpickerError::FileIoError(format!("Failed to read directory {}: {}", dir.display(), e))
    })
}

async fn next_entry(entries: &mut fs::ReadDir, dir: &Path) -> Result<Option<fs::DirEntry>> {
    entries.next_entry().await.map_err(|e| {
        NitpickerError::FileIoError(format!(
            "Failed to read directory entry in {}: {}",
            dir.display(),
            e
        ))
    })
}
