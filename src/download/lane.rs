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


//! Lane classification by file type

use serde::{Deserialize, Serialize};

/// Extensions handled by the image lane
pub const IMAGE_EXTENSIONS: [&str; 10] = [
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "avif", "tiff", "svg", "ico",
];

/// Concurrency lane a task runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    /// Small raster files: parallel resolution and parallel transfers
    Image,
    /// Everything else: one transfer at a time
    Other,
}

impl Lane {
    /// Classify a file extension (without the dot, any case)
    pub fn for_file_type(file_type: &str) -> Self {
        if is_image(file_type) {
            Lane::Image
        } else {
            Lane::Other
        }
    }
}

pub fn is_image(file_type: &str) -> bool {
    let file_type = file_type.trim().trim_start_matches('.');
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(file_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_types() {
        for ext in ["jpg", "JPEG", "Png", "webp", ".gif", "svg"] {
            assert_eq!(Lane::for_file_type(ext), Lane::Image, "{}", ext);
        }
    }

    #[test]
    fn test_other_types() {
        for ext in ["mp4", "mkv", "zip", "pdf", "", "jpgx"] {
            assert_eq!(Lane::for_file_type(ext), Lane::Other, "{}", ext);
        }
    }
}
