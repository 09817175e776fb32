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


//! Direct URL resolution
//!
//! A file's page on the gallery site links to a `get.<host>/file/<n>` page.
//! That link is the Referer the CDN wants; the direct URL itself is built
//! from the thumbnail's host and the file id.
//!
//! # Algorithm
//! 1. Fetch the source page (non-success status or empty body fails)
//! 2. Find `href="https://get.<host>/file/<digits>"` in the raw HTML
//! 3. Take scheme+host of the thumbnail URL as the base domain
//! 4. Build the file URL:
//!    - images: `{base}/{id}.{ext}?n={name}`
//!    - otherwise the first matching entry of [`CDN_RULES`]
//!    - otherwise the base domain with its `i-` host prefix removed

use crate::api::client::HttpClient;
use crate::download::lane::is_image;
use crate::error::{NitpickerError, Result};
use crate::file::paths::stable_id;
use crate::storage::DownloadTask;
use regex::Regex;

/// Ordered (substring of base domain, CDN origin) pairs for non-image files
pub const CDN_RULES: &[(&str, &str)] = &[
    ("burger", "https://brg-bk.cdn.gigachad-cdn.ru"),
    ("milkshake", "https://mlk-bk.cdn.gigachad-cdn.ru"),
];

/// Resolution result for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrls {
    /// Referer required by the CDN
    pub download_page_url: String,
    pub file_url: String,
}

#[derive(Debug, Clone)]
pub struct UrlResolver {
    client: HttpClient,
    download_page_pattern: Regex,
    base_domain_pattern: Regex,
}

impl UrlResolver {
    /// `download_page_host` is the `<host>` in `https://get.<host>/file/<n>`
    pub fn new(client: HttpClient, download_page_host: &str) -> Result<Self> {
        let download_page_pattern = Regex::new(&format!(
            r#"href="(https://get\.{}/file/\d+)""#,
            regex::escape(download_page_host.trim())
        ))?;
        let base_domain_pattern = Regex::new(r"^(https?://[^/]+)")?;

        Ok(Self {
            client,
            download_page_pattern,
            base_domain_pattern,
        })
    }

    /// Resolve referer and direct URL for a task
    pub async fn resolve(&self, task: &DownloadTask) -> Result<ResolvedUrls> {
        tracing::debug!(task_id = %task.id, "Resolving {}", task.source_page_url);

        let html = self.client.fetch_html(&task.source_page_url).await?;
        let download_page_url = self.find_download_page(&html, &task.source_page_url)?;

        let id = if task.id.is_empty() {
            stable_id(&task.thumbnail_url, &task.source_page_url)
        } else {
            task.id.clone()
        };
        let file_url = self.build_file_url(&id, &task.file_type, &task.file_name, &task.thumbnail_url)?;

        Ok(ResolvedUrls {
            download_page_url,
            file_url,
        })
    }

    fn find_download_page(&self, html: &str, page_url: &str) -> Result<String> {
        self.download_page_pattern
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| NitpickerError::PatternNotFound {
                pattern: "download page URL".to_string(),
                url: page_url.to_string(),
            })
    }

    /// Scheme and host of a thumbnail URL
    pub fn base_domain<'a>(&self, thumbnail_url: &'a str) -> Result<&'a str> {
        self.base_domain_pattern
            .captures(thumbnail_url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| NitpickerError::MalformedThumbnailUrl(thumbnail_url.to_string()))
    }

    pub fn build_file_url(
        &self,
        id: &str,
        file_type: &str,
        file_name: &str,
        thumbnail_url: &str,
    ) -> Result<String> {
        let base_domain = self.base_domain(thumbnail_url)?;
        let origin = file_origin(base_domain, file_type);

        Ok(format!(
            "{}/{}.{}?n={}",
            origin,
            id,
            file_type,
            urlencoding::encode(file_name)
        ))
    }
}

/// Origin serving the full file for a thumbnail host
pub fn file_origin(base_domain: &str, file_type: &str) -> String {
    if is_image(file_type) {
        return base_domain.to_string();
    }

    CDN_RULES
        .iter()
        .find(|(needle, _)| base_domain.contains(needle))
        .map(|(_, origin)| origin.to_string())
        .unwrap_or_else(|| base_domain.replacen("://i-", "://", 1))
}
