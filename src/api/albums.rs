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


//! Album catalog scraping
//!
//! Search results and album listings are plain HTML. Cards or items that
//! lack the fields a download needs are skipped with a debug log instead of
//! failing the whole page.

use crate::api::client::HttpClient;
use crate::api::models::{Album, AlbumPage, FileInfo};
use crate::config::CoreConfig;
use crate::error::{NitpickerError, Result};
use scraper::{ElementRef, Html, Selector};
use url::Url;

#[derive(Debug, Clone)]
struct Selectors {
    album_card: Selector,
    album_card_fallback: Selector,
    album_title: Selector,
    album_files: Selector,
    link: Selector,
    pagination: [Selector; 3],
    page_button: Selector,
    file_item: Selector,
    file_name: Selector,
    file_thumbnail: Selector,
    file_size: Selector,
    file_page: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            album_card: parse("div.rounded-xl.bg-mute")?,
            album_card_fallback: parse("div[data-repeat='0']")?,
            album_title: parse("p.text-subs span.truncate")?,
            album_files: parse("p.text-xs span.font-semibold")?,
            link: parse("a[href]")?,
            pagination: [
                parse(r#"div.flex.gap-2[class*="lg:order-last"]"#)?,
                parse("nav div.flex.gap-2")?,
                parse("div.flex.gap-2")?,
            ],
            page_button: parse("a.btn")?,
            file_item: parse("div[class*='relative group/item']")?,
            file_name: parse(r#"p[style*="display:none"]"#)?,
            file_thumbnail: parse("img.grid-images_box-img")?,
            file_size: parse("p.text-xs.theSize")?,
            file_page: parse(r#"a[class*="after:absolute"]"#)?,
        })
    }
}

fn parse(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| NitpickerError::internal(format!("Invalid selector '{}': {:?}", css, e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Scraper for album search and album contents
#[derive(Debug, Clone)]
pub struct AlbumClient {
    client: HttpClient,
    album_site_base: Url,
    file_site_base: Url,
    selectors: Selectors,
}

impl AlbumClient {
    pub fn new(client: HttpClient, album_site_base: &str, file_site_base: &str) -> Result<Self> {
        let album_site_base = Url::parse(album_site_base).map_err(|e| {
            NitpickerError::InvalidConfiguration(format!("album site '{}': {}", album_site_base, e))
        })?;
        let file_site_base = Url::parse(file_site_base).map_err(|e| {
            NitpickerError::InvalidConfiguration(format!("file site '{}': {}", file_site_base, e))
        })?;

        Ok(Self {
            client,
            album_site_base,
            file_site_base,
            selectors: Selectors::new()?,
        })
    }

    pub fn from_core_config(client: HttpClient, config: &CoreConfig) -> Result<Self> {
        Self::new(client, &config.album_site_base, &config.file_site_base)
    }

    /// First result page for an artist, with the number of pages
    pub async fn search(&self, artist: &str) -> Result<AlbumPage> {
        let html = self.client.fetch_html(&self.search_url(artist, None)).await?;
        let document = Html::parse_document(&html);

        let page = AlbumPage {
            albums: self.extract_albums(&document),
            max_page: self.extract_max_page(&document),
        };
        tracing::info!(
            "Search '{}': {} album(s), {} page(s)",
            artist,
            page.albums.len(),
            page.max_page
        );
        Ok(page)
    }

    /// Albums on one result page (1-based)
    pub async fn page(&self, artist: &str, page: u32) -> Result<Vec<Album>> {
        let html = self
            .client
            .fetch_html(&self.search_url(artist, Some(page)))
            .await?;
        let document = Html::parse_document(&html);
        Ok(self.extract_albums(&document))
    }

    /// Files listed in an album; `album_url` may be relative to the album site
    pub async fn files(&self, album_url: &str) -> Result<Vec<FileInfo>> {
        let url = join(&self.album_site_base, album_url)?;
        tracing::debug!("Fetching album listing {}", url);

        let html = self.client.fetch_html(&url).await?;
        let document = Html::parse_document(&html);
        let files = self.extract_files(&document);

        if files.is_empty() {
            tracing::warn!("No files found in {}", url);
        }
        Ok(files)
    }

    fn search_url(&self, artist: &str, page: Option<u32>) -> String {
        let base = self.album_site_base.as_str().trim_end_matches('/');
        let mut url = format!("{}/?search={}", base, urlencoding::encode(artist));
        if let Some(page) = page {
            url.push_str(&format!("&page={}", page));
        }
        url
    }

    fn extract_albums(&self, document: &Html) -> Vec<Album> {
        let s = &self.selectors;
        let mut cards: Vec<ElementRef<'_>> = document.select(&s.album_card).collect();
        if cards.is_empty() {
            cards = document.select(&s.album_card_fallback).collect();
        }

        let mut albums = Vec::with_capacity(cards.len());
        for card in cards {
            let title = card.select(&s.album_title).next().map(text_of).unwrap_or_default();
            let file_count = card
                .select(&s.album_files)
                .next()
                .map(text_of)
                .and_then(|text| text.split_whitespace().next().and_then(|n| n.parse().ok()))
                .unwrap_or(0);
            let url = card
                .select(&s.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .unwrap_or_default()
                .to_string();

            if title.is_empty() || url.is_empty() {
                tracing::debug!("Skipping album card without title or link");
                continue;
            }
            albums.push(Album {
                title,
                file_count,
                url,
            });
        }
        albums
    }

    fn extract_max_page(&self, document: &Html) -> u32 {
        let s = &self.selectors;
        let Some(container) = s
            .pagination
            .iter()
            .find_map(|selector| document.select(selector).next())
        else {
            return 1;
        };

        let mut max_page = 1;
        for link in container.select(&s.page_button) {
            if let Ok(number) = text_of(link).parse::<u32>() {
                max_page = max_page.max(number);
            }
            let from_href = link
                .value()
                .attr("href")
                .and_then(|href| href.split("page=").nth(1))
                .and_then(|rest| rest.split('&').next())
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(number) = from_href {
                max_page = max_page.max(number);
            }
        }
        max_page.max(1)
    }

    fn extract_files(&self, document: &Html) -> Vec<FileInfo> {
        let s = &self.selectors;
        let mut files = Vec::new();

        for item in document.select(&s.file_item) {
            let name = item.select(&s.file_name).next().map(text_of).unwrap_or_default();
            let thumbnail = item
                .select(&s.file_thumbnail)
                .next()
                .and_then(|img| img.value().attr("src"))
                .unwrap_or_default();
            let size = item
                .select(&s.file_size)
                .next()
                .map(text_of)
                .unwrap_or_else(|| "0 B".to_string());
            let page = item
                .select(&s.file_page)
                .next()
                .and_then(|a| a.value().attr("href"))
                .unwrap_or_default();

            if name.is_empty() || thumbnail.is_empty() || page.is_empty() {
                tracing::debug!("Skipping file item with missing fields ('{}')", name);
                continue;
            }
            let page_url = match join(&self.file_site_base, page) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping file '{}': {}", name, e);
                    continue;
                }
            };

            files.push(FileInfo::new(name, size, thumbnail, page_url));
        }
        files
    }
}

/// Absolute links pass through, relative ones are joined onto `base`
fn join(base: &Url, link: &str) -> Result<String> {
    if link.starts_with("http://") || link.starts_with("https://") {
        return Ok(link.to_string());
    }
    Ok(base.join(link)?.into())
}
