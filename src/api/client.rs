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


//! Shared HTTP client
//!
//! One `reqwest::Client` is built per core instance and cloned into the
//! album scraper, the resolver and the executor so they share a connection
//! pool.
//!
//! Only page fetches get a whole-request timeout. Transfers of large video
//! files can legitimately run for a long time, so they are bounded by
//! `idle_timeout` between response headers and chunks instead.

use crate::config::{CoreConfig, DEFAULT_USER_AGENT};
use crate::error::{NitpickerError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub page_timeout: Duration,
    pub connect_timeout: Duration,
    /// Maximum silence on a transfer before it fails
    pub idle_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

impl From<&CoreConfig> for ClientConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            page_timeout: config.request_timeout(),
            connect_timeout: config.connect_timeout(),
            idle_timeout: config.idle_timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_timeout(mut self, timeout: Duration) -> Self {
        self.config.page_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Thin wrapper around `reqwest::Client` for HTML pages and transfers
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| NitpickerError::InvalidInput(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn from_core_config(config: &CoreConfig) -> Result<Self> {
        Self::new(ClientConfig::from(config))
    }

    /// Underlying client, used for streamed transfers
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn idle_timeout(&self) -> Duration {
        self.config.idle_timeout
    }

    /// GET an HTML page and return its body
    ///
    /// Non-success statuses and empty bodies are errors.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.page_timeout)
            .send()
            .await
            .map_err(|e| NitpickerError::from_request(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NitpickerError::UnexpectedStatusCode {
                status_code: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| NitpickerError::from_request(e, url))?;

        if body.trim().is_empty() {
            return Err(NitpickerError::EmptyResponseBody(url.to_string()));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(ClientConfig::builder().page_timeout(Duration::from_secs(5)).build()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_html_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let body = client().fetch_html(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "<html>hi</html>");
    }

    #[tokio::test]
    async fn test_fetch_html_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client().fetch_html(&server.uri()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_fetch_html_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&server)
            .await;

        let err = client().fetch_html(&server.uri()).await.unwrap_err();
        assert!(matches!(err, NitpickerError::EmptyResponseBody(_)));
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        let config = ClientConfig::builder().user_agent("bad\nagent").build();
        assert!(matches!(
            HttpClient::new(config),
            Err(NitpickerError::InvalidInput(_))
        ));
    }
}
