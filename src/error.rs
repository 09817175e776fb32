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


//! Error types for the Nitpicker core
//!
//! Errors are grouped by domain (resolution, transfer, file, database, state)
//! so the orchestrator can turn any failure into a task `Error` row with a
//! readable message. Nothing in here ever reaches the UI as a panic or an
//! exception; the UI only sees the message stored on the task.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NitpickerError>;

#[derive(Error, Debug)]
pub enum NitpickerError {
    // Resolution

    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Worth retrying (timeouts, dropped connections)
        is_transient: bool,
    },

    /// Server answered with a status we cannot use
    #[error("Server responded with unexpected status code: {status_code} for {url}")]
    UnexpectedStatusCode {
        status_code: u16,
        url: String,
    },

    /// Successful response with nothing in it
    #[error("Empty response body for {0}")]
    EmptyResponseBody(String),

    /// Expected link or marker was not present in a fetched page
    #[error("Cannot find {pattern} in {url}")]
    PatternNotFound {
        pattern: String,
        url: String,
    },

    /// Thumbnail URL does not carry a scheme and host
    #[error("Cannot extract domain from thumbnail URL: {0}")]
    MalformedThumbnailUrl(String),

    // Transfer

    /// Transfer produced nothing for longer than the idle timeout
    #[error("No data from {url} for {seconds}s")]
    TransferStalled {
        url: String,
        seconds: u64,
    },

    /// Stream ended before the announced length was reached
    #[error("Download incomplete: expected {expected} bytes, got {actual} bytes")]
    IncompleteDownload {
        expected: u64,
        actual: u64,
    },

    // Files

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File I/O error: {0}")]
    FileIoError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Destination is taken; library moves never overwrite
    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    // Storage

    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Stored value could not be mapped back to a model
    #[error("Invalid data: {0}")]
    InvalidData(String),

    // Input and state

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Rejected by `CoreConfig::validate` or a bad site base URL
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Operation not allowed in the task's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Broken internal invariant (dropped channel, poisoned runtime)
    #[error("Internal error: {0}")]
    InternalError(String),

    // Wrapped library errors
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid regular expression built from configuration
    #[error("Invalid pattern: {0}")]
    RegexError(#[from] regex::Error),
}

impl From<url::ParseError> for NitpickerError {
    fn from(err: url::ParseError) -> Self {
        NitpickerError::InvalidInput(format!("Invalid URL: {}", err))
    }
}

impl NitpickerError {
    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        NitpickerError::RecordNotFound(resource.into())
    }

    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        NitpickerError::InternalError(message.into())
    }

    /// Map a reqwest send/read failure to a network error
    pub fn from_request(err: reqwest::Error, url: &str) -> Self {
        let is_transient = err.is_timeout() || err.is_connect() || err.is_body();
        NitpickerError::NetworkError {
            message: format!("Request to {} failed: {}", url, err),
            is_transient,
        }
    }

    /// HTTP status code carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NitpickerError::UnexpectedStatusCode { status_code, .. } => Some(*status_code),
            NitpickerError::ReqwestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if error came out of the source-page resolution step
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            NitpickerError::NetworkError { .. }
                | NitpickerError::UnexpectedStatusCode { .. }
                | NitpickerError::EmptyResponseBody(_)
                | NitpickerError::PatternNotFound { .. }
                | NitpickerError::MalformedThumbnailUrl(_)
        )
    }

    /// Check if error is related to file/disk operations
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            NitpickerError::FileNotFound(_)
                | NitpickerError::FileIoError(_)
                | NitpickerError::InvalidPath(_)
                | NitpickerError::FileAlreadyExists(_)
                | NitpickerError::IoError(_)
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            NitpickerError::UnexpectedStatusCode { status_code: 403, .. } => {
                "The file host refused the request (HTTP 403). Try again later.".to_string()
            }
            NitpickerError::UnexpectedStatusCode { status_code: 404, .. } => {
                "The file is no longer available (HTTP 404).".to_string()
            }
            NitpickerError::NetworkError { is_transient: true, .. }
            | NitpickerError::TransferStalled { .. } => {
                "Network connection problem. Please check your connection and retry.".to_string()
            }
            NitpickerError::IncompleteDownload { expected, actual } => {
                format!(
                    "Download was cut short ({} of {} bytes). Please retry.",
                    actual, expected
                )
            }
            _ => self.to_string(),
        }
    }
}
