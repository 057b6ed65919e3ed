//! Storage layer error types

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of body bytes carried into error details
const MAX_DETAIL_BYTES: usize = 2048;

/// Errors from the emulated-filesystem storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Destination already exists: {path}")]
    Conflict { path: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage temporarily unavailable ({status}) for {path}")]
    Transient {
        path: String,
        status: u16,
        detail: String,
    },

    #[error("Storage rejected request ({status}) for {path}")]
    Rejected {
        path: String,
        status: u16,
        detail: String,
    },

    #[error("Malformed directory listing for {path}: {reason}")]
    InvalidListing {
        path: String,
        reason: String,
        body: String,
    },

    #[error("Could not create folder marker: {path}")]
    FolderCreation { path: String },

    #[error("Could not confirm {operation} of {path} within the verification window")]
    VerificationTimeout {
        operation: &'static str,
        path: String,
    },

    #[error("Folder copy incomplete: {copied} of {expected} entries present at destination")]
    PartialCopy { expected: usize, copied: usize },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StorageError {
    /// Classify a non-2xx store response
    pub fn from_status(path: &str, status: StatusCode, body: &[u8]) -> Self {
        let path = path.to_string();
        let detail = truncate_body(body);
        if status == StatusCode::NOT_FOUND {
            Self::NotFound { path }
        } else if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            Self::Transient {
                path,
                status: status.as_u16(),
                detail,
            }
        } else {
            Self::Rejected {
                path,
                status: status.as_u16(),
                detail,
            }
        }
    }

    /// Whether retrying the whole operation is safe and may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. }
                | Self::InvalidListing { .. }
                | Self::FolderCreation { .. }
                | Self::VerificationTimeout { .. }
                | Self::PartialCopy { .. }
                | Self::Network(_)
                | Self::Http(_)
        )
    }

    /// Diagnostic detail for the caller (store response body, raw listing)
    pub fn details(&self) -> Option<String> {
        match self {
            Self::Transient { detail, .. } | Self::Rejected { detail, .. } => {
                (!detail.is_empty()).then(|| detail.clone())
            }
            Self::InvalidListing { body, .. } => Some(body.clone()),
            Self::Http(e) if e.is_timeout() => Some("request timed out".to_string()),
            _ => None,
        }
    }
}

/// Lossy UTF-8 view of a response body, capped for logs and envelopes
pub fn truncate_body(body: &[u8]) -> String {
    let end = body.len().min(MAX_DETAIL_BYTES);
    let mut text = String::from_utf8_lossy(&body[..end]).into_owned();
    if body.len() > MAX_DETAIL_BYTES {
        text.push_str("...");
    }
    text
}
