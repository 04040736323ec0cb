#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shooting victims feed: download and normalization.
//!
//! The Open Data Philly shooting victims table is served through the
//! city's Carto SQL API. [`carto`] handles the paginated download,
//! [`normalize`] maps raw rows into [`gv_dashboard_incident_models::IncidentRecord`],
//! and [`retry`] gives every HTTP request automatic backoff for
//! transient failures.

pub mod carto;
pub mod normalize;
pub mod progress;
pub mod retry;

/// Carto SQL API endpoint for Open Data Philly.
pub const ENDPOINT: &str = "https://phl.carto.com/api/v2/sql";

/// Carto table holding the shooting victims feed.
pub const TABLE_NAME: &str = "shootings";

/// Errors that can occur during feed operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data normalization error.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}

/// Configuration for fetching the feed.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum number of records to fetch (useful for testing).
    pub limit: Option<u64>,
    /// Records per page.
    pub page_size: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            limit: None,
            page_size: 10_000,
        }
    }
}
