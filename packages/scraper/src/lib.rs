#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scrapers for the two auxiliary dashboard sources.
//!
//! [`homicide_page`] parses the homicide statistics tables on the police
//! department's crime-stats page. [`courts_portal`] looks up court
//! dockets for individual DC numbers on the state judicial portal.
//!
//! Both scrapers separate fetching from parsing: the parse functions
//! take raw HTML so they can be exercised against fixture pages.

pub mod courts_portal;
pub mod homicide_page;

use scraper::Selector;

/// Errors that can occur during scraping operations.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Parsing the response body failed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses a CSS selector string, returning a [`ScrapeError`] on failure.
pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Parse(format!("invalid CSS selector '{selector}': {e}")))
}

/// Collects the trimmed text content of an element.
pub(crate) fn element_text(element: &scraper::ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join("").trim().to_owned()
}
