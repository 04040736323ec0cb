//! Court docket lookups on the state Unified Judicial System portal.
//!
//! The portal's case search supports lookup by police incident (DC)
//! number and renders results as a fixed-column grid. Each DC number
//! resolves to zero or more docket summaries; zero results is a normal
//! outcome ("no court case filed yet"), not an error.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use gv_dashboard_incident_models::{CourtAnnotations, CourtCaseSummary};
use regex::Regex;
use scraper::Html;

use crate::{ScrapeError, element_text, parse_selector};

/// Base URL of the UJS portal case search.
pub const SEARCH_URL: &str = "https://ujsportal.pacourts.us/CaseSearch";

/// Fixed column positions in the portal's result grid.
const DOCKET_COL: usize = 2;
const COURT_COL: usize = 3;
const CAPTION_COL: usize = 4;
const FILING_DATE_COL: usize = 5;
const STATUS_COL: usize = 6;

/// Progress hook for long scrape batches, `(done, total)` per incident.
pub type BatchProgress<'a> = &'a dyn Fn(usize, usize);

/// Scraper for the UJS portal, one DC number at a time.
pub struct CourtsPortal {
    client: reqwest::Client,
    /// Pause between consecutive portal requests.
    sleep: Duration,
    /// Filter for docket-shaped strings (e.g. "MC-51-CR-0012345-2024");
    /// the grid occasionally renders navigation rows that must not be
    /// mistaken for results.
    docket_re: Regex,
}

impl CourtsPortal {
    /// Creates a portal scraper that pauses `sleep_secs` between
    /// requests.
    ///
    /// # Panics
    ///
    /// Panics if the static docket pattern fails to compile, which
    /// cannot happen for the embedded literal.
    #[must_use]
    pub fn new(sleep_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            sleep: Duration::from_secs(sleep_secs),
            docket_re: Regex::new(r"^[A-Z]{2}-\d{2}-[A-Z]{2}-\d{7}-\d{4}$")
                .expect("static docket pattern"),
        }
    }

    /// Looks up the dockets filed against one DC number.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the request fails or the result page
    /// is not parseable. A successful search with no matching dockets
    /// returns an empty list.
    pub async fn scrape_incident(
        &self,
        dc_key: &str,
    ) -> Result<Vec<CourtCaseSummary>, ScrapeError> {
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("SearchBy", "PoliceIncidentNumber"),
                ("PoliceIncidentNumber", dc_key),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        self.parse_results(&body)
    }

    /// Scrapes a batch of DC numbers sequentially, pausing between
    /// requests.
    ///
    /// Per-incident failures are logged and the incident is left out of
    /// the result map (absent means "not yet scraped", so the next run
    /// retries it). Only the map of successfully searched incidents is
    /// returned.
    pub async fn scrape_incidents(
        &self,
        dc_keys: &[String],
        progress: Option<BatchProgress<'_>>,
    ) -> CourtAnnotations {
        let mut results = CourtAnnotations::new();

        for (i, dc_key) in dc_keys.iter().enumerate() {
            if i > 0 && !self.sleep.is_zero() {
                tokio::time::sleep(self.sleep).await;
            }

            match self.scrape_incident(dc_key).await {
                Ok(cases) => {
                    if !cases.is_empty() {
                        log::debug!("{dc_key}: {} docket(s)", cases.len());
                    }
                    results.insert(dc_key.clone(), cases);
                }
                Err(e) => {
                    log::warn!("Courts lookup failed for {dc_key}: {e}");
                }
            }

            if let Some(report) = progress {
                report(i + 1, dc_keys.len());
            }
        }

        log::info!(
            "Courts scrape complete — {}/{} incidents searched",
            results.len(),
            dc_keys.len()
        );
        results
    }

    /// Parses the result grid out of a search response page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] for selector failures. A page
    /// without the grid parses as "no results".
    pub fn parse_results(&self, html: &str) -> Result<Vec<CourtCaseSummary>, ScrapeError> {
        let document = Html::parse_document(html);
        let row_sel = parse_selector("#caseSearchResultGrid tbody tr")?;
        let cell_sel = parse_selector("td")?;

        let mut cases = Vec::new();
        for row in document.select(&row_sel) {
            let cells: Vec<String> = row
                .select(&cell_sel)
                .map(|td| element_text(&td))
                .collect();

            let Some(docket_number) = cells.get(DOCKET_COL) else {
                continue;
            };
            if !self.docket_re.is_match(docket_number) {
                continue;
            }

            cases.push(CourtCaseSummary {
                docket_number: docket_number.clone(),
                court_type: non_empty(cells.get(COURT_COL)),
                caption: non_empty(cells.get(CAPTION_COL)),
                filing_date: cells
                    .get(FILING_DATE_COL)
                    .and_then(|s| NaiveDate::parse_from_str(s, "%m/%d/%Y").ok()),
                case_status: non_empty(cells.get(STATUS_COL)),
            });
        }

        Ok(cases)
    }
}

impl Default for CourtsPortal {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Wraps a [`CourtsPortal`] in an [`Arc`] for sharing across tasks.
#[must_use]
pub fn shared(sleep_secs: u64) -> Arc<CourtsPortal> {
    Arc::new(CourtsPortal::new(sleep_secs))
}

fn non_empty(cell: Option<&String>) -> Option<String> {
    cell.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
