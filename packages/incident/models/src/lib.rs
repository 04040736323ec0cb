#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shooting victim record schema shared across the dashboard toolchain.
//!
//! Every upstream feed row is normalized into an [`IncidentRecord`]: a fixed
//! core schema (DC number, location, date, victim attributes) plus an open
//! `extra` map that carries unrecognized upstream columns through every
//! transformation untouched. Derived enrichment (street block, boundary
//! areas) and side-channel annotations (court cases) live in their own
//! nested types so the merge step can reason about them separately.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Victim age bucket used by the dashboard's demographic breakdowns.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum AgeGroup {
    /// Victim younger than 18.
    #[serde(rename = "Under 18")]
    #[strum(serialize = "Under 18")]
    Under18,
    /// Victim between 18 and 30 (inclusive).
    #[serde(rename = "19 to 30")]
    #[strum(serialize = "19 to 30")]
    Age18To30,
    /// Victim between 31 and 45 (inclusive).
    #[serde(rename = "31 to 45")]
    #[strum(serialize = "31 to 45")]
    Age31To45,
    /// Victim older than 45.
    #[serde(rename = "Greater than 45")]
    #[strum(serialize = "Greater than 45")]
    Over45,
    /// Age missing or unparseable in the source feed.
    #[serde(rename = "Unknown")]
    #[strum(serialize = "Unknown")]
    Unknown,
}

impl AgeGroup {
    /// Buckets a raw age value. `None` and non-finite values map to
    /// [`Self::Unknown`].
    #[must_use]
    pub fn from_age(age: Option<f64>) -> Self {
        match age {
            Some(a) if a.is_finite() && a < 18.0 => Self::Under18,
            Some(a) if a.is_finite() && a <= 30.0 => Self::Age18To30,
            Some(a) if a.is_finite() && a <= 45.0 => Self::Age31To45,
            Some(a) if a.is_finite() => Self::Over45,
            _ => Self::Unknown,
        }
    }
}

/// Nearest street block assigned by the spatial join.
///
/// `segment_id` is the block-level identifier from the street directory,
/// not the raw centerline segment id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetMatch {
    /// Block-level street segment identifier.
    pub segment_id: u64,
    /// Street name (e.g. "N BROAD ST").
    pub street_name: String,
    /// Hundred-block number (e.g. 1500 for the 1500 block).
    pub block_number: i64,
    /// Distance from the incident point to the block, in meters.
    pub distance: f64,
}

/// Administrative areas containing the incident point.
///
/// All fields are `None` when the point is missing or falls outside the
/// corresponding boundary layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaAssignments {
    /// ZIP code.
    pub zip: Option<String>,
    /// Police district number.
    pub police_district: Option<String>,
    /// City council district number.
    pub council_district: Option<String>,
    /// Neighborhood name.
    pub neighborhood: Option<String>,
}

impl AreaAssignments {
    /// `true` if no area was assigned at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.zip.is_none()
            && self.police_district.is_none()
            && self.council_district.is_none()
            && self.neighborhood.is_none()
    }
}

/// One court docket scraped from the UJS portal for an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtCaseSummary {
    /// Docket number (e.g. "CP-51-CR-0001234-2024").
    pub docket_number: String,
    /// Court type (e.g. "Common Pleas").
    pub court_type: Option<String>,
    /// Short caption ("Comm. v. Doe").
    pub caption: Option<String>,
    /// Filing date as printed on the portal.
    pub filing_date: Option<chrono::NaiveDate>,
    /// Case status (e.g. "Active", "Closed").
    pub case_status: Option<String>,
}

/// Sparse side table of scraped dockets, keyed by DC number.
///
/// An absent key means "not yet scraped", not "no court case". An empty
/// list means the portal was searched and returned nothing.
pub type CourtAnnotations = BTreeMap<String, Vec<CourtCaseSummary>>;

/// One shooting victim, normalized from the Open Data Philly feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Stable police case number; the join key across updates and the
    /// court-scraping side channel.
    pub dc_key: String,
    /// When the shooting occurred. `None` when the feed date is missing
    /// or unparseable.
    pub date: Option<NaiveDateTime>,
    /// Latitude (WGS84). `None` when the feed lacks a location.
    pub latitude: Option<f64>,
    /// Longitude (WGS84). `None` when the feed lacks a location.
    pub longitude: Option<f64>,
    /// Whether the shooting was fatal.
    pub fatal: Option<bool>,
    /// Victim race code, with `"H"` substituted when `latino` is set.
    pub race: Option<String>,
    /// Victim sex code.
    pub sex: Option<String>,
    /// Victim age in years.
    pub age: Option<f64>,
    /// Hispanic/Latino flag from the feed.
    pub latino: Option<bool>,
    /// Derived age bucket.
    pub age_group: AgeGroup,
    /// Upstream columns not covered by the typed fields, passed through
    /// verbatim.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
    /// Nearest street block, assigned by the spatial join.
    pub street: Option<StreetMatch>,
    /// Containing administrative areas, assigned by the spatial join.
    #[serde(default)]
    pub areas: AreaAssignments,
    /// Whether a court case exists for this DC number. `None` until the
    /// court side table has been consulted at least once.
    pub has_court_case: Option<bool>,
}

impl IncidentRecord {
    /// Creates a bare record with only the DC number set.
    #[must_use]
    pub fn new(dc_key: impl Into<String>) -> Self {
        Self {
            dc_key: dc_key.into(),
            date: None,
            latitude: None,
            longitude: None,
            fatal: None,
            race: None,
            sex: None,
            age: None,
            latino: None,
            age_group: AgeGroup::Unknown,
            extra: BTreeMap::new(),
            street: None,
            areas: AreaAssignments::default(),
            has_court_case: None,
        }
    }

    /// Returns `(longitude, latitude)` when the record has a usable
    /// location.
    ///
    /// The feed encodes unknown locations as missing fields or zeroed
    /// coordinates; both are treated as "no location", as are non-finite
    /// or out-of-range values.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let (lng, lat) = (self.longitude?, self.latitude?);
        if !lng.is_finite() || !lat.is_finite() {
            return None;
        }
        if lng == 0.0 && lat == 0.0 {
            return None;
        }
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some((lng, lat))
    }

    /// Calendar year of the incident, when the date is known.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.date.map(|d| d.year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(Some(17.9)), AgeGroup::Under18);
        assert_eq!(AgeGroup::from_age(Some(18.0)), AgeGroup::Age18To30);
        assert_eq!(AgeGroup::from_age(Some(30.0)), AgeGroup::Age18To30);
        assert_eq!(AgeGroup::from_age(Some(31.0)), AgeGroup::Age31To45);
        assert_eq!(AgeGroup::from_age(Some(45.0)), AgeGroup::Age31To45);
        assert_eq!(AgeGroup::from_age(Some(46.0)), AgeGroup::Over45);
        assert_eq!(AgeGroup::from_age(None), AgeGroup::Unknown);
        assert_eq!(AgeGroup::from_age(Some(f64::NAN)), AgeGroup::Unknown);
    }

    #[test]
    fn age_group_display_matches_dashboard_labels() {
        assert_eq!(AgeGroup::Under18.to_string(), "Under 18");
        assert_eq!(AgeGroup::Over45.to_string(), "Greater than 45");
    }

    #[test]
    fn coordinates_rejects_zero_and_invalid() {
        let mut rec = IncidentRecord::new("202401001");
        assert_eq!(rec.coordinates(), None);

        rec.longitude = Some(0.0);
        rec.latitude = Some(0.0);
        assert_eq!(rec.coordinates(), None);

        rec.longitude = Some(f64::NAN);
        rec.latitude = Some(39.95);
        assert_eq!(rec.coordinates(), None);

        rec.longitude = Some(-200.0);
        assert_eq!(rec.coordinates(), None);

        rec.longitude = Some(-75.16);
        assert_eq!(rec.coordinates(), Some((-75.16, 39.95)));
    }

    #[test]
    fn extra_map_survives_serde_roundtrip() {
        let mut rec = IncidentRecord::new("202401002");
        rec.extra.insert(
            "wound".to_string(),
            serde_json::Value::String("chest".to_string()),
        );
        let json = serde_json::to_string(&rec).unwrap();
        let back: IncidentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extra["wound"], "chest");
    }
}
