//! Homicide totals persistence.
//!
//! The daily table (`homicide_totals_daily.csv`) appends one row per
//! scrape with the page's "as of" timestamp and the YTD count. The
//! per-year JSON (`homicide_totals.json`) publishes annual and YTD
//! totals keyed by year.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use gv_dashboard_scraper::homicide_page::{DailyTotal, HomicideStats};

use crate::{StoreError, write_atomic, write_json_atomic};

/// Timestamp format used in the daily CSV.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Loads the daily totals table, sorted ascending by date.
///
/// A missing file is an empty table.
///
/// # Errors
///
/// Returns [`StoreError`] if the file exists but cannot be parsed.
pub fn load_daily_totals(path: &Path) -> Result<Vec<DailyTotal>, StoreError> {
    if !path.exists() {
        log::info!("No homicide daily totals at {}", path.display());
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut totals = Vec::new();

    for result in reader.records() {
        let row = result?;
        let date_text = row.get(0).unwrap_or("");
        let date = NaiveDateTime::parse_from_str(date_text, DATE_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(date_text, "%Y-%m-%dT%H:%M:%S"))
            .map_err(|_| StoreError::Malformed {
                path: path.display().to_string(),
                message: format!("bad date '{date_text}'"),
            })?;
        let total = row
            .get(1)
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| StoreError::Malformed {
                path: path.display().to_string(),
                message: format!("bad total '{}'", row.get(1).unwrap_or("")),
            })?;
        totals.push(DailyTotal { date, total });
    }

    totals.sort_by_key(|t| t.date);
    Ok(totals)
}

/// Saves the daily totals table.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or the write fails.
pub fn save_daily_totals(path: &Path, totals: &[DailyTotal]) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["date", "total"])?;
    for row in totals {
        writer.write_record([
            row.date.format(DATE_FORMAT).to_string(),
            row.total.to_string(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::Malformed {
            path: path.display().to_string(),
            message: format!("CSV buffer error: {e}"),
        })?;

    write_atomic(path, &bytes)?;
    log::info!("Saved {} daily homicide totals", totals.len());
    Ok(())
}

/// Publishes the per-year totals JSON (annual + YTD keyed by year).
///
/// The current year has no final annual total yet and publishes with
/// `annual: null`.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or the write fails.
pub fn save_year_totals(path: &Path, stats: &HomicideStats) -> Result<(), StoreError> {
    let mut by_year: BTreeMap<String, serde_json::Value> = BTreeMap::new();

    for &(year, ytd) in &stats.ytd_totals {
        let annual = stats
            .annual_totals
            .iter()
            .find(|&&(y, _)| y == year)
            .map(|&(_, total)| total);
        by_year.insert(
            year.to_string(),
            serde_json::json!({ "annual": annual, "ytd": ytd }),
        );
    }

    write_json_atomic(path, &by_year)?;
    log::info!("Saved homicide year totals to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(date: &str, total: u32) -> DailyTotal {
        DailyTotal {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(11, 59, 0)
                .unwrap(),
            total,
        }
    }

    #[test]
    fn daily_totals_roundtrip_sorted() {
        let path = std::env::temp_dir().join(format!(
            "gv_store_homicides_{}.csv",
            std::process::id()
        ));

        save_daily_totals(&path, &[at("2024-12-08", 250), at("2024-12-01", 245)])
            .unwrap();
        let loaded = load_daily_totals(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].total, 245);
        assert_eq!(loaded[1].total, 250);
    }

    #[test]
    fn year_totals_merge_annual_and_ytd() {
        let path = std::env::temp_dir().join(format!(
            "gv_store_homicide_totals_{}.json",
            std::process::id()
        ));

        let stats = HomicideStats {
            years: vec![2024, 2023],
            as_of: at("2024-12-08", 0).date,
            ytd_totals: vec![(2024, 250), (2023, 389)],
            annual_totals: vec![(2023, 410)],
        };
        save_year_totals(&path, &stats).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(json["2024"]["annual"], serde_json::Value::Null);
        assert_eq!(json["2024"]["ytd"], 250);
        assert_eq!(json["2023"]["annual"], 410);
    }
}
