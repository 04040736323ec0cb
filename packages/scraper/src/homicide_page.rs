//! Homicide statistics scraped from the police department's
//! crime-maps-and-stats page.
//!
//! The page carries two `#homicide-stats` tables: the first holds the
//! "as of" date and year-to-date totals per year (current year styled
//! with a `.homicides-count` cell), the second holds final annual totals
//! for past years. Parsing is deliberately positional, mirroring the
//! page's fixed layout; any length mismatch between the year header and
//! a totals row is treated as layout drift and fails the scrape.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::{ScrapeError, element_text, parse_selector};

/// URL of the crime statistics page.
pub const URL: &str = "https://www.phillypolice.com/crime-maps-stats/";

/// One row of the daily homicide totals table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotal {
    /// The page's "as of" timestamp at scrape time.
    pub date: NaiveDateTime,
    /// Year-to-date homicide count on that date.
    pub total: u32,
}

/// Everything parsed from the homicide statistics tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomicideStats {
    /// Years covered by the page, most recent first.
    pub years: Vec<i32>,
    /// The page's "as of" timestamp.
    pub as_of: NaiveDateTime,
    /// Year-to-date totals, one per year, most recent first.
    pub ytd_totals: Vec<(i32, u32)>,
    /// Final annual totals for past years, most recent first.
    pub annual_totals: Vec<(i32, u32)>,
}

impl HomicideStats {
    /// The current year's YTD total (the page's headline number).
    #[must_use]
    pub fn current_ytd(&self) -> Option<u32> {
        self.ytd_totals.first().map(|&(_, total)| total)
    }
}

/// Fetches and parses the homicide statistics page.
///
/// # Errors
///
/// Returns [`ScrapeError`] if the request fails or the page no longer
/// matches the expected layout.
pub async fn fetch(client: &reqwest::Client) -> Result<HomicideStats, ScrapeError> {
    let response = client.get(URL).send().await?.error_for_status()?;
    let body = response.text().await?;
    parse(&body)
}

/// Parses the homicide statistics from raw page HTML.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] when the tables are missing, a number
/// or date fails to parse, or the year header disagrees in length with
/// a totals row.
#[allow(clippy::too_many_lines)]
pub fn parse(html: &str) -> Result<HomicideStats, ScrapeError> {
    let document = Html::parse_document(html);

    let table_sel = parse_selector("#homicide-stats")?;
    let mut tables = document.select(&table_sel);
    let ytd_table = tables
        .next()
        .ok_or_else(|| ScrapeError::Parse("no #homicide-stats table found".to_owned()))?;
    let annual_table = tables
        .next()
        .ok_or_else(|| ScrapeError::Parse("no annual #homicide-stats table found".to_owned()))?;

    // ── Years from the header row ───────────────────────────────────
    let header_sel = parse_selector("tr th")?;
    let years: Vec<i32> = ytd_table
        .select(&header_sel)
        .skip(1)
        .map(|th| parse_count(&element_text(&th)).map(|n| n as i32))
        .collect::<Result<_, _>>()?;

    if years.is_empty() {
        return Err(ScrapeError::Parse("no years in header row".to_owned()));
    }

    // ── "As of" date from the first body cell ───────────────────────
    let first_cell_sel = parse_selector("tbody td")?;
    let as_of_cell = ytd_table
        .select(&first_cell_sel)
        .next()
        .ok_or_else(|| ScrapeError::Parse("no body cells in YTD table".to_owned()))?;
    let as_of_text = element_text(&as_of_cell);
    let as_of_line = as_of_text.lines().next().unwrap_or("").trim();
    let as_of = parse_as_of_date(as_of_line)?;

    // ── YTD totals ──────────────────────────────────────────────────
    // The current year's count sits in the styled `.homicides-count`
    // cell; the remaining years follow as plain cells (the final cell
    // is a percent-change column and is skipped).
    let count_sel = parse_selector("tbody .homicides-count")?;
    let current_count_cell = ytd_table
        .select(&count_sel)
        .next()
        .ok_or_else(|| ScrapeError::Parse("no .homicides-count cell".to_owned()))?;

    let mut ytd_values = vec![parse_count(&element_text(&current_count_cell))?];

    let body_cells: Vec<String> = ytd_table
        .select(&first_cell_sel)
        .map(|td| element_text(&td))
        .collect();
    if body_cells.len() < 3 {
        return Err(ScrapeError::Parse("YTD table has too few cells".to_owned()));
    }
    for cell in &body_cells[2..body_cells.len() - 1] {
        ytd_values.push(parse_count(cell)?);
    }

    if ytd_values.len() != years.len() {
        return Err(ScrapeError::Parse(format!(
            "length mismatch between parsed years ({}) and YTD homicide totals ({})",
            years.len(),
            ytd_values.len()
        )));
    }
    let ytd_totals: Vec<(i32, u32)> = years.iter().copied().zip(ytd_values).collect();

    // ── Annual totals (past years only) ─────────────────────────────
    let annual_cell_sel = parse_selector("td")?;
    let annual_values: Vec<u32> = annual_table
        .select(&annual_cell_sel)
        .skip(1)
        .map(|td| parse_count(&element_text(&td)))
        .collect::<Result<_, _>>()?;

    if annual_values.len() != years.len() - 1 {
        return Err(ScrapeError::Parse(format!(
            "length mismatch between parsed years and annual homicide totals ({} vs {})",
            years.len() - 1,
            annual_values.len()
        )));
    }
    let annual_totals: Vec<(i32, u32)> =
        years[1..].iter().copied().zip(annual_values).collect();

    Ok(HomicideStats {
        years,
        as_of,
        ytd_totals,
        annual_totals,
    })
}

/// Parses a count cell, tolerating thousands separators and surrounding
/// text.
fn parse_count(text: &str) -> Result<u32, ScrapeError> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits
        .parse()
        .map_err(|_| ScrapeError::Parse(format!("not a count: '{text}'")))
}

/// Parses the page's "as of" line into a timestamp.
///
/// The stored timestamp uses 11:59 so a same-day re-scrape compares
/// fresh against the previous run.
fn parse_as_of_date(line: &str) -> Result<NaiveDateTime, ScrapeError> {
    let trimmed = line.trim();
    let cleaned = if trimmed.len() >= 5 && trimmed[..5].eq_ignore_ascii_case("as of") {
        trimmed[5..].trim()
    } else {
        trimmed
    };

    let date = NaiveDate::parse_from_str(cleaned, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(cleaned, "%B %d, %Y"))
        .map_err(|_| ScrapeError::Parse(format!("unrecognized as-of date: '{line}'")))?;

    Ok(date.and_time(
        NaiveTime::from_hms_opt(11, 59, 0).expect("valid time"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <table id="homicide-stats">
          <tr>
            <th>Homicides</th><th>2024</th><th>2023</th><th>2022</th>
          </tr>
          <tbody>
            <tr>
              <td>As of 12/08/2024</td>
              <td class="homicides-count">250</td>
              <td>389</td>
              <td>505</td>
              <td>-35%</td>
            </tr>
          </tbody>
        </table>
        <table id="homicide-stats">
          <tr><th>Year</th><th>2023</th><th>2022</th></tr>
          <tbody>
            <tr><td>Total</td><td>410</td><td>516</td></tr>
          </tbody>
        </table>
    "#;

    #[test]
    fn parses_fixture_page() {
        let stats = parse(FIXTURE).unwrap();
        assert_eq!(stats.years, vec![2024, 2023, 2022]);
        assert_eq!(stats.as_of.to_string(), "2024-12-08 11:59:00");
        assert_eq!(
            stats.ytd_totals,
            vec![(2024, 250), (2023, 389), (2022, 505)]
        );
        assert_eq!(stats.annual_totals, vec![(2023, 410), (2022, 516)]);
        assert_eq!(stats.current_ytd(), Some(250));
    }

    #[test]
    fn year_count_mismatch_is_parse_error() {
        // Drop one YTD cell so years and totals disagree.
        let broken = FIXTURE.replace("<td>389</td>", "");
        let err = parse(&broken).unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)), "{err}");
    }

    #[test]
    fn missing_tables_are_parse_errors() {
        let err = parse("<html><body>nothing here</body></html>").unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[test]
    fn count_parsing_strips_separators() {
        assert_eq!(parse_count("1,234").unwrap(), 1234);
        assert!(parse_count("n/a").is_err());
    }

    #[test]
    fn as_of_accepts_long_month_format() {
        let parsed = parse_as_of_date("As of December 8, 2024").unwrap();
        assert_eq!(parsed.to_string(), "2024-12-08 11:59:00");
    }
}
