//! Applies a homicide-page scrape to the persisted daily totals table.
//!
//! The police site republishes its counter irregularly, so each run
//! compares the page's "as of" date to the latest stored row and only
//! appends when the page is newer. A year-to-date total that went
//! *down* within the same year means the page (or our parse of it)
//! is wrong; that aborts the update instead of poisoning the table.

use chrono::Datelike;
use gv_dashboard_scraper::homicide_page::{DailyTotal, HomicideStats};

/// Errors raised while applying a homicide scrape.
#[derive(Debug, thiserror::Error)]
pub enum HomicideError {
    /// The page parsed without a current-year YTD value.
    #[error("homicide page has no current-year YTD total")]
    MissingYtd,

    /// The fresh YTD total is lower than the stored one for the same
    /// year.
    #[error(
        "new YTD homicide total ({new_total}) is less than previous YTD total ({old_total})"
    )]
    Decrease {
        /// Freshly scraped total.
        new_total: u32,
        /// Previously stored total.
        old_total: u32,
    },
}

/// Merges a scrape into the stored daily totals.
///
/// Returns `None` when the stored table is already current (the page's
/// "as of" date is not newer), leaving the table untouched. Otherwise
/// returns the updated table: the new row appended, duplicates by date
/// collapsed keeping the latest, sorted ascending.
///
/// `force` bypasses both the freshness check and the monotonicity
/// check, for manual repair runs.
///
/// # Errors
///
/// Returns [`HomicideError`] when the page lacks a YTD value or the
/// total decreased within the same year.
pub fn apply_scrape(
    prior: &[DailyTotal],
    stats: &HomicideStats,
    force: bool,
) -> Result<Option<Vec<DailyTotal>>, HomicideError> {
    let latest = prior.last();

    if !force && latest.is_some_and(|row| row.date >= stats.as_of) {
        log::info!(
            "Homicide totals are current (stored {}, page {})",
            latest.map(|r| r.date.to_string()).unwrap_or_default(),
            stats.as_of
        );
        return Ok(None);
    }

    let ytd = stats.current_ytd().ok_or(HomicideError::MissingYtd)?;

    if let Some(previous) = latest
        && !force
        && ytd < previous.total
        && previous.date.year() == stats.as_of.year()
    {
        return Err(HomicideError::Decrease {
            new_total: ytd,
            old_total: previous.total,
        });
    }

    let mut totals = prior.to_vec();
    totals.push(DailyTotal {
        date: stats.as_of,
        total: ytd,
    });

    // Collapse duplicate dates keeping the last-appended row.
    totals.sort_by_key(|row| row.date);
    totals.reverse();
    totals.dedup_by_key(|row| row.date);
    totals.reverse();

    log::info!("Appended homicide total {ytd} as of {}", stats.as_of);
    Ok(Some(totals))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(date: &str) -> chrono::NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(11, 59, 0)
            .unwrap()
    }

    fn stats(as_of: &str, ytd: u32) -> HomicideStats {
        HomicideStats {
            years: vec![2024, 2023],
            as_of: day(as_of),
            ytd_totals: vec![(2024, ytd), (2023, 389)],
            annual_totals: vec![(2023, 410)],
        }
    }

    #[test]
    fn appends_when_page_is_newer() {
        let prior = vec![DailyTotal {
            date: day("2024-12-01"),
            total: 245,
        }];
        let updated = apply_scrape(&prior, &stats("2024-12-08", 250), false)
            .unwrap()
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(updated.last().unwrap().total, 250);
    }

    #[test]
    fn skips_when_already_current() {
        let prior = vec![DailyTotal {
            date: day("2024-12-08"),
            total: 250,
        }];
        assert!(apply_scrape(&prior, &stats("2024-12-08", 250), false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn same_year_decrease_is_an_error() {
        let prior = vec![DailyTotal {
            date: day("2024-12-01"),
            total: 260,
        }];
        let err = apply_scrape(&prior, &stats("2024-12-08", 250), false).unwrap_err();
        assert!(matches!(
            err,
            HomicideError::Decrease {
                new_total: 250,
                old_total: 260
            }
        ));
    }

    #[test]
    fn new_year_reset_is_not_a_decrease() {
        let prior = vec![DailyTotal {
            date: day("2024-12-31"),
            total: 260,
        }];
        let updated = apply_scrape(&prior, &stats("2025-01-03", 2), false)
            .unwrap()
            .unwrap();
        assert_eq!(updated.last().unwrap().total, 2);
    }

    #[test]
    fn force_bypasses_checks_and_dedups_by_date() {
        let prior = vec![DailyTotal {
            date: day("2024-12-08"),
            total: 260,
        }];
        let updated = apply_scrape(&prior, &stats("2024-12-08", 250), true)
            .unwrap()
            .unwrap();
        // Same date: the fresh row replaces the stored one.
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].total, 250);
    }

    #[test]
    fn empty_table_bootstraps() {
        let updated = apply_scrape(&[], &stats("2024-12-08", 250), false)
            .unwrap()
            .unwrap();
        assert_eq!(updated.len(), 1);
    }
}
