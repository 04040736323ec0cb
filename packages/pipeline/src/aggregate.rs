//! Cumulative daily victim counts.
//!
//! Counts are recomputed from the full merged table on every run rather
//! than incrementally, so a record that arrives or is revised after its
//! nominal date retroactively corrects that date's totals. The engine
//! never reads the clock: the reporting date is a parameter, and the
//! same (table, date) pair always produces identical output.
//!
//! Each year is a full-calendar series over `"Jan 01"`..`"Dec 31"`
//! labels (Feb 29 included so leap years align). Past years run to
//! year end; the reporting year is cut to `None` after its last
//! observed incident date, which is how the dashboard distinguishes
//! "zero shootings so far" from "not yet reported".

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use gv_dashboard_incident_models::IncidentRecord;

/// Month labels used in the published day index.
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Days per month in the label calendar. February is 29 so the index
/// covers leap years; non-leap years simply never count on Feb 29.
const DAYS_IN_MONTH: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Number of labels in the full-calendar index.
const CALENDAR_DAYS: usize = 366;

/// Per-year daily and cumulative series aligned to the label calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSeries {
    /// Victims per day. `None` past the reporting-year cut.
    pub daily: Vec<Option<u32>>,
    /// Running total. `None` past the reporting-year cut.
    pub cumulative: Vec<Option<u32>>,
}

/// Cumulative daily counts for every year in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeDaily {
    /// `"Jan 01"`-style labels, one per calendar day.
    pub labels: Vec<String>,
    /// Series per year, keyed by calendar year.
    pub years: BTreeMap<i32, YearSeries>,
}

impl CumulativeDaily {
    /// Serializes to the published JSON shape: one array per year keyed
    /// by the year string, plus the shared `date` label array.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (year, series) in &self.years {
            object.insert(
                year.to_string(),
                serde_json::Value::Array(
                    series
                        .cumulative
                        .iter()
                        .map(|v| {
                            v.map_or(serde_json::Value::Null, |n| {
                                serde_json::Value::Number(n.into())
                            })
                        })
                        .collect(),
                ),
            );
        }
        object.insert(
            "date".to_string(),
            serde_json::Value::Array(
                self.labels
                    .iter()
                    .map(|l| serde_json::Value::String(l.clone()))
                    .collect(),
            ),
        );
        serde_json::Value::Object(object)
    }
}

/// Computes cumulative daily counts over the records that pass `keep`.
///
/// `as_of` selects the reporting year (the one that gets the `None`
/// tail); records dated after `as_of` still count, since the recompute
/// always reflects the full table.
pub fn cumulative_daily<F>(
    records: &[IncidentRecord],
    as_of: NaiveDate,
    keep: F,
) -> CumulativeDaily
where
    F: Fn(&IncidentRecord) -> bool,
{
    // Victims per (year, label index).
    let mut counts: BTreeMap<i32, Vec<u32>> = BTreeMap::new();
    // Last observed label index per year.
    let mut last_observed: BTreeMap<i32, usize> = BTreeMap::new();

    for record in records {
        let Some(date) = record.date else {
            continue;
        };
        if !keep(record) {
            continue;
        }
        let year = date.year();
        let index = label_index(date.month(), date.day());
        counts.entry(year).or_insert_with(|| vec![0; CALENDAR_DAYS])[index] += 1;
        last_observed
            .entry(year)
            .and_modify(|i| *i = (*i).max(index))
            .or_insert(index);
    }

    let reporting_year = as_of.year();
    let mut years = BTreeMap::new();

    for (year, daily_counts) in counts {
        let cut = if year == reporting_year {
            // The tail starts the day after the last observed incident.
            last_observed.get(&year).map_or(0, |i| i + 1)
        } else {
            CALENDAR_DAYS
        };

        let mut running = 0u32;
        let mut daily = Vec::with_capacity(CALENDAR_DAYS);
        let mut cumulative = Vec::with_capacity(CALENDAR_DAYS);
        for (i, &count) in daily_counts.iter().enumerate() {
            if i < cut {
                running += count;
                daily.push(Some(count));
                cumulative.push(Some(running));
            } else {
                daily.push(None);
                cumulative.push(None);
            }
        }

        years.insert(year, YearSeries { daily, cumulative });
    }

    CumulativeDaily {
        labels: calendar_labels(),
        years,
    }
}

/// Builds the `"Jan 01"`..`"Dec 31"` label array.
fn calendar_labels() -> Vec<String> {
    let mut labels = Vec::with_capacity(CALENDAR_DAYS);
    for (month_idx, &days) in DAYS_IN_MONTH.iter().enumerate() {
        for day in 1..=days {
            labels.push(format!("{} {day:02}", MONTHS[month_idx]));
        }
    }
    labels
}

/// Index of a (month, day) pair in the label calendar.
fn label_index(month: u32, day: u32) -> usize {
    let month_offset: u32 = DAYS_IN_MONTH[..(month as usize - 1)].iter().sum();
    (month_offset + day - 1) as usize
}
