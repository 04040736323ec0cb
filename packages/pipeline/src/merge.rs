//! Field-level reconciliation of the freshly downloaded incident table
//! against the previously persisted one.
//!
//! The upstream feed is re-downloaded in full on every run and silently
//! drops and revises rows. A wholesale replace would lose enrichment
//! that is expensive to recompute (street assignment) or to re-scrape
//! (court annotations), so the merge reconciles per field, keyed by DC
//! number:
//!
//! - every identifier present in either table appears exactly once;
//! - fresh feed values win, except derived and side-channel fields,
//!   which are preserved from the prior table when the fresh record
//!   lacks them;
//! - identifiers that vanished from the feed are retained unless an
//!   explicit upstream-deletion signal names them.
//!
//! A fresh table far smaller than the prior one is treated as an
//! upstream outage, not as "no more shootings": the merge refuses with
//! [`MergeError::SuspiciousDrop`] before any persisted state changes.

use std::collections::{BTreeMap, BTreeSet};

use gv_dashboard_incident_models::IncidentRecord;

/// Tunable merge policies.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Minimum allowed ratio of fresh rows to prior rows. Below this
    /// the merge fails with [`MergeError::SuspiciousDrop`].
    pub min_new_fraction: f64,
    /// DC numbers explicitly deleted upstream; prior-only records with
    /// these keys are removed instead of retained.
    pub upstream_deletions: BTreeSet<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_new_fraction: 0.5,
            upstream_deletions: BTreeSet::new(),
        }
    }
}

/// Errors raised by the merge.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The fresh table is implausibly smaller than the prior table.
    #[error(
        "suspicious drop: fresh table has {new_len} rows against {prior_len} prior \
         (minimum fraction {min_fraction})"
    )]
    SuspiciousDrop {
        /// Rows in the fresh table.
        new_len: usize,
        /// Rows in the prior table.
        prior_len: usize,
        /// The configured minimum fraction.
        min_fraction: f64,
    },
}

/// Merges the fresh table into the prior table.
///
/// The output is sorted newest-first with the DC number as tiebreaker,
/// so identical inputs always produce byte-identical persisted output.
/// Re-merging the result with the same fresh table is a no-op.
///
/// # Errors
///
/// Returns [`MergeError::SuspiciousDrop`] when the fresh table falls
/// below the configured fraction of the prior table's size.
#[allow(clippy::cast_precision_loss)]
pub fn merge_tables(
    prior: &[IncidentRecord],
    fresh: &[IncidentRecord],
    config: &MergeConfig,
) -> Result<Vec<IncidentRecord>, MergeError> {
    if !prior.is_empty() && (fresh.len() as f64) < config.min_new_fraction * prior.len() as f64
    {
        return Err(MergeError::SuspiciousDrop {
            new_len: fresh.len(),
            prior_len: prior.len(),
            min_fraction: config.min_new_fraction,
        });
    }

    let mut prior_by_key: BTreeMap<&str, &IncidentRecord> = BTreeMap::new();
    for record in prior {
        if prior_by_key.insert(&record.dc_key, record).is_some() {
            log::warn!("Prior table has duplicate DC number {}", record.dc_key);
        }
    }

    let mut merged: BTreeMap<String, IncidentRecord> = BTreeMap::new();

    for record in fresh {
        if merged.contains_key(&record.dc_key) {
            log::warn!("Fresh table has duplicate DC number {}", record.dc_key);
            continue;
        }
        let mut out = record.clone();
        if let Some(previous) = prior_by_key.get(record.dc_key.as_str()) {
            reconcile(&mut out, previous);
        }
        merged.insert(out.dc_key.clone(), out);
    }

    let mut retained = 0usize;
    let mut deleted = 0usize;
    for record in prior {
        if merged.contains_key(&record.dc_key) {
            continue;
        }
        if config.upstream_deletions.contains(&record.dc_key) {
            log::info!("Dropping {} (deleted upstream)", record.dc_key);
            deleted += 1;
            continue;
        }
        merged.insert(record.dc_key.clone(), record.clone());
        retained += 1;
    }

    if retained > 0 {
        log::info!("Retained {retained} records no longer present in the feed");
    }
    if deleted > 0 {
        log::info!("Removed {deleted} records deleted upstream");
    }

    let mut output: Vec<IncidentRecord> = merged.into_values().collect();
    output.sort_by(|a, b| match (a.date, b.date) {
        (Some(da), Some(db)) => db.cmp(&da).then_with(|| a.dc_key.cmp(&b.dc_key)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.dc_key.cmp(&b.dc_key),
    });

    log::info!(
        "Merged {} fresh + {} prior rows into {} records",
        fresh.len(),
        prior.len(),
        output.len()
    );
    Ok(output)
}

/// Copies derived and side-channel fields from the prior record into a
/// fresh record that lacks them. Core feed fields are never touched;
/// the fresh download owns those.
fn reconcile(fresh: &mut IncidentRecord, prior: &IncidentRecord) {
    if fresh.street.is_none() {
        fresh.street = prior.street.clone();
    }
    if fresh.areas.zip.is_none() {
        fresh.areas.zip = prior.areas.zip.clone();
    }
    if fresh.areas.police_district.is_none() {
        fresh.areas.police_district = prior.areas.police_district.clone();
    }
    if fresh.areas.council_district.is_none() {
        fresh.areas.council_district = prior.areas.council_district.clone();
    }
    if fresh.areas.neighborhood.is_none() {
        fresh.areas.neighborhood = prior.areas.neighborhood.clone();
    }
    if fresh.has_court_case.is_none() {
        fresh.has_court_case = prior.has_court_case;
    }
    for (key, value) in &prior.extra {
        fresh
            .extra
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use gv_dashboard_incident_models::StreetMatch;

    use super::*;

    fn record(dc_key: &str, day: u32) -> IncidentRecord {
        let mut r = IncidentRecord::new(dc_key);
        r.date = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0);
        r
    }

    fn annotated(dc_key: &str, day: u32) -> IncidentRecord {
        let mut r = record(dc_key, day);
        r.has_court_case = Some(true);
        r.street = Some(StreetMatch {
            segment_id: 7,
            street_name: "N BROAD ST".to_string(),
            block_number: 1500,
            distance: 10.0,
        });
        r
    }

    #[test]
    fn scenario_from_reconciliation_contract() {
        // Prior {1,2,3}, record 2 annotated; fresh {2,3,4} with revised
        // attributes for 2 and 3.
        let prior = vec![record("1", 1), annotated("2", 2), record("3", 3)];
        let mut fresh2 = record("2", 2);
        fresh2.race = Some("B".to_string());
        let mut fresh3 = record("3", 3);
        fresh3.fatal = Some(true);
        let fresh = vec![fresh2, record("4", 4), fresh3];

        let merged = merge_tables(&prior, &fresh, &MergeConfig::default()).unwrap();
        let keys: Vec<&str> = merged.iter().map(|r| r.dc_key.as_str()).collect();
        assert_eq!(keys, vec!["4", "3", "2", "1"]); // newest first

        let two = merged.iter().find(|r| r.dc_key == "2").unwrap();
        assert_eq!(two.race.as_deref(), Some("B")); // revised attribute wins
        assert_eq!(two.has_court_case, Some(true)); // annotation preserved
        assert_eq!(two.street.as_ref().unwrap().segment_id, 7);

        let three = merged.iter().find(|r| r.dc_key == "3").unwrap();
        assert_eq!(three.fatal, Some(true));

        let four = merged.iter().find(|r| r.dc_key == "4").unwrap();
        assert_eq!(four.has_court_case, None); // newly added, unannotated

        let one = merged.iter().find(|r| r.dc_key == "1").unwrap();
        assert_eq!(one, &prior[0]); // retained unchanged
    }

    #[test]
    fn repeated_merge_with_same_fresh_table_is_idempotent() {
        let prior = vec![record("1", 1), annotated("2", 2), record("3", 3)];
        let fresh = vec![record("2", 2), record("3", 3), record("4", 4)];

        let once = merge_tables(&prior, &fresh, &MergeConfig::default()).unwrap();
        let twice = merge_tables(&once, &fresh, &MergeConfig::default()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn suspicious_drop_fails_before_any_change() {
        let prior: Vec<IncidentRecord> = (1..=10).map(|i| record(&i.to_string(), i)).collect();
        let fresh: Vec<IncidentRecord> = (1..=4).map(|i| record(&i.to_string(), i)).collect();

        let err = merge_tables(&prior, &fresh, &MergeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            MergeError::SuspiciousDrop {
                new_len: 4,
                prior_len: 10,
                ..
            }
        ));
    }

    #[test]
    fn empty_prior_table_accepts_any_fresh_table() {
        let fresh = vec![record("1", 1)];
        let merged = merge_tables(&[], &fresh, &MergeConfig::default()).unwrap();
        assert_eq!(merged.len(), 1);

        // And a first run with nothing at all is fine too.
        assert!(merge_tables(&[], &[], &MergeConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn prior_only_records_survive_without_deletion_signal() {
        let prior = vec![record("1", 1), record("2", 2)];
        let fresh = vec![record("2", 2)];

        let merged = merge_tables(&prior, &fresh, &MergeConfig::default()).unwrap();
        assert!(merged.iter().any(|r| r.dc_key == "1"));
    }

    #[test]
    fn deletion_signal_removes_prior_only_records() {
        let prior = vec![record("1", 1), record("2", 2)];
        let fresh = vec![record("2", 2)];
        let config = MergeConfig {
            upstream_deletions: BTreeSet::from(["1".to_string()]),
            ..MergeConfig::default()
        };

        let merged = merge_tables(&prior, &fresh, &config).unwrap();
        assert!(!merged.iter().any(|r| r.dc_key == "1"));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn prior_only_extra_keys_are_preserved() {
        let mut prior_rec = record("1", 1);
        prior_rec
            .extra
            .insert("legacy".to_string(), serde_json::json!("kept"));
        prior_rec
            .extra
            .insert("shared".to_string(), serde_json::json!("old"));

        let mut fresh_rec = record("1", 1);
        fresh_rec
            .extra
            .insert("shared".to_string(), serde_json::json!("new"));

        let merged =
            merge_tables(&[prior_rec], &[fresh_rec], &MergeConfig::default()).unwrap();
        assert_eq!(merged[0].extra["legacy"], "kept");
        assert_eq!(merged[0].extra["shared"], "new");
    }

    #[test]
    fn undated_records_sort_last_by_key() {
        let prior: Vec<IncidentRecord> = Vec::new();
        let fresh = vec![IncidentRecord::new("b"), record("a", 1), IncidentRecord::new("c")];
        let merged = merge_tables(&prior, &fresh, &MergeConfig::default()).unwrap();
        let keys: Vec<&str> = merged.iter().map(|r| r.dc_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
