#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch orchestration for the dashboard data toolchain.
//!
//! Two scheduled jobs share this crate. The daily update chains
//! download -> spatial enrichment -> merge -> aggregation and only
//! touches persisted files after every in-memory step has succeeded, so
//! a failed run leaves yesterday's artifacts intact. The weekly job
//! scrapes the court portal over a chunked DC-number split and a
//! finalize step unions the chunk files.

pub mod aggregate;
pub mod courts;
pub mod enrich;
pub mod homicides;
pub mod merge;

use std::sync::Arc;

use gv_dashboard_geography::{ALL_BOUNDARY_LAYERS, COUNCIL_DISTRICTS, POLICE_DISTRICTS, ZIP_CODES};
use gv_dashboard_incident_models::IncidentRecord;
use gv_dashboard_scraper::{courts_portal::CourtsPortal, homicide_page};
use gv_dashboard_source::progress::ProgressCallback;
use gv_dashboard_spatial::{BoundaryIndex, SpatialJoinConfig, StreetIndex};
use gv_dashboard_store::paths::DataPaths;

use crate::merge::MergeConfig;

/// Timestamp format for the `meta.json` stamp.
const META_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Options for the daily update run.
#[derive(Debug, Clone, Default)]
pub struct DailyUpdateOptions {
    /// Cap on downloaded feed rows (testing aid).
    pub limit: Option<u64>,
    /// Merge policies.
    pub merge: MergeConfig,
    /// Spatial join policies.
    pub spatial: SpatialJoinConfig,
    /// Bypass the homicide freshness and monotonicity checks.
    pub force_homicides: bool,
}

/// Runs the daily pre-processing update.
///
/// Steps: download the full shooting victims feed, enrich it against
/// the reference geography, reconcile with the persisted table,
/// recompute cumulative counts, write the shooting artifacts, then
/// refresh the homicide counter and stamp `meta.json`.
///
/// # Errors
///
/// Returns the first fatal error: feed download failures, unusable
/// reference geometry, a suspicious merge drop, homicide scrape
/// failures, or I/O errors. Shooting artifacts are written only after
/// the merge and aggregation have succeeded in memory.
#[allow(clippy::future_not_send)]
pub async fn run_daily_update(
    paths: &DataPaths,
    options: &DailyUpdateOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(), Box<dyn std::error::Error>> {
    paths.ensure()?;

    // ── 1. Download and normalize the feed ──────────────────────────
    log::info!("Downloading shooting victims database");
    let fetch_options = gv_dashboard_source::FetchOptions {
        limit: options.limit,
        ..gv_dashboard_source::FetchOptions::default()
    };
    let rows = gv_dashboard_source::carto::fetch_shootings(&fetch_options, progress).await?;
    let mut fresh = gv_dashboard_source::normalize::normalize_rows(&rows);

    // ── 2. Reference geography and spatial enrichment ───────────────
    let blocks = gv_dashboard_geography::streets::load_street_blocks(
        &paths.streets_source_path(),
    )?;
    let street_index = StreetIndex::build(&blocks, options.spatial)?;

    let client = reqwest::Client::new();
    let mut boundary_indexes = Vec::with_capacity(ALL_BOUNDARY_LAYERS.len());
    for def in ALL_BOUNDARY_LAYERS {
        let layer = gv_dashboard_geography::fetch::fetch_layer(&client, def).await?;
        boundary_indexes.push(BoundaryIndex::build(&layer)?);
    }

    enrich::enrich_records(&mut fresh, &street_index, &boundary_indexes);

    // ── 3. Merge against the persisted table ────────────────────────
    let prior = gv_dashboard_store::incidents::load_incidents(&paths.shootings_path())?;
    let mut merged = merge::merge_tables(&prior, &fresh, &options.merge)?;

    let annotations = gv_dashboard_store::courts::load_annotations(&paths.courts_path())?;
    courts::annotate(&mut merged, &annotations);

    // ── 4. Cumulative counts ────────────────────────────────────────
    let as_of = chrono::Utc::now().date_naive();
    let all = aggregate::cumulative_daily(&merged, as_of, |_| true);
    let fatal = aggregate::cumulative_daily(&merged, as_of, |r| r.fatal == Some(true));
    let nonfatal = aggregate::cumulative_daily(&merged, as_of, |r| r.fatal != Some(true));
    let counts = serde_json::json!({
        "all": all.to_json(),
        "fatal": fatal.to_json(),
        "nonfatal": nonfatal.to_json(),
    });

    // ── 5. Write shooting artifacts (merge + aggregation succeeded) ─
    gv_dashboard_store::incidents::save_incidents(&paths.shootings_path(), &merged)?;
    gv_dashboard_store::incidents::save_processed_years(paths, &merged)?;
    gv_dashboard_store::write_json_atomic(&paths.cumulative_path(), &counts)?;

    // ── 6. Homicide counter ─────────────────────────────────────────
    log::info!("Scraping PPD homicide totals");
    let stats = homicide_page::fetch(&client).await?;
    let daily = gv_dashboard_store::homicides::load_daily_totals(&paths.homicide_daily_path())?;
    if let Some(updated) =
        homicides::apply_scrape(&daily, &stats, options.force_homicides)?
    {
        gv_dashboard_store::homicides::save_daily_totals(
            &paths.homicide_daily_path(),
            &updated,
        )?;
        gv_dashboard_store::homicides::save_year_totals(
            &paths.homicide_totals_path(),
            &stats,
        )?;
    }

    // ── 7. Stamp the run ────────────────────────────────────────────
    let now = chrono::Utc::now().format(META_FORMAT).to_string();
    gv_dashboard_store::write_meta(&paths.meta_path(), &now)?;

    log::info!("Daily update complete ({} records)", merged.len());
    Ok(())
}

/// Runs one weekly court-scrape worker over its chunk of DC numbers.
///
/// With `nprocs == 1` the results update the combined side table
/// directly; otherwise the worker writes its own chunk file for a later
/// [`run_finalize_courts`].
///
/// # Errors
///
/// Returns an error if the persisted table cannot be read, the chunk
/// index is out of range, or writing the output fails. Individual
/// portal lookups that fail are logged and retried on the next run.
#[allow(clippy::future_not_send)]
pub async fn run_scrape_courts(
    paths: &DataPaths,
    nprocs: usize,
    pid: usize,
    sleep_secs: u64,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = gv_dashboard_store::incidents::load_incidents(&paths.shootings_path())?;
    let keys = courts::dedup_keys(&records);
    let chunk = courts::chunk_keys(&keys, nprocs, pid)?;
    log::info!(
        "Scraping courts portal for {} of {} DC numbers (chunk {pid}/{nprocs})",
        chunk.len(),
        keys.len()
    );

    let portal = CourtsPortal::new(sleep_secs);
    let results = portal.scrape_incidents(&chunk, None).await;

    if dry_run {
        log::info!("Dry run: discarding {} results", results.len());
        return Ok(());
    }

    if nprocs == 1 {
        let mut combined =
            gv_dashboard_store::courts::load_annotations(&paths.courts_path())?;
        combined.extend(results);
        gv_dashboard_store::courts::save_annotations(&paths.courts_path(), &combined)?;
    } else {
        gv_dashboard_store::courts::save_annotations(
            &paths.courts_chunk_path(pid),
            &results,
        )?;
    }

    Ok(())
}

/// Combines chunk files from a parallel court scrape into the combined
/// side table.
///
/// # Errors
///
/// Returns an error if a chunk file cannot be read or the combined
/// write fails.
pub fn run_finalize_courts(
    paths: &DataPaths,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = gv_dashboard_store::courts::chunk_files(paths)?;
    if files.is_empty() {
        log::warn!("No court chunk files found under {}", paths.raw_dir().display());
        return Ok(());
    }

    let mut chunks = Vec::with_capacity(files.len());
    for file in &files {
        log::info!("Combining file: '{}'", file.display());
        chunks.push(gv_dashboard_store::courts::load_annotations(file)?);
    }
    let combined = courts::combine_chunks(chunks);

    if dry_run {
        log::info!(
            "Dry run: combined {} incidents from {} chunks",
            combined.len(),
            files.len()
        );
        return Ok(());
    }

    gv_dashboard_store::courts::save_annotations(&paths.courts_path(), &combined)?;
    Ok(())
}

/// Re-publishes the geography layers consumed by the dashboard front
/// end: hot-spot streets, police districts, council districts, and ZIP
/// codes.
///
/// # Errors
///
/// Returns an error if a layer cannot be fetched or written.
#[allow(clippy::future_not_send)]
pub async fn run_save_geojson_layers(
    paths: &DataPaths,
) -> Result<(), Box<dyn std::error::Error>> {
    paths.ensure()?;

    let blocks = gv_dashboard_geography::streets::load_street_blocks(
        &paths.streets_source_path(),
    )?;
    let streets = gv_dashboard_geography::publish::blocks_feature_collection(&blocks);
    gv_dashboard_store::write_json_atomic(&paths.geo_dir().join("streets.geojson"), &streets)?;
    log::info!("Saved hot spot streets layer");

    let client = reqwest::Client::new();
    for def in [POLICE_DISTRICTS, COUNCIL_DISTRICTS, ZIP_CODES] {
        let layer = gv_dashboard_geography::fetch::fetch_layer(&client, &def).await?;
        let collection = gv_dashboard_geography::publish::layer_feature_collection(&layer);
        let path = paths.geo_dir().join(format!("{}.geojson", def.name));
        gv_dashboard_store::write_json_atomic(&path, &collection)?;
        log::info!("Saved {} layer", def.name);
    }

    Ok(())
}

/// Convenience: merges a fresh batch against an in-memory prior table
/// and annotates it, without touching any files. The daily update is
/// this plus persistence; tests and downstream embedding use it
/// directly.
///
/// # Errors
///
/// Returns [`merge::MergeError`] on a suspicious drop.
pub fn reconcile_in_memory(
    prior: &[IncidentRecord],
    fresh: &[IncidentRecord],
    annotations: &gv_dashboard_incident_models::CourtAnnotations,
    config: &MergeConfig,
) -> Result<Vec<IncidentRecord>, merge::MergeError> {
    let mut merged = merge::merge_tables(prior, fresh, config)?;
    courts::annotate(&mut merged, annotations);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use gv_dashboard_incident_models::{CourtAnnotations, CourtCaseSummary};

    use super::*;

    #[test]
    fn reconcile_in_memory_merges_and_annotates() {
        let prior = vec![IncidentRecord::new("1")];
        let fresh = vec![IncidentRecord::new("1"), IncidentRecord::new("2")];

        let mut annotations = CourtAnnotations::new();
        annotations.insert(
            "2".to_string(),
            vec![CourtCaseSummary {
                docket_number: "CP-51-CR-0001234-2024".to_string(),
                court_type: None,
                caption: None,
                filing_date: None,
                case_status: None,
            }],
        );

        let merged =
            reconcile_in_memory(&prior, &fresh, &annotations, &MergeConfig::default())
                .unwrap();
        assert_eq!(merged.len(), 2);
        let two = merged.iter().find(|r| r.dc_key == "2").unwrap();
        assert_eq!(two.has_court_case, Some(true));
    }
}
