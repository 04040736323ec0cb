//! Court annotation side files.
//!
//! The combined side table (`scraped_courts_data.json`) maps DC number
//! to the docket list scraped for it. Weekly scrape workers write
//! per-chunk files (`scraped_courts_data_<chunk>.json`) with disjoint
//! key ranges; the finalize step unions them back into the combined
//! table.

use std::path::{Path, PathBuf};

use gv_dashboard_incident_models::CourtAnnotations;

use crate::{StoreError, paths::DataPaths, write_json_atomic};

/// Loads the combined court annotation table.
///
/// A missing file means nothing has been scraped yet.
///
/// # Errors
///
/// Returns [`StoreError`] if the file exists but cannot be parsed.
pub fn load_annotations(path: &Path) -> Result<CourtAnnotations, StoreError> {
    if !path.exists() {
        log::info!("No court annotations at {}", path.display());
        return Ok(CourtAnnotations::new());
    }

    let body = std::fs::read_to_string(path)?;
    let annotations: CourtAnnotations = serde_json::from_str(&body)?;
    log::info!(
        "Loaded court annotations for {} incidents",
        annotations.len()
    );
    Ok(annotations)
}

/// Saves a court annotation table.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or the write fails.
pub fn save_annotations(path: &Path, annotations: &CourtAnnotations) -> Result<(), StoreError> {
    write_json_atomic(path, annotations)?;
    log::info!(
        "Saved court annotations for {} incidents to {}",
        annotations.len(),
        path.display()
    );
    Ok(())
}

/// Lists existing chunk files in ascending filename order.
///
/// # Errors
///
/// Returns [`StoreError`] if the raw directory cannot be read.
pub fn chunk_files(paths: &DataPaths) -> Result<Vec<PathBuf>, StoreError> {
    let raw_dir = paths.raw_dir();
    if !raw_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(&raw_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| {
                    name.starts_with("scraped_courts_data_") && name.ends_with(".json")
                })
        })
        .collect();

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use gv_dashboard_incident_models::CourtCaseSummary;

    use super::*;

    #[test]
    fn annotations_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "gv_store_courts_{}.json",
            std::process::id()
        ));

        let mut annotations = CourtAnnotations::new();
        annotations.insert(
            "202401001".to_string(),
            vec![CourtCaseSummary {
                docket_number: "CP-51-CR-0001234-2024".to_string(),
                court_type: Some("Common Pleas".to_string()),
                caption: None,
                filing_date: None,
                case_status: Some("Active".to_string()),
            }],
        );
        annotations.insert("202401002".to_string(), Vec::new());

        save_annotations(&path, &annotations).unwrap();
        let loaded = load_annotations(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, annotations);
        assert!(loaded["202401002"].is_empty());
    }

    #[test]
    fn missing_annotations_are_empty() {
        let path = std::env::temp_dir().join("gv_store_courts_never_written.json");
        assert!(load_annotations(&path).unwrap().is_empty());
    }

    #[test]
    fn chunk_files_are_sorted_and_filtered() {
        let root = std::env::temp_dir().join(format!(
            "gv_store_chunks_{}",
            std::process::id()
        ));
        let paths = DataPaths::new(&root);
        paths.ensure().unwrap();

        for name in [
            "scraped_courts_data_1.json",
            "scraped_courts_data_0.json",
            "scraped_courts_data.json",
            "unrelated.json",
        ] {
            std::fs::write(paths.raw_dir().join(name), "{}").unwrap();
        }

        let files = chunk_files(&paths).unwrap();
        let names: Vec<&str> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        std::fs::remove_dir_all(&root).ok();

        assert_eq!(
            names,
            vec!["scraped_courts_data_0.json", "scraped_courts_data_1.json"]
        );
    }
}
