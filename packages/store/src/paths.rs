//! Canonical file paths for the `data/` directory.
//!
//! The layout mirrors the published dashboard artifacts: raw inputs
//! under `data/raw/`, processed outputs under `data/processed/`, and
//! re-published geography under `data/processed/geo/`.

use std::path::{Path, PathBuf};

/// Resolved locations of every persisted artifact.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Creates paths rooted at an explicit data directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the default `data/` directory at the project root.
    ///
    /// Resolved at compile time from `CARGO_MANIFEST_DIR` so output
    /// paths do not depend on the caller's working directory.
    ///
    /// # Panics
    ///
    /// Panics if the project root cannot be resolved.
    #[must_use]
    pub fn default_root() -> Self {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .nth(2)
            .expect("Failed to find project root from CARGO_MANIFEST_DIR")
            .join("data");
        Self { root }
    }

    /// The data root itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `data/raw/` — downloaded and scraped inputs.
    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// `data/processed/` — published outputs.
    #[must_use]
    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    /// `data/processed/geo/` — re-published geography layers.
    #[must_use]
    pub fn geo_dir(&self) -> PathBuf {
        self.processed_dir().join("geo")
    }

    /// The persisted incident table.
    #[must_use]
    pub fn shootings_path(&self) -> PathBuf {
        self.raw_dir().join("shootings.json")
    }

    /// Per-year processed incident file.
    #[must_use]
    pub fn processed_year_path(&self, year: i32) -> PathBuf {
        self.processed_dir().join(format!("shootings_{year}.json"))
    }

    /// Cumulative daily counts.
    #[must_use]
    pub fn cumulative_path(&self) -> PathBuf {
        self.processed_dir()
            .join("shootings_cumulative_daily.json")
    }

    /// Combined court annotation side table.
    #[must_use]
    pub fn courts_path(&self) -> PathBuf {
        self.raw_dir().join("scraped_courts_data.json")
    }

    /// Court annotation chunk produced by one weekly scrape worker.
    #[must_use]
    pub fn courts_chunk_path(&self, chunk: usize) -> PathBuf {
        self.raw_dir()
            .join(format!("scraped_courts_data_{chunk}.json"))
    }

    /// Daily homicide totals table.
    #[must_use]
    pub fn homicide_daily_path(&self) -> PathBuf {
        self.raw_dir().join("homicide_totals_daily.csv")
    }

    /// Per-year homicide totals (annual + YTD).
    #[must_use]
    pub fn homicide_totals_path(&self) -> PathBuf {
        self.processed_dir().join("homicide_totals.json")
    }

    /// Street centerline extract consumed by the geography loader.
    #[must_use]
    pub fn streets_source_path(&self) -> PathBuf {
        self.raw_dir().join("street_centerlines.geojson")
    }

    /// Last-updated stamp.
    #[must_use]
    pub fn meta_path(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    /// Creates the directory tree.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a directory cannot be created.
    pub fn ensure(&self) -> std::io::Result<()> {
        ensure_dir(&self.raw_dir())?;
        ensure_dir(&self.geo_dir())?;
        Ok(())
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
