//! Weekly chunked court-scrape orchestration.
//!
//! The docket portal is slow (one polite request per DC number), so the
//! weekly job splits the deduplicated DC-number list into contiguous
//! chunks and runs one worker process per chunk. Chunk key ranges are
//! disjoint, so the finalize step is a plain union with no conflict
//! resolution. A failed chunk only loses its own keys; completed chunk
//! files are never discarded.

use gv_dashboard_incident_models::{CourtAnnotations, IncidentRecord};

/// Errors raised by chunk orchestration.
#[derive(Debug, thiserror::Error)]
pub enum CourtsError {
    /// The worker index is outside the split.
    #[error("chunk index {pid} is out of range for {nprocs} processes")]
    ChunkOutOfRange {
        /// Requested worker index.
        pid: usize,
        /// Total worker count.
        nprocs: usize,
    },
}

/// Deduplicated, sorted DC numbers from the incident table.
///
/// Sorting makes the split deterministic across workers: every worker
/// computes the same chunk boundaries independently.
#[must_use]
pub fn dedup_keys(records: &[IncidentRecord]) -> Vec<String> {
    let mut keys: Vec<String> = records.iter().map(|r| r.dc_key.clone()).collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Returns worker `pid`'s slice of the key list split into `nprocs`
/// contiguous chunks.
///
/// Chunk sizes differ by at most one: the first `len % nprocs` chunks
/// get the extra key.
///
/// # Errors
///
/// Returns [`CourtsError::ChunkOutOfRange`] if `pid >= nprocs` or
/// `nprocs` is zero.
pub fn chunk_keys(
    keys: &[String],
    nprocs: usize,
    pid: usize,
) -> Result<Vec<String>, CourtsError> {
    if nprocs == 0 || pid >= nprocs {
        return Err(CourtsError::ChunkOutOfRange { pid, nprocs });
    }

    let base = keys.len() / nprocs;
    let extra = keys.len() % nprocs;

    let start = pid * base + pid.min(extra);
    let len = base + usize::from(pid < extra);

    Ok(keys[start..start + len].to_vec())
}

/// Unions chunk annotation maps into one side table.
///
/// Key ranges are disjoint by construction; if a key does somehow
/// repeat (e.g. overlapping manual runs), the later chunk wins.
#[must_use]
pub fn combine_chunks<I>(chunks: I) -> CourtAnnotations
where
    I: IntoIterator<Item = CourtAnnotations>,
{
    let mut combined = CourtAnnotations::new();
    for chunk in chunks {
        combined.extend(chunk);
    }
    combined
}

/// Marks each record's court-case flag from the scraped side table.
///
/// A DC number absent from the table has simply not been scraped yet;
/// its record keeps whatever flag it already carries (usually the one
/// preserved from the prior merge).
pub fn annotate(records: &mut [IncidentRecord], annotations: &CourtAnnotations) {
    let mut flagged = 0usize;
    for record in records.iter_mut() {
        if let Some(cases) = annotations.get(&record.dc_key) {
            record.has_court_case = Some(!cases.is_empty());
            if !cases.is_empty() {
                flagged += 1;
            }
        }
    }
    log::info!(
        "Court annotations: {flagged} of {} records have a court case",
        records.len()
    );
}
