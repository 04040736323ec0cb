//! Paginated Carto SQL API fetcher for the shooting victims table.
//!
//! Issues a count pre-query so progress can report a total, then pages
//! through the table with `LIMIT`/`OFFSET`. Every request goes through
//! [`crate::retry`].

use std::sync::Arc;

use crate::progress::ProgressCallback;
use crate::{FetchOptions, SourceError, retry};

/// Queries the Carto SQL endpoint for the total record count.
/// Returns `None` if the count request fails (non-fatal).
async fn query_count(client: &reqwest::Client, table: &str) -> Option<u64> {
    let query = format!("SELECT count(*) as count FROM {table}");
    let body = retry::send_json(|| client.get(crate::ENDPOINT).query(&[("q", &query)]))
        .await
        .ok()?;
    body.get("rows")?
        .as_array()?
        .first()?
        .get("count")?
        .as_u64()
}

/// Downloads the full shooting victims table as raw JSON rows.
///
/// # Errors
///
/// Returns [`SourceError`] if an HTTP request fails after all retries or
/// a response cannot be parsed.
pub async fn fetch_shootings(
    options: &FetchOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<serde_json::Value>, SourceError> {
    fetch_table(crate::TABLE_NAME, options, progress).await
}

/// Downloads all rows of a Carto table page by page.
///
/// # Errors
///
/// Returns [`SourceError`] if an HTTP request fails after all retries or
/// a response cannot be parsed.
pub async fn fetch_table(
    table: &str,
    options: &FetchOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<serde_json::Value>, SourceError> {
    let client = reqwest::Client::new();
    let fetch_limit = options.limit.unwrap_or(u64::MAX);

    let total_available = query_count(&client, table).await;
    if let Some(total) = total_available {
        progress.set_total(fetch_limit.min(total));
        log::info!(
            "{table}: {total} records available (page size {})",
            options.page_size
        );
    }

    let mut all_rows: Vec<serde_json::Value> = Vec::new();
    let mut offset: u64 = 0;

    loop {
        let remaining = fetch_limit.saturating_sub(offset);
        if remaining == 0 {
            break;
        }
        let page_limit = remaining.min(options.page_size);

        let query = format!(
            "SELECT * FROM {table} ORDER BY cartodb_id LIMIT {page_limit} OFFSET {offset}"
        );
        log::info!("{table}: offset={offset}, limit={page_limit}");

        let body = retry::send_json(|| client.get(crate::ENDPOINT).query(&[("q", &query)]))
            .await?;

        let rows = body
            .get("rows")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        let count = rows.len() as u64;
        if count == 0 {
            break;
        }

        all_rows.extend(rows);
        offset += count;
        progress.inc(count);

        if count < page_limit {
            break;
        }
    }

    log::info!("{table}: download complete — {offset} records");
    progress.finish(format!("{table}: download complete -- {offset} records"));
    Ok(all_rows)
}
