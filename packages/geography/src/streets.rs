//! Street centerline loading and hundred-block aggregation.
//!
//! The city centerline extract is one `GeoJSON` feature per segment with
//! `SEG_ID`, `STNAME`, `L_F_ADD` (left from-address), and `LENGTH` (feet)
//! attributes. Hot-spot assignment works at the block level, so segments
//! are grouped by (street name, hundred-block) into [`StreetBlock`]s with
//! combined geometry and summed length.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Geometry, LineString, MultiLineString};
use geojson::FeatureCollection;
use gv_dashboard_geography_models::StreetBlock;

use crate::GeographyError;

/// Loads the centerline extract and aggregates it into street blocks.
///
/// Block ids are assigned sequentially in (street name, block number)
/// order, so the same extract always yields the same ids regardless of
/// upstream feature order.
///
/// # Errors
///
/// Returns [`GeographyError::LayerUnavailable`] if the file cannot be
/// read, is not a `GeoJSON` `FeatureCollection`, or yields no blocks.
pub fn load_street_blocks(path: &Path) -> Result<Vec<StreetBlock>, GeographyError> {
    let unavailable = |message: String| GeographyError::LayerUnavailable {
        layer: "streets".to_string(),
        message,
    };

    let body = std::fs::read_to_string(path)
        .map_err(|e| unavailable(format!("cannot read {}: {e}", path.display())))?;
    let json: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| unavailable(format!("invalid JSON: {e}")))?;
    let collection = FeatureCollection::try_from(json)
        .map_err(|e| unavailable(format!("not a GeoJSON FeatureCollection: {e}")))?;

    let mut groups: BTreeMap<(String, i64), (Vec<LineString<f64>>, f64)> = BTreeMap::new();
    let mut skipped = 0usize;

    for feature in collection.features {
        let Some((street_name, block_number, length)) = segment_attributes(&feature) else {
            skipped += 1;
            continue;
        };

        let Some(lines) = segment_lines(feature.geometry.as_ref()) else {
            skipped += 1;
            continue;
        };

        let entry = groups
            .entry((street_name, block_number))
            .or_insert_with(|| (Vec::new(), 0.0));
        entry.0.extend(lines);
        entry.1 += length;
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} centerline segments without name/geometry");
    }

    if groups.is_empty() {
        return Err(unavailable("no usable centerline segments".to_string()));
    }

    let blocks: Vec<StreetBlock> = groups
        .into_iter()
        .enumerate()
        .map(
            |(idx, ((street_name, block_number), (lines, length_ft)))| StreetBlock {
                segment_id: idx as u64,
                street_name,
                block_number,
                length_ft,
                geometry: MultiLineString(lines),
            },
        )
        .collect();

    log::info!("Aggregated centerlines into {} street blocks", blocks.len());
    Ok(blocks)
}

/// Extracts (street name, block number, length) from a segment feature.
///
/// The block number is the from-address rounded down to the hundred
/// (1532 -> 1500). Segments without a street name are unusable for
/// hot-spot labels and are dropped.
fn segment_attributes(feature: &geojson::Feature) -> Option<(String, i64, f64)> {
    let props = feature.properties.as_ref()?;

    let street_name = props
        .get("STNAME")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let from_address = match props.get("L_F_ADD") {
        Some(serde_json::Value::Number(n)) => n.as_f64()?,
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok()?,
        _ => 0.0,
    };
    #[allow(clippy::cast_possible_truncation)]
    let block_number = ((from_address / 100.0).floor() * 100.0) as i64;

    let length = props
        .get("LENGTH")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(0.0);

    Some((street_name, block_number, length))
}

/// Pulls the line geometry out of a segment feature.
fn segment_lines(geometry: Option<&geojson::Geometry>) -> Option<Vec<LineString<f64>>> {
    let geometry: Geometry<f64> = geometry?.clone().try_into().ok()?;
    match geometry {
        Geometry::LineString(line) => Some(vec![line]),
        Geometry::MultiLineString(multi) => Some(multi.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(name: &str, from_addr: f64, length: f64, x0: f64) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[x0, 39.95], [x0 + 0.001, 39.951]]
            },
            "properties": {
                "SEG_ID": 1,
                "STNAME": name,
                "L_F_ADD": from_addr,
                "LENGTH": length
            }
        })
    }

    fn write_collection(features: &[serde_json::Value]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "gv_streets_test_{}_{}.geojson",
            std::process::id(),
            features.len()
        ));
        let collection = serde_json::json!({
            "type": "FeatureCollection",
            "features": features
        });
        std::fs::write(&path, collection.to_string()).unwrap();
        path
    }

    #[test]
    fn groups_segments_into_blocks() {
        let path = write_collection(&[
            segment("N BROAD ST", 1532.0, 400.0, -75.16),
            segment("N BROAD ST", 1570.0, 350.0, -75.161),
            segment("MARKET ST", 200.0, 500.0, -75.15),
        ]);
        let blocks = load_street_blocks(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(blocks.len(), 2);
        // BTreeMap ordering: MARKET ST before N BROAD ST.
        assert_eq!(blocks[0].street_name, "MARKET ST");
        assert_eq!(blocks[0].segment_id, 0);
        assert_eq!(blocks[1].street_name, "N BROAD ST");
        assert_eq!(blocks[1].block_number, 1500);
        assert_eq!(blocks[1].segment_id, 1);
        assert!((blocks[1].length_ft - 750.0).abs() < 1e-9);
        assert_eq!(blocks[1].geometry.0.len(), 2);
    }

    #[test]
    fn unnamed_segments_are_dropped() {
        let mut unnamed = segment("", 100.0, 10.0, -75.14);
        unnamed["properties"]["STNAME"] = serde_json::json!("");
        let path = write_collection(&[unnamed, segment("MARKET ST", 200.0, 500.0, -75.15)]);
        let blocks = load_street_blocks(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].street_name, "MARKET ST");
    }

    #[test]
    fn empty_extract_is_unavailable() {
        let path = write_collection(&[]);
        let err = load_street_blocks(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, GeographyError::LayerUnavailable { .. }));
    }
}
