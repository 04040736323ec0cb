//! Spatial enrichment of freshly downloaded incident records.
//!
//! Runs every record with a usable location through the street and
//! boundary indexes, filling the derived fields the merge step later
//! preserves. Records without a location are left untouched; missing
//! coordinates are a per-record condition, never a failure.

use gv_dashboard_incident_models::{AreaAssignments, IncidentRecord, StreetMatch};
use gv_dashboard_spatial::{BlockMatch, BoundaryIndex, StreetIndex};

/// Enriches records in place with street and area assignments.
pub fn enrich_records(
    records: &mut [IncidentRecord],
    streets: &StreetIndex,
    boundaries: &[BoundaryIndex],
) {
    let mut located = 0usize;
    let mut street_matched = 0usize;

    for record in records.iter_mut() {
        let Some((lon, lat)) = record.coordinates() else {
            continue;
        };
        located += 1;

        if let Some(block) = streets.nearest_block(lon, lat) {
            record.street = Some(to_street_match(block));
            street_matched += 1;
        }

        for index in boundaries {
            if let Some(id) = index.locate(lon, lat) {
                assign_area(&mut record.areas, index.name(), id.to_string());
            }
        }
    }

    log::info!(
        "Enriched {located}/{} located records ({street_matched} street matches)",
        records.len()
    );
}

fn to_street_match(block: BlockMatch) -> StreetMatch {
    StreetMatch {
        segment_id: block.segment_id,
        street_name: block.street_name,
        block_number: block.block_number,
        distance: block.distance,
    }
}

/// Routes a boundary hit into the matching area field.
fn assign_area(areas: &mut AreaAssignments, layer: &str, id: String) {
    match layer {
        "zip_codes" => areas.zip = Some(id),
        "police_districts" => areas.police_district = Some(id),
        "council_districts" => areas.council_district = Some(id),
        "neighborhoods" => areas.neighborhood = Some(id),
        other => log::warn!("No area field for boundary layer '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiLineString, polygon};
    use gv_dashboard_geography_models::{ReferenceFeature, ReferenceLayer, StreetBlock};
    use gv_dashboard_spatial::SpatialJoinConfig;

    use super::*;

    fn indexes() -> (StreetIndex, Vec<BoundaryIndex>) {
        let blocks = vec![StreetBlock {
            segment_id: 5,
            street_name: "MARKET ST".to_string(),
            block_number: 200,
            length_ft: 400.0,
            geometry: MultiLineString(vec![LineString::from(vec![
                (-75.150, 39.950),
                (-75.149, 39.950),
            ])]),
        }];
        let streets = StreetIndex::build(&blocks, SpatialJoinConfig::default()).unwrap();

        let mut zips = ReferenceLayer::new("zip_codes", "zip_code");
        zips.features.push(ReferenceFeature {
            id: "19107".to_string(),
            geometry: geo::Geometry::Polygon(polygon![
                (x: -75.2, y: 39.9),
                (x: -75.1, y: 39.9),
                (x: -75.1, y: 40.0),
                (x: -75.2, y: 40.0),
                (x: -75.2, y: 39.9),
            ]),
        });
        let boundaries = vec![BoundaryIndex::build(&zips).unwrap()];

        (streets, boundaries)
    }

    #[test]
    fn located_record_gets_street_and_areas() {
        let (streets, boundaries) = indexes();
        let mut record = IncidentRecord::new("1");
        record.longitude = Some(-75.1495);
        record.latitude = Some(39.9500);

        let mut records = vec![record];
        enrich_records(&mut records, &streets, &boundaries);

        let street = records[0].street.as_ref().unwrap();
        assert_eq!(street.segment_id, 5);
        assert_eq!(street.street_name, "MARKET ST");
        assert_eq!(records[0].areas.zip.as_deref(), Some("19107"));
        assert!(records[0].areas.police_district.is_none());
    }

    #[test]
    fn unlocated_record_is_left_alone() {
        let (streets, boundaries) = indexes();
        let mut records = vec![IncidentRecord::new("no_location")];
        enrich_records(&mut records, &streets, &boundaries);

        assert!(records[0].street.is_none());
        assert!(records[0].areas.is_empty());
    }
}
