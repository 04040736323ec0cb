//! Conversion of loaded reference geometry back to `GeoJSON` for the
//! dashboard's published layer files.

use geojson::{Feature, FeatureCollection, JsonObject};
use gv_dashboard_geography_models::{ReferenceLayer, StreetBlock};

/// Converts a boundary layer into a `FeatureCollection` whose features
/// carry the layer's id field as their only property.
#[must_use]
pub fn layer_feature_collection(layer: &ReferenceLayer) -> FeatureCollection {
    let features = layer
        .features
        .iter()
        .map(|feature| {
            let mut properties = JsonObject::new();
            properties.insert(
                layer.id_field.clone(),
                serde_json::Value::String(feature.id.clone()),
            );
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(
                    &feature.geometry,
                ))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Converts street blocks into the published hot-spot streets layer.
///
/// Segment ids are published as strings (the dashboard treats them as
/// opaque labels).
#[must_use]
pub fn blocks_feature_collection(blocks: &[StreetBlock]) -> FeatureCollection {
    let features = blocks
        .iter()
        .map(|block| {
            let mut properties = JsonObject::new();
            properties.insert(
                "segment_id".to_string(),
                serde_json::Value::String(block.segment_id.to_string()),
            );
            properties.insert(
                "street_name".to_string(),
                serde_json::Value::String(block.street_name.clone()),
            );
            properties.insert(
                "block_number".to_string(),
                serde_json::Value::Number(block.block_number.into()),
            );
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(
                    &geo::Geometry::MultiLineString(block.geometry.clone()),
                ))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use geo::{Geometry, LineString, MultiLineString, point};
    use gv_dashboard_geography_models::ReferenceFeature;

    use super::*;

    #[test]
    fn layer_features_carry_id_property() {
        let mut layer = ReferenceLayer::new("zip_codes", "zip_code");
        layer.features.push(ReferenceFeature {
            id: "19121".to_string(),
            geometry: Geometry::Point(point! { x: -75.18, y: 39.98 }),
        });

        let collection = layer_feature_collection(&layer);
        assert_eq!(collection.features.len(), 1);
        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props["zip_code"], "19121");
    }

    #[test]
    fn block_segment_ids_publish_as_strings() {
        let block = StreetBlock {
            segment_id: 42,
            street_name: "MARKET ST".to_string(),
            block_number: 200,
            length_ft: 500.0,
            geometry: MultiLineString(vec![LineString::from(vec![
                (-75.15, 39.95),
                (-75.149, 39.951),
            ])]),
        };

        let collection = blocks_feature_collection(&[block]);
        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props["segment_id"], "42");
        assert_eq!(props["block_number"], 200);
    }
}
