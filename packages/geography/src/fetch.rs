//! ArcGIS `FeatureServer` boundary layer fetcher.
//!
//! Queries the layer endpoint with `f=geojson` to get standard `GeoJSON`
//! output, paginating via `resultOffset` for services with transfer
//! limits, then converts each feature into the identifier + geometry
//! shape of [`ReferenceLayer`].

use geojson::FeatureCollection;
use gv_dashboard_geography_models::{ReferenceFeature, ReferenceLayer};

use crate::{GeographyError, LayerDef};

/// Features requested per page.
const PAGE_SIZE: u32 = 1000;

/// Fetches a boundary layer from its ArcGIS endpoint.
///
/// Paginates automatically while the server reports
/// `exceededTransferLimit`. The returned layer is guaranteed non-empty;
/// an upstream response with no usable features is treated as
/// unavailable rather than silently producing an empty join.
///
/// # Errors
///
/// Returns [`GeographyError::LayerUnavailable`] if the request fails,
/// the response cannot be parsed, or no feature carries both an
/// identifier and a geometry.
pub async fn fetch_layer(
    client: &reqwest::Client,
    def: &LayerDef,
) -> Result<ReferenceLayer, GeographyError> {
    let mut layer = ReferenceLayer::new(def.name, def.id_field);
    let mut offset: u32 = 0;

    loop {
        let url = format!(
            "{}/query\
             ?where=1%3D1\
             &outFields={}\
             &f=geojson\
             &returnGeometry=true\
             &resultRecordCount={PAGE_SIZE}\
             &resultOffset={offset}",
            def.url, def.id_field
        );

        let resp = client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(GeographyError::LayerUnavailable {
                layer: def.name.to_string(),
                message: format!("ArcGIS request failed with status {}", resp.status()),
            });
        }
        let body = resp.text().await?;

        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| GeographyError::LayerUnavailable {
                layer: def.name.to_string(),
                message: format!("failed to parse ArcGIS response: {e}"),
            })?;

        // ArcGIS reports errors in-band with a 200 status.
        if json.get("error").is_some() {
            return Err(GeographyError::LayerUnavailable {
                layer: def.name.to_string(),
                message: format!(
                    "ArcGIS API error: {}",
                    json["error"]["message"].as_str().unwrap_or("unknown error")
                ),
            });
        }

        let page: FeatureCollection =
            FeatureCollection::try_from(json.clone()).map_err(|e| {
                GeographyError::LayerUnavailable {
                    layer: def.name.to_string(),
                    message: format!("response is not a GeoJSON FeatureCollection: {e}"),
                }
            })?;

        let page_len = page.features.len();
        if page_len == 0 {
            break;
        }

        for feature in page.features {
            match convert_feature(&feature, def.id_field) {
                Some(converted) => layer.features.push(converted),
                None => log::warn!(
                    "Skipping {} feature without '{}' or geometry",
                    def.name,
                    def.id_field
                ),
            }
        }

        let exceeded = json["exceededTransferLimit"]
            .as_bool()
            .unwrap_or(false);
        if !exceeded {
            break;
        }

        offset += u32::try_from(page_len).unwrap_or(PAGE_SIZE);
    }

    if layer.is_empty() {
        return Err(GeographyError::LayerUnavailable {
            layer: def.name.to_string(),
            message: "no usable features returned".to_string(),
        });
    }

    log::info!("Loaded {} {} features", layer.len(), def.name);
    Ok(layer)
}

/// Converts one `GeoJSON` feature into a [`ReferenceFeature`].
///
/// Identifier attributes arrive as either strings or numbers depending
/// on the service; numeric ids are normalized to their integer string
/// form ("19121", not "19121.0").
fn convert_feature(feature: &geojson::Feature, id_field: &str) -> Option<ReferenceFeature> {
    let id = feature
        .properties
        .as_ref()
        .and_then(|props| props.get(id_field))
        .and_then(property_to_id)?;

    let geometry: geo::Geometry<f64> = feature.geometry.clone()?.try_into().ok()?;

    Some(ReferenceFeature { id, geometry })
}

/// Normalizes an identifier property value to a string.
fn property_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => {
            #[allow(clippy::cast_possible_truncation)]
            n.as_f64().map(|f| format!("{}", f.trunc() as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_json(id: serde_json::Value) -> geojson::Feature {
        let value = serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-75.2, 39.9], [-75.1, 39.9], [-75.1, 40.0],
                    [-75.2, 40.0], [-75.2, 39.9]
                ]]
            },
            "properties": { "zip_code": id }
        });
        geojson::Feature::try_from(value).unwrap()
    }

    #[test]
    fn numeric_ids_become_integer_strings() {
        let feature = feature_json(serde_json::json!(19121.0));
        let converted = convert_feature(&feature, "zip_code").unwrap();
        assert_eq!(converted.id, "19121");
    }

    #[test]
    fn string_ids_pass_through() {
        let feature = feature_json(serde_json::json!("19121"));
        let converted = convert_feature(&feature, "zip_code").unwrap();
        assert_eq!(converted.id, "19121");
    }

    #[test]
    fn missing_id_is_skipped() {
        let feature = feature_json(serde_json::Value::Null);
        assert!(convert_feature(&feature, "zip_code").is_none());
    }
}
