#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference geography loading for the dashboard toolchain.
//!
//! Fetches the dashboard's boundary layers (police districts, ZIP codes,
//! council districts, neighborhoods) from their ArcGIS `FeatureServer`
//! endpoints and aggregates the city street centerline extract into
//! hundred-blocks for hot-spot assignment.
//!
//! This crate is a collaborator boundary: it only promises that returned
//! layers conform to the "identifier + geometry" shape. Anything else
//! (unreachable upstream, schema drift, empty responses) fails fast with
//! [`GeographyError::LayerUnavailable`].

pub mod fetch;
pub mod publish;
pub mod streets;

/// Errors raised while loading reference geography.
#[derive(Debug, thiserror::Error)]
pub enum GeographyError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (local file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The upstream layer is unreachable, malformed, or does not conform
    /// to the identifier + geometry shape.
    #[error("reference layer '{layer}' unavailable: {message}")]
    LayerUnavailable {
        /// Layer name.
        layer: String,
        /// What went wrong.
        message: String,
    },
}

/// A boundary layer the dashboard knows how to fetch.
#[derive(Debug, Clone, Copy)]
pub struct LayerDef {
    /// Layer name, also used for output filenames.
    pub name: &'static str,
    /// ArcGIS query endpoint (`.../FeatureServer/0`).
    pub url: &'static str,
    /// Attribute holding the feature identifier.
    pub id_field: &'static str,
}

/// Police district boundaries.
pub const POLICE_DISTRICTS: LayerDef = LayerDef {
    name: "police_districts",
    url: "https://services.arcgis.com/fLeGjb7u4uXqeF9q/arcgis/rest/services/Gun_Violence_Dashboard_Police_Districts/FeatureServer/0",
    id_field: "police_district",
};

/// ZIP code boundaries.
pub const ZIP_CODES: LayerDef = LayerDef {
    name: "zip_codes",
    url: "https://services.arcgis.com/fLeGjb7u4uXqeF9q/arcgis/rest/services/Gun_Violence_Dashboard_ZIP_Codes/FeatureServer/0",
    id_field: "zip_code",
};

/// City council district boundaries.
pub const COUNCIL_DISTRICTS: LayerDef = LayerDef {
    name: "council_districts",
    url: "https://services.arcgis.com/fLeGjb7u4uXqeF9q/arcgis/rest/services/Gun_Violence_Dashboard_Council_Districts/FeatureServer/0",
    id_field: "council_district",
};

/// Neighborhood boundaries.
pub const NEIGHBORHOODS: LayerDef = LayerDef {
    name: "neighborhoods",
    url: "https://services.arcgis.com/fLeGjb7u4uXqeF9q/arcgis/rest/services/Gun_Violence_Dashboard_Neighborhoods/FeatureServer/0",
    id_field: "neighborhood",
};

/// All boundary layers joined onto incident records, in join order.
pub const ALL_BOUNDARY_LAYERS: &[LayerDef] = &[
    ZIP_CODES,
    POLICE_DISTRICTS,
    COUNCIL_DISTRICTS,
    NEIGHBORHOODS,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_defs_point_at_dashboard_services() {
        for def in ALL_BOUNDARY_LAYERS {
            assert!(
                def.url.starts_with(
                    "https://services.arcgis.com/fLeGjb7u4uXqeF9q/arcgis/rest/services"
                ),
                "{}",
                def.name
            );
            assert!(def.url.ends_with("/FeatureServer/0"), "{}", def.name);
            assert!(!def.id_field.is_empty());
        }
    }
}
