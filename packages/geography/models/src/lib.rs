#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference geometry types consumed by the spatial join.
//!
//! A [`ReferenceLayer`] is the "identifier + geometry" shape the rest of
//! the toolchain requires from every upstream boundary source. Layers are
//! rebuilt from upstream on every run and never diffed.

use geo::{Geometry, MultiLineString};

/// One feature in a reference layer: a stable identifier plus geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFeature {
    /// Feature identifier within the layer (e.g. ZIP code "19121").
    pub id: String,
    /// Feature geometry in WGS84 lon/lat.
    pub geometry: Geometry<f64>,
}

/// A named collection of reference features, immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceLayer {
    /// Layer name (e.g. "police_districts").
    pub name: String,
    /// The upstream attribute the feature ids were read from.
    pub id_field: String,
    /// Features in upstream order.
    pub features: Vec<ReferenceFeature>,
}

impl ReferenceLayer {
    /// Creates an empty layer.
    #[must_use]
    pub fn new(name: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: id_field.into(),
            features: Vec::new(),
        }
    }

    /// Number of features in the layer.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    /// `true` if the layer has no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A hundred-block of a street, aggregated from centerline segments.
///
/// Blocks are the unit of hot-spot aggregation: all centerline segments
/// sharing a street name and block number collapse into one
/// `MultiLineString` with a summed length.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetBlock {
    /// Sequential block identifier, assigned in (street, block) order so
    /// repeated loads of the same directory produce the same ids.
    pub segment_id: u64,
    /// Street name (e.g. "N BROAD ST").
    pub street_name: String,
    /// Hundred-block number (e.g. 1500).
    pub block_number: i64,
    /// Total centerline length of the block, in feet (upstream units).
    pub length_ft: f64,
    /// Combined centerline geometry in WGS84 lon/lat.
    pub geometry: MultiLineString<f64>,
}
