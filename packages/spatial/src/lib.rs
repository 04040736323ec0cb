#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial indexes for incident enrichment.
//!
//! Builds R-tree indexes over the reference geometry once per run and
//! answers two queries for each incident point: the nearest street block
//! within a bounded search radius ([`StreetIndex`]), and the containing
//! administrative areas ([`BoundaryIndex`]).
//!
//! Street distances are computed in a local planar meter frame
//! (equirectangular about the layer's bounding-box center), so envelopes
//! and distances share units and results are reproducible. Exact-distance
//! ties are broken by the lowest block identifier so unordered input
//! always yields the same assignment.
//!
//! A single bad point never fails a run: invalid coordinates produce a
//! null match. Only an unusable reference layer (empty, or no valid
//! geometry) is fatal, via [`SpatialError::InvalidGeometry`].

use geo::{Contains, MultiLineString, MultiPolygon, Point};
use gv_dashboard_geography_models::{ReferenceLayer, StreetBlock};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Tolerance for treating two candidate distances as tied, in square
/// meters.
const TIE_EPSILON_M2: f64 = 1e-6;

/// Errors raised by index construction.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The reference layer is empty or contains no usable geometry.
    #[error("invalid reference geometry for '{layer}': {message}")]
    InvalidGeometry {
        /// Layer name.
        layer: String,
        /// What made the layer unusable.
        message: String,
    },
}

/// Tunable policies for the nearest-block assignment.
#[derive(Debug, Clone, Copy)]
pub struct SpatialJoinConfig {
    /// Maximum search radius in meters. Points farther than this from
    /// every block get a null match.
    pub max_radius_m: f64,
    /// Blocks at least this long (feet) are excluded from hot-spot
    /// assignment; a point whose nearest block is excluded stays
    /// unassigned, matching the dashboard's published streets layer.
    pub max_block_length_ft: Option<f64>,
}

impl Default for SpatialJoinConfig {
    fn default() -> Self {
        Self {
            // The upstream matching used a 200 ft buffer in the state
            // plane CRS.
            max_radius_m: 60.0,
            max_block_length_ft: Some(5200.0),
        }
    }
}

/// The nearest street block assigned to a point.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMatch {
    /// Block identifier.
    pub segment_id: u64,
    /// Street name.
    pub street_name: String,
    /// Hundred-block number.
    pub block_number: i64,
    /// Distance from the point to the block, in meters.
    pub distance: f64,
}

/// Local equirectangular projection about a fixed origin.
///
/// Adequate at city scale: the error against the true geodesic distance
/// is far below the search radius granularity.
#[derive(Debug, Clone, Copy)]
struct LocalProjection {
    lon0: f64,
    lat0: f64,
    lon_scale: f64,
}

impl LocalProjection {
    fn new(lon0: f64, lat0: f64) -> Self {
        Self {
            lon0,
            lat0,
            lon_scale: lat0.to_radians().cos(),
        }
    }

    fn project(&self, lon: f64, lat: f64) -> [f64; 2] {
        [
            (lon - self.lon0) * self.lon_scale * METERS_PER_DEGREE,
            (lat - self.lat0) * METERS_PER_DEGREE,
        ]
    }
}

/// A street block stored in the R-tree, with geometry pre-projected into
/// the meter frame.
#[derive(Debug)]
struct BlockEntry {
    segment_id: u64,
    street_name: String,
    block_number: i64,
    length_ft: f64,
    envelope: AABB<[f64; 2]>,
    geometry: MultiLineString<f64>,
}

impl RTreeObject for BlockEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for BlockEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        multiline_distance_2(&self.geometry, point)
    }
}

/// Pre-built R-tree over street blocks for nearest-block queries.
#[derive(Debug)]
pub struct StreetIndex {
    tree: RTree<BlockEntry>,
    projection: LocalProjection,
    config: SpatialJoinConfig,
}

impl StreetIndex {
    /// Builds the index from the block-aggregated street layer.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if no block carries a
    /// non-degenerate line geometry.
    pub fn build(
        blocks: &[StreetBlock],
        config: SpatialJoinConfig,
    ) -> Result<Self, SpatialError> {
        let invalid = |message: &str| SpatialError::InvalidGeometry {
            layer: "streets".to_string(),
            message: message.to_string(),
        };

        if blocks.is_empty() {
            return Err(invalid("layer is empty"));
        }

        let projection = layer_projection(blocks).ok_or_else(|| invalid("no coordinates"))?;

        let mut entries = Vec::with_capacity(blocks.len());
        for block in blocks {
            let projected = project_multiline(&block.geometry, projection);
            let Some(envelope) = multiline_envelope(&projected) else {
                log::warn!(
                    "Skipping street block {} ({}) with degenerate geometry",
                    block.segment_id,
                    block.street_name
                );
                continue;
            };
            entries.push(BlockEntry {
                segment_id: block.segment_id,
                street_name: block.street_name.clone(),
                block_number: block.block_number,
                length_ft: block.length_ft,
                envelope,
                geometry: projected,
            });
        }

        if entries.is_empty() {
            return Err(invalid("no usable line geometry"));
        }

        log::info!("Loaded {} street blocks into spatial index", entries.len());
        Ok(Self {
            tree: RTree::bulk_load(entries),
            projection,
            config,
        })
    }

    /// Finds the nearest street block within the configured radius.
    ///
    /// Returns `None` for invalid coordinates, for points farther than
    /// the radius from every block, and for points whose nearest block
    /// is excluded by the length cutoff. Ties are broken by the lowest
    /// block identifier.
    #[must_use]
    pub fn nearest_block(&self, lon: f64, lat: f64) -> Option<BlockMatch> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }

        let query = self.projection.project(lon, lat);
        let max_d2 = self.config.max_radius_m * self.config.max_radius_m;

        let mut best: Option<(&BlockEntry, f64)> = None;
        for (entry, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&query) {
            if d2 > max_d2 {
                break;
            }
            match best {
                None => best = Some((entry, d2)),
                Some((winner, best_d2)) => {
                    if d2 > best_d2 + TIE_EPSILON_M2 {
                        // Iterator is ordered by distance; past the tie
                        // window nothing closer can follow.
                        break;
                    }
                    if entry.segment_id < winner.segment_id {
                        best = Some((entry, best_d2));
                    }
                }
            }
        }

        let (winner, d2) = best?;

        if let Some(cutoff) = self.config.max_block_length_ft
            && winner.length_ft >= cutoff
        {
            return None;
        }

        Some(BlockMatch {
            segment_id: winner.segment_id,
            street_name: winner.street_name.clone(),
            block_number: winner.block_number,
            distance: d2.sqrt(),
        })
    }

    /// Number of indexed blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// `true` if the index holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// A boundary polygon stored in the R-tree with its identifier.
#[derive(Debug)]
struct AreaEntry {
    id: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for AreaEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built R-tree over one boundary layer for point-in-polygon lookups.
///
/// Works directly in lon/lat: containment does not depend on projection.
#[derive(Debug)]
pub struct BoundaryIndex {
    name: String,
    tree: RTree<AreaEntry>,
}

impl BoundaryIndex {
    /// Builds the index from a polygon reference layer.
    ///
    /// Non-polygon features are skipped with a warning; a layer with no
    /// polygons at all is unusable.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if the layer is empty
    /// or contains no polygon geometry.
    pub fn build(layer: &ReferenceLayer) -> Result<Self, SpatialError> {
        if layer.is_empty() {
            return Err(SpatialError::InvalidGeometry {
                layer: layer.name.clone(),
                message: "layer is empty".to_string(),
            });
        }

        let mut entries = Vec::with_capacity(layer.len());
        for feature in &layer.features {
            let polygon = match &feature.geometry {
                geo::Geometry::Polygon(p) => MultiPolygon(vec![p.clone()]),
                geo::Geometry::MultiPolygon(mp) => mp.clone(),
                _ => {
                    log::warn!(
                        "Skipping non-polygon feature '{}' in layer '{}'",
                        feature.id,
                        layer.name
                    );
                    continue;
                }
            };

            let Some(envelope) = polygon_envelope(&polygon) else {
                log::warn!(
                    "Skipping feature '{}' in layer '{}' with empty extent",
                    feature.id,
                    layer.name
                );
                continue;
            };

            entries.push(AreaEntry {
                id: feature.id.clone(),
                envelope,
                polygon,
            });
        }

        if entries.is_empty() {
            return Err(SpatialError::InvalidGeometry {
                layer: layer.name.clone(),
                message: "no polygon geometry".to_string(),
            });
        }

        log::info!(
            "Loaded {} {} polygons into spatial index",
            entries.len(),
            layer.name
        );
        Ok(Self {
            name: layer.name.clone(),
            tree: RTree::bulk_load(entries),
        })
    }

    /// Layer name this index was built from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up the containing feature id for a point.
    ///
    /// When boundary polygons overlap (sliver geometry in upstream
    /// layers), the lowest feature id wins so repeated runs agree.
    #[must_use]
    pub fn locate(&self, lon: f64, lat: f64) -> Option<&str> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }

        let point = Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        let mut best: Option<&AreaEntry> = None;
        for entry in self.tree.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.contains(&point) {
                match best {
                    None => best = Some(entry),
                    Some(current) if entry.id < current.id => best = Some(entry),
                    _ => {}
                }
            }
        }

        best.map(|e| e.id.as_str())
    }
}

/// Picks the projection origin from the layer's bounding box center.
fn layer_projection(blocks: &[StreetBlock]) -> Option<LocalProjection> {
    let mut min_lon = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;

    for block in blocks {
        for line in &block.geometry.0 {
            for coord in &line.0 {
                if coord.x.is_finite() && coord.y.is_finite() {
                    min_lon = min_lon.min(coord.x);
                    max_lon = max_lon.max(coord.x);
                    min_lat = min_lat.min(coord.y);
                    max_lat = max_lat.max(coord.y);
                }
            }
        }
    }

    if min_lon > max_lon || min_lat > max_lat {
        return None;
    }

    Some(LocalProjection::new(
        f64::midpoint(min_lon, max_lon),
        f64::midpoint(min_lat, max_lat),
    ))
}

/// Projects a lon/lat `MultiLineString` into the meter frame.
fn project_multiline(
    geometry: &MultiLineString<f64>,
    projection: LocalProjection,
) -> MultiLineString<f64> {
    MultiLineString(
        geometry
            .0
            .iter()
            .map(|line| {
                line.0
                    .iter()
                    .map(|coord| {
                        let [x, y] = projection.project(coord.x, coord.y);
                        geo::coord! { x: x, y: y }
                    })
                    .collect::<Vec<_>>()
                    .into()
            })
            .collect(),
    )
}

/// Axis-aligned bounding box of a projected `MultiLineString`.
fn multiline_envelope(geometry: &MultiLineString<f64>) -> Option<AABB<[f64; 2]>> {
    let mut points = geometry
        .0
        .iter()
        .flat_map(|line| line.0.iter())
        .filter(|c| c.x.is_finite() && c.y.is_finite());

    let first = points.next()?;
    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);
    for coord in points {
        min_x = min_x.min(coord.x);
        max_x = max_x.max(coord.x);
        min_y = min_y.min(coord.y);
        max_y = max_y.max(coord.y);
    }
    Some(AABB::from_corners([min_x, min_y], [max_x, max_y]))
}

/// Axis-aligned bounding box of a lon/lat `MultiPolygon`.
fn polygon_envelope(polygon: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    let mut points = polygon
        .0
        .iter()
        .flat_map(|p| p.exterior().0.iter())
        .filter(|c| c.x.is_finite() && c.y.is_finite());

    let first = points.next()?;
    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);
    for coord in points {
        min_x = min_x.min(coord.x);
        max_x = max_x.max(coord.x);
        min_y = min_y.min(coord.y);
        max_y = max_y.max(coord.y);
    }
    Some(AABB::from_corners([min_x, min_y], [max_x, max_y]))
}

/// Squared distance from a point to the nearest segment of a
/// `MultiLineString`, in the frame both are expressed in.
fn multiline_distance_2(geometry: &MultiLineString<f64>, point: &[f64; 2]) -> f64 {
    let mut best = f64::INFINITY;
    for line in &geometry.0 {
        for window in line.0.windows(2) {
            let d2 = segment_distance_2(
                point,
                [window[0].x, window[0].y],
                [window[1].x, window[1].y],
            );
            if d2 < best {
                best = d2;
            }
        }
        // Single-coordinate "lines" degrade to point distance.
        if line.0.len() == 1 {
            let dx = point[0] - line.0[0].x;
            let dy = point[1] - line.0[0].y;
            best = best.min(dx.mul_add(dx, dy * dy));
        }
    }
    best
}

/// Squared distance from point `p` to segment `ab`.
fn segment_distance_2(p: &[f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let len2 = ab[0].mul_add(ab[0], ab[1] * ab[1]);

    let t = if len2 > 0.0 {
        (ap[0].mul_add(ab[0], ap[1] * ab[1]) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let dx = p[0] - t.mul_add(ab[0], a[0]);
    let dy = p[1] - t.mul_add(ab[1], a[1]);
    dx.mul_add(dx, dy * dy)
}

#[cfg(test)]
mod tests {
    use geo::{LineString, polygon};
    use gv_dashboard_geography_models::ReferenceFeature;

    use super::*;

    fn block(id: u64, name: &str, coords: Vec<(f64, f64)>) -> StreetBlock {
        StreetBlock {
            segment_id: id,
            street_name: name.to_string(),
            block_number: 100 * i64::try_from(id).unwrap(),
            length_ft: 400.0,
            geometry: MultiLineString(vec![LineString::from(coords)]),
        }
    }

    fn test_index(blocks: &[StreetBlock]) -> StreetIndex {
        StreetIndex::build(blocks, SpatialJoinConfig::default()).unwrap()
    }

    #[test]
    fn point_on_block_is_distance_zero() {
        let index = test_index(&[block(
            0,
            "MARKET ST",
            vec![(-75.150, 39.9500), (-75.149, 39.9500)],
        )]);

        let matched = index.nearest_block(-75.1495, 39.9500).unwrap();
        assert_eq!(matched.segment_id, 0);
        assert!(matched.distance < 1e-6, "distance {}", matched.distance);
    }

    #[test]
    fn beyond_max_radius_is_null() {
        let index = test_index(&[block(
            0,
            "MARKET ST",
            vec![(-75.150, 39.950), (-75.149, 39.950)],
        )]);

        // ~0.01 deg latitude is ~1.1 km, far past the 60 m radius.
        assert!(index.nearest_block(-75.1495, 39.960).is_none());
    }

    #[test]
    fn invalid_coordinates_are_null_not_fatal() {
        let index = test_index(&[block(
            0,
            "MARKET ST",
            vec![(-75.150, 39.950), (-75.149, 39.950)],
        )]);

        assert!(index.nearest_block(f64::NAN, 39.95).is_none());
        assert!(index.nearest_block(-75.15, f64::INFINITY).is_none());
    }

    #[test]
    fn equidistant_tie_breaks_to_lowest_id() {
        // Two parallel east-west blocks, the query point exactly halfway
        // between them. Insert in descending id order to prove the result
        // does not depend on input order.
        let blocks = vec![
            block(7, "NORTH ST", vec![(-75.150, 39.9504), (-75.149, 39.9504)]),
            block(3, "SOUTH ST", vec![(-75.150, 39.9496), (-75.149, 39.9496)]),
        ];
        let index = test_index(&blocks);

        let first = index.nearest_block(-75.1495, 39.9500).unwrap();
        let second = index.nearest_block(-75.1495, 39.9500).unwrap();
        assert_eq!(first.segment_id, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn long_blocks_are_not_assigned() {
        let mut long_block = block(0, "ROOSEVELT BLVD", vec![
            (-75.150, 39.950),
            (-75.149, 39.950),
        ]);
        long_block.length_ft = 6000.0;
        let index = test_index(&[long_block]);

        assert!(index.nearest_block(-75.1495, 39.9500).is_none());
    }

    #[test]
    fn empty_street_layer_is_invalid_geometry() {
        let err = StreetIndex::build(&[], SpatialJoinConfig::default()).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidGeometry { .. }));
    }

    fn square(id: &str, min: (f64, f64), max: (f64, f64)) -> ReferenceFeature {
        ReferenceFeature {
            id: id.to_string(),
            geometry: geo::Geometry::Polygon(polygon![
                (x: min.0, y: min.1),
                (x: max.0, y: min.1),
                (x: max.0, y: max.1),
                (x: min.0, y: max.1),
                (x: min.0, y: min.1),
            ]),
        }
    }

    #[test]
    fn boundary_lookup_finds_containing_polygon() {
        let mut layer = ReferenceLayer::new("zip_codes", "zip_code");
        layer.features.push(square("19121", (-75.20, 39.95), (-75.15, 40.00)));
        layer.features.push(square("19122", (-75.15, 39.95), (-75.10, 40.00)));
        let index = BoundaryIndex::build(&layer).unwrap();

        assert_eq!(index.locate(-75.18, 39.97), Some("19121"));
        assert_eq!(index.locate(-75.12, 39.97), Some("19122"));
        assert_eq!(index.locate(-75.30, 39.97), None);
    }

    #[test]
    fn overlapping_polygons_resolve_to_lowest_id() {
        let mut layer = ReferenceLayer::new("districts", "district");
        layer.features.push(square("22", (-75.20, 39.95), (-75.10, 40.00)));
        layer.features.push(square("14", (-75.20, 39.95), (-75.10, 40.00)));
        let index = BoundaryIndex::build(&layer).unwrap();

        assert_eq!(index.locate(-75.15, 39.97), Some("14"));
    }

    #[test]
    fn empty_boundary_layer_is_invalid_geometry() {
        let layer = ReferenceLayer::new("zip_codes", "zip_code");
        let err = BoundaryIndex::build(&layer).unwrap_err();
        assert!(matches!(err, SpatialError::InvalidGeometry { .. }));
    }
}
