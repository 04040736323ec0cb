//! Persisted incident table, stored as a `GeoJSON` `FeatureCollection`.
//!
//! The raw table (`data/raw/shootings.json`) is the authoritative merge
//! input and round-trips every record field including the open `extra`
//! map. The per-year processed files carry the dashboard's published
//! column subset only.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use geojson::{Feature, FeatureCollection, JsonObject};
use gv_dashboard_incident_models::{
    AgeGroup, AreaAssignments, IncidentRecord, StreetMatch,
};

use crate::{StoreError, paths::DataPaths, write_atomic};

/// Timestamp format used in persisted properties.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Property names owned by the typed schema; everything else read from a
/// persisted feature lands in the record's `extra` map.
const TYPED_PROPERTIES: &[&str] = &[
    "dc_key",
    "date",
    "fatal",
    "race",
    "sex",
    "age",
    "latino",
    "age_group",
    "segment_id",
    "street_name",
    "block_number",
    "distance",
    "zip",
    "police",
    "council",
    "hood",
    "has_court_case",
];

/// Which columns a serialized feature carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    /// Every field, for the authoritative raw table.
    Full,
    /// The dashboard's published subset (no extra map, no distance).
    Published,
}

/// Loads the persisted incident table.
///
/// A missing file is an empty table (first run), not an error.
///
/// # Errors
///
/// Returns [`StoreError`] if the file exists but cannot be read or
/// parsed.
pub fn load_incidents(path: &Path) -> Result<Vec<IncidentRecord>, StoreError> {
    if !path.exists() {
        log::info!("No persisted incident table at {}", path.display());
        return Ok(Vec::new());
    }

    let body = std::fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&body)?;
    let collection =
        FeatureCollection::try_from(json).map_err(|e| StoreError::Malformed {
            path: path.display().to_string(),
            message: format!("not a GeoJSON FeatureCollection: {e}"),
        })?;

    let mut records = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        match feature_to_record(feature) {
            Some(record) => records.push(record),
            None => log::warn!(
                "Skipping persisted feature without dc_key in {}",
                path.display()
            ),
        }
    }

    log::info!("Loaded {} persisted incidents", records.len());
    Ok(records)
}

/// Saves the authoritative incident table.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or the write fails.
pub fn save_incidents(path: &Path, records: &[IncidentRecord]) -> Result<(), StoreError> {
    let collection = to_collection(records, Projection::Full);
    let body = serde_json::to_string(&collection)?;
    write_atomic(path, body.as_bytes())?;
    log::info!("Saved {} incidents to {}", records.len(), path.display());
    Ok(())
}

/// Saves the per-year published files (`shootings_<year>.json`).
///
/// Records without a date have no year and go into none of the files.
///
/// # Errors
///
/// Returns [`StoreError`] if any write fails.
pub fn save_processed_years(
    paths: &DataPaths,
    records: &[IncidentRecord],
) -> Result<(), StoreError> {
    let mut by_year: BTreeMap<i32, Vec<&IncidentRecord>> = BTreeMap::new();
    for record in records {
        if let Some(year) = record.year() {
            by_year.entry(year).or_default().push(record);
        }
    }

    for (year, year_records) in by_year {
        let features: Vec<Feature> = year_records
            .iter()
            .map(|r| record_to_feature(r, Projection::Published))
            .collect();
        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        let path = paths.processed_year_path(year);
        let body = serde_json::to_string(&collection)?;
        write_atomic(&path, body.as_bytes())?;
        log::info!(
            "Saved {} {year} incidents to {}",
            year_records.len(),
            path.display()
        );
    }

    Ok(())
}

fn to_collection(records: &[IncidentRecord], projection: Projection) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: records
            .iter()
            .map(|r| record_to_feature(r, projection))
            .collect(),
        foreign_members: None,
    }
}

fn record_to_feature(record: &IncidentRecord, projection: Projection) -> Feature {
    let mut props = JsonObject::new();
    let set = |props: &mut JsonObject, key: &str, value: serde_json::Value| {
        props.insert(key.to_string(), value);
    };

    set(&mut props, "dc_key", record.dc_key.clone().into());
    set(
        &mut props,
        "date",
        record
            .date
            .map_or(serde_json::Value::Null, |d| {
                d.format(DATE_FORMAT).to_string().into()
            }),
    );
    set(&mut props, "fatal", opt_bool(record.fatal));
    set(&mut props, "race", opt_string(record.race.as_deref()));
    set(&mut props, "sex", opt_string(record.sex.as_deref()));
    set(&mut props, "age", opt_f64(record.age));
    set(&mut props, "latino", opt_bool(record.latino));
    set(
        &mut props,
        "age_group",
        record.age_group.to_string().into(),
    );

    match &record.street {
        Some(street) => {
            set(&mut props, "segment_id", street.segment_id.to_string().into());
            set(&mut props, "street_name", street.street_name.clone().into());
            set(&mut props, "block_number", street.block_number.into());
            if projection == Projection::Full {
                set(&mut props, "distance", opt_f64(Some(street.distance)));
            }
        }
        None => {
            set(&mut props, "segment_id", serde_json::Value::Null);
            set(&mut props, "street_name", serde_json::Value::Null);
            set(&mut props, "block_number", serde_json::Value::Null);
            if projection == Projection::Full {
                set(&mut props, "distance", serde_json::Value::Null);
            }
        }
    }

    set(&mut props, "zip", opt_string(record.areas.zip.as_deref()));
    set(
        &mut props,
        "police",
        opt_string(record.areas.police_district.as_deref()),
    );
    set(
        &mut props,
        "council",
        opt_string(record.areas.council_district.as_deref()),
    );
    set(
        &mut props,
        "hood",
        opt_string(record.areas.neighborhood.as_deref()),
    );
    set(&mut props, "has_court_case", opt_bool(record.has_court_case));

    if projection == Projection::Full {
        for (key, value) in &record.extra {
            if !TYPED_PROPERTIES.contains(&key.as_str()) {
                props.insert(key.clone(), value.clone());
            }
        }
    }

    let geometry = record.coordinates().map(|(lon, lat)| {
        geojson::Geometry::new(geojson::Value::Point(vec![lon, lat]))
    });

    Feature {
        bbox: None,
        geometry,
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn feature_to_record(feature: &Feature) -> Option<IncidentRecord> {
    let props = feature.properties.as_ref()?;
    let dc_key = props.get("dc_key")?.as_str()?.to_string();

    let mut record = IncidentRecord::new(dc_key);

    record.date = props
        .get("date")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| NaiveDateTime::parse_from_str(s, DATE_FORMAT).ok());

    if let Some(geojson::Value::Point(coords)) =
        feature.geometry.as_ref().map(|g| &g.value)
        && coords.len() >= 2
    {
        record.longitude = Some(coords[0]);
        record.latitude = Some(coords[1]);
    }

    record.fatal = props.get("fatal").and_then(serde_json::Value::as_bool);
    record.latino = props.get("latino").and_then(serde_json::Value::as_bool);
    record.race = read_string(props, "race");
    record.sex = read_string(props, "sex");
    record.age = props.get("age").and_then(serde_json::Value::as_f64);
    record.age_group = props
        .get("age_group")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| AgeGroup::from_age(record.age));

    record.street = read_street(props);
    record.areas = AreaAssignments {
        zip: read_string(props, "zip"),
        police_district: read_string(props, "police"),
        council_district: read_string(props, "council"),
        neighborhood: read_string(props, "hood"),
    };
    record.has_court_case = props
        .get("has_court_case")
        .and_then(serde_json::Value::as_bool);

    for (key, value) in props {
        if !TYPED_PROPERTIES.contains(&key.as_str()) {
            record.extra.insert(key.clone(), value.clone());
        }
    }

    Some(record)
}

fn read_street(props: &JsonObject) -> Option<StreetMatch> {
    let segment_id = props
        .get("segment_id")
        .and_then(serde_json::Value::as_str)?
        .parse()
        .ok()?;
    Some(StreetMatch {
        segment_id,
        street_name: read_string(props, "street_name").unwrap_or_default(),
        block_number: props
            .get("block_number")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0),
        distance: props
            .get("distance")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0),
    })
}

fn read_string(props: &JsonObject, key: &str) -> Option<String> {
    props
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}

fn opt_string(value: Option<&str>) -> serde_json::Value {
    value.map_or(serde_json::Value::Null, Into::into)
}

fn opt_bool(value: Option<bool>) -> serde_json::Value {
    value.map_or(serde_json::Value::Null, Into::into)
}

fn opt_f64(value: Option<f64>) -> serde_json::Value {
    value.map_or(serde_json::Value::Null, |v| {
        serde_json::Number::from_f64(v).map_or(serde_json::Value::Null, Into::into)
    })
}
