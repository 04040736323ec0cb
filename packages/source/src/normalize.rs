//! Normalization of raw feed rows into incident records.
//!
//! The feed stores dates split across `date_` (a timestamp whose time
//! part is meaningless) and `time` (a clock string that may be the
//! literal `"<Null>"`). Race, latino, and age follow the dashboard's
//! display rules: missing race becomes `"Other/Unknown"`, a set latino
//! flag overrides race to `"H"`, and ages bucket into display groups.
//!
//! Columns not covered by the typed schema pass through verbatim in the
//! record's `extra` map so downstream consumers keep seeing them.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use gv_dashboard_incident_models::{AgeGroup, IncidentRecord};

/// Feed columns that are represented by typed record fields (or are
/// projection artifacts) and therefore excluded from the `extra` map.
const CONSUMED_COLUMNS: &[&str] = &[
    "dc_key",
    "date_",
    "time",
    "race",
    "sex",
    "age",
    "latino",
    "fatal",
    "year",
    "point_x",
    "point_y",
    "objectid",
    "the_geom",
    "the_geom_webmercator",
];

/// Normalizes raw Carto rows into incident records.
///
/// Rows without a DC number cannot be keyed and are dropped with a
/// warning; everything else is preserved, including rows with missing
/// coordinates or dates.
#[must_use]
pub fn normalize_rows(rows: &[serde_json::Value]) -> Vec<IncidentRecord> {
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for row in rows {
        match normalize_row(row) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Dropped {skipped} feed rows without a DC number");
    }
    log::info!(
        "Normalized {} incidents from {} raw rows",
        records.len(),
        rows.len()
    );
    records
}

/// Normalizes a single feed row. Returns `None` when the row has no DC
/// number.
#[must_use]
pub fn normalize_row(row: &serde_json::Value) -> Option<IncidentRecord> {
    let object = row.as_object()?;

    let dc_key = value_to_string(object.get("dc_key")?)?;
    let mut record = IncidentRecord::new(dc_key);

    record.date = parse_feed_date(
        object.get("date_").and_then(serde_json::Value::as_str),
        object.get("time").and_then(serde_json::Value::as_str),
    );

    record.longitude = object.get("point_x").and_then(serde_json::Value::as_f64);
    record.latitude = object.get("point_y").and_then(serde_json::Value::as_f64);

    record.latino = object.get("latino").and_then(value_to_flag);
    record.fatal = object.get("fatal").and_then(value_to_flag);
    record.sex = object.get("sex").and_then(value_to_string);
    record.age = object.get("age").and_then(value_to_f64);
    record.age_group = AgeGroup::from_age(record.age);

    let race = object
        .get("race")
        .and_then(value_to_string)
        .unwrap_or_else(|| "Other/Unknown".to_string());
    record.race = if record.latino == Some(true) {
        Some("H".to_string())
    } else {
        Some(race)
    };

    let mut extra = BTreeMap::new();
    for (key, value) in object {
        if !CONSUMED_COLUMNS.contains(&key.as_str()) {
            extra.insert(key.clone(), value.clone());
        }
    }
    record.extra = extra;

    Some(record)
}

/// Combines the feed's split date and time columns.
///
/// The date is the first 10 characters of `date_`; the time defaults to
/// midnight when missing or `"<Null>"`.
fn parse_feed_date(date: Option<&str>, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = date?;
    if date.len() < 10 {
        return None;
    }

    let time = match time {
        Some(t) if !t.is_empty() && t != "<Null>" => t,
        _ => "00:00:00",
    };

    let combined = format!("{} {time}", &date[..10]);
    NaiveDateTime::parse_from_str(&combined, "%Y-%m-%d %H:%M:%S").ok()
}

/// Converts a JSON value to a non-empty string.
fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts a JSON value to `f64`, accepting numeric strings.
fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Converts the feed's 0/1 indicator columns to a boolean.
fn value_to_flag(value: &serde_json::Value) -> Option<bool> {
    value_to_f64(value).map(|n| n > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_row() -> serde_json::Value {
        serde_json::json!({
            "cartodb_id": 12345,
            "dc_key": "202401001",
            "date_": "2024-03-15T00:00:00Z",
            "time": "22:41:00",
            "race": "B",
            "sex": "M",
            "age": "27",
            "latino": 0,
            "fatal": 1,
            "wound": "chest",
            "point_x": -75.16,
            "point_y": 39.99,
            "objectid": 999
        })
    }

    #[test]
    fn normalizes_full_row() {
        let record = normalize_row(&feed_row()).unwrap();
        assert_eq!(record.dc_key, "202401001");
        assert_eq!(
            record.date.unwrap().to_string(),
            "2024-03-15 22:41:00"
        );
        assert_eq!(record.fatal, Some(true));
        assert_eq!(record.race.as_deref(), Some("B"));
        assert_eq!(record.age, Some(27.0));
        assert_eq!(record.age_group, AgeGroup::Age18To30);
        assert_eq!(record.longitude, Some(-75.16));
    }

    #[test]
    fn null_time_defaults_to_midnight() {
        let mut row = feed_row();
        row["time"] = serde_json::json!("<Null>");
        let record = normalize_row(&row).unwrap();
        assert_eq!(
            record.date.unwrap().to_string(),
            "2024-03-15 00:00:00"
        );
    }

    #[test]
    fn latino_flag_overrides_race() {
        let mut row = feed_row();
        row["latino"] = serde_json::json!(1);
        let record = normalize_row(&row).unwrap();
        assert_eq!(record.race.as_deref(), Some("H"));
    }

    #[test]
    fn missing_race_becomes_other_unknown() {
        let mut row = feed_row();
        row["race"] = serde_json::Value::Null;
        let record = normalize_row(&row).unwrap();
        assert_eq!(record.race.as_deref(), Some("Other/Unknown"));
    }

    #[test]
    fn unknown_columns_pass_through_extra() {
        let record = normalize_row(&feed_row()).unwrap();
        assert_eq!(record.extra["wound"], "chest");
        assert_eq!(record.extra["cartodb_id"], 12345);
        // Consumed and projection columns stay out of the extra map.
        assert!(!record.extra.contains_key("point_x"));
        assert!(!record.extra.contains_key("objectid"));
    }

    #[test]
    fn row_without_dc_key_is_dropped() {
        let mut row = feed_row();
        row.as_object_mut().unwrap().remove("dc_key");
        assert!(normalize_row(&row).is_none());
        assert!(normalize_rows(&[row]).is_empty());
    }

    #[test]
    fn unparseable_date_is_none_not_fatal() {
        let mut row = feed_row();
        row["date_"] = serde_json::json!("bogus");
        let record = normalize_row(&row).unwrap();
        assert!(record.date.is_none());
    }
}
