//! The one place coordinate shapes are decided.
//!
//! Inputs arrive as arrays (`[lat, lng, ele?]`), objects with any of the
//! `lat`/`latitude` and `lng`/`lon`/`longitude` key spellings, or objects that
//! wrap one of those under a container key. FIT and GPX decoding, which
//! already hold typed numbers, go through [`normalize_pair`]; everything else
//! goes through [`CoordinateShape::classify`].

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::activity::{Coordinate, Trackpoint};

pub const MAX_NESTING_DEPTH: usize = 4;

const LAT_KEYS: [&str; 2] = ["lat", "latitude"];
const LNG_KEYS: [&str; 3] = ["lng", "lon", "longitude"];
const ELEVATION_KEYS: [&str; 4] = ["elevation", "ele", "altitude", "alt"];
const CONTAINER_KEYS: [&str; 5] = ["latlng", "point", "position", "location", "coordinate"];
const TIME_KEYS: [&str; 3] = ["time", "timestamp", "recorded_at"];
const POWER_KEYS: [&str; 2] = ["power", "watts"];
const HEART_RATE_KEYS: [&str; 4] = ["heartRate", "heart_rate", "heartrate", "hr"];
const CADENCE_KEYS: [&str; 1] = ["cadence"];
const SPEED_KEYS: [&str; 1] = ["speed"];

/// Recognised layout of a coordinate-like value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateShape<'a> {
    Array(&'a [Value]),
    Object {
        lat: &'a Value,
        lng: &'a Value,
        elevation: Option<&'a Value>,
    },
    Nested(&'a Value),
    Unrecognized,
}

impl<'a> CoordinateShape<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Array(items) if items.len() >= 2 => CoordinateShape::Array(items),
            Value::Object(map) => match (first_present(map, &LAT_KEYS), first_present(map, &LNG_KEYS)) {
                (Some(lat), Some(lng)) => CoordinateShape::Object {
                    lat,
                    lng,
                    elevation: first_present(map, &ELEVATION_KEYS),
                },
                _ => first_present(map, &CONTAINER_KEYS)
                    .map(CoordinateShape::Nested)
                    .unwrap_or(CoordinateShape::Unrecognized),
            },
            _ => CoordinateShape::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub coordinate: Coordinate,
    pub elevation: Option<f64>,
}

/// Result of a batch normalisation. `dropped` is diagnostic only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedBatch<T> {
    pub items: Vec<T>,
    pub dropped: usize,
}

/// Validates an already-typed pair. Out-of-range values are rejected, never clamped.
pub fn normalize_pair(lat: f64, lng: f64) -> Option<Coordinate> {
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some([lat, lng])
}

pub fn normalize_coordinate(value: &Value) -> Option<Coordinate> {
    normalize_point(value).map(|point| point.coordinate)
}

/// Like [`normalize_coordinate`] but also keeps the elevation when the input carries one.
pub fn normalize_point(value: &Value) -> Option<NormalizedPoint> {
    resolve(value, 0)
}

fn resolve(value: &Value, depth: usize) -> Option<NormalizedPoint> {
    match CoordinateShape::classify(value) {
        CoordinateShape::Array(items) => Some(NormalizedPoint {
            coordinate: normalize_pair(number(&items[0])?, number(&items[1])?)?,
            elevation: items.get(2).and_then(number),
        }),
        CoordinateShape::Object { lat, lng, elevation } => Some(NormalizedPoint {
            coordinate: normalize_pair(number(lat)?, number(lng)?)?,
            elevation: elevation.and_then(number),
        }),
        CoordinateShape::Nested(inner) if depth < MAX_NESTING_DEPTH => resolve(inner, depth + 1),
        CoordinateShape::Nested(_) | CoordinateShape::Unrecognized => None,
    }
}

pub fn normalize_coordinates<'a, I>(inputs: I) -> NormalizedBatch<Coordinate>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut items = Vec::new();
    let mut dropped = 0;
    for input in inputs {
        match normalize_coordinate(input) {
            Some(coordinate) => items.push(coordinate),
            None => dropped += 1,
        }
    }
    NormalizedBatch { items, dropped }
}

/// Builds a rich trackpoint from a coordinate-like value. Telemetry keys are
/// read from the outermost object, so `{"position": {..}, "power": 200}` works.
pub fn normalize_trackpoint(value: &Value, sequence_index: usize) -> Option<Trackpoint> {
    let point = normalize_point(value)?;
    let mut trackpoint = Trackpoint::new(point.coordinate, sequence_index);
    trackpoint.elevation = point.elevation;

    if let Value::Object(map) = value {
        trackpoint.timestamp = first_present(map, &TIME_KEYS).and_then(timestamp);
        trackpoint.power = first_present(map, &POWER_KEYS).and_then(unsigned);
        trackpoint.heart_rate = first_present(map, &HEART_RATE_KEYS).and_then(unsigned);
        trackpoint.cadence = first_present(map, &CADENCE_KEYS).and_then(unsigned);
        trackpoint.speed = first_present(map, &SPEED_KEYS).and_then(number);
    }

    Some(trackpoint)
}

/// Sequence indices are assigned over the kept points only, so they stay gap-free.
pub fn normalize_trackpoints<'a, I>(inputs: I) -> NormalizedBatch<Trackpoint>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut items: Vec<Trackpoint> = Vec::new();
    let mut dropped = 0;
    for input in inputs {
        match normalize_trackpoint(input, items.len()) {
            Some(point) => items.push(point),
            None => dropped += 1,
        }
    }
    NormalizedBatch { items, dropped }
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key))
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn unsigned(value: &Value) -> Option<u16> {
    let v = number(value)?.round();
    (0.0..=u16::MAX as f64).contains(&v).then_some(v as u16)
}

/// RFC 3339 strings, or integer Unix seconds.
fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}
