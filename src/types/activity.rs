use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::energy::RouteEnergySummary;

/// Canonical `[lat, lng]` pair in degrees.
pub type Coordinate = [f64; 2];

/// One decoded GPS fix. Only ever constructed from a validated [`Coordinate`],
/// so `lat`/`lng` are always inside the geographic range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trackpoint {
    pub lat: f64,
    pub lng: f64,
    pub elevation: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub power: Option<u16>,
    pub heart_rate: Option<u16>,
    pub cadence: Option<u16>,
    pub speed: Option<f64>,
    pub distance: Option<f64>,
    pub temperature: Option<f32>,
    pub sequence_index: usize,
}

impl Trackpoint {
    pub fn new(coordinate: Coordinate, sequence_index: usize) -> Self {
        Self {
            lat: coordinate[0],
            lng: coordinate[1],
            elevation: None,
            timestamp: None,
            power: None,
            heart_rate: None,
            cadence: None,
            speed: None,
            distance: None,
            temperature: None,
            sequence_index,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        [self.lat, self.lng]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Gpx,
    Fit,
}

impl FileFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_name(ext)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "gpx" | "xml" => Some(FileFormat::Gpx),
            "fit" => Some(FileFormat::Fit),
            _ => None,
        }
    }

    /// Infers the format from the file contents.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[8..12] == b".FIT" {
            return Some(FileFormat::Fit);
        }

        let head = &bytes[..bytes.len().min(512)];
        let text = String::from_utf8_lossy(head);
        let text = text.trim_start_matches('\u{feff}').trim_start();
        if text.starts_with('<') || text.contains("<gpx") {
            return Some(FileFormat::Gpx);
        }
        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Gpx => "gpx",
            FileFormat::Fit => "fit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedActivity {
    pub trackpoints: Vec<Trackpoint>,
    pub file_format: FileFormat,
}

impl ParsedActivity {
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.trackpoints.iter().map(Trackpoint::coordinate).collect()
    }

    /// Fewer than two points is "no usable route data" for display purposes.
    pub fn has_route_data(&self) -> bool {
        self.trackpoints.len() >= 2
    }
}

/// Persisted per-point row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackpointRow {
    pub route_id: String,
    pub sequence_index: usize,
    pub lat: f64,
    pub lng: f64,
    pub elevation: Option<f64>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub power: Option<u16>,
    pub heart_rate: Option<u16>,
    pub cadence: Option<u16>,
}

impl TrackpointRow {
    pub fn from_trackpoint(route_id: &str, point: &Trackpoint) -> Self {
        Self {
            route_id: route_id.to_string(),
            sequence_index: point.sequence_index,
            lat: point.lat,
            lng: point.lng,
            elevation: point.elevation,
            recorded_at: point.timestamp,
            power: point.power,
            heart_rate: point.heart_rate,
            cadence: point.cadence,
        }
    }

    pub fn to_trackpoint(&self) -> Trackpoint {
        Trackpoint {
            elevation: self.elevation,
            timestamp: self.recorded_at,
            power: self.power,
            heart_rate: self.heart_rate,
            cadence: self.cadence,
            ..Trackpoint::new([self.lat, self.lng], self.sequence_index)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRoute {
    pub route_id: String,
    pub file_format: Option<FileFormat>,
    pub coordinates: Vec<Coordinate>,
    pub trackpoints: Vec<TrackpointRow>,
    pub energy: Option<RouteEnergySummary>,
}

impl StoredRoute {
    pub fn new(route_id: &str, file_format: Option<FileFormat>, trackpoints: &[Trackpoint]) -> Self {
        Self {
            route_id: route_id.to_string(),
            file_format,
            coordinates: trackpoints.iter().map(Trackpoint::coordinate).collect(),
            trackpoints: trackpoints
                .iter()
                .map(|point| TrackpointRow::from_trackpoint(route_id, point))
                .collect(),
            energy: None,
        }
    }

    pub fn to_trackpoints(&self) -> Vec<Trackpoint> {
        self.trackpoints.iter().map(TrackpointRow::to_trackpoint).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub duration_seconds: u64,
    pub avg_power: Option<u16>,
}
