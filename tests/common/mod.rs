#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use ridefuel::{
    config::Config,
    routes,
    state::{AppState, MemoryRouteStore},
};

pub fn app() -> Router {
    let state = AppState::new(Config::default());
    routes::api_router().with_state(state)
}

/// Router plus a handle on its store, for asserting what was persisted.
pub fn app_with_store() -> (Router, Arc<MemoryRouteStore>) {
    let store = Arc::new(MemoryRouteStore::new());
    let state = AppState::with_store(Config::default(), store.clone());
    (routes::api_router().with_state(state), store)
}

pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])], boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

pub const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test">
  <trk><name>Test Ride</name><trkseg>
    <trkpt lat="52.5200" lon="13.4050"><ele>34.0</ele><time>2026-01-01T12:00:00Z</time></trkpt>
    <trkpt lat="52.5205" lon="13.4060"><ele>39.0</ele><time>2026-01-01T12:00:10Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;

/// (field number, size, base type)
pub type FieldSpec = (u8, u8, u8);

pub const RECORD_FIELDS: [FieldSpec; 8] = [
    (253, 4, 0x86),
    (0, 4, 0x85),
    (1, 4, 0x85),
    (2, 2, 0x84),
    (7, 2, 0x84),
    (3, 1, 0x02),
    (4, 1, 0x02),
    (6, 2, 0x84),
];

#[derive(Debug, Clone, Copy)]
pub struct SamplePoint {
    pub timestamp: u32,
    pub lat: f64,
    pub lng: f64,
    pub elevation: f64,
    pub power: u16,
    pub heart_rate: u8,
    pub cadence: u8,
    pub speed: f64,
}

pub fn semicircles(degrees: f64) -> i32 {
    (degrees * 2_147_483_648.0 / 180.0).round() as i32
}

/// Data payload for [`RECORD_FIELDS`], little endian.
pub fn record_payload(point: &SamplePoint) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&point.timestamp.to_le_bytes());
    out.extend_from_slice(&semicircles(point.lat).to_le_bytes());
    out.extend_from_slice(&semicircles(point.lng).to_le_bytes());
    out.extend_from_slice(&(((point.elevation + 500.0) * 5.0).round() as u16).to_le_bytes());
    out.extend_from_slice(&point.power.to_le_bytes());
    out.push(point.heart_rate);
    out.push(point.cadence);
    out.extend_from_slice(&((point.speed * 1000.0).round() as u16).to_le_bytes());
    out
}

/// Test harness that writes a FIT byte stream record by record.
#[derive(Debug, Default)]
pub struct FitBuilder {
    records: Vec<u8>,
}

impl FitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definition(self, local: u8, global: u16, fields: &[FieldSpec]) -> Self {
        self.definition_with_arch(local, global, fields, 0)
    }

    pub fn definition_with_arch(
        mut self,
        local: u8,
        global: u16,
        fields: &[FieldSpec],
        architecture: u8,
    ) -> Self {
        self.records.push(0x40 | (local & 0x0F));
        self.records.push(0);
        self.records.push(architecture);
        if architecture == 1 {
            self.records.extend_from_slice(&global.to_be_bytes());
        } else {
            self.records.extend_from_slice(&global.to_le_bytes());
        }
        self.records.push(fields.len() as u8);
        for (number, size, base_type) in fields {
            self.records.extend_from_slice(&[*number, *size, *base_type]);
        }
        self
    }

    pub fn data(mut self, local: u8, payload: &[u8]) -> Self {
        self.records.push(local & 0x0F);
        self.records.extend_from_slice(payload);
        self
    }

    pub fn record(self, local: u8, point: &SamplePoint) -> Self {
        let payload = record_payload(point);
        self.data(local, &payload)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.records.extend_from_slice(bytes);
        self
    }

    /// 14-byte header, records, and a zero CRC.
    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![14u8, 0x20, 0x5C, 0x08];
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        out.extend_from_slice(b".FIT");
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.records);
        out.extend_from_slice(&[0, 0]);
        out
    }
}

pub fn sample_points() -> Vec<SamplePoint> {
    vec![
        SamplePoint {
            timestamp: 1_000_000_000,
            lat: 45.523_064,
            lng: -122.676_483,
            elevation: 52.4,
            power: 210,
            heart_rate: 132,
            cadence: 88,
            speed: 8.345,
        },
        SamplePoint {
            timestamp: 1_000_000_001,
            lat: 45.523_164,
            lng: -122.676_383,
            elevation: 53.0,
            power: 245,
            heart_rate: 135,
            cadence: 90,
            speed: 8.512,
        },
        SamplePoint {
            timestamp: 1_000_000_002,
            lat: -33.868_820,
            lng: 151.209_296,
            elevation: -12.6,
            power: 0,
            heart_rate: 60,
            cadence: 0,
            speed: 0.0,
        },
    ]
}
