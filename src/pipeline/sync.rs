//! Ingestion of geodata that arrives inside vendor activity payloads rather
//! than as a file. Every point goes through the normaliser.

use serde::Serialize;
use serde_json::Value;

use crate::pipeline::normalize::normalize_trackpoints;
use crate::types::activity::{Coordinate, Trackpoint};

/// Keys probed for the point list, in priority order.
pub const GEODATA_KEYS: [&str; 4] = ["trackpoints", "coordinates", "latlng", "points"];

#[derive(Debug, Clone, Serialize)]
pub struct IngestedRoute {
    pub route_id: String,
    pub source_key: Option<&'static str>,
    pub trackpoints: Vec<Trackpoint>,
    pub coordinates: Vec<Coordinate>,
    pub dropped: usize,
}

/// Finds the point array in a payload: the payload itself when it is an
/// array, else the first present geodata key.
pub fn locate_points(payload: &Value) -> Option<(Option<&'static str>, &[Value])> {
    match payload {
        Value::Array(items) => Some((None, items.as_slice())),
        Value::Object(map) => GEODATA_KEYS.iter().find_map(|key| {
            map.get(*key)
                .and_then(Value::as_array)
                .map(|items| (Some(*key), items.as_slice()))
        }),
        _ => None,
    }
}

pub fn ingest_activity(route_id: &str, payload: &Value) -> IngestedRoute {
    let Some((source_key, items)) = locate_points(payload) else {
        tracing::warn!("Route {}: payload carries no recognisable geodata", route_id);
        return IngestedRoute {
            route_id: route_id.to_string(),
            source_key: None,
            trackpoints: Vec::new(),
            coordinates: Vec::new(),
            dropped: 0,
        };
    };

    let batch = normalize_trackpoints(items);
    if batch.dropped > 0 {
        tracing::warn!(
            "Route {}: dropped {} of {} points in unrecognised or out-of-range formats",
            route_id,
            batch.dropped,
            items.len()
        );
    }
    tracing::info!(
        "Route {}: ingested {} points from {}",
        route_id,
        batch.items.len(),
        source_key.unwrap_or("array payload")
    );

    IngestedRoute {
        route_id: route_id.to_string(),
        source_key,
        coordinates: batch.items.iter().map(Trackpoint::coordinate).collect(),
        trackpoints: batch.items,
        dropped: batch.dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mixed_shapes_are_reconciled() {
        let payload = json!({
            "id": 991,
            "coordinates": [
                [52.52, 13.40],
                {"lat": 52.53, "lng": 13.41},
                {"latitude": 52.54, "longitude": 13.42, "elevation": 40},
                {"lat": 120.0, "lng": 13.0},
                "bogus",
                {"position": {"lat": 52.55, "lon": 13.43}, "power": 180}
            ]
        });

        let ingested = ingest_activity("route-7", &payload);
        assert_eq!(ingested.source_key, Some("coordinates"));
        assert_eq!(ingested.dropped, 2);
        assert_eq!(
            ingested.coordinates,
            vec![[52.52, 13.40], [52.53, 13.41], [52.54, 13.42], [52.55, 13.43]]
        );
        assert_eq!(ingested.trackpoints[2].elevation, Some(40.0));
        assert_eq!(ingested.trackpoints[3].power, Some(180));
        assert_eq!(ingested.trackpoints[3].sequence_index, 3);
    }

    #[test]
    fn trackpoints_key_wins_over_coordinates() {
        let payload = json!({
            "coordinates": [[1.0, 1.0]],
            "trackpoints": [[2.0, 2.0], [3.0, 3.0]]
        });
        let ingested = ingest_activity("r", &payload);
        assert_eq!(ingested.source_key, Some("trackpoints"));
        assert_eq!(ingested.coordinates.len(), 2);
    }

    #[test]
    fn bare_arrays_and_empty_payloads() {
        let ingested = ingest_activity("r", &json!([[1.0, 2.0]]));
        assert_eq!(ingested.source_key, None);
        assert_eq!(ingested.coordinates, vec![[1.0, 2.0]]);

        let ingested = ingest_activity("r", &json!({"name": "no geodata"}));
        assert!(ingested.trackpoints.is_empty());
        assert_eq!(ingested.dropped, 0);
    }
}
