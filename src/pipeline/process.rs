use crate::types::activity::{Coordinate, FileFormat, RouteMetrics, StoredRoute, Trackpoint};

/// Upper bound on the denormalised `coordinates` array stored with a route.
pub const MAX_ROUTE_COORDINATES: usize = 1000;

pub fn compute_metrics(points: &[Trackpoint]) -> RouteMetrics {
    let mut distance_km = 0.0;
    let mut elevation_gain_m = 0.0;
    let mut power_sum = 0u64;
    let mut power_count = 0u64;

    for pair in points.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        distance_km += haversine_distance(prev.lat, prev.lng, curr.lat, curr.lng);

        if let (Some(prev_ele), Some(curr_ele)) = (prev.elevation, curr.elevation) {
            let gain = curr_ele - prev_ele;
            if gain > 0.0 {
                elevation_gain_m += gain;
            }
        }
    }

    // Last minus first timestamp; out-of-order points in between do not count.
    let mut timestamps = points.iter().filter_map(|p| p.timestamp);
    let duration_seconds = match (timestamps.next(), timestamps.last()) {
        (Some(first), Some(last)) => (last - first).num_seconds().max(0) as u64,
        _ => 0,
    };

    for power in points.iter().filter_map(|p| p.power) {
        power_sum += power as u64;
        power_count += 1;
    }

    RouteMetrics {
        distance_km,
        elevation_gain_m,
        duration_seconds,
        avg_power: if power_count > 0 {
            Some((power_sum / power_count) as u16)
        } else {
            None
        },
    }
}

/// Evenly strided subset of the route for map display, always keeping both ends.
pub fn simplify_coordinates(points: &[Trackpoint], max_points: usize) -> Vec<Coordinate> {
    if points.len() <= max_points || max_points < 2 {
        return points.iter().map(Trackpoint::coordinate).collect();
    }

    let last = points.len() - 1;
    let step = last as f64 / (max_points - 1) as f64;
    (0..max_points)
        .map(|i| ((i as f64 * step).round() as usize).min(last))
        .map(|idx| points[idx].coordinate())
        .collect()
}

/// Persisted form of a decoded route: every point as a row, plus the
/// simplified coordinate array used for map display.
pub fn build_stored_route(
    route_id: &str,
    file_format: Option<FileFormat>,
    points: &[Trackpoint],
) -> StoredRoute {
    StoredRoute {
        coordinates: simplify_coordinates(points, MAX_ROUTE_COORDINATES),
        ..StoredRoute::new(route_id, file_format, points)
    }
}

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const R: f64 = 6371.0; // Earth radius in km

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    R * c
}
