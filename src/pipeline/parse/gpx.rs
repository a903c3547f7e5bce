use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::pipeline::normalize::normalize_pair;
use crate::pipeline::parse::Parser;
use crate::types::activity::{Coordinate, FileFormat, ParsedActivity, Trackpoint};

pub struct GpxParser;

impl Parser for GpxParser {
    fn parse(&self, bytes: &[u8]) -> ParsedActivity {
        let text = String::from_utf8_lossy(bytes);
        ParsedActivity {
            trackpoints: extract_gpx_trackpoints(&text),
            file_format: FileFormat::Gpx,
        }
    }
}

/// Track points, else waypoints, else route points, with elevation, time and
/// TrackPointExtension telemetry.
pub fn extract_gpx_trackpoints(xml: &str) -> Vec<Trackpoint> {
    scan(xml, true)
        .select()
        .into_iter()
        .enumerate()
        .map(|(idx, point)| point.into_trackpoint(idx))
        .collect()
}

/// Same fallback order as [`extract_gpx_trackpoints`], positions only.
pub fn extract_gpx_coordinates(xml: &str) -> Vec<Coordinate> {
    scan(xml, false)
        .select()
        .into_iter()
        .map(|point| point.coordinate)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointKind {
    Track,
    Waypoint,
    Route,
}

impl PointKind {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"trkpt" => Some(PointKind::Track),
            b"wpt" => Some(PointKind::Waypoint),
            b"rtept" => Some(PointKind::Route),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Elevation,
    Time,
    Speed,
    HeartRate,
    Power,
    Cadence,
    Temperature,
}

impl Child {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"ele" => Some(Child::Elevation),
            b"time" => Some(Child::Time),
            b"speed" => Some(Child::Speed),
            b"hr" => Some(Child::HeartRate),
            b"power" => Some(Child::Power),
            b"cad" => Some(Child::Cadence),
            b"atemp" => Some(Child::Temperature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct GpxPoint {
    coordinate: Coordinate,
    elevation: Option<f64>,
    time: Option<DateTime<Utc>>,
    speed: Option<f64>,
    heart_rate: Option<u16>,
    power: Option<u16>,
    cadence: Option<u16>,
    temperature: Option<f32>,
}

impl GpxPoint {
    fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            elevation: None,
            time: None,
            speed: None,
            heart_rate: None,
            power: None,
            cadence: None,
            temperature: None,
        }
    }

    fn set(&mut self, child: Child, text: &str) {
        let text = text.trim();
        match child {
            Child::Elevation => self.elevation = text.parse().ok(),
            Child::Time => {
                self.time = DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|t| t.with_timezone(&Utc))
            }
            Child::Speed => self.speed = text.parse().ok(),
            Child::HeartRate => self.heart_rate = text.parse().ok(),
            Child::Power => self.power = text.parse().ok(),
            Child::Cadence => self.cadence = text.parse().ok(),
            Child::Temperature => self.temperature = text.parse().ok(),
        }
    }

    fn into_trackpoint(self, sequence_index: usize) -> Trackpoint {
        Trackpoint {
            elevation: self.elevation,
            timestamp: self.time,
            speed: self.speed,
            heart_rate: self.heart_rate,
            power: self.power,
            cadence: self.cadence,
            temperature: self.temperature,
            ..Trackpoint::new(self.coordinate, sequence_index)
        }
    }
}

#[derive(Debug, Default)]
struct Buckets {
    track: Vec<GpxPoint>,
    waypoint: Vec<GpxPoint>,
    route: Vec<GpxPoint>,
}

impl Buckets {
    fn push(&mut self, kind: PointKind, point: GpxPoint) {
        match kind {
            PointKind::Track => self.track.push(point),
            PointKind::Waypoint => self.waypoint.push(point),
            PointKind::Route => self.route.push(point),
        }
    }

    fn select(self) -> Vec<GpxPoint> {
        if !self.track.is_empty() {
            self.track
        } else if !self.waypoint.is_empty() {
            self.waypoint
        } else {
            self.route
        }
    }
}

/// Open point element. `point` is `None` when its lat/lon were unusable, so
/// its children are still consumed but nothing is emitted.
struct OpenPoint {
    kind: PointKind,
    point: Option<GpxPoint>,
    child: Option<Child>,
}

fn point_from_attributes(start: &BytesStart) -> Option<GpxPoint> {
    let mut lat = None;
    let mut lon = None;
    for attr in start.attributes().with_checks(false).flatten() {
        let value = attr.unescape_value().ok();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = value.and_then(|v| v.trim().parse::<f64>().ok()),
            b"lon" => lon = value.and_then(|v| v.trim().parse::<f64>().ok()),
            _ => {}
        }
    }
    normalize_pair(lat?, lon?).map(GpxPoint::at)
}

/// Single non-validating pass over the document collecting all three point
/// kinds. A reader error ends the scan with whatever was gathered.
fn scan(xml: &str, detailed: bool) -> Buckets {
    let mut buckets = Buckets::default();
    if xml.trim().is_empty() {
        return buckets;
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut open: Option<OpenPoint> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if let Some(current) = open.as_mut() {
                    current.child = if detailed {
                        Child::from_tag(name.as_ref())
                    } else {
                        None
                    };
                } else if let Some(kind) = PointKind::from_tag(name.as_ref()) {
                    open = Some(OpenPoint {
                        kind,
                        point: point_from_attributes(&e),
                        child: None,
                    });
                }
            }
            Ok(Event::Empty(e)) => {
                if open.is_none() {
                    if let Some(kind) = PointKind::from_tag(e.local_name().as_ref()) {
                        if let Some(point) = point_from_attributes(&e) {
                            buckets.push(kind, point);
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(OpenPoint {
                    point: Some(point),
                    child: Some(child),
                    ..
                }) = open.as_mut()
                {
                    if let Ok(text) = e.unescape() {
                        point.set(*child, &text);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if let Some(current) = open.as_mut() {
                    if PointKind::from_tag(name.as_ref()) == Some(current.kind) {
                        if let Some(OpenPoint {
                            kind,
                            point: Some(point),
                            ..
                        }) = open.take()
                        {
                            buckets.push(kind, point);
                        }
                    } else {
                        current.child = None;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::warn!(
                    "GPX scan stopped at byte {}: {}",
                    reader.buffer_position(),
                    err
                );
                break;
            }
            _ => {}
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <wpt lat="1.0" lon="1.0"><name>Start</name></wpt>
  <trk><name>Morning Ride</name><trkseg>
    <trkpt lat="45.5" lon="-122.5">
      <ele>100.5</ele>
      <time>2024-01-01T00:00:00Z</time>
      <extensions><gpxtpx:TrackPointExtension><gpxtpx:hr>140</gpxtpx:hr><gpxtpx:cad>85</gpxtpx:cad></gpxtpx:TrackPointExtension><power>250</power></extensions>
    </trkpt>
    <trkpt lat="45.51" lon="-122.51"></trkpt>
    <trkpt lat="abc" lon="-122.52"><ele>5</ele></trkpt>
    <trkpt lat="95.0" lon="-122.52"/>
    <trkpt lat="45.52" lon="-122.52"><ele>not-a-number</ele><time>yesterday</time></trkpt>
  </trkseg></trk>
</gpx>"#;

    #[test]
    fn extracts_track_points_with_children() {
        let points = extract_gpx_trackpoints(TRACK);
        assert_eq!(points.len(), 3);

        let first = &points[0];
        assert_eq!(first.coordinate(), [45.5, -122.5]);
        assert_eq!(first.elevation, Some(100.5));
        assert_eq!(
            first.timestamp.map(|t| t.to_rfc3339()),
            Some("2024-01-01T00:00:00+00:00".to_string())
        );
        assert_eq!(first.heart_rate, Some(140));
        assert_eq!(first.cadence, Some(85));
        assert_eq!(first.power, Some(250));

        assert_eq!(points[1].elevation, None);
        assert_eq!(points[1].timestamp, None);
        assert_eq!(points[2].elevation, None);
        assert_eq!(points[2].timestamp, None);
        assert_eq!(
            points.iter().map(|p| p.sequence_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn coordinates_follow_same_selection() {
        assert_eq!(
            extract_gpx_coordinates(TRACK),
            vec![[45.5, -122.5], [45.51, -122.51], [45.52, -122.52]]
        );
    }

    #[test]
    fn falls_back_to_waypoints_then_route_points() {
        let waypoints = r#"<gpx><wpt lat="1" lon="2"><ele>3</ele></wpt><rte><rtept lat="9" lon="9"/></rte></gpx>"#;
        assert_eq!(extract_gpx_coordinates(waypoints), vec![[1.0, 2.0]]);
        assert_eq!(extract_gpx_trackpoints(waypoints)[0].elevation, Some(3.0));

        let route = r#"<gpx><rte><rtept lat="10" lon="20"/><rtept lat="11" lon="21"><ele>7</ele></rtept></rte></gpx>"#;
        assert_eq!(extract_gpx_coordinates(route), vec![[10.0, 20.0], [11.0, 21.0]]);
    }

    #[test]
    fn empty_and_garbage_text_yield_nothing() {
        assert!(extract_gpx_trackpoints("").is_empty());
        assert!(extract_gpx_coordinates("   \n").is_empty());
        assert!(extract_gpx_coordinates("not xml at all").is_empty());
    }

    #[test]
    fn prefixed_elements_are_recognised() {
        let xml = r#"<gpx:gpx xmlns:gpx="http://www.topografix.com/GPX/1/1"><gpx:trk><gpx:trkseg><gpx:trkpt lat="3" lon="4"><gpx:ele>12</gpx:ele></gpx:trkpt></gpx:trkseg></gpx:trk></gpx:gpx>"#;
        let points = extract_gpx_trackpoints(xml);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].elevation, Some(12.0));
    }
}
