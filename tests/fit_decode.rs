mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{record_payload, sample_points, semicircles, FitBuilder, SamplePoint, RECORD_FIELDS};
use ridefuel::decode_fit_file;
use ridefuel::pipeline::parse::fit::{FitDecoder, SkipReason, FIT_EPOCH_OFFSET};

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().expect("time")
}

#[test]
fn round_trip_preserves_record_fields() {
    let points = sample_points();
    let mut builder = FitBuilder::new().definition(0, 20, &RECORD_FIELDS);
    for point in &points {
        builder = builder.record(0, point);
    }

    let outcome = FitDecoder::new().decode_at(&builder.build(), fixed_now());
    assert_eq!(outcome.trackpoints.len(), points.len());
    assert_eq!(outcome.stats.definitions, 1);
    assert_eq!(outcome.stats.data_records, points.len());

    for (idx, (decoded, original)) in outcome.trackpoints.iter().zip(&points).enumerate() {
        assert_eq!(decoded.sequence_index, idx);
        assert!((decoded.lat - original.lat).abs() < 1e-6);
        assert!((decoded.lng - original.lng).abs() < 1e-6);
        assert!((decoded.elevation.expect("elevation") - original.elevation).abs() < 0.2 + 1e-9);
        assert!((decoded.speed.expect("speed") - original.speed).abs() < 1e-3);
        assert_eq!(decoded.power, Some(original.power));
        assert_eq!(decoded.heart_rate, Some(original.heart_rate as u16));
        assert_eq!(decoded.cadence, Some(original.cadence as u16));
        assert_eq!(
            decoded.timestamp.map(|t| t.timestamp()),
            Some(FIT_EPOCH_OFFSET + original.timestamp as i64)
        );
    }
}

#[test]
fn semicircle_sentinel_means_missing_position() {
    let mut payload = record_payload(&sample_points()[0]);
    payload[4..8].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());

    let buf = FitBuilder::new()
        .definition(0, 20, &RECORD_FIELDS)
        .data(0, &payload)
        .record(0, &sample_points()[1])
        .build();

    let outcome = FitDecoder::new().decode(&buf);
    assert_eq!(outcome.trackpoints.len(), 1);
    assert_eq!(outcome.trackpoints[0].sequence_index, 0);
    assert_eq!(outcome.stats.skipped(SkipReason::InvalidPosition), 1);
}

#[test]
fn out_of_range_latitude_is_dropped() {
    let bad = SamplePoint {
        lat: 91.0,
        ..sample_points()[0]
    };
    assert!(semicircles(91.0) < i32::MAX);

    let buf = FitBuilder::new()
        .definition(0, 20, &RECORD_FIELDS)
        .record(0, &bad)
        .record(0, &sample_points()[1])
        .build();

    let points = decode_fit_file(&buf);
    assert_eq!(points.len(), 1);
    assert!(points.iter().all(|p| (-90.0..=90.0).contains(&p.lat)));
}

#[test]
fn other_sentinels_leave_attributes_absent() {
    let mut payload = record_payload(&sample_points()[0]);
    payload[12..14].copy_from_slice(&0xFFFFu16.to_le_bytes()); // altitude
    payload[14..16].copy_from_slice(&0xFFFFu16.to_le_bytes()); // power
    payload[16] = 0xFF; // heart rate
    payload[17] = 0xFF; // cadence
    payload[18..20].copy_from_slice(&0xFFFFu16.to_le_bytes()); // speed

    let buf = FitBuilder::new()
        .definition(0, 20, &RECORD_FIELDS)
        .data(0, &payload)
        .build();
    let points = decode_fit_file(&buf);
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.elevation, None);
    assert_eq!(point.power, None);
    assert_eq!(point.heart_rate, None);
    assert_eq!(point.cadence, None);
    assert_eq!(point.speed, None);
    assert!(point.timestamp.is_some());
}

#[test]
fn non_record_messages_produce_no_points() {
    let session_fields = [(253, 4, 0x86), (0, 4, 0x85), (1, 4, 0x85)];
    let mut session = Vec::new();
    session.extend_from_slice(&7u32.to_le_bytes());
    session.extend_from_slice(&semicircles(10.0).to_le_bytes());
    session.extend_from_slice(&semicircles(10.0).to_le_bytes());

    let buf = FitBuilder::new()
        .definition(1, 18, &session_fields)
        .data(1, &session)
        .definition(0, 20, &RECORD_FIELDS)
        .record(0, &sample_points()[0])
        .build();

    let outcome = FitDecoder::new().decode(&buf);
    assert_eq!(outcome.trackpoints.len(), 1);
    assert_eq!(outcome.stats.skipped(SkipReason::NonRecordMessage), 1);
}

#[test]
fn garbage_between_records_is_skipped() {
    let buf = FitBuilder::new()
        .definition(0, 20, &RECORD_FIELDS)
        .record(0, &sample_points()[0])
        .raw(&[0x07, 0x0E])
        .record(0, &sample_points()[1])
        .build();

    let outcome = FitDecoder::new().decode(&buf);
    assert_eq!(outcome.trackpoints.len(), 2);
    assert_eq!(outcome.stats.skipped(SkipReason::UnknownLocalType), 2);
}

#[test]
fn redefinition_replaces_layout() {
    let short_fields = [(0, 4, 0x85), (1, 4, 0x85)];
    let mut short = Vec::new();
    short.extend_from_slice(&semicircles(1.5).to_le_bytes());
    short.extend_from_slice(&semicircles(2.5).to_le_bytes());

    let buf = FitBuilder::new()
        .definition(0, 20, &RECORD_FIELDS)
        .record(0, &sample_points()[0])
        .definition(0, 20, &short_fields)
        .data(0, &short)
        .build();

    let outcome = FitDecoder::new().decode_at(&buf, fixed_now());
    assert_eq!(outcome.trackpoints.len(), 2);
    let second = &outcome.trackpoints[1];
    assert!((second.lat - 1.5).abs() < 1e-6);
    assert!((second.lng - 2.5).abs() < 1e-6);
    assert_eq!(second.power, None);
    // first point carries a timestamp, so nothing is synthesized
    assert_eq!(second.timestamp, None);
}

#[test]
fn missing_timestamps_are_synthesized_from_now() {
    let fields = [(0, 4, 0x85), (1, 4, 0x85)];
    let mut builder = FitBuilder::new().definition(3, 20, &fields);
    for i in 0..3 {
        let mut payload = Vec::new();
        payload.extend_from_slice(&semicircles(40.0 + i as f64 * 0.001).to_le_bytes());
        payload.extend_from_slice(&semicircles(-3.0).to_le_bytes());
        builder = builder.data(3, &payload);
    }

    let now = fixed_now();
    let points = FitDecoder::new().decode_at(&builder.build(), now).trackpoints;
    assert_eq!(points.len(), 3);
    for (idx, point) in points.iter().enumerate() {
        assert_eq!(point.timestamp, Some(now + Duration::seconds(idx as i64)));
    }
}

#[test]
fn big_endian_definitions_decode() {
    let fields = [(0, 4, 0x85), (1, 4, 0x85), (7, 2, 0x84)];
    let mut payload = Vec::new();
    payload.extend_from_slice(&semicircles(-45.0).to_be_bytes());
    payload.extend_from_slice(&semicircles(170.0).to_be_bytes());
    payload.extend_from_slice(&321u16.to_be_bytes());

    let buf = FitBuilder::new()
        .definition_with_arch(2, 20, &fields, 1)
        .data(2, &payload)
        .build();

    let points = decode_fit_file(&buf);
    assert_eq!(points.len(), 1);
    assert!((points[0].lat + 45.0).abs() < 1e-6);
    assert!((points[0].lng - 170.0).abs() < 1e-6);
    assert_eq!(points[0].power, Some(321));
}

#[test]
fn truncated_tail_keeps_earlier_points() {
    let payload = record_payload(&sample_points()[1]);
    let buf = FitBuilder::new()
        .definition(0, 20, &RECORD_FIELDS)
        .record(0, &sample_points()[0])
        .data(0, &payload[..payload.len() - 5])
        .build();

    let outcome = FitDecoder::new().decode(&buf);
    assert_eq!(outcome.trackpoints.len(), 1);
    assert!(outcome.stats.skipped(SkipReason::Truncated) >= 1);
}

#[test]
fn wrong_signature_returns_empty() {
    let mut buf = FitBuilder::new()
        .definition(0, 20, &RECORD_FIELDS)
        .record(0, &sample_points()[0])
        .build();
    buf[8..12].copy_from_slice(b"GPX!");
    assert!(decode_fit_file(&buf).is_empty());
    assert!(decode_fit_file(&buf[..5]).is_empty());
}

#[test]
fn record_ceiling_stops_with_accumulated_points() {
    let mut builder = FitBuilder::new().definition(0, 20, &RECORD_FIELDS);
    for _ in 0..10 {
        builder = builder.record(0, &sample_points()[0]);
    }

    let outcome = FitDecoder::with_record_limit(5).decode(&builder.build());
    assert!(outcome.stats.hit_record_limit);
    assert_eq!(outcome.stats.iterations, 5);
    assert_eq!(outcome.trackpoints.len(), 4);
}

#[test]
fn corrupt_stream_terminates_at_default_ceiling() {
    let buf = FitBuilder::new()
        .definition(0, 20, &RECORD_FIELDS)
        .record(0, &sample_points()[0])
        .raw(&vec![0x0F; 120_000])
        .build();

    let outcome = FitDecoder::new().decode(&buf);
    assert!(outcome.stats.hit_record_limit);
    assert_eq!(outcome.trackpoints.len(), 1);
}
