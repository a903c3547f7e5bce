//! Best-effort FIT decoder for the `record` message subset.
//!
//! Only what a GPS track needs is decoded: position, altitude, speed, power,
//! heart rate, cadence, distance, temperature and timestamp. Anything the
//! decoder does not understand is skipped a byte or a record at a time;
//! corrupt input degrades to fewer points, never to an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

use crate::pipeline::normalize::normalize_pair;
use crate::pipeline::parse::field::{read_field, Endian, RawValue};
use crate::pipeline::parse::Parser;
use crate::types::activity::{FileFormat, ParsedActivity, Trackpoint};

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;
pub const RECORD_MESSAGE: u16 = 20;
pub const DEFAULT_RECORD_LIMIT: usize = 50_000;
pub const FIT_SIGNATURE: &[u8; 4] = b".FIT";

const SEMICIRCLES_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

const COMPRESSED_HEADER_FLAG: u8 = 0x80;
const DEFINITION_FLAG: u8 = 0x40;
const DEVELOPER_DATA_FLAG: u8 = 0x20;
const LOCAL_TYPE_MASK: u8 = 0x0F;
const LOCAL_TYPE_SLOTS: usize = 16;

const FIELD_TIMESTAMP: u8 = 253;
const FIELD_LATITUDE: u8 = 0;
const FIELD_LONGITUDE: u8 = 1;
const FIELD_ALTITUDE: u8 = 2;
const FIELD_HEART_RATE: u8 = 3;
const FIELD_CADENCE: u8 = 4;
const FIELD_DISTANCE: u8 = 5;
const FIELD_SPEED: u8 = 6;
const FIELD_POWER: u8 = 7;
const FIELD_TEMPERATURE: u8 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub field_number: u8,
    pub size: u8,
    pub base_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDefinition {
    pub local_message_type: u8,
    pub global_message_number: u16,
    pub endian: Endian,
    pub fields: Vec<FieldDefinition>,
    /// Bytes taken by developer fields in each data record. Never decoded.
    pub developer_data_size: usize,
}

impl MessageDefinition {
    /// Size of a matching data record, excluding its header byte.
    pub fn data_size(&self) -> usize {
        self.fields.iter().map(|f| f.size as usize).sum::<usize>() + self.developer_data_size
    }
}

/// Active definitions keyed by local message type. A new definition for a
/// slot replaces the old one.
#[derive(Debug, Default)]
pub struct DefinitionTable {
    slots: [Option<MessageDefinition>; LOCAL_TYPE_SLOTS],
}

impl DefinitionTable {
    pub fn define(&mut self, definition: MessageDefinition) {
        let slot = (definition.local_message_type & LOCAL_TYPE_MASK) as usize;
        self.slots[slot] = Some(definition);
    }

    pub fn get(&self, local_message_type: u8) -> Option<&MessageDefinition> {
        self.slots
            .get((local_message_type & LOCAL_TYPE_MASK) as usize)
            .and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Data record for a local type with no definition yet.
    UnknownLocalType,
    /// Record would run past the end of the data section.
    Truncated,
    /// Compressed-timestamp headers are not supported.
    CompressedTimestamp,
    /// `record` message without a usable latitude/longitude pair.
    InvalidPosition,
    /// Well-formed data record for a message other than `record`.
    NonRecordMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub definitions: usize,
    pub data_records: usize,
    pub trackpoints: usize,
    pub iterations: usize,
    pub hit_record_limit: bool,
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl DecodeStats {
    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_default() += 1;
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FitDecodeOutcome {
    pub trackpoints: Vec<Trackpoint>,
    pub stats: DecodeStats,
}

#[derive(Debug, Clone, Copy)]
struct FileHeader {
    header_size: usize,
    data_size: usize,
}

impl FileHeader {
    fn parse(buf: &[u8]) -> Option<Self> {
        let header_size = *buf.first()? as usize;
        if header_size < 12 || buf.len() < header_size {
            return None;
        }
        if &buf[8..12] != FIT_SIGNATURE {
            return None;
        }
        let data_size = u32::from_le_bytes(buf[4..8].try_into().ok()?) as usize;
        Some(Self {
            header_size,
            data_size,
        })
    }

    /// End of the record stream. A zero data size means the writer never
    /// patched the header, so the whole buffer is scanned.
    fn data_end(&self, buf_len: usize) -> usize {
        if self.data_size == 0 {
            buf_len
        } else {
            self.header_size.saturating_add(self.data_size).min(buf_len)
        }
    }
}

enum RecordStep {
    Definition(MessageDefinition, usize),
    Record(RecordFields, usize),
    OtherMessage(usize),
    Skip(SkipReason),
}

/// Semantic values pulled out of one `record` message.
#[derive(Debug, Default)]
struct RecordFields {
    lat: Option<f64>,
    lng: Option<f64>,
    elevation: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
    power: Option<u16>,
    heart_rate: Option<u16>,
    cadence: Option<u16>,
    speed: Option<f64>,
    distance: Option<f64>,
    temperature: Option<f32>,
}

impl RecordFields {
    fn apply(&mut self, field_number: u8, raw: RawValue) {
        match field_number {
            FIELD_TIMESTAMP if !raw.is_sentinel(0xFFFF_FFFF) => {
                self.timestamp = fit_timestamp(raw);
            }
            FIELD_LATITUDE if !raw.is_sentinel(0x7FFF_FFFF) => {
                self.lat = Some(semicircles_to_degrees(raw));
            }
            FIELD_LONGITUDE if !raw.is_sentinel(0x7FFF_FFFF) => {
                self.lng = Some(semicircles_to_degrees(raw));
            }
            FIELD_ALTITUDE if !raw.is_sentinel(0xFFFF) => {
                self.elevation = Some(raw.as_f64() / 5.0 - 500.0);
            }
            FIELD_SPEED if !raw.is_sentinel(0xFFFF) => {
                self.speed = Some(raw.as_f64() / 1000.0);
            }
            FIELD_POWER if !raw.is_sentinel(0xFFFF) => self.power = as_u16(raw),
            FIELD_HEART_RATE if !raw.is_sentinel(0xFF) => self.heart_rate = as_u16(raw),
            FIELD_CADENCE if !raw.is_sentinel(0xFF) => self.cadence = as_u16(raw),
            FIELD_DISTANCE if !raw.is_sentinel(0xFFFF_FFFF) => {
                self.distance = Some(raw.as_f64() / 100.0);
            }
            FIELD_TEMPERATURE if !raw.is_sentinel(0x7F) => {
                self.temperature = Some(raw.as_f64() as f32);
            }
            _ => {}
        }
    }

    /// Emits a trackpoint only for a present, in-range position.
    fn into_trackpoint(self, sequence_index: usize) -> Option<Trackpoint> {
        let coordinate = normalize_pair(self.lat?, self.lng?)?;
        Some(Trackpoint {
            elevation: self.elevation,
            timestamp: self.timestamp,
            power: self.power,
            heart_rate: self.heart_rate,
            cadence: self.cadence,
            speed: self.speed,
            distance: self.distance,
            temperature: self.temperature,
            ..Trackpoint::new(coordinate, sequence_index)
        })
    }
}

pub fn semicircles_to_degrees(raw: RawValue) -> f64 {
    raw.as_f64() * SEMICIRCLES_TO_DEGREES
}

pub fn fit_timestamp(raw: RawValue) -> Option<DateTime<Utc>> {
    let seconds = match raw {
        RawValue::Unsigned(v) => i64::try_from(v).ok()?,
        RawValue::Signed(v) => v,
        RawValue::Float(_) => return None,
    };
    Utc.timestamp_opt(FIT_EPOCH_OFFSET.checked_add(seconds)?, 0).single()
}

fn as_u16(raw: RawValue) -> Option<u16> {
    match raw {
        RawValue::Unsigned(v) => u16::try_from(v).ok(),
        RawValue::Signed(v) => u16::try_from(v).ok(),
        RawValue::Float(_) => None,
    }
}

fn read_u16(data: &[u8], offset: usize, endian: Endian) -> Option<u16> {
    let bytes: [u8; 2] = data.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u16::from_le_bytes(bytes),
        Endian::Big => u16::from_be_bytes(bytes),
    })
}

/// Parses a definition record starting at its header byte. Returns the
/// definition and the total record length, or `None` if it runs past `data`.
fn parse_definition(
    data: &[u8],
    offset: usize,
    has_developer_fields: bool,
) -> Option<(MessageDefinition, usize)> {
    let header = *data.get(offset)?;
    // reserved (1), architecture (1), global message number (2), field count (1)
    let body = offset + 1;
    let endian = Endian::from_architecture(*data.get(body + 1)?);
    let global_message_number = read_u16(data, body + 2, endian)?;
    let field_count = *data.get(body + 4)? as usize;

    let fields_start = body + 5;
    let fields_end = fields_start + field_count * 3;
    let fields = data
        .get(fields_start..fields_end)?
        .chunks_exact(3)
        .map(|chunk| FieldDefinition {
            field_number: chunk[0],
            size: chunk[1],
            base_type: chunk[2],
        })
        .collect();

    let mut end = fields_end;
    let mut developer_data_size = 0;
    if has_developer_fields {
        let developer_count = *data.get(end)? as usize;
        let developer_end = end + 1 + developer_count * 3;
        developer_data_size = data
            .get(end + 1..developer_end)?
            .chunks_exact(3)
            .map(|chunk| chunk[1] as usize)
            .sum();
        end = developer_end;
    }

    let definition = MessageDefinition {
        local_message_type: header & LOCAL_TYPE_MASK,
        global_message_number,
        endian,
        fields,
        developer_data_size,
    };
    Some((definition, end - offset))
}

fn decode_record(data: &[u8], offset: usize, definition: &MessageDefinition) -> RecordFields {
    let mut fields = RecordFields::default();
    let mut field_offset = offset + 1;
    for field in &definition.fields {
        let size = field.size as usize;
        if let Some(raw) = read_field(data, field_offset, size, field.base_type, definition.endian) {
            fields.apply(field.field_number, raw);
        }
        field_offset += size;
    }
    fields
}

fn next_record(data: &[u8], offset: usize, table: &DefinitionTable) -> RecordStep {
    let header = data[offset];
    if header & COMPRESSED_HEADER_FLAG != 0 {
        return RecordStep::Skip(SkipReason::CompressedTimestamp);
    }

    if header & DEFINITION_FLAG != 0 {
        return match parse_definition(data, offset, header & DEVELOPER_DATA_FLAG != 0) {
            Some((definition, len)) => RecordStep::Definition(definition, len),
            None => RecordStep::Skip(SkipReason::Truncated),
        };
    }

    let Some(definition) = table.get(header & LOCAL_TYPE_MASK) else {
        return RecordStep::Skip(SkipReason::UnknownLocalType);
    };
    let len = 1 + definition.data_size();
    if offset + len > data.len() {
        return RecordStep::Skip(SkipReason::Truncated);
    }
    if definition.global_message_number != RECORD_MESSAGE {
        return RecordStep::OtherMessage(len);
    }
    RecordStep::Record(decode_record(data, offset, definition), len)
}

#[derive(Debug, Clone, Copy)]
pub struct FitDecoder {
    record_limit: usize,
}

impl Default for FitDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FitDecoder {
    pub fn new() -> Self {
        Self {
            record_limit: DEFAULT_RECORD_LIMIT,
        }
    }

    pub fn with_record_limit(record_limit: usize) -> Self {
        Self { record_limit }
    }

    pub fn decode(&self, buf: &[u8]) -> FitDecodeOutcome {
        self.decode_at(buf, Utc::now())
    }

    /// Decodes `buf`, using `now` as the base for synthesized timestamps.
    pub fn decode_at(&self, buf: &[u8], now: DateTime<Utc>) -> FitDecodeOutcome {
        let mut outcome = FitDecodeOutcome::default();
        let Some(header) = FileHeader::parse(buf) else {
            tracing::debug!("Not a FIT file ({} bytes)", buf.len());
            return outcome;
        };

        let data = &buf[..header.data_end(buf.len())];
        let stats = &mut outcome.stats;
        let points = &mut outcome.trackpoints;
        let mut table = DefinitionTable::default();
        let mut offset = header.header_size;

        while offset < data.len() {
            if stats.iterations >= self.record_limit {
                stats.hit_record_limit = true;
                tracing::warn!(
                    "FIT record limit {} reached at byte {} of {}",
                    self.record_limit,
                    offset,
                    data.len()
                );
                break;
            }
            stats.iterations += 1;

            match next_record(data, offset, &table) {
                RecordStep::Definition(definition, len) => {
                    stats.definitions += 1;
                    table.define(definition);
                    offset += len;
                }
                RecordStep::Record(fields, len) => {
                    stats.data_records += 1;
                    match fields.into_trackpoint(points.len()) {
                        Some(point) => points.push(point),
                        None => stats.skip(SkipReason::InvalidPosition),
                    }
                    offset += len;
                }
                RecordStep::OtherMessage(len) => {
                    stats.data_records += 1;
                    stats.skip(SkipReason::NonRecordMessage);
                    offset += len;
                }
                RecordStep::Skip(reason) => {
                    stats.skip(reason);
                    offset += 1;
                }
            }
        }

        backfill_timestamps(points, now);
        stats.trackpoints = points.len();
        tracing::debug!(
            "Decoded FIT: {} points from {} data records ({} definitions, skipped {:?})",
            stats.trackpoints,
            stats.data_records,
            stats.definitions,
            stats.skipped
        );
        outcome
    }
}

/// When the first point has no timestamp, missing timestamps are synthesized
/// as `now + index` seconds.
fn backfill_timestamps(points: &mut [Trackpoint], now: DateTime<Utc>) {
    if points.first().map_or(true, |p| p.timestamp.is_some()) {
        return;
    }
    for (idx, point) in points.iter_mut().enumerate() {
        if point.timestamp.is_none() {
            point.timestamp = Some(now + Duration::seconds(idx as i64));
        }
    }
}

pub fn decode_fit_file(buf: &[u8]) -> Vec<Trackpoint> {
    FitDecoder::new().decode(buf).trackpoints
}

pub struct FitParser {
    pub decoder: FitDecoder,
}

impl Parser for FitParser {
    fn parse(&self, bytes: &[u8]) -> ParsedActivity {
        ParsedActivity {
            trackpoints: self.decoder.decode(bytes).trackpoints,
            file_format: FileFormat::Fit,
        }
    }
}
