//! Fixed-width value reads from a FIT record buffer.

/// Low five bits of a FIT base type byte identify the type; bit 7 only marks
/// endian-sensitive types.
const BASE_TYPE_NUMBER_MASK: u8 = 0x1F;

pub const ENUM: u8 = 0x00;
pub const SINT8: u8 = 0x01;
pub const UINT8: u8 = 0x02;
pub const SINT16: u8 = 0x83;
pub const UINT16: u8 = 0x84;
pub const SINT32: u8 = 0x85;
pub const UINT32: u8 = 0x86;
pub const FLOAT32: u8 = 0x88;
pub const FLOAT64: u8 = 0x89;
pub const UINT8Z: u8 = 0x0A;
pub const UINT16Z: u8 = 0x8B;
pub const UINT32Z: u8 = 0x8C;
pub const BYTE: u8 = 0x0D;
pub const SINT64: u8 = 0x8E;
pub const UINT64: u8 = 0x8F;
pub const UINT64Z: u8 = 0x90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Architecture byte of a definition record: 1 is big endian, anything else little.
    pub fn from_architecture(byte: u8) -> Self {
        if byte == 1 {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl RawValue {
    pub fn as_f64(self) -> f64 {
        match self {
            RawValue::Signed(v) => v as f64,
            RawValue::Unsigned(v) => v as f64,
            RawValue::Float(v) => v,
        }
    }

    /// Whether this value is the "missing" marker for its field.
    pub fn is_sentinel(self, sentinel: u64) -> bool {
        match self {
            RawValue::Signed(v) => v == sentinel as i64,
            RawValue::Unsigned(v) => v == sentinel,
            RawValue::Float(v) => !v.is_finite(),
        }
    }
}

/// Reads one value of `size` bytes at `offset`.
///
/// Returns `None` when the read would leave the buffer or when `size` does not
/// match the width of `base_type` (arrays and strings are not decoded).
pub fn read_field(
    buf: &[u8],
    offset: usize,
    size: usize,
    base_type: u8,
    endian: Endian,
) -> Option<RawValue> {
    let end = offset.checked_add(size)?;
    let bytes = buf.get(offset..end)?;

    let value = match (base_type & BASE_TYPE_NUMBER_MASK, size) {
        (0x00 | 0x02 | 0x0A | 0x0D, 1) => RawValue::Unsigned(bytes[0] as u64),
        (0x01, 1) => RawValue::Signed(bytes[0] as i8 as i64),
        (0x03, 2) => RawValue::Signed(i16::from_le_bytes(ordered(bytes, endian)) as i64),
        (0x04 | 0x0B, 2) => RawValue::Unsigned(u16::from_le_bytes(ordered(bytes, endian)) as u64),
        (0x05, 4) => RawValue::Signed(i32::from_le_bytes(ordered(bytes, endian)) as i64),
        (0x06 | 0x0C, 4) => RawValue::Unsigned(u32::from_le_bytes(ordered(bytes, endian)) as u64),
        (0x08, 4) => RawValue::Float(f32::from_le_bytes(ordered(bytes, endian)) as f64),
        (0x09, 8) => RawValue::Float(f64::from_le_bytes(ordered(bytes, endian))),
        (0x0E, 8) => RawValue::Signed(i64::from_le_bytes(ordered(bytes, endian))),
        (0x0F | 0x10, 8) => RawValue::Unsigned(u64::from_le_bytes(ordered(bytes, endian))),
        _ => return None,
    };

    Some(value)
}

/// Copies `bytes` into little-endian order. Callers guarantee `bytes.len() == N`.
fn ordered<const N: usize>(bytes: &[u8], endian: Endian) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    if endian == Endian::Big {
        out.reverse();
    }
    out
}
