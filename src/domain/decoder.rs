//! Measurement Record Decoder
//!
//! Stateless, table-driven decoding of measurement payloads.
//!
//! # Payload Structure
//!
//! ```text
//! [0]     : Flags byte (absent for flag-less layouts such as battery level)
//! [1..]   : Fields in the layout's fixed order. A field gated by a flag bit
//!           occupies the next unconsumed bytes only when its bit is set;
//!           absent fields take no space.
//! ```
//!
//! Boolean statuses (e.g. walking/running) live in the flags byte itself and
//! consume no payload bytes. The flags byte is authoritative for the current
//! payload: fields the peripheral did not advertise in its feature
//! characteristic are still decoded, and listed in
//! [`MeasurementRecord::unadvertised`].

use crate::domain::capability::{Capability, CapabilitySet};
use crate::domain::error::DecodeError;
use crate::domain::record::{FieldValue, MeasurementField, MeasurementRecord, Quantity, Unit};
use chrono::NaiveDate;

/// Whether a field appears in a given payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Always,
    /// Present when any bit of the mask is set in the flags byte
    Flag(u8),
}

/// Wire encoding of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    U8,
    U16,
    U32,
    /// u16 when the `wide` flag bit is set, u8 otherwise
    U8OrU16 { wide: u8 },
    /// Consecutive u16 values filling the rest of the payload
    RepeatedU16,
    /// IEEE-11073 32-bit FLOAT
    Float,
    /// 7-byte date time: year u16, month, day, hours, minutes, seconds
    DateTime,
    /// Enumeration byte passed through as [`FieldValue::Code`]
    Code,
}

impl Encoding {
    /// Bytes required by the encoding, or the minimum for repeated encodings
    fn width(&self, flags: u8) -> usize {
        match self {
            Self::U8 | Self::Code => 1,
            Self::U16 | Self::RepeatedU16 => 2,
            Self::U32 | Self::Float => 4,
            Self::U8OrU16 { wide } if flags & wide != 0 => 2,
            Self::U8OrU16 { .. } => 1,
            Self::DateTime => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub field: MeasurementField,
    pub presence: Presence,
    pub encoding: Encoding,
    /// Multiplier applied to the raw integer value
    pub scale: f64,
    /// Unit of numeric encodings; `None` for codes and timestamps
    pub unit: Option<Unit>,
    /// Alternative unit selected by a flag bit
    pub unit_flag: Option<(u8, Unit)>,
    /// Capability that announces this field in the feature characteristic
    pub capability: Option<Capability>,
}

impl FieldSpec {
    pub const fn always(field: MeasurementField, encoding: Encoding, unit: Unit) -> Self {
        Self {
            field,
            presence: Presence::Always,
            encoding,
            scale: 1.0,
            unit: Some(unit),
            unit_flag: None,
            capability: None,
        }
    }

    pub const fn flagged(
        field: MeasurementField,
        mask: u8,
        encoding: Encoding,
        unit: Unit,
    ) -> Self {
        Self {
            presence: Presence::Flag(mask),
            ..Self::always(field, encoding, unit)
        }
    }

    /// Flag-gated field without a unit: [`Encoding::Code`] or [`Encoding::DateTime`]
    pub const fn flagged_raw(field: MeasurementField, mask: u8, encoding: Encoding) -> Self {
        Self {
            field,
            presence: Presence::Flag(mask),
            encoding,
            scale: 1.0,
            unit: None,
            unit_flag: None,
            capability: None,
        }
    }

    pub const fn scaled(self, scale: f64) -> Self {
        Self { scale, ..self }
    }

    pub const fn unit_when(self, mask: u8, unit: Unit) -> Self {
        Self {
            unit_flag: Some((mask, unit)),
            ..self
        }
    }

    pub const fn advertised_by(self, capability: Capability) -> Self {
        Self {
            capability: Some(capability),
            ..self
        }
    }

    fn is_present(&self, flags: u8) -> bool {
        match self.presence {
            Presence::Always => true,
            Presence::Flag(mask) => flags & mask != 0,
        }
    }

    fn unit(&self, flags: u8) -> Result<Unit, DecodeError> {
        match self.unit_flag {
            Some((mask, unit)) if flags & mask != 0 => Ok(unit),
            _ => self.unit.ok_or(DecodeError::Malformed {
                field: self.field,
                reason: "numeric field has no unit",
            }),
        }
    }
}

/// Boolean field read directly from the flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBit {
    pub field: MeasurementField,
    pub mask: u8,
}

impl StatusBit {
    pub const fn new(field: MeasurementField, mask: u8) -> Self {
        Self { field, mask }
    }
}

/// Fixed field order of one measurement characteristic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordLayout {
    /// Whether byte 0 is a flags byte
    pub has_flags: bool,
    pub fields: &'static [FieldSpec],
    pub statuses: &'static [StatusBit],
}

/// Decode one measurement payload.
///
/// Pure: identical inputs always give identical output.
pub fn decode(
    layout: &RecordLayout,
    payload: &[u8],
    capabilities: &CapabilitySet,
) -> Result<MeasurementRecord, DecodeError> {
    let mut reader = PayloadReader::new(payload);
    let flags = if layout.has_flags {
        reader.flags()?
    } else {
        0
    };

    let mut record = MeasurementRecord::default();
    for spec in layout.fields.iter().filter(|spec| spec.is_present(flags)) {
        let value = read_field(&mut reader, spec, flags)?;
        if let Some(capability) = spec.capability {
            if !capabilities.expects(capability) {
                record.unadvertised.push(spec.field);
            }
        }
        record.fields.push((spec.field, value));
    }

    for status in layout.statuses {
        record
            .fields
            .push((status.field, FieldValue::Status(flags & status.mask != 0)));
    }

    Ok(record)
}

fn read_field(
    reader: &mut PayloadReader<'_>,
    spec: &FieldSpec,
    flags: u8,
) -> Result<FieldValue, DecodeError> {
    let value = match spec.encoding {
        Encoding::U8 | Encoding::U16 | Encoding::U32 | Encoding::U8OrU16 { .. } => {
            let unit = spec.unit(flags)?;
            let bytes = reader.take(spec.field, spec.encoding.width(flags))?;
            FieldValue::Quantity(Quantity::new(f64::from(le_uint(bytes)) * spec.scale, unit))
        }
        Encoding::Code => FieldValue::Code(reader.take(spec.field, 1)?[0]),
        Encoding::Float => {
            let unit = spec.unit(flags)?;
            let bytes = reader.take(spec.field, 4)?;
            let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            FieldValue::Quantity(Quantity::new(ieee11073_float(raw) * spec.scale, unit))
        }
        Encoding::DateTime => {
            let bytes = reader.take(spec.field, 7)?;
            FieldValue::Timestamp(date_time(spec.field, bytes)?)
        }
        Encoding::RepeatedU16 => {
            let unit = spec.unit(flags)?;
            if reader.remaining() < 2 {
                return Err(reader.truncated(spec.field, 2));
            }
            let bytes = reader.rest();
            if bytes.len() % 2 != 0 {
                return Err(DecodeError::Malformed {
                    field: spec.field,
                    reason: "odd number of bytes in a list of 16-bit values",
                });
            }
            let values = bytes
                .chunks_exact(2)
                .map(|pair| {
                    let raw = u16::from_le_bytes([pair[0], pair[1]]);
                    Quantity::new(f64::from(raw) * spec.scale, unit)
                })
                .collect();
            FieldValue::Intervals(values)
        }
    };

    Ok(value)
}

/// Little-endian unsigned integer of up to four bytes
fn le_uint(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .rev()
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte))
}

/// IEEE-11073 32-bit FLOAT: 24-bit signed mantissa, 8-bit signed exponent
fn ieee11073_float(raw: u32) -> f64 {
    const NAN: i32 = 0x007F_FFFF;
    const NRES: i32 = -0x0080_0000;
    const POSITIVE_INFINITY: i32 = 0x007F_FFFE;
    const NEGATIVE_INFINITY: i32 = -0x007F_FFFE;
    const RESERVED: i32 = -0x007F_FFFF;

    let exponent = (raw >> 24) as u8 as i8;
    // Shift the 24-bit mantissa to the top of an i32 to sign-extend it
    let mantissa = ((raw << 8) as i32) >> 8;

    match mantissa {
        NAN | NRES | RESERVED => f64::NAN,
        POSITIVE_INFINITY => f64::INFINITY,
        NEGATIVE_INFINITY => f64::NEG_INFINITY,
        _ => f64::from(mantissa) * 10f64.powi(i32::from(exponent)),
    }
}

/// GATT date time. Year, month or day 0 means "not known".
fn date_time(
    field: MeasurementField,
    bytes: &[u8],
) -> Result<Option<chrono::NaiveDateTime>, DecodeError> {
    let year = u16::from_le_bytes([bytes[0], bytes[1]]);
    let (month, day) = (bytes[2], bytes[3]);
    if year == 0 || month == 0 || day == 0 {
        return Ok(None);
    }

    let (hour, minute, second) = (bytes[4], bytes[5], bytes[6]);
    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|date| date.and_hms_opt(hour.into(), minute.into(), second.into()))
        .map(Some)
        .ok_or(DecodeError::Malformed {
            field,
            reason: "invalid calendar date",
        })
}

/// Forward-only cursor over a payload
struct PayloadReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn flags(&mut self) -> Result<u8, DecodeError> {
        let flags = *self.bytes.first().ok_or(DecodeError::Empty)?;
        self.offset = 1;
        Ok(flags)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn truncated(&self, field: MeasurementField, needed: usize) -> DecodeError {
        DecodeError::Truncated {
            field,
            needed,
            remaining: self.remaining(),
        }
    }

    fn take(&mut self, field: MeasurementField, count: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < count {
            return Err(self.truncated(field, count));
        }
        let slice = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.offset..];
        self.offset = self.bytes.len();
        slice
    }
}
