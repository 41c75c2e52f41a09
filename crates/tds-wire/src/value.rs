//! Column value decoding.
//!
//! [`decode_value`] reads one value described by a [`TypeInfo`]. The length
//! prefix and its NULL sentinel are selected by the type's
//! [`TypeCategory`]; the bytes that follow are interpreted by base type.

use bytes::Bytes;

use crate::collation::{Collation, decode_code_page, CODE_PAGE_DEFAULT};
use crate::error::ProtocolError;
use crate::layout::{BYTELEN_NULL, LONGLEN_NULL, PLP_NULL, PLP_TERMINATOR, PLP_UNKNOWN_LEN, USHORTLEN_NULL};
use crate::reader::{ByteOrder, Reader, decode_utf16le};
use crate::type_info::{MAX_TIME_SCALE, TypeInfo};
use crate::types::{TypeCategory, TypeId};
use crate::version::TdsVersion;

/// Default bound on an accumulated PLP value.
pub const DEFAULT_MAX_PLP_SIZE: usize = 64 * 1024 * 1024;

/// Settings the token and value decoders read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeOptions {
    /// Upper bound on one PLP value's accumulated size.
    pub max_plp_size: usize,
    /// Byte order for legacy (pre-7.0) token streams.
    pub byte_order: ByteOrder,
    /// Version assumed before a login acknowledgement is seen.
    pub version_hint: Option<TdsVersion>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_plp_size: DEFAULT_MAX_PLP_SIZE,
            byte_order: ByteOrder::LittleEndian,
            version_hint: None,
        }
    }
}

/// Reference date for an [`AbsoluteTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Epoch {
    /// 1900-01-01, used by `DATETIME` and `SMALLDATETIME`.
    Y1900,
    /// 0001-01-01, used by `DATE`, `DATETIME2` and `DATETIMEOFFSET`.
    Y0001,
}

/// A point in time as days from an epoch plus time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbsoluteTime {
    /// Reference date.
    pub epoch: Epoch,
    /// Days since the epoch (negative before 1900 for `DATETIME`).
    pub days: i32,
    /// Nanoseconds since midnight.
    pub nanos: u64,
    /// Offset from UTC in minutes, for `DATETIMEOFFSET`.
    pub offset_minutes: Option<i16>,
}

/// A time of day with no date (`TIME`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelativeTime {
    /// Nanoseconds since midnight.
    pub nanos: u64,
    /// Fractional-second digits declared by the column.
    pub scale: u8,
}

/// A decoded column or parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// SQL NULL.
    Null,
    /// `BIT`.
    Boolean(bool),
    /// Integer of the given byte width. `TINYINT` is unsigned.
    Int {
        /// Byte width on the wire.
        width: u8,
        /// Value.
        value: i64,
    },
    /// Floating point of the given byte width.
    Float {
        /// Byte width on the wire.
        width: u8,
        /// Value.
        value: f64,
    },
    /// Binary data, including opaque `XML` and `UDT` payloads.
    Bytes(Bytes),
    /// Character data.
    Text(String),
    /// Exact numeric: `(negative ? -1 : 1) * magnitude * 10^-scale`.
    Decimal {
        /// Unsigned magnitude.
        magnitude: u128,
        /// Digits after the decimal point.
        scale: u8,
        /// Sign.
        negative: bool,
    },
    /// `UNIQUEIDENTIFIER` in wire byte order.
    Guid([u8; 16]),
    /// Date, date-time or date-time with offset.
    AbsoluteTime(AbsoluteTime),
    /// Time of day.
    RelativeTime(RelativeTime),
}

impl DecodedValue {
    /// Check if this value is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

fn invalid(offset: usize, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidValue {
        offset,
        reason: reason.into(),
    }
}

/// Decode one value described by `info`.
///
/// On error the reader may be left part-way through the value.
pub fn decode_value(
    src: &mut Reader<'_>,
    info: &TypeInfo,
    options: &DecodeOptions,
) -> Result<DecodedValue, ProtocolError> {
    match info.category {
        TypeCategory::FixedLen(width) => {
            let start = src.offset();
            let data = src.read_bytes(width)?;
            interpret(data, start, info, src.byte_order())
        }
        TypeCategory::ByteLen => {
            let start = src.offset();
            let len = src.read_u8()?;
            if len == BYTELEN_NULL {
                return Ok(DecodedValue::Null);
            }
            let data = src.read_bytes(usize::from(len))?;
            interpret(data, start, info, src.byte_order())
        }
        TypeCategory::UShortLen => {
            let start = src.offset();
            let len = src.read_u16()?;
            if len == USHORTLEN_NULL {
                return Ok(DecodedValue::Null);
            }
            let data = src.read_bytes(len as usize)?;
            interpret(data, start, info, src.byte_order())
        }
        TypeCategory::LongLen if info.type_id.is_text_pointer() => decode_text_pointer(src, info),
        TypeCategory::LongLen => {
            let start = src.offset();
            let len = src.read_u32()?;
            if len == LONGLEN_NULL {
                return Ok(DecodedValue::Null);
            }
            let len = usize::try_from(len).map_err(|_| ProtocolError::LengthOverflow {
                offset: start,
                declared: u64::from(len),
            })?;
            if info.type_id == TypeId::Variant {
                if len == 0 {
                    return Ok(DecodedValue::Null);
                }
                let mut inner = src.sub_reader(len)?;
                return decode_variant(&mut inner);
            }
            let data = src.read_bytes(len)?;
            interpret(data, start, info, src.byte_order())
        }
        TypeCategory::StreamingPlp => {
            let start = src.offset();
            match read_plp(src, options.max_plp_size)? {
                None => Ok(DecodedValue::Null),
                Some(data) => interpret(&data, start, info, src.byte_order()),
            }
        }
    }
}

/// Read a PLP value, returning `None` for the NULL sentinel.
///
/// Chunks are concatenated until a zero-length chunk. Accumulation stops
/// with [`ProtocolError::ValueTooLarge`] once `limit` would be exceeded.
pub fn read_plp(src: &mut Reader<'_>, limit: usize) -> Result<Option<Vec<u8>>, ProtocolError> {
    let total = src.read_u64()?;
    if total == PLP_NULL {
        return Ok(None);
    }

    let hint = if total == PLP_UNKNOWN_LEN {
        0
    } else {
        usize::try_from(total).unwrap_or(usize::MAX)
    };
    let mut buf = Vec::with_capacity(hint.min(limit).min(src.remaining()));

    loop {
        let offset = src.offset();
        let chunk_len = src.read_u32()?;
        if chunk_len == PLP_TERMINATOR {
            break;
        }
        let chunk_len = usize::try_from(chunk_len).map_err(|_| ProtocolError::LengthOverflow {
            offset,
            declared: u64::from(chunk_len),
        })?;
        let observed = buf.len().saturating_add(chunk_len);
        if observed > limit {
            return Err(ProtocolError::ValueTooLarge { limit, observed });
        }
        buf.extend_from_slice(src.read_bytes(chunk_len)?);
    }

    Ok(Some(buf))
}

fn decode_text_pointer(
    src: &mut Reader<'_>,
    info: &TypeInfo,
) -> Result<DecodedValue, ProtocolError> {
    let ptr_len = src.read_u8()? as usize;
    if ptr_len == 0 {
        return Ok(DecodedValue::Null);
    }
    src.skip(ptr_len)?;
    // timestamp
    src.skip(8)?;
    let start = src.offset();
    let len = src.read_u32()?;
    let len = usize::try_from(len).map_err(|_| ProtocolError::LengthOverflow {
        offset: start,
        declared: u64::from(len),
    })?;
    let data = src.read_bytes(len)?;
    interpret(data, start, info, src.byte_order())
}

fn decode_variant(src: &mut Reader<'_>) -> Result<DecodedValue, ProtocolError> {
    let offset = src.offset();
    let tag = src.read_u8()?;
    let type_id = TypeId::from_u8(tag).ok_or(ProtocolError::UnknownType { tag, offset })?;
    let prop_len = src.read_u8()? as usize;
    let mut props = src.sub_reader(prop_len)?;

    let mut info = TypeInfo::new(type_id);
    match type_id {
        TypeId::DecimalN | TypeId::NumericN | TypeId::Decimal | TypeId::Numeric => {
            info.precision = props.read_u8()?;
            info.scale = props.read_u8()?;
        }
        TypeId::Time | TypeId::DateTime2 | TypeId::DateTimeOffset => {
            info.scale = props.read_u8()?;
            if info.scale > MAX_TIME_SCALE {
                return Err(invalid(offset, "variant time scale out of range"));
            }
        }
        TypeId::BigVarChar | TypeId::BigChar | TypeId::NVarChar | TypeId::NChar => {
            info.collation = Some(Collation::decode(&mut props)?);
            info.max_length = u32::from(props.read_u16()?);
        }
        TypeId::BigVarBinary | TypeId::BigBinary => {
            info.max_length = u32::from(props.read_u16()?);
        }
        TypeId::Variant
        | TypeId::Text
        | TypeId::NText
        | TypeId::Image
        | TypeId::Xml
        | TypeId::Udt
        | TypeId::Null => {
            return Err(invalid(
                offset,
                format!("type {} cannot be stored in sql_variant", type_id.name()),
            ));
        }
        _ => {}
    }

    let start = src.offset();
    let data = src.rest();
    if let TypeCategory::FixedLen(width) = type_id.category() {
        if data.len() != width {
            return Err(invalid(
                start,
                format!("variant {} has {} bytes, expected {width}", type_id.name(), data.len()),
            ));
        }
    }
    interpret(data, start, &info, src.byte_order())
}

/// Interpret the data bytes of a non-NULL value.
fn interpret(
    data: &[u8],
    offset: usize,
    info: &TypeInfo,
    order: ByteOrder,
) -> Result<DecodedValue, ProtocolError> {
    let mut r = Reader::new(data).with_byte_order(order);
    let bad_len = || {
        invalid(
            offset,
            format!("{} value has invalid length {}", info.type_id.name(), data.len()),
        )
    };

    let value = match info.type_id {
        TypeId::Null => DecodedValue::Null,

        TypeId::Bit | TypeId::BitN => match data {
            [b] => DecodedValue::Boolean(*b != 0),
            _ => return Err(bad_len()),
        },

        TypeId::Int1 | TypeId::Int2 | TypeId::Int4 | TypeId::Int8 | TypeId::IntN => {
            let value = match data.len() {
                1 => i64::from(r.read_u8()?),
                2 => i64::from(r.read_i16()?),
                4 => i64::from(r.read_i32()?),
                8 => r.read_i64()?,
                _ => return Err(bad_len()),
            };
            DecodedValue::Int {
                width: data.len() as u8,
                value,
            }
        }

        TypeId::Float4 | TypeId::Float8 | TypeId::FloatN => {
            let value = match data.len() {
                4 => f64::from(r.read_f32()?),
                8 => r.read_f64()?,
                _ => return Err(bad_len()),
            };
            DecodedValue::Float {
                width: data.len() as u8,
                value,
            }
        }

        TypeId::Money | TypeId::Money4 | TypeId::MoneyN => {
            let cents = match data.len() {
                4 => i64::from(r.read_i32()?),
                8 => {
                    let high = r.read_i32()?;
                    let low = r.read_u32()?;
                    (i64::from(high) << 32) | i64::from(low)
                }
                _ => return Err(bad_len()),
            };
            DecodedValue::Decimal {
                magnitude: u128::from(cents.unsigned_abs()),
                scale: 4,
                negative: cents < 0,
            }
        }

        TypeId::Decimal | TypeId::Numeric | TypeId::DecimalN | TypeId::NumericN => {
            if !matches!(data.len(), 5 | 9 | 13 | 17) {
                return Err(bad_len());
            }
            let sign = r.read_u8()?;
            let magnitude = r
                .rest()
                .iter()
                .rev()
                .fold(0u128, |acc, &b| (acc << 8) | u128::from(b));
            DecodedValue::Decimal {
                magnitude,
                scale: info.scale,
                negative: sign == 0,
            }
        }

        TypeId::Guid => {
            let bytes: [u8; 16] = data.try_into().map_err(|_| bad_len())?;
            DecodedValue::Guid(bytes)
        }

        TypeId::DateTime | TypeId::DateTime4 | TypeId::DateTimeN => match data.len() {
            8 => {
                let days = r.read_i32()?;
                let ticks = r.read_u32()?;
                DecodedValue::AbsoluteTime(AbsoluteTime {
                    epoch: Epoch::Y1900,
                    days,
                    // 1/300 second ticks
                    nanos: u64::from(ticks) * 10_000_000 / 3,
                    offset_minutes: None,
                })
            }
            4 => {
                let days = r.read_u16()?;
                let minutes = r.read_u16()?;
                DecodedValue::AbsoluteTime(AbsoluteTime {
                    epoch: Epoch::Y1900,
                    days: i32::from(days),
                    nanos: u64::from(minutes) * 60 * 1_000_000_000,
                    offset_minutes: None,
                })
            }
            _ => return Err(bad_len()),
        },

        TypeId::Date => {
            if data.len() != 3 {
                return Err(bad_len());
            }
            DecodedValue::AbsoluteTime(AbsoluteTime {
                epoch: Epoch::Y0001,
                days: r.read_uint_le(3)? as i32,
                nanos: 0,
                offset_minutes: None,
            })
        }

        TypeId::Time => {
            if data.len() != time_width(info.scale) {
                return Err(bad_len());
            }
            DecodedValue::RelativeTime(RelativeTime {
                nanos: read_time(&mut r, info.scale)?,
                scale: info.scale,
            })
        }

        TypeId::DateTime2 | TypeId::DateTimeOffset => {
            let extra = if info.type_id == TypeId::DateTimeOffset { 2 } else { 0 };
            if data.len() != time_width(info.scale) + 3 + extra {
                return Err(bad_len());
            }
            let nanos = read_time(&mut r, info.scale)?;
            let days = r.read_uint_le(3)? as i32;
            let offset_minutes = if extra > 0 {
                Some(r.read_i16_le()?)
            } else {
                None
            };
            DecodedValue::AbsoluteTime(AbsoluteTime {
                epoch: Epoch::Y0001,
                days,
                nanos,
                offset_minutes,
            })
        }

        TypeId::Char | TypeId::VarChar | TypeId::BigChar | TypeId::BigVarChar | TypeId::Text => {
            let text = match info.collation {
                Some(collation) => collation.decode_text(data),
                None => decode_code_page(CODE_PAGE_DEFAULT, data),
            };
            DecodedValue::Text(text)
        }

        TypeId::NChar | TypeId::NVarChar | TypeId::NText => {
            DecodedValue::Text(decode_utf16le(data).map_err(|e| match e {
                ProtocolError::StringEncoding(reason) => invalid(offset, reason),
                other => other,
            })?)
        }

        TypeId::Binary
        | TypeId::VarBinary
        | TypeId::BigBinary
        | TypeId::BigVarBinary
        | TypeId::Image
        | TypeId::Xml
        | TypeId::Udt => DecodedValue::Bytes(Bytes::copy_from_slice(data)),

        TypeId::Variant => {
            return Err(invalid(offset, "nested sql_variant"));
        }
    };

    Ok(value)
}

/// Byte width of a scaled time value.
#[must_use]
pub const fn time_width(scale: u8) -> usize {
    match scale {
        0..=2 => 3,
        3..=4 => 4,
        _ => 5,
    }
}

fn read_time(r: &mut Reader<'_>, scale: u8) -> Result<u64, ProtocolError> {
    let units = r.read_uint_le(time_width(scale))?;
    Ok(units * 10u64.pow(9 - u32::from(scale.min(MAX_TIME_SCALE))))
}
