//! Trait for converting decoded values to Rust types.

use bytes::Bytes;
use tds_wire::DecodedValue;

use crate::error::TypeError;

/// Short name of a value's kind, used in mismatch errors.
#[must_use]
pub fn kind_name(value: &DecodedValue) -> &'static str {
    match value {
        DecodedValue::Null => "null",
        DecodedValue::Boolean(_) => "bit",
        DecodedValue::Int { width: 1, .. } => "tinyint",
        DecodedValue::Int { width: 2, .. } => "smallint",
        DecodedValue::Int { width: 4, .. } => "int",
        DecodedValue::Int { .. } => "bigint",
        DecodedValue::Float { width: 4, .. } => "real",
        DecodedValue::Float { .. } => "float",
        DecodedValue::Bytes(_) => "binary",
        DecodedValue::Text(_) => "text",
        DecodedValue::Decimal { .. } => "decimal",
        DecodedValue::Guid(_) => "uniqueidentifier",
        DecodedValue::AbsoluteTime(_) => "datetime",
        DecodedValue::RelativeTime(_) => "time",
    }
}

pub(crate) fn mismatch(expected: &'static str, value: &DecodedValue) -> TypeError {
    match value {
        DecodedValue::Null => TypeError::UnexpectedNull,
        other => TypeError::TypeMismatch {
            expected,
            actual: kind_name(other),
        },
    }
}

/// Types that can be built from a [`DecodedValue`].
pub trait FromValue: Sized {
    /// Convert a decoded value to this type.
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError>;

    /// Convert a decoded value, mapping NULL to `None`.
    fn from_value_nullable(value: &DecodedValue) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_value(value).map(Some)
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::Boolean(v) => Ok(*v),
            DecodedValue::Int { value, .. } => Ok(*value != 0),
            other => Err(mismatch("bool", other)),
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {$(
        impl FromValue for $ty {
            fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
                match value {
                    DecodedValue::Int { value, .. } => <$ty>::try_from(*value).map_err(|_| {
                        TypeError::OutOfRange {
                            target_type: stringify!($ty),
                        }
                    }),
                    DecodedValue::Boolean(v) => Ok(<$ty>::from(*v)),
                    other => Err(mismatch(stringify!($ty), other)),
                }
            }
        }
    )*};
}

impl_from_int!(u8, i16, i32, i64);

impl FromValue for f32 {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::Float { width: 4, value } => Ok(*value as f32),
            other => Err(mismatch("f32", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::Float { value, .. } => Ok(*value),
            DecodedValue::Int { value, .. } => Ok(*value as f64),
            other => Err(mismatch("f64", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::Text(v) => Ok(v.clone()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl FromValue for Bytes {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::Bytes(v) => Ok(v.clone()),
            other => Err(mismatch("Bytes", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        Bytes::from_value(value).map(|b| b.to_vec())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        T::from_value_nullable(value)
    }
}

#[cfg(feature = "uuid")]
impl FromValue for uuid::Uuid {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            // First three groups are little-endian on the wire
            DecodedValue::Guid(bytes) => Ok(uuid::Uuid::from_bytes_le(*bytes)),
            DecodedValue::Text(s) => s
                .parse()
                .map_err(|e| TypeError::InvalidEncoding(format!("{e}"))),
            other => Err(mismatch("Uuid", other)),
        }
    }
}

#[cfg(feature = "decimal")]
impl FromValue for rust_decimal::Decimal {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::Decimal {
                magnitude,
                scale,
                negative,
            } => {
                let unscaled = i128::try_from(*magnitude).map_err(|_| TypeError::OutOfRange {
                    target_type: "Decimal",
                })?;
                let unscaled = if *negative { -unscaled } else { unscaled };
                rust_decimal::Decimal::try_from_i128_with_scale(unscaled, u32::from(*scale))
                    .map_err(|e| TypeError::InvalidDecimal(e.to_string()))
            }
            DecodedValue::Int { value, .. } => Ok(rust_decimal::Decimal::from(*value)),
            other => Err(mismatch("Decimal", other)),
        }
    }
}

#[cfg(feature = "json")]
impl FromValue for serde_json::Value {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::Text(s) => {
                serde_json::from_str(s).map_err(|e| TypeError::InvalidEncoding(e.to_string()))
            }
            DecodedValue::Null => Ok(serde_json::Value::Null),
            other => Err(mismatch("JSON", other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_int_widening_and_range() {
        let small = DecodedValue::Int { width: 2, value: 300 };
        assert_eq!(i32::from_value(&small).unwrap(), 300);
        assert_eq!(i64::from_value(&small).unwrap(), 300);
        assert_eq!(
            u8::from_value(&small),
            Err(TypeError::OutOfRange { target_type: "u8" })
        );
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(i32::from_value(&DecodedValue::Null), Err(TypeError::UnexpectedNull));
        assert_eq!(Option::<i32>::from_value(&DecodedValue::Null).unwrap(), None);
        let text = DecodedValue::Text("x".into());
        assert_eq!(Option::<String>::from_value(&text).unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_mismatch_names_kind() {
        let err = String::from_value(&DecodedValue::Boolean(true)).unwrap_err();
        assert_eq!(
            err,
            TypeError::TypeMismatch {
                expected: "String",
                actual: "bit",
            }
        );
    }

    #[cfg(feature = "uuid")]
    #[test]
    fn test_guid_byte_order() {
        let wire = [
            0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        let id = uuid::Uuid::from_value(&DecodedValue::Guid(wire)).unwrap();
        assert_eq!(id.to_string(), "00112233-4455-6677-8899-aabbccddeeff");
    }

    #[cfg(feature = "decimal")]
    #[test]
    fn test_decimal_scale_and_sign() {
        let value = DecodedValue::Decimal {
            magnitude: 12345,
            scale: 2,
            negative: true,
        };
        let d = rust_decimal::Decimal::from_value(&value).unwrap();
        assert_eq!(d.to_string(), "-123.45");
    }
}
