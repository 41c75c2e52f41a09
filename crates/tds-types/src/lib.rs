//! # tds-types
//!
//! Conversions from [`tds_wire::DecodedValue`] to Rust types.
//!
//! The decoder keeps values close to their wire form; this crate turns them
//! into the types applications work with.
//!
//! ## Features
//!
//! - `chrono` (default): date/time types via chrono
//! - `uuid` (default): `UNIQUEIDENTIFIER` as `uuid::Uuid`
//! - `decimal` (default): `DECIMAL`/`NUMERIC`/`MONEY` as `rust_decimal::Decimal`
//! - `json`: text columns parsed as `serde_json::Value`
//!
//! ## Type Mappings
//!
//! | Decoded value | Rust Type |
//! |---------------|-----------|
//! | `Boolean` | `bool` |
//! | `Int` | `u8`, `i16`, `i32`, `i64` (range-checked) |
//! | `Float` | `f32` (4-byte only), `f64` |
//! | `Text` | `String` |
//! | `Bytes` | `Vec<u8>`, `bytes::Bytes` |
//! | `Decimal` | `rust_decimal::Decimal` |
//! | `Guid` | `uuid::Uuid` |
//! | `AbsoluteTime` | `chrono::NaiveDate`, `NaiveDateTime`, `DateTime<FixedOffset>`, `DateTime<Utc>` |
//! | `RelativeTime` | `chrono::NaiveTime` |
//!
//! ```rust
//! use tds_types::FromValue;
//! use tds_wire::DecodedValue;
//!
//! let value = DecodedValue::Int { width: 4, value: 42 };
//! assert_eq!(i64::from_value(&value).unwrap(), 42);
//! assert_eq!(Option::<i32>::from_value(&DecodedValue::Null).unwrap(), None);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod from_value;
#[cfg(feature = "chrono")]
pub mod time;

pub use error::TypeError;
pub use from_value::{FromValue, kind_name};
