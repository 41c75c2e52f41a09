//! # tds-testing
//!
//! Byte-level fixtures for testing the TDS dissector crates.
//!
//! Nothing here depends on the decoder: the builders write wire bytes by
//! hand so tests check the decoder against an independent encoding.
//!
//! ## Example
//!
//! ```rust
//! use tds_testing::frames::{FrameBuilder, TABULAR_RESULT};
//! use tds_testing::tokens::TokenBuilder;
//!
//! let payload = TokenBuilder::new().done(0x0000, 0, 5).build();
//! let frame = FrameBuilder::new(TABULAR_RESULT).build(&payload);
//! assert_eq!(&frame[..4], &[0x04, 0x01, 0x00, 0x11]);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod frames;
pub mod tokens;

pub use frames::{FrameBuilder, split_pdu, tls_record};
pub use tokens::{Column, TokenBuilder};

/// Encode `s` as UTF-16LE.
#[must_use]
pub fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}
