//! Detection of TLS records inside or in place of TDS frames.
//!
//! Encryption is negotiated in pre-login and the handshake then travels in
//! the payload of pre-login frames. Only the record layer is inspected.

/// Size of a TLS record header.
pub const TLS_RECORD_HEADER_SIZE: usize = 5;

/// First record content type (change cipher spec).
const CONTENT_TYPE_MIN: u8 = 0x14;
/// Last record content type (application data).
const CONTENT_TYPE_MAX: u8 = 0x17;
/// Record-layer major version for SSL 3.0 through TLS 1.3.
const VERSION_MAJOR: u8 = 0x03;
/// Highest record-layer minor version seen in practice.
const VERSION_MINOR_MAX: u8 = 0x04;

/// Whether `data` starts with a plausible TLS record.
///
/// The content type and version must be in range and the declared record
/// length must fit in `data`.
#[must_use]
pub fn is_tls_record(data: &[u8]) -> bool {
    let [content_type, major, minor, len_hi, len_lo, ..] = *data else {
        return false;
    };
    let length = usize::from(u16::from_be_bytes([len_hi, len_lo]));
    (CONTENT_TYPE_MIN..=CONTENT_TYPE_MAX).contains(&content_type)
        && major == VERSION_MAJOR
        && minor <= VERSION_MINOR_MAX
        && length + TLS_RECORD_HEADER_SIZE <= data.len()
}
