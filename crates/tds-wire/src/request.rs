//! Client request PDUs.
//!
//! SQL batches carry an optional `ALL_HEADERS` block then the statement text,
//! UTF-16LE on 7.x and single-byte on legacy conversations. RPC and
//! transaction-manager requests share the header block; their bodies are kept
//! opaque.

use bytes::Bytes;

use crate::collation::{CODE_PAGE_DEFAULT, decode_code_page};
use crate::diagnostic::Diagnostic;
use crate::error::ProtocolError;
use crate::headers::AllHeaders;
use crate::reader::{Reader, decode_utf16le};
use crate::version::TdsVersion;

/// Decoded SQL batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlBatch {
    /// Header block, absent on pre-7.2 clients.
    pub headers: Option<AllHeaders>,
    /// Statement text.
    pub sql: String,
}

impl SqlBatch {
    /// Decode a SQL batch payload.
    pub fn decode(
        payload: &[u8],
        version: TdsVersion,
    ) -> Result<(Self, Vec<Diagnostic>), ProtocolError> {
        let (headers, diagnostics, rest) = split_headers(payload);
        let sql = if version.is_legacy() {
            decode_code_page(CODE_PAGE_DEFAULT, rest)
        } else {
            decode_utf16le(rest)?
        };
        Ok((Self { headers, sql }, diagnostics))
    }
}

/// A request whose body is not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpaqueRequest {
    /// Header block, absent on pre-7.2 clients.
    pub headers: Option<AllHeaders>,
    /// Remaining payload.
    pub body: Bytes,
}

impl OpaqueRequest {
    /// Decode the header block of an RPC or transaction-manager payload.
    #[must_use]
    pub fn decode(payload: &[u8]) -> (Self, Vec<Diagnostic>) {
        let (headers, diagnostics, rest) = split_headers(payload);
        (
            Self {
                headers,
                body: Bytes::copy_from_slice(rest),
            },
            diagnostics,
        )
    }
}

fn split_headers(payload: &[u8]) -> (Option<AllHeaders>, Vec<Diagnostic>, &[u8]) {
    if !AllHeaders::is_present(payload) {
        return (None, Vec::new(), payload);
    }
    let mut src = Reader::new(payload);
    let (headers, diagnostics) = AllHeaders::decode(&mut src);
    (Some(headers), diagnostics, src.rest())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_batch_with_headers() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&22u32.to_le_bytes());
        payload.extend_from_slice(&18u32.to_le_bytes());
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&0u64.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&utf16("SELECT 1"));

        let (batch, diagnostics) = SqlBatch::decode(&payload, TdsVersion::V7_4).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(batch.sql, "SELECT 1");
        assert_eq!(batch.headers.unwrap().transaction_descriptor(), Some(0));
    }

    #[test]
    fn test_batch_without_headers() {
        let (batch, _) = SqlBatch::decode(&utf16("SELECT @@VERSION"), TdsVersion::V7_1).unwrap();
        assert!(batch.headers.is_none());
        assert_eq!(batch.sql, "SELECT @@VERSION");
    }

    #[test]
    fn test_legacy_batch_is_narrow() {
        let (batch, _) = SqlBatch::decode(b"select 1", TdsVersion::V5_0).unwrap();
        assert_eq!(batch.sql, "select 1");
    }

    #[test]
    fn test_opaque_request_keeps_body() {
        let (request, _) = OpaqueRequest::decode(&[0x0A, 0x00, 0x01]);
        assert!(request.headers.is_none());
        assert_eq!(&request.body[..], &[0x0A, 0x00, 0x01]);
    }
}
