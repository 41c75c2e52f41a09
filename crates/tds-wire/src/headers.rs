//! `ALL_HEADERS` block at the start of request PDUs.
//!
//! The block is a 4-byte total length followed by sub-headers, each a 4-byte
//! length (covering itself), a 2-byte type and a type-specific body. All
//! fields are little-endian.

use bytes::Bytes;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::reader::Reader;

/// Sub-header type for query notifications.
pub const HEADER_QUERY_NOTIFICATIONS: u16 = 0x0001;
/// Sub-header type for the transaction descriptor.
pub const HEADER_TRANSACTION_DESCRIPTOR: u16 = 0x0002;
/// Sub-header type for trace activity.
pub const HEADER_TRACE_ACTIVITY: u16 = 0x0003;

const SUB_HEADER_PREFIX: usize = 6;
const TRANSACTION_DESCRIPTOR_SIZE: usize = 12;
const TRACE_ACTIVITY_SIZE: usize = 20;

/// One sub-header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// Query notification subscription.
    QueryNotifications {
        /// Notification ID.
        notify_id: String,
        /// Service Broker deployment.
        ssb_deployment: String,
        /// Timeout in milliseconds, when sent.
        timeout: Option<u32>,
    },
    /// Transaction the request runs in.
    TransactionDescriptor {
        /// Descriptor from the begin-transaction environment change.
        descriptor: u64,
        /// Outstanding request count.
        outstanding_requests: u32,
    },
    /// Client trace activity.
    TraceActivity {
        /// Activity ID (GUID).
        activity_id: [u8; 16],
        /// Activity sequence.
        sequence: u32,
    },
    /// Sub-header of unrecognized type or malformed body.
    Other {
        /// Raw type.
        header_type: u16,
        /// Body.
        data: Bytes,
    },
}

/// Decoded `ALL_HEADERS` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllHeaders {
    /// Declared total length, including its own 4 bytes.
    pub total_length: u32,
    /// Sub-headers in wire order.
    pub headers: Vec<Header>,
}

impl AllHeaders {
    /// Whether `payload` plausibly starts with a header block.
    ///
    /// Pre-7.2 requests have none; the declared lengths must fit the payload
    /// and the first sub-header must fit the block.
    #[must_use]
    pub fn is_present(payload: &[u8]) -> bool {
        let mut r = Reader::new(payload);
        let Ok(total) = r.read_u32_le() else {
            return false;
        };
        let total = total as usize;
        if total < 4 + SUB_HEADER_PREFIX || total > payload.len() {
            return false;
        }
        matches!(r.read_u32_le(), Ok(first) if (SUB_HEADER_PREFIX..=total - 4).contains(&(first as usize)))
    }

    /// Decode a header block.
    ///
    /// Decoding never reads past the declared total length. Lengths that do
    /// not add up are reported as diagnostics rather than errors.
    pub fn decode(src: &mut Reader<'_>) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let start = src.offset();
        let Ok(total_length) = src.read_u32_le() else {
            diagnostics.push(Diagnostic::mismatch(
                start,
                DiagnosticKind::HeaderLengthMismatch,
                4,
                src.remaining(),
            ));
            return (Self::default(), diagnostics);
        };

        let declared = (total_length as usize).saturating_sub(4);
        if total_length < 4 || declared > src.remaining() {
            diagnostics.push(Diagnostic::mismatch(
                start,
                DiagnosticKind::HeaderLengthMismatch,
                total_length as usize,
                src.remaining() + 4,
            ));
        }
        let available = declared.min(src.remaining());
        let Ok(mut block) = src.sub_reader(available) else {
            return (Self::default(), diagnostics);
        };

        let mut headers = Vec::new();
        let mut sum = 4usize;
        while !block.is_empty() {
            let offset = block.offset();
            let Ok(len) = block.read_u32_le() else {
                diagnostics.push(Diagnostic::mismatch(
                    offset,
                    DiagnosticKind::HeaderLengthMismatch,
                    4,
                    block.remaining(),
                ));
                break;
            };
            let len = len as usize;
            if len < SUB_HEADER_PREFIX || len - 4 > block.remaining() {
                diagnostics.push(Diagnostic::mismatch(
                    offset,
                    DiagnosticKind::HeaderLengthMismatch,
                    len,
                    block.remaining() + 4,
                ));
                break;
            }
            let (Ok(header_type), Ok(body)) = (block.read_u16_le(), block.sub_reader(len - 6))
            else {
                break;
            };
            headers.push(decode_header(header_type, body, &mut diagnostics));
            sum += len;
        }

        if sum != total_length as usize {
            diagnostics.push(Diagnostic::mismatch(
                start,
                DiagnosticKind::HeaderLengthMismatch,
                total_length as usize,
                sum,
            ));
        }

        (
            Self {
                total_length,
                headers,
            },
            diagnostics,
        )
    }

    /// Transaction descriptor, if the block carries one.
    #[must_use]
    pub fn transaction_descriptor(&self) -> Option<u64> {
        self.headers.iter().find_map(|h| match h {
            Header::TransactionDescriptor { descriptor, .. } => Some(*descriptor),
            _ => None,
        })
    }
}

fn decode_header(header_type: u16, body: Reader<'_>, diagnostics: &mut Vec<Diagnostic>) -> Header {
    let offset = body.offset();
    let decoded = match header_type {
        HEADER_TRANSACTION_DESCRIPTOR => {
            expect_size(&body, TRANSACTION_DESCRIPTOR_SIZE, diagnostics).then(|| {
                let mut r = body.clone();
                match (r.read_u64_le(), r.read_u32_le()) {
                    (Ok(descriptor), Ok(outstanding_requests)) => Some(Header::TransactionDescriptor {
                        descriptor,
                        outstanding_requests,
                    }),
                    _ => None,
                }
            })
        }
        HEADER_TRACE_ACTIVITY => expect_size(&body, TRACE_ACTIVITY_SIZE, diagnostics).then(|| {
            let mut r = body.clone();
            let mut activity_id = [0u8; 16];
            activity_id.copy_from_slice(r.read_bytes(16).ok()?);
            Some(Header::TraceActivity {
                activity_id,
                sequence: r.read_u32_le().ok()?,
            })
        }),
        HEADER_QUERY_NOTIFICATIONS => {
            let header = decode_notifications(&mut body.clone());
            if header.is_none() {
                diagnostics.push(Diagnostic::new(offset, DiagnosticKind::HeaderLengthMismatch));
            }
            Some(header)
        }
        _ => {
            diagnostics.push(Diagnostic::new(
                offset,
                DiagnosticKind::UnknownHeader { header_type },
            ));
            None
        }
    };

    decoded.flatten().unwrap_or_else(|| Header::Other {
        header_type,
        data: Bytes::copy_from_slice(body.rest()),
    })
}

fn expect_size(body: &Reader<'_>, expected: usize, diagnostics: &mut Vec<Diagnostic>) -> bool {
    if body.remaining() == expected {
        return true;
    }
    diagnostics.push(Diagnostic::mismatch(
        body.offset(),
        DiagnosticKind::HeaderLengthMismatch,
        expected,
        body.remaining(),
    ));
    false
}

// Both strings carry a byte length, not a character count.
fn read_byte_counted_utf16(r: &mut Reader<'_>) -> Option<String> {
    let len = usize::from(r.read_u16_le().ok()?);
    crate::reader::decode_utf16le(r.read_bytes(len).ok()?).ok()
}

fn decode_notifications(body: &mut Reader<'_>) -> Option<Header> {
    let notify_id = read_byte_counted_utf16(body)?;
    let ssb_deployment = read_byte_counted_utf16(body)?;
    let timeout = if body.remaining() >= 4 {
        body.read_u32_le().ok()
    } else {
        None
    };
    Some(Header::QueryNotifications {
        notify_id,
        ssb_deployment,
        timeout,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn transaction_block(descriptor: u64) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&22u32.to_le_bytes());
        data.extend_from_slice(&18u32.to_le_bytes());
        data.extend_from_slice(&HEADER_TRANSACTION_DESCRIPTOR.to_le_bytes());
        data.extend_from_slice(&descriptor.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data
    }

    #[test]
    fn test_transaction_descriptor() {
        let mut data = transaction_block(0x1234);
        data.extend_from_slice(&[b'S', 0]);
        let mut r = Reader::new(&data);
        let (headers, diagnostics) = AllHeaders::decode(&mut r);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(headers.total_length, 22);
        assert_eq!(headers.transaction_descriptor(), Some(0x1234));
        assert_eq!(r.offset(), 22);
        assert!(AllHeaders::is_present(&data));
    }

    #[test]
    fn test_total_length_mismatch() {
        let mut data = transaction_block(1);
        // Declare 2 bytes more than the sub-headers cover
        data[0] = 24;
        data.extend_from_slice(&[0, 0]);
        let (headers, diagnostics) = AllHeaders::decode(&mut Reader::new(&data));
        assert_eq!(headers.headers.len(), 1);
        assert!(!diagnostics.is_empty());
        assert_eq!(diagnostics[0].kind, DiagnosticKind::HeaderLengthMismatch);
    }

    #[test]
    fn test_trace_activity() {
        let mut data = Vec::new();
        data.extend_from_slice(&30u32.to_le_bytes());
        data.extend_from_slice(&26u32.to_le_bytes());
        data.extend_from_slice(&HEADER_TRACE_ACTIVITY.to_le_bytes());
        data.extend_from_slice(&[0xAB; 16]);
        data.extend_from_slice(&7u32.to_le_bytes());

        let (headers, diagnostics) = AllHeaders::decode(&mut Reader::new(&data));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        match &headers.headers[0] {
            Header::TraceActivity {
                activity_id,
                sequence,
            } => {
                assert_eq!(activity_id, &[0xAB; 16]);
                assert_eq!(*sequence, 7);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_header_type() {
        let mut data = Vec::new();
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&0x0009u16.to_le_bytes());
        data.extend_from_slice(&[1, 2]);

        let (headers, diagnostics) = AllHeaders::decode(&mut Reader::new(&data));
        assert_eq!(
            headers.headers,
            vec![Header::Other {
                header_type: 9,
                data: Bytes::from_static(&[1, 2]),
            }]
        );
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::UnknownHeader { header_type: 9 }
        );
    }

    #[test]
    fn test_no_block() {
        let sql: Vec<u8> = "SELECT 1".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert!(!AllHeaders::is_present(&sql));
    }
}
