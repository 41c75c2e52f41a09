//! Single-frame decoding.
//!
//! [`decode_frame`] looks at the front of a byte cursor and either returns
//! one complete frame and the bytes after it, or says how many more bytes
//! are needed. It never consumes anything itself.

use bytes::Bytes;
use tds_wire::FrameHeader;
use tds_wire::layout::FRAME_HEADER_SIZE;

use crate::error::MalformedFraming;
use crate::tls::is_tls_record;

/// How a frame's payload should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Ordinary TDS payload.
    Tds,
    /// Payload is a TLS record; pass it through undecoded.
    TlsHandshake,
}

/// A frame borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Parsed header.
    pub header: FrameHeader,
    /// Payload, without the header.
    pub payload: &'a [u8],
    /// Payload classification.
    pub kind: FrameKind,
}

impl Frame<'_> {
    /// Copy the payload out of the input buffer.
    #[must_use]
    pub fn to_owned_frame(&self) -> OwnedFrame {
        OwnedFrame {
            header: self.header,
            payload: Bytes::copy_from_slice(self.payload),
            kind: self.kind,
        }
    }

    /// Total size on the wire, header included.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }
}

/// A frame that owns its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    /// Parsed header.
    pub header: FrameHeader,
    /// Payload, without the header.
    pub payload: Bytes,
    /// Payload classification.
    pub kind: FrameKind,
}

impl OwnedFrame {
    /// Borrow as a [`Frame`].
    #[must_use]
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            header: self.header,
            payload: &self.payload,
            kind: self.kind,
        }
    }
}

/// Outcome of [`decode_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResult<'a> {
    /// This many more bytes are needed before anything can be decided.
    NeedMoreBytes(usize),
    /// A complete frame and the bytes that follow it.
    Frame(Frame<'a>, &'a [u8]),
    /// The header cannot start a frame.
    Malformed(MalformedFraming),
}

/// Decode the frame at the front of `src`.
pub fn decode_frame(src: &[u8]) -> FrameResult<'_> {
    let Some(header) = FrameHeader::parse(src) else {
        return FrameResult::NeedMoreBytes(FRAME_HEADER_SIZE - src.len());
    };

    let length = usize::from(header.length);
    if length < FRAME_HEADER_SIZE {
        return FrameResult::Malformed(MalformedFraming::LengthBelowHeader {
            declared: header.length,
        });
    }
    if src.len() < length {
        return FrameResult::NeedMoreBytes(length - src.len());
    }

    let payload = &src[FRAME_HEADER_SIZE..length];
    let kind = if is_tls_record(payload) {
        FrameKind::TlsHandshake
    } else {
        FrameKind::Tds
    };

    tracing::trace!(
        packet_type = format_args!("0x{:02X}", header.kind),
        length,
        channel = header.channel,
        sequence = header.sequence,
        is_eom = header.is_end_of_message(),
        "decoded frame"
    );

    FrameResult::Frame(
        Frame {
            header,
            payload,
            kind,
        },
        &src[length..],
    )
}
