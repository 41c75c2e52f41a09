//! Frame and TLS record builders.

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the frame header.
pub const HEADER_SIZE: usize = 8;

/// SQL batch packet type.
pub const SQL_BATCH: u8 = 0x01;
/// Pre-TDS7 login packet type.
pub const PRE_TDS7_LOGIN: u8 = 0x02;
/// RPC packet type.
pub const RPC: u8 = 0x03;
/// Tabular result packet type.
pub const TABULAR_RESULT: u8 = 0x04;
/// TDS7 login packet type.
pub const TDS7_LOGIN: u8 = 0x10;
/// Pre-login packet type.
pub const PRE_LOGIN: u8 = 0x12;

/// End-of-message status bit.
pub const STATUS_EOM: u8 = 0x01;
/// Reset-connection status bit.
pub const STATUS_RESET: u8 = 0x08;

/// Builds single frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameBuilder {
    kind: u8,
    status: u8,
    channel: u16,
    sequence: u8,
    window: u8,
}

impl FrameBuilder {
    /// A final frame of `kind` on channel 0 with sequence 1.
    #[must_use]
    pub fn new(kind: u8) -> Self {
        Self {
            kind,
            status: STATUS_EOM,
            channel: 0,
            sequence: 1,
            window: 0,
        }
    }

    /// Set the raw status byte.
    #[must_use]
    pub fn status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    /// Set the channel.
    #[must_use]
    pub fn channel(mut self, channel: u16) -> Self {
        self.channel = channel;
        self
    }

    /// Set the sequence number.
    #[must_use]
    pub fn sequence(mut self, sequence: u8) -> Self {
        self.sequence = sequence;
        self
    }

    /// Header plus `payload`, with the length field covering both.
    ///
    /// # Panics
    ///
    /// Panics if the frame would not fit a 16-bit length.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(&self, payload: &[u8]) -> Bytes {
        let length = u16::try_from(HEADER_SIZE + payload.len()).expect("frame too large");
        self.build_with_length(length, payload)
    }

    /// Header declaring `length` regardless of the payload size.
    #[must_use]
    pub fn build_with_length(&self, length: u16, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u8(self.kind);
        buf.put_u8(self.status);
        buf.put_u16(length);
        buf.put_u16(self.channel);
        buf.put_u8(self.sequence);
        buf.put_u8(self.window);
        buf.put_slice(payload);
        buf.freeze()
    }
}

/// Split `payload` into frames carrying at most `max_payload` bytes each.
///
/// Sequence numbers start at 1 and wrap; only the last frame has EOM set.
/// An empty payload yields one empty final frame.
#[must_use]
pub fn split_pdu(kind: u8, channel: u16, payload: &[u8], max_payload: usize) -> Vec<Bytes> {
    let chunks: Vec<&[u8]> = if payload.is_empty() {
        vec![payload]
    } else {
        payload.chunks(max_payload.max(1)).collect()
    };
    let last = chunks.len() - 1;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            FrameBuilder::new(kind)
                .channel(channel)
                .sequence((i + 1) as u8)
                .status(if i == last { STATUS_EOM } else { 0 })
                .build(chunk)
        })
        .collect()
}

/// A TLS record of `content_type` (0x16 is a handshake) with version 3.3.
///
/// # Panics
///
/// Panics if `body` is longer than a TLS record allows.
#[must_use]
#[allow(clippy::expect_used)]
pub fn tls_record(content_type: u8, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + body.len());
    buf.put_u8(content_type);
    buf.put_u8(0x03);
    buf.put_u8(0x03);
    buf.put_u16(u16::try_from(body.len()).expect("record too large"));
    buf.put_slice(body);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sets_eom_on_last() {
        let frames = split_pdu(TABULAR_RESULT, 7, &[1, 2, 3, 4, 5], 2);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0][1], 0);
        assert_eq!(frames[2][1], STATUS_EOM);
        assert_eq!(frames[1][6], 2);
        assert_eq!(&frames[2][8..], &[5]);
    }
}
