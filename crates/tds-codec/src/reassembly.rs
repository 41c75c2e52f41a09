//! PDU reassembly.
//!
//! A PDU may span several frames on one channel. Frames carry a sequence
//! number that advances by one (mod 256) per fragment, and the last fragment
//! has the end-of-message flag. A PDU that fits in one frame skips the
//! buffers entirely.

use bytes::{Bytes, BytesMut};
use hashbrown::HashMap;
use tds_wire::{PacketStatus, PacketType};

use crate::error::{CodecError, MalformedFraming};
use crate::frame::Frame;

/// A complete PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    /// Raw packet type of the first fragment.
    pub kind: u8,
    /// Channel the fragments arrived on.
    pub channel: u16,
    /// Status of the first fragment.
    pub status: PacketStatus,
    /// Concatenated payloads.
    pub payload: Bytes,
    /// Number of frames the PDU was built from.
    pub frame_count: usize,
}

impl Pdu {
    /// Typed packet kind, `None` if unrecognized.
    #[must_use]
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_u8(self.kind)
    }

    /// Whether the PDU asks for the connection to be reset first.
    #[must_use]
    pub fn requests_reset(&self) -> bool {
        self.status.requests_reset()
    }
}

#[derive(Debug)]
enum ChannelState {
    Assembling {
        kind: u8,
        status: PacketStatus,
        next_sequence: u8,
        buffer: BytesMut,
        frame_count: usize,
    },
    /// Dropping fragments of a broken PDU until its last frame.
    Resync,
}

/// Per-channel PDU assembly.
#[derive(Debug)]
pub struct Reassembler {
    channels: HashMap<u16, ChannelState>,
    max_pdu_size: usize,
    enabled: bool,
}

impl Reassembler {
    /// Create a reassembler bounding each PDU to `max_pdu_size` bytes.
    #[must_use]
    pub fn new(max_pdu_size: usize) -> Self {
        Self {
            channels: HashMap::new(),
            max_pdu_size,
            enabled: true,
        }
    }

    /// Treat every frame as a complete PDU.
    #[must_use]
    pub fn passthrough(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether `channel` holds a partial PDU or is resynchronizing.
    #[must_use]
    pub fn has_partial(&self, channel: u16) -> bool {
        self.channels.contains_key(&channel)
    }

    /// Drop the partial PDU of `channel`, returning whether there was one.
    pub fn discard(&mut self, channel: u16) -> bool {
        self.channels.remove(&channel).is_some()
    }

    /// Drop every partial PDU.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Add a frame, returning the PDU it completes.
    ///
    /// On error the channel's partial PDU is discarded. After an
    /// out-of-sequence or type-change error, fragments are dropped as
    /// [`MalformedFraming::OrphanFragment`] until one with end-of-message.
    pub fn push(&mut self, frame: &Frame<'_>) -> Result<Option<Pdu>, CodecError> {
        let header = &frame.header;
        let channel = header.channel;
        let eom = header.is_end_of_message();

        if frame.payload.len() > self.max_pdu_size {
            self.fail(channel, eom);
            return Err(CodecError::PduTooLarge {
                channel,
                size: frame.payload.len(),
                max: self.max_pdu_size,
            });
        }

        if !self.enabled || (eom && !self.channels.contains_key(&channel)) {
            return Ok(Some(Pdu {
                kind: header.kind,
                channel,
                status: header.status(),
                payload: Bytes::copy_from_slice(frame.payload),
                frame_count: 1,
            }));
        }

        let state = self
            .channels
            .entry(channel)
            .or_insert_with(|| ChannelState::Assembling {
                kind: header.kind,
                status: header.status(),
                next_sequence: header.sequence,
                buffer: BytesMut::new(),
                frame_count: 0,
            });

        let ChannelState::Assembling {
            kind,
            status,
            next_sequence,
            buffer,
            frame_count,
        } = state
        else {
            if eom {
                self.channels.remove(&channel);
            }
            return Err(MalformedFraming::OrphanFragment {
                channel,
                sequence: header.sequence,
            }
            .into());
        };

        if header.sequence != *next_sequence {
            let err = MalformedFraming::OutOfSequence {
                channel,
                expected: *next_sequence,
                observed: header.sequence,
            };
            self.fail(channel, eom);
            return Err(err.into());
        }
        if header.kind != *kind {
            let err = MalformedFraming::PacketTypeChanged {
                channel,
                first: *kind,
                observed: header.kind,
            };
            self.fail(channel, eom);
            return Err(err.into());
        }

        let size = buffer.len() + frame.payload.len();
        if size > self.max_pdu_size {
            let max = self.max_pdu_size;
            self.fail(channel, eom);
            return Err(CodecError::PduTooLarge { channel, size, max });
        }

        buffer.extend_from_slice(frame.payload);
        *frame_count += 1;
        *next_sequence = next_sequence.wrapping_add(1);

        tracing::trace!(
            channel,
            sequence = header.sequence,
            frame_count = *frame_count,
            buffer_len = buffer.len(),
            is_eom = eom,
            "assembling PDU"
        );

        if !eom {
            return Ok(None);
        }

        let pdu = Pdu {
            kind: *kind,
            channel,
            status: *status,
            payload: buffer.split().freeze(),
            frame_count: *frame_count,
        };
        self.channels.remove(&channel);
        tracing::trace!(channel, size = pdu.payload.len(), frames = pdu.frame_count, "PDU complete");
        Ok(Some(pdu))
    }

    fn fail(&mut self, channel: u16, eom: bool) {
        if eom {
            self.channels.remove(&channel);
        } else {
            self.channels.insert(channel, ChannelState::Resync);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::frame::{FrameResult, decode_frame};
    use tds_testing::frames::{FrameBuilder, SQL_BATCH, STATUS_EOM, STATUS_RESET, TABULAR_RESULT};

    fn push(r: &mut Reassembler, bytes: &[u8]) -> Result<Option<Pdu>, CodecError> {
        let FrameResult::Frame(frame, rest) = decode_frame(bytes) else {
            panic!("not a frame");
        };
        assert!(rest.is_empty());
        r.push(&frame)
    }

    fn fragment(sequence: u8, eom: bool, payload: &[u8]) -> Bytes {
        FrameBuilder::new(TABULAR_RESULT)
            .channel(5)
            .sequence(sequence)
            .status(if eom { STATUS_EOM } else { 0 })
            .build(payload)
    }

    #[test]
    fn test_single_frame_fast_path() {
        let mut r = Reassembler::new(1024);
        let pdu = push(&mut r, &fragment(1, true, b"abc")).unwrap().unwrap();
        assert_eq!(&pdu.payload[..], b"abc");
        assert_eq!(pdu.frame_count, 1);
        assert!(!r.has_partial(5));
    }

    #[test]
    fn test_multi_frame_pdu() {
        let mut r = Reassembler::new(1024);
        assert!(push(&mut r, &fragment(1, false, b"ab")).unwrap().is_none());
        assert!(r.has_partial(5));
        assert!(push(&mut r, &fragment(2, false, b"cd")).unwrap().is_none());
        let pdu = push(&mut r, &fragment(3, true, b"e")).unwrap().unwrap();
        assert_eq!(&pdu.payload[..], b"abcde");
        assert_eq!(pdu.frame_count, 3);
        assert_eq!(pdu.packet_type(), Some(PacketType::TabularResult));
        assert!(!r.has_partial(5));
    }

    #[test]
    fn test_sequence_wraps() {
        let mut r = Reassembler::new(1024);
        assert!(push(&mut r, &fragment(255, false, b"x")).unwrap().is_none());
        let pdu = push(&mut r, &fragment(0, true, b"y")).unwrap().unwrap();
        assert_eq!(&pdu.payload[..], b"xy");
    }

    #[test]
    fn test_out_of_sequence_then_resync() {
        let mut r = Reassembler::new(1024);
        push(&mut r, &fragment(1, false, b"a")).unwrap();
        let err = push(&mut r, &fragment(3, false, b"c")).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Malformed(MalformedFraming::OutOfSequence {
                channel: 5,
                expected: 2,
                observed: 3,
            })
        ));

        let err = push(&mut r, &fragment(4, true, b"d")).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Malformed(MalformedFraming::OrphanFragment { sequence: 4, .. })
        ));

        // The channel is clean again
        let pdu = push(&mut r, &fragment(1, true, b"ok")).unwrap().unwrap();
        assert_eq!(&pdu.payload[..], b"ok");
    }

    #[test]
    fn test_packet_type_change() {
        let mut r = Reassembler::new(1024);
        push(&mut r, &fragment(1, false, b"a")).unwrap();
        let other = FrameBuilder::new(SQL_BATCH).channel(5).sequence(2).build(b"b");
        let err = push(&mut r, &other).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Malformed(MalformedFraming::PacketTypeChanged { first: 0x04, observed: 0x01, .. })
        ));
        assert!(!r.has_partial(5));
    }

    #[test]
    fn test_discard_drops_partial() {
        let mut r = Reassembler::new(1024);
        assert!(push(&mut r, &fragment(1, false, &[0xFD, 0x00])).unwrap().is_none());
        assert!(r.discard(5));
        assert!(!r.has_partial(5));
        assert!(!r.discard(5));

        // A continuation after the discard is a fresh single-frame PDU
        let pdu = push(&mut r, &fragment(2, true, &[0x01])).unwrap().unwrap();
        assert_eq!(&pdu.payload[..], &[0x01]);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut r = Reassembler::new(1024);
        let a = FrameBuilder::new(TABULAR_RESULT).channel(1).status(0).build(b"1");
        let b = FrameBuilder::new(TABULAR_RESULT).channel(2).status(0).build(b"2");
        push(&mut r, &a).unwrap();
        push(&mut r, &b).unwrap();
        let a2 = FrameBuilder::new(TABULAR_RESULT).channel(1).sequence(2).build(b"!");
        let pdu = push(&mut r, &a2).unwrap().unwrap();
        assert_eq!(&pdu.payload[..], b"1!");
        assert!(r.has_partial(2));
    }

    #[test]
    fn test_pdu_size_limit() {
        let mut r = Reassembler::new(4);
        push(&mut r, &fragment(1, false, b"abc")).unwrap();
        let err = push(&mut r, &fragment(2, true, b"de")).unwrap_err();
        assert!(matches!(err, CodecError::PduTooLarge { size: 5, max: 4, .. }));
        assert!(!r.has_partial(5));
    }

    #[test]
    fn test_passthrough_keeps_frames_separate() {
        let mut r = Reassembler::new(1024).passthrough();
        let pdu = push(&mut r, &fragment(1, false, b"a")).unwrap().unwrap();
        assert_eq!(&pdu.payload[..], b"a");
        assert!(!r.has_partial(5));
    }

    #[test]
    fn test_reset_status_is_kept() {
        let mut r = Reassembler::new(1024);
        let frame = FrameBuilder::new(SQL_BATCH)
            .status(STATUS_EOM | STATUS_RESET)
            .build(b"x");
        let pdu = push(&mut r, &frame).unwrap().unwrap();
        assert!(pdu.requests_reset());
    }
}
