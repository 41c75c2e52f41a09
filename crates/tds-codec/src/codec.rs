//! `tokio_util` adapter for frame decoding.

use bytes::BytesMut;
use tds_wire::layout::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
use tokio_util::codec::Decoder;

use crate::error::CodecError;
use crate::frame::{FrameResult, OwnedFrame, decode_frame};

/// Frame decoder for use with `FramedRead`.
///
/// Malformed headers are returned as errors; `FramedRead` ends the stream
/// after the first one, so callers wanting to resynchronize should drive
/// [`decode_frame`] directly.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    frames: u64,
}

impl FrameCodec {
    /// Create a new frame codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames decoded so far.
    #[must_use]
    pub fn frames_decoded(&self) -> u64 {
        self.frames
    }
}

impl Decoder for FrameCodec {
    type Item = OwnedFrame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let decoded = match decode_frame(src) {
            FrameResult::NeedMoreBytes(needed) => Err(needed),
            FrameResult::Malformed(reason) => return Err(reason.into()),
            FrameResult::Frame(frame, _) => Ok((frame.wire_len(), frame.kind, frame.header)),
        };
        let (length, kind, header) = match decoded {
            Ok(frame) => frame,
            Err(needed) => {
                src.reserve(needed.min(MAX_FRAME_SIZE));
                return Ok(None);
            }
        };

        let bytes = src.split_to(length).freeze();
        self.frames += 1;
        Ok(Some(OwnedFrame {
            header,
            payload: bytes.slice(FRAME_HEADER_SIZE..),
            kind,
        }))
    }
}
