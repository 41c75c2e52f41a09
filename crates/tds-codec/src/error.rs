//! Codec error types.

use thiserror::Error;

use tds_wire::ProtocolError;

/// A frame that cannot be placed in a PDU.
///
/// Every variant is recoverable: the partial PDU on the affected channel is
/// discarded and decoding continues with the next frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedFraming {
    /// Declared frame length is smaller than the header itself.
    #[error("declared length {declared} is below the header size")]
    LengthBelowHeader {
        /// Declared frame length.
        declared: u16,
    },

    /// A fragment arrived with an unexpected sequence number.
    #[error("channel {channel}: expected sequence {expected}, got {observed}")]
    OutOfSequence {
        /// Channel.
        channel: u16,
        /// Next sequence number the channel was waiting for.
        expected: u8,
        /// Sequence number received.
        observed: u8,
    },

    /// A fragment dropped while the channel waits for the end of a broken PDU.
    #[error("channel {channel}: orphan fragment with sequence {sequence}")]
    OrphanFragment {
        /// Channel.
        channel: u16,
        /// Sequence number of the dropped frame.
        sequence: u8,
    },

    /// A fragment whose packet type differs from the PDU it continues.
    #[error("channel {channel}: packet type changed from 0x{first:02X} to 0x{observed:02X}")]
    PacketTypeChanged {
        /// Channel.
        channel: u16,
        /// Type of the first fragment.
        first: u8,
        /// Type of this fragment.
        observed: u8,
    },
}

/// Errors that can occur in the codec layer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Bad frame header or out-of-place fragment.
    #[error("malformed framing: {0}")]
    Malformed(#[from] MalformedFraming),

    /// Error from the wire decoder.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A reassembled PDU grew past the configured limit.
    #[error("channel {channel}: PDU of {size} bytes exceeds maximum {max}")]
    PduTooLarge {
        /// Channel.
        channel: u16,
        /// Size the PDU would reach.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// IO error from the underlying reader.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Whether decoding can continue with the next frame.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
