//! Frame header definitions.

use bitflags::bitflags;
use bytes::Buf;

use crate::layout::FRAME_HEADER_SIZE;

/// PDU kind carried in the frame header type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// SQL batch request.
    SqlBatch = 0x01,
    /// Pre-TDS7 login packet.
    PreTds7Login = 0x02,
    /// Remote procedure call.
    Rpc = 0x03,
    /// Tabular response.
    TabularResult = 0x04,
    /// Attention signal.
    Attention = 0x06,
    /// Bulk load data.
    BulkLoad = 0x07,
    /// Federated authentication token.
    FedAuthToken = 0x08,
    /// Transaction manager request.
    TransactionManager = 0x0E,
    /// TDS 5 query.
    Tds5Query = 0x0F,
    /// TDS7+ login packet.
    Tds7Login = 0x10,
    /// SSPI authentication.
    Sspi = 0x11,
    /// Pre-login packet.
    PreLogin = 0x12,
}

impl PacketType {
    /// Create a packet type from a raw byte value.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::SqlBatch),
            0x02 => Some(Self::PreTds7Login),
            0x03 => Some(Self::Rpc),
            0x04 => Some(Self::TabularResult),
            0x06 => Some(Self::Attention),
            0x07 => Some(Self::BulkLoad),
            0x08 => Some(Self::FedAuthToken),
            0x0E => Some(Self::TransactionManager),
            0x0F => Some(Self::Tds5Query),
            0x10 => Some(Self::Tds7Login),
            0x11 => Some(Self::Sspi),
            0x12 => Some(Self::PreLogin),
            _ => None,
        }
    }

    /// Whether PDUs of this kind begin with an `ALL_HEADERS` block (TDS 7.2+).
    #[must_use]
    pub const fn carries_all_headers(self) -> bool {
        matches!(
            self,
            Self::SqlBatch | Self::Rpc | Self::TransactionManager
        )
    }

    /// Whether PDUs of this kind are a token stream.
    #[must_use]
    pub const fn carries_tokens(self) -> bool {
        matches!(self, Self::TabularResult)
    }

    /// Whether this is one of the login-style kinds checked on the first frame.
    #[must_use]
    pub const fn is_login(self) -> bool {
        matches!(self, Self::PreTds7Login | Self::Tds7Login | Self::PreLogin)
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SqlBatch => "SQL batch",
            Self::PreTds7Login => "Pre-TDS7 login",
            Self::Rpc => "Remote Procedure Call",
            Self::TabularResult => "Response",
            Self::Attention => "Attention",
            Self::BulkLoad => "Bulk load data",
            Self::FedAuthToken => "Federated authentication token",
            Self::TransactionManager => "Transaction Manager Request",
            Self::Tds5Query => "TDS5 query",
            Self::Tds7Login => "TDS7 login",
            Self::Sspi => "SSPI message",
            Self::PreLogin => "Pre-login",
        }
    }
}

bitflags! {
    /// Frame status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PacketStatus: u8 {
        /// End of message (last frame of the PDU).
        const END_OF_MESSAGE = 0x01;
        /// Ignore this event (used for attention acknowledgment).
        const IGNORE_EVENT = 0x02;
        /// Event notification.
        const EVENT_NOTIFICATION = 0x04;
        /// Reset connection before processing the request.
        const RESET_CONNECTION = 0x08;
        /// Reset connection but keep transaction state.
        const RESET_CONNECTION_SKIP_TRANSACTION = 0x10;
    }
}

impl PacketStatus {
    /// Whether any reset flag is set.
    #[must_use]
    pub const fn requests_reset(self) -> bool {
        self.intersects(
            Self::RESET_CONNECTION.union(Self::RESET_CONNECTION_SKIP_TRANSACTION),
        )
    }
}

/// Frame header.
///
/// Every frame begins with an 8-byte big-endian header. The type and status
/// are kept raw so unrecognized values can still be reported; use
/// [`FrameHeader::packet_type`] and [`FrameHeader::status`] for the typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    /// Raw type byte.
    pub kind: u8,
    /// Raw status byte.
    pub status_bits: u8,
    /// Total frame length including the header.
    pub length: u16,
    /// Channel (server process ID).
    pub channel: u16,
    /// Sequence number (wraps at 255).
    pub sequence: u8,
    /// Window (informational).
    pub window: u8,
}

impl FrameHeader {
    /// Parse a header from exactly [`FRAME_HEADER_SIZE`] bytes.
    ///
    /// Returns `None` when fewer bytes are available; nothing is validated.
    #[must_use]
    pub fn parse(src: &[u8]) -> Option<Self> {
        if src.len() < FRAME_HEADER_SIZE {
            return None;
        }
        let mut buf = &src[..FRAME_HEADER_SIZE];
        Some(Self {
            kind: buf.get_u8(),
            status_bits: buf.get_u8(),
            length: buf.get_u16(),
            channel: buf.get_u16(),
            sequence: buf.get_u8(),
            window: buf.get_u8(),
        })
    }

    /// Typed packet kind, `None` if unrecognized.
    #[must_use]
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_u8(self.kind)
    }

    /// Status flags, unknown bits dropped.
    #[must_use]
    pub const fn status(&self) -> PacketStatus {
        PacketStatus::from_bits_truncate(self.status_bits)
    }

    /// Whether the status byte has bits outside the known set.
    #[must_use]
    pub const fn has_unknown_status_bits(&self) -> bool {
        self.status_bits & !PacketStatus::all().bits() != 0
    }

    /// Get the payload length (total length minus header).
    #[must_use]
    pub const fn payload_length(&self) -> usize {
        (self.length as usize).saturating_sub(FRAME_HEADER_SIZE)
    }

    /// Check if this is the last frame in a PDU.
    #[must_use]
    pub const fn is_end_of_message(&self) -> bool {
        self.status_bits & PacketStatus::END_OF_MESSAGE.bits() != 0
    }

    /// Encode the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let [len_hi, len_lo] = self.length.to_be_bytes();
        let [ch_hi, ch_lo] = self.channel.to_be_bytes();
        [
            self.kind,
            self.status_bits,
            len_hi,
            len_lo,
            ch_hi,
            ch_lo,
            self.sequence,
            self.window,
        ]
    }
}
