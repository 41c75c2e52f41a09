//! Protocol identification without prior context.
//!
//! Used when a capture has no port mapping for a conversation: the first
//! frame must look like a TDS header and, on the very first frame of a
//! connection, carry a login-style PDU with a recognizable version marker.

use tds_wire::layout::{FRAME_HEADER_SIZE, LEGACY_LOGIN_VERSION_OFFSET, LOGIN7_VERSION_OFFSET};
use tds_wire::{FrameHeader, PacketType, TdsVersion};

use crate::config::DecoderConfig;

/// Option type that opens every pre-login option table.
const PRELOGIN_VERSION_OPTION: u8 = 0x00;

/// Size of the `VERSION` option data.
const PRELOGIN_VERSION_LENGTH: usize = 6;

/// Frame-level identification rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct Heuristic;

impl Heuristic {
    /// Whether `data` plausibly starts with a TDS frame.
    ///
    /// `first_frame` adds the login version check for the opening frame of
    /// a connection.
    #[must_use]
    pub fn matches(data: &[u8], first_frame: bool) -> bool {
        let Some(header) = FrameHeader::parse(data) else {
            return false;
        };
        let Some(packet_type) = header.packet_type() else {
            return false;
        };
        if header.has_unknown_status_bits() || usize::from(header.length) < FRAME_HEADER_SIZE {
            return false;
        }
        if !first_frame {
            return true;
        }
        if !packet_type.is_login() {
            return false;
        }
        let end = data.len().min(usize::from(header.length));
        Self::login_marker(packet_type, &data[FRAME_HEADER_SIZE..end]).is_some()
    }

    /// Like [`Heuristic::matches`], but only on configured TDS ports.
    #[must_use]
    pub fn matches_port(config: &DecoderConfig, port: u16, data: &[u8], first_frame: bool) -> bool {
        config.is_tds_port(port) && Self::matches(data, first_frame)
    }

    /// The version a login-style payload announces.
    ///
    /// Pre-login carries no TDS version of its own, so a well-formed option
    /// table yields [`TdsVersion::Unknown`].
    #[must_use]
    pub fn login_marker(packet_type: PacketType, payload: &[u8]) -> Option<TdsVersion> {
        match packet_type {
            PacketType::Tds7Login => {
                let bytes = payload.get(LOGIN7_VERSION_OFFSET..LOGIN7_VERSION_OFFSET + 4)?;
                let code = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                TdsVersion::from_code(code).filter(|v| !v.is_legacy())
            }
            // The table must open with VERSION, and its 6 bytes must lie in the payload
            PacketType::PreLogin => {
                let entry = payload.get(..5)?;
                if entry[0] != PRELOGIN_VERSION_OPTION {
                    return None;
                }
                let offset = usize::from(u16::from_be_bytes([entry[1], entry[2]]));
                let length = usize::from(u16::from_be_bytes([entry[3], entry[4]]));
                (length == PRELOGIN_VERSION_LENGTH && offset + length <= payload.len())
                    .then_some(TdsVersion::Unknown)
            }
            PacketType::PreTds7Login => match payload.get(LEGACY_LOGIN_VERSION_OFFSET)? {
                4 => Some(TdsVersion::V4_2),
                5 => Some(TdsVersion::V5_0),
                _ => None,
            },
            _ => None,
        }
    }
}
