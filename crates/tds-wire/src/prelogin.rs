//! Pre-login message decoding.
//!
//! The pre-login PDU is an option table followed by option data. Each table
//! entry is a type byte, a big-endian offset and a big-endian length; offsets
//! are measured from the start of the payload. The table ends with `0xFF`.

use crate::error::ProtocolError;
use crate::layout::PRELOGIN_TERMINATOR;
use crate::reader::{ByteOrder, Reader};

/// Pre-login option types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PreLoginOption {
    /// Version information.
    Version = 0x00,
    /// Encryption negotiation.
    Encryption = 0x01,
    /// Instance name (for named instances).
    Instance = 0x02,
    /// Thread ID.
    ThreadId = 0x03,
    /// MARS (Multiple Active Result Sets) support.
    Mars = 0x04,
    /// Trace ID for distributed tracing.
    TraceId = 0x05,
    /// Federated authentication required.
    FedAuthRequired = 0x06,
    /// Nonce for encryption.
    Nonce = 0x07,
}

impl PreLoginOption {
    /// Create from raw byte value.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Version,
            0x01 => Self::Encryption,
            0x02 => Self::Instance,
            0x03 => Self::ThreadId,
            0x04 => Self::Mars,
            0x05 => Self::TraceId,
            0x06 => Self::FedAuthRequired,
            0x07 => Self::Nonce,
            _ => return None,
        })
    }
}

/// Encryption level announced in pre-login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncryptionLevel {
    /// Encryption is off (login packet is still encrypted).
    Off = 0x00,
    /// Encryption is on.
    On = 0x01,
    /// Encryption is not supported.
    NotSupported = 0x02,
    /// Encryption is required.
    Required = 0x03,
    /// Client certificate authentication.
    ClientCertAuth = 0x80,
}

impl EncryptionLevel {
    /// Create from raw byte value.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Self::Off,
            0x01 => Self::On,
            0x02 => Self::NotSupported,
            0x03 => Self::Required,
            0x80 => Self::ClientCertAuth,
            _ => return None,
        })
    }
}

/// Product version carried in the `VERSION` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Build number.
    pub build: u16,
    /// Sub-build number.
    pub sub_build: u16,
}

/// Activity ID sent in the `TRACEID` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceId {
    /// Connection ID (GUID).
    pub connection_id: [u8; 16],
    /// Activity ID (GUID).
    pub activity_id: [u8; 16],
    /// Activity sequence.
    pub activity_sequence: u32,
}

/// Decoded pre-login message, from either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreLogin {
    /// Product version.
    pub version: Option<ProductVersion>,
    /// Encryption level.
    pub encryption: Option<EncryptionLevel>,
    /// Instance name.
    pub instance: Option<String>,
    /// Client thread ID.
    pub thread_id: Option<u32>,
    /// MARS requested or granted.
    pub mars: Option<bool>,
    /// Trace ID.
    pub trace_id: Option<TraceId>,
    /// Federated authentication required.
    pub fed_auth_required: Option<bool>,
    /// Nonce.
    pub nonce: Option<[u8; 32]>,
}

impl PreLogin {
    /// Decode a pre-login payload.
    ///
    /// Option types this decoder does not know are skipped, as are options
    /// whose data lies outside the payload.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut table = Reader::new(payload).with_byte_order(ByteOrder::BigEndian);
        let mut prelogin = Self::default();

        loop {
            let kind = table.read_u8()?;
            if kind == PRELOGIN_TERMINATOR {
                break;
            }
            let offset = usize::from(table.read_u16()?);
            let length = usize::from(table.read_u16()?);

            let Some(data) = offset
                .checked_add(length)
                .and_then(|end| payload.get(offset..end))
            else {
                tracing::debug!(option = kind, offset, length, "pre-login option out of bounds");
                continue;
            };
            let Some(option) = PreLoginOption::from_u8(kind) else {
                continue;
            };
            prelogin.apply(option, data, offset)?;
        }

        Ok(prelogin)
    }

    fn apply(&mut self, option: PreLoginOption, data: &[u8], offset: usize) -> Result<(), ProtocolError> {
        let mut r = Reader::with_offset(data, offset);
        match option {
            PreLoginOption::Version if data.len() >= 4 => {
                let major = r.read_u8()?;
                let minor = r.read_u8()?;
                let build = r.read_u16_be()?;
                let sub_build = if r.remaining() >= 2 { r.read_u16_le()? } else { 0 };
                self.version = Some(ProductVersion {
                    major,
                    minor,
                    build,
                    sub_build,
                });
            }
            PreLoginOption::Encryption => {
                self.encryption = EncryptionLevel::from_u8(r.read_u8()?);
            }
            PreLoginOption::Instance => {
                let name = data.split(|&b| b == 0).next().unwrap_or_default();
                if !name.is_empty() {
                    self.instance = Some(String::from_utf8_lossy(name).into_owned());
                }
            }
            PreLoginOption::ThreadId if data.len() >= 4 => {
                self.thread_id = Some(r.read_u32_be()?);
            }
            PreLoginOption::Mars => self.mars = Some(r.read_u8()? != 0),
            PreLoginOption::TraceId if data.len() >= 36 => {
                let mut connection_id = [0u8; 16];
                connection_id.copy_from_slice(r.read_bytes(16)?);
                let mut activity_id = [0u8; 16];
                activity_id.copy_from_slice(r.read_bytes(16)?);
                self.trace_id = Some(TraceId {
                    connection_id,
                    activity_id,
                    activity_sequence: r.read_u32_le()?,
                });
            }
            PreLoginOption::FedAuthRequired => {
                self.fed_auth_required = Some(r.read_u8()? != 0);
            }
            PreLoginOption::Nonce if data.len() >= 32 => {
                let mut nonce = [0u8; 32];
                nonce.copy_from_slice(r.read_bytes(32)?);
                self.nonce = Some(nonce);
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether a TLS handshake follows this exchange.
    ///
    /// Only an explicit `NOT_SUP` keeps the connection in clear text; `OFF`
    /// still encrypts the login packet.
    #[must_use]
    pub fn expects_tls(&self) -> bool {
        matches!(
            self.encryption,
            Some(
                EncryptionLevel::Off
                    | EncryptionLevel::On
                    | EncryptionLevel::Required
                    | EncryptionLevel::ClientCertAuth
            )
        )
    }
}
