//! Wire layout constants and NULL sentinels.

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest length a frame header can declare.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// `BYTELEN` NULL: a one-byte length prefix of zero.
pub const BYTELEN_NULL: u8 = 0x00;

/// `USHORTLEN` NULL.
pub const USHORTLEN_NULL: u16 = 0xFFFF;

/// `LONGLEN` NULL.
pub const LONGLEN_NULL: u32 = 0xFFFF_FFFF;

/// Total-length value marking a NULL PLP value.
pub const PLP_NULL: u64 = u64::MAX;

/// Total-length value marking a PLP value of unknown length.
pub const PLP_UNKNOWN_LEN: u64 = u64::MAX - 1;

/// Chunk length terminating a PLP chunk sequence.
pub const PLP_TERMINATOR: u32 = 0;

/// Maximum declared length in `TYPE_INFO` that switches a type to PLP encoding.
pub const MAX_LEN_PLP: u16 = 0xFFFF;

/// Byte terminating the pre-login option table.
pub const PRELOGIN_TERMINATOR: u8 = 0xFF;

/// Byte terminating the feature-extension acknowledgement list.
pub const FEATURE_EXT_TERMINATOR: u8 = 0xFF;

/// Offset of the TDS version field inside a `LOGIN7` payload.
pub const LOGIN7_VERSION_OFFSET: usize = 4;

/// Offset of the major version byte inside a pre-TDS7 login payload.
pub const LEGACY_LOGIN_VERSION_OFFSET: usize = 458;
