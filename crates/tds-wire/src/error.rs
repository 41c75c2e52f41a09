//! Protocol decoding errors.

use thiserror::Error;

/// Errors that can occur while decoding a TDS token stream.
///
/// Every variant carries the absolute byte offset (within the PDU being
/// decoded) at which the problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The PDU ended before a field could be read.
    #[error("unexpected end of data at offset {offset}: need {needed} bytes, have {available}")]
    UnexpectedEof {
        /// Offset of the read that failed.
        offset: usize,
        /// Bytes required by the read.
        needed: usize,
        /// Bytes actually left.
        available: usize,
    },

    /// A token tag that is not in the token table.
    #[error("unknown token tag 0x{tag:02X} at offset {offset}")]
    UnknownToken {
        /// Raw tag byte.
        tag: u8,
        /// Offset of the tag byte.
        offset: usize,
    },

    /// A row-family token appeared before any column metadata.
    #[error("token 0x{tag:02X} at offset {offset} requires column metadata")]
    DependentState {
        /// Raw tag byte.
        tag: u8,
        /// Offset of the tag byte.
        offset: usize,
    },

    /// A base-type tag that is not in the type table.
    #[error("unknown data type 0x{tag:02X} at offset {offset}")]
    UnknownType {
        /// Raw type byte.
        tag: u8,
        /// Offset of the type byte.
        offset: usize,
    },

    /// A value whose encoding is inconsistent with its type.
    #[error("invalid value encoding at offset {offset}: {reason}")]
    InvalidValue {
        /// Offset where the value starts.
        offset: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A declared length that cannot be represented or is negative.
    #[error("declared length {declared} at offset {offset} overflows")]
    LengthOverflow {
        /// Offset of the length field.
        offset: usize,
        /// The declared length.
        declared: u64,
    },

    /// A streamed value exceeded the configured accumulation limit.
    #[error("value exceeds limit of {limit} bytes (observed {observed})")]
    ValueTooLarge {
        /// Configured limit.
        limit: usize,
        /// Bytes accumulated when the limit was hit.
        observed: usize,
    },

    /// String data that is not valid in its declared encoding.
    #[error("string encoding error: {0}")]
    StringEncoding(String),
}

/// The smallest unit a decoding failure invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureScope {
    /// Only the value being decoded is lost.
    Value,
    /// The current token is lost; the stream may continue if its size is known.
    Token,
    /// The remainder of the PDU cannot be interpreted.
    Pdu,
}

impl ProtocolError {
    /// Classify this error by the unit of data it invalidates.
    #[must_use]
    pub fn scope(&self) -> FailureScope {
        match self {
            Self::UnknownType { .. }
            | Self::InvalidValue { .. }
            | Self::ValueTooLarge { .. }
            | Self::StringEncoding(_) => FailureScope::Value,
            Self::UnexpectedEof { .. } | Self::LengthOverflow { .. } => FailureScope::Token,
            Self::UnknownToken { .. } | Self::DependentState { .. } => FailureScope::Pdu,
        }
    }

    /// Offset at which the error was detected, when known.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::UnexpectedEof { offset, .. }
            | Self::UnknownToken { offset, .. }
            | Self::DependentState { offset, .. }
            | Self::UnknownType { offset, .. }
            | Self::InvalidValue { offset, .. }
            | Self::LengthOverflow { offset, .. } => Some(*offset),
            Self::ValueTooLarge { .. } | Self::StringEncoding(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_classification() {
        let unknown = ProtocolError::UnknownToken { tag: 0x42, offset: 3 };
        assert_eq!(unknown.scope(), FailureScope::Pdu);
        assert_eq!(unknown.offset(), Some(3));

        let ty = ProtocolError::UnknownType { tag: 0x99, offset: 10 };
        assert_eq!(ty.scope(), FailureScope::Value);

        let eof = ProtocolError::UnexpectedEof {
            offset: 0,
            needed: 4,
            available: 1,
        };
        assert_eq!(eof.scope(), FailureScope::Token);
        assert!(eof.to_string().contains("need 4 bytes"));
    }
}
