//! Non-fatal findings reported alongside decoded tokens.

use crate::error::ProtocolError;

/// What a [`Diagnostic`] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A token with a known length failed to decode and was skipped.
    SkippedToken {
        /// Token tag.
        tag: u8,
        /// Why the body could not be decoded.
        error: ProtocolError,
    },
    /// Bytes left undecoded after the token stream stopped.
    TrailingBytes,
    /// Header-block sub-header lengths disagree with the declared total.
    HeaderLengthMismatch,
    /// A header-block sub-header of unrecognized type.
    UnknownHeader {
        /// Raw sub-header type.
        header_type: u16,
    },
}

/// A problem found while decoding that did not stop decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Offset within the PDU.
    pub offset: usize,
    /// What was found.
    pub kind: DiagnosticKind,
    /// Expected length, for length mismatches.
    pub expected: Option<usize>,
    /// Observed length, for length mismatches.
    pub observed: Option<usize>,
}

impl Diagnostic {
    /// A diagnostic with no length context.
    #[must_use]
    pub fn new(offset: usize, kind: DiagnosticKind) -> Self {
        Self {
            offset,
            kind,
            expected: None,
            observed: None,
        }
    }

    /// A diagnostic recording an expected and observed length.
    #[must_use]
    pub fn mismatch(offset: usize, kind: DiagnosticKind, expected: usize, observed: usize) -> Self {
        Self {
            offset,
            kind,
            expected: Some(expected),
            observed: Some(observed),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            DiagnosticKind::SkippedToken { tag, error } => {
                write!(f, "token 0x{tag:02X} at offset {} skipped: {error}", self.offset)?;
            }
            DiagnosticKind::TrailingBytes => {
                write!(f, "undecoded bytes at offset {}", self.offset)?;
            }
            DiagnosticKind::HeaderLengthMismatch => {
                write!(f, "header block length mismatch at offset {}", self.offset)?;
            }
            DiagnosticKind::UnknownHeader { header_type } => {
                write!(f, "unknown header type {header_type} at offset {}", self.offset)?;
            }
        }
        if let (Some(expected), Some(observed)) = (self.expected, self.observed) {
            write!(f, " (expected {expected}, observed {observed})")?;
        }
        Ok(())
    }
}
