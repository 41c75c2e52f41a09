//! Token stream decoding.
//!
//! [`decode_tokens`] walks one PDU tag by tag. Each tag's [`SizeRule`]
//! decides how a failure is contained:
//!
//! - fixed and length-prefixed tokens are decoded from a bounded sub-reader,
//!   so a bad body is reported as a [`Diagnostic`] and the loop moves on;
//! - computed-size tokens (metadata, rows, return values) have no known end,
//!   so any failure aborts the rest of the PDU.
//!
//! Tokens decoded before an abort are always returned.

use thiserror::Error;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{FailureScope, ProtocolError};
use crate::reader::Reader;
use crate::state::ConversationState;
use crate::token::{SizeRule, Token, TokenType, decode_body};
use crate::value::DecodeOptions;

/// Why token production for a PDU stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortReason {
    /// A tag that is not in the token table.
    #[error("unknown token tag 0x{tag:02X} at offset {offset}")]
    UnknownToken {
        /// Raw tag.
        tag: u8,
        /// Offset of the tag.
        offset: usize,
    },
    /// A row-family token with no column set to decode it against.
    #[error("token 0x{tag:02X} at offset {offset} has no column metadata")]
    DependentStateViolation {
        /// Raw tag.
        tag: u8,
        /// Offset of the tag.
        offset: usize,
    },
    /// A value inside a token of unknown extent could not be decoded.
    #[error("invalid value in token 0x{tag:02X}: {error}")]
    InvalidValueEncoding {
        /// Raw tag.
        tag: u8,
        /// Underlying failure.
        error: ProtocolError,
    },
    /// A token runs past the end of the PDU.
    #[error("token 0x{tag:02X} truncated: {error}")]
    Truncated {
        /// Raw tag.
        tag: u8,
        /// Underlying failure.
        error: ProtocolError,
    },
}

impl AbortReason {
    fn from_error(tag: u8, error: ProtocolError) -> Self {
        match error {
            ProtocolError::UnknownToken { tag, offset } => Self::UnknownToken { tag, offset },
            ProtocolError::DependentState { tag, offset } => {
                Self::DependentStateViolation { tag, offset }
            }
            error if error.scope() == FailureScope::Token => Self::Truncated { tag, error },
            error => Self::InvalidValueEncoding { tag, error },
        }
    }
}

/// Result of decoding one PDU.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    /// Tokens in wire order.
    pub tokens: Vec<Token>,
    /// Set when decoding stopped before the end of the PDU.
    pub abort: Option<AbortReason>,
    /// Non-fatal findings.
    pub diagnostics: Vec<Diagnostic>,
    /// Bytes covered by the returned tokens and skipped bodies.
    pub consumed: usize,
}

impl TokenStream {
    /// Whether the whole PDU was decoded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.abort.is_none()
    }
}

/// Decode every token in `pdu`, updating `state` as tokens are produced.
pub fn decode_tokens(
    pdu: &[u8],
    state: &mut ConversationState,
    options: &DecodeOptions,
) -> TokenStream {
    let mut src = Reader::new(pdu).with_byte_order(state.byte_order());
    let mut stream = TokenStream::default();

    while let Some(tag) = src.peek_u8() {
        let offset = src.offset();
        match decode_one(&mut src, tag, state, options) {
            Ok(Step::Token(token)) => {
                tracing::trace!(
                    tag = format_args!("0x{tag:02X}"),
                    offset,
                    size = src.offset() - offset,
                    "decoded token"
                );
                state.on_token(&token);
                stream.tokens.push(token);
                // A login acknowledgement can switch the byte order
                src = src.with_byte_order(state.byte_order());
            }
            Ok(Step::Skipped(error)) => {
                tracing::debug!(tag = format_args!("0x{tag:02X}"), offset, %error, "token skipped");
                stream.diagnostics.push(Diagnostic::new(
                    offset,
                    DiagnosticKind::SkippedToken { tag, error },
                ));
            }
            Err(reason) => {
                let trailing = pdu.len() - offset;
                tracing::warn!(%reason, offset, trailing, "token stream aborted");
                stream.diagnostics.push(Diagnostic::mismatch(
                    offset,
                    DiagnosticKind::TrailingBytes,
                    0,
                    trailing,
                ));
                stream.abort = Some(reason);
                stream.consumed = offset;
                return stream;
            }
        }
    }

    stream.consumed = pdu.len();
    stream
}

enum Step {
    Token(Token),
    Skipped(ProtocolError),
}

fn decode_one(
    src: &mut Reader<'_>,
    tag: u8,
    state: &ConversationState,
    options: &DecodeOptions,
) -> Result<Step, AbortReason> {
    let offset = src.offset();
    let kind = TokenType::from_u8(tag).ok_or(AbortReason::UnknownToken { tag, offset })?;
    src.skip(1)
        .map_err(|error| AbortReason::from_error(tag, error))?;

    let bounded = match kind.size_rule(state.effective_version()) {
        SizeRule::Fixed(size) => src.sub_reader(size),
        SizeRule::Length(width) => read_length(src, width).and_then(|len| src.sub_reader(len)),
        SizeRule::Computed => {
            return decode_body(kind, offset, src, state, options)
                .map(Step::Token)
                .map_err(|error| AbortReason::from_error(tag, error));
        }
    };

    let mut body = bounded.map_err(|error| AbortReason::Truncated { tag, error })?;
    match decode_body(kind, offset, &mut body, state, options) {
        Ok(token) => Ok(Step::Token(token)),
        Err(error) => Ok(Step::Skipped(error)),
    }
}

fn read_length(src: &mut Reader<'_>, width: usize) -> Result<usize, ProtocolError> {
    Ok(match width {
        1 => usize::from(src.read_u8()?),
        2 => usize::from(src.read_u16()?),
        _ => src.read_u32()? as usize,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::token::DoneStatus;
    use crate::value::DecodedValue;
    use crate::version::TdsVersion;

    fn decode(pdu: &[u8], state: &mut ConversationState) -> TokenStream {
        decode_tokens(pdu, state, &DecodeOptions::default())
    }

    const DONE_V71: [u8; 9] = [0xFD, 0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00];

    #[test]
    fn test_single_done() {
        let mut state = ConversationState::new();
        let stream = decode(&DONE_V71, &mut state);
        assert!(stream.is_complete());
        assert_eq!(stream.consumed, DONE_V71.len());
        match &stream.tokens[..] {
            [Token::Done(done)] => {
                assert_eq!(done.status, DoneStatus::empty());
                assert_eq!(done.cur_cmd, 0);
                assert_eq!(done.row_count, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tag_keeps_earlier_tokens() {
        let mut pdu = DONE_V71.to_vec();
        pdu.extend_from_slice(&[0x05, 0x01, 0x02]);
        let mut state = ConversationState::new();
        let stream = decode(&pdu, &mut state);
        assert_eq!(stream.tokens.len(), 1);
        assert_eq!(
            stream.abort,
            Some(AbortReason::UnknownToken { tag: 0x05, offset: 9 })
        );
        assert_eq!(stream.consumed, 9);
        let trailing = stream.diagnostics.last().unwrap();
        assert_eq!(trailing.kind, DiagnosticKind::TrailingBytes);
        assert_eq!(trailing.observed, Some(3));
    }

    #[test]
    fn test_row_without_metadata() {
        let pdu = [0xD1, 0x01, 0x00, 0x00, 0x00];
        let mut state = ConversationState::new();
        let stream = decode(&pdu, &mut state);
        assert!(stream.tokens.is_empty());
        assert_eq!(
            stream.abort,
            Some(AbortReason::DependentStateViolation { tag: 0xD1, offset: 0 })
        );
    }

    #[test]
    fn test_bad_length_prefixed_body_is_skipped() {
        // ENVCHANGE declaring a 1-byte body that holds only the type
        let mut pdu = vec![0xE3, 0x01, 0x00, 0x01];
        pdu.extend_from_slice(&DONE_V71);
        let mut state = ConversationState::new();
        let stream = decode(&pdu, &mut state);
        assert!(stream.is_complete());
        assert_eq!(stream.tokens.len(), 1);
        assert!(matches!(stream.tokens[0], Token::Done(_)));
        assert!(matches!(
            stream.diagnostics[0].kind,
            DiagnosticKind::SkippedToken { tag: 0xE3, .. }
        ));
    }

    #[test]
    fn test_length_past_end_aborts() {
        let pdu = [0xE3, 0x40, 0x00, 0x01];
        let mut state = ConversationState::new();
        let stream = decode(&pdu, &mut state);
        assert!(matches!(
            stream.abort,
            Some(AbortReason::Truncated { tag: 0xE3, .. })
        ));
    }

    #[test]
    fn test_login_ack_widens_done() {
        let mut pdu = vec![0xAD, 0x0A, 0x00, 0x01, 0x74, 0x00, 0x00, 0x04, 0x00, 16, 0, 0, 0];
        pdu.extend_from_slice(&[0xFD, 0x10, 0x00, 0xC1, 0x00]);
        pdu.extend_from_slice(&7u64.to_le_bytes());
        let mut state = ConversationState::new();
        let stream = decode(&pdu, &mut state);
        assert!(stream.is_complete(), "{:?}", stream.abort);
        assert_eq!(state.negotiated_version(), TdsVersion::V7_4);
        match &stream.tokens[1] {
            Token::Done(done) => {
                assert_eq!(done.row_count, 7);
                assert!(done.status.contains(DoneStatus::COUNT));
                assert_eq!(done.cur_cmd, 0xC1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_metadata_then_rows() {
        // Two columns: INT NOT NULL "a", INTN(4) "b"
        let mut pdu = vec![0x81, 0x02, 0x00];
        pdu.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x38, 0x01, b'a', 0x00]);
        pdu.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x26, 0x04, 0x01, b'b', 0x00]);
        // ROW: 7, NULL
        pdu.extend_from_slice(&[0xD1, 0x07, 0x00, 0x00, 0x00, 0x00]);
        // NBCROW with column 1 omitted
        pdu.extend_from_slice(&[0xD2, 0x02, 0x09, 0x00, 0x00, 0x00]);

        let mut state = ConversationState::new();
        state.set_version(TdsVersion::V7_4);
        let stream = decode(&pdu, &mut state);
        assert!(stream.is_complete(), "{:?}", stream.abort);
        assert_eq!(stream.tokens.len(), 3);

        let Token::Row(row) = &stream.tokens[1] else {
            panic!("expected row");
        };
        assert_eq!(row.values[0], DecodedValue::Int { width: 4, value: 7 });
        assert!(row.values[1].is_null());

        let Token::NbcRow(row) = &stream.tokens[2] else {
            panic!("expected nbcrow");
        };
        assert_eq!(row.values[0], DecodedValue::Int { width: 4, value: 9 });
        assert!(row.values[1].is_null());
        assert!(row.is_null(1));
        assert_eq!(state.column_set().unwrap().len(), 2);
    }

    #[test]
    fn test_bad_value_in_row_aborts() {
        // INTN(4) column receiving a 3-byte value
        let mut pdu = vec![0x81, 0x01, 0x00];
        pdu.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x26, 0x04, 0x00]);
        pdu.extend_from_slice(&[0xD1, 0x03, 0x01, 0x02, 0x03]);
        pdu.extend_from_slice(&DONE_V71);

        let mut state = ConversationState::new();
        let stream = decode(&pdu, &mut state);
        assert_eq!(stream.tokens.len(), 1);
        assert!(matches!(
            stream.abort,
            Some(AbortReason::InvalidValueEncoding { tag: 0xD1, .. })
        ));
    }
}
