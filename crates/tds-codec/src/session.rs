//! Conversation-keyed dissection.
//!
//! A [`Dissector`] owns one [`Conversation`] per caller-chosen key (for a
//! capture tool, typically the TCP 4-tuple). Each conversation carries its
//! own reassembly buffers and token-decoder state; nothing is shared between
//! conversations except the read-only [`DecoderConfig`].

use std::hash::Hash;
use std::sync::Arc;

use bytes::Bytes;
use hashbrown::HashMap;
use tds_wire::layout::FRAME_HEADER_SIZE;
use tds_wire::{
    ConversationState, DecodeOptions, Diagnostic, FrameHeader, OpaqueRequest, PacketType,
    PreLogin, ProtocolError, SqlBatch, TdsVersion, TokenStream,
};

use crate::config::DecoderConfig;
use crate::error::{CodecError, MalformedFraming};
use crate::frame::{FrameKind, FrameResult, decode_frame};
use crate::heuristic::Heuristic;
use crate::reassembly::{Pdu, Reassembler};
use crate::tls::is_tls_record;

/// Interpreted content of a PDU.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Token stream of a tabular response.
    Tokens(TokenStream),
    /// Pre-login request or response.
    PreLogin(PreLogin),
    /// Login request; the version it announces, when recognizable.
    Login {
        /// Announced version.
        version: Option<TdsVersion>,
    },
    /// SQL batch request.
    SqlBatch(SqlBatch),
    /// RPC or transaction-manager request.
    Request(OpaqueRequest),
    /// Attention signal.
    Attention,
    /// A PDU kind whose payload is not interpreted.
    Opaque,
    /// A payload that failed to decode.
    Invalid(ProtocolError),
}

/// A decoded PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Channel the PDU arrived on.
    pub channel: u16,
    /// Raw packet type.
    pub kind: u8,
    /// Reassembled payload.
    pub payload: Bytes,
    /// Interpreted content.
    pub body: MessageBody,
    /// Findings from request header decoding.
    pub diagnostics: Vec<Diagnostic>,
}

impl Message {
    /// Typed packet kind, `None` if unrecognized.
    #[must_use]
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_u8(self.kind)
    }
}

/// Something that happened while processing a segment.
#[derive(Debug)]
pub enum Event {
    /// A complete PDU.
    Message(Message),
    /// A frame carrying a TLS handshake record, passed through.
    TlsHandshake {
        /// Channel of the frame.
        channel: u16,
        /// Payload length.
        len: usize,
    },
    /// Raw TLS traffic outside TDS framing, passed through.
    Encrypted {
        /// Bytes passed through.
        len: usize,
    },
    /// A recoverable framing or reassembly failure.
    Error(CodecError),
}

/// Result of [`Dissector::process_segment`].
#[derive(Debug, Default)]
pub struct SegmentOutcome {
    /// Events in wire order.
    pub events: Vec<Event>,
    /// Bytes of the segment that were used or deliberately dropped.
    pub consumed: usize,
    /// Further bytes needed to complete the trailing frame, if any.
    pub needed: Option<usize>,
}

impl SegmentOutcome {
    /// Decoded messages, skipping other events.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.events.iter().filter_map(|event| match event {
            Event::Message(message) => Some(message),
            _ => None,
        })
    }
}

/// Outcome of [`Dissector::reassemble`].
#[derive(Debug)]
pub enum Reassembled<'a> {
    /// This many more bytes are needed before the next frame is complete.
    NeedMoreBytes(usize),
    /// The bytes do not start a frame.
    Malformed(MalformedFraming),
    /// One frame was consumed.
    Frame {
        /// Header of the consumed frame.
        header: FrameHeader,
        /// Payload classification.
        kind: FrameKind,
        /// The PDU this frame completed, if any.
        pdu: Result<Option<Pdu>, CodecError>,
        /// Bytes after the frame.
        rest: &'a [u8],
    },
}

/// Per-connection state.
#[derive(Debug)]
pub struct Conversation {
    state: ConversationState,
    reassembler: Reassembler,
    frames_seen: u64,
    awaiting_prelogin_response: bool,
    encryption_negotiated: bool,
}

impl Conversation {
    fn new(config: &DecoderConfig, options: &DecodeOptions) -> Self {
        let reassembler = Reassembler::new(config.max_pdu_size);
        Self {
            state: ConversationState::with_options(options),
            reassembler: if config.reassemble {
                reassembler
            } else {
                reassembler.passthrough()
            },
            frames_seen: 0,
            awaiting_prelogin_response: false,
            encryption_negotiated: false,
        }
    }

    /// Token-decoder state.
    #[must_use]
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Mutable token-decoder state, e.g. to force a version.
    pub fn state_mut(&mut self) -> &mut ConversationState {
        &mut self.state
    }

    /// Frames seen on this conversation.
    #[must_use]
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Whether pre-login negotiated a TLS handshake.
    #[must_use]
    pub fn encryption_negotiated(&self) -> bool {
        self.encryption_negotiated
    }

    fn reassemble<'a>(&mut self, data: &'a [u8]) -> Reassembled<'a> {
        let (frame, rest) = match decode_frame(data) {
            FrameResult::NeedMoreBytes(needed) => return Reassembled::NeedMoreBytes(needed),
            FrameResult::Malformed(reason) => {
                // The header still names its channel; that partial PDU cannot continue
                if let Some(header) = FrameHeader::parse(data) {
                    if self.reassembler.discard(header.channel) {
                        tracing::debug!(channel = header.channel, "partial PDU dropped after malformed frame");
                    }
                }
                return Reassembled::Malformed(reason);
            }
            FrameResult::Frame(frame, rest) => (frame, rest),
        };
        self.frames_seen += 1;

        // Continuation fragments are never handshakes, whatever they start with
        let kind = match frame.kind {
            FrameKind::TlsHandshake if self.reassembler.has_partial(frame.header.channel) => {
                FrameKind::Tds
            }
            kind => kind,
        };
        let pdu = match kind {
            FrameKind::TlsHandshake => {
                tracing::debug!(
                    channel = frame.header.channel,
                    len = frame.payload.len(),
                    "TLS handshake frame passed through"
                );
                Ok(None)
            }
            FrameKind::Tds => self.reassembler.push(&frame),
        };

        Reassembled::Frame {
            header: frame.header,
            kind,
            pdu,
            rest,
        }
    }

    fn decode_tokens(&mut self, pdu: &[u8], options: &DecodeOptions) -> TokenStream {
        tds_wire::decode_tokens(pdu, &mut self.state, options)
    }

    fn dispatch(&mut self, pdu: Pdu, options: &DecodeOptions) -> Message {
        if pdu.requests_reset() {
            tracing::debug!(channel = pdu.channel, "connection reset, column metadata cleared");
            self.state.reset();
        }

        let mut diagnostics = Vec::new();
        let body = match pdu.packet_type() {
            // The server answers pre-login with a tabular-result PDU
            Some(PacketType::TabularResult) if self.awaiting_prelogin_response => {
                self.awaiting_prelogin_response = false;
                match PreLogin::decode(&pdu.payload) {
                    Ok(prelogin) => self.record_prelogin(prelogin),
                    Err(_) => MessageBody::Tokens(self.decode_tokens(&pdu.payload, options)),
                }
            }
            Some(kind) if kind.carries_tokens() => {
                MessageBody::Tokens(self.decode_tokens(&pdu.payload, options))
            }
            Some(PacketType::PreLogin) => {
                self.awaiting_prelogin_response = true;
                match PreLogin::decode(&pdu.payload) {
                    Ok(prelogin) => self.record_prelogin(prelogin),
                    Err(err) => MessageBody::Invalid(err),
                }
            }
            Some(kind @ (PacketType::Tds7Login | PacketType::PreTds7Login)) => {
                let version = Heuristic::login_marker(kind, &pdu.payload)
                    .filter(|v| *v != TdsVersion::Unknown);
                if let Some(version) = version {
                    if self.state.negotiated_version() == TdsVersion::Unknown {
                        tracing::debug!(%version, "version taken from login request");
                        self.state.set_version(version);
                    }
                }
                MessageBody::Login { version }
            }
            Some(PacketType::SqlBatch) => {
                match SqlBatch::decode(&pdu.payload, self.state.effective_version()) {
                    Ok((batch, found)) => {
                        diagnostics = found;
                        MessageBody::SqlBatch(batch)
                    }
                    Err(err) => MessageBody::Invalid(err),
                }
            }
            Some(PacketType::Rpc | PacketType::TransactionManager) => {
                let (request, found) = OpaqueRequest::decode(&pdu.payload);
                diagnostics = found;
                MessageBody::Request(request)
            }
            Some(PacketType::Attention) => MessageBody::Attention,
            _ => MessageBody::Opaque,
        };

        Message {
            channel: pdu.channel,
            kind: pdu.kind,
            payload: pdu.payload,
            body,
            diagnostics,
        }
    }

    fn record_prelogin(&mut self, prelogin: PreLogin) -> MessageBody {
        if prelogin.expects_tls() {
            tracing::debug!(encryption = ?prelogin.encryption, "TLS handshake expected");
            self.encryption_negotiated = true;
        }
        MessageBody::PreLogin(prelogin)
    }

    fn process_segment(&mut self, segment: &[u8], options: &DecodeOptions) -> SegmentOutcome {
        let mut outcome = SegmentOutcome::default();

        // Packet types never fall in the TLS content-type range
        if is_tls_record(segment) && PacketType::from_u8(segment[0]).is_none() {
            tracing::debug!(len = segment.len(), "encrypted segment passed through");
            outcome.events.push(Event::Encrypted { len: segment.len() });
            outcome.consumed = segment.len();
            return outcome;
        }

        let mut rest = segment;
        while !rest.is_empty() {
            match self.reassemble(rest) {
                Reassembled::NeedMoreBytes(needed) => {
                    outcome.needed = Some(needed);
                    break;
                }
                Reassembled::Malformed(reason) => {
                    tracing::warn!(%reason, dropped = rest.len(), "malformed frame, dropping rest of segment");
                    outcome.events.push(Event::Error(reason.into()));
                    outcome.consumed = segment.len();
                    return outcome;
                }
                Reassembled::Frame {
                    header,
                    kind,
                    pdu,
                    rest: next,
                } => {
                    match pdu {
                        Ok(Some(pdu)) => {
                            let message = self.dispatch(pdu, options);
                            outcome.events.push(Event::Message(message));
                        }
                        Ok(None) if kind == FrameKind::TlsHandshake => {
                            outcome.events.push(Event::TlsHandshake {
                                channel: header.channel,
                                len: usize::from(header.length) - FRAME_HEADER_SIZE,
                            });
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(%err, channel = header.channel, "reassembly failed");
                            outcome.events.push(Event::Error(err));
                        }
                    }
                    rest = next;
                    outcome.consumed = segment.len() - rest.len();
                }
            }
        }

        outcome
    }
}

/// Conversation-keyed decoder session.
#[derive(Debug)]
pub struct Dissector<K> {
    config: Arc<DecoderConfig>,
    options: DecodeOptions,
    conversations: HashMap<K, Conversation>,
}

impl<K: Eq + Hash> Dissector<K> {
    /// Create a session with its own configuration.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    /// Create a session sharing `config` with other sessions.
    #[must_use]
    pub fn with_shared_config(config: Arc<DecoderConfig>) -> Self {
        Self {
            options: config.decode_options(),
            config,
            conversations: HashMap::new(),
        }
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Number of tracked conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether no conversation is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// State of a tracked conversation.
    #[must_use]
    pub fn conversation(&self, id: &K) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Mutable state of a tracked conversation.
    pub fn conversation_mut(&mut self, id: &K) -> Option<&mut Conversation> {
        self.conversations.get_mut(id)
    }

    /// Forget a conversation, dropping its partial PDUs.
    pub fn close(&mut self, id: &K) -> Option<Conversation> {
        self.conversations.remove(id)
    }

    /// Whether `data` on `port` looks like TDS for conversation `id`.
    ///
    /// The login check applies until the conversation has seen a frame.
    #[must_use]
    pub fn identify(&self, id: &K, port: u16, data: &[u8]) -> bool {
        let first_frame = self
            .conversations
            .get(id)
            .is_none_or(|c| c.frames_seen == 0);
        Heuristic::matches_port(&self.config, port, data, first_frame)
    }

    fn entry(&mut self, id: K) -> &mut Conversation {
        let (config, options) = (&self.config, &self.options);
        self.conversations
            .entry(id)
            .or_insert_with(|| Conversation::new(config, options))
    }

    /// Consume one frame from the front of `data`.
    ///
    /// A malformed header discards the partial PDU of the channel it names.
    pub fn reassemble<'a>(&mut self, id: K, data: &'a [u8]) -> Reassembled<'a> {
        self.entry(id).reassemble(data)
    }

    /// Decode an assembled token-stream PDU on conversation `id`.
    pub fn decode_tokens(&mut self, id: K, pdu: &[u8]) -> TokenStream {
        let options = self.options;
        self.entry(id).decode_tokens(pdu, &options)
    }

    /// Decode every complete frame in `segment`.
    ///
    /// Bytes past [`SegmentOutcome::consumed`] belong to an incomplete frame;
    /// the caller keeps them and passes them again with the next segment.
    pub fn process_segment(&mut self, id: K, segment: &[u8]) -> SegmentOutcome {
        let options = self.options;
        self.entry(id).process_segment(segment, &options)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tds_testing::frames::{FrameBuilder, PRE_LOGIN, SQL_BATCH, TABULAR_RESULT, split_pdu};
    use tds_testing::tokens::TokenBuilder;
    use tds_testing::{tls_record, utf16};
    use tds_wire::Token;

    #[test]
    fn test_split_response_yields_one_message() {
        let mut dissector = Dissector::new(DecoderConfig::default());
        let payload = TokenBuilder::new().done(0, 0, 3).done(0, 0, 4).build();
        let frames: Vec<u8> = split_pdu(TABULAR_RESULT, 9, &payload, 5).concat();

        let outcome = dissector.process_segment(1u32, &frames);
        assert_eq!(outcome.consumed, frames.len());
        assert_eq!(outcome.needed, None);
        let messages: Vec<_> = outcome.messages().collect();
        assert_eq!(messages.len(), 1);
        let MessageBody::Tokens(stream) = &messages[0].body else {
            panic!("expected tokens");
        };
        assert_eq!(stream.tokens.len(), 2);
    }

    #[test]
    fn test_partial_frame_reports_shortfall() {
        let mut dissector = Dissector::new(DecoderConfig::default());
        let frame = FrameBuilder::new(TABULAR_RESULT).build(&TokenBuilder::new().done(0, 0, 1).build());
        let outcome = dissector.process_segment("c", &frame[..12]);
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.consumed, 0);
        assert_eq!(outcome.needed, Some(5));
    }

    #[test]
    fn test_prelogin_response_and_handshake() {
        let mut dissector = Dissector::new(DecoderConfig::default());
        let request = FrameBuilder::new(PRE_LOGIN).build(&[0x00, 0x00, 0x06, 0x00, 0x00, 0xFF]);
        let response = FrameBuilder::new(TABULAR_RESULT)
            .build(&[0x01, 0x00, 0x06, 0x00, 0x01, 0xFF, 0x01]);

        dissector.process_segment(7u8, &request);
        let outcome = dissector.process_segment(7u8, &response);
        let message = outcome.messages().next().unwrap();
        assert!(matches!(&message.body, MessageBody::PreLogin(p) if p.expects_tls()));
        assert!(dissector.conversation(&7).unwrap().encryption_negotiated());

        let handshake = FrameBuilder::new(PRE_LOGIN).build(&tls_record(0x16, &[0x01, 0x02]));
        let outcome = dissector.process_segment(7u8, &handshake);
        assert!(matches!(outcome.events[..], [Event::TlsHandshake { len: 7, .. }]));

        let encrypted = tls_record(0x17, &[0xAA; 16]);
        let outcome = dissector.process_segment(7u8, &encrypted);
        assert!(matches!(outcome.events[..], [Event::Encrypted { len: 21 }]));
    }

    #[test]
    fn test_malformed_frame_drops_segment() {
        let mut dissector = Dissector::new(DecoderConfig::default());
        let mut data = FrameBuilder::new(TABULAR_RESULT).build(&TokenBuilder::new().done(0, 0, 1).build()).to_vec();
        data.extend_from_slice(&FrameBuilder::new(TABULAR_RESULT).build_with_length(2, &[]));

        let outcome = dissector.process_segment(0u8, &data);
        assert_eq!(outcome.consumed, data.len());
        assert!(matches!(outcome.events[0], Event::Message(_)));
        assert!(matches!(
            outcome.events[1],
            Event::Error(CodecError::Malformed(MalformedFraming::LengthBelowHeader { declared: 2 }))
        ));
    }

    #[test]
    fn test_sql_batch_and_reset() {
        let mut dissector = Dissector::new(DecoderConfig::default().version_hint(TdsVersion::V7_4));
        let metadata = TokenBuilder::wide()
            .col_metadata(&[tds_testing::Column::int("n")])
            .build();
        dissector.process_segment(1u8, &FrameBuilder::new(TABULAR_RESULT).build(&metadata));
        assert!(dissector.conversation(&1).unwrap().state().column_set().is_some());

        let batch = FrameBuilder::new(SQL_BATCH)
            .status(0x01 | 0x08)
            .build(&utf16("SELECT 1"));
        let outcome = dissector.process_segment(1u8, &batch);
        let message = outcome.messages().next().unwrap();
        assert!(matches!(&message.body, MessageBody::SqlBatch(b) if b.sql == "SELECT 1"));
        assert!(dissector.conversation(&1).unwrap().state().column_set().is_none());
    }

    #[test]
    fn test_login_sets_version_before_ack() {
        let mut dissector = Dissector::new(DecoderConfig::default());
        let mut login = vec![0u8; 40];
        login[4..8].copy_from_slice(&0x7400_0004u32.to_le_bytes());
        let frame = FrameBuilder::new(tds_testing::frames::TDS7_LOGIN).build(&login);

        assert!(dissector.identify(&3u8, 1433, &frame));
        let outcome = dissector.process_segment(3u8, &frame);
        assert!(matches!(
            outcome.messages().next().unwrap().body,
            MessageBody::Login { version: Some(TdsVersion::V7_4) }
        ));

        let stream = dissector.decode_tokens(3u8, &TokenBuilder::wide().done(0, 0, 8).build());
        assert!(matches!(&stream.tokens[..], [Token::Done(d)] if d.row_count == 8));
        dissector.close(&3);
        assert!(dissector.is_empty());
    }
}
