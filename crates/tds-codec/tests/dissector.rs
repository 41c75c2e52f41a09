//! Whole-conversation scenarios through the dissector.

#![allow(clippy::unwrap_used, clippy::panic)]

use proptest::prelude::*;
use tds_codec::{CodecError, DecoderConfig, Dissector, Event, MalformedFraming, Message, MessageBody};
use tds_testing::frames::{
    FrameBuilder, PRE_LOGIN, SQL_BATCH, TABULAR_RESULT, TDS7_LOGIN, split_pdu,
};
use tds_testing::tokens::{Column, TokenBuilder, values};
use tds_testing::utf16;
use tds_wire::{DecodedValue, EncryptionLevel, TdsVersion, Token, TokenStream};

fn login7(version_code: u32) -> Vec<u8> {
    let mut payload = vec![0u8; 94];
    payload[0..4].copy_from_slice(&94u32.to_le_bytes());
    payload[4..8].copy_from_slice(&version_code.to_le_bytes());
    payload
}

fn login_response() -> Vec<u8> {
    TokenBuilder::wide()
        .login_ack(0x7400_0004, "Microsoft SQL Server")
        .env_change_database("app", "master")
        .done(0, 0, 0)
        .build()
        .to_vec()
}

fn result_set(rows: i32) -> Vec<u8> {
    let mut builder = TokenBuilder::wide()
        .col_metadata(&[Column::int("id"), Column::nvarchar("name", Some(20))]);
    for id in 0..rows {
        let name = format!("row{id}");
        builder = builder.row(&[values::int(id), values::nvarchar(Some(name.as_str()))]);
    }
    builder.done(0x0010, 0xC1, rows as u64).build().to_vec()
}

fn tokens(message: &Message) -> &TokenStream {
    match &message.body {
        MessageBody::Tokens(stream) => stream,
        other => panic!("expected tokens, got {other:?}"),
    }
}

fn messages(events: Vec<Event>) -> Vec<Message> {
    events
        .into_iter()
        .filter_map(|event| match event {
            Event::Message(message) => Some(message),
            _ => None,
        })
        .collect()
}

#[test]
fn test_clear_text_login_and_query() {
    let mut dissector = Dissector::new(DecoderConfig::default());
    let id = ("10.0.0.5", 50123u16);

    // Pre-login: client asks, server declines encryption
    let request = FrameBuilder::new(PRE_LOGIN).build(&[
        0x00, 0x00, 0x0B, 0x00, 0x06, //
        0x01, 0x00, 0x11, 0x00, 0x01, //
        0xFF, //
        0x0F, 0x00, 0x07, 0xD0, 0x00, 0x00, //
        0x02,
    ]);
    assert!(dissector.identify(&id, 1433, &request));
    dissector.process_segment(id, &request);
    let response = FrameBuilder::new(TABULAR_RESULT)
        .build(&[0x01, 0x00, 0x06, 0x00, 0x01, 0xFF, 0x02]);
    let outcome = dissector.process_segment(id, &response);
    match &outcome.messages().next().unwrap().body {
        MessageBody::PreLogin(prelogin) => {
            assert_eq!(prelogin.encryption, Some(EncryptionLevel::NotSupported));
        }
        other => panic!("expected pre-login, got {other:?}"),
    }
    assert!(!dissector.conversation(&id).unwrap().encryption_negotiated());

    dissector.process_segment(id, &FrameBuilder::new(TDS7_LOGIN).build(&login7(0x7400_0004)));
    let outcome = dissector.process_segment(id, &FrameBuilder::new(TABULAR_RESULT).build(&login_response()));
    let login = messages(outcome.events);
    let stream = tokens(&login[0]);
    assert!(stream.is_complete(), "{:?}", stream.abort);
    assert!(matches!(stream.tokens[0], Token::LoginAck(_)));
    assert_eq!(
        dissector.conversation(&id).unwrap().state().negotiated_version(),
        TdsVersion::V7_4
    );

    let batch = FrameBuilder::new(SQL_BATCH).build(&utf16("SELECT id, name FROM t"));
    let outcome = dissector.process_segment(id, &batch);
    assert!(matches!(
        &outcome.messages().next().unwrap().body,
        MessageBody::SqlBatch(b) if b.sql == "SELECT id, name FROM t"
    ));

    // Result split over several frames, and the segment split mid-frame
    let frames: Vec<u8> = split_pdu(TABULAR_RESULT, 0, &result_set(3), 16).concat();
    let (head, tail) = frames.split_at(frames.len() - 4);
    let first = dissector.process_segment(id, head);
    assert!(first.events.is_empty());
    assert!(first.needed.is_some());

    let mut pending = head[first.consumed..].to_vec();
    pending.extend_from_slice(tail);
    let second = dissector.process_segment(id, &pending);
    assert_eq!(second.consumed, pending.len());

    let result = messages(second.events);
    assert_eq!(result.len(), 1);
    assert!(result[0].payload.len() > 16);
    let stream = tokens(&result[0]);
    assert!(stream.is_complete(), "{:?}", stream.abort);
    let rows: Vec<_> = stream
        .tokens
        .iter()
        .filter_map(|t| match t {
            Token::Row(row) => Some(&row.values),
            _ => None,
        })
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[2],
        &vec![
            DecodedValue::Int { width: 4, value: 2 },
            DecodedValue::Text("row2".to_string()),
        ]
    );
}

#[test]
fn test_tls_negotiation_passes_through() {
    let mut dissector = Dissector::new(DecoderConfig::default());
    let prelogin = [0x01, 0x00, 0x06, 0x00, 0x01, 0xFF, 0x01];
    dissector.process_segment(1u8, &FrameBuilder::new(PRE_LOGIN).build(&prelogin));
    dissector.process_segment(1u8, &FrameBuilder::new(TABULAR_RESULT).build(&prelogin));
    assert!(dissector.conversation(&1).unwrap().encryption_negotiated());

    let client_hello = tds_testing::tls_record(0x16, &[0x01; 32]);
    let outcome = dissector.process_segment(1u8, &FrameBuilder::new(PRE_LOGIN).build(&client_hello));
    assert!(matches!(outcome.events[..], [Event::TlsHandshake { channel: 0, len: 37 }]));

    let application_data = tds_testing::tls_record(0x17, &[0x5A; 64]);
    let outcome = dissector.process_segment(1u8, &application_data);
    assert_eq!(outcome.consumed, application_data.len());
    assert!(matches!(outcome.events[..], [Event::Encrypted { len: 69 }]));
}

#[test]
fn test_reset_request_drops_metadata() {
    let mut dissector = Dissector::new(DecoderConfig::default().version_hint(TdsVersion::V7_4));
    dissector.process_segment(0u8, &FrameBuilder::new(TABULAR_RESULT).build(&result_set(1)));

    let batch = FrameBuilder::new(SQL_BATCH)
        .status(0x01 | 0x08)
        .build(&utf16("SELECT 1"));
    dissector.process_segment(0u8, &batch);

    let rows_only = TokenBuilder::wide().row(&[values::int(5), values::nvarchar(None)]).build();
    let outcome = dissector.process_segment(0u8, &FrameBuilder::new(TABULAR_RESULT).build(&rows_only));
    let stream = tokens(outcome.messages().next().unwrap());
    assert!(stream.tokens.is_empty());
    assert!(!stream.is_complete());
    assert!(stream.consumed < rows_only.len());
}

#[test]
fn test_channels_assemble_independently() {
    let mut dissector = Dissector::new(DecoderConfig::default());
    let a = split_pdu(TABULAR_RESULT, 1, &TokenBuilder::new().done(0, 0, 1).build(), 4);
    let b = split_pdu(TABULAR_RESULT, 2, &TokenBuilder::new().done(0, 0, 2).build(), 4);
    assert_eq!(a.len(), 3);

    let mut interleaved = Vec::new();
    for (x, y) in a.iter().zip(&b) {
        interleaved.extend_from_slice(x);
        interleaved.extend_from_slice(y);
    }
    let outcome = dissector.process_segment(0u8, &interleaved);
    let done: Vec<_> = outcome
        .messages()
        .map(|m| match &tokens(m).tokens[..] {
            [Token::Done(d)] => (m.channel, d.row_count),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(done, vec![(1, 1), (2, 2)]);
}

#[test]
fn test_sequence_gap_resyncs_on_end_of_message() {
    let mut dissector = Dissector::new(DecoderConfig::default());
    let first = split_pdu(TABULAR_RESULT, 0, &TokenBuilder::new().done(0, 0, 1).build(), 4);
    // Drop the middle frame
    let mut data = first[0].to_vec();
    data.extend_from_slice(&first[2]);
    let outcome = dissector.process_segment(0u8, &data);
    assert!(matches!(
        outcome.events[..],
        [Event::Error(CodecError::Malformed(MalformedFraming::OutOfSequence {
            channel: 0,
            expected: 2,
            observed: 3,
        }))]
    ));

    // The next PDU decodes normally
    let next = FrameBuilder::new(TABULAR_RESULT).build(&TokenBuilder::new().done(0, 0, 9).build());
    let outcome = dissector.process_segment(0u8, &next);
    assert!(matches!(
        &tokens(outcome.messages().next().unwrap()).tokens[..],
        [Token::Done(d)] if d.row_count == 9
    ));
}

#[test]
fn test_malformed_header_discards_partial_pdu() {
    let mut dissector = Dissector::new(DecoderConfig::default());
    let mut segment = FrameBuilder::new(TABULAR_RESULT)
        .status(0)
        .build(&[0xFD, 0x00, 0x00, 0x00])
        .to_vec();
    segment.extend_from_slice(&FrameBuilder::new(TABULAR_RESULT).build_with_length(2, &[]));

    let outcome = dissector.process_segment(0u8, &segment);
    assert_eq!(outcome.consumed, segment.len());
    assert!(matches!(
        outcome.events[..],
        [Event::Error(CodecError::Malformed(MalformedFraming::LengthBelowHeader { declared: 2 }))]
    ));

    // The continuation must not be stitched onto the dropped fragment
    let continuation = FrameBuilder::new(TABULAR_RESULT)
        .sequence(2)
        .build(&[0x00, 0x05, 0x00, 0x00, 0x00]);
    let outcome = dissector.process_segment(0u8, &continuation);
    let message = outcome.messages().next().unwrap();
    assert_eq!(&message.payload[..], &[0x00, 0x05, 0x00, 0x00, 0x00]);
    assert!(!tokens(message).tokens.iter().any(|t| matches!(t, Token::Done(_))));
}

#[test]
fn test_oversized_pdu_rejected() {
    let mut dissector = Dissector::new(DecoderConfig::default().max_pdu_size(20));
    let frames: Vec<u8> = split_pdu(TABULAR_RESULT, 0, &result_set(2), 16).concat();
    let outcome = dissector.process_segment(0u8, &frames);
    assert!(outcome.events.iter().any(|e| matches!(
        e,
        Event::Error(CodecError::PduTooLarge { max: 20, .. })
    )));
    assert_eq!(outcome.messages().count(), 0);
}

#[test]
fn test_passthrough_treats_frames_as_pdus() {
    let mut dissector = Dissector::new(DecoderConfig::default().reassemble(false));
    let frames: Vec<u8> = split_pdu(SQL_BATCH, 0, &utf16("SELECT 1"), 8).concat();
    let outcome = dissector.process_segment(0u8, &frames);
    assert_eq!(outcome.messages().count(), 2);
}

fn feed_in_chunks(data: &[u8], sizes: &[usize]) -> Vec<Message> {
    let mut dissector = Dissector::new(DecoderConfig::default());
    let mut pending = Vec::new();
    let mut collected = Vec::new();
    let mut rest = data;
    let mut sizes = sizes.iter().cycle();

    while !rest.is_empty() {
        let take = sizes.next().copied().unwrap_or(rest.len()).min(rest.len());
        pending.extend_from_slice(&rest[..take]);
        rest = &rest[take..];

        let outcome = dissector.process_segment(0u8, &pending);
        pending.drain(..outcome.consumed);
        collected.extend(messages(outcome.events));
    }
    assert!(pending.is_empty());
    collected
}

proptest! {
    #[test]
    fn segment_boundaries_do_not_change_results(
        sizes in prop::collection::vec(1usize..48, 1..16),
        max_payload in 4usize..64,
        rows in 0i32..6,
    ) {
        let mut data: Vec<u8> = split_pdu(TABULAR_RESULT, 0, &login_response(), max_payload).concat();
        data.extend(split_pdu(TABULAR_RESULT, 0, &result_set(rows), max_payload).concat());

        let whole = feed_in_chunks(&data, &[data.len()]);
        let chunked = feed_in_chunks(&data, &sizes);

        prop_assert_eq!(whole.len(), 2);
        prop_assert!(tokens(&whole[1]).is_complete());
        prop_assert_eq!(whole, chunked);
    }
}
