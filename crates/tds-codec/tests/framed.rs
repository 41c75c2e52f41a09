//! The frame decoder driven through `FramedRead`.

#![allow(clippy::unwrap_used)]

use futures_util::StreamExt;
use tds_codec::{FrameCodec, FrameKind, Reassembler};
use tds_testing::frames::{PRE_LOGIN, TABULAR_RESULT, split_pdu};
use tds_testing::tokens::TokenBuilder;
use tds_testing::{FrameBuilder, tls_record};
use tokio_util::codec::FramedRead;

#[tokio::test]
async fn test_framed_read_reassembles_pdu() {
    let payload = TokenBuilder::new().done(0x0001, 0, 1).done(0, 0, 2).build();
    let mut wire: Vec<u8> = split_pdu(TABULAR_RESULT, 3, &payload, 5).concat();
    wire.extend_from_slice(&FrameBuilder::new(PRE_LOGIN).build(&tls_record(0x16, &[0; 4])));

    let mut frames = FramedRead::new(wire.as_slice(), FrameCodec::new());
    let mut reassembler = Reassembler::new(1 << 16);
    let mut pdus = Vec::new();
    let mut handshakes = 0;

    while let Some(frame) = frames.next().await {
        let frame = frame.unwrap();
        if frame.kind == FrameKind::TlsHandshake {
            handshakes += 1;
            continue;
        }
        if let Some(pdu) = reassembler.push(&frame.as_frame()).unwrap() {
            pdus.push(pdu);
        }
    }

    assert_eq!(handshakes, 1);
    assert_eq!(pdus.len(), 1);
    assert_eq!(pdus[0].channel, 3);
    assert_eq!(pdus[0].frame_count, 4);
    assert_eq!(pdus[0].payload, payload);
    assert_eq!(frames.decoder().frames_decoded(), 5);
}

#[tokio::test]
async fn test_framed_read_surfaces_bad_length() {
    let wire = FrameBuilder::new(TABULAR_RESULT).build_with_length(4, &[]);
    let mut frames = FramedRead::new(&wire[..], FrameCodec::new());
    let err = frames.next().await.unwrap().unwrap_err();
    assert!(err.is_recoverable());
}
