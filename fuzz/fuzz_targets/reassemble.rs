#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tds_codec::{DecoderConfig, Dissector};

/// A conversation as a sequence of segments.
#[derive(Debug, Arbitrary)]
struct FuzzInput {
    segments: Vec<Vec<u8>>,
    reassemble: bool,
}

fuzz_target!(|input: FuzzInput| {
    let config = DecoderConfig::default()
        .reassemble(input.reassemble)
        .max_pdu_size(1 << 16)
        .max_plp_size(1 << 16);
    let mut dissector = Dissector::new(config);
    let mut pending = Vec::new();

    for segment in &input.segments {
        pending.extend_from_slice(segment);
        let outcome = dissector.process_segment(0u8, &pending);
        assert!(outcome.consumed <= pending.len());
        pending.drain(..outcome.consumed);
    }
});
