#![no_main]

use libfuzzer_sys::fuzz_target;
use tds_wire::{ConversationState, DecodeOptions, TdsVersion, decode_tokens};

const VERSIONS: [Option<TdsVersion>; 4] = [
    None,
    Some(TdsVersion::V5_0),
    Some(TdsVersion::V7_1),
    Some(TdsVersion::V7_4),
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, pdu)) = data.split_first() else {
        return;
    };
    let options = DecodeOptions {
        version_hint: VERSIONS[usize::from(selector) % VERSIONS.len()],
        max_plp_size: 1 << 20,
        ..DecodeOptions::default()
    };
    let mut state = ConversationState::with_options(&options);

    // Decode twice so the second pass sees metadata left by the first
    for _ in 0..2 {
        let stream = decode_tokens(pdu, &mut state, &options);
        assert!(stream.consumed <= pdu.len());
        if stream.is_complete() {
            assert_eq!(stream.consumed, pdu.len());
        }
    }
});
