#![no_main]

use libfuzzer_sys::fuzz_target;
use tds_codec::{FrameResult, decode_frame};
use tds_wire::FrameHeader;

fuzz_target!(|data: &[u8]| {
    let _ = FrameHeader::parse(data);

    let mut rest = data;
    while let FrameResult::Frame(frame, next) = decode_frame(rest) {
        assert_eq!(frame.wire_len(), rest.len() - next.len());
        rest = next;
    }
});
