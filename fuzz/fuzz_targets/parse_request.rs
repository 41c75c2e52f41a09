#![no_main]

use libfuzzer_sys::fuzz_target;
use tds_wire::{OpaqueRequest, SqlBatch, TdsVersion};

fuzz_target!(|data: &[u8]| {
    let _ = SqlBatch::decode(data, TdsVersion::V7_4);
    let _ = SqlBatch::decode(data, TdsVersion::V5_0);
    let (request, _) = OpaqueRequest::decode(data);
    assert!(request.body.len() <= data.len());
});
