#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tds_wire::{DecodeOptions, Reader, TypeInfo, decode_value};

/// Type-info bytes decoded first, then value bytes against the result.
#[derive(Debug, Arbitrary)]
struct FuzzInput {
    type_info: Vec<u8>,
    data: Vec<u8>,
    big_endian: bool,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(info) = TypeInfo::decode(&mut Reader::new(&input.type_info)) else {
        return;
    };
    let options = DecodeOptions {
        max_plp_size: 1 << 16,
        ..DecodeOptions::default()
    };
    let order = if input.big_endian {
        tds_wire::ByteOrder::BigEndian
    } else {
        tds_wire::ByteOrder::LittleEndian
    };
    let mut src = Reader::new(&input.data).with_byte_order(order);
    if decode_value(&mut src, &info, &options).is_ok() {
        assert!(src.offset() <= input.data.len());
    }
});
