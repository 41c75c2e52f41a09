//! Property tests for NULL sentinels, PLP chunking and stream robustness.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use tds_testing::tokens::{DEFAULT_COLLATION, values};
use tds_wire::{
    ConversationState, DecodeOptions, DecodedValue, ProtocolError, Reader, TypeInfo,
    decode_tokens, decode_value,
};

fn type_info(bytes: &[u8]) -> TypeInfo {
    TypeInfo::decode(&mut Reader::new(bytes)).unwrap()
}

fn nvarchar_info() -> TypeInfo {
    let mut bytes = vec![0xE7, 0xA0, 0x0F];
    bytes.extend_from_slice(&DEFAULT_COLLATION);
    type_info(&bytes)
}

fn varbinary_max_info() -> TypeInfo {
    type_info(&[0xA5, 0xFF, 0xFF])
}

#[test]
fn test_sentinels_decode_as_null() {
    let options = DecodeOptions::default();
    let cases: [(TypeInfo, Vec<u8>); 4] = [
        (type_info(&[0x26, 0x04]), vec![0x00]),
        (nvarchar_info(), vec![0xFF, 0xFF]),
        (type_info(&[0x62, 0x1F, 0x1F, 0x00, 0x00]), vec![0xFF, 0xFF, 0xFF, 0xFF]),
        (varbinary_max_info(), values::plp(None)),
    ];
    for (info, bytes) in cases {
        let mut src = Reader::new(&bytes);
        let value = decode_value(&mut src, &info, &options).unwrap();
        assert_eq!(value, DecodedValue::Null, "{:?}", info.type_id);
        assert!(src.is_empty());
    }
}

#[test]
fn test_empty_variant_is_null() {
    let info = type_info(&[0x62, 0x1F, 0x1F, 0x00, 0x00]);
    let bytes = [0x00, 0x00, 0x00, 0x00];
    let value = decode_value(&mut Reader::new(&bytes), &info, &DecodeOptions::default()).unwrap();
    assert!(value.is_null());
}

proptest! {
    #[test]
    fn prop_nvarchar_null_or_text(text in proptest::option::of("[a-zA-Z0-9 ]{0,40}")) {
        let bytes = values::nvarchar(text.as_deref());
        let mut src = Reader::new(&bytes);
        let value = decode_value(&mut src, &nvarchar_info(), &DecodeOptions::default()).unwrap();
        match text {
            None => prop_assert_eq!(value, DecodedValue::Null),
            Some(s) => prop_assert_eq!(value, DecodedValue::Text(s)),
        }
        prop_assert!(src.is_empty());
    }

    #[test]
    fn prop_plp_chunks_concatenate(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..64), 0..8)
    ) {
        let slices: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
        let bytes = values::plp(Some(slices.as_slice()));
        let mut src = Reader::new(&bytes);
        let value = decode_value(&mut src, &varbinary_max_info(), &DecodeOptions::default()).unwrap();
        let expected: Vec<u8> = chunks.concat();
        prop_assert_eq!(value, DecodedValue::Bytes(expected.into()));
        prop_assert!(src.is_empty());
    }

    #[test]
    fn prop_plp_limit_is_enforced(len in 1usize..256, limit in 0usize..256) {
        let data = vec![0xAB; len];
        let bytes = values::plp(Some([data.as_slice()].as_slice()));
        let options = DecodeOptions { max_plp_size: limit, ..DecodeOptions::default() };
        let result = decode_value(&mut Reader::new(&bytes), &varbinary_max_info(), &options);
        if len > limit {
            let is_too_large = matches!(result, Err(ProtocolError::ValueTooLarge { .. }));
            prop_assert!(is_too_large);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn prop_decode_tokens_never_overruns(pdu in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut state = ConversationState::new();
        let stream = decode_tokens(&pdu, &mut state, &DecodeOptions::default());
        prop_assert!(stream.consumed <= pdu.len());
        if stream.is_complete() {
            prop_assert_eq!(stream.consumed, pdu.len());
        }
    }
}
