//! Converting values decoded from a token stream.

#![allow(clippy::unwrap_used, clippy::panic)]

use tds_testing::tokens::{Column, TokenBuilder, values};
use tds_types::{FromValue, TypeError};
use tds_wire::{ConversationState, DecodeOptions, TdsVersion, Token, decode_tokens};

#[test]
fn test_convert_decoded_row() {
    let options = DecodeOptions {
        version_hint: Some(TdsVersion::V7_4),
        ..DecodeOptions::default()
    };
    let payload = TokenBuilder::wide()
        .col_metadata(&[
            Column::int("id"),
            Column::nvarchar("name", Some(32)),
            Column::int_n("parent", 8),
        ])
        .row(&[
            values::int(17),
            values::nvarchar(Some("widget")),
            values::int_n(None, 8),
        ])
        .build();

    let mut state = ConversationState::with_options(&options);
    let stream = decode_tokens(&payload, &mut state, &options);
    let Some(Token::Row(row)) = stream.tokens.last() else {
        panic!("expected a row, got {:?}", stream.tokens);
    };

    assert_eq!(i32::from_value(&row.values[0]).unwrap(), 17);
    assert_eq!(String::from_value(&row.values[1]).unwrap(), "widget");
    assert_eq!(Option::<i64>::from_value(&row.values[2]).unwrap(), None);
    assert_eq!(
        i64::from_value(&row.values[2]),
        Err(TypeError::UnexpectedNull)
    );
}

mod narrowing {
    use proptest::prelude::*;
    use tds_types::{FromValue, TypeError};
    use tds_wire::DecodedValue;

    proptest! {
        #[test]
        fn i32_conversion_checks_range(value in any::<i64>()) {
            let decoded = DecodedValue::Int { width: 8, value };
            match i32::from_value(&decoded) {
                Ok(v) => prop_assert_eq!(i64::from(v), value),
                Err(err) => {
                    prop_assert!(i32::try_from(value).is_err());
                    prop_assert_eq!(err, TypeError::OutOfRange { target_type: "i32" });
                }
            }
        }

        #[test]
        fn nullable_maps_null_to_none(value in proptest::option::of(any::<i16>())) {
            let decoded = value.map_or(DecodedValue::Null, |v| DecodedValue::Int {
                width: 2,
                value: i64::from(v),
            });
            prop_assert_eq!(i16::from_value_nullable(&decoded).unwrap(), value);
        }
    }
}
