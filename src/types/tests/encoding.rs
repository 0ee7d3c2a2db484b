use crate::types::tests::*;

#[test]
fn encoding_bool() {
    serialize_test(true);
    serialize_test(false);
}

#[test]
fn encoding_sbyte() {
    serialize_test(0 as i8);
    serialize_test(100 as i8);
    serialize_test(-90 as i8);
}

#[test]
fn encoding_byte() {
    serialize_test(0 as u8);
    serialize_test(255 as u8);
    serialize_test(90 as u8);
}

#[test]
fn encoding_int16() {
    serialize_test(0 as i16);
    serialize_test(-17000 as i16);
    serialize_test(32000 as i16);
}

#[test]
fn encoding_uint16() {
    serialize_test(0 as u16);
    serialize_test(57000 as u16);
    serialize_test(32000 as u16);
}

#[test]
fn encoding_int32() {
    serialize_test(0 as i32);
    serialize_test(-17444000 as i32);
    serialize_test(32004440 as i32);
}

#[test]
fn encoding_uint32() {
    serialize_test(0 as u32);
    serialize_test(57055500 as u32);
    serialize_test(32555000 as u32);
}

#[test]
fn encoding_int64() {
    serialize_test(0 as i64);
    serialize_test(-17442224000 as i64);
    serialize_test(32022204440 as i64);
}

#[test]
fn encoding_uint64() {
    serialize_test(0 as u64);
    serialize_test(57054445500 as u64);
    serialize_test(34442555000 as u64);
}

#[test]
fn encoding_f32() {
    serialize_test(0 as f32);
    serialize_test(12.4342 as f32);
    serialize_test(5686.222 as f32);
}

#[test]
fn encoding_f64() {
    serialize_test(0 as f64);
    serialize_test(12.43424324234 as f64);
    serialize_test(5686.222342342 as f64);
}

#[test]
fn encoding_string() {
    // Null
    serialize_test(UAString::null());
    // UTF-8 strings
    serialize_test(UAString::from(""));
    serialize_test(UAString::from("ショッピング"));
    serialize_test(UAString::from("This is a test"));
}

#[test]
fn encode_string_part_6_5224() {
    // Sample from OPCUA Part 6 - 5.2.2.4
    let expected = [0x06, 0x00, 0x00, 0x00, 0xE6, 0xB0, 0xB4, 0x42, 0x6F, 0x79];
    let input = UAString::from("水Boy");
    serialize_and_compare(input, &expected);
}

#[test]
fn encoding_byte_string() {
    serialize_test(ByteString::null());
    serialize_test(ByteString::from(vec![]));
    serialize_test(ByteString::from(vec![1u8, 2u8, 3u8, 4u8]));
}

#[test]
fn encoding_guid() {
    serialize_test(Guid::null());
    serialize_test(Guid::new());
}

#[test]
fn encode_guid_part_6_5229() {
    // Sample from OPCUA Part 6 - 5.2.2.9
    let expected = [
        0x91, 0x2B, 0x96, 0x72, 0x75, 0xFA, 0xE6, 0x4A, 0x8D, 0x28, 0xB4, 0x04, 0xDC, 0x7D, 0xAF,
        0x63,
    ];
    let input = "72962B91-FA75-4AE6-8D28-B404DC7DAF63".parse::<Guid>().unwrap();
    serialize_and_compare(input, &expected);
}

#[test]
fn encoding_status_code() {
    serialize_test(StatusCode::Good);
    serialize_test(StatusCode::BadDecodingError);
}

#[test]
fn encoding_node_id() {
    // Two byte
    serialize_test(NodeId::new(0, 255));
    // Four byte
    serialize_test(NodeId::new(1, 50002));
    // Numeric
    serialize_test(NodeId::new(300, 8_000_000));
    // String and guid
    serialize_test(NodeId::new(2, "this is a node"));
    serialize_test(NodeId::new(2, Guid::new()));
}

#[test]
fn encoding_data_value() {
    serialize_test(DataValue::null());
    serialize_test(DataValue::value_only(1000u32));
    let mut dv = DataValue::new_now(123.456f64);
    dv.source_picoseconds = Some(100);
    dv.server_picoseconds = Some(100);
    serialize_test(dv);
}

#[test]
fn decode_short_buffer_is_error() {
    use std::io::Cursor;
    let mut stream = Cursor::new(vec![0x06u8, 0x00, 0x00, 0x00, 0x41]);
    let err = UAString::decode(&mut stream, &DecodingOptions::test()).unwrap_err();
    assert_eq!(err, StatusCode::BadDecodingError);
}

#[test]
fn decode_string_limit_is_enforced() {
    use std::io::Cursor;
    let limits = DecodingOptions {
        max_string_length: 2,
        ..DecodingOptions::test()
    };
    let buf = UAString::from("abc").encode_to_vec();
    let mut stream = Cursor::new(buf);
    let err = UAString::decode(&mut stream, &limits).unwrap_err();
    assert_eq!(err, StatusCode::BadDecodingError);
}
