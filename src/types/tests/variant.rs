use std::convert::TryFrom;
use std::io::Cursor;

use crate::types::tests::*;
use crate::types::variant::Array;

#[test]
fn encoding_variant_scalars() {
    serialize_test(Variant::Empty);
    serialize_test(Variant::from(true));
    serialize_test(Variant::from(-5i8));
    serialize_test(Variant::from(255u8));
    serialize_test(Variant::from(-17000i16));
    serialize_test(Variant::from(57000u16));
    serialize_test(Variant::from(-125125i32));
    serialize_test(Variant::from(1000u32));
    serialize_test(Variant::from(-125125125125i64));
    serialize_test(Variant::from(125125125125u64));
    serialize_test(Variant::from(1.3e10f32));
    serialize_test(Variant::from(1.3e100f64));
    serialize_test(Variant::from("hello"));
    serialize_test(Variant::from(DateTime::now()));
    serialize_test(Variant::from(Guid::new()));
    serialize_test(Variant::from(StatusCode::BadDecodingError));
    serialize_test(Variant::from(ByteString::from(vec![1u8, 2u8])));
}

#[test]
fn encoding_variant_array() {
    let array = Array::new(
        VariantTypeId::UInt32,
        vec![Variant::from(1u32), Variant::from(2u32), Variant::from(3u32)],
    )
    .unwrap();
    serialize_test(Variant::Array(Box::new(array)));
}

#[test]
fn variant_uint32_wire_form() {
    // Encoding mask 7 followed by the LE value
    let expected = [0x07, 0xE8, 0x03, 0x00, 0x00];
    serialize_and_compare(Variant::from(1000u32), &expected);
}

#[test]
fn mixed_array_is_rejected() {
    assert!(Array::new(
        VariantTypeId::UInt32,
        vec![Variant::from(1u32), Variant::from(2i16)],
    )
    .is_err());
}

#[test]
fn unknown_type_id_is_rejected() {
    // 22 = ExtensionObject which the data plane does not carry
    let mut stream = Cursor::new(vec![22u8, 0, 0, 0, 0]);
    let err = Variant::decode(&mut stream, &DecodingOptions::test()).unwrap_err();
    assert_eq!(err, StatusCode::BadDataTypeIdUnknown);
}

#[test]
fn type_id_from_data_type_node() {
    let uint32 = NodeId::new(0, 7u32);
    assert_eq!(VariantTypeId::try_from(&uint32).unwrap(), VariantTypeId::UInt32);
    let date_time = NodeId::new(0, 13u32);
    assert_eq!(
        VariantTypeId::try_from(&date_time).unwrap(),
        VariantTypeId::DateTime
    );
    // Namespaced and non-builtin ids fail
    assert!(VariantTypeId::try_from(&NodeId::new(1, 7u32)).is_err());
    assert!(VariantTypeId::try_from(&NodeId::new(0, 22u32)).is_err());
}

#[test]
fn fixed_wire_sizes() {
    assert_eq!(VariantTypeId::Boolean.fixed_wire_size(), Some(1));
    assert_eq!(VariantTypeId::UInt32.fixed_wire_size(), Some(4));
    assert_eq!(VariantTypeId::Double.fixed_wire_size(), Some(8));
    assert_eq!(VariantTypeId::Guid.fixed_wire_size(), Some(16));
    assert_eq!(VariantTypeId::String.fixed_wire_size(), None);
    assert_eq!(VariantTypeId::ByteString.fixed_wire_size(), None);
}
