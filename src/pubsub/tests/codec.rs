use super::*;

fn round_trip(nm: &UadpNetworkMessage) -> UadpNetworkMessage {
    let bytes = nm.encode_to_vec().unwrap();
    assert_eq!(bytes.len(), nm.byte_len());
    let decoded = UadpNetworkMessage::decode(&bytes, &DecodingOptions::test()).unwrap();
    assert_eq!(&decoded, nm);
    decoded
}

#[test]
fn minimal_message_round_trip() {
    let dsm = DataSetMessage::key_frame(
        DataSetMessageHeader::default(),
        vec![Variant::from(true)],
    );
    round_trip(&UadpNetworkMessage {
        payload: vec![dsm],
        ..UadpNetworkMessage::default()
    });
}

#[test]
fn full_header_round_trip() {
    let dsm = DataSetMessage::key_frame(
        DataSetMessageHeader {
            sequence_number: Some(42),
            timestamp: Some(DateTime::now()),
            picoseconds: Some(7),
            status: Some(0),
            config_major_version: Some(1),
            config_minor_version: Some(3),
            ..DataSetMessageHeader::default()
        },
        vec![
            Variant::from(1000u32),
            Variant::from(-5i16),
            Variant::from("hello"),
            Variant::from(2.5f64),
        ],
    );
    round_trip(&UadpNetworkMessage {
        publisher_id: Some(PublisherId::UInt64(0xDEAD_BEEF_0000_0001)),
        dataset_class_id: Some(Guid::new()),
        group_header: Some(UadpGroupHeader {
            writer_group_id: Some(100),
            group_version: Some(1234),
            network_message_number: Some(1),
            sequence_number: Some(99),
        }),
        dataset_payload_header: Some(vec![62541]),
        timestamp: Some(DateTime::now()),
        picoseconds: Some(11),
        payload: vec![dsm],
        ..UadpNetworkMessage::default()
    });
}

#[test]
fn publisher_id_widths_round_trip() {
    for publisher_id in [
        PublisherId::Byte(7),
        PublisherId::UInt16(2234),
        PublisherId::UInt32(70_000),
        PublisherId::UInt64(u64::MAX),
    ] {
        let dsm = DataSetMessage::key_frame(
            DataSetMessageHeader::default(),
            vec![Variant::from(1u8)],
        );
        round_trip(&UadpNetworkMessage {
            publisher_id: Some(publisher_id),
            payload: vec![dsm],
            ..UadpNetworkMessage::default()
        });
    }
}

#[test]
fn multiple_messages_use_a_sizes_array() {
    let dsm1 = DataSetMessage::key_frame(
        DataSetMessageHeader {
            sequence_number: Some(1),
            ..DataSetMessageHeader::default()
        },
        vec![Variant::from(1u32)],
    );
    let dsm2 = DataSetMessage::key_frame(
        DataSetMessageHeader {
            sequence_number: Some(2),
            ..DataSetMessageHeader::default()
        },
        vec![Variant::from("two"), Variant::from(2i64)],
    );
    let nm = UadpNetworkMessage {
        publisher_id: Some(PublisherId::UInt16(2234)),
        dataset_payload_header: Some(vec![1, 2]),
        payload: vec![dsm1, dsm2],
        ..UadpNetworkMessage::default()
    };
    assert!(nm.payload_sizes_encoded());
    round_trip(&nm);
}

#[test]
fn delta_frame_and_keep_alive_round_trip() {
    let delta = DataSetMessage {
        header: DataSetMessageHeader {
            field_encoding: DataSetFieldEncoding::Variant,
            sequence_number: Some(5),
            ..DataSetMessageHeader::default()
        },
        body: DataSetMessageBody::DeltaFrame(vec![
            (0, Variant::from(17u32)),
            (3, Variant::from(false)),
        ]),
    };
    round_trip(&UadpNetworkMessage {
        dataset_payload_header: Some(vec![9]),
        payload: vec![delta],
        ..UadpNetworkMessage::default()
    });

    let keep_alive = DataSetMessage::keep_alive(DataSetMessageHeader {
        sequence_number: Some(77),
        ..DataSetMessageHeader::default()
    });
    round_trip(&UadpNetworkMessage {
        dataset_payload_header: Some(vec![9]),
        payload: vec![keep_alive],
        ..UadpNetworkMessage::default()
    });
}

#[test]
fn raw_fields_interpret_against_metadata() {
    let nm = raw_uint32_message(1000, false);
    let decoded = round_trip(&nm);
    let fields = decoded.payload[0]
        .decode_raw_fields(&[VariantTypeId::UInt32], &DecodingOptions::test())
        .unwrap();
    assert_eq!(fields, vec![Variant::UInt32(1000)]);

    // The wrong metadata does not fit the body
    assert_eq!(
        decoded.payload[0]
            .decode_raw_fields(&[VariantTypeId::UInt16], &DecodingOptions::test())
            .unwrap_err(),
        StatusCode::BadDecodingError
    );
}

#[test]
fn rt_test_message_wire_layout() {
    // Hand-assembled golden bytes: version/flags, extended flags 1, publisher id 2234,
    // group flags + writer group id 100, payload header with writer 62541, DataSetFlags1
    // (valid + raw), then the UInt32 value 1000. Everything little-endian.
    let expected = [
        0xF1, 0x01, 0xBA, 0x08, 0x01, 0x64, 0x00, 0x01, 0x4D, 0xF4, 0x03, 0xE8, 0x03, 0x00, 0x00,
    ];
    let nm = raw_uint32_message(1000, false);
    assert_eq!(nm.encode_to_vec().unwrap(), expected);
}

#[test]
fn raw_encoding_rejects_variable_length_types() {
    for value in [
        Variant::from("text"),
        Variant::from(ByteString::from(vec![1u8, 2u8])),
    ] {
        assert_eq!(
            DataSetMessage::key_frame_raw(DataSetMessageHeader::default(), &[value]).unwrap_err(),
            StatusCode::BadDataEncodingUnsupported
        );
    }
}

#[test]
fn unknown_content_mask_bits_are_an_encoding_error() {
    assert_eq!(
        UadpNetworkMessageContentMask::validate(0x800).unwrap_err(),
        StatusCode::BadEncodingError
    );
    assert_eq!(
        UadpDataSetMessageContentMask::validate(0x40).unwrap_err(),
        StatusCode::BadEncodingError
    );
    assert!(UadpNetworkMessageContentMask::validate(0x47).is_ok());
}

#[test]
fn short_buffer_is_a_decoding_error() {
    // Variant framing so every truncation point is detectable - a raw body's extent is
    // bounded by the buffer, so a truncated raw message is caught later against metadata
    let dsm = DataSetMessage::key_frame(
        DataSetMessageHeader {
            sequence_number: Some(1),
            ..DataSetMessageHeader::default()
        },
        vec![Variant::from(1000u32), Variant::from(-3i64)],
    );
    let bytes = UadpNetworkMessage {
        publisher_id: Some(PublisherId::UInt16(2234)),
        group_header: Some(UadpGroupHeader {
            writer_group_id: Some(100),
            sequence_number: Some(1),
            ..UadpGroupHeader::default()
        }),
        dataset_payload_header: Some(vec![62541]),
        payload: vec![dsm],
        ..UadpNetworkMessage::default()
    }
    .encode_to_vec()
    .unwrap();
    for len in 0..bytes.len() {
        let err = UadpNetworkMessage::decode(&bytes[..len], &DecodingOptions::test()).unwrap_err();
        assert_eq!(err, StatusCode::BadDecodingError, "truncated at {}", len);
    }
}

#[test]
fn bad_version_is_a_decoding_error() {
    let mut bytes = raw_uint32_message(1000, false).encode_to_vec().unwrap();
    bytes[0] = (bytes[0] & 0xF0) | 0x02;
    assert_eq!(
        UadpNetworkMessage::decode(&bytes, &DecodingOptions::test()).unwrap_err(),
        StatusCode::BadDecodingError
    );
}

#[test]
fn sequence_numbers_wrap_at_16_bits() {
    use crate::pubsub::core::{DataSetWriterConfig, WriterGroup, WriterGroupConfig};

    let mut group = WriterGroup::new(crate::pubsub::core::PubSubId(1), &WriterGroupConfig::default());
    let mut writer = crate::pubsub::core::DataSetWriter::new(
        crate::pubsub::core::PubSubId(2),
        &DataSetWriterConfig::default(),
        crate::pubsub::core::PubSubId(3),
    );
    for _ in 0..u16::MAX {
        group.next_sequence_number();
        writer.next_sequence_number();
    }
    assert_eq!(group.next_sequence_number(), 0);
    assert_eq!(writer.next_sequence_number(), 0);
    assert_eq!(group.next_sequence_number(), 1);
}
