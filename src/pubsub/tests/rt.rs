use super::*;

fn uint32_offset_buffer(value: u32) -> OffsetBuffer {
    let nm = raw_uint32_message(value, true);
    OffsetBuffer::new(&nm, &[vec![VariantTypeId::UInt32]]).unwrap()
}

#[test]
fn offset_table_records_every_patch_site() {
    let offset_buffer = uint32_offset_buffer(1000);
    let kinds = offset_buffer
        .offsets()
        .iter()
        .map(|e| e.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            NetworkMessageOffsetKind::GroupSequenceNumber,
            NetworkMessageOffsetKind::DataSetSequenceNumber { data_set: 0 },
            NetworkMessageOffsetKind::PayloadField {
                data_set: 0,
                field: 0,
                type_id: VariantTypeId::UInt32
            },
        ]
    );
    // Offsets are monotonic and inside the buffer
    let mut last_end = 0;
    for e in offset_buffer.offsets() {
        assert!(e.offset >= last_end);
        last_end = e.offset + e.size;
    }
    assert!(last_end <= offset_buffer.len());
    // The payload field patch site holds the encoded value
    let field = offset_buffer.offsets()[2];
    assert_eq!(
        offset_buffer.bytes()[field.offset..field.offset + field.size],
        1000u32.to_le_bytes()
    );
}

#[test]
fn patching_changes_only_the_patch_sites() {
    let mut offset_buffer = uint32_offset_buffer(1000);
    let snapshot = offset_buffer.bytes().to_vec();
    let patch_sites = offset_buffer.offsets().to_vec();

    offset_buffer.patch_u16(0, 17).unwrap();
    offset_buffer.patch_u16(1, 4711).unwrap();
    offset_buffer
        .patch_field(2, &Variant::UInt32(0xAABB_CCDD))
        .unwrap();

    for (i, (before, after)) in snapshot.iter().zip(offset_buffer.bytes()).enumerate() {
        let inside_patch_site = patch_sites
            .iter()
            .any(|e| i >= e.offset && i < e.offset + e.size);
        if !inside_patch_site {
            assert_eq!(before, after, "byte {} changed outside a patch site", i);
        }
    }
    let field = patch_sites[2];
    assert_eq!(
        offset_buffer.bytes()[field.offset..field.offset + field.size],
        0xAABB_CCDDu32.to_le_bytes()
    );
}

#[test]
fn buffer_length_is_fixed_after_freeze() {
    let mut offset_buffer = uint32_offset_buffer(1);
    let len = offset_buffer.len();
    offset_buffer.patch_field(2, &Variant::UInt32(u32::MAX)).unwrap();
    offset_buffer.patch_u16(0, u16::MAX).unwrap();
    assert_eq!(offset_buffer.len(), len);
}

#[test]
fn patching_the_wrong_type_is_rejected() {
    let mut offset_buffer = uint32_offset_buffer(1000);
    assert_eq!(
        offset_buffer
            .patch_field(2, &Variant::UInt16(7))
            .unwrap_err(),
        StatusCode::BadInvalidArgument
    );
    // Sequence number slots only accept sequence numbers
    assert_eq!(
        offset_buffer.patch_field(0, &Variant::UInt32(1)).unwrap_err(),
        StatusCode::BadInvalidArgument
    );
}

#[test]
fn update_reads_patched_values_from_a_matching_packet() {
    // Publisher side - patch a new value and fresh sequence numbers into the buffer
    let mut publisher = uint32_offset_buffer(0);
    publisher.patch_u16(0, 3).unwrap();
    publisher.patch_u16(1, 3).unwrap();
    publisher.patch_field(2, &Variant::UInt32(1000)).unwrap();

    // Subscriber side - same frozen shape, zeroed placeholders
    let subscriber = uint32_offset_buffer(0);
    let values = subscriber
        .update_from(publisher.bytes(), &DecodingOptions::test())
        .unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].1, Variant::UInt32(1000));
}

#[test]
fn update_rejects_a_packet_of_different_shape() {
    let subscriber = uint32_offset_buffer(0);

    // Different length
    let err = subscriber
        .update_from(&[0u8; 4], &DecodingOptions::test())
        .unwrap_err();
    assert_eq!(err, StatusCode::BadDecodingError);

    // Same length, different writer group id outside the patch sites
    let mut other = raw_uint32_message(0, true);
    if let Some(ref mut group_header) = other.group_header {
        group_header.writer_group_id = Some(101);
    }
    let bytes = other.encode_to_vec().unwrap();
    let err = subscriber
        .update_from(&bytes, &DecodingOptions::test())
        .unwrap_err();
    assert_eq!(err, StatusCode::BadDecodingError);
}

#[test]
fn update_accepts_any_sequence_numbers() {
    let mut publisher = uint32_offset_buffer(0);
    publisher.patch_u16(0, 0xFFFF).unwrap();
    publisher.patch_u16(1, 0).unwrap();
    publisher.patch_field(2, &Variant::UInt32(1)).unwrap();

    let subscriber = uint32_offset_buffer(0);
    assert!(subscriber
        .update_from(publisher.bytes(), &DecodingOptions::test())
        .is_ok());
}

#[test]
fn variant_payloads_cannot_freeze() {
    let dsm = DataSetMessage::key_frame(
        DataSetMessageHeader::default(),
        vec![Variant::from(1u32)],
    );
    let nm = UadpNetworkMessage {
        publisher_id: Some(PublisherId::UInt16(2234)),
        dataset_payload_header: Some(vec![62541]),
        payload: vec![dsm],
        ..UadpNetworkMessage::default()
    };
    assert_eq!(
        OffsetBuffer::new(&nm, &[vec![VariantTypeId::UInt32]]).unwrap_err(),
        StatusCode::BadNotSupported
    );
}

#[test]
fn field_types_must_cover_the_raw_body() {
    let nm = raw_uint32_message(1, false);
    // Too small a type list leaves bytes unaccounted for
    assert_eq!(
        OffsetBuffer::new(&nm, &[vec![VariantTypeId::UInt16]]).unwrap_err(),
        StatusCode::BadInvalidArgument
    );
    // Variable length types have no fixed slot at all
    assert_eq!(
        OffsetBuffer::new(&nm, &[vec![VariantTypeId::String]]).unwrap_err(),
        StatusCode::BadNotSupported
    );
}
