use crate::pubsub::core::*;
use crate::pubsub::subscriber::process_network_message;

use super::*;

fn reader_config(name: &str, target: NodeId, data_type: NodeId) -> DataSetReaderConfig {
    DataSetReaderConfig {
        name: UAString::from(name),
        publisher_id: PublisherId::UInt16(2234),
        writer_group_id: 100,
        data_set_writer_id: 62541,
        data_set_meta_data: DataSetMetaData {
            name: UAString::from("DataSet Test"),
            fields: vec![FieldMetaData::scalar("field", data_type)],
        },
        target_variables: vec![FieldTargetVariable::new(target)],
        ..DataSetReaderConfig::default()
    }
}

fn internal_backend(registry: &mut ValueBackendRegistry, node: NodeId) {
    registry.register(node, ValueBackend::Internal(DataValue::null()));
}

#[test]
fn first_matching_reader_wins() {
    let uint32_type = NodeId::new(0, 7u32);
    let first_target = NodeId::new(1, 1u32);
    let second_target = NodeId::new(1, 2u32);

    let mut backends = ValueBackendRegistry::default();
    internal_backend(&mut backends, first_target.clone());
    internal_backend(&mut backends, second_target.clone());

    let mut group = ReaderGroup::new(PubSubId(10), &ReaderGroupConfig::default());
    group.add_reader(DataSetReader::new(
        PubSubId(11),
        &reader_config("first", first_target.clone(), uint32_type.clone()),
    ));
    group.add_reader(DataSetReader::new(
        PubSubId(12),
        &reader_config("second", second_target.clone(), uint32_type),
    ));
    let mut groups = vec![group];

    let bytes = raw_uint32_message(1000, false).encode_to_vec().unwrap();
    process_network_message(&mut groups, &bytes, &mut backends, &DecodingOptions::test()).unwrap();

    // Exactly one reader dispatched, and it is the first added
    let first = backends.read_value(&first_target).unwrap();
    assert_eq!(first.value, Some(Variant::UInt32(1000)));
    let second = backends.read_value(&second_target).unwrap();
    assert_eq!(second.value, None);
    assert_eq!(groups[0].readers()[0].dropped_messages(), 0);
    assert_eq!(groups[0].readers()[1].dropped_messages(), 0);
}

#[test]
fn mismatched_key_is_dropped_without_error() {
    let uint32_type = NodeId::new(0, 7u32);
    let target = NodeId::new(1, 1u32);
    let mut backends = ValueBackendRegistry::default();
    internal_backend(&mut backends, target.clone());

    let mut group = ReaderGroup::new(PubSubId(10), &ReaderGroupConfig::default());
    let mut config = reader_config("reader", target.clone(), uint32_type);
    config.writer_group_id = 101;
    group.add_reader(DataSetReader::new(PubSubId(11), &config));
    let mut groups = vec![group];

    // Writer group 100 does not match the reader's 101; no error, no write, no drop count
    let bytes = raw_uint32_message(1000, false).encode_to_vec().unwrap();
    process_network_message(&mut groups, &bytes, &mut backends, &DecodingOptions::test()).unwrap();
    assert_eq!(backends.read_value(&target).unwrap().value, None);
    assert_eq!(groups[0].readers()[0].dropped_messages(), 0);
}

#[test]
fn undecodable_payload_bumps_the_drop_counter() {
    // Metadata says UInt16 but the raw body holds four bytes
    let uint16_type = NodeId::new(0, 5u32);
    let target = NodeId::new(1, 1u32);
    let mut backends = ValueBackendRegistry::default();
    internal_backend(&mut backends, target.clone());

    let mut group = ReaderGroup::new(PubSubId(10), &ReaderGroupConfig::default());
    group.add_reader(DataSetReader::new(
        PubSubId(11),
        &reader_config("reader", target.clone(), uint16_type),
    ));
    let mut groups = vec![group];

    let bytes = raw_uint32_message(1000, false).encode_to_vec().unwrap();
    process_network_message(&mut groups, &bytes, &mut backends, &DecodingOptions::test()).unwrap();
    assert_eq!(groups[0].readers()[0].dropped_messages(), 1);
    assert_eq!(backends.read_value(&target).unwrap().value, None);

    // The counter is monotonic
    process_network_message(&mut groups, &bytes, &mut backends, &DecodingOptions::test()).unwrap();
    assert_eq!(groups[0].readers()[0].dropped_messages(), 2);
}

#[test]
fn variant_key_frame_writes_targets_in_field_order() {
    let target_a = NodeId::new(1, 1u32);
    let target_b = NodeId::new(1, 2u32);
    let mut backends = ValueBackendRegistry::default();
    internal_backend(&mut backends, target_a.clone());
    internal_backend(&mut backends, target_b.clone());

    let mut config = reader_config("reader", target_a.clone(), NodeId::new(0, 7u32));
    config.data_set_meta_data.fields.push(FieldMetaData::scalar(
        "second",
        NodeId::new(0, 12u32),
    ));
    config
        .target_variables
        .push(FieldTargetVariable::new(target_b.clone()));

    let mut group = ReaderGroup::new(PubSubId(10), &ReaderGroupConfig::default());
    group.add_reader(DataSetReader::new(PubSubId(11), &config));
    let mut groups = vec![group];

    let dsm = DataSetMessage::key_frame(
        DataSetMessageHeader::default(),
        vec![Variant::from(7u32), Variant::from("seven")],
    );
    let bytes = UadpNetworkMessage {
        publisher_id: Some(PublisherId::UInt16(2234)),
        group_header: Some(UadpGroupHeader {
            writer_group_id: Some(100),
            ..UadpGroupHeader::default()
        }),
        dataset_payload_header: Some(vec![62541]),
        payload: vec![dsm],
        ..UadpNetworkMessage::default()
    }
    .encode_to_vec()
    .unwrap();

    process_network_message(&mut groups, &bytes, &mut backends, &DecodingOptions::test()).unwrap();
    assert_eq!(
        backends.read_value(&target_a).unwrap().value,
        Some(Variant::UInt32(7))
    );
    assert_eq!(
        backends.read_value(&target_b).unwrap().value,
        Some(Variant::from("seven"))
    );
}
