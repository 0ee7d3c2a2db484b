//! Realtime fixed-offset configuration levels, publisher to subscriber over UDP multicast
//! loopback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opcua_pubsub::pubsub::core::*;
use opcua_pubsub::pubsub::uadp::PublisherId;
use opcua_pubsub::types::*;

const WRITER_GROUP_ID: u16 = 100;
const DATA_SET_WRITER_ID: u16 = 62541;
const PUBLISHER_ID: u16 = 2234;
const SUB_NODE_ID: u32 = 50002;

struct Fixture {
    manager: PubSubManager,
    connection: PubSubId,
    data_set: PubSubId,
}

/// One UDP-UADP connection and an empty published data set, the base of every scenario.
/// Each scenario runs on its own port so parallel tests do not see each other's traffic.
fn minimal_pubsub_configuration(port: u16) -> Fixture {
    let mut manager = PubSubManager::new();
    let connection = manager
        .add_connection(&PubSubConnectionConfig {
            name: UAString::from("UDP-UADP Connection 1"),
            address: UAString::from(format!("opc.udp://224.0.0.22:{}/", port).as_str()),
            publisher_id: PublisherId::UInt16(PUBLISHER_ID),
            ..PubSubConnectionConfig::default()
        })
        .unwrap();
    let data_set = manager
        .add_published_data_set(&PublishedDataSetConfig {
            name: UAString::from("Demo PDS"),
        })
        .unwrap();
    Fixture {
        manager,
        connection,
        data_set,
    }
}

fn add_rt_writer_side(fixture: &mut Fixture, value: u32) -> (PubSubId, StaticValueSource) {
    let group = fixture
        .manager
        .add_writer_group(
            fixture.connection,
            &WriterGroupConfig {
                name: UAString::from("Demo WriterGroup"),
                writer_group_id: WRITER_GROUP_ID,
                publishing_interval: 10.0,
                rt_level: PubSubRtLevel::FixedSize,
                ..WriterGroupConfig::default()
            },
        )
        .unwrap();
    let source = StaticValueSource::new(DataValue::value_only(value));
    fixture
        .manager
        .add_data_set_field(
            fixture.data_set,
            &DataSetFieldConfig {
                field_name_alias: UAString::from("Published Int32"),
                static_value: Some(source.clone()),
                ..DataSetFieldConfig::default()
            },
        )
        .unwrap();
    fixture
        .manager
        .add_data_set_writer(
            group,
            fixture.data_set,
            &DataSetWriterConfig {
                name: UAString::from("Test DataSetWriter"),
                data_set_writer_id: DATA_SET_WRITER_ID,
                ..DataSetWriterConfig::default()
            },
        )
        .unwrap();
    (group, source)
}

fn rt_reader_config(data_type: NodeId) -> DataSetReaderConfig {
    DataSetReaderConfig {
        name: UAString::from("DataSetReader Test"),
        publisher_id: PublisherId::UInt16(PUBLISHER_ID),
        writer_group_id: WRITER_GROUP_ID,
        data_set_writer_id: DATA_SET_WRITER_ID,
        data_set_meta_data: DataSetMetaData {
            name: UAString::from("DataSet Test"),
            fields: vec![FieldMetaData::scalar("Subscribed UInt32", data_type)],
        },
        target_variables: vec![FieldTargetVariable::new(NodeId::new(1, SUB_NODE_ID))],
        ..DataSetReaderConfig::default()
    }
}

/// Registers the subscriber's target variable on an external backend and returns the cell
/// plus the write notification counter.
fn external_sub_variable(manager: &mut PubSubManager) -> (StaticValueSource, Arc<AtomicUsize>) {
    let cell = StaticValueSource::new(DataValue::value_only(0u32));
    let writes = Arc::new(AtomicUsize::new(0));
    let counter = writes.clone();
    manager.register_value_backend(
        NodeId::new(1, SUB_NODE_ID),
        ValueBackend::External {
            value: cell.clone(),
            user_write: Some(Arc::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            notification_read: None,
        },
    );
    (cell, writes)
}

#[test]
fn subscribe_single_field_with_fixed_offsets() {
    let mut fixture = minimal_pubsub_configuration(24840);
    let (writer_group, _source) = add_rt_writer_side(&mut fixture, 1000);

    let reader_group = fixture
        .manager
        .add_reader_group(
            fixture.connection,
            &ReaderGroupConfig {
                name: UAString::from("ReaderGroup Test"),
                rt_level: PubSubRtLevel::FixedSize,
            },
        )
        .unwrap();
    fixture
        .manager
        .add_data_set_reader(reader_group, &rt_reader_config(NodeId::new(0, 7u32)))
        .unwrap();
    let (cell, writes) = external_sub_variable(&mut fixture.manager);

    assert!(fixture
        .manager
        .freeze_reader_group_configuration(reader_group)
        .is_ok());
    assert!(fixture
        .manager
        .freeze_writer_group_configuration(writer_group)
        .is_ok());
    assert!(fixture
        .manager
        .set_writer_group_operational(writer_group)
        .is_ok());

    // Unfreeze and refreeze the reader side, the layout is rebuilt identically
    assert!(fixture
        .manager
        .unfreeze_reader_group_configuration(reader_group)
        .is_ok());
    assert!(fixture
        .manager
        .freeze_reader_group_configuration(reader_group)
        .is_ok());

    // One publish tick, then receive it off the multicast loop
    fixture.manager.publish_writer_group(writer_group).unwrap();
    let received = fixture
        .manager
        .receive(fixture.connection, Duration::from_secs(2))
        .unwrap();
    assert!(received > 0, "expected message not received");

    // The subscriber's external memory holds the published value and the write callback
    // ran exactly once
    assert_eq!(cell.get().value, Some(Variant::UInt32(1000)));
    assert_eq!(writes.load(Ordering::SeqCst), 1);
}

#[test]
fn published_value_follows_the_source_across_ticks() {
    let mut fixture = minimal_pubsub_configuration(24841);
    let (writer_group, source) = add_rt_writer_side(&mut fixture, 1000);
    let reader_group = fixture
        .manager
        .add_reader_group(
            fixture.connection,
            &ReaderGroupConfig {
                name: UAString::from("ReaderGroup Test"),
                rt_level: PubSubRtLevel::FixedSize,
            },
        )
        .unwrap();
    fixture
        .manager
        .add_data_set_reader(reader_group, &rt_reader_config(NodeId::new(0, 7u32)))
        .unwrap();
    let (cell, writes) = external_sub_variable(&mut fixture.manager);

    fixture
        .manager
        .freeze_reader_group_configuration(reader_group)
        .unwrap();
    fixture
        .manager
        .freeze_writer_group_configuration(writer_group)
        .unwrap();
    fixture
        .manager
        .set_writer_group_operational(writer_group)
        .unwrap();

    fixture.manager.publish_writer_group(writer_group).unwrap();
    fixture
        .manager
        .receive(fixture.connection, Duration::from_secs(2))
        .unwrap();
    assert_eq!(cell.get().value, Some(Variant::UInt32(1000)));

    // The application swaps the whole DataValue; the next tick publishes the new value
    source.set(DataValue::value_only(2000u32));
    fixture.manager.publish_writer_group(writer_group).unwrap();
    fixture
        .manager
        .receive(fixture.connection, Duration::from_secs(2))
        .unwrap();
    assert_eq!(cell.get().value, Some(Variant::UInt32(2000)));
    assert_eq!(writes.load(Ordering::SeqCst), 2);
}

#[test]
fn freeze_rejects_unsupported_metadata_type() {
    let mut fixture = minimal_pubsub_configuration(24842);
    let reader_group = fixture
        .manager
        .add_reader_group(
            fixture.connection,
            &ReaderGroupConfig {
                name: UAString::from("ReaderGroup Test"),
                rt_level: PubSubRtLevel::FixedSize,
            },
        )
        .unwrap();
    // DateTime metadata - fixed wire size, but clock driven and rejected for realtime
    fixture
        .manager
        .add_data_set_reader(reader_group, &rt_reader_config(NodeId::new(0, 13u32)))
        .unwrap();
    let (_cell, _writes) = external_sub_variable(&mut fixture.manager);

    assert_eq!(
        fixture
            .manager
            .freeze_reader_group_configuration(reader_group)
            .unwrap_err(),
        StatusCode::BadNotSupported
    );
    // Unfreezing an unfrozen group succeeds and does nothing
    assert!(fixture
        .manager
        .unfreeze_reader_group_configuration(reader_group)
        .is_ok());
}

#[test]
fn freeze_rejects_multiple_readers() {
    let mut fixture = minimal_pubsub_configuration(24843);
    let reader_group = fixture
        .manager
        .add_reader_group(
            fixture.connection,
            &ReaderGroupConfig {
                name: UAString::from("ReaderGroup Test"),
                rt_level: PubSubRtLevel::FixedSize,
            },
        )
        .unwrap();
    fixture
        .manager
        .add_data_set_reader(reader_group, &rt_reader_config(NodeId::new(0, 13u32)))
        .unwrap();
    let second = fixture
        .manager
        .add_data_set_reader(reader_group, &rt_reader_config(NodeId::new(0, 13u32)))
        .unwrap();
    let (_cell, _writes) = external_sub_variable(&mut fixture.manager);

    // Two readers under a fixed layout
    assert_eq!(
        fixture
            .manager
            .freeze_reader_group_configuration(reader_group)
            .unwrap_err(),
        StatusCode::BadNotImplemented
    );
    assert!(fixture
        .manager
        .unfreeze_reader_group_configuration(reader_group)
        .is_ok());
    fixture.manager.remove_data_set_reader(second).unwrap();

    // One reader left, now the DateTime metadata is what stops the freeze
    assert_eq!(
        fixture
            .manager
            .freeze_reader_group_configuration(reader_group)
            .unwrap_err(),
        StatusCode::BadNotSupported
    );
    assert!(fixture
        .manager
        .unfreeze_reader_group_configuration(reader_group)
        .is_ok());
}

#[test]
fn node_bound_field_cannot_join_a_fixed_size_group() {
    let mut fixture = minimal_pubsub_configuration(24844);
    let group = fixture
        .manager
        .add_writer_group(
            fixture.connection,
            &WriterGroupConfig {
                name: UAString::from("Demo WriterGroup"),
                writer_group_id: WRITER_GROUP_ID,
                publishing_interval: 10.0,
                rt_level: PubSubRtLevel::FixedSize,
                ..WriterGroupConfig::default()
            },
        )
        .unwrap();

    // The field samples a node instead of a static value source
    fixture
        .manager
        .add_data_set_field(
            fixture.data_set,
            &DataSetFieldConfig {
                field_name_alias: UAString::from("variable"),
                published_variable: NodeId::new(1, 1000u32),
                ..DataSetFieldConfig::default()
            },
        )
        .unwrap();

    assert_eq!(
        fixture
            .manager
            .add_data_set_writer(
                group,
                fixture.data_set,
                &DataSetWriterConfig {
                    name: UAString::from("Test DataSetWriter"),
                    data_set_writer_id: DATA_SET_WRITER_ID,
                    ..DataSetWriterConfig::default()
                },
            )
            .unwrap_err(),
        StatusCode::BadConfigurationError
    );
}

#[test]
fn frozen_configuration_is_locked() {
    let mut fixture = minimal_pubsub_configuration(24845);
    let (writer_group, _source) = add_rt_writer_side(&mut fixture, 1000);

    fixture
        .manager
        .freeze_writer_group_configuration(writer_group)
        .unwrap();
    let fields_before = fixture
        .manager
        .find_published_data_set(fixture.data_set)
        .unwrap()
        .fields()
        .len();

    // The data set feeds a frozen group, so its layout is locked
    assert_eq!(
        fixture
            .manager
            .add_data_set_field(
                fixture.data_set,
                &DataSetFieldConfig {
                    static_value: Some(StaticValueSource::new(DataValue::value_only(1u32))),
                    ..DataSetFieldConfig::default()
                },
            )
            .unwrap_err(),
        StatusCode::BadConfigurationError
    );
    let fields_after = fixture
        .manager
        .find_published_data_set(fixture.data_set)
        .unwrap()
        .fields()
        .len();
    assert_eq!(fields_before, fields_after);

    // Unfreeze is idempotent
    assert!(fixture
        .manager
        .unfreeze_writer_group_configuration(writer_group)
        .is_ok());
    assert!(fixture
        .manager
        .unfreeze_writer_group_configuration(writer_group)
        .is_ok());

    // And the lock is gone
    assert!(fixture
        .manager
        .add_data_set_field(
            fixture.data_set,
            &DataSetFieldConfig {
                static_value: Some(StaticValueSource::new(DataValue::value_only(1u32))),
                ..DataSetFieldConfig::default()
            },
        )
        .is_ok());
}
