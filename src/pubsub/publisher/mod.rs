// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The publish pipeline - sample the fields of each writer's data set, build the
//! DataSetMessages, assemble the NetworkMessage. The realtime path never does any of
//! that after the freeze; it patches the group's pre-encoded buffer at the recorded
//! offsets instead.

use crate::pubsub::core::{
    DataSetField, DataSetWriter, PublishedDataSet, ValueBackendRegistry, WriterGroup,
};
use crate::pubsub::uadp::{
    DataSetFieldEncoding, DataSetMessage, DataSetMessageHeader, NetworkMessageOffsetKind,
    PublisherId, UadpDataSetMessageContentMask, UadpGroupHeader, UadpNetworkMessage,
    UadpNetworkMessageContentMask,
};
use crate::types::{
    date_time::DateTime,
    encoding::EncodingResult,
    status_code::StatusCode,
    variant::Variant,
};

/// What a network message is being built for. A tick advances sequence numbers and honours
/// writer enablement; a freeze template does neither, it fixes the layout of every writer
/// with the counters as they stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Tick,
    FreezeTemplate,
}

/// Samples one field through its value source. A field with a static source loads the
/// caller's cell once; a node bound field goes through the value backend registry. A value
/// that cannot be read publishes as empty rather than stalling the whole group.
pub fn sample_field(field: &DataSetField, backends: &ValueBackendRegistry) -> Variant {
    if let Some(ref source) = field.config.static_value {
        source.get().value.clone().unwrap_or(Variant::Empty)
    } else {
        match backends.read_value(&field.config.published_variable) {
            Ok(value) => value.value.unwrap_or(Variant::Empty),
            Err(err) => {
                warn!(
                    "Field {} could not be sampled from {}, error {}",
                    field.id, field.config.published_variable, err
                );
                Variant::Empty
            }
        }
    }
}

/// Builds the DataSetMessage of one writer from sampled field values.
pub fn build_data_set_message(
    writer: &mut DataSetWriter,
    fields: &[Variant],
    mode: BuildMode,
) -> EncodingResult<DataSetMessage> {
    let mask = UadpDataSetMessageContentMask::validate(
        writer.config.message_settings.data_set_message_content_mask,
    )?;
    let sequence_number = if mask.contains(UadpDataSetMessageContentMask::SEQUENCE_NUMBER) {
        Some(match mode {
            BuildMode::Tick => writer.next_sequence_number(),
            BuildMode::FreezeTemplate => writer.sequence_number(),
        })
    } else {
        None
    };
    let header = DataSetMessageHeader {
        valid: true,
        field_encoding: writer.config.field_encoding,
        sequence_number,
        timestamp: mask
            .contains(UadpDataSetMessageContentMask::TIMESTAMP)
            .then(DateTime::now),
        picoseconds: mask
            .contains(UadpDataSetMessageContentMask::PICO_SECONDS)
            .then(|| 0),
        status: mask
            .contains(UadpDataSetMessageContentMask::STATUS)
            .then(|| (StatusCode::Good.bits() >> 16) as u16),
        config_major_version: mask
            .contains(UadpDataSetMessageContentMask::MAJOR_VERSION)
            .then(|| 1),
        config_minor_version: mask
            .contains(UadpDataSetMessageContentMask::MINOR_VERSION)
            .then(|| 0),
    };
    match writer.config.field_encoding {
        DataSetFieldEncoding::RawData => DataSetMessage::key_frame_raw(header, fields),
        DataSetFieldEncoding::Variant => Ok(DataSetMessage::key_frame(header, fields.to_vec())),
    }
}

/// Assembles the NetworkMessage of one group tick - one DataSetMessage per writer, in the
/// order the writers were added.
pub fn build_network_message(
    group: &mut WriterGroup,
    publisher_id: PublisherId,
    data_sets: &[PublishedDataSet],
    backends: &ValueBackendRegistry,
    mode: BuildMode,
) -> EncodingResult<UadpNetworkMessage> {
    let mask = UadpNetworkMessageContentMask::validate(
        group.config.message_settings.network_message_content_mask,
    )?;
    let writer_group_id = group.config.writer_group_id;
    let group_version = group.config.group_version;
    let group_sequence_number = if mask.contains(UadpNetworkMessageContentMask::SEQUENCE_NUMBER) {
        Some(match mode {
            BuildMode::Tick => group.next_sequence_number(),
            BuildMode::FreezeTemplate => group.sequence_number(),
        })
    } else {
        None
    };

    let mut writer_ids = Vec::new();
    let mut payload = Vec::new();
    for writer in group.writers_mut() {
        if mode == BuildMode::Tick && !writer.enabled {
            continue;
        }
        let data_set = data_sets
            .iter()
            .find(|d| d.id == writer.data_set)
            .ok_or_else(|| {
                error!(
                    "Writer {} references data set {} which does not exist",
                    writer.id, writer.data_set
                );
                StatusCode::BadConfigurationError
            })?;
        let fields = data_set
            .fields()
            .iter()
            .map(|f| sample_field(f, backends))
            .collect::<Vec<_>>();
        let dsm = build_data_set_message(writer, &fields, mode)?;
        writer_ids.push(writer.config.data_set_writer_id);
        payload.push(dsm);
    }

    let group_header = if mask.contains(UadpNetworkMessageContentMask::GROUP_HEADER) {
        Some(UadpGroupHeader {
            writer_group_id: mask
                .contains(UadpNetworkMessageContentMask::WRITER_GROUP_ID)
                .then(|| writer_group_id),
            group_version: mask
                .contains(UadpNetworkMessageContentMask::GROUP_VERSION)
                .then(|| group_version),
            network_message_number: mask
                .contains(UadpNetworkMessageContentMask::NETWORK_MESSAGE_NUMBER)
                .then(|| 1),
            sequence_number: group_sequence_number,
        })
    } else {
        None
    };

    Ok(UadpNetworkMessage {
        publisher_id: mask
            .contains(UadpNetworkMessageContentMask::PUBLISHER_ID)
            .then(|| publisher_id),
        dataset_class_id: None,
        group_header,
        dataset_payload_header: mask
            .contains(UadpNetworkMessageContentMask::PAYLOAD_HEADER)
            .then(|| writer_ids),
        timestamp: mask
            .contains(UadpNetworkMessageContentMask::TIMESTAMP)
            .then(DateTime::now),
        picoseconds: mask
            .contains(UadpNetworkMessageContentMask::PICO_SECONDS)
            .then(|| 0),
        payload,
    })
}

/// The realtime publish path. Walks the offset table of the frozen group - sequence
/// numbers advance in place, and every payload field is re-read from its static value
/// source and written over its patch site. Nothing else in the buffer changes.
pub fn patch_frozen_message(
    group: &mut WriterGroup,
    data_sets: &[PublishedDataSet],
) -> EncodingResult<()> {
    let entries = match group.offset_buffer() {
        Some(offset_buffer) => offset_buffer.offsets().to_vec(),
        None => {
            error!("Writer group {} has no frozen buffer", group.id);
            return Err(StatusCode::BadInvalidState);
        }
    };
    for (index, entry) in entries.iter().enumerate() {
        match entry.kind {
            NetworkMessageOffsetKind::GroupSequenceNumber => {
                let value = group.next_sequence_number();
                if let Some(offset_buffer) = group.offset_buffer_mut() {
                    offset_buffer.patch_u16(index, value)?;
                }
            }
            NetworkMessageOffsetKind::DataSetSequenceNumber { data_set } => {
                let value = group
                    .writers_mut()
                    .get_mut(data_set)
                    .ok_or(StatusCode::BadInternalError)?
                    .next_sequence_number();
                if let Some(offset_buffer) = group.offset_buffer_mut() {
                    offset_buffer.patch_u16(index, value)?;
                }
            }
            NetworkMessageOffsetKind::PayloadField { data_set, field, .. } => {
                let writer = group
                    .writers()
                    .get(data_set)
                    .ok_or(StatusCode::BadInternalError)?;
                let ds = data_sets
                    .iter()
                    .find(|d| d.id == writer.data_set)
                    .ok_or(StatusCode::BadConfigurationError)?;
                let ds_field = ds
                    .fields()
                    .get(field)
                    .ok_or(StatusCode::BadConfigurationError)?;
                let source = ds_field
                    .config
                    .static_value
                    .as_ref()
                    .ok_or(StatusCode::BadConfigurationError)?;
                let value = source.get().value.clone().ok_or_else(|| {
                    error!(
                        "Field {} of data set {} has no value to publish",
                        ds_field.id, ds.id
                    );
                    StatusCode::BadConfigurationError
                })?;
                if let Some(offset_buffer) = group.offset_buffer_mut() {
                    offset_buffer.patch_field(index, &value)?;
                }
            }
        }
    }
    Ok(())
}
