// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the data set reader - the matcher and decoder that turns incoming
//! DataSetMessages into writes on target variables.

use std::convert::TryFrom;

use crate::pubsub::uadp::{
    DataSetMessage, DataSetMessageBody, DataSetMessageHeader, NetworkMessageOffsetKind,
    OffsetBuffer, PublisherId, UadpDataSetMessageContentMask, UadpGroupHeader,
    UadpNetworkMessage, UadpNetworkMessageContentMask,
};
use crate::types::{
    data_value::DataValue,
    encoding::{DecodingOptions, EncodingResult},
    node_id::NodeId,
    status_code::StatusCode,
    string::UAString,
    variant::{Variant, VariantTypeId},
};

use super::{value_backend::ValueBackendRegistry, PubSubId, ATTRIBUTE_ID_VALUE};

/// Describes one expected field of the subscribed data set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetaData {
    pub name: UAString,
    /// The ns=0 data type node of the field value
    pub data_type: NodeId,
    /// -1 for scalar, >= 1 for array ranks
    pub value_rank: i32,
}

impl FieldMetaData {
    pub fn scalar(name: &str, data_type: NodeId) -> Self {
        Self {
            name: UAString::from(name),
            data_type,
            value_rank: -1,
        }
    }

    /// Resolves the field's built-in type, failing on types the data plane cannot carry.
    pub fn built_in_type(&self) -> EncodingResult<VariantTypeId> {
        VariantTypeId::try_from(&self.data_type)
    }
}

/// The schema a reader expects, field by field, in field index order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSetMetaData {
    pub name: UAString,
    pub fields: Vec<FieldMetaData>,
}

/// Binds one field index to the address space node receiving its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTargetVariable {
    pub target_node_id: NodeId,
    pub attribute_id: u32,
}

impl FieldTargetVariable {
    pub fn new(target_node_id: NodeId) -> Self {
        Self {
            target_node_id,
            attribute_id: ATTRIBUTE_ID_VALUE,
        }
    }
}

/// Message settings of a data set reader for the UADP mapping. These mirror the writer
/// side so the reader can anticipate the exact shape of incoming messages; the defaults
/// match the writer side defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UadpDataSetReaderMessageSettings {
    pub network_message_content_mask: u32,
    pub data_set_message_content_mask: u32,
}

impl Default for UadpDataSetReaderMessageSettings {
    fn default() -> Self {
        Self {
            network_message_content_mask: (UadpNetworkMessageContentMask::PUBLISHER_ID
                | UadpNetworkMessageContentMask::GROUP_HEADER
                | UadpNetworkMessageContentMask::WRITER_GROUP_ID
                | UadpNetworkMessageContentMask::PAYLOAD_HEADER)
                .bits(),
            data_set_message_content_mask: UadpDataSetMessageContentMask::SEQUENCE_NUMBER.bits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetReaderConfig {
    pub name: UAString,
    /// Match key part 1 - the id of the publishing application
    pub publisher_id: PublisherId,
    /// Match key part 2 - the writer group id in the group header
    pub writer_group_id: u16,
    /// Match key part 3 - the data set writer id in the payload header
    pub data_set_writer_id: u16,
    pub message_settings: UadpDataSetReaderMessageSettings,
    pub data_set_meta_data: DataSetMetaData,
    pub target_variables: Vec<FieldTargetVariable>,
}

impl Default for DataSetReaderConfig {
    fn default() -> Self {
        Self {
            name: UAString::null(),
            publisher_id: PublisherId::default(),
            writer_group_id: 0,
            data_set_writer_id: 0,
            message_settings: UadpDataSetReaderMessageSettings::default(),
            data_set_meta_data: DataSetMetaData::default(),
            target_variables: Vec::new(),
        }
    }
}

/// A data set reader. When its group is frozen for realtime it carries the buffered
/// message layout of the one message shape it accepts.
#[derive(Debug)]
pub struct DataSetReader {
    pub id: PubSubId,
    pub config: DataSetReaderConfig,
    offset_buffer: Option<OffsetBuffer>,
    dropped_messages: u64,
}

impl DataSetReader {
    pub fn new(id: PubSubId, config: &DataSetReaderConfig) -> Self {
        Self {
            id,
            config: config.clone(),
            offset_buffer: None,
            dropped_messages: 0,
        }
    }

    /// The match test. A writer and reader belong together iff publisher id, writer group
    /// id and data set writer id all agree. Numeric publisher ids compare by value
    /// regardless of their wire width.
    pub fn matches(
        &self,
        publisher_id: &PublisherId,
        writer_group_id: u16,
        data_set_writer_id: u16,
    ) -> bool {
        self.config.publisher_id.as_u64() == publisher_id.as_u64()
            && self.config.writer_group_id == writer_group_id
            && self.config.data_set_writer_id == data_set_writer_id
    }

    /// Messages this reader matched but could not decode. Monotonic.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    pub(crate) fn note_dropped(&mut self) {
        self.dropped_messages += 1;
    }

    pub fn offset_buffer(&self) -> Option<&OffsetBuffer> {
        self.offset_buffer.as_ref()
    }

    pub(crate) fn set_offset_buffer(&mut self, offset_buffer: OffsetBuffer) {
        self.offset_buffer = Some(offset_buffer);
    }

    pub(crate) fn clear_offset_buffer(&mut self) {
        self.offset_buffer = None;
    }

    /// The expected built-in type of every field, in field index order.
    pub fn field_types(&self) -> EncodingResult<Vec<VariantTypeId>> {
        self.config
            .data_set_meta_data
            .fields
            .iter()
            .map(|f| f.built_in_type())
            .collect()
    }

    /// Synthesizes the one NetworkMessage shape this reader accepts under a fixed layout,
    /// with type-default placeholder values in every field position.
    pub fn template_network_message(&self) -> EncodingResult<UadpNetworkMessage> {
        let mask = UadpNetworkMessageContentMask::validate(
            self.config.message_settings.network_message_content_mask,
        )?;
        let field_types = self.field_types()?;
        let placeholders = field_types
            .iter()
            .map(|t| placeholder_value(*t))
            .collect::<EncodingResult<Vec<_>>>()?;

        let dsm_mask = UadpDataSetMessageContentMask::validate(
            self.config.message_settings.data_set_message_content_mask,
        )?;
        // Mirrors what the writer side puts in these header fields so the layouts agree
        let header = DataSetMessageHeader {
            sequence_number: dsm_mask
                .contains(UadpDataSetMessageContentMask::SEQUENCE_NUMBER)
                .then(|| 0),
            config_major_version: dsm_mask
                .contains(UadpDataSetMessageContentMask::MAJOR_VERSION)
                .then(|| 1),
            config_minor_version: dsm_mask
                .contains(UadpDataSetMessageContentMask::MINOR_VERSION)
                .then(|| 0),
            ..DataSetMessageHeader::default()
        };
        let dsm = DataSetMessage::key_frame_raw(header, &placeholders)?;

        let group_header = if mask.contains(UadpNetworkMessageContentMask::GROUP_HEADER) {
            Some(UadpGroupHeader {
                writer_group_id: mask
                    .contains(UadpNetworkMessageContentMask::WRITER_GROUP_ID)
                    .then(|| self.config.writer_group_id),
                group_version: mask
                    .contains(UadpNetworkMessageContentMask::GROUP_VERSION)
                    .then(|| 0),
                network_message_number: mask
                    .contains(UadpNetworkMessageContentMask::NETWORK_MESSAGE_NUMBER)
                    .then(|| 1),
                sequence_number: mask
                    .contains(UadpNetworkMessageContentMask::SEQUENCE_NUMBER)
                    .then(|| 0),
            })
        } else {
            None
        };

        Ok(UadpNetworkMessage {
            publisher_id: mask
                .contains(UadpNetworkMessageContentMask::PUBLISHER_ID)
                .then(|| self.config.publisher_id),
            dataset_class_id: None,
            group_header,
            dataset_payload_header: mask
                .contains(UadpNetworkMessageContentMask::PAYLOAD_HEADER)
                .then(|| vec![self.config.data_set_writer_id]),
            timestamp: None,
            picoseconds: None,
            payload: vec![dsm],
        })
    }

    /// The realtime receive path - validates the packet against the frozen layout and
    /// writes each field value straight through the target variables' backends, in field
    /// index order. The caller has already matched this reader.
    pub fn update_buffered(
        &self,
        packet: &[u8],
        backends: &mut ValueBackendRegistry,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<()> {
        let offset_buffer = self.offset_buffer.as_ref().ok_or_else(|| {
            error!("Reader {} has no frozen layout", self.id);
            StatusCode::BadInvalidState
        })?;
        let values = offset_buffer.update_from(packet, decoding_options)?;
        for (entry, value) in values {
            if let NetworkMessageOffsetKind::PayloadField { field, .. } = entry.kind {
                let target = self.config.target_variables.get(field).ok_or_else(|| {
                    error!("Reader {} has no target for field {}", self.id, field);
                    StatusCode::BadConfigurationError
                })?;
                backends.write_value(&target.target_node_id, DataValue::value_only(value))?;
            }
        }
        Ok(())
    }

    /// The ordinary receive path - decodes the fields of a matched DataSetMessage and
    /// writes them to the target variables in field index order.
    pub fn process_data_set_message(
        &self,
        dsm: &DataSetMessage,
        backends: &mut ValueBackendRegistry,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<()> {
        match &dsm.body {
            DataSetMessageBody::KeyFrame(fields) | DataSetMessageBody::Event(fields) => {
                if fields.len() != self.config.target_variables.len() {
                    error!(
                        "Reader {} received {} fields for {} targets",
                        self.id,
                        fields.len(),
                        self.config.target_variables.len()
                    );
                    return Err(StatusCode::BadDecodingError);
                }
                for (field, value) in fields.iter().enumerate() {
                    self.write_target(field, value.clone(), backends)?;
                }
            }
            DataSetMessageBody::RawKeyFrame(_) => {
                let field_types = self.field_types()?;
                let fields = dsm.decode_raw_fields(&field_types, decoding_options)?;
                if fields.len() != self.config.target_variables.len() {
                    error!(
                        "Reader {} received {} fields for {} targets",
                        self.id,
                        fields.len(),
                        self.config.target_variables.len()
                    );
                    return Err(StatusCode::BadDecodingError);
                }
                for (field, value) in fields.into_iter().enumerate() {
                    self.write_target(field, value, backends)?;
                }
            }
            DataSetMessageBody::DeltaFrame(fields) => {
                for (field, value) in fields {
                    self.write_target(*field as usize, value.clone(), backends)?;
                }
            }
            DataSetMessageBody::KeepAlive => {}
        }
        Ok(())
    }

    fn write_target(
        &self,
        field: usize,
        value: Variant,
        backends: &mut ValueBackendRegistry,
    ) -> EncodingResult<()> {
        let target = self.config.target_variables.get(field).ok_or_else(|| {
            error!("Reader {} has no target for field {}", self.id, field);
            StatusCode::BadDecodingError
        })?;
        backends.write_value(&target.target_node_id, DataValue::value_only(value))
    }
}

/// The placeholder a fixed layout template carries in a field position, the type default.
fn placeholder_value(type_id: VariantTypeId) -> EncodingResult<Variant> {
    use crate::types::guid::Guid;
    let value = match type_id {
        VariantTypeId::Boolean => Variant::Boolean(false),
        VariantTypeId::SByte => Variant::SByte(0),
        VariantTypeId::Byte => Variant::Byte(0),
        VariantTypeId::Int16 => Variant::Int16(0),
        VariantTypeId::UInt16 => Variant::UInt16(0),
        VariantTypeId::Int32 => Variant::Int32(0),
        VariantTypeId::UInt32 => Variant::UInt32(0),
        VariantTypeId::Int64 => Variant::Int64(0),
        VariantTypeId::UInt64 => Variant::UInt64(0),
        VariantTypeId::Float => Variant::Float(0.0),
        VariantTypeId::Double => Variant::Double(0.0),
        VariantTypeId::StatusCode => Variant::StatusCode(StatusCode::Good),
        VariantTypeId::Guid => Variant::Guid(Box::new(Guid::null())),
        type_id => {
            error!("Type {:?} has no fixed layout placeholder", type_id);
            return Err(StatusCode::BadNotSupported);
        }
    };
    Ok(value)
}
