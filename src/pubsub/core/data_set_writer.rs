// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the data set writer - the binding of one published data set to a slot in the
//! group's network messages.

use crate::pubsub::uadp::{DataSetFieldEncoding, UadpDataSetMessageContentMask};
use crate::types::string::UAString;

use super::PubSubId;

/// Message settings of a data set writer for the UADP mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UadpDataSetWriterMessageSettings {
    /// Raw UadpDataSetMessageContentMask bits. Validated when messages are built.
    pub data_set_message_content_mask: u32,
}

impl Default for UadpDataSetWriterMessageSettings {
    fn default() -> Self {
        Self {
            data_set_message_content_mask: UadpDataSetMessageContentMask::SEQUENCE_NUMBER.bits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetWriterConfig {
    pub name: UAString,
    /// Identifies this writer inside its group, carried in the payload header
    pub data_set_writer_id: u16,
    pub field_encoding: DataSetFieldEncoding,
    pub message_settings: UadpDataSetWriterMessageSettings,
}

impl Default for DataSetWriterConfig {
    fn default() -> Self {
        Self {
            name: UAString::null(),
            data_set_writer_id: 0,
            field_encoding: DataSetFieldEncoding::default(),
            message_settings: UadpDataSetWriterMessageSettings::default(),
        }
    }
}

/// A data set writer. Writers publish in the order they were added to their group, and
/// each keeps its own wrapping sequence number independent of the group header's.
#[derive(Debug)]
pub struct DataSetWriter {
    pub id: PubSubId,
    pub config: DataSetWriterConfig,
    /// The published data set this writer samples
    pub data_set: PubSubId,
    pub enabled: bool,
    sequence_number: u16,
}

impl DataSetWriter {
    pub fn new(id: PubSubId, config: &DataSetWriterConfig, data_set: PubSubId) -> Self {
        Self {
            id,
            config: config.clone(),
            data_set,
            enabled: true,
            sequence_number: 0,
        }
    }

    /// Advances and returns the writer's sequence number, wrapping at 2^16.
    pub fn next_sequence_number(&mut self) -> u16 {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.sequence_number
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }
}
