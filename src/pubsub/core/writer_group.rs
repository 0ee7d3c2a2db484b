// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the writer group - one or more data set writers publishing together under a
//! publishing interval, with an optional frozen fixed-offset send buffer.

use std::io::Cursor;

use crate::pubsub::uadp::{OffsetBuffer, UadpNetworkMessage, UadpNetworkMessageContentMask};
use crate::types::{encoding::EncodingResult, status_code::StatusCode, string::UAString};

use super::{data_set_writer::DataSetWriter, PubSubEncoding, PubSubId, PubSubRtLevel};

/// Message settings of a writer group for the UADP mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UadpWriterGroupMessageSettings {
    /// Raw UadpNetworkMessageContentMask bits. Validated when messages are built.
    pub network_message_content_mask: u32,
}

impl Default for UadpWriterGroupMessageSettings {
    fn default() -> Self {
        Self {
            network_message_content_mask: (UadpNetworkMessageContentMask::PUBLISHER_ID
                | UadpNetworkMessageContentMask::GROUP_HEADER
                | UadpNetworkMessageContentMask::WRITER_GROUP_ID
                | UadpNetworkMessageContentMask::PAYLOAD_HEADER)
                .bits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterGroupConfig {
    pub name: UAString,
    pub writer_group_id: u16,
    /// Publishing interval in milliseconds. The host scheduler drives the tick.
    pub publishing_interval: f64,
    pub enabled: bool,
    pub rt_level: PubSubRtLevel,
    pub encoding: PubSubEncoding,
    pub group_version: u32,
    pub message_settings: UadpWriterGroupMessageSettings,
}

impl Default for WriterGroupConfig {
    fn default() -> Self {
        Self {
            name: UAString::null(),
            writer_group_id: 0,
            publishing_interval: 100.0,
            enabled: false,
            rt_level: PubSubRtLevel::default(),
            encoding: PubSubEncoding::default(),
            group_version: 0,
            message_settings: UadpWriterGroupMessageSettings::default(),
        }
    }
}

/// A writer group. Owns its writers and, when frozen for realtime, the pre-encoded send
/// buffer with its offset table.
#[derive(Debug)]
pub struct WriterGroup {
    pub id: PubSubId,
    pub config: WriterGroupConfig,
    writers: Vec<DataSetWriter>,
    sequence_number: u16,
    frozen: bool,
    offset_buffer: Option<OffsetBuffer>,
    /// Reused across ticks on the ordinary path; realtime sends from the offset buffer
    send_buffer: Vec<u8>,
}

impl WriterGroup {
    pub fn new(id: PubSubId, config: &WriterGroupConfig) -> Self {
        Self {
            id,
            config: config.clone(),
            writers: Vec::new(),
            sequence_number: 0,
            frozen: false,
            offset_buffer: None,
            send_buffer: Vec::new(),
        }
    }

    pub fn writers(&self) -> &[DataSetWriter] {
        &self.writers
    }

    pub fn writers_mut(&mut self) -> &mut [DataSetWriter] {
        &mut self.writers
    }

    pub fn add_writer(&mut self, writer: DataSetWriter) {
        self.writers.push(writer);
    }

    pub fn remove_writer(&mut self, id: PubSubId) -> bool {
        let len = self.writers.len();
        self.writers.retain(|w| w.id != id);
        self.writers.len() != len
    }

    /// True while the group configuration is locked.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Fails with the configuration lock error when the group is frozen. Every mutation
    /// of the group or anything it references goes through this.
    pub fn check_unlocked(&self) -> Result<(), StatusCode> {
        if self.frozen {
            error!(
                "Writer group {} is frozen, its configuration cannot change",
                self.id
            );
            Err(StatusCode::BadConfigurationError)
        } else {
            Ok(())
        }
    }

    /// Marks the group frozen, attaching the fixed-offset buffer when realtime.
    pub fn freeze(&mut self, offset_buffer: Option<OffsetBuffer>) {
        self.frozen = true;
        self.offset_buffer = offset_buffer;
    }

    /// Releases the offset buffer and clears the frozen flag. Idempotent.
    pub fn unfreeze(&mut self) {
        self.frozen = false;
        self.offset_buffer = None;
    }

    pub fn offset_buffer(&self) -> Option<&OffsetBuffer> {
        self.offset_buffer.as_ref()
    }

    pub fn offset_buffer_mut(&mut self) -> Option<&mut OffsetBuffer> {
        self.offset_buffer.as_mut()
    }

    /// Encodes a message into the group's reusable send buffer.
    pub fn encode_to_send_buffer(&mut self, nm: &UadpNetworkMessage) -> EncodingResult<()> {
        let mut buffer = std::mem::take(&mut self.send_buffer);
        buffer.clear();
        let mut stream = Cursor::new(buffer);
        let result = nm.encode(&mut stream);
        self.send_buffer = stream.into_inner();
        result?;
        Ok(())
    }

    pub fn send_buffer(&self) -> &[u8] {
        &self.send_buffer
    }

    /// Advances and returns the group header sequence number, wrapping at 2^16. This is
    /// deliberately a separate counter from the per-writer numbers.
    pub fn next_sequence_number(&mut self) -> u16 {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.sequence_number
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }
}
