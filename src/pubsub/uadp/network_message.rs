// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the UADP NetworkMessage and its binary encoding. The layout follows OPC UA
//! Part 14 7.2.2.2 - a version/flags byte, optional extended flags, then the optional
//! header blocks gated by those flags, then one or more DataSetMessages.

use std::io::{Cursor, Read, Write};

use crate::types::{
    date_time::DateTime, encoding::*, guid::Guid, status_code::StatusCode,
};

use super::data_set_message::DataSetMessage;

/// UADP protocol version encoded in the low nibble of the first byte
pub const UADP_VERSION: u8 = 1;

bitflags! {
    /// Selects which optional parts of a NetworkMessage appear on the wire. The numeric
    /// values are those of the UadpNetworkMessageContentMask data type.
    pub struct UadpNetworkMessageContentMask: u32 {
        const PUBLISHER_ID = 0x001;
        const GROUP_HEADER = 0x002;
        const WRITER_GROUP_ID = 0x004;
        const GROUP_VERSION = 0x008;
        const NETWORK_MESSAGE_NUMBER = 0x010;
        const SEQUENCE_NUMBER = 0x020;
        const PAYLOAD_HEADER = 0x040;
        const TIMESTAMP = 0x080;
        const PICO_SECONDS = 0x100;
        const DATASET_CLASS_ID = 0x200;
        const PROMOTED_FIELDS = 0x400;
    }
}

impl UadpNetworkMessageContentMask {
    /// Validates a raw mask from configuration. Bits this stack does not know are an
    /// encoding error rather than silently dropped.
    pub fn validate(raw: u32) -> EncodingResult<Self> {
        Self::from_bits(raw).ok_or_else(|| {
            error!("Network message content mask {:#x} contains unknown bits", raw);
            StatusCode::BadEncodingError
        })
    }
}

// Version/flags byte
const FLAG_PUBLISHER_ID: u8 = 0x10;
const FLAG_GROUP_HEADER: u8 = 0x20;
const FLAG_PAYLOAD_HEADER: u8 = 0x40;
const FLAG_EXTENDED_FLAGS_1: u8 = 0x80;
const VERSION_MASK: u8 = 0x0F;

// ExtendedFlags1
const EF1_PUBLISHER_ID_TYPE_MASK: u8 = 0x07;
const EF1_DATASET_CLASS_ID: u8 = 0x08;
const EF1_SECURITY: u8 = 0x10;
const EF1_TIMESTAMP: u8 = 0x20;
const EF1_PICO_SECONDS: u8 = 0x40;
const EF1_EXTENDED_FLAGS_2: u8 = 0x80;

// GroupFlags
const GF_WRITER_GROUP_ID: u8 = 0x01;
const GF_GROUP_VERSION: u8 = 0x02;
const GF_NETWORK_MESSAGE_NUMBER: u8 = 0x04;
const GF_SEQUENCE_NUMBER: u8 = 0x08;

/// The id of the publishing application. The wire size is selected by the publisher id type
/// bits of ExtendedFlags1. String publisher ids are not supported by this stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublisherId {
    Byte(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
}

impl Default for PublisherId {
    fn default() -> Self {
        PublisherId::UInt16(0)
    }
}

impl PublisherId {
    fn id_type(&self) -> u8 {
        match self {
            PublisherId::Byte(_) => 0,
            PublisherId::UInt16(_) => 1,
            PublisherId::UInt32(_) => 2,
            PublisherId::UInt64(_) => 3,
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            PublisherId::Byte(_) => 1,
            PublisherId::UInt16(_) => 2,
            PublisherId::UInt32(_) => 4,
            PublisherId::UInt64(_) => 8,
        }
    }

    /// The id widened to 64 bits, used when matching readers against incoming messages.
    pub fn as_u64(&self) -> u64 {
        match self {
            PublisherId::Byte(v) => u64::from(*v),
            PublisherId::UInt16(v) => u64::from(*v),
            PublisherId::UInt32(v) => u64::from(*v),
            PublisherId::UInt64(v) => *v,
        }
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            PublisherId::Byte(v) => write_u8(stream, *v),
            PublisherId::UInt16(v) => write_u16(stream, *v),
            PublisherId::UInt32(v) => write_u32(stream, *v),
            PublisherId::UInt64(v) => write_u64(stream, *v),
        }
    }

    fn decode<S: Read>(stream: &mut S, id_type: u8) -> EncodingResult<Self> {
        match id_type {
            0 => Ok(PublisherId::Byte(read_u8(stream)?)),
            1 => Ok(PublisherId::UInt16(read_u16(stream)?)),
            2 => Ok(PublisherId::UInt32(read_u32(stream)?)),
            3 => Ok(PublisherId::UInt64(read_u64(stream)?)),
            t => {
                error!("Publisher id type {} is not supported", t);
                Err(StatusCode::BadDecodingError)
            }
        }
    }
}

/// The optional group header of a NetworkMessage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UadpGroupHeader {
    pub writer_group_id: Option<u16>,
    pub group_version: Option<u32>,
    pub network_message_number: Option<u16>,
    pub sequence_number: Option<u16>,
}

impl UadpGroupHeader {
    pub fn byte_len(&self) -> usize {
        // GroupFlags byte plus whichever fields are present
        let mut size = 1;
        size += self.writer_group_id.map_or(0, |_| 2);
        size += self.group_version.map_or(0, |_| 4);
        size += self.network_message_number.map_or(0, |_| 2);
        size += self.sequence_number.map_or(0, |_| 2);
        size
    }

    fn group_flags(&self) -> u8 {
        let mut flags = 0;
        if self.writer_group_id.is_some() {
            flags |= GF_WRITER_GROUP_ID;
        }
        if self.group_version.is_some() {
            flags |= GF_GROUP_VERSION;
        }
        if self.network_message_number.is_some() {
            flags |= GF_NETWORK_MESSAGE_NUMBER;
        }
        if self.sequence_number.is_some() {
            flags |= GF_SEQUENCE_NUMBER;
        }
        flags
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u8(stream, self.group_flags())?;
        if let Some(writer_group_id) = self.writer_group_id {
            size += write_u16(stream, writer_group_id)?;
        }
        if let Some(group_version) = self.group_version {
            size += write_u32(stream, group_version)?;
        }
        if let Some(network_message_number) = self.network_message_number {
            size += write_u16(stream, network_message_number)?;
        }
        if let Some(sequence_number) = self.sequence_number {
            size += write_u16(stream, sequence_number)?;
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S) -> EncodingResult<Self> {
        let flags = read_u8(stream)?;
        let writer_group_id = if flags & GF_WRITER_GROUP_ID != 0 {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let group_version = if flags & GF_GROUP_VERSION != 0 {
            Some(read_u32(stream)?)
        } else {
            None
        };
        let network_message_number = if flags & GF_NETWORK_MESSAGE_NUMBER != 0 {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let sequence_number = if flags & GF_SEQUENCE_NUMBER != 0 {
            Some(read_u16(stream)?)
        } else {
            None
        };
        Ok(UadpGroupHeader {
            writer_group_id,
            group_version,
            network_message_number,
            sequence_number,
        })
    }
}

/// The in-memory form of a UADP wire packet. Optional parts mirror the wire - the encoder
/// derives its flag bytes from which parts are present, the way the `DataValue` encoding
/// mask is derived from its fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UadpNetworkMessage {
    pub publisher_id: Option<PublisherId>,
    pub dataset_class_id: Option<Guid>,
    pub group_header: Option<UadpGroupHeader>,
    /// The DataSetWriterIds of the payload header, one per DataSetMessage
    pub dataset_payload_header: Option<Vec<u16>>,
    pub timestamp: Option<DateTime>,
    pub picoseconds: Option<u16>,
    pub payload: Vec<DataSetMessage>,
}

impl UadpNetworkMessage {
    pub(crate) fn extended_flags1_needed(&self) -> bool {
        self.publisher_id.map_or(false, |id| id.id_type() != 0)
            || self.dataset_class_id.is_some()
            || self.timestamp.is_some()
            || self.picoseconds.is_some()
    }

    fn extended_flags1(&self) -> u8 {
        let mut flags = self.publisher_id.map_or(0, |id| id.id_type());
        if self.dataset_class_id.is_some() {
            flags |= EF1_DATASET_CLASS_ID;
        }
        if self.timestamp.is_some() {
            flags |= EF1_TIMESTAMP;
        }
        if self.picoseconds.is_some() {
            flags |= EF1_PICO_SECONDS;
        }
        flags
    }

    /// True when the payload is prefixed with a sizes array - requires a payload header
    /// and more than one DataSetMessage.
    pub(crate) fn payload_sizes_encoded(&self) -> bool {
        self.dataset_payload_header.is_some() && self.payload.len() > 1
    }

    /// Byte length of everything before the payload, i.e. the header blocks and, when
    /// present, the payload sizes array.
    pub(crate) fn header_byte_len(&self) -> usize {
        let mut size = 1;
        if self.extended_flags1_needed() {
            size += 1;
        }
        if let Some(ref publisher_id) = self.publisher_id {
            size += publisher_id.byte_len();
        }
        if let Some(ref dataset_class_id) = self.dataset_class_id {
            size += dataset_class_id.byte_len();
        }
        if let Some(ref group_header) = self.group_header {
            size += group_header.byte_len();
        }
        if let Some(ref writer_ids) = self.dataset_payload_header {
            size += 1 + 2 * writer_ids.len();
        }
        if let Some(ref timestamp) = self.timestamp {
            size += timestamp.byte_len();
        }
        if self.picoseconds.is_some() {
            size += 2;
        }
        if self.payload_sizes_encoded() {
            size += 2 * self.payload.len();
        }
        size
    }

    pub fn byte_len(&self) -> usize {
        self.header_byte_len() + self.payload.iter().map(|dsm| dsm.byte_len()).sum::<usize>()
    }

    pub fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        if let Some(ref writer_ids) = self.dataset_payload_header {
            if writer_ids.len() != self.payload.len() {
                error!(
                    "Payload header holds {} writer ids but there are {} messages",
                    writer_ids.len(),
                    self.payload.len()
                );
                return Err(StatusCode::BadEncodingError);
            }
        }

        let mut size = 0;

        let mut version_flags = UADP_VERSION;
        if self.publisher_id.is_some() {
            version_flags |= FLAG_PUBLISHER_ID;
        }
        if self.group_header.is_some() {
            version_flags |= FLAG_GROUP_HEADER;
        }
        if self.dataset_payload_header.is_some() {
            version_flags |= FLAG_PAYLOAD_HEADER;
        }
        if self.extended_flags1_needed() {
            version_flags |= FLAG_EXTENDED_FLAGS_1;
        }
        size += write_u8(stream, version_flags)?;
        if self.extended_flags1_needed() {
            size += write_u8(stream, self.extended_flags1())?;
        }
        if let Some(ref publisher_id) = self.publisher_id {
            size += publisher_id.encode(stream)?;
        }
        if let Some(ref dataset_class_id) = self.dataset_class_id {
            size += dataset_class_id.encode(stream)?;
        }
        if let Some(ref group_header) = self.group_header {
            size += group_header.encode(stream)?;
        }
        if let Some(ref writer_ids) = self.dataset_payload_header {
            size += write_u8(stream, writer_ids.len() as u8)?;
            for writer_id in writer_ids {
                size += write_u16(stream, *writer_id)?;
            }
        }
        if let Some(ref timestamp) = self.timestamp {
            size += timestamp.encode(stream)?;
        }
        if let Some(picoseconds) = self.picoseconds {
            size += write_u16(stream, picoseconds)?;
        }
        if self.payload_sizes_encoded() {
            for dsm in &self.payload {
                size += write_u16(stream, dsm.byte_len() as u16)?;
            }
        }
        for dsm in &self.payload {
            size += dsm.encode(stream)?;
        }
        Ok(size)
    }

    pub fn encode_to_vec(&self) -> EncodingResult<Vec<u8>> {
        let mut stream = Cursor::new(Vec::with_capacity(self.byte_len()));
        let size = self.encode(&mut stream)?;
        debug_assert_eq!(size, self.byte_len());
        Ok(stream.into_inner())
    }

    /// Decodes a NetworkMessage from a received buffer. Raw encoded DataSetMessage bodies
    /// decode to opaque bytes - interpreting them needs the reader's field metadata.
    pub fn decode(data: &[u8], decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        if data.len() > decoding_options.max_message_size && decoding_options.max_message_size > 0 {
            error!(
                "Message of {} bytes exceeds decoding limit {}",
                data.len(),
                decoding_options.max_message_size
            );
            return Err(StatusCode::BadDecodingError);
        }
        let mut stream = Cursor::new(data);

        let version_flags = read_u8(&mut stream)?;
        if version_flags & VERSION_MASK != UADP_VERSION {
            error!(
                "NetworkMessage has version {}, expected {}",
                version_flags & VERSION_MASK,
                UADP_VERSION
            );
            return Err(StatusCode::BadDecodingError);
        }
        let extended_flags1 = if version_flags & FLAG_EXTENDED_FLAGS_1 != 0 {
            read_u8(&mut stream)?
        } else {
            0
        };
        if extended_flags1 & EF1_SECURITY != 0 {
            error!("NetworkMessage carries a security header which is not supported");
            return Err(StatusCode::BadNotSupported);
        }
        if extended_flags1 & EF1_EXTENDED_FLAGS_2 != 0 {
            error!("NetworkMessage carries extended flags 2 which is not supported");
            return Err(StatusCode::BadNotSupported);
        }

        let publisher_id = if version_flags & FLAG_PUBLISHER_ID != 0 {
            Some(PublisherId::decode(
                &mut stream,
                extended_flags1 & EF1_PUBLISHER_ID_TYPE_MASK,
            )?)
        } else {
            None
        };
        let dataset_class_id = if extended_flags1 & EF1_DATASET_CLASS_ID != 0 {
            Some(Guid::decode(&mut stream, decoding_options)?)
        } else {
            None
        };
        let group_header = if version_flags & FLAG_GROUP_HEADER != 0 {
            Some(UadpGroupHeader::decode(&mut stream)?)
        } else {
            None
        };
        let dataset_payload_header = if version_flags & FLAG_PAYLOAD_HEADER != 0 {
            let count = read_u8(&mut stream)?;
            let mut writer_ids = Vec::with_capacity(count as usize);
            for _ in 0..count {
                writer_ids.push(read_u16(&mut stream)?);
            }
            Some(writer_ids)
        } else {
            None
        };
        let timestamp = if extended_flags1 & EF1_TIMESTAMP != 0 {
            Some(DateTime::decode(&mut stream, decoding_options)?)
        } else {
            None
        };
        let picoseconds = if extended_flags1 & EF1_PICO_SECONDS != 0 {
            Some(read_u16(&mut stream)?)
        } else {
            None
        };

        // Payload. With a payload header the message count is known, and for more than one
        // message a sizes array bounds each of them. A single message runs to the end of
        // the buffer.
        let count = dataset_payload_header.as_ref().map_or(1, |ids| ids.len());
        let sizes = if count > 1 {
            let mut sizes = Vec::with_capacity(count);
            for _ in 0..count {
                sizes.push(read_u16(&mut stream)? as usize);
            }
            Some(sizes)
        } else {
            None
        };
        let mut payload = Vec::with_capacity(count);
        for i in 0..count {
            let remaining = data.len() - stream.position() as usize;
            let dsm_size = match sizes {
                Some(ref sizes) => {
                    if sizes[i] > remaining {
                        error!(
                            "DataSetMessage {} declares {} bytes but only {} remain",
                            i, sizes[i], remaining
                        );
                        return Err(StatusCode::BadDecodingError);
                    }
                    sizes[i]
                }
                None => remaining,
            };
            payload.push(DataSetMessage::decode(
                &mut stream,
                dsm_size,
                decoding_options,
            )?);
        }

        Ok(UadpNetworkMessage {
            publisher_id,
            dataset_class_id,
            group_header,
            dataset_payload_header,
            timestamp,
            picoseconds,
            payload,
        })
    }
}
