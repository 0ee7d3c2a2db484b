// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the UADP DataSetMessage and its binary encoding. A DataSetMessage is a key
//! frame carrying every field, a delta frame carrying changed fields, an event or a keep
//! alive. Fields travel either as variants, each prefixed with its own type byte, or as
//! raw data - the fixed size values concatenated in field order with no per-field framing.

use std::io::{Cursor, Read, Write};

use crate::types::{
    date_time::DateTime,
    encoding::*,
    status_code::StatusCode,
    variant::{Variant, VariantTypeId},
};

bitflags! {
    /// Selects which optional parts of a DataSetMessage header appear on the wire. The
    /// numeric values are those of the UadpDataSetMessageContentMask data type.
    pub struct UadpDataSetMessageContentMask: u32 {
        const TIMESTAMP = 0x01;
        const PICO_SECONDS = 0x02;
        const STATUS = 0x04;
        const MAJOR_VERSION = 0x08;
        const MINOR_VERSION = 0x10;
        const SEQUENCE_NUMBER = 0x20;
    }
}

impl UadpDataSetMessageContentMask {
    /// Validates a raw mask from configuration, failing on bits this stack does not know.
    pub fn validate(raw: u32) -> EncodingResult<Self> {
        Self::from_bits(raw).ok_or_else(|| {
            error!("DataSet message content mask {:#x} contains unknown bits", raw);
            StatusCode::BadEncodingError
        })
    }
}

// DataSetFlags1
const DSF1_VALID: u8 = 0x01;
const DSF1_FIELD_ENCODING_MASK: u8 = 0x06;
const DSF1_FIELD_ENCODING_SHIFT: u8 = 1;
const DSF1_SEQUENCE_NUMBER: u8 = 0x08;
const DSF1_STATUS: u8 = 0x10;
const DSF1_MAJOR_VERSION: u8 = 0x20;
const DSF1_MINOR_VERSION: u8 = 0x40;
const DSF1_FLAGS2: u8 = 0x80;

// DataSetFlags2
const DSF2_MESSAGE_TYPE_MASK: u8 = 0x0F;
const DSF2_TIMESTAMP: u8 = 0x10;
const DSF2_PICO_SECONDS: u8 = 0x20;

const MESSAGE_TYPE_KEY_FRAME: u8 = 0;
const MESSAGE_TYPE_DELTA_FRAME: u8 = 1;
const MESSAGE_TYPE_EVENT: u8 = 2;
const MESSAGE_TYPE_KEEP_ALIVE: u8 = 3;

/// How the fields of a DataSetMessage are framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSetFieldEncoding {
    /// Each field is a variant with its own type byte
    Variant,
    /// Fields are fixed size values concatenated in field order
    RawData,
}

impl Default for DataSetFieldEncoding {
    fn default() -> Self {
        // Raw data is the encoding the fixed offset realtime mode runs on
        DataSetFieldEncoding::RawData
    }
}

/// The header of a DataSetMessage. Optional parts mirror the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSetMessageHeader {
    /// False marks the message content as unusable to subscribers
    pub valid: bool,
    pub field_encoding: DataSetFieldEncoding,
    pub sequence_number: Option<u16>,
    pub timestamp: Option<DateTime>,
    pub picoseconds: Option<u16>,
    /// High 16 bits of the StatusCode applying to the whole message
    pub status: Option<u16>,
    pub config_major_version: Option<u32>,
    pub config_minor_version: Option<u32>,
}

impl Default for DataSetMessageHeader {
    fn default() -> Self {
        Self {
            valid: true,
            field_encoding: DataSetFieldEncoding::default(),
            sequence_number: None,
            timestamp: None,
            picoseconds: None,
            status: None,
            config_major_version: None,
            config_minor_version: None,
        }
    }
}

impl DataSetMessageHeader {
    /// Byte length of the header fields including flags1 but not flags2, which depends on
    /// the message type and is accounted for by the message.
    fn byte_len(&self) -> usize {
        let mut size = 1;
        size += self.sequence_number.map_or(0, |_| 2);
        size += self.timestamp.map_or(0, |_| 8);
        size += self.picoseconds.map_or(0, |_| 2);
        size += self.status.map_or(0, |_| 2);
        size += self.config_major_version.map_or(0, |_| 4);
        size += self.config_minor_version.map_or(0, |_| 4);
        size
    }

    fn flags2_needed(&self, message_type: u8) -> u8 {
        let mut flags = message_type & DSF2_MESSAGE_TYPE_MASK;
        if self.timestamp.is_some() {
            flags |= DSF2_TIMESTAMP;
        }
        if self.picoseconds.is_some() {
            flags |= DSF2_PICO_SECONDS;
        }
        flags
    }
}

/// The body of a DataSetMessage.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSetMessageBody {
    /// All fields, variant encoded
    KeyFrame(Vec<Variant>),
    /// All fields, raw encoded. The bytes are opaque until interpreted against field
    /// metadata with [`DataSetMessage::decode_raw_fields`].
    RawKeyFrame(Vec<u8>),
    /// Changed fields only as (field index, value) pairs, variant encoded
    DeltaFrame(Vec<(u16, Variant)>),
    /// Event fields, variant encoded
    Event(Vec<Variant>),
    /// No payload, proves the publisher is alive
    KeepAlive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSetMessage {
    pub header: DataSetMessageHeader,
    pub body: DataSetMessageBody,
}

impl DataSetMessage {
    /// Builds a raw encoded key frame from field values. Every value must be a scalar of
    /// statically known wire size - strings, byte strings and arrays have no place in a
    /// raw body because the receiver cannot find the field boundaries.
    pub fn key_frame_raw(
        header: DataSetMessageHeader,
        fields: &[Variant],
    ) -> EncodingResult<DataSetMessage> {
        let mut body = Vec::new();
        for field in fields {
            let type_id = field.type_id();
            if type_id.fixed_wire_size().is_none() {
                error!(
                    "Field of type {:?} cannot be raw encoded, it has no fixed size",
                    type_id
                );
                return Err(StatusCode::BadDataEncodingUnsupported);
            }
            field.encode_value(&mut body)?;
        }
        Ok(DataSetMessage {
            header: DataSetMessageHeader {
                field_encoding: DataSetFieldEncoding::RawData,
                ..header
            },
            body: DataSetMessageBody::RawKeyFrame(body),
        })
    }

    /// Builds a variant encoded key frame from field values.
    pub fn key_frame(header: DataSetMessageHeader, fields: Vec<Variant>) -> DataSetMessage {
        DataSetMessage {
            header: DataSetMessageHeader {
                field_encoding: DataSetFieldEncoding::Variant,
                ..header
            },
            body: DataSetMessageBody::KeyFrame(fields),
        }
    }

    /// Builds a keep alive message.
    pub fn keep_alive(header: DataSetMessageHeader) -> DataSetMessage {
        DataSetMessage {
            header,
            body: DataSetMessageBody::KeepAlive,
        }
    }

    fn message_type(&self) -> u8 {
        match self.body {
            DataSetMessageBody::KeyFrame(_) | DataSetMessageBody::RawKeyFrame(_) => {
                MESSAGE_TYPE_KEY_FRAME
            }
            DataSetMessageBody::DeltaFrame(_) => MESSAGE_TYPE_DELTA_FRAME,
            DataSetMessageBody::Event(_) => MESSAGE_TYPE_EVENT,
            DataSetMessageBody::KeepAlive => MESSAGE_TYPE_KEEP_ALIVE,
        }
    }

    fn flags1(&self) -> u8 {
        let mut flags = 0;
        if self.header.valid {
            flags |= DSF1_VALID;
        }
        let encoding = match self.header.field_encoding {
            DataSetFieldEncoding::Variant => 0,
            DataSetFieldEncoding::RawData => 1,
        };
        flags |= encoding << DSF1_FIELD_ENCODING_SHIFT;
        if self.header.sequence_number.is_some() {
            flags |= DSF1_SEQUENCE_NUMBER;
        }
        if self.header.status.is_some() {
            flags |= DSF1_STATUS;
        }
        if self.header.config_major_version.is_some() {
            flags |= DSF1_MAJOR_VERSION;
        }
        if self.header.config_minor_version.is_some() {
            flags |= DSF1_MINOR_VERSION;
        }
        if self.flags2() != 0 {
            flags |= DSF1_FLAGS2;
        }
        flags
    }

    pub(crate) fn flags2(&self) -> u8 {
        self.header.flags2_needed(self.message_type())
    }

    /// Byte length of the header as encoded, including the flag bytes.
    pub(crate) fn header_byte_len(&self) -> usize {
        let mut size = self.header.byte_len();
        if self.flags2() != 0 {
            size += 1;
        }
        size
    }

    fn body_byte_len(&self) -> usize {
        match &self.body {
            DataSetMessageBody::KeyFrame(fields) => {
                2 + fields.iter().map(|f| f.byte_len()).sum::<usize>()
            }
            DataSetMessageBody::RawKeyFrame(bytes) => bytes.len(),
            DataSetMessageBody::DeltaFrame(fields) => {
                2 + fields
                    .iter()
                    .map(|(_, f)| 2 + f.byte_len())
                    .sum::<usize>()
            }
            DataSetMessageBody::Event(fields) => {
                2 + fields.iter().map(|f| f.byte_len()).sum::<usize>()
            }
            DataSetMessageBody::KeepAlive => 0,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.header_byte_len() + self.body_byte_len()
    }

    pub fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        // Field framing and body must agree
        match (&self.body, self.header.field_encoding) {
            (DataSetMessageBody::RawKeyFrame(_), DataSetFieldEncoding::Variant) => {
                error!("Raw body cannot be encoded with variant field encoding");
                return Err(StatusCode::BadEncodingError);
            }
            (DataSetMessageBody::KeyFrame(_), DataSetFieldEncoding::RawData)
            | (DataSetMessageBody::DeltaFrame(_), DataSetFieldEncoding::RawData)
            | (DataSetMessageBody::Event(_), DataSetFieldEncoding::RawData) => {
                error!("Variant bodies cannot be encoded with raw field encoding");
                return Err(StatusCode::BadEncodingError);
            }
            _ => {}
        }

        let mut size = write_u8(stream, self.flags1())?;
        let flags2 = self.flags2();
        if flags2 != 0 {
            size += write_u8(stream, flags2)?;
        }
        if let Some(sequence_number) = self.header.sequence_number {
            size += write_u16(stream, sequence_number)?;
        }
        if let Some(ref timestamp) = self.header.timestamp {
            size += timestamp.encode(stream)?;
        }
        if let Some(picoseconds) = self.header.picoseconds {
            size += write_u16(stream, picoseconds)?;
        }
        if let Some(status) = self.header.status {
            size += write_u16(stream, status)?;
        }
        if let Some(major) = self.header.config_major_version {
            size += write_u32(stream, major)?;
        }
        if let Some(minor) = self.header.config_minor_version {
            size += write_u32(stream, minor)?;
        }

        match &self.body {
            DataSetMessageBody::KeyFrame(fields) | DataSetMessageBody::Event(fields) => {
                size += write_u16(stream, fields.len() as u16)?;
                for field in fields {
                    size += field.encode(stream)?;
                }
            }
            DataSetMessageBody::RawKeyFrame(bytes) => {
                size += process_encode_io_result(stream.write(bytes))?;
            }
            DataSetMessageBody::DeltaFrame(fields) => {
                size += write_u16(stream, fields.len() as u16)?;
                for (index, field) in fields {
                    size += write_u16(stream, *index)?;
                    size += field.encode(stream)?;
                }
            }
            DataSetMessageBody::KeepAlive => {}
        }
        Ok(size)
    }

    /// Decodes a DataSetMessage. `dsm_size` is the total byte size of this message within
    /// the packet, known from the payload sizes array or the remaining buffer - a raw
    /// body has no internal framing so its extent must come from the outside.
    pub fn decode(
        stream: &mut Cursor<&[u8]>,
        dsm_size: usize,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<DataSetMessage> {
        let start_pos = stream.position() as usize;

        let flags1 = read_u8(stream)?;
        let field_encoding = match (flags1 & DSF1_FIELD_ENCODING_MASK) >> DSF1_FIELD_ENCODING_SHIFT
        {
            0 => DataSetFieldEncoding::Variant,
            1 => DataSetFieldEncoding::RawData,
            e => {
                error!("DataSetMessage field encoding {} is not supported", e);
                return Err(StatusCode::BadNotSupported);
            }
        };
        let flags2 = if flags1 & DSF1_FLAGS2 != 0 {
            read_u8(stream)?
        } else {
            0
        };
        let message_type = flags2 & DSF2_MESSAGE_TYPE_MASK;

        let sequence_number = if flags1 & DSF1_SEQUENCE_NUMBER != 0 {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let timestamp = if flags2 & DSF2_TIMESTAMP != 0 {
            Some(DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let picoseconds = if flags2 & DSF2_PICO_SECONDS != 0 {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let status = if flags1 & DSF1_STATUS != 0 {
            Some(read_u16(stream)?)
        } else {
            None
        };
        let config_major_version = if flags1 & DSF1_MAJOR_VERSION != 0 {
            Some(read_u32(stream)?)
        } else {
            None
        };
        let config_minor_version = if flags1 & DSF1_MINOR_VERSION != 0 {
            Some(read_u32(stream)?)
        } else {
            None
        };

        let header = DataSetMessageHeader {
            valid: flags1 & DSF1_VALID != 0,
            field_encoding,
            sequence_number,
            timestamp,
            picoseconds,
            status,
            config_major_version,
            config_minor_version,
        };

        let header_size = stream.position() as usize - start_pos;
        if header_size > dsm_size {
            error!("DataSetMessage header overruns its declared size");
            return Err(StatusCode::BadDecodingError);
        }
        let body_size = dsm_size - header_size;

        let body = match (message_type, field_encoding) {
            (MESSAGE_TYPE_KEY_FRAME, DataSetFieldEncoding::Variant) => {
                let count = read_u16(stream)?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    fields.push(Variant::decode(stream, decoding_options)?);
                }
                DataSetMessageBody::KeyFrame(fields)
            }
            (MESSAGE_TYPE_KEY_FRAME, DataSetFieldEncoding::RawData) => {
                let mut bytes = vec![0u8; body_size];
                read_bytes(stream, &mut bytes)?;
                DataSetMessageBody::RawKeyFrame(bytes)
            }
            (MESSAGE_TYPE_DELTA_FRAME, DataSetFieldEncoding::Variant) => {
                let count = read_u16(stream)?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let index = read_u16(stream)?;
                    fields.push((index, Variant::decode(stream, decoding_options)?));
                }
                DataSetMessageBody::DeltaFrame(fields)
            }
            (MESSAGE_TYPE_EVENT, DataSetFieldEncoding::Variant) => {
                let count = read_u16(stream)?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    fields.push(Variant::decode(stream, decoding_options)?);
                }
                DataSetMessageBody::Event(fields)
            }
            (MESSAGE_TYPE_KEEP_ALIVE, _) => DataSetMessageBody::KeepAlive,
            (t, e) => {
                error!(
                    "DataSetMessage type {} with field encoding {:?} is not supported",
                    t, e
                );
                return Err(StatusCode::BadNotSupported);
            }
        };

        let consumed = stream.position() as usize - start_pos;
        if consumed != dsm_size {
            error!(
                "DataSetMessage consumed {} bytes of a declared {}",
                consumed, dsm_size
            );
            return Err(StatusCode::BadDecodingError);
        }

        Ok(DataSetMessage { header, body })
    }

    /// Interprets a raw key frame body against the expected field types, in field order.
    /// Fails with `BadDecodingError` when the body is shorter or longer than the types
    /// require, and `BadDataEncodingUnsupported` on a type that cannot be raw encoded.
    pub fn decode_raw_fields(
        &self,
        field_types: &[VariantTypeId],
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Vec<Variant>> {
        let bytes = match &self.body {
            DataSetMessageBody::RawKeyFrame(bytes) => bytes,
            _ => {
                error!("DataSetMessage has no raw body to interpret");
                return Err(StatusCode::BadInvalidArgument);
            }
        };
        let expected: usize = field_types
            .iter()
            .map(|t| t.fixed_wire_size().ok_or(StatusCode::BadDataEncodingUnsupported))
            .sum::<Result<usize, _>>()?;
        if bytes.len() != expected {
            error!(
                "Raw body is {} bytes but the field metadata requires {}",
                bytes.len(),
                expected
            );
            return Err(StatusCode::BadDecodingError);
        }
        let mut stream = Cursor::new(bytes.as_slice());
        let mut fields = Vec::with_capacity(field_types.len());
        for type_id in field_types {
            fields.push(Variant::decode_value(*type_id, &mut stream, decoding_options)?);
        }
        Ok(fields)
    }
}
