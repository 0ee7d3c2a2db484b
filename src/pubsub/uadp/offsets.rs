// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the fixed offset machinery of the realtime mode. At freeze time a NetworkMessage
//! template is encoded once into a persistent buffer and the byte offset of every volatile
//! location - sequence numbers and raw payload fields - is recorded. From then on a publish
//! cycle is an in-place patch of the buffer and a receive cycle reads the same offsets out
//! of the incoming packet, after checking that everything outside them is bit identical to
//! the template.

use std::io::Cursor;

use crate::types::{
    encoding::*,
    status_code::StatusCode,
    variant::{Variant, VariantTypeId},
};

use super::{
    data_set_message::DataSetMessageBody, network_message::UadpNetworkMessage,
};

/// What a patch site holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetworkMessageOffsetKind {
    /// The group header sequence number
    GroupSequenceNumber,
    /// The sequence number of one DataSetMessage
    DataSetSequenceNumber { data_set: usize },
    /// One raw encoded payload field
    PayloadField {
        data_set: usize,
        field: usize,
        type_id: VariantTypeId,
    },
}

/// One patch site - an absolute byte offset into the frozen buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkMessageOffset {
    pub offset: usize,
    pub size: usize,
    pub kind: NetworkMessageOffsetKind,
}

/// The persistent pre-encoded buffer plus its patch sites. The byte length is fixed once
/// built; entry offsets are monotonic within the message.
#[derive(Debug, Clone)]
pub struct OffsetBuffer {
    buffer: Vec<u8>,
    offsets: Vec<NetworkMessageOffset>,
}

impl OffsetBuffer {
    /// Encodes the message once and computes the offset table in the same single pass over
    /// the layout. `field_types` carries the field type list of each DataSetMessage since a
    /// raw body does not encode them. Every DataSetMessage must be a raw key frame - that
    /// is the only payload whose field offsets are statically known.
    pub fn new(
        nm: &UadpNetworkMessage,
        field_types: &[Vec<VariantTypeId>],
    ) -> EncodingResult<OffsetBuffer> {
        if field_types.len() != nm.payload.len() {
            error!(
                "Field types supplied for {} messages, but the payload holds {}",
                field_types.len(),
                nm.payload.len()
            );
            return Err(StatusCode::BadInvalidArgument);
        }

        let buffer = nm.encode_to_vec()?;
        let mut offsets = Vec::new();

        // Walk the same layout the encoder wrote, recording the volatile locations. The
        // group header sequence number sits inside the headers at a position that can be
        // computed directly; payload offsets run from the end of the headers.
        let mut pos = nm.header_byte_len();
        if let Some(ref group_header) = nm.group_header {
            if group_header.sequence_number.is_some() {
                // The sequence number is the last group header field
                let group_header_end = {
                    let mut p = 1;
                    if nm.extended_flags1_needed() {
                        p += 1;
                    }
                    if let Some(ref publisher_id) = nm.publisher_id {
                        p += publisher_id.byte_len();
                    }
                    if nm.dataset_class_id.is_some() {
                        p += 16;
                    }
                    p + group_header.byte_len()
                };
                offsets.push(NetworkMessageOffset {
                    offset: group_header_end - 2,
                    size: 2,
                    kind: NetworkMessageOffsetKind::GroupSequenceNumber,
                });
            }
        }

        for (data_set, (dsm, types)) in nm.payload.iter().zip(field_types.iter()).enumerate() {
            // Flag bytes come first, then the sequence number when present
            let mut dsm_pos = pos + 1;
            if dsm.flags2() != 0 {
                dsm_pos += 1;
            }
            if dsm.header.sequence_number.is_some() {
                offsets.push(NetworkMessageOffset {
                    offset: dsm_pos,
                    size: 2,
                    kind: NetworkMessageOffsetKind::DataSetSequenceNumber { data_set },
                });
            }
            pos += dsm.header_byte_len();

            let body = match &dsm.body {
                DataSetMessageBody::RawKeyFrame(bytes) => bytes,
                _ => {
                    error!("Fixed offsets need raw key frame payloads");
                    return Err(StatusCode::BadNotSupported);
                }
            };
            let mut field_pos = pos;
            for (field, type_id) in types.iter().enumerate() {
                let size = type_id.fixed_wire_size().ok_or_else(|| {
                    error!("Field type {:?} has no fixed wire size", type_id);
                    StatusCode::BadNotSupported
                })?;
                offsets.push(NetworkMessageOffset {
                    offset: field_pos,
                    size,
                    kind: NetworkMessageOffsetKind::PayloadField {
                        data_set,
                        field,
                        type_id: *type_id,
                    },
                });
                field_pos += size;
            }
            if field_pos - pos != body.len() {
                error!(
                    "Raw body of message {} is {} bytes but its field types need {}",
                    data_set,
                    body.len(),
                    field_pos - pos
                );
                return Err(StatusCode::BadInvalidArgument);
            }
            pos = field_pos;
        }

        if pos != buffer.len() {
            error!(
                "Offset walk ended at {} but the encoded message is {} bytes",
                pos,
                buffer.len()
            );
            return Err(StatusCode::BadInternalError);
        }

        Ok(OffsetBuffer { buffer, offsets })
    }

    /// The frozen wire image.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// The length in bytes, fixed for the life of the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The patch sites, in ascending offset order per message.
    pub fn offsets(&self) -> &[NetworkMessageOffset] {
        &self.offsets
    }

    /// Writes a sequence number at the given patch site.
    pub fn patch_u16(&mut self, entry: usize, value: u16) -> EncodingResult<()> {
        let e = *self
            .offsets
            .get(entry)
            .ok_or(StatusCode::BadInvalidArgument)?;
        if e.size != 2 {
            return Err(StatusCode::BadInvalidArgument);
        }
        self.buffer[e.offset..e.offset + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a field value at the given patch site. The value must be a scalar of the
    /// type recorded at freeze time - the layout cannot change after the fact.
    pub fn patch_field(&mut self, entry: usize, value: &Variant) -> EncodingResult<()> {
        let e = *self
            .offsets
            .get(entry)
            .ok_or(StatusCode::BadInvalidArgument)?;
        let type_id = match e.kind {
            NetworkMessageOffsetKind::PayloadField { type_id, .. } => type_id,
            _ => return Err(StatusCode::BadInvalidArgument),
        };
        if value.type_id() != type_id {
            error!(
                "Value of type {:?} does not match the frozen field type {:?}",
                value.type_id(),
                type_id
            );
            return Err(StatusCode::BadInvalidArgument);
        }
        let mut stream = Cursor::new(&mut self.buffer[e.offset..e.offset + e.size]);
        value.encode_value(&mut stream)?;
        Ok(())
    }

    /// The realtime receive path. Checks the incoming packet against the frozen template -
    /// identical length, and bit identical everywhere outside the patch sites - then decodes
    /// the patch sites, walking the table in reverse. Values are returned in field order.
    pub fn update_from(
        &self,
        packet: &[u8],
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Vec<(NetworkMessageOffset, Variant)>> {
        if packet.len() != self.buffer.len() {
            debug!(
                "Packet of {} bytes does not match the frozen layout of {}",
                packet.len(),
                self.buffer.len()
            );
            return Err(StatusCode::BadDecodingError);
        }
        let mut pos = 0;
        for e in &self.offsets {
            if packet[pos..e.offset] != self.buffer[pos..e.offset] {
                debug!("Packet differs from the frozen template outside its patch sites");
                return Err(StatusCode::BadDecodingError);
            }
            pos = e.offset + e.size;
        }
        if packet[pos..] != self.buffer[pos..] {
            debug!("Packet differs from the frozen template after the last patch site");
            return Err(StatusCode::BadDecodingError);
        }

        let mut values = Vec::with_capacity(self.offsets.len());
        for e in self.offsets.iter().rev() {
            if let NetworkMessageOffsetKind::PayloadField { type_id, .. } = e.kind {
                let mut stream = Cursor::new(&packet[e.offset..e.offset + e.size]);
                let value = Variant::decode_value(type_id, &mut stream, decoding_options)?;
                values.push((*e, value));
            }
        }
        values.reverse();
        Ok(values)
    }
}
