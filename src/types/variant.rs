// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `Variant`.

use std::{
    convert::TryFrom,
    io::{Read, Write},
};

use crate::types::{
    byte_string::ByteString,
    date_time::DateTime,
    encoding::*,
    guid::Guid,
    node_id::{Identifier, NodeId},
    status_code::StatusCode,
    string::UAString,
};

/// A `Variant` holds built-in OPC UA data types, including single dimension arrays of scalars.
/// This is the subset of the standard Variant that can travel in a DataSetMessage - the
/// structured, diagnostic and nested variant types belong to the session layer.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub enum Variant {
    /// Empty type has no value. It is equivalent to a Null value (part 6 5.1.6)
    Empty,
    /// Boolean
    Boolean(bool),
    /// Signed byte
    SByte(i8),
    /// Unsigned byte
    Byte(u8),
    /// Signed 16-bit int
    Int16(i16),
    /// Unsigned 16-bit int
    UInt16(u16),
    /// Signed 32-bit int
    Int32(i32),
    /// Unsigned 32-bit int
    UInt32(u32),
    /// Signed 64-bit int
    Int64(i64),
    /// Unsigned 64-bit int
    UInt64(u64),
    /// Float
    Float(f32),
    /// Double
    Double(f64),
    /// String
    String(UAString),
    /// DateTime
    DateTime(Box<DateTime>),
    /// Guid
    Guid(Box<Guid>),
    /// StatusCode
    StatusCode(StatusCode),
    /// ByteString
    ByteString(ByteString),
    /// Single dimension array which can contain any scalar type, all the same type.
    Array(Box<Array>),
}

/// A single dimension array of scalar variants, all of the value type.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Array {
    pub value_type: VariantTypeId,
    pub values: Vec<Variant>,
}

impl Array {
    pub fn new(value_type: VariantTypeId, values: Vec<Variant>) -> EncodingResult<Self> {
        if values.iter().any(|v| v.type_id() != value_type) {
            error!("Array elements are not all of type {:?}", value_type);
            return Err(StatusCode::BadInvalidArgument);
        }
        Ok(Self { value_type, values })
    }
}

/// The variant type id is the type of the variant but without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantTypeId {
    // Null / Empty
    Empty,
    // Scalar types
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    DateTime,
    Guid,
    StatusCode,
    ByteString,
    Array,
}

impl VariantTypeId {
    /// The data type encoding byte carried on the wire for this type, part 6 5.1.2.
    pub fn encoding_mask(&self) -> u8 {
        match self {
            VariantTypeId::Empty => 0u8,
            VariantTypeId::Boolean => 1,
            VariantTypeId::SByte => 2,
            VariantTypeId::Byte => 3,
            VariantTypeId::Int16 => 4,
            VariantTypeId::UInt16 => 5,
            VariantTypeId::Int32 => 6,
            VariantTypeId::UInt32 => 7,
            VariantTypeId::Int64 => 8,
            VariantTypeId::UInt64 => 9,
            VariantTypeId::Float => 10,
            VariantTypeId::Double => 11,
            VariantTypeId::String => 12,
            VariantTypeId::DateTime => 13,
            VariantTypeId::Guid => 14,
            VariantTypeId::ByteString => 15,
            VariantTypeId::StatusCode => 19,
            VariantTypeId::Array => {
                panic!("Cannot run this possibility through this function")
            }
        }
    }

    /// Resolves an encoding byte back to a type id. Unknown or unsupported bytes are an error.
    pub fn from_encoding_mask(encoding_mask: u8) -> EncodingResult<Self> {
        match encoding_mask & !EncodingMask::ARRAY_MASK {
            0 => Ok(VariantTypeId::Empty),
            1 => Ok(VariantTypeId::Boolean),
            2 => Ok(VariantTypeId::SByte),
            3 => Ok(VariantTypeId::Byte),
            4 => Ok(VariantTypeId::Int16),
            5 => Ok(VariantTypeId::UInt16),
            6 => Ok(VariantTypeId::Int32),
            7 => Ok(VariantTypeId::UInt32),
            8 => Ok(VariantTypeId::Int64),
            9 => Ok(VariantTypeId::UInt64),
            10 => Ok(VariantTypeId::Float),
            11 => Ok(VariantTypeId::Double),
            12 => Ok(VariantTypeId::String),
            13 => Ok(VariantTypeId::DateTime),
            14 => Ok(VariantTypeId::Guid),
            15 => Ok(VariantTypeId::ByteString),
            19 => Ok(VariantTypeId::StatusCode),
            v => {
                error!("Unrecognized variant type {}", v);
                Err(StatusCode::BadDataTypeIdUnknown)
            }
        }
    }

    /// The encoded size in bytes when the size does not depend on the value, or `None` for
    /// variable length types. This is what makes a field eligible for a fixed wire layout.
    pub fn fixed_wire_size(&self) -> Option<usize> {
        match self {
            VariantTypeId::Boolean | VariantTypeId::SByte | VariantTypeId::Byte => Some(1),
            VariantTypeId::Int16 | VariantTypeId::UInt16 => Some(2),
            VariantTypeId::Int32
            | VariantTypeId::UInt32
            | VariantTypeId::Float
            | VariantTypeId::StatusCode => Some(4),
            VariantTypeId::Int64
            | VariantTypeId::UInt64
            | VariantTypeId::Double
            | VariantTypeId::DateTime => Some(8),
            VariantTypeId::Guid => Some(16),
            _ => None,
        }
    }
}

impl TryFrom<&NodeId> for VariantTypeId {
    type Error = StatusCode;

    /// Resolves a ns=0 data type node id, e.g. from field metadata, to a type id.
    fn try_from(value: &NodeId) -> Result<Self, Self::Error> {
        if value.namespace != 0 {
            return Err(StatusCode::BadDataTypeIdUnknown);
        }
        match value.identifier {
            Identifier::Numeric(type_id) if type_id >= 1 && type_id <= 15 || type_id == 19 => {
                VariantTypeId::from_encoding_mask(type_id as u8)
            }
            _ => Err(StatusCode::BadDataTypeIdUnknown),
        }
    }
}

pub(crate) struct EncodingMask;

impl EncodingMask {
    /// Bit indicating the value is a single dimension array
    pub const ARRAY_VALUES_BIT: u8 = 1 << 7;
    /// Bit indicating array dimensions follow; multi dimension arrays are not supported here
    pub const ARRAY_DIMENSIONS_BIT: u8 = 1 << 6;
    pub const ARRAY_MASK: u8 = Self::ARRAY_VALUES_BIT | Self::ARRAY_DIMENSIONS_BIT;
}

impl BinaryEncoder<Variant> for Variant {
    fn byte_len(&self) -> usize {
        // Encoding mask
        let mut size = 1;
        size += match self {
            Variant::Array(array) => {
                // Array length
                let mut size = 4;
                size += array
                    .values
                    .iter()
                    .map(Variant::value_byte_len)
                    .sum::<usize>();
                size
            }
            _ => self.value_byte_len(),
        };
        size
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size: usize = 0;

        // Encoding mask will include the array bits if applicable for the type
        let encoding_mask = self.encoding_mask()?;
        size += write_u8(stream, encoding_mask)?;

        match self {
            Variant::Array(array) => {
                size += write_i32(stream, array.values.len() as i32)?;
                for value in array.values.iter() {
                    size += value.encode_value(stream)?;
                }
            }
            _ => {
                size += self.encode_value(stream)?;
            }
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding_mask = read_u8(stream)?;
        let type_id = VariantTypeId::from_encoding_mask(encoding_mask)?;
        if encoding_mask & EncodingMask::ARRAY_DIMENSIONS_BIT != 0 {
            error!("Multi dimension arrays are not supported by the data plane");
            Err(StatusCode::BadDecodingError)
        } else if encoding_mask & EncodingMask::ARRAY_VALUES_BIT != 0 {
            let len = read_i32(stream)?;
            if len < -1 {
                error!("Invalid array length {}", len);
                return Err(StatusCode::BadDecodingError);
            } else if len as usize > decoding_options.max_array_length {
                error!(
                    "Array length {} exceeds decoding limit {}",
                    len, decoding_options.max_array_length
                );
                return Err(StatusCode::BadDecodingError);
            }
            let mut values = Vec::with_capacity(len.max(0) as usize);
            for _ in 0..len {
                values.push(Variant::decode_value(type_id, stream, decoding_options)?);
            }
            Ok(Variant::Array(Box::new(Array { value_type: type_id, values })))
        } else {
            Variant::decode_value(type_id, stream, decoding_options)
        }
    }
}

macro_rules! impl_from_value_for_variant {
    ( $tp: ty, $vr: ident ) => {
        impl From<$tp> for Variant {
            fn from(v: $tp) -> Self {
                Variant::$vr(v)
            }
        }
    };
}

impl_from_value_for_variant!(bool, Boolean);
impl_from_value_for_variant!(i8, SByte);
impl_from_value_for_variant!(u8, Byte);
impl_from_value_for_variant!(i16, Int16);
impl_from_value_for_variant!(u16, UInt16);
impl_from_value_for_variant!(i32, Int32);
impl_from_value_for_variant!(u32, UInt32);
impl_from_value_for_variant!(i64, Int64);
impl_from_value_for_variant!(u64, UInt64);
impl_from_value_for_variant!(f32, Float);
impl_from_value_for_variant!(f64, Double);
impl_from_value_for_variant!(UAString, String);
impl_from_value_for_variant!(ByteString, ByteString);
impl_from_value_for_variant!(StatusCode, StatusCode);

impl<'a> From<&'a str> for Variant {
    fn from(v: &'a str) -> Self {
        Variant::String(UAString::from(v))
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(UAString::from(v))
    }
}

impl From<DateTime> for Variant {
    fn from(v: DateTime) -> Self {
        Variant::DateTime(Box::new(v))
    }
}

impl From<Guid> for Variant {
    fn from(v: Guid) -> Self {
        Variant::Guid(Box::new(v))
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Empty
    }
}

impl Variant {
    /// Returns the type id of the value held by the variant.
    pub fn type_id(&self) -> VariantTypeId {
        match self {
            Variant::Empty => VariantTypeId::Empty,
            Variant::Boolean(_) => VariantTypeId::Boolean,
            Variant::SByte(_) => VariantTypeId::SByte,
            Variant::Byte(_) => VariantTypeId::Byte,
            Variant::Int16(_) => VariantTypeId::Int16,
            Variant::UInt16(_) => VariantTypeId::UInt16,
            Variant::Int32(_) => VariantTypeId::Int32,
            Variant::UInt32(_) => VariantTypeId::UInt32,
            Variant::Int64(_) => VariantTypeId::Int64,
            Variant::UInt64(_) => VariantTypeId::UInt64,
            Variant::Float(_) => VariantTypeId::Float,
            Variant::Double(_) => VariantTypeId::Double,
            Variant::String(_) => VariantTypeId::String,
            Variant::DateTime(_) => VariantTypeId::DateTime,
            Variant::Guid(_) => VariantTypeId::Guid,
            Variant::StatusCode(_) => VariantTypeId::StatusCode,
            Variant::ByteString(_) => VariantTypeId::ByteString,
            Variant::Array(_) => VariantTypeId::Array,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// The wire encoding mask byte, including array bits where applicable.
    fn encoding_mask(&self) -> EncodingResult<u8> {
        match self {
            Variant::Array(array) => {
                if array.value_type == VariantTypeId::Empty
                    || array.value_type == VariantTypeId::Array
                {
                    error!("Array of type {:?} cannot be encoded", array.value_type);
                    Err(StatusCode::BadEncodingError)
                } else {
                    Ok(array.value_type.encoding_mask() | EncodingMask::ARRAY_VALUES_BIT)
                }
            }
            _ => Ok(self.type_id().encoding_mask()),
        }
    }

    /// The byte length of the value without its encoding mask.
    pub fn value_byte_len(&self) -> usize {
        match self {
            Variant::Empty => 0,
            Variant::Boolean(value) => value.byte_len(),
            Variant::SByte(value) => value.byte_len(),
            Variant::Byte(value) => value.byte_len(),
            Variant::Int16(value) => value.byte_len(),
            Variant::UInt16(value) => value.byte_len(),
            Variant::Int32(value) => value.byte_len(),
            Variant::UInt32(value) => value.byte_len(),
            Variant::Int64(value) => value.byte_len(),
            Variant::UInt64(value) => value.byte_len(),
            Variant::Float(value) => value.byte_len(),
            Variant::Double(value) => value.byte_len(),
            Variant::String(value) => value.byte_len(),
            Variant::DateTime(value) => value.byte_len(),
            Variant::Guid(value) => value.byte_len(),
            Variant::StatusCode(value) => value.byte_len(),
            Variant::ByteString(value) => value.byte_len(),
            Variant::Array(_) => {
                // Array members carry their own lengths via encode; this branch is never a
                // member of another array.
                0
            }
        }
    }

    /// Encodes the value without its encoding mask. This is the form raw field encoding and
    /// array members use.
    pub fn encode_value<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            Variant::Empty => Ok(0),
            Variant::Boolean(value) => value.encode(stream),
            Variant::SByte(value) => value.encode(stream),
            Variant::Byte(value) => value.encode(stream),
            Variant::Int16(value) => value.encode(stream),
            Variant::UInt16(value) => value.encode(stream),
            Variant::Int32(value) => value.encode(stream),
            Variant::UInt32(value) => value.encode(stream),
            Variant::Int64(value) => value.encode(stream),
            Variant::UInt64(value) => value.encode(stream),
            Variant::Float(value) => value.encode(stream),
            Variant::Double(value) => value.encode(stream),
            Variant::String(value) => value.encode(stream),
            Variant::DateTime(value) => value.encode(stream),
            Variant::Guid(value) => value.encode(stream),
            Variant::StatusCode(value) => value.encode(stream),
            Variant::ByteString(value) => value.encode(stream),
            Variant::Array(_) => {
                error!("Nested arrays cannot be encoded");
                Err(StatusCode::BadEncodingError)
            }
        }
    }

    /// Decodes a value of the given type without an encoding mask.
    pub fn decode_value<S: Read>(
        type_id: VariantTypeId,
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Variant> {
        let value = match type_id {
            VariantTypeId::Empty => Variant::Empty,
            VariantTypeId::Boolean => Variant::from(bool::decode(stream, decoding_options)?),
            VariantTypeId::SByte => Variant::from(i8::decode(stream, decoding_options)?),
            VariantTypeId::Byte => Variant::from(u8::decode(stream, decoding_options)?),
            VariantTypeId::Int16 => Variant::from(i16::decode(stream, decoding_options)?),
            VariantTypeId::UInt16 => Variant::from(u16::decode(stream, decoding_options)?),
            VariantTypeId::Int32 => Variant::from(i32::decode(stream, decoding_options)?),
            VariantTypeId::UInt32 => Variant::from(u32::decode(stream, decoding_options)?),
            VariantTypeId::Int64 => Variant::from(i64::decode(stream, decoding_options)?),
            VariantTypeId::UInt64 => Variant::from(u64::decode(stream, decoding_options)?),
            VariantTypeId::Float => Variant::from(f32::decode(stream, decoding_options)?),
            VariantTypeId::Double => Variant::from(f64::decode(stream, decoding_options)?),
            VariantTypeId::String => Variant::from(UAString::decode(stream, decoding_options)?),
            VariantTypeId::DateTime => Variant::from(DateTime::decode(stream, decoding_options)?),
            VariantTypeId::Guid => Variant::from(Guid::decode(stream, decoding_options)?),
            VariantTypeId::StatusCode => {
                Variant::from(StatusCode::decode(stream, decoding_options)?)
            }
            VariantTypeId::ByteString => {
                Variant::from(ByteString::decode(stream, decoding_options)?)
            }
            VariantTypeId::Array => {
                error!("Array type id has no scalar value to decode");
                return Err(StatusCode::BadDecodingError);
            }
        };
        Ok(value)
    }
}
