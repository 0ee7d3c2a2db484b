// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the `StatusCode` type. The full OPC UA status code set lives in the session layer
//! crates; this is the subset the PubSub data plane raises or forwards, in the same 32-bit
//! numeric space so codes cross the crate boundary unchanged.

use std::{
    error::Error,
    fmt,
    fmt::Formatter,
    io::{self, Read, Write},
};

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::types::encoding::*;

bitflags! {
    pub struct StatusCode: u32 {
        /// The operation succeeded.
        const Good = 0;
        /// An unexpected error occurred.
        const BadUnexpectedError = 0x8001_0000;
        /// An internal error occurred as a result of a programming or configuration error.
        const BadInternalError = 0x8002_0000;
        /// Not enough memory to complete the operation.
        const BadOutOfMemory = 0x8003_0000;
        /// A low level communication error occurred.
        const BadCommunicationError = 0x8005_0000;
        /// Encoding halted because of invalid data in the objects being serialized.
        const BadEncodingError = 0x8006_0000;
        /// Decoding halted because of invalid data in the stream.
        const BadDecodingError = 0x8007_0000;
        /// The message encoding/decoding limits imposed by the stack have been exceeded.
        const BadEncodingLimitsExceeded = 0x8008_0000;
        /// The operation timed out.
        const BadTimeout = 0x800A_0000;
        /// The extension object cannot be (de)serialized because the data type id is not recognized.
        const BadDataTypeIdUnknown = 0x8011_0000;
        /// An error occurred verifying security.
        const BadSecurityChecksFailed = 0x8013_0000;
        /// The requested operation is not supported.
        const BadNotSupported = 0x803D_0000;
        /// The requested operation is not implemented.
        const BadNotImplemented = 0x8040_0000;
        /// The data encoding is unsupported.
        const BadDataEncodingUnsupported = 0x8039_0000;
        /// The node id refers to a node that does not exist in the server address space.
        const BadNodeIdUnknown = 0x8034_0000;
        /// A mandatory input argument was missing.
        const BadArgumentsMissing = 0x8076_0000;
        /// There is a problem with the configuration that affects the usefulness of the value.
        const BadConfigurationError = 0x8089_0000;
        /// The variable should receive its value from another variable, but has never been configured to do so.
        const BadNotConnected = 0x808A_0000;
        /// One or more arguments are invalid.
        const BadInvalidArgument = 0x80AB_0000;
        /// The server has rejected the connection.
        const BadConnectionRejected = 0x80AC_0000;
        /// The operation cannot be completed because the object is closed, uninitialized or in some other invalid state.
        const BadInvalidState = 0x80AF_0000;

        // Masks
        const SUB_CODE_MASK = 0x0FFF_0000;
        const IS_ERROR = 0x8000_0000;
        const IS_UNCERTAIN = 0x4000_0000;
        const STATUS_MASK = 0xFFFF_0000;
        const BIT_MASK = 0x0000_FFFF;
    }
}

// The bitflags! macro implements Debug for StatusCode but it fouls the display because status
// codes are a combination of bits and unique values.

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        // Displays the StatusCode as it's name, or its name+bitflags
        let bits = self.bitflags();
        if bits.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}+{:?}", self.name(), bits)
        }
    }
}

impl BinaryEncoder<StatusCode> for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u32(stream, self.bits())
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode::from_bits_truncate(read_u32(stream)?))
    }
}

impl Error for StatusCode {}

impl StatusCode {
    /// Returns the bit flags of the status code, i.e. it masks out the actual status code value
    pub fn bitflags(&self) -> StatusCode {
        *self & StatusCode::BIT_MASK
    }

    /// Returns the status only, i.e. it masks out any bit flags that come with the status code
    pub fn status(&self) -> StatusCode {
        *self & StatusCode::STATUS_MASK
    }

    /// Tests if the status code is bad
    pub fn is_bad(&self) -> bool {
        self.contains(StatusCode::IS_ERROR)
    }

    /// Tests if the status code is uncertain
    pub fn is_uncertain(&self) -> bool {
        self.contains(StatusCode::IS_UNCERTAIN)
    }

    /// Tests if the status code is good (i.e. not bad or uncertain)
    pub fn is_good(&self) -> bool {
        !self.is_bad() && !self.is_uncertain()
    }

    /// Symbolic name of the status part of the code.
    pub fn name(&self) -> &'static str {
        match self.status() {
            StatusCode::Good => "Good",
            StatusCode::BadUnexpectedError => "BadUnexpectedError",
            StatusCode::BadInternalError => "BadInternalError",
            StatusCode::BadOutOfMemory => "BadOutOfMemory",
            StatusCode::BadCommunicationError => "BadCommunicationError",
            StatusCode::BadEncodingError => "BadEncodingError",
            StatusCode::BadDecodingError => "BadDecodingError",
            StatusCode::BadEncodingLimitsExceeded => "BadEncodingLimitsExceeded",
            StatusCode::BadTimeout => "BadTimeout",
            StatusCode::BadDataTypeIdUnknown => "BadDataTypeIdUnknown",
            StatusCode::BadSecurityChecksFailed => "BadSecurityChecksFailed",
            StatusCode::BadNotSupported => "BadNotSupported",
            StatusCode::BadNotImplemented => "BadNotImplemented",
            StatusCode::BadDataEncodingUnsupported => "BadDataEncodingUnsupported",
            StatusCode::BadNodeIdUnknown => "BadNodeIdUnknown",
            StatusCode::BadArgumentsMissing => "BadArgumentsMissing",
            StatusCode::BadConfigurationError => "BadConfigurationError",
            StatusCode::BadNotConnected => "BadNotConnected",
            StatusCode::BadInvalidArgument => "BadInvalidArgument",
            StatusCode::BadConnectionRejected => "BadConnectionRejected",
            StatusCode::BadInvalidState => "BadInvalidState",
            _ => "UnknownStatusCode",
        }
    }
}

impl From<StatusCode> for io::Error {
    fn from(e: StatusCode) -> io::Error {
        io::Error::new(io::ErrorKind::Other, format!("StatusCode {}", e))
    }
}

// Serialize / Deserialize are manually implemented because bitflags! doesn't do it.

impl Serialize for StatusCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

struct StatusCodeVisitor;

impl<'de> Visitor<'de> for StatusCodeVisitor {
    type Value = u32;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an unsigned 32-bit integer")
    }

    fn visit_u32<E>(self, value: u32) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(value as u32)
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<StatusCode, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(StatusCode::from_bits_truncate(
            deserializer.deserialize_u32(StatusCodeVisitor)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::StatusCode;

    #[test]
    fn is_good() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(StatusCode::BadDecodingError.is_bad());
        assert!(!StatusCode::BadDecodingError.is_good());
    }

    #[test]
    fn status_and_name() {
        assert_eq!(StatusCode::BadNotSupported.name(), "BadNotSupported");
        assert_eq!(StatusCode::BadConfigurationError.bits(), 0x8089_0000);
        assert_eq!(StatusCode::BadNotConnected.bits(), 0x808A_0000);
        assert_eq!(StatusCode::BadInvalidArgument.bits(), 0x80AB_0000);
    }
}
