// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The built-in OPC UA types that the PubSub data plane works with, together with their
//! binary encoding. This is deliberately the subset that can travel in a DataSetMessage;
//! service types, extension objects and diagnostics belong to the session layer crates.

pub mod basic_types;
pub mod byte_string;
pub mod data_value;
pub mod date_time;
pub mod encoding;
pub mod guid;
pub mod node_id;
pub mod status_code;
pub mod string;
pub mod variant;

#[cfg(test)]
mod tests;

pub use crate::types::{
    byte_string::ByteString, data_value::DataValue, date_time::DateTime, encoding::*,
    guid::Guid, node_id::{Identifier, NodeId}, status_code::StatusCode, string::UAString,
    variant::{Variant, VariantTypeId},
};

pub mod constants {
    /// Maximum size of a NetworkMessage this stack will decode
    pub const MAX_MESSAGE_SIZE: usize = 65535;
    /// Maximum length in bytes of a decoded string
    pub const MAX_STRING_LENGTH: usize = 65535;
    /// Maximum length in bytes of a decoded byte string
    pub const MAX_BYTE_STRING_LENGTH: usize = 65535;
    /// Maximum number of elements in a decoded array
    pub const MAX_ARRAY_LENGTH: usize = 1000;
}
