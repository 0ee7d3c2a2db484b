// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The PubSub object model - connections, published data sets, writer and reader groups,
//! their writers and readers, the value backends that stand in for the address space, and
//! the manager that owns all of them.

use std::fmt;

pub mod connection;
pub mod data_set_reader;
pub mod data_set_writer;
pub mod manager;
pub mod published_data_set;
pub mod reader_group;
pub mod value_backend;
pub mod writer_group;

pub use connection::*;
pub use data_set_reader::*;
pub use data_set_writer::*;
pub use manager::*;
pub use published_data_set::*;
pub use reader_group::*;
pub use value_backend::*;
pub use writer_group::*;

/// An opaque identifier for a PubSub entity, unique within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PubSubId(pub u32);

impl fmt::Display for PubSubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Realtime level of a writer or reader group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PubSubRtLevel {
    /// Messages are built and encoded from scratch each cycle
    None,
    /// Every message has an identical byte layout known at freeze time, enabling in-place
    /// patching of a pre-encoded buffer
    FixedSize,
}

impl Default for PubSubRtLevel {
    fn default() -> Self {
        PubSubRtLevel::None
    }
}

/// Message mapping of a writer group. Only the UADP binary mapping is implemented; the
/// JSON mapping belongs to a broker-side profile this crate does not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PubSubEncoding {
    Uadp,
}

impl Default for PubSubEncoding {
    fn default() -> Self {
        PubSubEncoding::Uadp
    }
}

/// The attribute a published or subscribed variable binds to. Only the value attribute
/// takes part in the data plane.
pub const ATTRIBUTE_ID_VALUE: u32 = 13;
