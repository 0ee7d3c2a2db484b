// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The UADP message mapping - NetworkMessage and DataSetMessage binary encoding plus the
//! offset tables that make fixed layout realtime operation possible.

pub mod data_set_message;
pub mod network_message;
pub mod offsets;

pub use data_set_message::*;
pub use network_message::*;
pub use offsets::*;
