// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The PubSub data plane of OPC UA for Rust. This crate binds user visible variables to
//! periodic UADP NetworkMessages on the publishing side and decodes NetworkMessages back
//! into variables on the subscribing side, over pluggable transport channels (UDP multicast,
//! MQTT). A realtime fixed-offset mode precomputes the byte offset of every volatile field
//! so that each publish or receive cycle is an in-place patch of a pre-encoded buffer.
//!
//! The session / service layer of OPC UA, the information model and the scheduler live in
//! their own crates. This crate only assumes a host that calls the publish tick and receive
//! dispatch, and a value backend registry standing in for the address space.

#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::float_cmp)]
// Status codes carry their standard OPC UA names
#![allow(non_upper_case_globals)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

#[cfg(feature = "console-logging")]
pub mod console_logging;
pub mod core;
pub mod pubsub;
pub mod types;

pub mod prelude {
    pub use crate::core::handle::Handle;
    pub use crate::core::url::*;
    pub use crate::pubsub::core::*;
    pub use crate::pubsub::transport::*;
    pub use crate::types::*;
}
