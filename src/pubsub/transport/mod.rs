// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The pluggable transport channels. A channel moves opaque byte buffers and knows nothing
//! about what is in them. Each transport implements the same small capability set rather
//! than inheriting shared state - opening is construction, everything else is a method.

use std::time::Duration;

use crate::types::status_code::StatusCode;

pub mod mqtt;
pub mod udp;

pub use mqtt::{MqttChannel, MqttClientSettings};
pub use udp::UdpChannel;

/// The capability set of a transport channel.
///
/// `send` hands a buffer to the transport - it returns `Ok` only when the bytes were
/// accepted, and promises no delivery beyond that. `receive` delivers zero or more buffers
/// to the callback within the timeout; a buffer is only valid for the duration of the
/// callback, which copies what it needs. Timeout expiry is not an error. `yield_once` is
/// the cooperative tick for channels that run their own protocol state; transports without
/// one treat it as a no-op.
pub trait PubSubChannel {
    fn send(&mut self, buf: &[u8]) -> Result<(), StatusCode>;

    fn receive(
        &mut self,
        timeout: Duration,
        on_message: &mut dyn FnMut(&[u8]),
    ) -> Result<(), StatusCode>;

    fn yield_once(&mut self, timeout: Duration) -> Result<(), StatusCode>;

    fn close(&mut self) -> Result<(), StatusCode>;
}
