// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The UDP channel - UADP datagrams over multicast or unicast.

use std::{
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    time::{Duration, Instant},
};

use socket2::{Domain, Protocol, Socket, Type};

use crate::core::url::TransportUrl;
use crate::types::{constants, status_code::StatusCode};

use super::PubSubChannel;

/// A bound UDP socket joined to the multicast group of its url. Publisher and subscriber
/// sides share the same channel type - the group address is both the send destination and
/// the receive membership.
pub struct UdpChannel {
    socket: Option<UdpSocket>,
    destination: SocketAddr,
}

impl UdpChannel {
    /// Opens the channel - binds the port with address reuse so that several subscribers
    /// on one host can share it, joins the multicast group on all interfaces, and enables
    /// loopback so a publisher and subscriber in the same process see each other.
    pub fn new(url: &TransportUrl) -> Result<UdpChannel, StatusCode> {
        let addr: Ipv4Addr = url.host.parse().map_err(|_| {
            error!("UDP channel address {} is not an IPv4 address", url.host);
            StatusCode::BadInvalidArgument
        })?;
        let destination = SocketAddr::V4(SocketAddrV4::new(addr, url.port));

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| Self::io_error("create", e))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| Self::io_error("set reuse address on", e))?;
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, url.port));
        socket
            .bind(&bind_addr.into())
            .map_err(|e| Self::io_error("bind", e))?;
        let socket: UdpSocket = socket.into();

        if addr.is_multicast() {
            socket
                .join_multicast_v4(&addr, &Ipv4Addr::UNSPECIFIED)
                .map_err(|e| Self::io_error("join multicast on", e))?;
            socket
                .set_multicast_loop_v4(true)
                .map_err(|e| Self::io_error("set multicast loop on", e))?;
            let _ = socket.set_multicast_ttl_v4(1);
        }

        Ok(UdpChannel {
            socket: Some(socket),
            destination,
        })
    }

    fn io_error(action: &str, err: std::io::Error) -> StatusCode {
        error!("UDP channel failed to {} its socket, error = {:?}", action, err);
        StatusCode::BadCommunicationError
    }

    fn socket(&self) -> Result<&UdpSocket, StatusCode> {
        self.socket.as_ref().ok_or(StatusCode::BadNotConnected)
    }
}

impl PubSubChannel for UdpChannel {
    fn send(&mut self, buf: &[u8]) -> Result<(), StatusCode> {
        let socket = self.socket()?;
        socket.send_to(buf, self.destination).map_err(|err| {
            error!("UDP send failed, error = {:?}", err);
            StatusCode::BadCommunicationError
        })?;
        Ok(())
    }

    fn receive(
        &mut self,
        timeout: Duration,
        on_message: &mut dyn FnMut(&[u8]),
    ) -> Result<(), StatusCode> {
        let socket = self.socket()?;
        let mut buf = vec![0u8; constants::MAX_MESSAGE_SIZE];
        let deadline = Instant::now() + timeout;
        let mut remaining = timeout;
        loop {
            // A zero timeout would make the socket block forever
            socket
                .set_read_timeout(Some(remaining.max(Duration::from_millis(1))))
                .map_err(|e| Self::io_error("set read timeout on", e))?;
            match socket.recv_from(&mut buf) {
                Ok((size, _)) => {
                    on_message(&buf[..size]);
                    // Drain whatever else is already queued, then return rather than
                    // sitting out the rest of the timeout
                    remaining = Duration::from_millis(1);
                    continue;
                }
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    // Timeout expiry delivers whatever arrived, which may be nothing
                    return Ok(());
                }
                Err(err) => {
                    error!("UDP receive failed, error = {:?}", err);
                    return Err(StatusCode::BadCommunicationError);
                }
            }
            match deadline.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => remaining = left,
                _ => return Ok(()),
            }
        }
    }

    fn yield_once(&mut self, _timeout: Duration) -> Result<(), StatusCode> {
        // UDP has no protocol state to drive
        Ok(())
    }

    fn close(&mut self) -> Result<(), StatusCode> {
        self.socket = None;
        Ok(())
    }
}
