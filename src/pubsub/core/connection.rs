// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the PubSub connection - the binding of a transport url to a publisher id and a
//! concrete channel, owning the writer and reader groups that use it.

use std::time::Duration;

use crate::core::url::{TransportScheme, TransportUrl};
use crate::pubsub::transport::{MqttChannel, MqttClientSettings, PubSubChannel, UdpChannel};
use crate::pubsub::uadp::PublisherId;
use crate::pubsub::{publisher, subscriber};
use crate::types::{
    encoding::DecodingOptions, status_code::StatusCode, string::UAString,
};

use super::{
    published_data_set::PublishedDataSet, reader_group::ReaderGroup,
    value_backend::ValueBackendRegistry, writer_group::WriterGroup, PubSubId,
};

pub const TRANSPORT_PROFILE_UDP_UADP: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-udp-uadp";
pub const TRANSPORT_PROFILE_MQTT_UADP: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-mqtt-uadp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubConnectionConfig {
    pub name: UAString,
    pub enabled: bool,
    pub transport_profile_uri: UAString,
    /// The transport url, e.g. `opc.udp://224.0.0.22:4840/`
    pub address: UAString,
    pub publisher_id: PublisherId,
    /// Client settings when the address is an `opc.mqtt` url
    pub mqtt_settings: Option<MqttClientSettings>,
}

impl Default for PubSubConnectionConfig {
    fn default() -> Self {
        Self {
            name: UAString::null(),
            enabled: true,
            transport_profile_uri: UAString::from(TRANSPORT_PROFILE_UDP_UADP),
            address: UAString::null(),
            publisher_id: PublisherId::default(),
            mqtt_settings: None,
        }
    }
}

/// A connection. The channel is opened on creation and closed on removal; groups are owned
/// and die with the connection.
pub struct PubSubConnection {
    pub id: PubSubId,
    pub config: PubSubConnectionConfig,
    url: TransportUrl,
    channel: Box<dyn PubSubChannel>,
    writer_groups: Vec<WriterGroup>,
    reader_groups: Vec<ReaderGroup>,
}

impl PubSubConnection {
    /// Creates the connection, opening its channel. Ethernet urls parse but have no
    /// channel in this crate.
    pub fn new(id: PubSubId, config: &PubSubConnectionConfig) -> Result<Self, StatusCode> {
        let url = TransportUrl::parse(config.address.as_ref())?;
        let channel: Box<dyn PubSubChannel> = match url.scheme {
            TransportScheme::Udp => Box::new(UdpChannel::new(&url)?),
            TransportScheme::Mqtt => {
                let settings = config.mqtt_settings.clone().unwrap_or_default();
                Box::new(MqttChannel::connect(&url, &settings)?)
            }
            TransportScheme::Eth => {
                error!("Ethernet transport is not implemented by this stack");
                return Err(StatusCode::BadNotImplemented);
            }
        };
        Ok(PubSubConnection {
            id,
            config: config.clone(),
            url,
            channel,
            writer_groups: Vec::new(),
            reader_groups: Vec::new(),
        })
    }

    pub fn url(&self) -> &TransportUrl {
        &self.url
    }

    pub fn channel_mut(&mut self) -> &mut dyn PubSubChannel {
        self.channel.as_mut()
    }

    pub fn writer_groups(&self) -> &[WriterGroup] {
        &self.writer_groups
    }

    pub fn writer_groups_mut(&mut self) -> &mut Vec<WriterGroup> {
        &mut self.writer_groups
    }

    pub fn reader_groups(&self) -> &[ReaderGroup] {
        &self.reader_groups
    }

    pub fn reader_groups_mut(&mut self) -> &mut Vec<ReaderGroup> {
        &mut self.reader_groups
    }

    pub fn has_writer_group(&self, id: PubSubId) -> bool {
        self.writer_groups.iter().any(|g| g.id == id)
    }

    pub fn has_reader_group(&self, id: PubSubId) -> bool {
        self.reader_groups.iter().any(|g| g.id == id)
    }

    pub fn find_writer_group_mut(&mut self, id: PubSubId) -> Option<&mut WriterGroup> {
        self.writer_groups.iter_mut().find(|g| g.id == id)
    }

    pub fn find_reader_group_mut(&mut self, id: PubSubId) -> Option<&mut ReaderGroup> {
        self.reader_groups.iter_mut().find(|g| g.id == id)
    }

    /// One publish tick of a writer group on this connection - patch or build, then hand
    /// the bytes to the channel.
    pub fn publish_writer_group(
        &mut self,
        group_id: PubSubId,
        data_sets: &[PublishedDataSet],
        backends: &ValueBackendRegistry,
    ) -> Result<(), StatusCode> {
        let publisher_id = self.config.publisher_id;
        let group = self
            .writer_groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        if !group.config.enabled {
            error!("Writer group {} is not operational", group_id);
            return Err(StatusCode::BadInvalidState);
        }
        if group.offset_buffer().is_some() {
            // Realtime - the message is never rebuilt, only patched in place
            publisher::patch_frozen_message(group, data_sets)?;
            match group.offset_buffer() {
                Some(offset_buffer) => self.channel.send(offset_buffer.bytes()),
                None => Err(StatusCode::BadInternalError),
            }
        } else {
            let nm = publisher::build_network_message(
                group,
                publisher_id,
                data_sets,
                backends,
                publisher::BuildMode::Tick,
            )?;
            group.encode_to_send_buffer(&nm)?;
            let bytes = group.send_buffer();
            self.channel.send(bytes)
        }
    }

    /// Pulls buffers from the channel and dispatches each to the reader groups.
    pub fn receive(
        &mut self,
        timeout: Duration,
        backends: &mut ValueBackendRegistry,
        decoding_options: &DecodingOptions,
    ) -> Result<usize, StatusCode> {
        let mut buffers = Vec::new();
        self.channel
            .receive(timeout, &mut |buf| buffers.push(buf.to_vec()))?;
        let count = buffers.len();
        for buf in buffers {
            // A malformed packet must not stop the dispatch of the rest
            if let Err(err) = subscriber::process_network_message(
                &mut self.reader_groups,
                &buf,
                backends,
                decoding_options,
            ) {
                warn!("Connection {} dropped an undecodable packet, {}", self.id, err);
            }
        }
        Ok(count)
    }

    /// Closes the channel. Removal of the connection calls this.
    pub fn close(&mut self) -> Result<(), StatusCode> {
        self.channel.close()
    }
}
