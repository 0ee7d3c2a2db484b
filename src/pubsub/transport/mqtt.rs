// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The MQTT channel - UADP messages published to and consumed from a broker topic.
//!
//! The channel wraps the synchronous rumqttc client. Its event loop only advances when the
//! connection is polled, which is exactly the cooperative `yield` contract of a PubSub
//! channel - nothing happens between ticks, and a tick maps the library's errors onto the
//! channel error space.

use std::{path::PathBuf, time::Duration};

use rumqttc::{Client, Connection, ConnectionError, Event, MqttOptions, Packet, QoS};

#[cfg(feature = "mqtt-tls")]
use rumqttc::{TlsConfiguration, Transport};

use crate::core::url::TransportUrl;
use crate::types::status_code::StatusCode;

use super::PubSubChannel;

/// How long the connect sequence waits for the broker's CONNACK.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the request channel between client and event loop.
const CHANNEL_CAPACITY: usize = 1000;

/// Client settings of an MQTT connection, alongside the broker address which comes from
/// the transport url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttClientSettings {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// MQTT keep alive in seconds
    pub keep_alive: u16,
    /// Quality of service for the default topic, 0, 1 or 2
    pub qos: u8,
    /// Open a TLS session to the broker before any MQTT byte is sent
    pub use_tls: bool,
    /// PEM bundle of trusted certificate authorities
    pub ca_file: Option<PathBuf>,
    /// Client certificate, must be paired with `client_key_file`
    pub client_cert_file: Option<PathBuf>,
    /// Client private key, must be paired with `client_cert_file`
    pub client_key_file: Option<PathBuf>,
}

impl Default for MqttClientSettings {
    fn default() -> Self {
        Self {
            client_id: "OPCUARustMQTTClient".into(),
            username: None,
            password: None,
            keep_alive: 10,
            qos: 1,
            use_tls: false,
            ca_file: None,
            client_cert_file: None,
            client_key_file: None,
        }
    }
}

/// Maps a numeric quality of service onto the MQTT publish / subscribe flag.
pub fn qos_from_u8(qos: u8) -> Result<QoS, StatusCode> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        qos => {
            error!("MQTT: Bad QoS level {}", qos);
            Err(StatusCode::BadInvalidArgument)
        }
    }
}

struct MqttClient {
    client: Client,
    connection: Connection,
}

pub struct MqttChannel {
    settings: MqttClientSettings,
    /// Default topic from the url path, used by `send`
    topic: String,
    client: Option<MqttClient>,
    /// Publishes received during yields, pending delivery to `receive`
    pending: Vec<(String, Vec<u8>)>,
}

impl std::fmt::Debug for MqttChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttChannel")
            .field("settings", &self.settings)
            .field("topic", &self.topic)
            .field("connected", &self.client.is_some())
            .field("pending", &self.pending)
            .finish()
    }
}

impl MqttChannel {
    /// Opens the channel - TCP, then the TLS handshake when requested, then the MQTT
    /// CONNECT / CONNACK exchange, then a SUBSCRIBE to the default topic. Every resource
    /// acquired on the way is owned by this call, so a failure anywhere unwinds completely
    /// and the caller never receives a half connected channel.
    pub fn connect(url: &TransportUrl, settings: &MqttClientSettings) -> Result<MqttChannel, StatusCode> {
        if settings.client_cert_file.is_some() != settings.client_key_file.is_some() {
            error!("MQTT: if a client certificate is used, the certificate and key must both be specified");
            return Err(StatusCode::BadInvalidArgument);
        }
        #[cfg(not(feature = "mqtt-tls"))]
        if settings.use_tls {
            error!("MQTT: TLS connection requested but the stack was built without TLS support");
            return Err(StatusCode::BadInvalidArgument);
        }
        if url.path.is_empty() {
            error!("MQTT: url has no topic");
            return Err(StatusCode::BadInvalidArgument);
        }
        if settings.client_id.is_empty() {
            error!("MQTT: client id must not be empty");
            return Err(StatusCode::BadInvalidArgument);
        }

        // The opc.mqtt url turns into a plain TCP address for the client; the path part
        // is the topic, not sent to the broker in CONNECT.
        let mut options = MqttOptions::new(&settings.client_id, &url.host, url.port);
        options.set_keep_alive(Duration::from_secs(u64::from(settings.keep_alive)));
        if let Some(ref username) = settings.username {
            options.set_credentials(
                username.clone(),
                settings.password.clone().unwrap_or_default(),
            );
        }

        #[cfg(feature = "mqtt-tls")]
        if settings.use_tls {
            options.set_transport(Transport::Tls(Self::tls_configuration(settings)?));
        }

        let (client, mut connection) = Client::new(options, CHANNEL_CAPACITY);

        // Drive the event loop until the broker answers the CONNECT. The client and
        // connection are still local here - any error drops them and with them the
        // socket and TLS session.
        let deadline = std::time::Instant::now() + CONNECT_TIMEOUT;
        loop {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .ok_or_else(|| {
                    error!("MQTT: broker did not answer the connect in time");
                    StatusCode::BadCommunicationError
                })?;
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code == rumqttc::ConnectReturnCode::Success {
                        break;
                    }
                    error!("MQTT: broker refused the connection, code {:?}", ack.code);
                    return Err(StatusCode::BadConnectionRejected);
                }
                Ok(Ok(_)) => continue,
                Ok(Err(err)) => {
                    error!("MQTT: connect failed, error {:?}", err);
                    return Err(Self::map_connection_error(&err));
                }
                Err(_) => {
                    error!("MQTT: broker did not answer the connect in time");
                    return Err(StatusCode::BadCommunicationError);
                }
            }
        }

        let qos = qos_from_u8(settings.qos)?;
        client.subscribe(&url.path, qos).map_err(|err| {
            error!("MQTT: subscribe to {} failed, error {:?}", url.path, err);
            StatusCode::BadCommunicationError
        })?;

        Ok(MqttChannel {
            settings: settings.clone(),
            topic: url.path.clone(),
            client: Some(MqttClient { client, connection }),
            pending: Vec::new(),
        })
    }

    #[cfg(feature = "mqtt-tls")]
    fn tls_configuration(settings: &MqttClientSettings) -> Result<TlsConfiguration, StatusCode> {
        use std::fs;

        let ca = match settings.ca_file {
            Some(ref ca_file) => fs::read(ca_file).map_err(|err| {
                error!("MQTT: cannot read CA bundle {:?}, error {:?}", ca_file, err);
                StatusCode::BadSecurityChecksFailed
            })?,
            None => Vec::new(),
        };
        let client_auth = match (&settings.client_cert_file, &settings.client_key_file) {
            (Some(cert_file), Some(key_file)) => {
                let cert = fs::read(cert_file).map_err(|err| {
                    error!(
                        "MQTT: cannot read client certificate {:?}, error {:?}",
                        cert_file, err
                    );
                    StatusCode::BadSecurityChecksFailed
                })?;
                let key = fs::read(key_file).map_err(|err| {
                    error!("MQTT: cannot read client key {:?}, error {:?}", key_file, err);
                    StatusCode::BadSecurityChecksFailed
                })?;
                Some((cert, key))
            }
            _ => None,
        };
        Ok(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth,
        })
    }

    /// Maps library level errors onto channel errors.
    fn map_connection_error(err: &ConnectionError) -> StatusCode {
        match err {
            ConnectionError::ConnectionRefused(_) => StatusCode::BadConnectionRejected,
            ConnectionError::Io(_) => StatusCode::BadCommunicationError,
            ConnectionError::RequestsDone => StatusCode::BadNotConnected,
            #[cfg(feature = "mqtt-tls")]
            ConnectionError::Tls(_) => StatusCode::BadSecurityChecksFailed,
            _ => StatusCode::BadCommunicationError,
        }
    }

    /// Publishes a buffer to a topic with the given quality of service.
    pub fn publish(&mut self, topic: &str, buf: &[u8], qos: u8) -> Result<(), StatusCode> {
        let qos = qos_from_u8(qos)?;
        let client = self.client.as_mut().ok_or(StatusCode::BadNotConnected)?;
        client
            .client
            .try_publish(topic, qos, false, buf)
            .map_err(|err| {
                error!(
                    "MQTT: publish failed, error {:?}. Possible reasons: send queue too \
                     small, sending too fast, broker not responding",
                    err
                );
                StatusCode::BadConnectionRejected
            })
    }

    /// Subscribes to an additional topic.
    pub fn subscribe(&mut self, topic: &str, qos: u8) -> Result<(), StatusCode> {
        if topic.is_empty() {
            return Err(StatusCode::BadInvalidArgument);
        }
        let qos = qos_from_u8(qos)?;
        let client = self.client.as_mut().ok_or(StatusCode::BadNotConnected)?;
        client.client.subscribe(topic, qos).map_err(|err| {
            error!("MQTT: subscribe failed, error {:?}", err);
            StatusCode::BadCommunicationError
        })
    }

    /// Sends an UNSUBSCRIBE and stops delivering the topic's publishes.
    pub fn unsubscribe(&mut self, topic: &str) -> Result<(), StatusCode> {
        let client = self.client.as_mut().ok_or(StatusCode::BadNotConnected)?;
        client.client.unsubscribe(topic).map_err(|err| {
            error!("MQTT: unsubscribe failed, error {:?}", err);
            StatusCode::BadCommunicationError
        })?;
        self.pending.retain(|(t, _)| t != topic);
        Ok(())
    }
}

impl PubSubChannel for MqttChannel {
    fn send(&mut self, buf: &[u8]) -> Result<(), StatusCode> {
        let topic = self.topic.clone();
        let qos = self.settings.qos;
        self.publish(&topic, buf, qos)
    }

    fn receive(
        &mut self,
        timeout: Duration,
        on_message: &mut dyn FnMut(&[u8]),
    ) -> Result<(), StatusCode> {
        self.yield_once(timeout)?;
        for (_, payload) in self.pending.drain(..) {
            on_message(&payload);
        }
        Ok(())
    }

    fn yield_once(&mut self, timeout: Duration) -> Result<(), StatusCode> {
        let client = self.client.as_mut().ok_or_else(|| {
            error!("MQTT: yield: not connected");
            StatusCode::BadNotConnected
        })?;
        match client.connection.recv_timeout(timeout) {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                self.pending
                    .push((publish.topic.clone(), publish.payload.to_vec()));
                Ok(())
            }
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => {
                error!("MQTT: yield: error {:?}", err);
                Err(Self::map_connection_error(&err))
            }
            // Expiry is not an error, there was simply nothing to do
            Err(rumqttc::RecvTimeoutError::Timeout) => Ok(()),
            Err(rumqttc::RecvTimeoutError::Disconnected) => {
                error!("MQTT: yield: connection closed");
                Err(StatusCode::BadNotConnected)
            }
        }
    }

    /// Tears down MQTT, TLS and TCP in that order - the DISCONNECT goes out first, then
    /// dropping the connection closes the TLS session and socket beneath it.
    fn close(&mut self) -> Result<(), StatusCode> {
        if let Some(mut client) = self.client.take() {
            if client.client.disconnect().is_ok() {
                // Give the event loop one short tick to flush the DISCONNECT
                let _ = client.connection.recv_timeout(Duration::from_millis(10));
            }
        }
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_levels_map_to_mqtt_flags() {
        assert_eq!(qos_from_u8(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(2).unwrap(), QoS::ExactlyOnce);
        assert_eq!(qos_from_u8(3).unwrap_err(), StatusCode::BadInvalidArgument);
    }

    #[test]
    fn cert_without_key_is_rejected() {
        let url = TransportUrl::parse("opc.mqtt://localhost:1883/topic").unwrap();
        let settings = MqttClientSettings {
            client_cert_file: Some("client.pem".into()),
            ..Default::default()
        };
        assert_eq!(
            MqttChannel::connect(&url, &settings).unwrap_err(),
            StatusCode::BadInvalidArgument
        );
    }

    #[cfg(not(feature = "mqtt-tls"))]
    #[test]
    fn tls_without_support_is_rejected() {
        let url = TransportUrl::parse("opc.mqtt://localhost:1883/topic").unwrap();
        let settings = MqttClientSettings {
            use_tls: true,
            ..Default::default()
        };
        // Fails before any socket is opened
        assert_eq!(
            MqttChannel::connect(&url, &settings).unwrap_err(),
            StatusCode::BadInvalidArgument
        );
    }
}
