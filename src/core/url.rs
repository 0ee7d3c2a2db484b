// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides functions for parsing PubSub transport Urls from strings.

use url::Url;

use crate::types::status_code::StatusCode;

/// UDP datagram scheme, `opc.udp://<host>:<port>/`
pub const OPC_UDP_SCHEME: &str = "opc.udp";
/// MQTT broker scheme, `opc.mqtt://<host>:<port>/<topic>`
pub const OPC_MQTT_SCHEME: &str = "opc.mqtt";
/// Raw Ethernet scheme, `opc.eth://<interface>`
pub const OPC_ETH_SCHEME: &str = "opc.eth";

/// Default port for UADP over UDP
pub const DEFAULT_UDP_PORT: u16 = 4840;
/// Default port of an MQTT broker
pub const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportScheme {
    Udp,
    Mqtt,
    Eth,
}

/// A transport URL broken into the parts the channels work with. The path keeps its
/// leading `/` stripped so an MQTT url yields the topic directly.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportUrl {
    pub scheme: TransportScheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl TransportUrl {
    /// Splits a transport url of one of the `opc.*` schemes into its parts. Unknown schemes
    /// and urls without a host fail with `BadInvalidArgument`.
    pub fn parse(url: &str) -> Result<TransportUrl, StatusCode> {
        let parsed = Url::parse(url).map_err(|err| {
            error!("Cannot parse url \"{}\", error = {:?}", url, err);
            StatusCode::BadInvalidArgument
        })?;
        let scheme = match parsed.scheme() {
            OPC_UDP_SCHEME => TransportScheme::Udp,
            OPC_MQTT_SCHEME => TransportScheme::Mqtt,
            OPC_ETH_SCHEME => TransportScheme::Eth,
            scheme => {
                error!("Url \"{}\" has unsupported scheme {}", url, scheme);
                return Err(StatusCode::BadInvalidArgument);
            }
        };
        let host = parsed
            .host_str()
            .ok_or_else(|| {
                error!("Url \"{}\" has no host", url);
                StatusCode::BadInvalidArgument
            })?
            .to_string();
        let port = parsed.port().unwrap_or(match scheme {
            TransportScheme::Mqtt => DEFAULT_MQTT_PORT,
            // Ethernet has no port; the value is unused for that scheme
            _ => DEFAULT_UDP_PORT,
        });
        let path = parsed.path().trim_start_matches('/').to_string();
        Ok(TransportUrl {
            scheme,
            host,
            port,
            path,
        })
    }

    /// The `host:port` pair, e.g. for a socket address lookup
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_udp_url() {
        let url = TransportUrl::parse("opc.udp://224.0.0.22:4840/").unwrap();
        assert_eq!(url.scheme, TransportScheme::Udp);
        assert_eq!(url.host, "224.0.0.22");
        assert_eq!(url.port, 4840);
        assert_eq!(url.path, "");
    }

    #[test]
    fn parse_mqtt_url() {
        let url = TransportUrl::parse("opc.mqtt://broker:1883/customTopic").unwrap();
        assert_eq!(url.scheme, TransportScheme::Mqtt);
        assert_eq!(url.host, "broker");
        assert_eq!(url.port, 1883);
        assert_eq!(url.path, "customTopic");

        // Default port
        let url = TransportUrl::parse("opc.mqtt://broker/t").unwrap();
        assert_eq!(url.port, DEFAULT_MQTT_PORT);
    }

    #[test]
    fn parse_eth_url() {
        let url = TransportUrl::parse("opc.eth://eth0").unwrap();
        assert_eq!(url.scheme, TransportScheme::Eth);
        assert_eq!(url.host, "eth0");
    }

    #[test]
    fn unknown_scheme_is_invalid() {
        assert_eq!(
            TransportUrl::parse("opc.tcp://localhost:4840/").unwrap_err(),
            StatusCode::BadInvalidArgument
        );
        assert_eq!(
            TransportUrl::parse("not a url").unwrap_err(),
            StatusCode::BadInvalidArgument
        );
    }
}
