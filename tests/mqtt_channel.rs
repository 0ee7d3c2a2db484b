//! MQTT channel argument handling that needs no broker.

use opcua_pubsub::core::url::{TransportScheme, TransportUrl};
use opcua_pubsub::pubsub::transport::mqtt::{qos_from_u8, MqttChannel, MqttClientSettings};
use opcua_pubsub::types::StatusCode;
use rumqttc::QoS;

#[test]
fn mqtt_url_turns_into_broker_address_and_topic() {
    let url = TransportUrl::parse("opc.mqtt://broker.example:1883/customTopic").unwrap();
    assert_eq!(url.scheme, TransportScheme::Mqtt);
    assert_eq!(url.host_port(), "broker.example:1883");
    assert_eq!(url.path, "customTopic");
}

#[test]
fn qos_levels_translate_or_reject() {
    assert_eq!(qos_from_u8(0).unwrap(), QoS::AtMostOnce);
    assert_eq!(qos_from_u8(1).unwrap(), QoS::AtLeastOnce);
    assert_eq!(qos_from_u8(2).unwrap(), QoS::ExactlyOnce);
    for qos in 3..=255u8 {
        assert_eq!(qos_from_u8(qos).unwrap_err(), StatusCode::BadInvalidArgument);
    }
}

#[test]
fn client_certificate_needs_its_key() {
    let url = TransportUrl::parse("opc.mqtt://localhost:1883/topic").unwrap();
    let cert_only = MqttClientSettings {
        client_cert_file: Some("client.pem".into()),
        ..Default::default()
    };
    assert_eq!(
        MqttChannel::connect(&url, &cert_only).unwrap_err(),
        StatusCode::BadInvalidArgument
    );
    let key_only = MqttClientSettings {
        client_key_file: Some("client.key".into()),
        ..Default::default()
    };
    assert_eq!(
        MqttChannel::connect(&url, &key_only).unwrap_err(),
        StatusCode::BadInvalidArgument
    );
}

#[cfg(not(feature = "mqtt-tls"))]
#[test]
fn tls_request_fails_without_tls_support() {
    let url = TransportUrl::parse("opc.mqtt://localhost:1883/topic").unwrap();
    let settings = MqttClientSettings {
        use_tls: true,
        ..Default::default()
    };
    // Rejected before any socket is opened
    assert_eq!(
        MqttChannel::connect(&url, &settings).unwrap_err(),
        StatusCode::BadInvalidArgument
    );
}

#[test]
fn url_without_topic_is_rejected() {
    let url = TransportUrl::parse("opc.mqtt://localhost:1883/").unwrap();
    assert_eq!(
        MqttChannel::connect(&url, &MqttClientSettings::default()).unwrap_err(),
        StatusCode::BadInvalidArgument
    );
}
