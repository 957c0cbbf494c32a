mod common;

use std::time::Duration;

use common::{
    engine, ms, spawn_relay, wait_until, RelayMode, LATE_ACK_DELAY, RELAY_ADAPTER_IP,
};
use subsim_runtime::bridge::{Endpoint, EndpointProtocol, EndpointStatus, ModbusEndpointConfig};
use subsim_runtime::engine::BRIDGE_SOURCE;
use subsim_runtime::log::LogLevel;
use subsim_runtime::store::RegisterBank;
use subsim_runtime::BridgeError;

#[test]
fn relay_binds_endpoints_and_exchanges_register_writes() {
    let (url, relay) = spawn_relay(RelayMode::Cooperative);
    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());
    engine.register_modbus(
        "GEN1",
        ModbusEndpointConfig {
            port: 1502,
            ..ModbusEndpointConfig::default()
        },
    );

    engine.connect_bridge(&url, Duration::from_secs(2)).unwrap();
    assert!(engine.bridge_session().connected);
    assert!(wait_until(Duration::from_secs(2), || !engine
        .bridge_session()
        .adapters
        .is_empty()));
    assert_eq!(engine.bridge_session().adapters[0].ip, RELAY_ADAPTER_IP);

    engine.select_adapter(RELAY_ADAPTER_IP).unwrap();
    let statuses = engine.publish_modbus_endpoints(Duration::from_secs(2)).unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].id, "GEN1");
    assert_eq!(statuses[0].status, "listening");

    // The relay follows its acknowledgment with a remote write of HR[192].
    assert!(wait_until(Duration::from_secs(2), || {
        engine.poll_bridge();
        engine.get_register(192) == Some(1)
    }));
    let applied = engine
        .logs()
        .recent()
        .into_iter()
        .rev()
        .find(|entry| entry.message.contains("HR[192]"))
        .unwrap();
    assert_eq!(applied.source, BRIDGE_SOURCE);

    engine.set_register(14, 16, "ui");
    let session = engine.bridge_session();
    assert!(session.rx_count >= 3);
    engine.disconnect_bridge();
    assert!(!engine.bridge_session().connected);

    let frames = relay.join().unwrap();
    let types: Vec<&str> = frames
        .iter()
        .filter_map(|frame| frame["type"].as_str())
        .collect();
    assert_eq!(
        types,
        vec![
            "LIST_ADAPTERS",
            "SELECT_ADAPTER",
            "SET_PROTOCOL_ENDPOINTS",
            "REGISTER_UPDATE"
        ]
    );
    assert_eq!(frames[1]["ip"], RELAY_ADAPTER_IP);
    let endpoint = &frames[2]["endpoints"][0];
    assert_eq!(frames[2]["protocol"], "modbus");
    assert_eq!(endpoint["id"], "GEN1");
    assert_eq!(endpoint["ip"], RELAY_ADAPTER_IP);
    assert_eq!(endpoint["port"], 1502);
    assert_eq!(endpoint["backendHost"], "127.0.0.1");
    assert_eq!(endpoint["backendPort"], 1502);
    assert_eq!(frames[3]["registerType"], "holding");
    assert_eq!(frames[3]["address"], 14);
    assert_eq!(frames[3]["value"], 16);
}

#[test]
fn writes_to_other_devices_are_not_mirrored() {
    let (url, relay) = spawn_relay(RelayMode::Silent);
    let mut engine = engine();
    engine.load_profile("GEN2", RegisterBank::new());
    engine.load_profile("GEN1", RegisterBank::new());
    engine.load_script("GEN2", "Device.WriteRegister(1, 7);\n").unwrap();
    engine.connect_bridge(&url, Duration::from_secs(2)).unwrap();

    engine.tick();
    engine.set_coil(3, true, "ui");
    engine.disconnect_bridge();

    let frames = relay.join().unwrap();
    let updates: Vec<_> = frames
        .iter()
        .filter(|frame| frame["type"] == "REGISTER_UPDATE")
        .collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["registerType"], "coil");
    assert_eq!(updates[0]["value"], true);
}

fn endpoint(id: &str) -> Endpoint {
    Endpoint {
        id: id.into(),
        name: id.into(),
        ip: "172.16.21.12".into(),
        port: 102,
        backend_host: "127.0.0.1".into(),
        backend_port: 10_102,
        scd_file: None,
    }
}

fn ack_ids(result: Result<Vec<EndpointStatus>, BridgeError>) -> Vec<String> {
    result
        .unwrap()
        .into_iter()
        .map(|status| status.id.to_string())
        .collect()
}

#[test]
fn late_acknowledgment_in_flight_does_not_answer_the_next_request() {
    let (url, relay) = spawn_relay(RelayMode::LateAck);
    let mut engine = engine();
    engine.connect_bridge(&url, Duration::from_secs(2)).unwrap();

    let first = engine.bind_endpoints(EndpointProtocol::Iec61850, vec![endpoint("first")], ms(200));
    assert_eq!(first, Err(BridgeError::AckTimeout(200)));

    // The first acknowledgment arrives while this request is outstanding.
    let second = engine.bind_endpoints(
        EndpointProtocol::Iec61850,
        vec![endpoint("second")],
        Duration::from_secs(2),
    );
    assert_eq!(ack_ids(second), vec!["second"]);

    engine.disconnect_bridge();
    relay.join().unwrap();
}

#[test]
fn queued_late_acknowledgment_is_discarded() {
    let (url, relay) = spawn_relay(RelayMode::LateAck);
    let mut engine = engine();
    engine.connect_bridge(&url, Duration::from_secs(2)).unwrap();

    let first = engine.bind_endpoints(EndpointProtocol::Iec61850, vec![endpoint("first")], ms(200));
    assert_eq!(first, Err(BridgeError::AckTimeout(200)));
    assert!(wait_until(LATE_ACK_DELAY * 5, || engine.bridge_session().rx_count >= 1));

    let second = engine.bind_endpoints(
        EndpointProtocol::Iec61850,
        vec![endpoint("second")],
        Duration::from_secs(2),
    );
    assert_eq!(ack_ids(second), vec!["second"]);

    engine.disconnect_bridge();
    relay.join().unwrap();
}

#[test]
fn missing_acknowledgment_times_out() {
    let (url, relay) = spawn_relay(RelayMode::Silent);
    let mut engine = engine();
    engine.register_modbus("GEN1", ModbusEndpointConfig::default());
    engine.connect_bridge(&url, Duration::from_secs(2)).unwrap();
    engine.select_adapter(RELAY_ADAPTER_IP).unwrap();

    let err = engine.publish_modbus_endpoints(ms(200)).unwrap_err();
    assert_eq!(err, BridgeError::AckTimeout(200));
    assert!(engine.bridge_session().connected);

    engine.disconnect_bridge();
    relay.join().unwrap();
}

#[test]
fn unreachable_relay_leaves_the_engine_local() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());
    let err = engine.connect_bridge(&url, ms(500)).unwrap_err();
    assert!(matches!(err, BridgeError::Connect(_)), "{err:?}");

    let session = engine.bridge_session();
    assert!(!session.connected);
    assert_eq!(session.url, url.as_str());
    assert_eq!(
        engine.publish_modbus_endpoints(ms(100)),
        Err(BridgeError::NotConnected)
    );

    engine.set_register(1, 42, "ui");
    assert_eq!(engine.get_register(1), Some(42));
}

#[test]
fn only_plain_websocket_urls_are_accepted() {
    let mut engine = engine();
    let err = engine
        .connect_bridge("http://127.0.0.1:9/", ms(100))
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidUrl { .. }), "{err:?}");
}

#[test]
fn relay_hang_up_is_reported_as_a_disconnect() {
    let (url, relay) = spawn_relay(RelayMode::HangUp);
    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());
    engine.connect_bridge(&url, Duration::from_secs(2)).unwrap();

    assert!(wait_until(Duration::from_secs(2), || !engine
        .bridge_session()
        .connected));
    engine.poll_bridge();
    let last = engine.logs().recent().pop().unwrap();
    assert_eq!(last.source, BRIDGE_SOURCE);
    assert_eq!(last.level, LogLevel::Warning);

    // Later writes stay local.
    engine.set_register(1, 5, "ui");
    assert_eq!(engine.get_register(1), Some(5));
    assert_eq!(relay.join().unwrap().len(), 1);
}
