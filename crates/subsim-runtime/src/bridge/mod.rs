//! Bridge to a relay process bound to a physical network interface.
//!
//! The relay owns the real sockets; the engine tells it which endpoints to
//! open and exchanges register traffic with it as JSON over one WebSocket.
//! Failures never reach register I/O callers: they show up as a
//! disconnected [`BridgeSession`] and a log entry.

#![allow(missing_docs)]

mod client;
mod protocol;

use smol_str::SmolStr;

pub use client::{BridgeClient, BridgeEvent, BridgeSession};
pub use protocol::{
    Adapter, ClientMessage, Endpoint, EndpointProtocol, EndpointStatus, RelayMessage,
    DEFAULT_BACKEND_HOST,
};

pub const DEFAULT_MODBUS_PORT: u16 = 502;

/// Modbus server exposure of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusEndpointConfig {
    pub enabled: bool,
    pub port: u16,
    /// Slave id, 1..=247.
    pub unit_id: u8,
    /// Local port the relay forwards to; defaults to `port`.
    pub backend_port: Option<u16>,
}

impl Default for ModbusEndpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_MODBUS_PORT,
            unit_id: 1,
            backend_port: None,
        }
    }
}

/// Endpoint list for every enabled device, bound to `adapter_ip`.
pub fn modbus_endpoints<'a>(
    devices: impl IntoIterator<Item = (&'a SmolStr, &'a ModbusEndpointConfig)>,
    adapter_ip: &str,
) -> Vec<Endpoint> {
    devices
        .into_iter()
        .filter(|(_, config)| config.enabled)
        .map(|(device, config)| Endpoint {
            id: device.clone(),
            name: device.clone(),
            ip: adapter_ip.into(),
            port: config.port,
            backend_host: DEFAULT_BACKEND_HOST.into(),
            backend_port: config.backend_port.unwrap_or(config.port),
            scd_file: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_devices_get_no_endpoint() {
        let gen = SmolStr::new("GEN1");
        let feeder = SmolStr::new("FDR1");
        let enabled = ModbusEndpointConfig {
            port: 1502,
            backend_port: Some(15020),
            ..ModbusEndpointConfig::default()
        };
        let disabled = ModbusEndpointConfig {
            enabled: false,
            ..ModbusEndpointConfig::default()
        };
        let endpoints = modbus_endpoints([(&gen, &enabled), (&feeder, &disabled)], "10.0.0.5");
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].id, "GEN1");
        assert_eq!(endpoints[0].ip, "10.0.0.5");
        assert_eq!(endpoints[0].port, 1502);
        assert_eq!(endpoints[0].backend_port, 15020);
    }
}
