//! JSON frames exchanged with the relay.
//!
//! Every frame is an object with a `type` discriminator in
//! `SCREAMING_SNAKE_CASE`; field names are camelCase.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::store::{RegisterType, RegisterValue};

/// Loopback address the relay forwards bound endpoints to.
pub const DEFAULT_BACKEND_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointProtocol {
    Iec61850,
    Modbus,
}

/// A listener the relay should open on the physical interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: SmolStr,
    pub name: SmolStr,
    pub ip: SmolStr,
    pub port: u16,
    pub backend_host: SmolStr,
    pub backend_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scd_file: Option<SmolStr>,
}

/// A physical network interface reported by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adapter {
    pub name: SmolStr,
    pub ip: SmolStr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub id: SmolStr,
    pub status: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SmolStr>,
}

/// Client to relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    ListAdapters,
    SelectAdapter {
        ip: SmolStr,
    },
    SetProtocolEndpoints {
        protocol: EndpointProtocol,
        endpoints: Vec<Endpoint>,
    },
    #[serde(rename_all = "camelCase")]
    RegisterUpdate {
        register_type: RegisterType,
        address: u16,
        value: RegisterValue,
    },
}

/// Relay to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessage {
    AdapterList {
        #[serde(default)]
        adapters: Vec<Adapter>,
    },
    EndpointStatusList {
        #[serde(default)]
        endpoints: Vec<EndpointStatus>,
    },
    /// A remote Modbus master wrote through the relay.
    #[serde(rename_all = "camelCase")]
    RegisterWrite {
        register_type: RegisterType,
        address: u16,
        value: RegisterValue,
    },
    Error {
        message: SmolStr,
    },
}
