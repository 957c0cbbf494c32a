//! Simulation configuration loading.
//!
//! ```toml
//! [engine]
//! tick_interval_ms = 100
//!
//! [[device]]
//! id = "GEN1"
//! program = "generator.st"
//!
//! [[device.register]]
//! kind = "holding"
//! address = 192
//! value = 0
//! ```

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashSet;
use serde::Deserialize;
use smol_str::SmolStr;

use crate::bridge::{ModbusEndpointConfig, DEFAULT_MODBUS_PORT};
use crate::engine::EngineSettings;
use crate::error::ConfigError;
use crate::goose::{GooseConfig, DEFAULT_BURST_COUNT};
use crate::store::{RegisterBank, RegisterType, RegisterValue};
use crate::value::Value;

pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub settings: EngineSettings,
    pub bridge: Option<BridgeConfig>,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub url: SmolStr,
    pub ack_timeout: Duration,
    /// Adapter ip to select once connected.
    pub adapter: Option<SmolStr>,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub id: SmolStr,
    /// Absolute path of the ST program.
    pub program: Option<PathBuf>,
    pub modbus: Option<ModbusEndpointConfig>,
    pub registers: RegisterBank,
    pub data: Vec<(SmolStr, Value)>,
    pub goose: Vec<GooseBindingConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GooseBindingConfig {
    pub publisher: SmolStr,
    pub config: GooseConfig,
    pub entries: Vec<SmolStr>,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string().into(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base).map_err(|err| match err {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string().into(),
                message,
            },
            other => other,
        })
    }

    /// Parses TOML text; relative program paths resolve against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self, ConfigError> {
        let raw: EngineToml = toml::from_str(text).map_err(|err| ConfigError::Parse {
            path: "<inline>".into(),
            message: err.to_string().into(),
        })?;
        raw.into_config(base)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineToml {
    #[serde(default)]
    engine: EngineSection,
    #[serde(default)]
    goose: GooseSection,
    bridge: Option<BridgeSection>,
    #[serde(default, rename = "device")]
    devices: Vec<DeviceSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineSection {
    tick_interval_ms: Option<u64>,
    step_budget: Option<u32>,
    log_capacity: Option<usize>,
    traffic_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GooseSection {
    burst_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BridgeSection {
    url: String,
    ack_timeout_ms: Option<u64>,
    adapter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceSection {
    id: String,
    program: Option<PathBuf>,
    modbus: Option<ModbusSection>,
    #[serde(default, rename = "register")]
    registers: Vec<RegisterSection>,
    #[serde(default)]
    data: Vec<DataSection>,
    #[serde(default)]
    goose: Vec<GooseBindingSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModbusSection {
    enabled: Option<bool>,
    port: Option<u16>,
    unit_id: Option<u8>,
    backend_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegisterSection {
    kind: String,
    address: u16,
    value: toml::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DataSection {
    path: String,
    value: toml::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GooseBindingSection {
    publisher: String,
    app_id: String,
    #[serde(default = "default_conf_rev")]
    conf_rev: u32,
    min_time_ms: u64,
    max_time_ms: u64,
    entries: Vec<String>,
}

fn default_conf_rev() -> u32 {
    1
}

impl EngineToml {
    fn into_config(self, base: &Path) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineSettings::default();
        let tick_interval_ms = self
            .engine
            .tick_interval_ms
            .unwrap_or(u64::try_from(defaults.tick_interval.as_millis()).unwrap_or(100));
        if tick_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "engine.tick_interval_ms",
                "must be greater than zero",
            ));
        }
        let step_budget = self.engine.step_budget.unwrap_or(defaults.step_budget);
        if step_budget == 0 {
            return Err(ConfigError::invalid(
                "engine.step_budget",
                "must be greater than zero",
            ));
        }
        let settings = EngineSettings {
            tick_interval: Duration::from_millis(tick_interval_ms),
            step_budget,
            log_capacity: self.engine.log_capacity.unwrap_or(defaults.log_capacity),
            traffic_capacity: self
                .engine
                .traffic_capacity
                .unwrap_or(defaults.traffic_capacity),
            goose_burst_count: self.goose.burst_count.unwrap_or(DEFAULT_BURST_COUNT),
        };

        let bridge = self.bridge.map(|section| BridgeConfig {
            url: section.url.into(),
            ack_timeout: section
                .ack_timeout_ms
                .map_or(DEFAULT_ACK_TIMEOUT, Duration::from_millis),
            adapter: section.adapter.map(SmolStr::from),
        });

        let mut seen = FxHashSet::default();
        let mut devices = Vec::with_capacity(self.devices.len());
        for device in self.devices {
            if !seen.insert(device.id.clone()) {
                return Err(ConfigError::invalid(
                    "device.id",
                    format!("duplicate device id '{}'", device.id),
                ));
            }
            devices.push(device.into_config(base)?);
        }

        Ok(EngineConfig {
            settings,
            bridge,
            devices,
        })
    }
}

impl DeviceSection {
    fn into_config(self, base: &Path) -> Result<DeviceConfig, ConfigError> {
        let id = SmolStr::new(&self.id);
        let modbus = self
            .modbus
            .map(|section| {
                let unit_id = section.unit_id.unwrap_or(1);
                if !(1..=247).contains(&unit_id) {
                    return Err(ConfigError::invalid(
                        "device.modbus.unit_id",
                        format!("{id}: {unit_id} outside 1..=247"),
                    ));
                }
                Ok(ModbusEndpointConfig {
                    enabled: section.enabled.unwrap_or(true),
                    port: section.port.unwrap_or(DEFAULT_MODBUS_PORT),
                    unit_id,
                    backend_port: section.backend_port,
                })
            })
            .transpose()?;

        let mut registers = RegisterBank::new();
        for register in self.registers {
            let kind = RegisterType::parse(&register.kind).ok_or_else(|| {
                ConfigError::invalid(
                    "device.register.kind",
                    format!(
                        "{id}: unknown register kind '{}' (expected coil/discrete/input/holding)",
                        register.kind
                    ),
                )
            })?;
            let value = register_value(&register.value).ok_or_else(|| {
                ConfigError::invalid(
                    "device.register.value",
                    format!("{id}: {} is not a boolean or 16-bit integer", register.value),
                )
            })?;
            registers.set(kind, register.address, value);
        }

        let data = self
            .data
            .into_iter()
            .map(|entry| {
                let value = data_value(&entry.value).ok_or_else(|| {
                    ConfigError::invalid(
                        "device.data.value",
                        format!("{id}: {} must be a boolean, number or string", entry.path),
                    )
                })?;
                Ok((SmolStr::new(entry.path), value))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let goose = self
            .goose
            .into_iter()
            .map(|binding| {
                let config = GooseConfig::new(
                    binding.app_id,
                    binding.conf_rev,
                    binding.min_time_ms,
                    binding.max_time_ms,
                );
                config.validate()?;
                Ok(GooseBindingConfig {
                    publisher: binding.publisher.into(),
                    config,
                    entries: binding.entries.into_iter().map(SmolStr::from).collect(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(DeviceConfig {
            id,
            program: self.program.map(|program| base.join(program)),
            modbus,
            registers,
            data,
            goose,
        })
    }
}

fn register_value(value: &toml::Value) -> Option<RegisterValue> {
    match value {
        toml::Value::Boolean(bit) => Some(RegisterValue::Bit(*bit)),
        toml::Value::Integer(word) if (-32_768..=65_535).contains(word) => {
            Some(RegisterValue::word_from_i64(*word))
        }
        _ => None,
    }
}

fn data_value(value: &toml::Value) -> Option<Value> {
    match value {
        toml::Value::Boolean(v) => Some(Value::Bool(*v)),
        toml::Value::Integer(v) => Some(Value::Int(*v)),
        toml::Value::Float(v) => Some(Value::Real(*v)),
        toml::Value::String(v) => Some(Value::String(v.into())),
        _ => None,
    }
}
