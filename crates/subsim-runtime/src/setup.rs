//! Engine construction from a loaded configuration.

use smol_str::SmolStr;
use tracing::info;

use crate::bridge::EndpointStatus;
use crate::config::{BridgeConfig, EngineConfig};
use crate::error::{BridgeError, ConfigError};
use crate::Engine;

/// Builds an engine with every configured device registered.
///
/// Devices are registered in file order, which is also the order their
/// scripts run in. The first device with registers ends up in focus.
pub fn build_engine(config: &EngineConfig) -> Result<Engine, ConfigError> {
    let mut engine = Engine::new(config.settings.clone());
    let mut first_bank: Option<SmolStr> = None;

    for device in &config.devices {
        let id = device.id.as_str();
        if !device.registers.is_empty() || device.modbus.is_some() {
            engine.load_profile(id, device.registers.clone());
            first_bank.get_or_insert_with(|| device.id.clone());
        }
        if let Some(modbus) = &device.modbus {
            engine.register_modbus(id, modbus.clone());
        }
        if !device.data.is_empty() {
            engine.initialize_data(id, device.data.iter().cloned());
        }
        for binding in &device.goose {
            engine.register_device_goose(
                id,
                &binding.publisher,
                binding.config.clone(),
                binding.entries.clone(),
            )?;
        }
        if let Some(path) = &device.program {
            let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string().into(),
                source,
            })?;
            engine
                .load_script(id, &source)
                .map_err(|source| ConfigError::Compile {
                    device: device.id.clone(),
                    source,
                })?;
        }
    }

    if let Some(device) = first_bank {
        engine.focus_device(&device);
    }
    info!(devices = config.devices.len(), "engine configured");
    Ok(engine)
}

/// Connects the configured relay and, when an adapter is configured, binds
/// the Modbus endpoints to it.
pub fn attach_bridge(
    engine: &mut Engine,
    config: &BridgeConfig,
) -> Result<Vec<EndpointStatus>, BridgeError> {
    engine.connect_bridge(&config.url, config.ack_timeout)?;
    let Some(adapter) = &config.adapter else {
        return Ok(Vec::new());
    };
    engine.select_adapter(adapter)?;
    engine.publish_modbus_endpoints(config.ack_timeout)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::store::RegisterType;

    #[test]
    fn devices_are_registered_in_order() {
        let config = EngineConfig::parse(
            r#"
[[device]]
id = "A"
[[device.register]]
kind = "holding"
address = 1
value = 7

[[device]]
id = "B"
[[device.register]]
kind = "holding"
address = 1
value = 9
[[device.data]]
path = "BLD0/XCBR1.Pos.stVal"
value = "off"
"#,
            Path::new("."),
        )
        .unwrap();
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.active_device().map(SmolStr::as_str), Some("A"));
        assert_eq!(engine.get_register(1), Some(7));
        assert_eq!(
            engine
                .read_register("B", RegisterType::HoldingRegister, 1)
                .map(|value| value.as_word()),
            Some(9)
        );
        assert_eq!(
            engine.store().mms().owner("BLD0/XCBR1.Pos.stVal").map(SmolStr::as_str),
            Some("B")
        );
    }

    #[test]
    fn missing_program_is_a_read_error() {
        let config = EngineConfig::parse(
            "[[device]]\nid = \"A\"\nprogram = \"does-not-exist.st\"",
            Path::new("/nonexistent"),
        )
        .unwrap();
        assert!(matches!(build_engine(&config), Err(ConfigError::Read { .. })));
    }
}
