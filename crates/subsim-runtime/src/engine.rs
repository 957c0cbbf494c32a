//! The simulation engine: one explicit context owning every piece of state.
//!
//! All mutation is serialized through `&mut Engine`. Every data store write
//! is logged, published on the traffic bus and checked against the GOOSE
//! datasets; register writes are mirrored to the bridge while it is
//! connected. Time is logical: [`Engine::advance_to`] replays GOOSE
//! retransmissions and script ticks in chronological order.

#![allow(missing_docs)]

use std::time::Duration;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::bridge::{
    modbus_endpoints, BridgeClient, BridgeEvent, BridgeSession, Endpoint, EndpointProtocol,
    EndpointStatus, ModbusEndpointConfig,
};
use crate::error::{BridgeError, CompileError, ConfigError};
use crate::goose::{GooseConfig, GooseFrame, GooseScheduler, DEFAULT_BURST_COUNT};
use crate::log::{LogEntry, LogLevel, LogStream};
use crate::pubsub::Subscription;
use crate::script::{DeviceContext, ScriptRuntime, ScriptState, StepOutcome};
use crate::store::{is_sampled_value_path, DataStore, RegisterBank, RegisterType, RegisterValue};
use crate::traffic::{NetworkPacket, Protocol, TrafficBus};
use crate::value::Value;

/// Log source of writes applied on behalf of the relay.
pub const BRIDGE_SOURCE: &str = "bridge";
/// Log source of engine lifecycle messages.
pub const ENGINE_SOURCE: &str = "engine";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Script pass period.
    pub tick_interval: Duration,
    /// Statements (plus loop iterations) one pass may execute.
    pub step_budget: u32,
    pub log_capacity: usize,
    pub traffic_capacity: usize,
    pub goose_burst_count: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            step_budget: 10_000,
            log_capacity: 200,
            traffic_capacity: 256,
            goose_burst_count: DEFAULT_BURST_COUNT,
        }
    }
}

/// One independent simulation.
#[derive(Debug)]
pub struct Engine {
    scripts: ScriptRuntime,
    core: EngineCore,
}

/// Everything a running script may touch, split from the scripts so a
/// script can borrow it mutably while the runtime iterates instances.
#[derive(Debug)]
struct EngineCore {
    settings: EngineSettings,
    store: DataStore,
    logs: LogStream,
    traffic: TrafficBus,
    goose: GooseScheduler,
    bridge: Option<BridgeClient>,
    bridge_url: SmolStr,
    modbus: IndexMap<SmolStr, ModbusEndpointConfig>,
    now: Duration,
    next_tick_at: Duration,
    ticks: u64,
}

/// Shortest script pass period; shorter settings are raised to it.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

impl Engine {
    #[must_use]
    pub fn new(mut settings: EngineSettings) -> Self {
        if settings.tick_interval < MIN_TICK_INTERVAL {
            warn!(
                requested = ?settings.tick_interval,
                "tick interval below 1 ms, using 1 ms"
            );
            settings.tick_interval = MIN_TICK_INTERVAL;
        }
        Self {
            scripts: ScriptRuntime::new(settings.step_budget),
            core: EngineCore {
                store: DataStore::new(),
                logs: LogStream::new(settings.log_capacity),
                traffic: TrafficBus::new(settings.traffic_capacity),
                goose: GooseScheduler::new(settings.goose_burst_count),
                bridge: None,
                bridge_url: SmolStr::default(),
                modbus: IndexMap::new(),
                now: Duration::ZERO,
                next_tick_at: Duration::ZERO,
                ticks: 0,
                settings,
            },
        }
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.core.settings
    }

    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.core.now
    }

    /// Script passes run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.core.ticks
    }

    #[must_use]
    pub fn store(&self) -> &DataStore {
        &self.core.store
    }

    #[must_use]
    pub fn goose(&self) -> &GooseScheduler {
        &self.core.goose
    }

    #[must_use]
    pub fn scripts(&self) -> &ScriptRuntime {
        &self.scripts
    }

    #[must_use]
    pub fn traffic(&self) -> &TrafficBus {
        &self.core.traffic
    }

    #[must_use]
    pub fn logs(&self) -> &LogStream {
        &self.core.logs
    }

    pub fn subscribe_to_logs(
        &self,
        callback: impl FnMut(&LogEntry) + Send + 'static,
    ) -> Subscription {
        self.core.logs.subscribe(callback)
    }

    pub fn subscribe_to_traffic(
        &self,
        callback: impl FnMut(&NetworkPacket) + Send + 'static,
    ) -> Subscription {
        self.core.traffic.subscribe(callback)
    }

    /// Appends an entry to the log stream at the current time.
    pub fn log(&mut self, source: &str, level: LogLevel, message: impl Into<SmolStr>) {
        self.core.log(source, level, message);
    }

    // ---------------------------------------------------------------------
    // Registers
    // ---------------------------------------------------------------------

    /// Replaces a device's register bank and focuses it.
    pub fn load_profile(&mut self, device: &str, bank: RegisterBank) {
        let count = bank.len();
        self.core.store.load_profile(device, bank);
        self.core.log(
            ENGINE_SOURCE,
            LogLevel::Info,
            format!("profile loaded for {device} ({count} registers)"),
        );
    }

    /// Switches the bank the un-keyed accessors act on.
    pub fn focus_device(&mut self, device: &str) -> bool {
        let focused = self.core.store.focus(device);
        if !focused {
            self.core.log(
                ENGINE_SOURCE,
                LogLevel::Warning,
                format!("cannot focus {device}: no register bank"),
            );
        }
        focused
    }

    #[must_use]
    pub fn active_device(&self) -> Option<&SmolStr> {
        self.core.store.active_device()
    }

    #[must_use]
    pub fn read_register(
        &self,
        device: &str,
        kind: RegisterType,
        address: u16,
    ) -> Option<RegisterValue> {
        self.core.store.read_register(device, kind, address)
    }

    pub fn write_register(
        &mut self,
        device: &str,
        kind: RegisterType,
        address: u16,
        value: RegisterValue,
        source: &str,
    ) {
        self.core.write_register(device, kind, address, value, source);
    }

    fn read_active(&self, kind: RegisterType, address: u16) -> Option<RegisterValue> {
        let device = self.core.store.active_device()?;
        self.core.store.read_register(device, kind, address)
    }

    fn write_active(&mut self, kind: RegisterType, address: u16, value: RegisterValue, source: &str) {
        match self.core.store.active_device().cloned() {
            Some(device) => self.core.write_register(&device, kind, address, value, source),
            None => self.core.log(
                source,
                LogLevel::Warning,
                format!("{}[{address}] write ignored: no device in focus", kind.prefix()),
            ),
        }
    }

    #[must_use]
    pub fn get_coil(&self, address: u16) -> Option<bool> {
        self.read_active(RegisterType::Coil, address)
            .map(RegisterValue::as_bool)
    }

    #[must_use]
    pub fn get_discrete_input(&self, address: u16) -> Option<bool> {
        self.read_active(RegisterType::DiscreteInput, address)
            .map(RegisterValue::as_bool)
    }

    #[must_use]
    pub fn get_input_register(&self, address: u16) -> Option<u16> {
        self.read_active(RegisterType::InputRegister, address)
            .map(RegisterValue::as_word)
    }

    #[must_use]
    pub fn get_register(&self, address: u16) -> Option<u16> {
        self.read_active(RegisterType::HoldingRegister, address)
            .map(RegisterValue::as_word)
    }

    pub fn set_coil(&mut self, address: u16, value: bool, source: &str) {
        self.write_active(RegisterType::Coil, address, RegisterValue::Bit(value), source);
    }

    pub fn set_discrete_input(&mut self, address: u16, value: bool, source: &str) {
        self.write_active(
            RegisterType::DiscreteInput,
            address,
            RegisterValue::Bit(value),
            source,
        );
    }

    /// Stores the low 16 bits of `value`.
    pub fn set_input_register(&mut self, address: u16, value: i64, source: &str) {
        self.write_active(
            RegisterType::InputRegister,
            address,
            RegisterValue::word_from_i64(value),
            source,
        );
    }

    /// Stores the low 16 bits of `value`.
    pub fn set_register(&mut self, address: u16, value: i64, source: &str) {
        self.write_active(
            RegisterType::HoldingRegister,
            address,
            RegisterValue::word_from_i64(value),
            source,
        );
    }

    // ---------------------------------------------------------------------
    // MMS
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn read_mms(&self, path: &str) -> Option<&Value> {
        self.core.store.mms().read(path)
    }

    pub fn write_mms(&mut self, path: &str, value: impl Into<Value>, source: &str) {
        self.core.write_mms(path, value.into(), source);
    }

    /// Seeds data attributes owned by `owner` without publishing traffic.
    pub fn initialize_data<P, V>(&mut self, owner: &str, entries: impl IntoIterator<Item = (P, V)>)
    where
        P: AsRef<str>,
        V: Into<Value>,
    {
        let mut count = 0_usize;
        let mms = self.core.store.mms_mut();
        for (path, value) in entries {
            let path = path.as_ref();
            mms.write(path, value.into());
            mms.claim(path, owner);
            count += 1;
        }
        self.core.log(
            owner,
            LogLevel::Info,
            format!("initialized {count} data attributes"),
        );
    }

    // ---------------------------------------------------------------------
    // Device registration
    // ---------------------------------------------------------------------

    /// Registers a GOOSE publisher of `device`; its dataset paths become
    /// attributed to the device.
    pub fn register_device_goose(
        &mut self,
        device: &str,
        publisher: &str,
        config: GooseConfig,
        entries: Vec<SmolStr>,
    ) -> Result<(), ConfigError> {
        let app_id = config.app_id.clone();
        for entry in &entries {
            self.core.store.mms_mut().claim(entry, device);
        }
        self.core.goose.register(device, publisher, config, entries)?;
        self.core.log(
            device,
            LogLevel::Success,
            format!("GOOSE publisher {publisher} registered (appId {app_id})"),
        );
        Ok(())
    }

    /// Records how the device's Modbus server is exposed through the bridge.
    pub fn register_modbus(&mut self, device: &str, config: ModbusEndpointConfig) {
        self.core.modbus.insert(SmolStr::new(device), config);
    }

    /// Removes every trace of a device: its script, GOOSE bindings (and their
    /// pending retransmissions), register bank and owned data attributes.
    pub fn unregister_device(&mut self, device: &str) -> bool {
        let script = self.scripts.remove(device).is_some();
        let bindings = self.core.goose.unregister_device(device);
        let bank = self.core.store.remove_bank(device).is_some();
        let paths = self.core.store.mms_mut().remove_owned(device);
        let modbus = self.core.modbus.shift_remove(device).is_some();
        let found = script || bindings > 0 || bank || paths > 0 || modbus;
        if found {
            self.core.log(
                ENGINE_SOURCE,
                LogLevel::Info,
                format!(
                    "device {device} unregistered ({bindings} GOOSE bindings, {paths} data attributes)"
                ),
            );
        }
        found
    }

    // ---------------------------------------------------------------------
    // Scripts
    // ---------------------------------------------------------------------

    /// Compiles and (re)loads a device's logic program.
    pub fn load_script(&mut self, device: &str, source: &str) -> Result<(), CompileError> {
        match self.scripts.load(device, source) {
            Ok(routine) => {
                let statements = routine.statement_lines().len();
                self.core.log(
                    device,
                    LogLevel::Success,
                    format!("program loaded ({statements} statements)"),
                );
                Ok(())
            }
            Err(err) => {
                self.core.log(
                    device,
                    LogLevel::Error,
                    format!("compile error: {err}"),
                );
                Err(err)
            }
        }
    }

    pub fn reset_script(&mut self, device: &str) -> bool {
        let reset = self.scripts.reset(device);
        if reset {
            self.core.log(device, LogLevel::Info, "program reset");
        }
        reset
    }

    /// Steps the device's program: stops before the next statement, running
    /// the one it was stopped on first.
    pub fn step_script(&mut self, device: &str) -> Option<StepOutcome> {
        let budget = self.scripts.step_budget();
        let instance = self.scripts.instance_mut(device)?;
        let was_faulted = instance.is_faulted();
        let mut io = DeviceIo {
            device,
            core: &mut self.core,
        };
        let outcome = instance.step(&mut io, budget);
        if !was_faulted {
            if let Some(fault) = instance.fault() {
                let message = format!("fault at line {}: {}", fault.line, fault.error);
                self.core.log(device, LogLevel::Error, message);
            }
        }
        Some(outcome)
    }

    #[must_use]
    pub fn script_state(&self, device: &str) -> Option<ScriptState> {
        self.scripts.state(device)
    }

    // ---------------------------------------------------------------------
    // Time
    // ---------------------------------------------------------------------

    /// Runs one pass of every healthy script, in registration order.
    pub fn tick(&mut self) {
        self.poll_bridge();
        let budget = self.scripts.step_budget();
        for (device, instance) in self.scripts.instances_mut() {
            if instance.is_faulted() {
                continue;
            }
            let mut io = DeviceIo {
                device,
                core: &mut self.core,
            };
            if instance.run_pass(&mut io, budget) == StepOutcome::Faulted {
                if let Some(fault) = instance.fault() {
                    let message = format!("fault at line {}: {}", fault.line, fault.error);
                    self.core.log(device, LogLevel::Error, message);
                }
            }
        }
        self.core.ticks += 1;
    }

    /// Earliest instant with pending work.
    #[must_use]
    pub fn next_event_time(&self) -> Duration {
        match self.core.goose.next_due() {
            Some(due) => due.min(self.core.next_tick_at),
            None => self.core.next_tick_at,
        }
    }

    /// Processes every retransmission and tick due at or before `target`.
    /// Retransmissions due at the same instant as a tick go first.
    pub fn advance_to(&mut self, target: Duration) {
        loop {
            let goose_due = self.core.goose.next_due().filter(|due| *due <= target);
            let tick_due = Some(self.core.next_tick_at).filter(|due| *due <= target);
            match (goose_due, tick_due) {
                (Some(goose), Some(tick)) if goose <= tick => self.fire_goose(goose),
                (Some(goose), None) => self.fire_goose(goose),
                (_, Some(tick)) => {
                    self.core.now = tick;
                    self.tick();
                    self.core.next_tick_at = tick + self.core.settings.tick_interval;
                }
                (None, None) => break,
            }
        }
        self.core.now = self.core.now.max(target);
    }

    /// Advances by `delta` from the current time.
    pub fn advance_by(&mut self, delta: Duration) {
        self.advance_to(self.core.now + delta);
    }

    fn fire_goose(&mut self, at: Duration) {
        self.core.now = at;
        for frame in self.core.goose.fire_due(at) {
            self.core.publish_goose(frame);
        }
    }

    // ---------------------------------------------------------------------
    // Bridge
    // ---------------------------------------------------------------------

    /// Connects to a relay. Failure leaves the session disconnected and is
    /// logged as well as returned.
    pub fn connect_bridge(&mut self, url: &str, timeout: Duration) -> Result<(), BridgeError> {
        self.disconnect_bridge();
        self.core.bridge_url = SmolStr::new(url);
        match BridgeClient::connect(url, timeout) {
            Ok(client) => {
                let listed = client.list_adapters();
                self.core.bridge = Some(client);
                self.core.log(
                    BRIDGE_SOURCE,
                    LogLevel::Success,
                    format!("connected to relay {url}"),
                );
                listed
            }
            Err(err) => {
                self.core.log(
                    BRIDGE_SOURCE,
                    LogLevel::Error,
                    format!("relay {url}: {err}"),
                );
                Err(err)
            }
        }
    }

    pub fn disconnect_bridge(&mut self) {
        if let Some(mut client) = self.core.bridge.take() {
            client.disconnect();
            self.core
                .log(BRIDGE_SOURCE, LogLevel::Info, "disconnected from relay");
        }
    }

    #[must_use]
    pub fn bridge_session(&self) -> BridgeSession {
        match &self.core.bridge {
            Some(client) => client.session(),
            None => BridgeSession {
                url: self.core.bridge_url.clone(),
                ..BridgeSession::default()
            },
        }
    }

    fn bridge(&self) -> Result<&BridgeClient, BridgeError> {
        self.core
            .bridge
            .as_ref()
            .filter(|client| client.is_connected())
            .ok_or(BridgeError::NotConnected)
    }

    pub fn select_adapter(&mut self, ip: &str) -> Result<(), BridgeError> {
        self.bridge()?.select_adapter(ip)?;
        self.core
            .log(BRIDGE_SOURCE, LogLevel::Info, format!("adapter {ip} selected"));
        Ok(())
    }

    /// Asks the relay to open `endpoints` and waits for its acknowledgment.
    pub fn bind_endpoints(
        &mut self,
        protocol: EndpointProtocol,
        endpoints: Vec<Endpoint>,
        timeout: Duration,
    ) -> Result<Vec<EndpointStatus>, BridgeError> {
        let result = self.bridge().and_then(|client| {
            client.set_endpoints(protocol, endpoints)?;
            client.wait_for_endpoint_status(timeout)
        });
        match &result {
            Ok(statuses) => self.core.log(
                BRIDGE_SOURCE,
                LogLevel::Success,
                format!("relay bound {} endpoints", statuses.len()),
            ),
            Err(err) => self.core.log(
                BRIDGE_SOURCE,
                LogLevel::Error,
                format!("endpoint binding failed: {err}"),
            ),
        }
        result
    }

    /// Binds every registered Modbus server to the selected adapter.
    pub fn publish_modbus_endpoints(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<EndpointStatus>, BridgeError> {
        let adapter = self
            .bridge()?
            .session()
            .selected_adapter
            .ok_or(BridgeError::NoAdapterSelected)?;
        let endpoints = modbus_endpoints(&self.core.modbus, &adapter);
        self.bind_endpoints(EndpointProtocol::Modbus, endpoints, timeout)
    }

    /// Applies whatever the relay sent since the last poll.
    pub fn poll_bridge(&mut self) {
        let events = match &self.core.bridge {
            Some(client) => client.poll_events(),
            None => return,
        };
        for event in events {
            match event {
                BridgeEvent::Adapters(adapters) => self.core.log(
                    BRIDGE_SOURCE,
                    LogLevel::Info,
                    format!("relay reports {} adapters", adapters.len()),
                ),
                BridgeEvent::RegisterWrite {
                    kind,
                    address,
                    value,
                } => self.write_active(kind, address, value, BRIDGE_SOURCE),
                BridgeEvent::RelayError(message) => {
                    self.core.log(BRIDGE_SOURCE, LogLevel::Error, message);
                }
                BridgeEvent::Disconnected(reason) => {
                    let message = match reason {
                        Some(reason) => format!("relay connection lost: {reason}"),
                        None => "relay closed the connection".to_string(),
                    };
                    self.core.log(BRIDGE_SOURCE, LogLevel::Warning, message);
                }
            }
        }
    }

    /// Cancels all schedules, drops every script and closes the bridge.
    pub fn shutdown(&mut self) {
        self.core.goose.clear();
        self.scripts.clear();
        self.disconnect_bridge();
        self.core
            .log(ENGINE_SOURCE, LogLevel::Info, "engine stopped");
    }
}

impl EngineCore {
    fn log(&mut self, source: &str, level: LogLevel, message: impl Into<SmolStr>) {
        self.logs.emit(self.now, source, level, message);
    }

    fn write_register(
        &mut self,
        device: &str,
        kind: RegisterType,
        address: u16,
        value: RegisterValue,
        source: &str,
    ) {
        let value = value.normalize(kind);
        self.store.bank_mut(device).set(kind, address, value);
        self.log(
            source,
            LogLevel::Info,
            format!("{device} {}[{address}] := {value}", kind.prefix()),
        );
        self.traffic.publish(device, Protocol::Mms, self.now, None);
        if source != BRIDGE_SOURCE && self.store.active_device().map(SmolStr::as_str) == Some(device) {
            self.mirror(kind, address, value);
        }
    }

    fn mirror(&self, kind: RegisterType, address: u16, value: RegisterValue) {
        let Some(client) = self.bridge.as_ref().filter(|client| client.is_connected()) else {
            return;
        };
        if let Err(err) = client.mirror_register(kind, address, value) {
            debug!(%err, "register update not mirrored");
        }
    }

    fn write_mms(&mut self, path: &str, value: Value, source: &str) {
        let message = format!("{path} := {value}");
        let previous = self.store.mms_mut().write(path, value.clone());
        let changed = previous.as_ref() != Some(&value);
        self.log(source, LogLevel::Info, message);
        let device = self.store.mms().source_device(path);
        let protocol = if is_sampled_value_path(path) {
            Protocol::Sv
        } else {
            Protocol::Mms
        };
        self.traffic.publish(&device, protocol, self.now, None);
        if changed && self.goose.monitors(path) {
            for frame in self.goose.on_change(path, self.now) {
                self.publish_goose(frame);
            }
        }
    }

    fn publish_goose(&mut self, frame: GooseFrame) {
        self.traffic
            .publish(&frame.owner, Protocol::Goose, frame.at, Some(frame.info));
    }
}

/// A script's view of the engine, bound to its own device.
struct DeviceIo<'a> {
    device: &'a str,
    core: &'a mut EngineCore,
}

impl DeviceContext for DeviceIo<'_> {
    fn read_register(&self, kind: RegisterType, address: u16) -> Option<RegisterValue> {
        self.core.store.read_register(self.device, kind, address)
    }

    fn write_register(&mut self, kind: RegisterType, address: u16, value: RegisterValue) {
        self.core
            .write_register(self.device, kind, address, value, self.device);
    }

    fn get_da(&self, path: &str) -> Option<Value> {
        self.core.store.mms().read(path).cloned()
    }

    fn set_da(&mut self, path: &str, value: Value) {
        self.core.write_mms(path, value, self.device);
    }

    fn log(&mut self, message: &str) {
        self.core.log(self.device, LogLevel::Info, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineSettings::default())
    }

    #[test]
    fn zero_tick_interval_is_raised_to_the_minimum() {
        let mut engine = Engine::new(EngineSettings {
            tick_interval: Duration::ZERO,
            ..EngineSettings::default()
        });
        assert_eq!(engine.settings().tick_interval, MIN_TICK_INTERVAL);
        engine.advance_to(Duration::from_millis(10));
        assert_eq!(engine.ticks(), 11);
    }

    #[test]
    fn writes_without_focus_are_ignored_with_a_warning() {
        let mut engine = engine();
        engine.set_register(1, 5, "ui");
        assert_eq!(engine.get_register(1), None);
        let last = engine.logs().recent().pop().unwrap();
        assert_eq!(last.level, LogLevel::Warning);
        assert_eq!(engine.traffic().published(), 0);
    }

    #[test]
    fn register_writes_wrap_and_publish_mms() {
        let mut engine = engine();
        engine.load_profile("GEN1", RegisterBank::new());
        engine.set_register(14, -1, "ui");
        engine.set_coil(3, true, "ui");
        assert_eq!(engine.get_register(14), Some(0xFFFF));
        assert_eq!(engine.get_coil(3), Some(true));
        assert_eq!(engine.get_coil(4), None);
        let packets = engine.traffic().buffered();
        assert_eq!(packets.len(), 2);
        assert!(packets
            .iter()
            .all(|packet| packet.protocol == Protocol::Mms && packet.source_device_name == "GEN1"));
    }

    #[test]
    fn mms_writes_pick_sv_for_measurements() {
        let mut engine = engine();
        engine.write_mms("IED1LD0/MMXU1.TotW.mag.f", 12.5, "ui");
        engine.write_mms("IED1LD0/XCBR1.Pos.stVal", "on", "ui");
        let protocols: Vec<_> = engine
            .traffic()
            .buffered()
            .into_iter()
            .map(|packet| (packet.protocol, packet.source_device_name))
            .collect();
        assert_eq!(
            protocols,
            vec![
                (Protocol::Sv, SmolStr::new("IED1LD0")),
                (Protocol::Mms, SmolStr::new("IED1LD0"))
            ]
        );
        assert_eq!(
            engine.read_mms("IED1LD0/XCBR1.Pos.stVal"),
            Some(&Value::from("on"))
        );
        assert_eq!(engine.read_mms("IED1LD0/XCBR1.Pos.q"), None);
    }

    #[test]
    fn initialized_data_is_quiet_and_owned() {
        let mut engine = engine();
        engine.initialize_data("BAY1", [("B1LD0/XCBR1.Pos.stVal", false)]);
        assert_eq!(engine.traffic().published(), 0);
        assert_eq!(
            engine.store().mms().owner("B1LD0/XCBR1.Pos.stVal").map(SmolStr::as_str),
            Some("BAY1")
        );
        engine.write_mms("B1LD0/XCBR1.Pos.stVal", true, "ui");
        assert_eq!(engine.traffic().buffered()[0].source_device_name, "BAY1");
    }

    #[test]
    fn goose_fires_only_on_real_changes() {
        let mut engine = engine();
        engine
            .register_device_goose(
                "BAY1",
                "B1LD0/LLN0.gcb1",
                GooseConfig::new("0x0001", 1, 10, 2000),
                vec!["B1LD0/XCBR1.Pos.stVal".into()],
            )
            .unwrap();
        engine.initialize_data("BAY1", [("B1LD0/XCBR1.Pos.stVal", false)]);
        engine.write_mms("B1LD0/XCBR1.Pos.stVal", false, "ui");
        assert!(engine.goose().next_due().is_none());
        engine.write_mms("B1LD0/XCBR1.Pos.stVal", true, "ui");
        let goose: Vec<_> = engine
            .traffic()
            .buffered()
            .into_iter()
            .filter(|packet| packet.protocol == Protocol::Goose)
            .collect();
        assert_eq!(goose.len(), 1);
        assert_eq!(goose[0].goose.as_ref().map(|info| info.st_num), Some(1));
    }

    #[test]
    fn next_event_prefers_the_earliest_schedule() {
        let mut engine = engine();
        assert_eq!(engine.next_event_time(), Duration::ZERO);
        engine.advance_to(Duration::from_millis(250));
        assert_eq!(engine.ticks(), 3);
        assert_eq!(engine.next_event_time(), Duration::from_millis(300));
        assert_eq!(engine.now(), Duration::from_millis(250));
    }

    #[test]
    fn bridge_operations_fail_softly_without_a_relay() {
        let mut engine = engine();
        assert_eq!(engine.select_adapter("10.0.0.1"), Err(BridgeError::NotConnected));
        assert!(!engine.bridge_session().connected);
        engine.load_profile("GEN1", RegisterBank::new());
        engine.set_register(1, 1, "ui");
        assert_eq!(engine.get_register(1), Some(1));
    }
}
