//! The device surface a running script sees.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::store::{RegisterBank, RegisterType, RegisterValue};
use crate::value::Value;

/// Operations behind the `Device.*` calls of one script instance.
///
/// Implementations decide where reads and writes land; the engine binds
/// each script to its own register bank and the shared MMS store.
pub trait DeviceContext {
    /// Reads a register of the script's own device; `None` if never written.
    fn read_register(&self, kind: RegisterType, address: u16) -> Option<RegisterValue>;

    /// Writes a register of the script's own device.
    fn write_register(&mut self, kind: RegisterType, address: u16, value: RegisterValue);

    /// Reads a data attribute; `None` for unknown paths.
    fn get_da(&self, path: &str) -> Option<Value>;

    /// Writes a data attribute.
    fn set_da(&mut self, path: &str, value: Value);

    /// Emits a log line attributed to the device.
    fn log(&mut self, message: &str);
}

/// Self-contained device used by `subsim check` and tests.
#[derive(Debug, Default, Clone)]
pub struct LocalDevice {
    pub registers: RegisterBank,
    pub data: IndexMap<SmolStr, Value>,
    pub logs: Vec<String>,
}

impl LocalDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceContext for LocalDevice {
    fn read_register(&self, kind: RegisterType, address: u16) -> Option<RegisterValue> {
        self.registers.get(kind, address)
    }

    fn write_register(&mut self, kind: RegisterType, address: u16, value: RegisterValue) {
        self.registers.set(kind, address, value);
    }

    fn get_da(&self, path: &str) -> Option<Value> {
        self.data.get(path).cloned()
    }

    fn set_da(&mut self, path: &str, value: Value) {
        self.data.insert(SmolStr::new(path), value);
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }
}
