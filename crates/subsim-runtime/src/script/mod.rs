//! Per-device script instances and their pass-by-pass execution.
//!
//! Instances are kept in registration order, which is also the order the
//! engine runs them in each tick. Reloading a device's program replaces its
//! instance in place, so the device keeps its position.

#![allow(missing_docs)]

mod device;
mod instance;

use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::compiler::{compile, Routine};
use crate::error::CompileError;
use crate::value::Value;

pub use device::{DeviceContext, LocalDevice};
pub use instance::{Fault, ScriptInstance, StepOutcome};

/// Snapshot of one instance for debugging surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptState {
    pub device: SmolStr,
    pub last_yield_line: Option<u32>,
    pub fault: Option<Fault>,
    pub passes: u64,
    pub in_pass: bool,
    pub scope: IndexMap<SmolStr, Value>,
}

impl ScriptState {
    #[must_use]
    pub fn faulted(&self) -> bool {
        self.fault.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ScriptRuntime {
    instances: IndexMap<SmolStr, ScriptInstance>,
    step_budget: u32,
}

impl ScriptRuntime {
    #[must_use]
    pub fn new(step_budget: u32) -> Self {
        Self {
            instances: IndexMap::new(),
            step_budget,
        }
    }

    #[must_use]
    pub fn step_budget(&self) -> u32 {
        self.step_budget
    }

    /// Compiles `source` and (re)creates the device's instance.
    ///
    /// On a compile error the previous instance, if any, is left untouched.
    pub fn load(&mut self, device: &str, source: &str) -> Result<Arc<Routine>, CompileError> {
        let routine = Arc::new(compile(source)?);
        self.install(device, Arc::clone(&routine));
        Ok(routine)
    }

    /// Creates a fresh instance of an already compiled routine.
    pub fn install(&mut self, device: &str, routine: Arc<Routine>) {
        debug!(device, steps = routine.steps().len(), "script installed");
        self.instances
            .insert(SmolStr::new(device), ScriptInstance::new(routine));
    }

    /// Restarts the device's instance from its initial values.
    pub fn reset(&mut self, device: &str) -> bool {
        let Some(instance) = self.instances.get_mut(device) else {
            return false;
        };
        *instance = ScriptInstance::new(Arc::clone(instance.routine()));
        true
    }

    pub fn remove(&mut self, device: &str) -> Option<ScriptInstance> {
        self.instances.shift_remove(device)
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    #[must_use]
    pub fn contains(&self, device: &str) -> bool {
        self.instances.contains_key(device)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Device ids in execution order.
    pub fn devices(&self) -> impl Iterator<Item = &SmolStr> {
        self.instances.keys()
    }

    #[must_use]
    pub fn instance(&self, device: &str) -> Option<&ScriptInstance> {
        self.instances.get(device)
    }

    pub fn instance_mut(&mut self, device: &str) -> Option<&mut ScriptInstance> {
        self.instances.get_mut(device)
    }

    pub fn instances_mut(&mut self) -> impl Iterator<Item = (&SmolStr, &mut ScriptInstance)> {
        self.instances.iter_mut()
    }

    #[must_use]
    pub fn state(&self, device: &str) -> Option<ScriptState> {
        let (device, instance) = self.instances.get_key_value(device)?;
        Some(ScriptState {
            device: device.clone(),
            last_yield_line: instance.last_yield_line(),
            fault: instance.fault().cloned(),
            passes: instance.passes(),
            in_pass: instance.in_pass(),
            scope: instance
                .scope()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_keeps_registration_order() {
        let mut runtime = ScriptRuntime::new(100);
        runtime.load("a", "").unwrap();
        runtime.load("b", "").unwrap();
        runtime.load("c", "").unwrap();
        runtime.load("a", "VAR x : INT; END_VAR").unwrap();
        let order: Vec<_> = runtime.devices().map(SmolStr::as_str).collect();
        assert_eq!(order, ["a", "b", "c"]);

        runtime.remove("b");
        let order: Vec<_> = runtime.devices().map(SmolStr::as_str).collect();
        assert_eq!(order, ["a", "c"]);
    }

    #[test]
    fn failed_reload_keeps_the_old_instance() {
        let mut runtime = ScriptRuntime::new(100);
        runtime.load("gen", "VAR x : INT := 7; END_VAR").unwrap();
        assert!(runtime.load("gen", "x := ;").is_err());
        let state = runtime.state("gen").unwrap();
        assert_eq!(state.scope.get("x"), Some(&Value::Int(7)));
    }

    #[test]
    fn reset_restores_initial_values_and_clears_faults() {
        let mut runtime = ScriptRuntime::new(100);
        runtime
            .load("gen", "VAR n : INT; END_VAR\nn := n + 1;\nn := n / 0;")
            .unwrap();
        let budget = runtime.step_budget();
        let mut device = LocalDevice::new();
        let outcome = runtime
            .instance_mut("gen")
            .unwrap()
            .run_pass(&mut device, budget);
        assert_eq!(outcome, StepOutcome::Faulted);
        let state = runtime.state("gen").unwrap();
        assert!(state.faulted());
        assert_eq!(state.scope.get("n"), Some(&Value::Int(1)));

        assert!(runtime.reset("gen"));
        let state = runtime.state("gen").unwrap();
        assert!(!state.faulted());
        assert_eq!(state.scope.get("n"), Some(&Value::Int(0)));
        assert!(!runtime.reset("missing"));
    }
}
