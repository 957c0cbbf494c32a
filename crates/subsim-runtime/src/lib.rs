//! `subsim-runtime` - Simulation engine for virtual substation IEDs.
//!
//! One [`Engine`] owns everything a simulation needs: the protocol data store
//! (per-device Modbus register banks and the IEC 61850 MMS attribute map), the
//! GOOSE retransmission scheduler, the Structured Text script runtime, the log
//! stream, the traffic bus and an optional WebSocket bridge to a relay process.
//! Mutation is serialized through the engine's `&mut self` API; the tick loop
//! is the only writer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// WebSocket bridge to an external relay process.
pub mod bridge;
/// Structured Text to stepped-routine compiler.
pub mod compiler;
/// Engine configuration loading.
pub mod config;
/// Engine context tying the components together.
pub mod engine;
/// Error types.
pub mod error;
/// GOOSE retransmission scheduler.
pub mod goose;
/// Structured log stream.
pub mod log;
mod pubsub;
/// Clocks and the engine runner.
pub mod scheduler;
/// Script instances and the device capability surface.
pub mod script;
/// Engine construction from configuration.
pub mod setup;
/// Protocol data store.
pub mod store;
/// Synthetic network traffic bus.
pub mod traffic;
/// Runtime values and declared types.
pub mod value;

pub use engine::{Engine, EngineSettings};
pub use error::{BridgeError, CompileError, ConfigError, RuntimeError};
pub use pubsub::Subscription;
pub use value::Value;
