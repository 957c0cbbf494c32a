//! `subsim run`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use indexmap::IndexMap;
use parking_lot::Mutex;
use subsim_runtime::config::EngineConfig;
use subsim_runtime::log::{LogEntry, LogLevel};
use subsim_runtime::scheduler::{Runner, StdClock};
use subsim_runtime::setup::{attach_bridge, build_engine};
use subsim_runtime::traffic::{NetworkPacket, Protocol};
use tracing::{info, warn};

pub fn run_simulation(config_path: &Path, cycles: Option<u64>) -> anyhow::Result<()> {
    let config = EngineConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let mut engine = build_engine(&config)?;
    if let Some(bridge) = &config.bridge {
        match attach_bridge(&mut engine, bridge) {
            Ok(statuses) => info!(endpoints = statuses.len(), "relay attached"),
            Err(err) => warn!(%err, "continuing without relay"),
        }
    }

    let counts: Arc<Mutex<IndexMap<Protocol, u64>>> = Arc::default();
    let traffic = engine.subscribe_to_traffic({
        let counts = Arc::clone(&counts);
        move |packet: &NetworkPacket| *counts.lock().entry(packet.protocol).or_default() += 1
    });
    let errors: Arc<Mutex<Vec<String>>> = Arc::default();
    let logs = engine.subscribe_to_logs({
        let errors = Arc::clone(&errors);
        move |entry: &LogEntry| {
            if entry.level == LogLevel::Error {
                errors
                    .lock()
                    .push(format!("[{}] {}", entry.source, entry.message));
            }
        }
    });

    let mut runner = Runner::new(engine, StdClock::new());
    match cycles {
        Some(cycles) => runner.run_cycles(cycles),
        None => runner.run_until_stopped(),
    }
    let mut engine = runner.into_engine();
    let scripts: Vec<_> = config
        .devices
        .iter()
        .filter_map(|device| engine.script_state(&device.id))
        .collect();
    engine.shutdown();
    traffic.unsubscribe();
    logs.unsubscribe();

    println!(
        "{} cycles, {:.1} s simulated",
        engine.ticks(),
        engine.now().as_secs_f64()
    );
    for (protocol, count) in counts.lock().iter() {
        println!("  {protocol:<5} {count} packets");
    }
    for state in &scripts {
        println!(
            "  {}: {} passes{}",
            state.device,
            state.passes,
            if state.faulted() { ", faulted" } else { "" }
        );
    }
    for error in errors.lock().iter() {
        println!("  error {error}");
    }
    Ok(())
}
