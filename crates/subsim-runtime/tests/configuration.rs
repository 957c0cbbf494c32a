mod common;

use std::path::Path;
use std::process::Command;

use common::demos_dir;
use subsim_runtime::config::EngineConfig;
use subsim_runtime::scheduler::{ManualClock, Runner};
use subsim_runtime::setup::build_engine;
use subsim_runtime::store::{RegisterType, RegisterValue};
use subsim_runtime::ConfigError;

fn subsim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_subsim"))
}

#[test]
fn demo_configuration_loads() {
    let config = EngineConfig::load(demos_dir().join("sim.toml")).unwrap();
    assert_eq!(config.settings.tick_interval.as_millis(), 100);
    assert!(config.bridge.is_none());

    let ids: Vec<&str> = config.devices.iter().map(|device| device.id.as_str()).collect();
    assert_eq!(ids, vec!["GEN1", "FDR1"]);

    let generator = &config.devices[0];
    let program = generator.program.as_ref().unwrap();
    assert!(program.is_file(), "{}", program.display());
    assert_eq!(generator.modbus.as_ref().map(|modbus| modbus.port), Some(1502));
    assert_eq!(
        generator.registers.get(RegisterType::HoldingRegister, 192),
        Some(RegisterValue::Word(1))
    );
    assert_eq!(generator.goose.len(), 1);
    assert_eq!(generator.goose[0].config.min_time.as_millis(), 10);
}

#[test]
fn demo_simulation_runs_against_a_manual_clock() {
    let config = EngineConfig::load(demos_dir().join("sim.toml")).unwrap();
    let engine = build_engine(&config).unwrap();
    let mut runner = Runner::new(engine, ManualClock::new());
    runner.run_cycles(40);

    let engine = runner.into_engine();
    assert_eq!(engine.active_device().map(|id| id.as_str()), Some("GEN1"));
    assert_eq!(engine.get_register(14).map(|status| status & 0x10), Some(0x10));
    assert_eq!(
        engine
            .read_register("FDR1", RegisterType::Coil, 0)
            .map(RegisterValue::as_bool),
        Some(true)
    );
    assert_eq!(
        engine.store().mms().owner("FDR1LD0/XCBR1.Pos.stVal").map(|id| id.as_str()),
        Some("FDR1")
    );
}

#[test]
fn validation_names_the_offending_key() {
    let cases = [
        ("[engine]\ntick_interval_ms = 0\n", "engine.tick_interval_ms"),
        (
            "[[device]]\nid = \"A\"\n[[device]]\nid = \"A\"\n",
            "device.id",
        ),
        (
            "[[device]]\nid = \"A\"\n[device.modbus]\nunit_id = 0\n",
            "device.modbus.unit_id",
        ),
        (
            "[[device]]\nid = \"A\"\n[[device.register]]\nkind = \"analog\"\naddress = 1\nvalue = 1\n",
            "device.register.kind",
        ),
        (
            "[[device]]\nid = \"A\"\n[[device.goose]]\npublisher = \"P\"\napp_id = \"0x1\"\nmin_time_ms = 50\nmax_time_ms = 10\nentries = []\n",
            "goose.min_time_ms",
        ),
    ];
    for (text, key) in cases {
        match EngineConfig::parse(text, Path::new(".")) {
            Err(ConfigError::Invalid { key: found, .. }) => assert_eq!(found, key, "{text}"),
            other => panic!("expected invalid {key}, got {other:?}"),
        }
    }
}

#[test]
fn unknown_keys_are_parse_errors() {
    let err = EngineConfig::parse("[engine]\ntick = 5\n", Path::new(".")).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err:?}");
}

#[test]
fn cli_check_accepts_the_demo_program() {
    let output = subsim()
        .arg("check")
        .arg(demos_dir().join("generator.st"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(": ok ("), "{stdout}");
}

#[test]
fn cli_check_prints_the_listing() {
    let output = subsim()
        .args(["check", "--listing"])
        .arg(demos_dir().join("generator.st"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("PROGRAM GeneratorController"), "{stdout}");
    assert!(stdout.contains("steps:"));
}

#[test]
fn cli_check_reports_the_failing_line() {
    let path = std::env::temp_dir().join(format!("subsim-check-{}.st", std::process::id()));
    std::fs::write(&path, "VAR x : INT; END_VAR\nx := 1;\ny := 2;\n").unwrap();
    let output = subsim().arg("check").arg(&path).output().unwrap();
    let _ = std::fs::remove_file(&path);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 3"), "{stderr}");
    assert!(stderr.contains("undeclared variable 'y'"), "{stderr}");
}

#[test]
fn cli_run_executes_a_bounded_simulation() {
    let output = subsim()
        .args(["run", "--cycles", "5", "--config"])
        .arg(demos_dir().join("sim.toml"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("5 cycles"), "{stdout}");
    assert!(stdout.contains("GEN1: 5 passes"), "{stdout}");
}
