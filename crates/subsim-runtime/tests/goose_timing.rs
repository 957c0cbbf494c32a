mod common;

use common::{engine, ms, TrafficRecorder};
use subsim_runtime::goose::{GooseConfig, GoosePhase};
use subsim_runtime::store::RegisterBank;
use subsim_runtime::traffic::Protocol;
use subsim_runtime::{Engine, EngineSettings};

const BREAKER: &str = "B1LD0/XCBR1.Pos.stVal";
const PUBLISHER: &str = "B1LD0/LLN0.gcbPos";

fn bay(engine: &mut Engine) {
    engine
        .register_device_goose(
            "BAY1",
            PUBLISHER,
            GooseConfig::new("0x0001", 3, 10, 2000),
            vec![BREAKER.into()],
        )
        .unwrap();
    engine.initialize_data("BAY1", [(BREAKER, false)]);
}

#[test]
fn burst_then_heartbeat_after_a_change() {
    let mut engine = engine();
    bay(&mut engine);
    let recorder = TrafficRecorder::attach(&engine);

    engine.write_mms(BREAKER, true, "ui");
    engine.advance_to(ms(4040));

    assert_eq!(recorder.goose_times_ms(), vec![0, 10, 20, 30, 40, 2040, 4040]);
    let headers: Vec<(u32, u32)> = recorder
        .goose()
        .iter()
        .filter_map(|packet| packet.goose.as_ref())
        .map(|info| (info.st_num, info.sq_num))
        .collect();
    assert_eq!(
        headers,
        vec![(1, 0), (1, 1), (1, 2), (1, 3), (1, 4), (1, 5), (1, 6)]
    );
    let first = recorder.goose()[0].clone();
    assert_eq!(first.source_device_name, "BAY1");
    let info = first.goose.unwrap();
    assert_eq!(info.app_id, "0x0001");
    assert_eq!(info.conf_rev, 3);
}

#[test]
fn a_new_change_restarts_the_burst_with_the_next_state_number() {
    let mut engine = engine();
    bay(&mut engine);
    let recorder = TrafficRecorder::attach(&engine);

    engine.write_mms(BREAKER, true, "ui");
    engine.advance_to(ms(2500));
    engine.write_mms(BREAKER, false, "ui");
    engine.advance_to(ms(2540));

    let tail: Vec<(u128, u32, u32)> = recorder
        .goose()
        .iter()
        .skip(6)
        .map(|packet| {
            let info = packet.goose.as_ref().unwrap();
            (packet.timestamp.as_millis(), info.st_num, info.sq_num)
        })
        .collect();
    assert_eq!(
        tail,
        vec![
            (2500, 2, 0),
            (2510, 2, 1),
            (2520, 2, 2),
            (2530, 2, 3),
            (2540, 2, 4)
        ]
    );
}

#[test]
fn unchanged_writes_keep_the_binding_quiet() {
    let mut engine = engine();
    bay(&mut engine);
    let recorder = TrafficRecorder::attach(&engine);

    engine.write_mms(BREAKER, false, "ui");
    engine.advance_to(ms(5000));

    assert!(recorder.goose().is_empty());
    assert_eq!(
        engine.goose().binding(PUBLISHER).map(|binding| binding.phase),
        Some(GoosePhase::Idle)
    );
    // The write itself is still client/server traffic.
    assert_eq!(recorder.packets().len(), 1);
}

#[test]
fn writes_outside_the_dataset_do_not_trigger() {
    let mut engine = engine();
    bay(&mut engine);
    let recorder = TrafficRecorder::attach(&engine);
    engine.write_mms("B1LD0/XCBR1.Pos.q", "good", "ui");
    engine.advance_to(ms(100));
    assert!(recorder.goose().is_empty());
}

#[test]
fn burst_count_is_configurable() {
    let mut engine = Engine::new(EngineSettings {
        goose_burst_count: 2,
        ..EngineSettings::default()
    });
    bay(&mut engine);
    let recorder = TrafficRecorder::attach(&engine);
    engine.write_mms(BREAKER, true, "ui");
    engine.advance_to(ms(2020));
    assert_eq!(recorder.goose_times_ms(), vec![0, 10, 20, 2020]);
}

#[test]
fn retransmissions_precede_a_tick_due_at_the_same_instant() {
    let mut engine = engine();
    engine
        .register_device_goose(
            "BAY1",
            PUBLISHER,
            GooseConfig::new("0x0001", 1, 100, 1000),
            vec![BREAKER.into()],
        )
        .unwrap();
    engine.initialize_data("BAY1", [(BREAKER, false)]);
    engine.load_profile("BAY1", RegisterBank::new());
    engine
        .load_script("BAY1", "Device.WriteRegister(1, 1);")
        .unwrap();
    let recorder = TrafficRecorder::attach(&engine);

    engine.write_mms(BREAKER, true, "ui");
    assert_eq!(engine.next_event_time(), ms(0));
    engine.advance_to(ms(100));

    let at_100: Vec<Protocol> = recorder
        .packets()
        .iter()
        .filter(|packet| packet.timestamp == ms(100))
        .map(|packet| packet.protocol)
        .collect();
    assert_eq!(at_100, vec![Protocol::Goose, Protocol::Mms]);
    assert_eq!(engine.ticks(), 2);
}

#[test]
fn invalid_timing_is_rejected() {
    let mut engine = engine();
    let err = engine
        .register_device_goose(
            "BAY1",
            PUBLISHER,
            GooseConfig::new("0x0001", 1, 500, 100),
            vec![BREAKER.into()],
        )
        .unwrap_err();
    assert!(err.to_string().contains("goose.min_time_ms"));
    assert!(engine.goose().bindings().is_empty());
}
