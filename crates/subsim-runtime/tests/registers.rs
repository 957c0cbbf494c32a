mod common;

use std::sync::Arc;

use common::{engine, TrafficRecorder};
use parking_lot::Mutex;
use subsim_runtime::Subscription;
use subsim_runtime::engine::BRIDGE_SOURCE;
use subsim_runtime::store::{RegisterBank, RegisterType, RegisterValue};
use subsim_runtime::traffic::Protocol;

#[test]
fn writes_read_back_through_every_table() {
    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());

    engine.set_coil(1, true, "ui");
    engine.set_discrete_input(2, true, "ui");
    engine.set_input_register(3, 230, "ui");
    engine.set_register(4, 11_000, "ui");

    assert_eq!(engine.get_coil(1), Some(true));
    assert_eq!(engine.get_discrete_input(2), Some(true));
    assert_eq!(engine.get_input_register(3), Some(230));
    assert_eq!(engine.get_register(4), Some(11_000));
    assert_eq!(engine.get_register(5), None);
}

#[test]
fn words_wrap_to_sixteen_bits() {
    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());
    engine.set_register(1, 70_000, "ui");
    engine.set_register(2, -2, "ui");
    assert_eq!(engine.get_register(1), Some(70_000 - 65_536));
    assert_eq!(engine.get_register(2), Some(0xFFFE));
}

#[test]
fn banks_are_kept_per_device() {
    let mut engine = engine();
    engine.load_profile(
        "GEN1",
        RegisterBank::new().with(RegisterType::HoldingRegister, 14, 16_u16),
    );
    engine.load_profile("GEN2", RegisterBank::new());
    assert_eq!(engine.active_device().map(|id| id.as_str()), Some("GEN2"));
    assert_eq!(engine.get_register(14), None);

    engine.set_register(14, 1, "ui");
    assert!(engine.focus_device("GEN1"));
    assert_eq!(engine.get_register(14), Some(16));
    assert_eq!(
        engine.read_register("GEN2", RegisterType::HoldingRegister, 14),
        Some(RegisterValue::Word(1))
    );
    assert!(!engine.focus_device("GEN3"));
    assert_eq!(engine.active_device().map(|id| id.as_str()), Some("GEN1"));
}

#[test]
fn reloading_a_profile_replaces_the_bank() {
    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());
    engine.set_register(1, 5, "ui");
    engine.load_profile(
        "GEN1",
        RegisterBank::new().with(RegisterType::Coil, 7, true),
    );
    assert_eq!(engine.get_register(1), None);
    assert_eq!(engine.get_coil(7), Some(true));
}

#[test]
fn every_write_is_logged_and_published() {
    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());
    let recorder = TrafficRecorder::attach(&engine);
    let logged_before = engine.logs().emitted();

    engine.set_register(1, 5, "ui");
    engine.set_register(1, 5, "ui");
    engine.set_coil(2, true, BRIDGE_SOURCE);

    let packets = recorder.packets();
    assert_eq!(packets.len(), 3);
    assert!(packets.iter().all(|packet| packet.protocol == Protocol::Mms));
    assert!(packets.iter().all(|packet| packet.source_device_name == "GEN1"));
    assert_eq!(engine.logs().emitted() - logged_before, 3);
    let last = engine.logs().recent().pop().unwrap();
    assert_eq!(last.source, BRIDGE_SOURCE);
    assert_eq!(last.message, "GEN1 CO[2] := TRUE");
}

#[test]
fn packet_ids_increase_monotonically() {
    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());
    let recorder = TrafficRecorder::attach(&engine);
    for value in 0..10 {
        engine.set_register(1, value, "ui");
    }
    engine.write_mms("GEN1LD0/MMXU1.TotW.mag.f", 1.5, "ui");
    let ids: Vec<u64> = recorder.packets().iter().map(|packet| packet.id).collect();
    assert_eq!(ids.len(), 11);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn subscribers_may_unsubscribe_from_their_own_callback() {
    let mut engine = engine();
    engine.load_profile("GEN1", RegisterBank::new());
    let recorder = TrafficRecorder::attach(&engine);

    let delivered = Arc::new(Mutex::new(0_u32));
    let own: Arc<Mutex<Option<Subscription>>> = Arc::default();
    let count = Arc::clone(&delivered);
    let handle = Arc::clone(&own);
    let subscription = engine.subscribe_to_traffic(move |_| {
        *count.lock() += 1;
        if let Some(subscription) = handle.lock().take() {
            subscription.unsubscribe();
        }
    });
    *own.lock() = Some(subscription);

    engine.set_register(1, 1, "ui");
    engine.set_register(1, 2, "ui");
    assert_eq!(*delivered.lock(), 1);
    assert_eq!(recorder.packets().len(), 2);
    assert_eq!(engine.get_register(1), Some(2));
}
