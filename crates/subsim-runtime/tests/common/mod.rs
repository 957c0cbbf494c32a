#![allow(dead_code)]

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::{json, Value as Json};
use subsim_runtime::log::LogEntry;
use subsim_runtime::traffic::{NetworkPacket, Protocol};
use subsim_runtime::{Engine, EngineSettings, Subscription};
use tungstenite::Message;

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn engine() -> Engine {
    Engine::new(EngineSettings::default())
}

pub fn demos_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
}

pub fn generator_source() -> String {
    std::fs::read_to_string(demos_dir().join("generator.st")).unwrap()
}

/// Collects every packet published after attachment.
pub struct TrafficRecorder {
    packets: Arc<Mutex<Vec<NetworkPacket>>>,
    subscription: Subscription,
}

impl TrafficRecorder {
    pub fn attach(engine: &Engine) -> Self {
        let packets: Arc<Mutex<Vec<NetworkPacket>>> = Arc::default();
        let sink = Arc::clone(&packets);
        let subscription = engine.subscribe_to_traffic(move |packet| sink.lock().push(packet.clone()));
        Self {
            packets,
            subscription,
        }
    }

    pub fn packets(&self) -> Vec<NetworkPacket> {
        self.packets.lock().clone()
    }

    pub fn goose(&self) -> Vec<NetworkPacket> {
        self.packets()
            .into_iter()
            .filter(|packet| packet.protocol == Protocol::Goose)
            .collect()
    }

    pub fn goose_times_ms(&self) -> Vec<u128> {
        self.goose()
            .iter()
            .map(|packet| packet.timestamp.as_millis())
            .collect()
    }

    pub fn detach(self) {
        self.subscription.unsubscribe();
    }
}

/// Collects every log entry emitted after attachment.
pub fn record_logs(engine: &Engine) -> Arc<Mutex<Vec<LogEntry>>> {
    let entries: Arc<Mutex<Vec<LogEntry>>> = Arc::default();
    let sink = Arc::clone(&entries);
    // Kept alive for the lifetime of the engine.
    let _subscription = engine.subscribe_to_logs(move |entry| sink.lock().push(entry.clone()));
    entries
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(ms(10));
    }
    condition()
}

/// How the test relay answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Lists one adapter, acknowledges endpoints and then pushes a remote
    /// write of `HR[192] := 1`.
    Cooperative,
    /// Reads frames but never answers.
    Silent,
    /// Closes the connection after the first frame.
    HangUp,
    /// Acknowledges endpoint lists, but answers the first one only after
    /// `LATE_ACK_DELAY`.
    LateAck,
}

pub const LATE_ACK_DELAY: Duration = Duration::from_millis(400);

pub const RELAY_ADAPTER_IP: &str = "10.0.0.5";

/// Starts a single-connection relay on an ephemeral port. The handle yields
/// every frame the client sent, in order.
pub fn spawn_relay(mode: RelayMode) -> (String, JoinHandle<Vec<Json>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let Ok(mut socket) = tungstenite::accept(stream) else {
            return Vec::new();
        };
        let mut frames = Vec::new();
        let mut acks_sent = 0;
        loop {
            let text = match socket.read() {
                Ok(Message::Text(text)) => text.as_str().to_string(),
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            let frame: Json = serde_json::from_str(&text).unwrap();
            let replies = match mode {
                RelayMode::Silent | RelayMode::HangUp => Vec::new(),
                RelayMode::Cooperative => cooperative_replies(&frame),
                RelayMode::LateAck => match endpoint_ack(&frame) {
                    Some(ack) => {
                        if acks_sent == 0 {
                            thread::sleep(LATE_ACK_DELAY);
                        }
                        acks_sent += 1;
                        vec![ack]
                    }
                    None => Vec::new(),
                },
            };
            frames.push(frame);
            if mode == RelayMode::HangUp {
                let _ = socket.close(None);
                // Drain until the client answers the close frame.
                while socket.read().is_ok() {}
                return frames;
            }
            for reply in replies {
                if socket.send(Message::text(reply.to_string())).is_err() {
                    return frames;
                }
            }
        }
        frames
    });
    (url, handle)
}

fn cooperative_replies(frame: &Json) -> Vec<Json> {
    match frame["type"].as_str() {
        Some("LIST_ADAPTERS") => vec![json!({
            "type": "ADAPTER_LIST",
            "adapters": [{ "name": "eth0", "ip": RELAY_ADAPTER_IP }],
        })],
        Some("SET_PROTOCOL_ENDPOINTS") => {
            let ack = endpoint_ack(frame).unwrap();
            vec![
                ack,
                json!({
                    "type": "REGISTER_WRITE",
                    "registerType": "holding",
                    "address": 192,
                    "value": 1,
                }),
            ]
        }
        _ => Vec::new(),
    }
}

/// `ENDPOINT_STATUS_LIST` reporting every requested endpoint as listening.
fn endpoint_ack(frame: &Json) -> Option<Json> {
    if frame["type"] != "SET_PROTOCOL_ENDPOINTS" {
        return None;
    }
    let statuses: Vec<Json> = frame["endpoints"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|endpoint| json!({ "id": endpoint["id"], "status": "listening" }))
        .collect();
    Some(json!({ "type": "ENDPOINT_STATUS_LIST", "endpoints": statuses }))
}
