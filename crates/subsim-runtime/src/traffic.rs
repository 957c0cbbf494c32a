//! Synthetic network traffic bus.
//!
//! Packets are buffered (oldest dropped first) only while nobody is
//! subscribed; the first subscriber receives the backlog, then live packets
//! in generation order.

#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use smol_str::SmolStr;

use crate::pubsub::{Hub, Retention, Subscription};

/// Traffic class of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// GOOSE event multicast.
    Goose,
    /// Sampled values.
    Sv,
    /// MMS client/server traffic (also used for Modbus register writes).
    Mms,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Goose => "GOOSE",
            Self::Sv => "SV",
            Self::Mms => "MMS",
        })
    }
}

/// GOOSE header fields carried by a GOOSE packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GooseFrameInfo {
    pub app_id: SmolStr,
    pub conf_rev: u32,
    /// State number, bumped on every dataset change.
    pub st_num: u32,
    /// Sequence number, bumped on every retransmission.
    pub sq_num: u32,
}

/// One synthetic packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPacket {
    /// Monotonic packet id.
    pub id: u64,
    /// Device the packet is attributed to.
    pub source_device_name: SmolStr,
    pub protocol: Protocol,
    /// Simulation time of generation.
    pub timestamp: Duration,
    /// Present on GOOSE packets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goose: Option<GooseFrameInfo>,
}

/// Engine-owned traffic bus.
pub struct TrafficBus {
    hub: Hub<NetworkPacket>,
    next_id: u64,
}

impl TrafficBus {
    /// Creates a bus buffering at most `capacity` packets while unobserved.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            hub: Hub::new(capacity, Retention::UntilSubscribed),
            next_id: 1,
        }
    }

    /// Publishes a packet and returns its id.
    pub fn publish(
        &mut self,
        source_device: &str,
        protocol: Protocol,
        timestamp: Duration,
        goose: Option<GooseFrameInfo>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.hub.publish(NetworkPacket {
            id,
            source_device_name: SmolStr::new(source_device),
            protocol,
            timestamp,
            goose,
        });
        id
    }

    /// Registers a callback; buffered packets are delivered first.
    pub fn subscribe(
        &self,
        callback: impl FnMut(&NetworkPacket) + Send + 'static,
    ) -> Subscription {
        self.hub.subscribe(Box::new(callback))
    }

    /// Packets currently buffered for the next subscriber.
    #[must_use]
    pub fn buffered(&self) -> Vec<NetworkPacket> {
        self.hub.backlog()
    }

    /// Total number of packets published.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.next_id - 1
    }
}

impl fmt::Debug for TrafficBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrafficBus")
            .field("published", &self.published())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn capacity_bounds_unobserved_backlog() {
        let mut bus = TrafficBus::new(2);
        for _ in 0..3 {
            bus.publish("gen1", Protocol::Mms, Duration::ZERO, None);
        }
        let ids: Vec<_> = bus.buffered().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn subscriber_sees_backlog_then_live_packets() {
        let mut bus = TrafficBus::new(8);
        bus.publish("a", Protocol::Sv, Duration::from_millis(1), None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(move |packet| sink.lock().push(packet.protocol));
        bus.publish("a", Protocol::Goose, Duration::from_millis(2), None);
        sub.unsubscribe();
        bus.publish("a", Protocol::Mms, Duration::from_millis(3), None);
        assert_eq!(*seen.lock(), vec![Protocol::Sv, Protocol::Goose]);
        assert_eq!(bus.buffered().len(), 1);
    }

    #[test]
    fn packet_json_shape() {
        let packet = NetworkPacket {
            id: 7,
            source_device_name: "bay1".into(),
            protocol: Protocol::Goose,
            timestamp: Duration::from_millis(10),
            goose: Some(GooseFrameInfo {
                app_id: "0x0001".into(),
                conf_rev: 1,
                st_num: 2,
                sq_num: 0,
            }),
        };
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["sourceDeviceName"], "bay1");
        assert_eq!(json["protocol"], "GOOSE");
        assert_eq!(json["goose"]["stNum"], 2);
    }
}
