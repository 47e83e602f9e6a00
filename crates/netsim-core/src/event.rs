//! Engine events
//!
//! Four named event kinds, each with a concrete payload type. The engine
//! publishes each payload on its own channel and also as an [`EngineEvent`]
//! on the combined channel that real-time transports rebroadcast.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::device::{Device, DeviceStatus};
use crate::error::EngineError;
use crate::identity::{ConnectionId, DeviceId};
use crate::packet::PacketFlow;

/// The named event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    TopologyChanged,
    DeviceStatusChanged,
    PacketFlow,
    SimulationStateChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::TopologyChanged,
        EventKind::DeviceStatusChanged,
        EventKind::PacketFlow,
        EventKind::SimulationStateChanged,
    ];

    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TopologyChanged => "topology-changed",
            EventKind::DeviceStatusChanged => "device-status-changed",
            EventKind::PacketFlow => "packet-flow",
            EventKind::SimulationStateChanged => "simulation-state-changed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EngineError::invalid(format!("unknown event kind: {s}")))
    }
}

/// What changed in the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum TopologyChange {
    DeviceAdded { device: Device },
    DeviceUpdated { device: Device },
    DeviceRemoved { device_id: DeviceId },
    ConnectionAdded { connection: Connection },
    ConnectionUpdated { connection: Connection },
    ConnectionRemoved { connection_id: ConnectionId },
    /// Everything observed before this point is stale
    Reset,
    /// Devices and connections were replaced wholesale from a snapshot
    Restored { devices: usize, connections: usize },
}

/// Payload of `topology-changed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyChanged {
    #[serde(flatten)]
    pub change: TopologyChange,
    pub timestamp: DateTime<Utc>,
}

/// Payload of `device-status-changed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusChanged {
    pub device_id: DeviceId,
    pub status: DeviceStatus,
    pub timestamp: DateTime<Utc>,
}

/// Payload of `packet-flow`: the packet as it stands after the change.
///
/// `removed` is set when the packet was dropped from history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketFlowEvent {
    pub packet: PacketFlow,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub removed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Payload of `simulation-state-changed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStateChanged {
    pub is_running: bool,
    pub timestamp: DateTime<Utc>,
}

/// Any engine event, tagged with its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum EngineEvent {
    TopologyChanged(TopologyChanged),
    DeviceStatusChanged(DeviceStatusChanged),
    PacketFlow(PacketFlowEvent),
    SimulationStateChanged(SimulationStateChanged),
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TopologyChanged(_) => EventKind::TopologyChanged,
            Self::DeviceStatusChanged(_) => EventKind::DeviceStatusChanged,
            Self::PacketFlow(_) => EventKind::PacketFlow,
            Self::SimulationStateChanged(_) => EventKind::SimulationStateChanged,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::TopologyChanged(e) => e.timestamp,
            Self::DeviceStatusChanged(e) => e.timestamp,
            Self::PacketFlow(e) => e.timestamp,
            Self::SimulationStateChanged(e) => e.timestamp,
        }
    }

    /// Create a topology-changed event
    pub fn topology(change: TopologyChange) -> Self {
        Self::TopologyChanged(TopologyChanged {
            change,
            timestamp: Utc::now(),
        })
    }

    /// Create a device-status-changed event
    pub fn device_status(device_id: DeviceId, status: DeviceStatus) -> Self {
        Self::DeviceStatusChanged(DeviceStatusChanged {
            device_id,
            status,
            timestamp: Utc::now(),
        })
    }

    /// Create a packet-flow event
    pub fn packet(packet: PacketFlow) -> Self {
        Self::PacketFlow(PacketFlowEvent {
            packet,
            removed: false,
            timestamp: Utc::now(),
        })
    }

    /// Create a packet-flow event announcing that `packet` left history
    pub fn packet_removed(packet: PacketFlow) -> Self {
        Self::PacketFlow(PacketFlowEvent {
            packet,
            removed: true,
            timestamp: Utc::now(),
        })
    }

    /// Create a simulation-state-changed event
    pub fn simulation(is_running: bool) -> Self {
        Self::SimulationStateChanged(SimulationStateChanged {
            is_running,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketSpec, Protocol};

    #[test]
    fn test_event_kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("packet-lost".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_engine_event_envelope() {
        let event = EngineEvent::simulation(true);
        assert_eq!(event.kind(), EventKind::SimulationStateChanged);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "simulation-state-changed");
        assert_eq!(json["payload"]["isRunning"], true);
    }

    #[test]
    fn test_topology_change_is_flattened() {
        let event = EngineEvent::topology(TopologyChange::DeviceRemoved {
            device_id: DeviceId::new("pc1"),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "topology-changed");
        assert_eq!(json["payload"]["change"], "device-removed");
        assert_eq!(json["payload"]["deviceId"], "pc1");
    }

    #[test]
    fn test_removed_flag_only_on_removal() {
        let packet = PacketFlow::new(PacketSpec::new("pc1", "pc2", Protocol::Icmp));

        let sent = serde_json::to_value(EngineEvent::packet(packet.clone())).unwrap();
        assert!(sent["payload"].get("removed").is_none());

        let removed = serde_json::to_value(EngineEvent::packet_removed(packet)).unwrap();
        assert_eq!(removed["event"], "packet-flow");
        assert_eq!(removed["payload"]["removed"], true);
    }
}
