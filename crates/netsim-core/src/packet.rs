//! Synthetic packet flows and their lifecycle
//!
//! A packet is created `pending`, gets its path assigned exactly once, and
//! is `transmitted` (a path exists) or `dropped` (no path) from that moment
//! on. A transmitted packet later settles into `received`. Both `received`
//! and `dropped` are terminal.
//!
//! ```text
//! pending ──path──▶ transmitted ──settle──▶ received
//!    │
//!    └──no path──▶ dropped
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::identity::{DeviceId, PacketId};

/// Protocol label carried by a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Icmp,
    Tcp,
    Udp,
    Arp,
    Dns,
}

impl std::str::FromStr for Protocol {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ICMP" => Ok(Protocol::Icmp),
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            "ARP" => Ok(Protocol::Arp),
            "DNS" => Ok(Protocol::Dns),
            other => Err(EngineError::invalid(format!("unknown protocol: {other}"))),
        }
    }
}

/// Lifecycle status of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketStatus {
    #[default]
    Pending,
    Transmitted,
    Received,
    Dropped,
}

impl PacketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PacketStatus::Received | PacketStatus::Dropped)
    }
}

/// A synthetic packet travelling across the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketFlow {
    pub id: PacketId,
    pub source: DeviceId,
    pub destination: DeviceId,
    pub protocol: Protocol,
    status: PacketStatus,
    path: Vec<DeviceId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl PacketFlow {
    /// Create a pending packet with no path yet
    pub fn new(spec: PacketSpec) -> Self {
        Self {
            id: PacketId::generate(),
            source: spec.source,
            destination: spec.destination,
            protocol: spec.protocol,
            status: PacketStatus::Pending,
            path: Vec::new(),
            timestamp: Utc::now(),
            data: spec.data,
        }
    }

    pub fn status(&self) -> PacketStatus {
        self.status
    }

    pub fn path(&self) -> &[DeviceId] {
        &self.path
    }

    /// Number of links the packet crosses
    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Assign the resolved path. Only a pending packet accepts a path; an
    /// empty path drops the packet on the spot.
    ///
    /// Returns the resulting status.
    pub fn assign_path(&mut self, path: Vec<DeviceId>) -> PacketStatus {
        if self.status != PacketStatus::Pending {
            return self.status;
        }
        if path.is_empty() {
            self.status = PacketStatus::Dropped;
        } else {
            self.path = path;
            self.status = PacketStatus::Transmitted;
        }
        self.status
    }

    /// Move a transmitted packet to `received`. Returns false, leaving the
    /// packet untouched, for any other status.
    pub fn settle(&mut self) -> bool {
        if self.status == PacketStatus::Transmitted {
            self.status = PacketStatus::Received;
            true
        } else {
            false
        }
    }
}

/// Request to create a packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketSpec {
    pub source: DeviceId,
    pub destination: DeviceId,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub data: Option<String>,
}

impl PacketSpec {
    pub fn new(source: impl Into<DeviceId>, destination: impl Into<DeviceId>, protocol: Protocol) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            protocol,
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PacketFlow {
        PacketFlow::new(PacketSpec::new("r1", "pc1", Protocol::Icmp))
    }

    #[test]
    fn test_empty_path_drops() {
        let mut packet = pending();
        assert_eq!(packet.status(), PacketStatus::Pending);
        assert_eq!(packet.assign_path(vec![]), PacketStatus::Dropped);
        assert!(packet.path().is_empty());
        assert!(!packet.settle());
        assert_eq!(packet.status(), PacketStatus::Dropped);
    }

    #[test]
    fn test_path_is_assigned_once() {
        let mut packet = pending();
        let path: Vec<DeviceId> = vec!["r1".into(), "s1".into(), "pc1".into()];
        assert_eq!(packet.assign_path(path.clone()), PacketStatus::Transmitted);
        assert_eq!(packet.hop_count(), 2);

        // A second assignment is ignored
        assert_eq!(packet.assign_path(vec![]), PacketStatus::Transmitted);
        assert_eq!(packet.path(), path.as_slice());
    }

    #[test]
    fn test_settle_exactly_once() {
        let mut packet = pending();
        packet.assign_path(vec!["r1".into(), "pc1".into()]);
        assert!(packet.settle());
        assert_eq!(packet.status(), PacketStatus::Received);
        assert!(!packet.settle());
        assert!(packet.status().is_terminal());
    }

    #[test]
    fn test_protocol_wire_names() {
        assert_eq!(serde_json::to_string(&Protocol::Icmp).unwrap(), "\"ICMP\"");
        assert_eq!(serde_json::to_string(&Protocol::Dns).unwrap(), "\"DNS\"");
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert!("SCTP".parse::<Protocol>().is_err());

        let json = serde_json::to_value(pending()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["protocol"], "ICMP");
        assert!(json["path"].as_array().unwrap().is_empty());
    }
}
