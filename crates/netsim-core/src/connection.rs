//! Links between devices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::identity::{ConnectionId, DeviceId};

/// Whether a connection currently carries traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Disconnected,
}

impl std::str::FromStr for ConnectionStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(ConnectionStatus::Connected),
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            other => Err(EngineError::invalid(format!("invalid connection status: {other}"))),
        }
    }
}

/// An undirected edge between two devices.
///
/// Only connections with status [`ConnectionStatus::Connected`] take part
/// in path resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub source_device_id: DeviceId,
    pub target_device_id: DeviceId,
    /// Interface id or name on the source device
    pub source_interface: String,
    /// Interface id or name on the target device
    pub target_interface: String,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// Whether this connection has the given device as either endpoint
    pub fn touches(&self, device: &DeviceId) -> bool {
        &self.source_device_id == device || &self.target_device_id == device
    }

    /// The endpoint opposite `device`, if `device` is an endpoint at all
    pub fn other_end(&self, device: &DeviceId) -> Option<&DeviceId> {
        if &self.source_device_id == device {
            Some(&self.target_device_id)
        } else if &self.target_device_id == device {
            Some(&self.source_device_id)
        } else {
            None
        }
    }

    /// Whether this connection links `a` and `b`, in either direction
    pub fn links(&self, a: &DeviceId, b: &DeviceId) -> bool {
        (&self.source_device_id == a && &self.target_device_id == b)
            || (&self.source_device_id == b && &self.target_device_id == a)
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Request to cable two devices together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    pub source_device_id: DeviceId,
    pub target_device_id: DeviceId,
    #[serde(default)]
    pub source_interface: String,
    #[serde(default)]
    pub target_interface: String,
}

impl ConnectionSpec {
    pub fn new(source: impl Into<DeviceId>, target: impl Into<DeviceId>) -> Self {
        Self {
            source_device_id: source.into(),
            target_device_id: target.into(),
            source_interface: String::new(),
            target_interface: String::new(),
        }
    }

    pub fn via(mut self, source_interface: impl Into<String>, target_interface: impl Into<String>) -> Self {
        self.source_interface = source_interface.into();
        self.target_interface = target_interface.into();
        self
    }
}
