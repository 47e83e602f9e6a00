//! Devices, their interfaces, and per-kind configuration

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::identity::DeviceId;

/// The closed set of device kinds the simulator knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Router,
    Switch,
    Pc,
    Server,
}

impl DeviceKind {
    /// All kinds, in declaration order
    pub const ALL: [DeviceKind; 4] = [
        DeviceKind::Router,
        DeviceKind::Switch,
        DeviceKind::Pc,
        DeviceKind::Server,
    ];

    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Router => "router",
            DeviceKind::Switch => "switch",
            DeviceKind::Pc => "pc",
            DeviceKind::Server => "server",
        }
    }

    /// Interfaces a freshly placed device of this kind starts with
    /// when the request does not list any.
    pub fn default_interfaces(&self) -> Vec<Interface> {
        let names: Vec<String> = match self {
            DeviceKind::Router => (0..2).map(|i| format!("GigabitEthernet0/{i}")).collect(),
            DeviceKind::Switch => (1..=8).map(|i| format!("FastEthernet0/{i}")).collect(),
            DeviceKind::Pc => vec!["eth0".to_string()],
            DeviceKind::Server => vec!["eth0".to_string(), "eth1".to_string()],
        };
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Interface::new(format!("if{i}"), name))
            .collect()
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::invalid(format!("unknown device kind: {s}")))
    }
}

/// Operational status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    #[default]
    Offline,
    Error,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = EngineError;

    /// Parse a status string, rejecting anything outside the closed set
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(DeviceStatus::Online),
            "offline" => Ok(DeviceStatus::Offline),
            "error" => Ok(DeviceStatus::Error),
            other => Err(EngineError::invalid(format!("invalid device status: {other}"))),
        }
    }
}

/// Link status of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceStatus {
    Up,
    #[default]
    Down,
}

/// Layout position on the canvas. Never read by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A network interface, owned by exactly one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    /// Unique within the owning device
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(default)]
    pub status: InterfaceStatus,
    /// Remote interface id this one is cabled to (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_to: Option<String>,
}

impl Interface {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ip_address: None,
            subnet_mask: None,
            status: InterfaceStatus::Down,
            connected_to: None,
        }
    }

    pub fn with_address(mut self, ip: impl Into<String>, mask: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self.subnet_mask = Some(mask.into());
        self
    }

    /// Whether a connection endpoint reference (id or name) names this interface
    pub fn matches(&self, reference: &str) -> bool {
        self.id == reference || self.name == reference
    }
}

/// Request-side description of an interface; the id is assigned when absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub subnet_mask: Option<String>,
}

impl InterfaceSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, ip: impl Into<String>, mask: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self.subnet_mask = Some(mask.into());
        self
    }
}

/// Turn interface specs into owned interfaces, assigning `if{n}` ids
/// where none were given.
pub fn build_interfaces(specs: Vec<InterfaceSpec>) -> Vec<Interface> {
    specs
        .into_iter()
        .enumerate()
        .map(|(i, spec)| Interface {
            id: spec.id.unwrap_or_else(|| format!("if{i}")),
            name: spec.name,
            ip_address: spec.ip_address,
            subnet_mask: spec.subnet_mask,
            status: InterfaceStatus::Down,
            connected_to: None,
        })
        .collect()
}

/// A static route on a router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub destination: String,
    pub mask: String,
    pub next_hop: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

/// Services a server can advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Http,
    Https,
    Dns,
    Dhcp,
    Ftp,
    Ssh,
}

/// Per-kind device configuration. Opaque to path resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum DeviceConfig {
    Router {
        #[serde(default)]
        hostname: Option<String>,
        #[serde(default)]
        routing_table: Vec<RouteEntry>,
    },
    Switch {
        #[serde(default)]
        hostname: Option<String>,
        #[serde(default)]
        vlans: Vec<u16>,
    },
    Pc {
        #[serde(default)]
        hostname: Option<String>,
        #[serde(default)]
        default_gateway: Option<String>,
        #[serde(default)]
        dns_servers: Vec<String>,
    },
    Server {
        #[serde(default)]
        hostname: Option<String>,
        #[serde(default)]
        default_gateway: Option<String>,
        #[serde(default)]
        services: Vec<ServiceKind>,
    },
}

impl DeviceConfig {
    /// The device kind this configuration belongs to
    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceConfig::Router { .. } => DeviceKind::Router,
            DeviceConfig::Switch { .. } => DeviceKind::Switch,
            DeviceConfig::Pc { .. } => DeviceKind::Pc,
            DeviceConfig::Server { .. } => DeviceKind::Server,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        match self {
            DeviceConfig::Router { hostname, .. }
            | DeviceConfig::Switch { hostname, .. }
            | DeviceConfig::Pc { hostname, .. }
            | DeviceConfig::Server { hostname, .. } => hostname.as_deref(),
        }
    }
}

/// A device placed in the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DeviceConfig>,
}

impl Device {
    /// Find an interface by id or name
    pub fn interface(&self, reference: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.matches(reference))
    }

    pub fn interface_mut(&mut self, reference: &str) -> Option<&mut Interface> {
        self.interfaces.iter_mut().find(|i| i.matches(reference))
    }

    /// Check the invariants a device must hold on its own: configuration
    /// variant matches the kind, and interface ids are unique.
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(config) = &self.config {
            if config.kind() != self.kind {
                return Err(EngineError::invalid(format!(
                    "{} configuration given for a {} device",
                    config.kind(),
                    self.kind
                )));
            }
        }

        let mut seen = HashSet::new();
        for iface in &self.interfaces {
            if !seen.insert(iface.id.as_str()) {
                return Err(EngineError::invalid(format!(
                    "duplicate interface id {} on device {}",
                    iface.id, self.id
                )));
            }
        }
        Ok(())
    }
}

/// Request to place a new device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    /// When empty, the kind's default interfaces are used
    #[serde(default)]
    pub interfaces: Vec<InterfaceSpec>,
    #[serde(default)]
    pub config: Option<DeviceConfig>,
}

impl DeviceSpec {
    pub fn new(kind: DeviceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            position: Position::default(),
            interfaces: Vec::new(),
            config: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_interface(mut self, iface: InterfaceSpec) -> Self {
        self.interfaces.push(iface);
        self
    }

    pub fn with_config(mut self, config: DeviceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the device this spec describes under the given id
    pub fn into_device(self, id: DeviceId) -> Device {
        let interfaces = if self.interfaces.is_empty() {
            self.kind.default_interfaces()
        } else {
            build_interfaces(self.interfaces)
        };
        Device {
            id,
            kind: self.kind,
            name: self.name,
            position: self.position,
            interfaces,
            status: DeviceStatus::Offline,
            config: self.config,
        }
    }
}

/// Partial update merged into an existing device. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub interfaces: Option<Vec<InterfaceSpec>>,
    #[serde(default)]
    pub status: Option<DeviceStatus>,
    #[serde(default)]
    pub config: Option<DeviceConfig>,
}

impl DeviceUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.position.is_none()
            && self.interfaces.is_none()
            && self.status.is_none()
            && self.config.is_none()
    }
}
