//! Initial topologies

use chrono::Utc;
use serde::{Deserialize, Serialize};

use netsim_core::{
    Connection, ConnectionId, ConnectionStatus, DeviceConfig, DeviceId, DeviceKind, DeviceSpec,
    InterfaceSpec, RouteEntry, ServiceKind, SimulationState,
};

/// Which topology a fresh engine starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedTopology {
    /// No devices, no connections
    #[default]
    Empty,
    /// A small office: one router, one switch, two PCs, and a server
    Demo,
}

impl SeedTopology {
    /// Build the initial state for this seed
    pub fn build(&self) -> SimulationState {
        match self {
            SeedTopology::Empty => SimulationState::new(),
            SeedTopology::Demo => demo(),
        }
    }
}

/// ```text
///          srv1
///           |
///   r1 --- s1 --- pc1
///           |
///          pc2
/// ```
///
/// `srv1` hangs off the router's second port.
fn demo() -> SimulationState {
    let mut state = SimulationState::new();

    let router = DeviceSpec::new(DeviceKind::Router, "R1")
        .at(120.0, 200.0)
        .with_interface(InterfaceSpec::named("GigabitEthernet0/0").with_address("192.168.1.1", "255.255.255.0"))
        .with_interface(InterfaceSpec::named("GigabitEthernet0/1").with_address("10.0.0.1", "255.255.255.0"))
        .with_config(DeviceConfig::Router {
            hostname: Some("r1".into()),
            routing_table: vec![RouteEntry {
                destination: "0.0.0.0".into(),
                mask: "0.0.0.0".into(),
                next_hop: "10.0.0.254".into(),
                interface: Some("GigabitEthernet0/1".into()),
            }],
        });
    let switch = DeviceSpec::new(DeviceKind::Switch, "S1").at(320.0, 200.0).with_config(DeviceConfig::Switch {
        hostname: Some("s1".into()),
        vlans: vec![1],
    });
    let pc1 = DeviceSpec::new(DeviceKind::Pc, "PC1")
        .at(520.0, 140.0)
        .with_interface(InterfaceSpec::named("eth0").with_address("192.168.1.10", "255.255.255.0"))
        .with_config(DeviceConfig::Pc {
            hostname: Some("pc1".into()),
            default_gateway: Some("192.168.1.1".into()),
            dns_servers: vec!["10.0.0.2".into()],
        });
    let pc2 = DeviceSpec::new(DeviceKind::Pc, "PC2")
        .at(520.0, 260.0)
        .with_interface(InterfaceSpec::named("eth0").with_address("192.168.1.11", "255.255.255.0"))
        .with_config(DeviceConfig::Pc {
            hostname: Some("pc2".into()),
            default_gateway: Some("192.168.1.1".into()),
            dns_servers: vec!["10.0.0.2".into()],
        });
    let server = DeviceSpec::new(DeviceKind::Server, "SRV1")
        .at(120.0, 60.0)
        .with_interface(InterfaceSpec::named("eth0").with_address("10.0.0.2", "255.255.255.0"))
        .with_config(DeviceConfig::Server {
            hostname: Some("srv1".into()),
            default_gateway: Some("10.0.0.1".into()),
            services: vec![ServiceKind::Http, ServiceKind::Dns],
        });

    for (id, spec) in [("r1", router), ("s1", switch), ("pc1", pc1), ("pc2", pc2), ("srv1", server)] {
        state.devices.push(spec.into_device(DeviceId::new(id)));
    }

    let links = [
        ("c1", "r1", "GigabitEthernet0/0", "s1", "FastEthernet0/1"),
        ("c2", "s1", "FastEthernet0/2", "pc1", "eth0"),
        ("c3", "s1", "FastEthernet0/3", "pc2", "eth0"),
        ("c4", "r1", "GigabitEthernet0/1", "srv1", "eth0"),
    ];
    for (id, source, source_iface, target, target_iface) in links {
        let connection = Connection {
            id: ConnectionId::new(id),
            source_device_id: DeviceId::new(source),
            target_device_id: DeviceId::new(target),
            source_interface: source_iface.into(),
            target_interface: target_iface.into(),
            status: ConnectionStatus::Connected,
            created_at: Utc::now(),
        };
        state.link_interfaces(&connection);
        state.connections.push(connection);
    }

    state
}
