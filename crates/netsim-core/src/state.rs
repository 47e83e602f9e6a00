//! The aggregate simulation state

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::device::{Device, DeviceStatus, InterfaceStatus};
use crate::identity::{ConnectionId, DeviceId, PacketId};
use crate::packet::{PacketFlow, PacketStatus};

/// Devices, connections, packet history, and the run flag.
///
/// Collections keep insertion order; path resolution depends on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub devices: Vec<Device>,
    pub connections: Vec<Connection>,
    pub packets: Vec<PacketFlow>,
    pub is_running: bool,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.id == id)
    }

    pub fn device_mut(&mut self, id: &DeviceId) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| &d.id == id)
    }

    pub fn contains_device(&self, id: &DeviceId) -> bool {
        self.devices.iter().any(|d| &d.id == id)
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    pub fn connection_mut(&mut self, id: &ConnectionId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| &c.id == id)
    }

    pub fn packet(&self, id: &PacketId) -> Option<&PacketFlow> {
        self.packets.iter().find(|p| &p.id == id)
    }

    pub fn packet_mut(&mut self, id: &PacketId) -> Option<&mut PacketFlow> {
        self.packets.iter_mut().find(|p| &p.id == id)
    }

    /// Connections with `device` at either end
    pub fn connections_of<'a>(&'a self, device: &'a DeviceId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.touches(device))
    }

    /// Point the interfaces at both ends of `connection` at each other and
    /// bring them up or down with the connection. Interfaces that do not
    /// exist are left alone.
    pub fn link_interfaces(&mut self, connection: &Connection) {
        let [(source, source_ref), (target, target_ref)] = connection_ends(connection);
        let remote_of_source = self.resolve_interface(target, target_ref);
        let remote_of_target = self.resolve_interface(source, source_ref);
        let status = if connection.is_connected() {
            InterfaceStatus::Up
        } else {
            InterfaceStatus::Down
        };

        for (device, reference, remote) in [(source, source_ref, remote_of_source), (target, target_ref, remote_of_target)] {
            if let Some(iface) = self.device_mut(device).and_then(|d| d.interface_mut(reference)) {
                iface.connected_to = Some(remote);
                iface.status = status;
            }
        }
    }

    /// Clear the link on both ends of `connection` and take them down
    pub fn unlink_interfaces(&mut self, connection: &Connection) {
        for (device, reference) in connection_ends(connection) {
            if let Some(iface) = self.device_mut(device).and_then(|d| d.interface_mut(reference)) {
                iface.connected_to = None;
                iface.status = InterfaceStatus::Down;
            }
        }
    }

    /// The id of the interface `reference` names on `device`, or the
    /// reference itself when no such interface exists
    fn resolve_interface(&self, device: &DeviceId, reference: &str) -> String {
        self.device(device)
            .and_then(|d| d.interface(reference))
            .map(|iface| iface.id.clone())
            .unwrap_or_else(|| reference.to_string())
    }

    /// Summary counts
    pub fn stats(&self) -> SimulationStats {
        let mut stats = SimulationStats {
            devices: self.devices.len(),
            connections: self.connections.len(),
            is_running: self.is_running,
            ..Default::default()
        };

        for device in &self.devices {
            if device.status == DeviceStatus::Online {
                stats.devices_online += 1;
            }
        }
        for connection in &self.connections {
            if connection.is_connected() {
                stats.connections_active += 1;
            }
        }
        for packet in &self.packets {
            stats.packets_total += 1;
            match packet.status() {
                PacketStatus::Pending => stats.packets_pending += 1,
                PacketStatus::Transmitted => stats.packets_transmitted += 1,
                PacketStatus::Received => stats.packets_received += 1,
                PacketStatus::Dropped => stats.packets_dropped += 1,
            }
        }
        stats
    }
}

fn connection_ends(connection: &Connection) -> [(&DeviceId, &str); 2] {
    [
        (&connection.source_device_id, connection.source_interface.as_str()),
        (&connection.target_device_id, connection.target_interface.as_str()),
    ]
}

/// Counts over the current state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStats {
    pub devices: usize,
    pub devices_online: usize,
    pub connections: usize,
    pub connections_active: usize,
    pub packets_total: usize,
    pub packets_pending: usize,
    pub packets_transmitted: usize,
    pub packets_received: usize,
    pub packets_dropped: usize,
    pub is_running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, DeviceSpec};
    use crate::connection::ConnectionStatus;
    use crate::packet::{PacketSpec, Protocol};
    use chrono::Utc;

    #[test]
    fn test_stats_count_packets_by_status() {
        let mut state = SimulationState::new();
        state
            .devices
            .push(DeviceSpec::new(DeviceKind::Router, "R1").into_device("r1".into()));

        let mut delivered = PacketFlow::new(PacketSpec::new("r1", "pc1", Protocol::Icmp));
        delivered.assign_path(vec!["r1".into(), "pc1".into()]);
        delivered.settle();
        let mut dropped = PacketFlow::new(PacketSpec::new("r1", "pc9", Protocol::Udp));
        dropped.assign_path(vec![]);
        state.packets.push(delivered);
        state.packets.push(dropped);

        let stats = state.stats();
        assert_eq!(stats.devices, 1);
        assert_eq!(stats.devices_online, 0);
        assert_eq!(stats.packets_total, 2);
        assert_eq!(stats.packets_received, 1);
        assert_eq!(stats.packets_dropped, 1);
    }

    #[test]
    fn test_link_and_unlink_interfaces() {
        let mut state = SimulationState::new();
        state
            .devices
            .push(DeviceSpec::new(DeviceKind::Router, "R1").into_device("r1".into()));
        state
            .devices
            .push(DeviceSpec::new(DeviceKind::Pc, "PC1").into_device("pc1".into()));
        let mut link = Connection {
            id: ConnectionId::new("c1"),
            source_device_id: "r1".into(),
            target_device_id: "pc1".into(),
            source_interface: "GigabitEthernet0/1".into(),
            target_interface: "eth0".into(),
            status: ConnectionStatus::Connected,
            created_at: Utc::now(),
        };

        state.link_interfaces(&link);
        let router = state.device(&"r1".into()).unwrap().interface("if1").unwrap();
        assert_eq!(router.status, InterfaceStatus::Up);
        assert_eq!(router.connected_to.as_deref(), Some("if0"));
        let pc = state.device(&"pc1".into()).unwrap().interface("eth0").unwrap();
        assert_eq!(pc.connected_to.as_deref(), Some("if1"));

        link.status = ConnectionStatus::Disconnected;
        state.link_interfaces(&link);
        let pc = state.device(&"pc1".into()).unwrap().interface("eth0").unwrap();
        assert_eq!(pc.status, InterfaceStatus::Down);
        assert_eq!(pc.connected_to.as_deref(), Some("if1"));

        state.unlink_interfaces(&link);
        let router = state.device(&"r1".into()).unwrap().interface("if1").unwrap();
        assert_eq!(router.status, InterfaceStatus::Down);
        assert!(router.connected_to.is_none());
    }
}
