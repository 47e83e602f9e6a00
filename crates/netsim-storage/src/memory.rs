//! In-memory mirror
//!
//! Keeps a copy of the mirrored topology and packet history in the same
//! shape the engine uses. Useful in tests and as the working image of the
//! file-backed store.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use netsim_core::{
    Connection, ConnectionId, Device, DeviceId, DeviceStatus, PacketFlow, PacketId, SimulationState,
};

use crate::TopologyMirror;
use crate::error::StorageResult;

/// Mirror that holds everything in memory
#[derive(Debug, Default)]
pub struct MemoryMirror {
    image: RwLock<SimulationState>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing image
    pub fn with_state(state: SimulationState) -> Self {
        Self {
            image: RwLock::new(state),
        }
    }

    /// Copy of the mirrored image
    pub async fn image(&self) -> SimulationState {
        self.image.read().await.clone()
    }
}

/// Apply one mirrored mutation to an image. Shared by every mirror that
/// keeps a full image.
pub(crate) mod apply {
    use super::*;

    pub fn upsert_device(image: &mut SimulationState, device: &Device) {
        match image.device_mut(&device.id) {
            Some(existing) => *existing = device.clone(),
            None => image.devices.push(device.clone()),
        }
    }

    pub fn remove_device(image: &mut SimulationState, id: &DeviceId) {
        let cascaded: Vec<Connection> = image.connections_of(id).cloned().collect();
        for connection in &cascaded {
            remove_connection(image, &connection.id);
        }
        image.devices.retain(|d| &d.id != id);
    }

    pub fn set_device_status(image: &mut SimulationState, id: &DeviceId, status: DeviceStatus) {
        if let Some(device) = image.device_mut(id) {
            device.status = status;
        }
    }

    /// Connection upserts and removals carry the interface link changes
    /// of both endpoints with them.
    pub fn upsert_connection(image: &mut SimulationState, connection: &Connection) {
        match image.connection_mut(&connection.id) {
            Some(existing) => *existing = connection.clone(),
            None => image.connections.push(connection.clone()),
        }
        image.link_interfaces(connection);
    }

    pub fn remove_connection(image: &mut SimulationState, id: &ConnectionId) {
        let Some(index) = image.connections.iter().position(|c| &c.id == id) else {
            return;
        };
        let connection = image.connections.remove(index);
        image.unlink_interfaces(&connection);
    }

    pub fn record_packet(image: &mut SimulationState, packet: &PacketFlow) {
        match image.packet_mut(&packet.id) {
            Some(existing) => *existing = packet.clone(),
            None => image.packets.push(packet.clone()),
        }
    }

    pub fn remove_packet(image: &mut SimulationState, id: &PacketId) {
        image.packets.retain(|p| &p.id != id);
    }

    pub fn reset(image: &mut SimulationState) {
        image.packets.clear();
        image.is_running = false;
        for device in &mut image.devices {
            device.status = DeviceStatus::Offline;
        }
    }
}

#[async_trait]
impl TopologyMirror for MemoryMirror {
    async fn upsert_device(&self, device: &Device) -> StorageResult<()> {
        trace!(device_id = %device.id, "Mirroring device");
        apply::upsert_device(&mut *self.image.write().await, device);
        Ok(())
    }

    async fn remove_device(&self, id: &DeviceId) -> StorageResult<()> {
        apply::remove_device(&mut *self.image.write().await, id);
        Ok(())
    }

    async fn set_device_status(&self, id: &DeviceId, status: DeviceStatus) -> StorageResult<()> {
        apply::set_device_status(&mut *self.image.write().await, id, status);
        Ok(())
    }

    async fn upsert_connection(&self, connection: &Connection) -> StorageResult<()> {
        apply::upsert_connection(&mut *self.image.write().await, connection);
        Ok(())
    }

    async fn remove_connection(&self, id: &ConnectionId) -> StorageResult<()> {
        apply::remove_connection(&mut *self.image.write().await, id);
        Ok(())
    }

    async fn record_packet(&self, packet: &PacketFlow) -> StorageResult<()> {
        apply::record_packet(&mut *self.image.write().await, packet);
        Ok(())
    }

    async fn remove_packet(&self, id: &PacketId) -> StorageResult<()> {
        apply::remove_packet(&mut *self.image.write().await, id);
        Ok(())
    }

    async fn set_running(&self, running: bool) -> StorageResult<()> {
        self.image.write().await.is_running = running;
        Ok(())
    }

    async fn reset(&self) -> StorageResult<()> {
        apply::reset(&mut *self.image.write().await);
        Ok(())
    }

    async fn replace(&self, state: &SimulationState) -> StorageResult<()> {
        *self.image.write().await = state.clone();
        Ok(())
    }

    async fn load(&self) -> StorageResult<Option<SimulationState>> {
        Ok(Some(self.image().await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use netsim_core::{ConnectionStatus, DeviceKind, DeviceSpec, InterfaceStatus, PacketSpec, Protocol};

    fn device(id: &str) -> Device {
        DeviceSpec::new(DeviceKind::Pc, id.to_uppercase()).into_device(id.into())
    }

    fn connection(id: &str, a: &str, b: &str) -> Connection {
        Connection {
            id: ConnectionId::new(id),
            source_device_id: a.into(),
            target_device_id: b.into(),
            source_interface: "eth0".into(),
            target_interface: "eth0".into(),
            status: ConnectionStatus::Connected,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_order_and_replaces() {
        let mirror = MemoryMirror::new();
        mirror.upsert_device(&device("a")).await.unwrap();
        mirror.upsert_device(&device("b")).await.unwrap();

        let mut renamed = device("a");
        renamed.name = "Alpha".into();
        mirror.upsert_device(&renamed).await.unwrap();

        let image = mirror.image().await;
        let names: Vec<&str> = image.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "B"]);
    }

    #[tokio::test]
    async fn test_device_removal_drops_its_connections() {
        let mirror = MemoryMirror::new();
        for id in ["a", "b", "c"] {
            mirror.upsert_device(&device(id)).await.unwrap();
        }
        mirror.upsert_connection(&connection("c1", "a", "b")).await.unwrap();
        mirror.upsert_connection(&connection("c2", "b", "c")).await.unwrap();

        mirror.remove_device(&"c".into()).await.unwrap();

        let image = mirror.image().await;
        assert_eq!(image.devices.len(), 2);
        assert_eq!(image.connections.len(), 1);
        assert_eq!(image.connections[0].id, ConnectionId::new("c1"));
    }

    #[tokio::test]
    async fn test_connections_carry_interface_links() {
        let mirror = MemoryMirror::new();
        for id in ["a", "b", "c"] {
            mirror.upsert_device(&device(id)).await.unwrap();
        }
        let mut link = connection("c1", "a", "b");
        mirror.upsert_connection(&link).await.unwrap();
        mirror.upsert_connection(&connection("c2", "b", "c")).await.unwrap();

        let image = mirror.image().await;
        let eth0 = image.device(&"a".into()).unwrap().interface("eth0").unwrap();
        assert_eq!(eth0.status, InterfaceStatus::Up);
        assert_eq!(eth0.connected_to.as_deref(), Some("if0"));

        link.status = ConnectionStatus::Disconnected;
        mirror.upsert_connection(&link).await.unwrap();
        let image = mirror.image().await;
        let eth0 = image.device(&"a".into()).unwrap().interface("eth0").unwrap();
        assert_eq!(eth0.status, InterfaceStatus::Down);

        mirror.remove_device(&"b".into()).await.unwrap();
        let image = mirror.image().await;
        assert!(image.connections.is_empty());
        let eth0 = image.device(&"c".into()).unwrap().interface("eth0").unwrap();
        assert!(eth0.connected_to.is_none());
    }

    #[tokio::test]
    async fn test_remove_packet() {
        let mirror = MemoryMirror::new();
        let packet = PacketFlow::new(PacketSpec::new("a", "b", Protocol::Icmp));
        mirror.record_packet(&packet).await.unwrap();

        mirror.remove_packet(&packet.id).await.unwrap();
        mirror.remove_packet(&packet.id).await.unwrap();

        assert!(mirror.image().await.packets.is_empty());
    }

    #[tokio::test]
    async fn test_reset_takes_devices_offline() {
        let mirror = MemoryMirror::new();
        mirror.upsert_device(&device("a")).await.unwrap();
        mirror.set_device_status(&"a".into(), DeviceStatus::Online).await.unwrap();
        mirror.set_running(true).await.unwrap();

        mirror.reset().await.unwrap();

        let image = mirror.image().await;
        assert_eq!(image.devices[0].status, DeviceStatus::Offline);
        assert!(!image.is_running);
    }
}
