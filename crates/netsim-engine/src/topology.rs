//! Topology store: devices, connections, and their interface links
//!
//! Every mutation is validated in full before anything is written, so a
//! rejected request leaves the state exactly as it was. Each successful
//! mutation emits one `topology-changed` event per affected entity.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use netsim_core::{
    Connection, ConnectionId, ConnectionSpec, ConnectionStatus, Device, DeviceId, DeviceSpec, DeviceStatus,
    DeviceUpdate, EngineError, EngineEvent, EngineResult, Entity, SimulationState,
    TopologyChange, build_interfaces,
};

use crate::broadcast::EventBroadcaster;

/// Mutating view over the devices and connections of a state
pub struct TopologyStore<'a> {
    state: &'a mut SimulationState,
    events: &'a EventBroadcaster,
}

impl<'a> TopologyStore<'a> {
    pub fn new(state: &'a mut SimulationState, events: &'a EventBroadcaster) -> Self {
        Self { state, events }
    }

    /// Place a new device under a freshly generated id, status `offline`
    pub fn add_device(&mut self, spec: DeviceSpec) -> EngineResult<Device> {
        let device = spec.into_device(DeviceId::generate());
        device.validate()?;

        info!(device_id = %device.id, kind = %device.kind, name = %device.name, "Device added");
        self.state.devices.push(device.clone());
        self.events.emit(EngineEvent::topology(TopologyChange::DeviceAdded {
            device: device.clone(),
        }));
        Ok(device)
    }

    /// Remove a device and every connection touching it.
    ///
    /// Cascaded connection removals are announced before the device removal.
    pub fn remove_device(&mut self, id: &DeviceId) -> EngineResult<()> {
        let index = self
            .state
            .devices
            .iter()
            .position(|d| &d.id == id)
            .ok_or_else(|| EngineError::not_found(Entity::Device, id))?;

        let cascaded: Vec<ConnectionId> = self.state.connections_of(id).map(|c| c.id.clone()).collect();
        for connection_id in &cascaded {
            self.detach_connection(connection_id);
        }

        self.state.devices.remove(index);
        info!(device_id = %id, cascaded = cascaded.len(), "Device removed");
        self.events.emit(EngineEvent::topology(TopologyChange::DeviceRemoved {
            device_id: id.clone(),
        }));
        Ok(())
    }

    /// Merge a partial update into a device.
    ///
    /// The kind cannot change. A status change is announced on
    /// `device-status-changed` as well.
    pub fn update_device(&mut self, id: &DeviceId, update: DeviceUpdate) -> EngineResult<Device> {
        let current = self
            .state
            .device(id)
            .ok_or_else(|| EngineError::not_found(Entity::Device, id))?;

        let mut updated = current.clone();
        let previous_status = current.status;
        let relink = update.interfaces.is_some();

        if let Some(name) = update.name {
            updated.name = name;
        }
        if let Some(position) = update.position {
            updated.position = position;
        }
        if let Some(interfaces) = update.interfaces {
            updated.interfaces = build_interfaces(interfaces);
        }
        if let Some(status) = update.status {
            updated.status = status;
        }
        if let Some(config) = update.config {
            updated.config = Some(config);
        }
        updated.validate()?;

        if let Some(slot) = self.state.device_mut(id) {
            *slot = updated;
        }
        if relink {
            let touching: Vec<Connection> = self.state.connections_of(id).cloned().collect();
            for connection in &touching {
                self.state.link_interfaces(connection);
            }
        }

        let device = self
            .state
            .device(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(Entity::Device, id))?;
        debug!(device_id = %id, "Device updated");

        if device.status != previous_status {
            self.events.emit(EngineEvent::device_status(id.clone(), device.status));
        }
        self.events.emit(EngineEvent::topology(TopologyChange::DeviceUpdated {
            device: device.clone(),
        }));
        Ok(device)
    }

    /// Cable two existing devices together. Interface availability is not
    /// checked; interfaces that do exist are marked up and linked.
    pub fn add_connection(&mut self, spec: ConnectionSpec) -> EngineResult<Connection> {
        if spec.source_device_id == spec.target_device_id {
            return Err(EngineError::invalid(format!(
                "a device cannot be connected to itself: {}",
                spec.source_device_id
            )));
        }
        for endpoint in [&spec.source_device_id, &spec.target_device_id] {
            if !self.state.contains_device(endpoint) {
                return Err(EngineError::not_found(Entity::Device, endpoint));
            }
        }

        let connection = Connection {
            id: ConnectionId::generate(),
            source_device_id: spec.source_device_id,
            target_device_id: spec.target_device_id,
            source_interface: spec.source_interface,
            target_interface: spec.target_interface,
            status: ConnectionStatus::Connected,
            created_at: Utc::now(),
        };
        self.state.link_interfaces(&connection);
        self.state.connections.push(connection.clone());

        info!(
            connection_id = %connection.id,
            source = %connection.source_device_id,
            destination = %connection.target_device_id,
            "Connection added"
        );
        self.events.emit(EngineEvent::topology(TopologyChange::ConnectionAdded {
            connection: connection.clone(),
        }));
        Ok(connection)
    }

    pub fn remove_connection(&mut self, id: &ConnectionId) -> EngineResult<()> {
        if self.state.connection(id).is_none() {
            return Err(EngineError::not_found(Entity::Connection, id));
        }
        self.detach_connection(id);
        info!(connection_id = %id, "Connection removed");
        Ok(())
    }

    /// Bring a connection up or down. Only connected links carry packets.
    pub fn set_connection_status(&mut self, id: &ConnectionId, status: ConnectionStatus) -> EngineResult<Connection> {
        let connection = self
            .state
            .connection_mut(id)
            .ok_or_else(|| EngineError::not_found(Entity::Connection, id))?;
        connection.status = status;
        let connection = connection.clone();
        self.state.link_interfaces(&connection);

        debug!(connection_id = %id, ?status, "Connection status changed");
        self.events.emit(EngineEvent::topology(TopologyChange::ConnectionUpdated {
            connection: connection.clone(),
        }));
        Ok(connection)
    }

    /// Set a device status from its wire name
    pub fn update_device_status(&mut self, id: &DeviceId, status: &str) -> EngineResult<()> {
        let status: DeviceStatus = status.parse()?;
        self.set_device_status(id, status)
    }

    pub fn set_device_status(&mut self, id: &DeviceId, status: DeviceStatus) -> EngineResult<()> {
        let device = self
            .state
            .device_mut(id)
            .ok_or_else(|| EngineError::not_found(Entity::Device, id))?;
        device.status = status;

        debug!(device_id = %id, %status, "Device status changed");
        self.events.emit(EngineEvent::device_status(id.clone(), status));
        Ok(())
    }

    /// Replace devices and connections wholesale. Connections whose
    /// endpoints are missing from `devices` are skipped.
    ///
    /// Returns the number of devices and connections kept.
    pub fn restore(&mut self, devices: Vec<Device>, connections: Vec<Connection>) -> EngineResult<(usize, usize)> {
        let mut device_ids = HashSet::new();
        for device in &devices {
            device.validate()?;
            if !device_ids.insert(&device.id) {
                return Err(EngineError::invalid(format!("duplicate device id: {}", device.id)));
            }
        }
        let mut connection_ids = HashSet::new();
        for connection in &connections {
            if !connection_ids.insert(&connection.id) {
                return Err(EngineError::invalid(format!("duplicate connection id: {}", connection.id)));
            }
        }

        self.state.devices = devices;
        self.state.connections.clear();
        for connection in connections {
            let known = self.state.contains_device(&connection.source_device_id)
                && self.state.contains_device(&connection.target_device_id);
            if known {
                self.state.link_interfaces(&connection);
                self.state.connections.push(connection);
            } else {
                warn!(connection_id = %connection.id, "Skipping connection with unknown endpoint");
            }
        }

        let counts = (self.state.devices.len(), self.state.connections.len());
        info!(devices = counts.0, connections = counts.1, "Topology restored");
        self.events.emit(EngineEvent::topology(TopologyChange::Restored {
            devices: counts.0,
            connections: counts.1,
        }));
        Ok(counts)
    }

    /// Remove a connection known to exist, unlink its interfaces and
    /// announce it
    fn detach_connection(&mut self, id: &ConnectionId) {
        let Some(index) = self.state.connections.iter().position(|c| &c.id == id) else {
            return;
        };
        let connection = self.state.connections.remove(index);
        self.state.unlink_interfaces(&connection);
        self.events.emit(EngineEvent::topology(TopologyChange::ConnectionRemoved {
            connection_id: connection.id,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsim_core::{DeviceConfig, DeviceKind, EventKind, InterfaceSpec, InterfaceStatus};
    use tokio::sync::broadcast::Receiver;

    fn drain(rx: &mut Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn three_devices(store: &mut TopologyStore<'_>) -> (DeviceId, DeviceId, DeviceId) {
        let r1 = store.add_device(DeviceSpec::new(DeviceKind::Router, "R1")).unwrap().id;
        let s1 = store.add_device(DeviceSpec::new(DeviceKind::Switch, "S1")).unwrap().id;
        let pc1 = store.add_device(DeviceSpec::new(DeviceKind::Pc, "PC1")).unwrap().id;
        (r1, s1, pc1)
    }

    #[test]
    fn test_add_device_defaults_offline_with_unique_id() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut rx = events.subscribe_all();
        let mut store = TopologyStore::new(&mut state, &events);

        let a = store.add_device(DeviceSpec::new(DeviceKind::Pc, "PC1")).unwrap();
        let b = store.add_device(DeviceSpec::new(DeviceKind::Pc, "PC1")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, DeviceStatus::Offline);
        assert_eq!(state.devices.len(), 2);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_add_device_rejects_mismatched_config() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let spec = DeviceSpec::new(DeviceKind::Pc, "PC1").with_config(DeviceConfig::Switch {
            hostname: None,
            vlans: vec![10],
        });
        let err = store.add_device(spec).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(state.devices.is_empty());
    }

    #[test]
    fn test_remove_device_cascades_connections() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut rx = events.subscribe_all();
        let mut store = TopologyStore::new(&mut state, &events);

        let (r1, s1, pc1) = three_devices(&mut store);
        store.add_connection(ConnectionSpec::new(r1.clone(), s1.clone())).unwrap();
        store.add_connection(ConnectionSpec::new(s1.clone(), pc1.clone())).unwrap();
        drain(&mut rx);

        store.remove_device(&s1).unwrap();

        assert!(state.connections.iter().all(|c| !c.touches(&s1)));
        assert!(state.connections.is_empty());
        let changes: Vec<TopologyChange> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::TopologyChanged(t) => Some(t.change),
                _ => None,
            })
            .collect();
        assert_eq!(changes.len(), 3);
        assert!(matches!(changes[0], TopologyChange::ConnectionRemoved { .. }));
        assert!(matches!(changes[1], TopologyChange::ConnectionRemoved { .. }));
        assert_eq!(changes[2], TopologyChange::DeviceRemoved { device_id: s1 });
    }

    #[test]
    fn test_remove_missing_device_is_not_found() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let err = store.remove_device(&DeviceId::new("ghost")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Device, .. }));
    }

    #[test]
    fn test_update_device_merges_fields() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut rx = events.subscribe_all();
        let mut store = TopologyStore::new(&mut state, &events);

        let r1 = store.add_device(DeviceSpec::new(DeviceKind::Router, "R1").at(1.0, 2.0)).unwrap();
        drain(&mut rx);

        let updated = store
            .update_device(
                &r1.id,
                DeviceUpdate {
                    name: Some("Edge".into()),
                    status: Some(DeviceStatus::Online),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Edge");
        assert_eq!(updated.position, r1.position);
        assert_eq!(updated.status, DeviceStatus::Online);
        let kinds: Vec<EventKind> = drain(&mut rx).iter().map(EngineEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::DeviceStatusChanged, EventKind::TopologyChanged]);
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let pc = store.add_device(DeviceSpec::new(DeviceKind::Pc, "PC1")).unwrap();
        let err = store
            .update_device(
                &pc.id,
                DeviceUpdate {
                    name: Some("Renamed".into()),
                    config: Some(DeviceConfig::Router {
                        hostname: None,
                        routing_table: vec![],
                    }),
                    ..Default::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert_eq!(state.device(&pc.id).unwrap().name, "PC1");
    }

    #[test]
    fn test_connection_links_interfaces() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let (r1, s1, _) = three_devices(&mut store);
        let connection = store
            .add_connection(ConnectionSpec::new(r1.clone(), s1.clone()).via("GigabitEthernet0/0", "FastEthernet0/1"))
            .unwrap();
        assert_eq!(connection.status, ConnectionStatus::Connected);

        let router_iface = state.device(&r1).unwrap().interface("GigabitEthernet0/0").unwrap();
        assert_eq!(router_iface.status, InterfaceStatus::Up);
        assert_eq!(router_iface.connected_to.as_deref(), Some("if0"));

        let mut store = TopologyStore::new(&mut state, &events);
        store.remove_connection(&connection.id).unwrap();
        let router_iface = state.device(&r1).unwrap().interface("if0").unwrap();
        assert_eq!(router_iface.status, InterfaceStatus::Down);
        assert!(router_iface.connected_to.is_none());
    }

    #[test]
    fn test_add_connection_validates_endpoints() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let (r1, _, _) = three_devices(&mut store);
        let self_loop = store.add_connection(ConnectionSpec::new(r1.clone(), r1.clone()));
        assert!(matches!(self_loop, Err(EngineError::InvalidArgument(_))));

        let dangling = store.add_connection(ConnectionSpec::new(r1, "ghost"));
        assert!(matches!(dangling, Err(EngineError::NotFound { .. })));
        assert!(state.connections.is_empty());
    }

    #[test]
    fn test_connection_status_toggles_interfaces() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let (r1, s1, _) = three_devices(&mut store);
        let connection = store
            .add_connection(ConnectionSpec::new(r1.clone(), s1.clone()).via("GigabitEthernet0/0", "FastEthernet0/1"))
            .unwrap();
        let mut rx = events.subscribe_topology();

        let updated = store
            .set_connection_status(&connection.id, ConnectionStatus::Disconnected)
            .unwrap();
        assert_eq!(updated.status, ConnectionStatus::Disconnected);
        assert!(matches!(
            rx.try_recv().unwrap().change,
            TopologyChange::ConnectionUpdated { .. }
        ));

        let missing = store.set_connection_status(&"c-x".into(), ConnectionStatus::Connected);
        assert!(matches!(missing, Err(EngineError::NotFound { .. })));

        let router_iface = state.device(&r1).unwrap().interface("if0").unwrap();
        assert_eq!(router_iface.status, InterfaceStatus::Down);

        let mut store = TopologyStore::new(&mut state, &events);
        store.set_connection_status(&connection.id, ConnectionStatus::Connected).unwrap();
        let switch_iface = state.device(&s1).unwrap().interface("FastEthernet0/1").unwrap();
        assert_eq!(switch_iface.status, InterfaceStatus::Up);
    }

    #[test]
    fn test_restore_relinks_interfaces() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let (r1, _, pc1) = three_devices(&mut store);
        let connection = store
            .add_connection(ConnectionSpec::new(r1.clone(), pc1.clone()).via("GigabitEthernet0/0", "eth0"))
            .unwrap();

        // Devices as a mirror that only saw the device events would hold them
        let mut devices = state.devices.clone();
        for device in &mut devices {
            for iface in &mut device.interfaces {
                iface.status = InterfaceStatus::Down;
                iface.connected_to = None;
            }
        }

        let mut store = TopologyStore::new(&mut state, &events);
        let counts = store.restore(devices, vec![connection]).unwrap();
        assert_eq!(counts, (3, 1));

        let router_iface = state.device(&r1).unwrap().interface("GigabitEthernet0/0").unwrap();
        assert_eq!(router_iface.status, InterfaceStatus::Up);
        assert_eq!(router_iface.connected_to.as_deref(), Some("if0"));
        let pc_iface = state.device(&pc1).unwrap().interface("eth0").unwrap();
        assert_eq!(pc_iface.connected_to.as_deref(), Some("if0"));
    }

    #[test]
    fn test_restore_rejects_duplicate_ids() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let (r1, s1, _) = three_devices(&mut store);
        let connection = store.add_connection(ConnectionSpec::new(r1.clone(), s1)).unwrap();
        let router = state.device(&r1).unwrap().clone();
        let before = state.clone();

        let mut store = TopologyStore::new(&mut state, &events);
        let twice = store.restore(vec![router.clone(), router.clone()], vec![]);
        assert!(matches!(twice, Err(EngineError::InvalidArgument(_))));

        let devices = before.devices.clone();
        let twice = store.restore(devices, vec![connection.clone(), connection]);
        assert!(matches!(twice, Err(EngineError::InvalidArgument(_))));

        assert_eq!(state, before);
    }

    #[test]
    fn test_device_status_rejects_unknown_value() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut rx = events.subscribe_device_status();
        let mut store = TopologyStore::new(&mut state, &events);

        let pc = store.add_device(DeviceSpec::new(DeviceKind::Pc, "PC1")).unwrap();
        let err = store.update_device_status(&pc.id, "sleeping").unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(rx.try_recv().is_err());

        store.update_device_status(&pc.id, "online").unwrap();
        assert_eq!(rx.try_recv().unwrap().status, DeviceStatus::Online);
        assert_eq!(state.device(&pc.id).unwrap().status, DeviceStatus::Online);
    }

    #[test]
    fn test_interface_replacement_relinks() {
        let mut state = SimulationState::new();
        let events = EventBroadcaster::new(16);
        let mut store = TopologyStore::new(&mut state, &events);

        let (r1, s1, _) = three_devices(&mut store);
        store
            .add_connection(ConnectionSpec::new(r1.clone(), s1.clone()).via("uplink", "FastEthernet0/1"))
            .unwrap();
        store
            .update_device(
                &r1,
                DeviceUpdate {
                    interfaces: Some(vec![InterfaceSpec::named("uplink").with_address("10.0.0.1", "255.255.255.0")]),
                    ..Default::default()
                },
            )
            .unwrap();

        let uplink = state.device(&r1).unwrap().interface("uplink").unwrap();
        assert_eq!(uplink.status, InterfaceStatus::Up);
        let switch_port = state.device(&s1).unwrap().interface("FastEthernet0/1").unwrap();
        assert_eq!(switch_port.connected_to.as_deref(), Some("if0"));
    }
}
