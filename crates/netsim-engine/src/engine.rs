//! The engine handle
//!
//! [`NetworkEngine`] owns the single [`SimulationState`] behind an async
//! read/write lock. Every mutating operation takes the write lock for its
//! whole duration, so mutations, packet creation, and reads never
//! interleave. Events are emitted while the lock is held, which keeps their
//! order identical to the order of the mutations; emission itself never
//! waits on subscribers.
//!
//! The only deferred work is the settle timer of a transmitted packet. It
//! runs on its own task, holds a weak reference to the engine, and is
//! cancelled when its packet is removed, reset, or replaced by a restore.

use std::pin::Pin;
use std::sync::{Arc, Weak};

use futures::Stream;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, debug_span, field, info};

use netsim_core::{
    Connection, ConnectionId, ConnectionSpec, ConnectionStatus, Device, DeviceId, DeviceSpec, DeviceStatus,
    DeviceStatusChanged, DeviceUpdate, EngineError, EngineEvent, EngineResult, Entity, EventKind, PacketFlow,
    PacketFlowEvent, PacketId, PacketSpec, Protocol, SimulationState, SimulationStateChanged, SimulationStats,
    TopologyChanged,
};
use netsim_logging::{fields, spans};

use crate::broadcast::{EventBroadcaster, broadcast_to_stream};
use crate::config::EngineConfig;
use crate::controller::SimulationController;
use crate::packets::{PacketLifecycle, SettleTimers, needs_settle, traceroute_hops};
use crate::path;
use crate::topology::TopologyStore;

struct Shared {
    state: RwLock<SimulationState>,
    events: EventBroadcaster,
    timers: SettleTimers,
    config: EngineConfig,
}

/// Cheaply cloneable handle to a running simulation engine
#[derive(Clone)]
pub struct NetworkEngine {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for NetworkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkEngine")
            .field("config", &self.shared.config)
            .field("pending_settles", &self.shared.timers.pending())
            .finish()
    }
}

impl Default for NetworkEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl NetworkEngine {
    /// Create an engine holding the configured seed topology
    pub fn new(config: EngineConfig) -> Self {
        let state = config.seed.build();
        info!(
            seed = ?config.seed,
            devices = state.devices.len(),
            connections = state.connections.len(),
            settle_delay_ms = config.settle_delay_ms,
            "Engine created"
        );
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                events: EventBroadcaster::new(config.event_channel_capacity),
                timers: SettleTimers::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.shared.events
    }

    fn topology<'a>(&'a self, state: &'a mut SimulationState) -> TopologyStore<'a> {
        TopologyStore::new(state, &self.shared.events)
    }

    fn lifecycle<'a>(&'a self, state: &'a mut SimulationState) -> PacketLifecycle<'a> {
        PacketLifecycle::new(state, &self.shared.events, self.shared.config.path_strategy)
    }

    fn controller<'a>(&'a self, state: &'a mut SimulationState) -> SimulationController<'a> {
        SimulationController::new(state, &self.shared.events)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn devices(&self) -> Vec<Device> {
        self.shared.state.read().await.devices.clone()
    }

    pub async fn device(&self, id: &DeviceId) -> EngineResult<Device> {
        self.shared
            .state
            .read()
            .await
            .device(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(Entity::Device, id))
    }

    pub async fn connections(&self) -> Vec<Connection> {
        self.shared.state.read().await.connections.clone()
    }

    pub async fn connection(&self, id: &ConnectionId) -> EngineResult<Connection> {
        self.shared
            .state
            .read()
            .await
            .connection(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(Entity::Connection, id))
    }

    pub async fn packet(&self, id: &PacketId) -> EngineResult<PacketFlow> {
        self.shared
            .state
            .read()
            .await
            .packet(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(Entity::Packet, id))
    }

    /// Every packet ever created since the last reset, in creation order.
    ///
    /// The returned vector is a copy; later changes do not show up in it.
    pub async fn history(&self) -> Vec<PacketFlow> {
        self.shared.state.read().await.packets.clone()
    }

    /// Copy of the whole state
    pub async fn snapshot(&self) -> SimulationState {
        self.shared.state.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.shared.state.read().await.is_running
    }

    pub async fn stats(&self) -> SimulationStats {
        self.shared.state.read().await.stats()
    }

    /// Number of settle timers that have not fired yet
    pub fn pending_settles(&self) -> usize {
        self.shared.timers.pending()
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    pub async fn add_device(&self, spec: DeviceSpec) -> EngineResult<Device> {
        let mut state = self.shared.state.write().await;
        self.topology(&mut state).add_device(spec)
    }

    /// Remove a device together with every connection touching it
    pub async fn remove_device(&self, id: &DeviceId) -> EngineResult<()> {
        let mut state = self.shared.state.write().await;
        self.topology(&mut state).remove_device(id)
    }

    pub async fn update_device(&self, id: &DeviceId, update: DeviceUpdate) -> EngineResult<Device> {
        let mut state = self.shared.state.write().await;
        self.topology(&mut state).update_device(id, update)
    }

    /// Set a device status from its wire name (`online`, `offline`, `error`)
    pub async fn update_device_status(&self, id: &DeviceId, status: &str) -> EngineResult<()> {
        let mut state = self.shared.state.write().await;
        self.topology(&mut state).update_device_status(id, status)
    }

    pub async fn set_device_status(&self, id: &DeviceId, status: DeviceStatus) -> EngineResult<()> {
        let mut state = self.shared.state.write().await;
        self.topology(&mut state).set_device_status(id, status)
    }

    pub async fn add_connection(&self, spec: ConnectionSpec) -> EngineResult<Connection> {
        let mut state = self.shared.state.write().await;
        self.topology(&mut state).add_connection(spec)
    }

    pub async fn remove_connection(&self, id: &ConnectionId) -> EngineResult<()> {
        let mut state = self.shared.state.write().await;
        self.topology(&mut state).remove_connection(id)
    }

    pub async fn set_connection_status(&self, id: &ConnectionId, status: ConnectionStatus) -> EngineResult<Connection> {
        let mut state = self.shared.state.write().await;
        self.topology(&mut state).set_connection_status(id, status)
    }

    /// Replace devices and connections with those of `snapshot`.
    ///
    /// Packet history is cleared, outstanding settle timers are cancelled,
    /// and the simulation is left stopped.
    pub async fn restore(&self, snapshot: SimulationState) -> EngineResult<(usize, usize)> {
        let mut state = self.shared.state.write().await;
        let counts = self
            .topology(&mut state)
            .restore(snapshot.devices, snapshot.connections)?;

        let cancelled = self.shared.timers.cancel_all();
        state.packets.clear();
        if state.is_running {
            self.controller(&mut state).stop();
        }
        debug!(cancelled, "Restore cancelled pending settles");
        Ok(counts)
    }

    // ------------------------------------------------------------------
    // Paths and packets
    // ------------------------------------------------------------------

    /// Resolve a path with the configured strategy. Empty when unreachable.
    pub async fn resolve_path(&self, source: &DeviceId, destination: &DeviceId) -> Vec<DeviceId> {
        let span = debug_span!(spans::RESOLVE_PATH, source = %source, destination = %destination);
        async {
            let state = self.shared.state.read().await;
            let path = path::resolve_path(&state, source, destination, self.shared.config.path_strategy);
            debug!(hops = path.len(), "Path resolved");
            path
        }
        .instrument(span)
        .await
    }

    /// Create a packet. An unreachable destination yields a `dropped`
    /// packet, not an error.
    pub async fn send_packet(&self, spec: PacketSpec) -> EngineResult<PacketFlow> {
        let span = debug_span!(
            spans::SEND_PACKET,
            source = %spec.source,
            destination = %spec.destination,
            hop_count = field::Empty,
        );
        self.create_packet(spec).instrument(span).await
    }

    async fn create_packet(&self, spec: PacketSpec) -> EngineResult<PacketFlow> {
        let mut state = self.shared.state.write().await;
        self.ensure_running(&state)?;

        let packet = self.lifecycle(&mut state).create_packet(spec);
        Span::current().record(fields::HOP_COUNT, packet.hop_count());
        if needs_settle(packet.status()) {
            self.schedule_settle(packet.id.clone());
        }
        Ok(packet)
    }

    /// One ICMP packet from `source` to `destination`
    pub async fn ping(&self, source: &DeviceId, destination: &DeviceId) -> EngineResult<PacketFlow> {
        self.send_packet(PacketSpec::new(source.clone(), destination.clone(), Protocol::Icmp))
            .await
    }

    /// One ICMP packet per hop along the resolved path, in path order.
    ///
    /// Empty when the path has fewer than two devices.
    pub async fn traceroute(&self, source: &DeviceId, destination: &DeviceId) -> EngineResult<Vec<PacketFlow>> {
        let span = debug_span!(spans::TRACEROUTE, source = %source, destination = %destination);
        self.create_hops(source, destination).instrument(span).await
    }

    async fn create_hops(&self, source: &DeviceId, destination: &DeviceId) -> EngineResult<Vec<PacketFlow>> {
        let mut state = self.shared.state.write().await;
        self.ensure_running(&state)?;

        let route = path::resolve_path(&state, source, destination, self.shared.config.path_strategy);
        let mut packets = Vec::with_capacity(route.len().saturating_sub(1));
        for hop in traceroute_hops(&route) {
            let packet = self.lifecycle(&mut state).create_packet(hop);
            if needs_settle(packet.status()) {
                self.schedule_settle(packet.id.clone());
            }
            packets.push(packet);
        }
        debug!(hops = packets.len(), "Traceroute sent");
        Ok(packets)
    }

    /// Remove a packet from history and cancel its settle timer
    pub async fn remove_packet(&self, id: &PacketId) -> EngineResult<PacketFlow> {
        let mut state = self.shared.state.write().await;
        let removed = self.lifecycle(&mut state).remove_packet(id)?;
        self.shared.timers.cancel(id);
        debug!(packet_id = %id, "Packet removed");
        Ok(removed)
    }

    fn ensure_running(&self, state: &SimulationState) -> EngineResult<()> {
        if self.shared.config.require_running && !state.is_running {
            return Err(EngineError::SimulationStopped);
        }
        Ok(())
    }

    fn schedule_settle(&self, id: PacketId) {
        let engine: Weak<Shared> = Arc::downgrade(&self.shared);
        let packet_id = id.clone();
        self.shared
            .timers
            .schedule(id, self.shared.config.settle_delay(), async move {
                if let Some(shared) = engine.upgrade() {
                    NetworkEngine { shared }.settle_packet(&packet_id).await;
                }
            });
    }

    async fn settle_packet(&self, id: &PacketId) -> bool {
        let mut state = self.shared.state.write().await;
        self.shared.timers.complete(id);
        self.lifecycle(&mut state).settle(id)
    }

    // ------------------------------------------------------------------
    // Simulation control
    // ------------------------------------------------------------------

    pub async fn start(&self) {
        let mut state = self.shared.state.write().await;
        self.controller(&mut state).start();
    }

    pub async fn stop(&self) {
        let mut state = self.shared.state.write().await;
        self.controller(&mut state).stop();
    }

    /// Clear history, stop, take every device offline, and cancel every
    /// outstanding settle timer
    pub async fn reset(&self) {
        let span = debug_span!(spans::RESET);
        async {
            let mut state = self.shared.state.write().await;
            let cancelled = self.shared.timers.cancel_all();
            let cleared = self.controller(&mut state).reset();
            debug!(cancelled, cleared, "Reset complete");
        }
        .instrument(span)
        .await
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe_topology(&self) -> broadcast::Receiver<TopologyChanged> {
        self.shared.events.subscribe_topology()
    }

    pub fn subscribe_device_status(&self) -> broadcast::Receiver<DeviceStatusChanged> {
        self.shared.events.subscribe_device_status()
    }

    pub fn subscribe_packet_flow(&self) -> broadcast::Receiver<PacketFlowEvent> {
        self.shared.events.subscribe_packet_flow()
    }

    pub fn subscribe_simulation(&self) -> broadcast::Receiver<SimulationStateChanged> {
        self.shared.events.subscribe_simulation()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe_all()
    }

    /// Every event from now on, as a stream
    pub fn event_stream(&self) -> Pin<Box<dyn Stream<Item = EngineEvent> + Send>> {
        broadcast_to_stream(self.subscribe_all())
    }

    /// Run `handler` on its own task for every event of `kind`
    /// (every event when `None`). Handler panics stay inside the task.
    pub fn on_event<F>(&self, name: impl Into<String>, kind: Option<EventKind>, handler: F) -> JoinHandle<()>
    where
        F: FnMut(EngineEvent) + Send + 'static,
    {
        self.shared.events.spawn_subscriber(name, kind, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::SeedTopology;
    use netsim_core::{DeviceKind, PacketStatus};

    #[tokio::test]
    async fn test_demo_seed_ping() {
        let engine = NetworkEngine::new(EngineConfig::default().with_seed(SeedTopology::Demo));
        let packet = engine.ping(&"pc1".into(), &"srv1".into()).await.unwrap();

        assert_eq!(packet.status(), PacketStatus::Transmitted);
        let path: Vec<&str> = packet.path().iter().map(DeviceId::as_str).collect();
        assert_eq!(path, vec!["pc1", "s1", "r1", "srv1"]);
        assert_eq!(engine.pending_settles(), 1);
    }

    #[tokio::test]
    async fn test_history_is_a_copy() {
        let engine = NetworkEngine::default();
        let a = engine.add_device(DeviceSpec::new(DeviceKind::Pc, "A")).await.unwrap();
        let b = engine.add_device(DeviceSpec::new(DeviceKind::Pc, "B")).await.unwrap();

        engine.ping(&a.id, &b.id).await.unwrap();
        let history = engine.history().await;
        engine.ping(&a.id, &b.id).await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(engine.history().await.len(), 2);
        assert_eq!(history[0].status(), PacketStatus::Dropped);
    }

    #[tokio::test]
    async fn test_running_gate() {
        let engine = NetworkEngine::new(EngineConfig::default().with_require_running(true));
        let a = engine.add_device(DeviceSpec::new(DeviceKind::Pc, "A")).await.unwrap();

        let err = engine.ping(&a.id, &a.id).await.unwrap_err();
        assert_eq!(err, EngineError::SimulationStopped);
        assert!(engine.history().await.is_empty());

        engine.start().await;
        tokio_test::assert_ok!(engine.ping(&a.id, &a.id).await);
    }

    #[tokio::test]
    async fn test_missing_lookups() {
        let engine = NetworkEngine::default();
        assert!(matches!(
            engine.packet(&PacketId::new("pkt-x")).await,
            Err(EngineError::NotFound { entity: Entity::Packet, .. })
        ));
        assert!(matches!(
            engine.connection(&ConnectionId::new("c-x")).await,
            Err(EngineError::NotFound { entity: Entity::Connection, .. })
        ));
        tokio_test::assert_err!(engine.remove_packet(&PacketId::new("pkt-x")).await);
    }
}
