//! Packet lifecycle: creation, path assignment, and the deferred settle
//!
//! Path resolution happens once, synchronously, when the packet is created.
//! A packet with a path leaves creation `transmitted` and has a settle
//! timer scheduled; a packet without one is `dropped` on the spot and never
//! gets a timer.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tracing::{Instrument, debug, debug_span, trace};

use netsim_core::{
    DeviceId, EngineError, EngineEvent, EngineResult, Entity, PacketFlow, PacketId, PacketSpec, PacketStatus,
    Protocol, SimulationState,
};
use netsim_logging::spans;

use crate::broadcast::EventBroadcaster;
use crate::path::{PathStrategy, resolve_path};

/// Mutating view over the packet history of a state
pub struct PacketLifecycle<'a> {
    state: &'a mut SimulationState,
    events: &'a EventBroadcaster,
    strategy: PathStrategy,
}

impl<'a> PacketLifecycle<'a> {
    pub fn new(state: &'a mut SimulationState, events: &'a EventBroadcaster, strategy: PathStrategy) -> Self {
        Self {
            state,
            events,
            strategy,
        }
    }

    /// Create a packet, resolve its path, record it, and announce it
    pub fn create_packet(&mut self, spec: PacketSpec) -> PacketFlow {
        let mut packet = PacketFlow::new(spec);
        let path = resolve_path(self.state, &packet.source, &packet.destination, self.strategy);
        let status = packet.assign_path(path);

        debug!(
            packet_id = %packet.id,
            source = %packet.source,
            destination = %packet.destination,
            protocol = ?packet.protocol,
            ?status,
            hop_count = packet.hop_count(),
            "Packet created"
        );
        self.state.packets.push(packet.clone());
        self.events.emit(EngineEvent::packet(packet.clone()));
        packet
    }

    /// Move a transmitted packet to `received`.
    ///
    /// Returns false when the packet is gone or already terminal, in which
    /// case nothing is emitted.
    pub fn settle(&mut self, id: &PacketId) -> bool {
        let Some(packet) = self.state.packet_mut(id) else {
            trace!(packet_id = %id, "Settle for a packet no longer in history");
            return false;
        };
        if !packet.settle() {
            return false;
        }
        let packet = packet.clone();
        debug!(packet_id = %id, "Packet received");
        self.events.emit(EngineEvent::packet(packet));
        true
    }

    /// Drop a packet from history
    pub fn remove_packet(&mut self, id: &PacketId) -> EngineResult<PacketFlow> {
        let index = self
            .state
            .packets
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| EngineError::not_found(Entity::Packet, id))?;
        let packet = self.state.packets.remove(index);
        self.events.emit(EngineEvent::packet_removed(packet.clone()));
        Ok(packet)
    }
}

/// One ICMP packet spec per consecutive pair of devices along `path`.
///
/// Paths shorter than two devices yield nothing.
pub fn traceroute_hops(path: &[DeviceId]) -> Vec<PacketSpec> {
    path.windows(2)
        .map(|hop| PacketSpec::new(hop[0].clone(), hop[1].clone(), Protocol::Icmp))
        .collect()
}

/// Whether a packet in this status still needs a settle timer
pub(crate) fn needs_settle(status: PacketStatus) -> bool {
    status == PacketStatus::Transmitted
}

/// Outstanding settle timers, keyed by packet
#[derive(Debug, Default)]
pub struct SettleTimers {
    pending: DashMap<PacketId, AbortHandle>,
}

impl SettleTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_elapsed` after `delay` on its own task. Scheduling a packet
    /// that already has a timer replaces it.
    pub fn schedule<F>(&self, id: PacketId, delay: Duration, on_elapsed: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = debug_span!(spans::SETTLE_PACKET, packet_id = %id);
        let task = tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                on_elapsed.await;
            }
            .instrument(span),
        );
        if let Some(previous) = self.pending.insert(id, task.abort_handle()) {
            previous.abort();
        }
    }

    /// Forget a timer that has fired. Does not abort it.
    pub fn complete(&self, id: &PacketId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Abort the timer for `id`, if any
    pub fn cancel(&self, id: &PacketId) -> bool {
        match self.pending.remove(id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every outstanding timer; returns how many were aborted
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        self.pending.retain(|_, handle| {
            handle.abort();
            cancelled += 1;
            false
        });
        cancelled
    }

    /// Number of timers still outstanding
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use netsim_core::{Connection, ConnectionId, ConnectionStatus, DeviceKind, DeviceSpec};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn line() -> SimulationState {
        let mut state = SimulationState::new();
        for (id, kind) in [("r1", DeviceKind::Router), ("s1", DeviceKind::Switch), ("pc1", DeviceKind::Pc)] {
            state.devices.push(DeviceSpec::new(kind, id.to_uppercase()).into_device(id.into()));
        }
        for (i, (a, b)) in [("r1", "s1"), ("s1", "pc1")].into_iter().enumerate() {
            state.connections.push(Connection {
                id: ConnectionId::new(format!("c{i}")),
                source_device_id: a.into(),
                target_device_id: b.into(),
                source_interface: String::new(),
                target_interface: String::new(),
                status: ConnectionStatus::Connected,
                created_at: Utc::now(),
            });
        }
        state
    }

    #[test]
    fn test_reachable_packet_is_transmitted() {
        let mut state = line();
        let events = EventBroadcaster::new(8);
        let mut rx = events.subscribe_packet_flow();

        let packet = PacketLifecycle::new(&mut state, &events, PathStrategy::DepthFirst)
            .create_packet(PacketSpec::new("r1", "pc1", Protocol::Icmp));

        assert_eq!(packet.status(), PacketStatus::Transmitted);
        assert_eq!(packet.path(), &[DeviceId::new("r1"), "s1".into(), "pc1".into()]);
        assert_eq!(state.packets.len(), 1);
        assert_eq!(rx.try_recv().unwrap().packet.id, packet.id);
    }

    #[test]
    fn test_unreachable_packet_is_dropped_immediately() {
        let mut state = line();
        state.connections[1].status = ConnectionStatus::Disconnected;
        let events = EventBroadcaster::new(8);

        let packet = PacketLifecycle::new(&mut state, &events, PathStrategy::DepthFirst)
            .create_packet(PacketSpec::new("r1", "pc1", Protocol::Tcp));

        assert_eq!(packet.status(), PacketStatus::Dropped);
        assert!(packet.path().is_empty());
        assert!(!needs_settle(packet.status()));
    }

    #[test]
    fn test_settle_emits_once() {
        let mut state = line();
        let events = EventBroadcaster::new(8);
        let mut rx = events.subscribe_packet_flow();
        let mut lifecycle = PacketLifecycle::new(&mut state, &events, PathStrategy::DepthFirst);

        let packet = lifecycle.create_packet(PacketSpec::new("r1", "s1", Protocol::Udp));
        assert!(lifecycle.settle(&packet.id));
        assert!(!lifecycle.settle(&packet.id));
        assert!(!lifecycle.settle(&PacketId::new("pkt-missing")));

        let statuses: Vec<PacketStatus> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.packet.status())
            .collect();
        assert_eq!(statuses, vec![PacketStatus::Transmitted, PacketStatus::Received]);
    }

    #[test]
    fn test_remove_packet_announces_removal() {
        let mut state = line();
        let events = EventBroadcaster::new(8);
        let mut rx = events.subscribe_packet_flow();
        let mut lifecycle = PacketLifecycle::new(&mut state, &events, PathStrategy::DepthFirst);

        let packet = lifecycle.create_packet(PacketSpec::new("r1", "pc1", Protocol::Icmp));
        lifecycle.remove_packet(&packet.id).unwrap();
        assert!(matches!(
            lifecycle.remove_packet(&packet.id),
            Err(EngineError::NotFound { .. })
        ));

        let flags: Vec<bool> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.removed).collect();
        assert_eq!(flags, vec![false, true]);
        assert!(state.packets.is_empty());
    }

    #[test]
    fn test_traceroute_hops() {
        let path: Vec<DeviceId> = vec!["a".into(), "b".into(), "c".into()];
        let hops = traceroute_hops(&path);
        assert_eq!(hops.len(), 2);
        assert_eq!((hops[0].source.as_str(), hops[0].destination.as_str()), ("a", "b"));
        assert_eq!((hops[1].source.as_str(), hops[1].destination.as_str()), ("b", "c"));
        assert!(hops.iter().all(|h| h.protocol == Protocol::Icmp));

        assert!(traceroute_hops(&path[..1]).is_empty());
        assert!(traceroute_hops(&[]).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let timers = SettleTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        timers.schedule(PacketId::new("p1"), Duration::from_secs(1), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(timers.pending(), 1);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(timers.complete(&PacketId::new("p1")));
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timers_never_fire() {
        let timers = SettleTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for id in ["p1", "p2", "p3"] {
            let counter = fired.clone();
            timers.schedule(PacketId::new(id), Duration::from_secs(1), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(timers.cancel(&PacketId::new("p1")));
        assert!(!timers.cancel(&PacketId::new("p1")));
        assert_eq!(timers.cancel_all(), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.pending(), 0);
    }
}
