//! Typed publish/subscribe for engine events
//!
//! Every event kind has its own broadcast channel carrying its concrete
//! payload, and every event is also published as an [`EngineEvent`] on a
//! combined channel for transports that rebroadcast everything.
//!
//! Emitting never waits on subscribers: a broadcast send only clones the
//! value into the channel ring. Subscribers that fall behind by more than
//! the channel capacity skip the missed events and carry on.

use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;

use futures::Stream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug_span, trace, warn};

use netsim_core::{
    DeviceStatusChanged, EngineEvent, EventKind, PacketFlowEvent, SimulationStateChanged, TopologyChanged,
};
use netsim_logging::spans;

/// Fan-out hub for engine events
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    topology: broadcast::Sender<TopologyChanged>,
    device_status: broadcast::Sender<DeviceStatusChanged>,
    packet_flow: broadcast::Sender<PacketFlowEvent>,
    simulation: broadcast::Sender<SimulationStateChanged>,
    all: broadcast::Sender<EngineEvent>,
}

impl EventBroadcaster {
    /// Create a broadcaster whose channels each hold `capacity` events
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (topology, _) = broadcast::channel(capacity);
        let (device_status, _) = broadcast::channel(capacity);
        let (packet_flow, _) = broadcast::channel(capacity);
        let (simulation, _) = broadcast::channel(capacity);
        let (all, _) = broadcast::channel(capacity);

        Self {
            topology,
            device_status,
            packet_flow,
            simulation,
            all,
        }
    }

    /// Publish an event on its kind channel and on the combined channel.
    ///
    /// A send with no receivers is not an error.
    pub fn emit(&self, event: EngineEvent) {
        trace!(event_kind = %event.kind(), "Emitting event");
        match &event {
            EngineEvent::TopologyChanged(payload) => {
                let _ = self.topology.send(payload.clone());
            }
            EngineEvent::DeviceStatusChanged(payload) => {
                let _ = self.device_status.send(payload.clone());
            }
            EngineEvent::PacketFlow(payload) => {
                let _ = self.packet_flow.send(payload.clone());
            }
            EngineEvent::SimulationStateChanged(payload) => {
                let _ = self.simulation.send(payload.clone());
            }
        }
        let _ = self.all.send(event);
    }

    pub fn subscribe_topology(&self) -> broadcast::Receiver<TopologyChanged> {
        self.topology.subscribe()
    }

    pub fn subscribe_device_status(&self) -> broadcast::Receiver<DeviceStatusChanged> {
        self.device_status.subscribe()
    }

    pub fn subscribe_packet_flow(&self) -> broadcast::Receiver<PacketFlowEvent> {
        self.packet_flow.subscribe()
    }

    pub fn subscribe_simulation(&self) -> broadcast::Receiver<SimulationStateChanged> {
        self.simulation.subscribe()
    }

    /// Subscribe to every event kind at once
    pub fn subscribe_all(&self) -> broadcast::Receiver<EngineEvent> {
        self.all.subscribe()
    }

    /// Number of receivers on the combined channel
    pub fn subscriber_count(&self) -> usize {
        self.all.receiver_count()
    }

    /// Run `handler` for every event of `kind`, or for every event when
    /// `kind` is `None`, on its own task.
    ///
    /// A panicking handler is logged and the subscription keeps going; the
    /// panic never reaches the emitter or any other subscriber.
    pub fn spawn_subscriber<F>(&self, name: impl Into<String>, kind: Option<EventKind>, handler: F) -> JoinHandle<()>
    where
        F: FnMut(EngineEvent) + Send + 'static,
    {
        let name = name.into();
        let span = debug_span!(spans::SUBSCRIBER, subscriber = %name);
        let rx = self.subscribe_all();
        tokio::spawn(run_subscriber(name, kind, rx, handler).instrument(span))
    }
}

async fn run_subscriber<F>(name: String, kind: Option<EventKind>, mut rx: broadcast::Receiver<EngineEvent>, mut handler: F)
where
    F: FnMut(EngineEvent) + Send + 'static,
{
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(subscriber = %name, skipped, "Subscriber lagged, events skipped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if kind.is_some_and(|k| k != event.kind()) {
            continue;
        }

        let event_kind = event.kind();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
        if outcome.is_err() {
            warn!(subscriber = %name, event_kind = %event_kind, "Subscriber panicked while handling event");
        }
    }
    trace!(subscriber = %name, "Subscriber finished");
}

/// Convert a broadcast receiver into an async Stream.
///
/// Lagged receivers skip ahead; the stream ends when the sender is dropped.
pub fn broadcast_to_stream<T: Clone + Send + 'static>(
    mut rx: broadcast::Receiver<T>,
) -> Pin<Box<dyn Stream<Item = T> + Send>> {
    Box::pin(async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(item) => yield item,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use netsim_core::{DeviceId, DeviceStatus, TopologyChange};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_emit_reaches_kind_and_combined_channels() {
        let broadcaster = EventBroadcaster::new(16);
        let mut status_rx = broadcaster.subscribe_device_status();
        let mut topology_rx = broadcaster.subscribe_topology();
        let mut all_rx = broadcaster.subscribe_all();

        broadcaster.emit(EngineEvent::device_status(DeviceId::new("r1"), DeviceStatus::Online));

        let payload = status_rx.recv().await.unwrap();
        assert_eq!(payload.device_id, DeviceId::new("r1"));
        assert_eq!(payload.status, DeviceStatus::Online);
        assert_eq!(all_rx.recv().await.unwrap().kind(), EventKind::DeviceStatusChanged);
        assert!(topology_rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let broadcaster = EventBroadcaster::new(4);
        broadcaster.emit(EngineEvent::simulation(true));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let broadcaster = EventBroadcaster::new(16);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let panicky = broadcaster.spawn_subscriber("panicky", None, |_event| panic!("handler failure"));
        let seen_clone = seen.clone();
        let steady = broadcaster.spawn_subscriber("steady", None, move |event| {
            seen_clone.lock().unwrap().push(event.kind());
        });

        broadcaster.emit(EngineEvent::simulation(true));
        broadcaster.emit(EngineEvent::topology(TopologyChange::Reset));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::SimulationStateChanged, EventKind::TopologyChanged]
        );
        // The panicking subscriber survives its own panics
        assert!(!panicky.is_finished());

        panicky.abort();
        steady.abort();
    }

    #[tokio::test]
    async fn test_kind_filter() {
        let broadcaster = EventBroadcaster::new(16);
        let seen = Arc::new(Mutex::new(0usize));
        let seen_clone = seen.clone();
        let handle = broadcaster.spawn_subscriber("sim-only", Some(EventKind::SimulationStateChanged), move |_| {
            *seen_clone.lock().unwrap() += 1;
        });

        broadcaster.emit(EngineEvent::topology(TopologyChange::Reset));
        broadcaster.emit(EngineEvent::simulation(false));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*seen.lock().unwrap(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_broadcast_to_stream() {
        let (tx, rx) = broadcast::channel::<i32>(16);
        let stream = broadcast_to_stream(rx);

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![1, 2]);
    }
}
