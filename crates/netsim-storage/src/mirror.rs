//! Background task that mirrors engine events into a [`TopologyMirror`]
//!
//! The task is best effort. A failed write is logged and the next event is
//! processed as usual; the engine never learns about it. When the task
//! falls behind the event channel, or the engine restores a snapshot, the
//! whole engine state is copied into the mirror instead of replaying
//! individual events.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span, warn};

use netsim_core::{EngineEvent, TopologyChange};
use netsim_engine::NetworkEngine;
use netsim_logging::spans;

use crate::TopologyMirror;
use crate::error::StorageResult;

/// Subscribe `mirror` to every event of `engine` on a background task.
///
/// The mirror is first brought up to date with the engine's current state.
pub fn spawn_mirror(engine: NetworkEngine, mirror: Arc<dyn TopologyMirror>) -> JoinHandle<()> {
    let mut rx = engine.subscribe_all();
    let span = debug_span!(spans::MIRROR);

    tokio::spawn(
        async move {
            resync(&engine, mirror.as_ref()).await;
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let kind = event.kind();
                        if let Err(e) = apply_event(&engine, mirror.as_ref(), event).await {
                            warn!(event_kind = %kind, error = %e, "Mirror write failed");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Mirror lagged, resyncing from engine");
                        resync(&engine, mirror.as_ref()).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Mirror stopped");
        }
        .instrument(span),
    )
}

async fn resync(engine: &NetworkEngine, mirror: &dyn TopologyMirror) {
    let snapshot = engine.snapshot().await;
    if let Err(e) = mirror.replace(&snapshot).await {
        warn!(error = %e, "Mirror resync failed");
    }
}

/// Apply a single engine event to a mirror
pub async fn apply_event(engine: &NetworkEngine, mirror: &dyn TopologyMirror, event: EngineEvent) -> StorageResult<()> {
    match event {
        EngineEvent::TopologyChanged(payload) => match payload.change {
            TopologyChange::DeviceAdded { device } | TopologyChange::DeviceUpdated { device } => {
                mirror.upsert_device(&device).await
            }
            TopologyChange::DeviceRemoved { device_id } => mirror.remove_device(&device_id).await,
            TopologyChange::ConnectionAdded { connection } | TopologyChange::ConnectionUpdated { connection } => {
                mirror.upsert_connection(&connection).await
            }
            TopologyChange::ConnectionRemoved { connection_id } => mirror.remove_connection(&connection_id).await,
            TopologyChange::Reset => mirror.reset().await,
            TopologyChange::Restored { .. } => mirror.replace(&engine.snapshot().await).await,
        },
        EngineEvent::DeviceStatusChanged(payload) => mirror.set_device_status(&payload.device_id, payload.status).await,
        EngineEvent::PacketFlow(payload) if payload.removed => mirror.remove_packet(&payload.packet.id).await,
        EngineEvent::PacketFlow(payload) => mirror.record_packet(&payload.packet).await,
        EngineEvent::SimulationStateChanged(payload) => mirror.set_running(payload.is_running).await,
    }
}
