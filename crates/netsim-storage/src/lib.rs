//! # Netsim Storage
//!
//! Best-effort persistence for the netsim engine.
//!
//! The engine is the source of truth. A [`TopologyMirror`] receives a copy
//! of every device, connection, and packet mutation through a background
//! task started with [`spawn_mirror`], and can hand a saved snapshot back
//! for [`NetworkEngine::restore`](netsim_engine::NetworkEngine::restore)
//! when the process starts again.
//!
//! ## Backends
//!
//! - **MemoryMirror**: Keeps the image in memory, for tests
//! - **JsonSnapshotStore**: Rewrites a single JSON file after every change
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use netsim_storage::{JsonSnapshotStore, TopologyMirror, spawn_mirror};
//!
//! let store = Arc::new(JsonSnapshotStore::open("data/topology.json").await?);
//! if let Some(snapshot) = store.load().await? {
//!     engine.restore(snapshot).await?;
//! }
//! let _mirror = spawn_mirror(engine.clone(), store);
//! ```

pub mod error;
pub mod json;
pub mod memory;
pub mod mirror;

pub use error::{StorageError, StorageResult};
pub use json::{JsonSnapshotStore, read_snapshot, write_snapshot};
pub use memory::MemoryMirror;
pub use mirror::{apply_event, spawn_mirror};

use async_trait::async_trait;
use netsim_core::{Connection, ConnectionId, Device, DeviceId, DeviceStatus, PacketFlow, PacketId, SimulationState};

/// Destination for mirrored engine mutations
///
/// Implementations must tolerate being told about entities they have never
/// seen (upserts) and removals of entities they no longer have.
#[async_trait]
pub trait TopologyMirror: Send + Sync {
    /// Insert a device or replace the stored copy
    async fn upsert_device(&self, device: &Device) -> StorageResult<()>;

    /// Remove a device and any connection that touches it
    async fn remove_device(&self, id: &DeviceId) -> StorageResult<()>;

    async fn set_device_status(&self, id: &DeviceId, status: DeviceStatus) -> StorageResult<()>;

    /// Insert a connection or replace the stored copy
    async fn upsert_connection(&self, connection: &Connection) -> StorageResult<()>;

    async fn remove_connection(&self, id: &ConnectionId) -> StorageResult<()>;

    /// Insert a packet or replace the stored copy with its latest status
    async fn record_packet(&self, packet: &PacketFlow) -> StorageResult<()>;

    async fn remove_packet(&self, id: &PacketId) -> StorageResult<()>;

    async fn set_running(&self, running: bool) -> StorageResult<()>;

    /// Clear packets, stop, and take every device offline
    async fn reset(&self) -> StorageResult<()>;

    /// Replace everything with `state`
    async fn replace(&self, state: &SimulationState) -> StorageResult<()>;

    /// The last persisted state, if any
    async fn load(&self) -> StorageResult<Option<SimulationState>>;
}
