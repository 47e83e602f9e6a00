//! JSON snapshot file mirror
//!
//! Every mirrored mutation is applied to an in-memory image and the whole
//! image is then written to a single JSON file. The write goes to a
//! sibling temporary file first and is renamed into place, so a crash
//! mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use netsim_core::{
    Connection, ConnectionId, Device, DeviceId, DeviceStatus, PacketFlow, PacketId, SimulationState,
};

use crate::TopologyMirror;
use crate::error::{StorageError, StorageResult};
use crate::memory::apply;

/// Mirror persisted as one JSON document
#[derive(Debug)]
pub struct JsonSnapshotStore {
    path: PathBuf,
    image: Mutex<SimulationState>,
}

impl JsonSnapshotStore {
    /// Open the store at `path`, loading the existing snapshot if there
    /// is one
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let image = read_snapshot(&path).await?.unwrap_or_default();
        info!(path = %path.display(), devices = image.devices.len(), "Snapshot store opened");
        Ok(Self {
            path,
            image: Mutex::new(image),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to the image and persist the result
    async fn update<F>(&self, change: F) -> StorageResult<()>
    where
        F: FnOnce(&mut SimulationState) + Send,
    {
        let mut image = self.image.lock().await;
        change(&mut *image);
        write_snapshot(&self.path, &image).await
    }
}

/// Read a snapshot file. A missing file is `Ok(None)`.
pub async fn read_snapshot(path: &Path) -> StorageResult<Option<SimulationState>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let state = serde_json::from_slice(&bytes).map_err(|e| StorageError::deserialization(e.to_string()))?;
    Ok(Some(state))
}

/// Write a snapshot file atomically
pub async fn write_snapshot(path: &Path, state: &SimulationState) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(state).map_err(|e| StorageError::serialization(e.to_string()))?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "Snapshot written");
    Ok(())
}

#[async_trait]
impl TopologyMirror for JsonSnapshotStore {
    async fn upsert_device(&self, device: &Device) -> StorageResult<()> {
        self.update(|image| apply::upsert_device(image, device)).await
    }

    async fn remove_device(&self, id: &DeviceId) -> StorageResult<()> {
        self.update(|image| apply::remove_device(image, id)).await
    }

    async fn set_device_status(&self, id: &DeviceId, status: DeviceStatus) -> StorageResult<()> {
        self.update(|image| apply::set_device_status(image, id, status)).await
    }

    async fn upsert_connection(&self, connection: &Connection) -> StorageResult<()> {
        self.update(|image| apply::upsert_connection(image, connection)).await
    }

    async fn remove_connection(&self, id: &ConnectionId) -> StorageResult<()> {
        self.update(|image| apply::remove_connection(image, id)).await
    }

    async fn record_packet(&self, packet: &PacketFlow) -> StorageResult<()> {
        self.update(|image| apply::record_packet(image, packet)).await
    }

    async fn remove_packet(&self, id: &PacketId) -> StorageResult<()> {
        self.update(|image| apply::remove_packet(image, id)).await
    }

    async fn set_running(&self, running: bool) -> StorageResult<()> {
        self.update(|image| image.is_running = running).await
    }

    async fn reset(&self) -> StorageResult<()> {
        self.update(apply::reset).await
    }

    async fn replace(&self, state: &SimulationState) -> StorageResult<()> {
        self.update(|image| *image = state.clone()).await
    }

    async fn load(&self) -> StorageResult<Option<SimulationState>> {
        read_snapshot(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsim_core::{DeviceKind, DeviceSpec};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_snapshot(&dir.path().join("absent.json")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mutations_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("topology.json");

        let store = JsonSnapshotStore::open(&path).await.unwrap();
        let device = DeviceSpec::new(DeviceKind::Server, "SRV1").into_device("srv1".into());
        tokio_test::assert_ok!(store.upsert_device(&device).await);
        tokio_test::assert_ok!(store.set_device_status(&device.id, DeviceStatus::Online).await);
        drop(store);

        let reopened = JsonSnapshotStore::open(&path).await.unwrap();
        let state = reopened.load().await.unwrap().unwrap();
        assert_eq!(state.devices.len(), 1);
        assert_eq!(state.devices[0].status, DeviceStatus::Online);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topology.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let err = JsonSnapshotStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::Deserialization(_)));
    }
}
