//! ==============================================================================
//! registry.rs - concurrent store of device state
//! ==============================================================================
//!
//! purpose:
//!     owns the map from device id to DeviceRecord and exposes the four
//!     operations every other part of the service goes through:
//!     upsert, rename, delete, snapshot.
//!
//! concurrency:
//!     the map sits behind arc<rwlock<>>:
//!     - arc: one registry, cloned into every request handler
//!     - rwlock: snapshots share the read lock, mutations take the write lock
//!     critical sections are field assignment and cloning only. nothing
//!     awaits or logs while a guard is held.
//!
//! relationships:
//!     - used by: server.rs (ingestion, query and admin handlers)
//!     - uses: domain.rs (records, views), liveness.rs (via DeviceRecord::view)
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{DeviceRecord, DeviceUpdate, DeviceView, Position};
use crate::error::{RegistryError, Result};
use crate::liveness;

/// point-in-time copy of every device, liveness evaluated at `taken_at`
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub devices: BTreeMap<String, DeviceView>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&DeviceView> {
        self.devices.get(id)
    }

    pub fn active_count(&self) -> usize {
        self.devices.values().filter(|d| d.is_active).count()
    }
}

/// clone-able handle to the shared device map
#[derive(Clone, Default)]
pub struct Registry {
    devices: Arc<RwLock<HashMap<String, DeviceRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// create-or-update the record for `update.id`.
    ///
    /// an unseen id gets a record named after itself. position, telemetry and
    /// last_update are always replaced; custom_name is left alone.
    pub async fn upsert(&self, update: DeviceUpdate, now: DateTime<Utc>) -> Result<()> {
        validate_update(&update)?;

        let DeviceUpdate { id, latitude, longitude, telemetry } = update;
        let mut devices = self.devices.write().await;

        // the only place a record is ever created
        let record = devices
            .entry(id)
            .or_insert_with_key(|id| DeviceRecord::new(id.clone()));

        record.position = Some(Position { latitude, longitude });
        record.telemetry = telemetry;
        record.last_update = Some(now);
        Ok(())
    }

    /// replace the display name of an existing device
    pub async fn rename(&self, id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(RegistryError::Validation("new name must not be empty".into()));
        }

        let mut devices = self.devices.write().await;
        let record = devices
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        record.custom_name = new_name.to_string();
        Ok(())
    }

    /// remove a device entirely. a later upsert starts it over from scratch.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut devices = self.devices.write().await;
        devices
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        let devices = self.devices.read().await;
        let devices = devices
            .iter()
            .map(|(id, record)| (id.clone(), record.view(now)))
            .collect();
        Snapshot { taken_at: now, devices }
    }

    /// view of a single device, if known
    pub async fn get(&self, id: &str, now: DateTime<Utc>) -> Option<DeviceView> {
        let devices = self.devices.read().await;
        devices.get(id).map(|record| record.view(now))
    }

    /// (known devices, active devices) under one read lock, without cloning records
    pub async fn counts(&self, now: DateTime<Utc>) -> (usize, usize) {
        let devices = self.devices.read().await;
        let active = devices
            .values()
            .filter(|record| liveness::is_active(record.last_update, now))
            .count();
        (devices.len(), active)
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

// the ingestion layer validates too, but nothing corrupt gets past this point
fn validate_update(update: &DeviceUpdate) -> Result<()> {
    if update.id.trim().is_empty() {
        return Err(RegistryError::Validation("device id must not be empty".into()));
    }
    if !update.latitude.is_finite() {
        return Err(RegistryError::Validation(format!(
            "latitude is not a finite number: {}",
            update.latitude
        )));
    }
    if !update.longitude.is_finite() {
        return Err(RegistryError::Validation(format!(
            "longitude is not a finite number: {}",
            update.longitude
        )));
    }
    Ok(())
}
