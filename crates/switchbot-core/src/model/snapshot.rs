// ── Refresh snapshot ──
//
// One complete, self-consistent result of a refresh cycle. Consumers hold
// `Arc<Snapshot>` and never see a partially built one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::device::{Device, DeviceId};

/// Device-id-keyed result of one refresh cycle.
///
/// Iteration follows the order the gateway enumerated the devices in.
#[derive(Debug, Clone)]
pub struct Snapshot {
    devices: IndexMap<DeviceId, Arc<Device>>,
    cycle: u64,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Assemble a snapshot from devices fetched in a single cycle.
    ///
    /// Devices without cloud service are dropped here so no snapshot can
    /// ever carry one.
    pub fn new(cycle: u64, devices: impl IntoIterator<Item = Device>) -> Self {
        let devices = devices
            .into_iter()
            .filter(|d| d.info.cloud_enabled)
            .map(|d| (d.info.id.clone(), Arc::new(d)))
            .collect();

        Self {
            devices,
            cycle,
            fetched_at: Utc::now(),
        }
    }

    pub fn get(&self, id: &DeviceId) -> Option<&Arc<Device>> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.devices.keys()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Sequence number of the refresh cycle that produced this snapshot.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// How long ago this snapshot was assembled.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }
}
