// ── Entity adapters ──
//
// Per-device-type views handed to the host platform. Each adapter holds a
// coordinator clone, listens for snapshots, exposes derived state through
// a `watch` channel, and sends commands to the gateway directly.

mod bot;
mod curtain;

use std::sync::Arc;

use serde::Serialize;

use crate::coordinator::RefreshCoordinator;
use crate::model::{Device, DeviceId};

pub use bot::{BotEntity, SwitchState, is_bot_candidate, setup_bots};
pub use curtain::{CoverFeature, CoverState, CurtainEntity, is_curtain_candidate, setup_curtains};

/// Integration domain used in device registry identifiers.
pub const DOMAIN: &str = "switchbot_cloud";

const MANUFACTURER: &str = "SwitchBot";

/// Device registry record the host shows for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRegistryInfo {
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl DeviceRegistryInfo {
    fn for_device(device: &Device, model: &str) -> Self {
        Self {
            identifiers: (DOMAIN.to_owned(), device.id().to_string()),
            name: device.name().to_owned(),
            manufacturer: MANUFACTURER.to_owned(),
            model: model.to_owned(),
        }
    }
}

/// Build adapters for every device in the current snapshot accepted by
/// `select`, subscribing each to the coordinator.
pub(crate) fn setup_entities<E, S, B>(
    coordinator: &RefreshCoordinator,
    select: S,
    build: B,
) -> Vec<Arc<E>>
where
    S: Fn(&Device) -> bool,
    B: Fn(&RefreshCoordinator, Arc<Device>) -> Arc<E>,
{
    let Some(snapshot) = coordinator.current_snapshot() else {
        return Vec::new();
    };

    snapshot
        .devices()
        .filter(|device| select(device))
        .map(|device| build(coordinator, Arc::clone(device)))
        .collect()
}

/// Look up an adapter's device in a fresh snapshot, logging when it has
/// gone missing.
pub(crate) fn find_device<'a>(
    snapshot: &'a crate::model::Snapshot,
    id: &DeviceId,
) -> Option<&'a Arc<Device>> {
    let found = snapshot.get(id);
    if found.is_none() {
        tracing::debug!(device = %id, cycle = snapshot.cycle(), "device missing from snapshot");
    }
    found
}
