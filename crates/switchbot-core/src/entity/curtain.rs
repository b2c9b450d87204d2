// ── Curtain cover adapter ──
//
// Exposes one calibrated curtain (or the master of a curtain group) as a
// positional cover. Open and close set an optimistic direction flag that
// is kept only while the next snapshots still report motion.

use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{DeviceRegistryInfo, find_device, setup_entities};
use crate::coordinator::{RefreshCoordinator, SnapshotListener, SubscriptionId};
use crate::error::CoreError;
use crate::gateway::DeviceCommand;
use crate::model::{Device, DeviceId, DeviceInfo, DeviceType, Snapshot, status};

const MODEL: &str = "Curtain";

/// Capabilities advertised to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoverFeature {
    Open,
    Close,
    SetPosition,
}

const SUPPORTED_FEATURES: &[CoverFeature] =
    &[CoverFeature::Open, CoverFeature::Close, CoverFeature::SetPosition];

/// Host-visible cover state, recomputed from raw status on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverState {
    /// 0 = closed, 100 = open. `None` when the vendor reported no position.
    pub current_position: Option<u8>,
    pub is_closed: Option<bool>,
    pub is_opening: bool,
    pub is_closing: bool,
    pub is_moving: bool,
    /// `false` while the device is missing from the latest snapshot.
    pub available: bool,
}

impl CoverState {
    fn derive(device: &Device, is_opening: bool, is_closing: bool, available: bool) -> Self {
        Self {
            current_position: status::display_position(&device.status),
            is_closed: status::is_closed(&device.status),
            is_opening,
            is_closing,
            is_moving: status::is_moving(&device.status),
            available,
        }
    }
}

/// Curtain selection rule: calibrated curtains that are either ungrouped
/// or the master of their group.
pub fn is_curtain_candidate(info: &DeviceInfo) -> bool {
    info.device_type == DeviceType::Curtain && info.calibrated && info.represents_group()
}

/// Create and subscribe a [`CurtainEntity`] for every selected curtain in
/// the coordinator's current snapshot.
pub fn setup_curtains(coordinator: &RefreshCoordinator) -> Vec<Arc<CurtainEntity>> {
    let entities = setup_entities(
        coordinator,
        |device| is_curtain_candidate(&device.info),
        CurtainEntity::attach,
    );
    debug!(count = entities.len(), "curtain entities created");
    entities
}

// ── CurtainEntity ────────────────────────────────────────────────

pub struct CurtainEntity {
    coordinator: RefreshCoordinator,
    unique_id: DeviceId,
    device: ArcSwap<Device>,
    state: watch::Sender<CoverState>,
    subscription: OnceLock<SubscriptionId>,
}

impl CurtainEntity {
    /// Build an adapter for `device` without subscribing it.
    pub fn new(coordinator: RefreshCoordinator, device: Arc<Device>) -> Self {
        let (state, _) = watch::channel(CoverState::derive(&device, false, false, true));
        Self {
            coordinator,
            unique_id: device.id().clone(),
            device: ArcSwap::new(device),
            state,
            subscription: OnceLock::new(),
        }
    }

    /// Build an adapter and register it with the coordinator.
    pub fn attach(coordinator: &RefreshCoordinator, device: Arc<Device>) -> Arc<Self> {
        let entity = Arc::new(Self::new(coordinator.clone(), device));
        let id = coordinator.subscribe(Arc::clone(&entity) as Arc<dyn SnapshotListener>);
        let _ = entity.subscription.set(id);
        entity
    }

    /// Unregister from the coordinator. Safe to call more than once.
    pub fn remove(&self) {
        if let Some(id) = self.subscription.get() {
            self.coordinator.unsubscribe(*id);
        }
    }

    pub fn unique_id(&self) -> &DeviceId {
        &self.unique_id
    }

    pub fn name(&self) -> String {
        self.device.load().name().to_owned()
    }

    /// Last device record seen for this entity (may be stale when the
    /// device has dropped out of the snapshot).
    pub fn device(&self) -> Arc<Device> {
        self.device.load_full()
    }

    pub fn device_info(&self) -> DeviceRegistryInfo {
        DeviceRegistryInfo::for_device(&self.device.load(), MODEL)
    }

    pub fn supported_features(&self) -> &'static [CoverFeature] {
        SUPPORTED_FEATURES
    }

    pub fn state(&self) -> CoverState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every state write.
    pub fn state_updates(&self) -> watch::Receiver<CoverState> {
        self.state.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Fully open the curtain, showing it as opening right away.
    pub async fn open(&self) -> Result<(), CoreError> {
        debug!(device = %self.unique_id, name = %self.name(), "opening curtain");
        self.state.send_modify(|s| {
            s.is_opening = true;
            s.is_closing = false;
        });

        let result = self.send(DeviceCommand::set_position(100)).await;
        if result.is_err() {
            self.state.send_modify(|s| s.is_opening = false);
        }
        result
    }

    /// Fully close the curtain, showing it as closing right away.
    pub async fn close(&self) -> Result<(), CoreError> {
        debug!(device = %self.unique_id, name = %self.name(), "closing curtain");
        self.state.send_modify(|s| {
            s.is_closing = true;
            s.is_opening = false;
        });

        let result = self.send(DeviceCommand::set_position(0)).await;
        if result.is_err() {
            self.state.send_modify(|s| s.is_closing = false);
        }
        result
    }

    /// Move to `position` (0 = closed, 100 = open). No optimistic flag;
    /// the host renders its own transition.
    pub async fn set_position(&self, position: u8) -> Result<(), CoreError> {
        if position > 100 {
            return Err(CoreError::InvalidPosition { position });
        }
        debug!(device = %self.unique_id, position, "setting curtain position");
        self.send(DeviceCommand::set_position(position)).await
    }

    async fn send(&self, command: DeviceCommand) -> Result<(), CoreError> {
        self.coordinator
            .gateway()
            .send_command(&self.unique_id, &command)
            .await
            .map_err(|e| {
                let err = CoreError::from_command(&self.unique_id, command.name.as_ref(), e);
                warn!(device = %self.unique_id, error = %err, "curtain command failed");
                err
            })
    }
}

impl SnapshotListener for CurtainEntity {
    fn on_snapshot(&self, snapshot: &Arc<Snapshot>) {
        let Some(device) = find_device(snapshot, &self.unique_id) else {
            self.state.send_if_modified(|s| std::mem::replace(&mut s.available, false));
            return;
        };

        self.device.store(Arc::clone(device));
        let moving = status::is_moving(&device.status);

        self.state.send_modify(|s| {
            let is_opening = s.is_opening && moving;
            let is_closing = s.is_closing && moving;
            *s = CoverState::derive(device, is_opening, is_closing, true);
        });
    }
}
