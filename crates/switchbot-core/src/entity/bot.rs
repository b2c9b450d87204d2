// ── Bot switch adapter ──
//
// Simple on/off actuator. A successful command writes the expected power
// state right away; the next snapshot carrying a power field replaces it.

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

const MODEL: &str = "Bot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchState {
    /// `None` until the vendor reports power (press-mode bots never do).
    pub is_on: Option<bool>,
    pub battery: Option<u8>,
    pub available: bool,
}

impl SwitchState {
    fn derive(device: &Device, available: bool) -> Self {
        Self {
            is_on: status::is_on(&device.status),
            battery: device.status.battery(),
            available,
        }
    }
}

pub fn is_bot_candidate(info: &DeviceInfo) -> bool {
    info.device_type == DeviceType::Bot
}

/// Create and subscribe a [`BotEntity`] for every bot in the coordinator's
/// current snapshot.
pub fn setup_bots(coordinator: &RefreshCoordinator) -> Vec<Arc<BotEntity>> {
    let entities = setup_entities(
        coordinator,
        |device| is_bot_candidate(&device.info),
        BotEntity::attach,
    );
    debug!(count = entities.len(), "bot entities created");
    entities
}

// ── BotEntity ────────────────────────────────────────────────────

pub struct BotEntity {
    coordinator: RefreshCoordinator,
    unique_id: DeviceId,
    device: ArcSwap<Device>,
    state: watch::Sender<SwitchState>,
    subscription: OnceLock<SubscriptionId>,
}

impl BotEntity {
    pub fn new(coordinator: RefreshCoordinator, device: Arc<Device>) -> Self {
        let (state, _) = watch::channel(SwitchState::derive(&device, true));
        Self {
            coordinator,
            unique_id: device.id().clone(),
            device: ArcSwap::new(device),
            state,
            subscription: OnceLock::new(),
        }
    }

    pub fn attach(coordinator: &RefreshCoordinator, device: Arc<Device>) -> Arc<Self> {
        let entity = Arc::new(Self::new(coordinator.clone(), device));
        let id = coordinator.subscribe(Arc::clone(&entity) as Arc<dyn SnapshotListener>);
        let _ = entity.subscription.set(id);
        entity
    }

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

    pub fn device_info(&self) -> DeviceRegistryInfo {
        DeviceRegistryInfo::for_device(&self.device.load(), MODEL)
    }

    pub fn state(&self) -> SwitchState {
        self.state.borrow().clone()
    }

    pub fn state_updates(&self) -> watch::Receiver<SwitchState> {
        self.state.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────

    pub async fn turn_on(&self) -> Result<(), CoreError> {
        self.send(DeviceCommand::turn_on()).await?;
        self.state.send_modify(|s| s.is_on = Some(true));
        Ok(())
    }

    pub async fn turn_off(&self) -> Result<(), CoreError> {
        self.send(DeviceCommand::turn_off()).await?;
        self.state.send_modify(|s| s.is_on = Some(false));
        Ok(())
    }

    /// Momentary press; leaves the reported power state alone.
    pub async fn press(&self) -> Result<(), CoreError> {
        self.send(DeviceCommand::press()).await
    }

    async fn send(&self, command: DeviceCommand) -> Result<(), CoreError> {
        debug!(device = %self.unique_id, command = %command.name, "sending bot command");
        self.coordinator
            .gateway()
            .send_command(&self.unique_id, &command)
            .await
            .map_err(|e| {
                let err = CoreError::from_command(&self.unique_id, command.name.as_ref(), e);
                warn!(device = %self.unique_id, error = %err, "bot command failed");
                err
            })
    }
}

impl SnapshotListener for BotEntity {
    fn on_snapshot(&self, snapshot: &Arc<Snapshot>) {
        let Some(device) = find_device(snapshot, &self.unique_id) else {
            self.state.send_if_modified(|s| std::mem::replace(&mut s.available, false));
            return;
        };

        self.device.store(Arc::clone(device));
        self.state.send_modify(|s| {
            let fresh = SwitchState::derive(device, true);
            // Keep the optimistic value when the vendor reports no power.
            let is_on = fresh.is_on.or(s.is_on);
            *s = SwitchState { is_on, ..fresh };
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CommandName;

    #[test]
    fn only_bots_are_selected() {
        assert!(is_bot_candidate(&DeviceInfo::new("B1", "Bot", DeviceType::Bot)));
        assert!(!is_bot_candidate(&DeviceInfo::new("C1", "Curtain", DeviceType::Curtain)));
    }

    #[test]
    fn press_is_distinct_command() {
        assert_eq!(DeviceCommand::press().name, CommandName::Press);
    }
}
