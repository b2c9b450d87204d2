// ── Integration context ──
//
// The owned object a host creates when a config entry is set up and
// disposes of when it is unloaded. Holds the coordinator and every entity
// adapter; nothing is kept in global state.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::IntegrationConfig;
use crate::coordinator::RefreshCoordinator;
use crate::entity::{BotEntity, CurtainEntity, setup_bots, setup_curtains};
use crate::error::CoreError;
use crate::gateway::{Gateway, GatewayError};
use crate::model::DeviceId;

/// Check user-supplied credentials with one device listing call.
///
/// Used by the host's credential-entry flow before an entry is created.
pub async fn validate_credentials(gateway: &dyn Gateway) -> Result<(), CoreError> {
    match gateway.list_devices().await {
        Ok(devices) => {
            debug!(devices = devices.len(), "credentials accepted");
            Ok(())
        }
        Err(GatewayError::Auth { message }) => Err(CoreError::AuthenticationFailed { message }),
        Err(GatewayError::Transport { message }) => {
            Err(CoreError::ConnectionFailed { reason: message })
        }
    }
}

/// A running integration instance.
pub struct Integration {
    config: IntegrationConfig,
    coordinator: RefreshCoordinator,
    curtains: Vec<Arc<CurtainEntity>>,
    bots: Vec<Arc<BotEntity>>,
}

impl std::fmt::Debug for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("title", &self.config.title)
            .field("curtains", &self.curtains.len())
            .field("bots", &self.bots.len())
            .finish_non_exhaustive()
    }
}

impl Integration {
    /// Set up an integration instance.
    ///
    /// Performs the first refresh (a recoverable failure surfaces as
    /// [`CoreError::SetupNotReady`]), starts periodic polling, then creates
    /// the entity adapters from the first snapshot.
    pub async fn setup(
        config: IntegrationConfig,
        gateway: Arc<dyn Gateway>,
    ) -> Result<Self, CoreError> {
        config.coordinator.validate()?;

        let coordinator = RefreshCoordinator::new(gateway, config.coordinator.clone());
        if let Err(e) = coordinator.first_refresh().await {
            coordinator.shutdown().await;
            return Err(e);
        }
        coordinator.start().await;

        let curtains = setup_curtains(&coordinator);
        let bots = setup_bots(&coordinator);

        info!(
            entry = %config.unique_id(),
            curtains = curtains.len(),
            bots = bots.len(),
            "integration set up"
        );

        Ok(Self {
            config,
            coordinator,
            curtains,
            bots,
        })
    }

    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn curtains(&self) -> &[Arc<CurtainEntity>] {
        &self.curtains
    }

    pub fn bots(&self) -> &[Arc<BotEntity>] {
        &self.bots
    }

    /// Look up a curtain adapter by device id.
    pub fn curtain(&self, id: &DeviceId) -> Result<&Arc<CurtainEntity>, CoreError> {
        self.curtains
            .iter()
            .find(|c| c.unique_id() == id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })
    }

    pub fn bot(&self, id: &DeviceId) -> Result<&Arc<BotEntity>, CoreError> {
        self.bots
            .iter()
            .find(|b| b.unique_id() == id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })
    }

    /// Whether the vendor has rejected the credentials and the host must
    /// start re-authentication.
    pub fn needs_reauth(&self) -> bool {
        self.coordinator
            .last_error()
            .is_some_and(|e| e.is_auth_failure())
    }

    /// Tear down: unsubscribe every adapter and stop polling.
    pub async fn unload(self) {
        for curtain in &self.curtains {
            curtain.remove();
        }
        for bot in &self.bots {
            bot.remove();
        }

        let leftover = self.coordinator.listener_count();
        if leftover > 0 {
            warn!(leftover, "listeners still registered at unload");
        }

        self.coordinator.shutdown().await;
        info!(entry = %self.config.unique_id(), "integration unloaded");
    }
}

/// Adapters and the coordinator hold each other through the listener
/// list, so a dropped integration must break that cycle and stop polling.
impl Drop for Integration {
    fn drop(&mut self) {
        if !self.coordinator.is_shutdown() {
            warn!(entry = %self.config.unique_id(), "integration dropped without unload");
            self.coordinator.stop();
        }
    }
}
