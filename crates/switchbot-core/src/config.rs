// ── Runtime integration configuration ──
//
// These types describe how the integration polls the vendor cloud. They
// carry the API token and polling tuning but never touch disk; the host
// (or `switchbot-config`) builds an `IntegrationConfig` and hands it in.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest as _, Sha256};

use crate::error::CoreError;

/// Default refresh interval for the shared coordinator.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of status requests in flight during one cycle.
pub const DEFAULT_STATUS_CONCURRENCY: usize = 4;

/// Polling behaviour of a [`RefreshCoordinator`](crate::RefreshCoordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Time between periodic refresh cycles.
    pub refresh_interval: Duration,
    /// Upper bound on concurrent `get_status` calls within one cycle.
    pub status_concurrency: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            status_concurrency: DEFAULT_STATUS_CONCURRENCY,
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.refresh_interval.is_zero() {
            return Err(CoreError::Config {
                message: "refresh interval must be greater than zero".into(),
            });
        }
        if self.status_concurrency == 0 {
            return Err(CoreError::Config {
                message: "status concurrency must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Everything needed to set up one integration instance.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    /// Vendor cloud API token.
    pub api_token: SecretString,
    /// Display title for the integration entry.
    pub title: String,
    pub coordinator: CoordinatorConfig,
}

impl IntegrationConfig {
    pub fn new(api_token: SecretString) -> Self {
        Self {
            api_token,
            title: "SwitchBot Cloud".into(),
            coordinator: CoordinatorConfig::default(),
        }
    }

    /// Stable identifier for this entry, derived from the token so a host
    /// can refuse to configure the same account twice. The token itself
    /// is never exposed.
    pub fn unique_id(&self) -> String {
        let mut hasher = Sha256::default();
        hasher.update(self.api_token.expose_secret().as_bytes());
        let digest = hasher.finalize();
        format!("switchbot-{digest:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_thirty_seconds() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.refresh_interval, Duration::from_secs(30));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cfg = CoordinatorConfig {
            refresh_interval: Duration::ZERO,
            ..CoordinatorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn unique_id_is_stable_and_hides_token() {
        let a = IntegrationConfig::new(SecretString::from("secret-token"));
        let b = IntegrationConfig::new(SecretString::from("secret-token"));
        let c = IntegrationConfig::new(SecretString::from("other-token"));

        assert_eq!(a.unique_id(), b.unique_id());
        assert_ne!(a.unique_id(), c.unique_id());
        assert!(!a.unique_id().contains("secret"));
    }

    #[test]
    fn unique_id_is_sha256_of_token() {
        let cfg = IntegrationConfig::new(SecretString::from("abc"));
        assert_eq!(
            cfg.unique_id(),
            "switchbot-ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
