// ── Core error types ──
//
// Gateway failures are classified exactly once, at the call site, into
// `CoreError`. Nothing above the gateway boundary looks at raw transport
// errors. `CoreError` is `Clone` so every waiter on a shared refresh cycle
// receives the same outcome.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::model::DeviceId;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // ── Credential errors ────────────────────────────────────────────
    /// The vendor cloud rejected the API token. The integration must be
    /// reconfigured; never retried automatically.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Refresh errors ───────────────────────────────────────────────
    /// A periodic or forced refresh failed for a recoverable reason.
    /// The previous snapshot stays current.
    #[error("Error communicating with the SwitchBot API: {message}")]
    UpdateFailed { message: String },

    /// The setup-time refresh failed for a recoverable reason.
    #[error("Integration not ready: {message}")]
    SetupNotReady { message: String },

    /// The credential validation call could not reach the cloud.
    #[error("Cannot connect to the SwitchBot API: {reason}")]
    ConnectionFailed { reason: String },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Command {command} failed for device {device_id}: {message}")]
    CommandFailed {
        device_id: DeviceId,
        command: String,
        message: String,
    },

    #[error("Invalid position {position}: expected 0..=100")]
    InvalidPosition { position: u8 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Refresh coordinator has been shut down")]
    CoordinatorShutdown,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if the integration must re-authenticate.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    /// Returns `true` if the failure is expected to clear on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UpdateFailed { .. }
                | Self::SetupNotReady { .. }
                | Self::ConnectionFailed { .. }
                | Self::CommandFailed { .. }
        )
    }

    /// Classify a gateway failure raised while sending a device command.
    ///
    /// Credential rejection keeps its own kind so the caller can prompt for
    /// re-authentication; everything else is a single-operation failure.
    pub(crate) fn from_command(device_id: &DeviceId, command: &str, err: GatewayError) -> Self {
        match err {
            GatewayError::Auth { message } => Self::AuthenticationFailed { message },
            GatewayError::Transport { message } => Self::CommandFailed {
                device_id: device_id.clone(),
                command: command.to_owned(),
                message,
            },
        }
    }
}

// ── Conversion from boundary errors ──────────────────────────────────

/// Refresh-path classification: auth stays fatal, transport is recoverable.
impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Auth { message } => Self::AuthenticationFailed { message },
            GatewayError::Transport { message } => Self::UpdateFailed { message },
        }
    }
}
