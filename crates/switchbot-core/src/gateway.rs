// ── Remote device gateway boundary ──
//
// The vendor cloud client lives outside this crate. Hosts plug it in by
// implementing `Gateway`; the coordinator and entity adapters only ever
// talk to the cloud through this trait.

use async_trait::async_trait;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::model::{DeviceId, DeviceInfo, DeviceStatus};

// ── Boundary error ──────────────────────────────────────────────────

/// Raw failure reported by a gateway implementation.
///
/// Converted into [`CoreError`](crate::CoreError) at the call site; no
/// other component interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Credentials rejected by the vendor cloud.
    #[error("credentials rejected: {message}")]
    Auth { message: String },

    /// Network or I/O failure (connection refused, timeout, 5xx, ...).
    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl GatewayError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// Vendor command names understood by the cloud API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum CommandName {
    SetPosition,
    TurnOn,
    TurnOff,
    Press,
}

/// A single outbound device command: vendor command name plus optional
/// string parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub name: CommandName,
    pub parameter: Option<String>,
}

impl DeviceCommand {
    /// Move a curtain to `target` in host polarity (100 = fully open).
    ///
    /// The vendor expects `"<index>,<mode>,<position>"` with inverted
    /// polarity; index 0 and mode `ff` (default speed) are fixed.
    pub fn set_position(target: u8) -> Self {
        let vendor = 100u8.saturating_sub(target);
        Self {
            name: CommandName::SetPosition,
            parameter: Some(format!("0,ff,{vendor}")),
        }
    }

    pub fn turn_on() -> Self {
        Self {
            name: CommandName::TurnOn,
            parameter: None,
        }
    }

    pub fn turn_off() -> Self {
        Self {
            name: CommandName::TurnOff,
            parameter: None,
        }
    }

    pub fn press() -> Self {
        Self {
            name: CommandName::Press,
            parameter: None,
        }
    }
}

// ── Gateway trait ───────────────────────────────────────────────────

/// Device enumeration, status fetch and command dispatch against the
/// vendor cloud.
///
/// Implementations own transport concerns, including request timeouts.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// Enumerate every device registered to the account.
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, GatewayError>;

    /// Fetch the current status fields for one device.
    async fn get_status(&self, device_id: &DeviceId) -> Result<DeviceStatus, GatewayError>;

    /// Dispatch a command to one device.
    async fn send_command(
        &self,
        device_id: &DeviceId,
        command: &DeviceCommand,
    ) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_position_inverts_target() {
        let cmd = DeviceCommand::set_position(100);
        assert_eq!(cmd.name.as_ref(), "set_position");
        assert_eq!(cmd.parameter.as_deref(), Some("0,ff,0"));

        let cmd = DeviceCommand::set_position(30);
        assert_eq!(cmd.parameter.as_deref(), Some("0,ff,70"));
    }

    #[test]
    fn command_names_render_snake_case() {
        assert_eq!(CommandName::TurnOn.to_string(), "turn_on");
        assert_eq!(CommandName::TurnOff.as_ref(), "turn_off");
        assert_eq!("press".parse::<CommandName>(), Ok(CommandName::Press));
    }

    #[test]
    fn switch_commands_carry_no_parameter() {
        assert!(DeviceCommand::turn_on().parameter.is_none());
        assert!(DeviceCommand::press().parameter.is_none());
    }
}
