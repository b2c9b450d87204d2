// ── Device domain types ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::status::DeviceStatus;

// ── DeviceId ────────────────────────────────────────────────────────

/// Vendor-assigned device identifier (unique per account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── DeviceType ──────────────────────────────────────────────────────

/// Device kind as reported by the vendor `deviceType` field.
///
/// Unknown kinds are kept verbatim so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DeviceType {
    Curtain,
    Bot,
    Hub,
    Other(String),
}

impl DeviceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Curtain => "Curtain",
            Self::Bot => "Bot",
            Self::Hub => "Hub",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl From<String> for DeviceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Curtain" => Self::Curtain,
            "Bot" => Self::Bot,
            "Hub" | "Hub Mini" | "Hub Plus" => Self::Hub,
            _ => Self::Other(s),
        }
    }
}

impl From<DeviceType> for String {
    fn from(t: DeviceType) -> Self {
        t.as_str().to_owned()
    }
}

// ── DeviceInfo ──────────────────────────────────────────────────────

/// Identity record returned by device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct DeviceInfo {
    #[serde(rename = "deviceId")]
    pub id: DeviceId,
    #[serde(rename = "deviceName")]
    pub name: String,
    pub device_type: DeviceType,
    #[serde(rename = "enableCloudService", default)]
    pub cloud_enabled: bool,
    #[serde(rename = "calibrate", alias = "calibrated", default)]
    pub calibrated: bool,
    #[serde(rename = "group", default)]
    pub grouped: bool,
    #[serde(rename = "master", default)]
    pub is_group_master: bool,
    #[serde(default)]
    pub hub_device_id: Option<String>,
}

impl DeviceInfo {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type,
            cloud_enabled: true,
            calibrated: false,
            grouped: false,
            is_group_master: false,
            hub_device_id: None,
        }
    }

    /// Whether this device stands for itself or for its group on the host.
    /// Non-master members of a group are represented by their master.
    pub fn represents_group(&self) -> bool {
        !self.grouped || self.is_group_master
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A device together with the status fetched for it in one refresh cycle.
///
/// Built fresh from gateway responses every cycle; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub info: DeviceInfo,
    pub status: DeviceStatus,
}

impl Device {
    pub fn new(info: DeviceInfo, status: DeviceStatus) -> Self {
        Self { info, status }
    }

    pub fn id(&self) -> &DeviceId {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn device_type(&self) -> &DeviceType {
        &self.info.device_type
    }
}
