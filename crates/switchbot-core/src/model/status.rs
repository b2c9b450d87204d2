// ── Device status and derived state ──
//
// `DeviceStatus` keeps the vendor field map exactly as fetched. Everything
// the host displays is derived from it on demand by the pure functions at
// the bottom of this file, so the derived values can never drift from the
// raw status they came from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Vendor key for the raw curtain position (0 = open at the vendor).
pub const SLIDE_POSITION: &str = "slidePosition";
/// Vendor key for the motion flag.
pub const MOVING: &str = "moving";
/// Vendor key for on/off actuators (`"on"` / `"off"`).
pub const POWER: &str = "power";
/// Vendor key for battery percentage.
pub const BATTERY: &str = "battery";

/// Display position at or below which a cover counts as closed.
pub const CLOSED_THRESHOLD: u8 = 20;

/// Vendor position granularity.
const POSITION_STEP: f64 = 5.0;

/// Status fields reported by the vendor for one device at one point in
/// time. Replaced wholesale each refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceStatus {
    fields: Map<String, Value>,
}

impl DeviceStatus {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Raw field access.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Vendor slide position, `None` if absent or not numeric.
    pub fn slide_position(&self) -> Option<f64> {
        self.fields.get(SLIDE_POSITION).and_then(Value::as_f64)
    }

    pub fn moving(&self) -> Option<bool> {
        self.fields.get(MOVING).and_then(Value::as_bool)
    }

    pub fn power(&self) -> Option<&str> {
        self.fields.get(POWER).and_then(Value::as_str)
    }

    pub fn battery(&self) -> Option<u8> {
        self.fields
            .get(BATTERY)
            .and_then(Value::as_u64)
            .and_then(|b| u8::try_from(b.min(100)).ok())
    }
}

impl From<Map<String, Value>> for DeviceStatus {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

impl FromIterator<(String, Value)> for DeviceStatus {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ── Derivations ─────────────────────────────────────────────────────

/// Host-polarity cover position: the vendor value snapped to the nearest
/// 5 and inverted, clamped to `0..=100`. `None` when the vendor did not
/// report a position.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn display_position(status: &DeviceStatus) -> Option<u8> {
    let raw = status.slide_position()?;
    let snapped = POSITION_STEP * (raw / POSITION_STEP).round();
    let position = (100.0 - snapped).clamp(0.0, 100.0);
    Some(position as u8)
}

/// `None` when the position is unknown, otherwise `position <= 20`.
pub fn is_closed(status: &DeviceStatus) -> Option<bool> {
    display_position(status).map(|p| p <= CLOSED_THRESHOLD)
}

/// Vendor motion flag, `false` when absent.
pub fn is_moving(status: &DeviceStatus) -> bool {
    status.moving().unwrap_or(false)
}

/// On/off actuator state. `None` when the vendor did not report power.
pub fn is_on(status: &DeviceStatus) -> Option<bool> {
    status.power().map(|p| p.eq_ignore_ascii_case("on"))
}
