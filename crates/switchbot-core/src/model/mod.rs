// ── Domain model ──
//
// Canonical device identity, raw status, derived state and the per-cycle
// snapshot. All types are immutable once built.

pub mod device;
pub mod snapshot;
pub mod status;

pub use device::{Device, DeviceId, DeviceInfo, DeviceType};
pub use snapshot::Snapshot;
pub use status::{DeviceStatus, display_position, is_closed, is_moving, is_on};
