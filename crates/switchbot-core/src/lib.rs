//! Polling coordination and device state reconciliation for SwitchBot
//! cloud devices.
//!
//! This crate sits between a host automation platform and a rate-limited
//! vendor cloud API:
//!
//! - **[`Gateway`]**: the boundary trait a host implements on top of its
//!   vendor client. Raw [`GatewayError`]s are classified into
//!   [`CoreError`] at the call site.
//!
//! - **[`RefreshCoordinator`]**: one shared, single-flight refresh cycle on
//!   a fixed interval. Publishes an immutable [`Snapshot`] to listeners in
//!   registration order and keeps the previous snapshot on transient
//!   failure. Credential rejection stops it for good.
//!
//! - **Domain model** ([`model`]): [`Device`], [`DeviceStatus`] and the pure
//!   derivations (cover position, closed, moving, power).
//!
//! - **Entity adapters** ([`entity`]): [`CurtainEntity`] and [`BotEntity`]
//!   subscribe to the coordinator, publish host-visible state and send
//!   commands straight to the gateway with optimistic local transitions.
//!
//! - **[`Integration`]**: the owned context created on setup and disposed
//!   of on unload.

pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod integration;
pub mod model;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CoordinatorConfig, IntegrationConfig};
pub use coordinator::{
    CoordinatorState, RefreshCoordinator, SnapshotListener, SnapshotStream, SubscriptionId,
};
pub use entity::{
    BotEntity, CoverFeature, CoverState, CurtainEntity, DeviceRegistryInfo, SwitchState,
    is_bot_candidate, is_curtain_candidate,
};
pub use error::CoreError;
pub use gateway::{CommandName, DeviceCommand, Gateway, GatewayError};
pub use integration::{Integration, validate_credentials};
pub use model::{Device, DeviceId, DeviceInfo, DeviceStatus, DeviceType, Snapshot};
