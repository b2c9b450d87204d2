#![allow(clippy::unwrap_used, dead_code)]
// Scripted in-memory gateway shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;

use switchbot_core::{
    DeviceCommand, DeviceId, DeviceInfo, DeviceStatus, DeviceType, Gateway, GatewayError,
};

// ── Gate ────────────────────────────────────────────────────────────

/// Holds `list_devices` open so a cycle stays in flight.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    release: Notify,
}

// ── MockGateway ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockGateway {
    devices: Mutex<Vec<DeviceInfo>>,
    statuses: Mutex<HashMap<DeviceId, DeviceStatus>>,
    list_error: Mutex<Option<GatewayError>>,
    status_errors: Mutex<HashMap<DeviceId, GatewayError>>,
    command_error: Mutex<Option<GatewayError>>,
    commands: Mutex<Vec<(DeviceId, DeviceCommand)>>,
    gate: Mutex<Option<Arc<Gate>>>,
    list_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a device with its initial status fields.
    pub fn add_device(&self, info: DeviceInfo, status: Value) {
        let id = info.id.clone();
        self.devices.lock().unwrap().push(info);
        self.set_status(&id, status);
    }

    pub fn remove_device(&self, id: &str) {
        self.devices
            .lock()
            .unwrap()
            .retain(|d| d.id.as_str() != id);
    }

    pub fn set_status(&self, id: &DeviceId, status: Value) {
        let status = match status {
            Value::Object(map) => DeviceStatus::new(map),
            _ => DeviceStatus::default(),
        };
        self.statuses.lock().unwrap().insert(id.clone(), status);
    }

    pub fn fail_listing(&self, err: Option<GatewayError>) {
        *self.list_error.lock().unwrap() = err;
    }

    pub fn fail_status(&self, id: &str, err: Option<GatewayError>) {
        let mut errors = self.status_errors.lock().unwrap();
        match err {
            Some(err) => errors.insert(DeviceId::from(id), err),
            None => errors.remove(&DeviceId::from(id)),
        };
    }

    pub fn fail_commands(&self, err: Option<GatewayError>) {
        *self.command_error.lock().unwrap() = err;
    }

    /// Block the next `list_devices` call until [`release_listing`].
    pub fn hold_listing(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn release_listing(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.release.notify_one();
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<(DeviceId, DeviceCommand)> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if let Some(err) = self.list_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn get_status(&self, device_id: &DeviceId) -> Result<DeviceStatus, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.status_errors.lock().unwrap().get(device_id).cloned() {
            return Err(err);
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_command(
        &self,
        device_id: &DeviceId,
        command: &DeviceCommand,
    ) -> Result<(), GatewayError> {
        if let Some(err) = self.command_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.commands
            .lock()
            .unwrap()
            .push((device_id.clone(), command.clone()));
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn curtain(id: &str) -> DeviceInfo {
    let mut info = DeviceInfo::new(id, format!("Curtain {id}"), DeviceType::Curtain);
    info.calibrated = true;
    info
}

pub fn grouped_curtain(id: &str, master: bool) -> DeviceInfo {
    let mut info = curtain(id);
    info.grouped = true;
    info.is_group_master = master;
    info
}

pub fn bot(id: &str) -> DeviceInfo {
    DeviceInfo::new(id, format!("Bot {id}"), DeviceType::Bot)
}

pub fn curtain_status(slide_position: u8, moving: bool) -> Value {
    json!({ "slidePosition": slide_position, "moving": moving, "calibrate": true })
}
