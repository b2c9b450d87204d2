// ── Refresh coordinator ──
//
// One shared, de-duplicated refresh cycle between every device-facing
// consumer and the rate-limited vendor cloud. Handles the periodic timer,
// single-flight forced refreshes, snapshot publication and failure
// classification.

mod listeners;
mod stream;

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::{StreamExt, TryStreamExt, stream as futures_stream};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::model::{Device, DeviceInfo, DeviceStatus, Snapshot};

pub use listeners::{SnapshotListener, SubscriptionId};
pub use stream::{SnapshotStream, SnapshotWatchStream};

use listeners::ListenerRegistry;

type RefreshResult = Result<Arc<Snapshot>, CoreError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

// ── CoordinatorState ─────────────────────────────────────────────

/// Lifecycle of a coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No cycle in flight. The last cycle may have succeeded or failed
    /// transiently; see [`RefreshCoordinator::last_error`].
    Idle,
    /// A cycle is in flight.
    Refreshing,
    /// The vendor rejected the credentials. Terminal.
    Failed,
}

// ── RefreshCoordinator ───────────────────────────────────────────

/// Shared polling coordinator for one integration instance.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Entity adapters hold a
/// clone, register as listeners, and send commands through
/// [`gateway()`](Self::gateway) directly.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    gateway: Arc<dyn Gateway>,
    config: CoordinatorConfig,
    snapshot: watch::Sender<Option<Arc<Snapshot>>>,
    state: watch::Sender<CoordinatorState>,
    last_error: watch::Sender<Option<CoreError>>,
    listeners: ListenerRegistry,
    in_flight: Mutex<Option<InFlight>>,
    cycles: AtomicU64,
    cancel: CancellationToken,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

/// The cycle currently running, shared by every caller that asked for it.
struct InFlight {
    cycle: u64,
    result: SharedRefresh,
}

impl RefreshCoordinator {
    /// Create a coordinator. Does NOT fetch anything -- call
    /// [`first_refresh()`](Self::first_refresh) and then
    /// [`start()`](Self::start).
    pub fn new(gateway: Arc<dyn Gateway>, config: CoordinatorConfig) -> Self {
        let (snapshot, _) = watch::channel(None);
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let (last_error, _) = watch::channel(None);

        Self {
            inner: Arc::new(CoordinatorInner {
                gateway,
                config,
                snapshot,
                state,
                last_error,
                listeners: ListenerRegistry::new(),
                in_flight: Mutex::new(None),
                cycles: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                task_handle: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// The gateway used for refreshes; adapters send commands through it.
    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.inner.gateway
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Run a refresh cycle, or join the one already in flight.
    ///
    /// The cycle runs on its own task and always completes, even if every
    /// caller stops waiting. On success the new snapshot is stored and all
    /// listeners are notified before this returns. On failure the previous
    /// snapshot stays current.
    pub async fn refresh(&self) -> RefreshResult {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::CoordinatorShutdown);
        }
        if self.state() == CoordinatorState::Failed {
            return Err(self.terminal_error());
        }

        let shared = {
            let mut slot = self.inner.in_flight.lock().await;
            // A failing cycle may have cleared the slot since the check above.
            if self.state() == CoordinatorState::Failed {
                return Err(self.terminal_error());
            }
            if let Some(in_flight) = slot.as_ref() {
                debug!(cycle = in_flight.cycle, "joining in-flight refresh");
                in_flight.result.clone()
            } else {
                let cycle = self.inner.cycles.fetch_add(1, Ordering::Relaxed) + 1;
                let result = self.spawn_cycle(cycle);
                *slot = Some(InFlight {
                    cycle,
                    result: result.clone(),
                });
                result
            }
        };

        shared.await
    }

    /// Setup-time refresh: a recoverable failure means the integration is
    /// not ready yet rather than a logged update failure.
    pub async fn first_refresh(&self) -> RefreshResult {
        self.refresh().await.map_err(|err| match err {
            CoreError::UpdateFailed { message } => CoreError::SetupNotReady { message },
            other => other,
        })
    }

    fn spawn_cycle(&self, cycle: u64) -> SharedRefresh {
        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.run_cycle(cycle).await });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(CoreError::UpdateFailed {
                    message: format!("refresh task aborted: {e}"),
                })
            })
        }
        .boxed()
        .shared()
    }

    async fn run_cycle(&self, cycle: u64) -> RefreshResult {
        self.inner.state.send_replace(CoordinatorState::Refreshing);
        debug!(cycle, "refresh cycle started");

        let outcome = self.fetch_snapshot(cycle).await.map(Arc::new);

        match &outcome {
            Ok(snapshot) => {
                self.inner.snapshot.send_replace(Some(Arc::clone(snapshot)));
                self.inner.last_error.send_replace(None);
                let notified = self.inner.listeners.notify(snapshot);
                self.inner.state.send_replace(CoordinatorState::Idle);
                debug!(
                    cycle,
                    devices = snapshot.len(),
                    listeners = notified,
                    "refresh cycle complete"
                );
            }
            Err(err) if err.is_auth_failure() => {
                self.inner.last_error.send_replace(Some(err.clone()));
                self.inner.state.send_replace(CoordinatorState::Failed);
                error!(cycle, error = %err, "credentials rejected; coordinator stopped");
            }
            Err(err) => {
                self.inner.last_error.send_replace(Some(err.clone()));
                self.inner.state.send_replace(CoordinatorState::Idle);
                debug!(cycle, error = %err, "refresh cycle failed");
            }
        }

        let mut slot = self.inner.in_flight.lock().await;
        if slot.as_ref().is_some_and(|f| f.cycle == cycle) {
            *slot = None;
        }

        outcome
    }

    /// Enumerate cloud-enabled devices and fetch every status in this
    /// cycle. Any gateway failure ends the cycle; nothing partial escapes.
    async fn fetch_snapshot(&self, cycle: u64) -> Result<Snapshot, CoreError> {
        let gateway = &self.inner.gateway;

        let infos: Vec<DeviceInfo> = gateway
            .list_devices()
            .await?
            .into_iter()
            .filter(|d| d.cloud_enabled)
            .collect();

        let requests: Vec<_> = infos
            .iter()
            .map(|info| gateway.get_status(&info.id))
            .collect();

        let statuses: Vec<DeviceStatus> = futures_stream::iter(requests)
            .buffered(self.inner.config.status_concurrency.max(1))
            .try_collect()
            .await?;

        Ok(Snapshot::new(
            cycle,
            infos
                .into_iter()
                .zip(statuses)
                .map(|(info, status)| Device::new(info, status)),
        ))
    }

    fn terminal_error(&self) -> CoreError {
        self.last_error()
            .filter(CoreError::is_auth_failure)
            .unwrap_or_else(|| CoreError::AuthenticationFailed {
                message: "credentials previously rejected".into(),
            })
    }

    // ── Background task ──────────────────────────────────────────

    /// Spawn the periodic refresh task. Idempotent.
    pub async fn start(&self) {
        let mut handle = self.inner.task_handle.lock().await;
        if handle.is_some() || self.inner.cancel.is_cancelled() {
            return;
        }

        let period = self.inner.config.refresh_interval;
        *handle = Some(tokio::spawn(refresh_task(
            Arc::downgrade(&self.inner),
            period,
            self.inner.cancel.clone(),
        )));
        info!(interval_secs = period.as_secs(), "periodic refresh started");
    }

    /// Stop the periodic task and wait for it to finish. An in-flight
    /// cycle still runs to completion.
    pub async fn shutdown(&self) {
        self.stop();

        if let Some(handle) = self.inner.task_handle.lock().await.take() {
            let _ = handle.await;
        }
        debug!("refresh coordinator shut down");
    }

    /// Cancel the periodic task and drop every listener without waiting.
    /// Usable from `Drop`; the task exits at its next wake-up.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
        self.inner.listeners.clear();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Register a listener for every successful snapshot, delivered in
    /// registration order. Takes effect from the next cycle.
    pub fn subscribe(&self, listener: Arc<dyn SnapshotListener>) -> SubscriptionId {
        let id = self.inner.listeners.add(listener);
        debug!(subscription = %id, "listener subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.listeners.remove(id);
        if removed {
            debug!(subscription = %id, "listener unsubscribed");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Async view of published snapshots.
    pub fn snapshots(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot.subscribe())
    }

    // ── State observation ────────────────────────────────────────

    /// The last successfully published snapshot, if any.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    /// Error from the most recent cycle, cleared by the next success.
    pub fn last_error(&self) -> Option<CoreError> {
        self.inner.last_error.borrow().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.inner.last_error.borrow().is_none()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Refresh on a fixed interval until cancelled, the credentials are
/// rejected, or every coordinator handle is gone. Transient failures keep
/// the previous snapshot and wait for the next tick; there is no extra
/// backoff.
async fn refresh_task(
    inner: Weak<CoordinatorInner>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(inner) = inner.upgrade() else {
                    debug!("coordinator dropped; periodic refresh ended");
                    break;
                };
                let coordinator = RefreshCoordinator { inner };
                match coordinator.refresh().await {
                    Ok(_) => {}
                    Err(e) if e.is_auth_failure() => {
                        warn!(error = %e, "stopping periodic refresh");
                        break;
                    }
                    Err(CoreError::CoordinatorShutdown) => break,
                    Err(e) => warn!(error = %e, "periodic refresh failed"),
                }
            }
        }
    }
}
