// ── Snapshot listener registry ──
//
// Copy-on-write list of subscribers. Delivery works on the list loaded at
// the start of a notification pass, so a subscribe or unsubscribe racing
// with delivery only takes effect from the next cycle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::model::Snapshot;

/// Consumer notified synchronously after every successful refresh cycle.
pub trait SnapshotListener: Send + Sync {
    fn on_snapshot(&self, snapshot: &Arc<Snapshot>);
}

/// Handle returned by [`subscribe`](crate::RefreshCoordinator::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Entry = (SubscriptionId, Arc<dyn SnapshotListener>);

pub(crate) struct ListenerRegistry {
    entries: ArcSwap<Vec<Entry>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a listener. Registration order is delivery order.
    pub(crate) fn add(&self, listener: Arc<dyn SnapshotListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push((id, Arc::clone(&listener)));
            next
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|(entry_id, _)| *entry_id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub(crate) fn clear(&self) {
        self.entries.store(Arc::new(Vec::new()));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Deliver `snapshot` to every listener registered at call time.
    pub(crate) fn notify(&self, snapshot: &Arc<Snapshot>) -> usize {
        let entries = self.entries.load_full();
        for (_, listener) in entries.iter() {
            listener.on_snapshot(snapshot);
        }
        entries.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SnapshotListener for Recorder {
        fn on_snapshot(&self, _snapshot: &Arc<Snapshot>) {
            self.log.lock().unwrap().push(self.name);
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Recorder> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn notifies_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        registry.add(recorder("b", &log));
        registry.add(recorder("a", &log));
        registry.add(recorder("c", &log));

        let snap = Arc::new(Snapshot::new(1, Vec::new()));
        assert_eq!(registry.notify(&snap), 3);
        registry.notify(&snap);

        assert_eq!(*log.lock().unwrap(), vec!["b", "a", "c", "b", "a", "c"]);
    }

    #[test]
    fn remove_returns_whether_present() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let id = registry.add(recorder("a", &log));

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn removed_listener_is_not_notified() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let a = registry.add(recorder("a", &log));
        registry.add(recorder("b", &log));
        registry.remove(a);

        registry.notify(&Arc::new(Snapshot::new(1, Vec::new())));
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }
}
