// ── Snapshot streams ──
//
// Async counterpart to `SnapshotListener` for consumers that would rather
// await new snapshots than be called back.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Snapshot;

type SnapshotSlot = Option<Arc<Snapshot>>;

/// A subscription to the coordinator's published snapshots.
///
/// Provides both point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream {
    current: SnapshotSlot,
    receiver: watch::Receiver<SnapshotSlot>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<SnapshotSlot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.current.as_ref()
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> SnapshotSlot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published snapshot.
    /// Returns `None` once the coordinator has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            self.receiver.changed().await.ok()?;
            let snap = self.receiver.borrow_and_update().clone();
            if let Some(snap) = snap {
                self.current = Some(Arc::clone(&snap));
                return Some(snap);
            }
        }
    }

    /// Convert into a `Stream` yielding each published snapshot.
    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::from_changes(self.receiver),
        }
    }
}

/// `Stream` adapter backed by the coordinator's `watch` channel.
pub struct SnapshotWatchStream {
    inner: WatchStream<SnapshotSlot>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Some(snap))) => return Poll::Ready(Some(snap)),
                Poll::Ready(Some(None)) => {}
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
