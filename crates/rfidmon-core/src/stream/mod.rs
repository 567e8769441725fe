// ── Reactive view streams ──
//
// Subscription types for consuming the aggregator's published views.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A subscription to one published view.
///
/// Provides point-in-time snapshot access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`. New
/// subscribers see the latest snapshot immediately.
pub struct ViewStream<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> ViewStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the publisher has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream`. The first item is the current snapshot.
    pub fn into_stream(self) -> ViewWatchStream<T> {
        ViewWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct ViewWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<T>,
}

impl<T: Clone + Send + Sync + 'static> Stream for ViewWatchStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_subscriber_sees_latest_snapshot() {
        let (tx, _) = watch::channel(1u32);
        tx.send_replace(5);

        let view = ViewStream::new(tx.subscribe());
        assert_eq!(*view.current(), 5);
    }

    #[tokio::test]
    async fn changed_tracks_updates() {
        let (tx, _) = watch::channel(0u32);
        let mut view = ViewStream::new(tx.subscribe());

        tx.send_replace(7);
        assert_eq!(view.changed().await, Some(7));
        assert_eq!(*view.current(), 7);

        drop(tx);
        assert_eq!(view.changed().await, None);
    }

    #[test]
    fn changed_stays_pending_until_a_send() {
        use tokio_test::{assert_pending, assert_ready_eq, task};

        let (tx, _) = watch::channel(0u32);
        let mut view = ViewStream::new(tx.subscribe());
        let mut next = task::spawn(view.changed());

        assert_pending!(next.poll());
        tx.send_replace(3);
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Some(3));
    }

    #[tokio::test]
    async fn stream_yields_current_then_changes() {
        use tokio_stream::StreamExt;

        let (tx, _) = watch::channel(String::from("a"));
        let mut stream = ViewStream::new(tx.subscribe()).into_stream();

        assert_eq!(stream.next().await.as_deref(), Some("a"));
        tx.send_replace("b".into());
        assert_eq!(stream.next().await.as_deref(), Some("b"));
    }
}
