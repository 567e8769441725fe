// ── Bounded append-only journal ──
//
// Ordered storage whose full snapshot is published through a `watch`
// channel on every append. When a capacity is set the oldest entries
// are evicted first.

use std::sync::Arc;

use tokio::sync::watch;

pub(crate) struct Journal<T: Clone + Send + Sync + 'static> {
    capacity: Option<usize>,
    snapshot: watch::Sender<Arc<Vec<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Journal<T> {
    /// `None` keeps every entry.
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self { capacity, snapshot }
    }

    pub(crate) fn push(&self, entry: T) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| {
            let entries = Arc::make_mut(snap);
            entries.push(entry);
            evict_oldest(entries, self.capacity);
        });
    }

    /// Append only when `accept` approves the current last entry.
    /// Returns `true` if the entry was appended.
    pub(crate) fn push_if(&self, entry: T, accept: impl FnOnce(Option<&T>) -> bool) -> bool {
        self.snapshot.send_if_modified(|snap| {
            if !accept(snap.last()) {
                return false;
            }
            let entries = Arc::make_mut(snap);
            entries.push(entry);
            evict_oldest(entries, self.capacity);
            true
        })
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<T>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<T>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn clear(&self) {
        self.snapshot.send_modify(|snap| *snap = Arc::new(Vec::new()));
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }
}

fn evict_oldest<T>(entries: &mut Vec<T>, capacity: Option<usize>) {
    if let Some(cap) = capacity {
        if entries.len() > cap {
            let excess = entries.len() - cap;
            entries.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_keeps_everything() {
        let journal: Journal<u32> = Journal::new(None);
        for n in 0..100 {
            journal.push(n);
        }
        assert_eq!(journal.len(), 100);
        assert_eq!(journal.snapshot().last(), Some(&99));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let journal: Journal<u32> = Journal::new(Some(3));
        for n in 1..=5 {
            journal.push(n);
        }
        assert_eq!(*journal.snapshot(), vec![3, 4, 5]);
    }

    #[test]
    fn push_if_consults_last_entry() {
        let journal: Journal<&str> = Journal::new(None);
        assert!(journal.push_if("a", |last| last != Some(&"a")));
        assert!(!journal.push_if("a", |last| last != Some(&"a")));
        assert!(journal.push_if("b", |last| last != Some(&"b")));
        assert_eq!(*journal.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn rejected_push_does_not_notify() {
        let journal: Journal<u8> = Journal::new(None);
        journal.push(1);
        let mut rx = journal.subscribe();
        rx.mark_unchanged();

        journal.push_if(1, |last| last != Some(&1));
        assert!(!rx.has_changed().unwrap_or(true));

        journal.push(2);
        assert!(rx.has_changed().unwrap_or(false));
    }

    #[test]
    fn snapshots_are_copy_on_write() {
        let journal: Journal<u8> = Journal::new(None);
        journal.push(1);
        let before = journal.snapshot();
        journal.push(2);
        assert_eq!(before.len(), 1);
        assert_eq!(journal.snapshot().len(), 2);
    }

    #[test]
    fn clear_empties_snapshot() {
        let journal: Journal<u8> = Journal::new(Some(2));
        journal.push(1);
        journal.clear();
        assert_eq!(journal.len(), 0);
        assert!(journal.snapshot().last().is_none());
    }
}
