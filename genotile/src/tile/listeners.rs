//! One-shot completion listeners.
//!
//! Each tile carries a small list of callbacks that run once, the first time
//! the tile reaches `Complete`. Registration returns a [`ListenerId`] so the
//! caller (typically the texture manager) can withdraw interest when its
//! block is evicted before the data arrives.

use super::TileKey;

/// Handle returned by `Tile::add_complete_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnOnce(&TileKey) + Send>;

#[derive(Default)]
pub(crate) struct CompleteListeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

impl CompleteListeners {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Run and drop every registered listener.
    pub(crate) fn fire(&mut self, key: &TileKey) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let count = entries.len();
        for (_, listener) in entries {
            listener(key);
        }
        count
    }
}

impl std::fmt::Debug for CompleteListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompleteListeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fire_runs_each_listener_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut listeners = CompleteListeners::default();
        listeners.add(counting_listener(&counter));
        listeners.add(counting_listener(&counter));

        let key = TileKey::new("chr1", 0, 0, 0);
        assert_eq!(listeners.fire(&key), 2);
        assert_eq!(listeners.fire(&key), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_removed_listener_never_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut listeners = CompleteListeners::default();
        let id = listeners.add(counting_listener(&counter));

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.fire(&TileKey::new("chr1", 0, 0, 0));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut listeners = CompleteListeners::default();
        let a = listeners.add(Box::new(|_| {}));
        let b = listeners.add(Box::new(|_| {}));
        assert_ne!(a, b);
        assert_eq!(listeners.len(), 2);
    }
}
