//! Test doubles.
//!
//! [`ScriptedSource`] records every fetch and leaves it pending until the
//! test resolves it, which makes completion ordering deterministic.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::fetch::{BoxFuture, FetchError, FetchRequest, TileSource};

struct PendingFetch<P> {
    request: FetchRequest,
    responder: Option<oneshot::Sender<Result<P, FetchError>>>,
}

/// Source whose fetches are resolved by hand.
pub struct ScriptedSource<P> {
    fetches: Mutex<Vec<PendingFetch<P>>>,
}

impl<P: Send + 'static> ScriptedSource<P> {
    pub fn new() -> Self {
        Self {
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Total fetches received.
    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }

    /// Fetches not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.fetches
            .lock()
            .iter()
            .filter(|fetch| fetch.responder.is_some())
            .count()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.fetches
            .lock()
            .iter()
            .map(|fetch| fetch.request.clone())
            .collect()
    }

    /// Resolve the `index`-th fetch. Returns false if it was already resolved.
    pub fn resolve(&self, index: usize, result: Result<P, FetchError>) -> bool {
        let mut fetches = self.fetches.lock();
        match fetches.get_mut(index).and_then(|fetch| fetch.responder.take()) {
            Some(responder) => responder.send(result).is_ok(),
            None => false,
        }
    }

    /// Resolve every pending fetch with `respond`. Returns how many were resolved.
    pub fn resolve_all<F>(&self, mut respond: F) -> usize
    where
        F: FnMut(&FetchRequest) -> Result<P, FetchError>,
    {
        let mut fetches = self.fetches.lock();
        let mut resolved = 0;
        for fetch in fetches.iter_mut() {
            if let Some(responder) = fetch.responder.take() {
                if responder.send(respond(&fetch.request)).is_ok() {
                    resolved += 1;
                }
            }
        }
        resolved
    }
}

impl<P: Send + 'static> Default for ScriptedSource<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Send + 'static> TileSource<P> for ScriptedSource<P> {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<P, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.fetches.lock().push(PendingFetch {
            request,
            responder: Some(tx),
        });
        Box::pin(async move { rx.await.unwrap_or(Err(FetchError::Dropped)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_waits_for_resolve() {
        let source: ScriptedSource<u32> = ScriptedSource::new();
        let pending = source.fetch(FetchRequest::new("chr1", 0, 8, 1));

        assert_eq!(source.pending_count(), 1);
        assert!(source.resolve(0, Ok(7)));
        assert!(!source.resolve(0, Ok(8)));
        assert_eq!(pending.await, Ok(7));
        assert_eq!(source.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_source_fails_fetch() {
        let source: ScriptedSource<u32> = ScriptedSource::new();
        let pending = source.fetch(FetchRequest::new("chr1", 0, 8, 1));
        drop(source);
        assert_eq!(pending.await, Err(FetchError::Dropped));
    }

    #[tokio::test]
    async fn test_resolve_all() {
        let source: ScriptedSource<u64> = ScriptedSource::new();
        let a = source.fetch(FetchRequest::new("chr1", 0, 8, 1));
        let b = source.fetch(FetchRequest::new("chr1", 8, 16, 1));

        assert_eq!(source.resolve_all(|request| Ok(request.start)), 2);
        assert_eq!(a.await, Ok(0));
        assert_eq!(b.await, Ok(8));
        assert_eq!(source.requests().len(), 2);
    }
}
