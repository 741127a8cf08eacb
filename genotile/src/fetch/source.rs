//! The data-source seam.
//!
//! A [`TileSource`] is injected per data source and turns a range request
//! into a payload future. The future must be `'static`: it is spawned onto
//! the runtime and outlives the call that issued it.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use super::FetchError;
use crate::tile::{Tile, TilePayload};

/// Boxed future type for dyn-compatible async sources.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a source is asked for.
///
/// `start..end` is the absolute range; `sampling_rate` is the number of
/// bases per returned sample, so a well-behaved source returns at most
/// `(end - start) / sampling_rate` samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FetchRequest {
    pub set_id: String,
    pub start: u64,
    pub end: u64,
    pub sampling_rate: u64,
    pub height_px: u64,
}

impl FetchRequest {
    pub fn new(set_id: impl Into<String>, start: u64, end: u64, sampling_rate: u64) -> Self {
        Self {
            set_id: set_id.into(),
            start,
            end,
            sampling_rate: sampling_rate.max(1),
            height_px: 0,
        }
    }

    pub fn with_height(mut self, height_px: u64) -> Self {
        self.height_px = height_px;
        self
    }

    /// The request that fills `tile`.
    pub fn for_tile<P: TilePayload>(tile: &Tile<P>) -> Self {
        Self::new(
            tile.key().set_id(),
            tile.x(),
            tile.end(),
            1u64 << tile.key().lod_level(),
        )
    }

    /// Samples a well-behaved source returns.
    pub fn expected_samples(&self) -> u64 {
        self.end.saturating_sub(self.start) / self.sampling_rate.max(1)
    }

    /// Stable textual form, used to deduplicate in-flight requests.
    pub fn descriptor(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{}:{}-{}@{}x{}",
                self.set_id, self.start, self.end, self.sampling_rate, self.height_px
            )
        })
    }
}

/// Asynchronous payload provider.
///
/// # Implementors
///
/// - `FnSource` - wraps an async closure
/// - `ScriptedSource` - testing: each fetch is resolved by hand
pub trait TileSource<P>: Send + Sync {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<P, FetchError>>;
}

/// Adapts a closure returning a future into a [`TileSource`].
///
/// # Example
///
/// ```
/// use genotile::fetch::{FetchError, FetchRequest, FnSource, TileSource};
/// use genotile::tile::SignalPayload;
///
/// let source = FnSource::new(|request: FetchRequest| async move {
///     Ok::<_, FetchError>(SignalPayload::new(vec![0.0; request.expected_samples() as usize]))
/// });
/// let _future = source.fetch(FetchRequest::new("chr1", 0, 1024, 1));
/// ```
pub struct FnSource<F> {
    fetch: F,
}

impl<F> FnSource<F> {
    pub fn new(fetch: F) -> Self {
        Self { fetch }
    }
}

impl<P, F, Fut> TileSource<P> for FnSource<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<P, FetchError>> + Send + 'static,
{
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<P, FetchError>> {
        Box::pin((self.fetch)(request))
    }
}
