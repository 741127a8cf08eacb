//! Per-source cache controller.
//!
//! A [`TileEngine`] owns all mutable cache state for one data source: the
//! block store and the fetch coordinator. Fetch results arrive over a channel
//! and only touch the cache when the owner calls
//! [`TileEngine::poll_completions`] (once per frame) or awaits
//! [`TileEngine::next_completion`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use genotile::config::BlockConfig;
//! use genotile::engine::TileEngine;
//! use genotile::fetch::{FetchError, FetchRequest, FnSource};
//! use genotile::tile::SignalPayload;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let source = FnSource::new(|request: FetchRequest| async move {
//!     Ok::<_, FetchError>(SignalPayload::new(vec![1.0; request.expected_samples() as usize]))
//! });
//! let mut engine: TileEngine<SignalPayload> = TileEngine::new(
//!     Arc::new(source),
//!     BlockConfig::default(),
//!     tokio::runtime::Handle::current(),
//! );
//!
//! engine.get_tiles("chr1", 0.0, 2048.0, 1.0, true, |_| {});
//! while engine.next_completion().await.is_some() {}
//!
//! let mut complete = 0;
//! engine.get_tiles("chr1", 0.0, 2048.0, 1.0, false, |tile| {
//!     if tile.is_complete() {
//!         complete += 1;
//!     }
//! });
//! assert_eq!(complete, 2);
//! # }
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::BlockConfig;
use crate::fetch::{FetchCoordinator, FetchOutcome, FetchStats, TileSource};
use crate::store::{BlockStore, LodMap, TileRequester};
use crate::tile::{Tile, TileKey, TilePayload};

/// Cache controller for one data source.
pub struct TileEngine<P> {
    store: BlockStore<P>,
    fetcher: FetchCoordinator<P>,
}

impl<P: TilePayload> TileEngine<P> {
    /// Create an engine fetching from `source`, spawning fetches on `runtime`.
    pub fn new(source: Arc<dyn TileSource<P>>, config: BlockConfig, runtime: Handle) -> Self {
        Self {
            store: BlockStore::new(config),
            fetcher: FetchCoordinator::new(source, runtime),
        }
    }

    pub fn with_lod_map(mut self, lod_map: LodMap) -> Self {
        self.store.set_lod_map(lod_map);
        self
    }

    /// Visit the tiles covering `[x0, x1)` at `density`.
    ///
    /// With `request_data`, every `Empty` tile visited gets a fetch.
    pub fn get_tiles<F>(
        &mut self,
        set_id: &str,
        x0: f64,
        x1: f64,
        density: f64,
        request_data: bool,
        visit: F,
    ) -> usize
    where
        F: FnMut(&Tile<P>),
    {
        let requester = requester(&mut self.fetcher, request_data);
        self.store.get_tiles(set_id, x0, x1, density, requester, visit)
    }

    /// The tile containing `x` at `density`, if that LOD is initialized.
    pub fn get_tile(
        &mut self,
        set_id: &str,
        x: f64,
        density: f64,
        request_data: bool,
    ) -> Option<&Tile<P>> {
        let requester = requester(&mut self.fetcher, request_data);
        self.store.get_tile(set_id, x, density, requester)
    }

    /// The tile containing `lod_x` at an explicit LOD level.
    pub fn get_tile_from_lod_x(
        &mut self,
        set_id: &str,
        lod_level: i64,
        lod_x: u64,
        request_data: bool,
    ) -> Option<&Tile<P>> {
        let requester = requester(&mut self.fetcher, request_data);
        self.store
            .get_tile_from_lod_x(set_id, lod_level, lod_x, requester)
    }

    pub fn tile(&self, key: &TileKey) -> Option<&Tile<P>> {
        self.store.tile(key)
    }

    /// Mutable tile access, for attaching listeners.
    pub fn tile_mut(&mut self, key: &TileKey) -> Option<&mut Tile<P>> {
        self.store.tile_mut(key)
    }

    /// Stamp a drawn tile (and its block) as most recently used.
    pub fn mark_last_used(&mut self, key: &TileKey) -> bool {
        self.store.mark_last_used(key)
    }

    pub fn set_maximum_x(&mut self, maximum_x: u64) {
        self.store.set_maximum_x(maximum_x);
    }

    /// Apply all fetch results that have arrived.
    pub fn poll_completions(&mut self) -> Vec<FetchOutcome> {
        self.fetcher.poll_completions(&mut self.store)
    }

    /// Wait for and apply the next fetch result; `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<FetchOutcome> {
        self.fetcher.next_completion(&mut self.store).await
    }

    pub fn stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    pub fn store(&self) -> &BlockStore<P> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BlockStore<P> {
        &mut self.store
    }
}

fn requester<P: TilePayload>(
    fetcher: &mut FetchCoordinator<P>,
    request_data: bool,
) -> Option<&mut dyn TileRequester<P>> {
    if request_data {
        Some(fetcher as &mut dyn TileRequester<P>)
    } else {
        None
    }
}
