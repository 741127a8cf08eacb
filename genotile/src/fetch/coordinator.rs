//! At-most-once tile fetching.
//!
//! The coordinator is the only place a tile moves through its fetch states.
//! A fetch is spawned onto the runtime when an `Empty` tile is requested;
//! its result comes back over a channel and is applied by the owning engine
//! on the render thread, so cache state has a single writer.
//!
//! ```text
//! request_tile_data ─▶ Empty→Loading ─▶ spawn(source.fetch)
//!                                              │
//!                      completions channel ◀───┘
//!                              │
//! poll_completions ◀───────────┘ ─▶ Loading→Complete (+listeners) | Loading→Empty
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{FetchError, FetchRequest, TileSource};
use crate::store::{BlockStore, TileRequester};
use crate::tile::{Tile, TileKey, TilePayload};

/// A finished fetch, waiting to be applied.
#[derive(Debug)]
pub struct Completion<P> {
    pub fetch_id: u64,
    pub key: TileKey,
    pub request: FetchRequest,
    pub result: Result<P, FetchError>,
}

/// What applying a completion did to its tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The tile is now `Complete`.
    Completed(TileKey),
    /// The fetch failed; the tile is `Empty` again.
    Failed(TileKey),
    /// The tile no longer exists or is loading from a newer fetch; the
    /// result was dropped.
    Orphaned(TileKey),
}

impl FetchOutcome {
    pub fn key(&self) -> &TileKey {
        match self {
            FetchOutcome::Completed(key) | FetchOutcome::Failed(key) | FetchOutcome::Orphaned(key) => {
                key
            }
        }
    }
}

/// Fetch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Fetches spawned.
    pub issued: u64,
    /// Fetches that filled their tile.
    pub completed: u64,
    /// Fetches that reverted their tile to `Empty`.
    pub failed: u64,
    /// Completions carrying more samples than requested.
    pub oversized: u64,
    /// Completions dropped because their tile was gone or had moved on.
    pub orphaned: u64,
}

impl FetchStats {
    /// Fetches issued but not yet applied.
    pub fn in_flight(&self) -> u64 {
        self.issued
            .saturating_sub(self.completed + self.failed + self.orphaned)
    }
}

impl fmt::Display for FetchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "issued={} completed={} failed={} oversized={} in_flight={}",
            self.issued,
            self.completed,
            self.failed,
            self.oversized,
            self.in_flight()
        )
    }
}

/// Issues fetches for tiles and applies their results.
pub struct FetchCoordinator<P> {
    source: Arc<dyn TileSource<P>>,
    runtime: Handle,
    completions_tx: mpsc::UnboundedSender<Completion<P>>,
    completions_rx: mpsc::UnboundedReceiver<Completion<P>>,
    next_fetch_id: u64,
    stats: FetchStats,
}

impl<P: TilePayload> FetchCoordinator<P> {
    /// Create a coordinator spawning fetches on `runtime`.
    pub fn new(source: Arc<dyn TileSource<P>>, runtime: Handle) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            source,
            runtime,
            completions_tx,
            completions_rx,
            next_fetch_id: 0,
            stats: FetchStats::default(),
        }
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Apply every completion that has arrived, without waiting.
    pub fn poll_completions(&mut self, store: &mut BlockStore<P>) -> Vec<FetchOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            outcomes.push(self.apply(store, completion));
        }
        outcomes
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn next_completion(&mut self, store: &mut BlockStore<P>) -> Option<FetchOutcome> {
        if self.stats.in_flight() == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(store, completion))
    }

    /// Apply one completion to its tile.
    pub fn apply(&mut self, store: &mut BlockStore<P>, completion: Completion<P>) -> FetchOutcome {
        let Completion {
            fetch_id,
            key,
            request,
            result,
        } = completion;

        let Some(tile) = store.tile_mut(&key) else {
            self.stats.orphaned += 1;
            debug!(tile = %key, "Dropping completion for unknown tile");
            return FetchOutcome::Orphaned(key);
        };
        if tile.fetch_id() != Some(fetch_id) {
            self.stats.orphaned += 1;
            debug!(tile = %key, fetch_id, state = %tile.state(), "Dropping completion from a superseded fetch");
            return FetchOutcome::Orphaned(key);
        }

        match result {
            Ok(payload) => {
                let expected = request.expected_samples();
                let received = payload.sample_count();
                if received as u64 > expected {
                    self.stats.oversized += 1;
                    warn!(
                        tile = %key,
                        expected,
                        received,
                        "Tile payload larger than requested, using it as is"
                    );
                }
                match tile.complete(payload) {
                    Some(listeners) => {
                        self.stats.completed += 1;
                        debug!(tile = %key, samples = received, listeners, "Tile fetch complete");
                        FetchOutcome::Completed(key)
                    }
                    None => {
                        self.stats.orphaned += 1;
                        debug!(tile = %key, state = %tile.state(), "Dropping completion for tile not loading");
                        FetchOutcome::Orphaned(key)
                    }
                }
            }
            Err(e) => {
                if tile.fail() {
                    self.stats.failed += 1;
                    warn!(tile = %key, error = %e, "Tile fetch failed, tile reverted to empty");
                    FetchOutcome::Failed(key)
                } else {
                    self.stats.orphaned += 1;
                    FetchOutcome::Orphaned(key)
                }
            }
        }
    }
}

impl<P: TilePayload> TileRequester<P> for FetchCoordinator<P> {
    fn request_tile_data(&mut self, tile: &mut Tile<P>) {
        let fetch_id = self.next_fetch_id;
        if !tile.begin_fetch(fetch_id) {
            return;
        }
        self.next_fetch_id += 1;

        let request = FetchRequest::for_tile(tile);
        let key = tile.key().clone();
        self.stats.issued += 1;
        debug!(
            tile = %key,
            fetch_id,
            start = request.start,
            end = request.end,
            sampling_rate = request.sampling_rate,
            "Fetching tile"
        );

        let fetch = self.source.fetch(request.clone());
        let completions = self.completions_tx.clone();
        self.runtime.spawn(async move {
            let result = fetch.await;
            // receiver gone means the engine was dropped
            let _ = completions.send(Completion {
                fetch_id,
                key,
                request,
                result,
            });
        });
    }
}
