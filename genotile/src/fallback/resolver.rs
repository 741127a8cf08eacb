//! Coarser stand-ins for tiles that are not ready.

use std::collections::HashSet;

use tracing::trace;

use super::OpacityProbe;
use crate::config::{FallbackConfig, MAX_FALLBACK_STEPS};
use crate::store::BlockStore;
use crate::tile::{Tile, TileKey, TilePayload, TileState};

/// An on-screen tile that cannot be drawn opaque yet.
#[derive(Debug, Clone, PartialEq)]
pub struct GapTile {
    pub key: TileKey,
    pub x: u64,
    pub span: u64,
    /// Density the gap tile was requested at.
    pub density: f64,
}

impl GapTile {
    pub fn from_tile<P: TilePayload>(tile: &Tile<P>, density: f64) -> Self {
        Self {
            key: tile.key().clone(),
            x: tile.x(),
            span: tile.span(),
            density,
        }
    }

    pub fn midpoint(&self) -> f64 {
        self.x as f64 + self.span as f64 * 0.5
    }
}

/// A tile drawn behind a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct Fallback {
    pub key: TileKey,
    pub state: TileState,
    pub opacity: f32,
    pub x: u64,
    pub span: u64,
}

impl Fallback {
    pub fn lod_level(&self) -> u32 {
        self.key.lod_level()
    }
}

/// Whether a tile in `state` at `opacity` needs something drawn behind it.
pub fn needs_fallback(state: TileState, opacity: f32) -> bool {
    !(state == TileState::Complete && opacity >= 1.0)
}

/// Picks fallback tiles under per-frame budgets.
///
/// Budgets cap how many distinct loading and still-fading tiles may be used
/// as fallbacks in one frame; a tile already accepted this frame can back
/// further gaps without spending budget again.
#[derive(Debug)]
pub struct FallbackResolver {
    config: FallbackConfig,
    loading_left: usize,
    fading_left: usize,
    accepted: HashSet<TileKey>,
}

impl FallbackResolver {
    pub fn new(config: FallbackConfig) -> Self {
        Self {
            loading_left: config.loading_budget,
            fading_left: config.fading_budget,
            config,
            accepted: HashSet::new(),
        }
    }

    /// Restore the budgets for a new frame.
    pub fn begin_frame(&mut self) {
        self.loading_left = self.config.loading_budget;
        self.fading_left = self.config.fading_budget;
        self.accepted.clear();
    }

    pub fn loading_budget_left(&self) -> usize {
        self.loading_left
    }

    pub fn fading_budget_left(&self) -> usize {
        self.fading_left
    }

    /// Fallbacks for `gap`, finest first.
    ///
    /// Walks density multipliers `2^1, 2^2, ...` looking up the tile under
    /// the gap's midpoint, without requesting data. Stops at the first fully
    /// opaque fallback, above the highest initialized LOD, or after
    /// `max_steps`.
    pub fn resolve<P: TilePayload>(
        &mut self,
        store: &mut BlockStore<P>,
        gap: &GapTile,
        probe: &mut dyn OpacityProbe,
    ) -> Vec<Fallback> {
        let set_id = gap.key.set_id();
        let center = gap.midpoint();
        let max_steps = self.config.max_steps.min(MAX_FALLBACK_STEPS);
        let mut fallbacks: Vec<Fallback> = Vec::new();

        for step in 1..=max_steps {
            let density = gap.density * 2f64.powi(step as i32);
            if !store.is_within_initialized_lod_range(set_id, density) {
                break;
            }
            let Some(tile) = store.get_tile(set_id, center, density, None) else {
                break;
            };
            if tile.lod_level() <= gap.key.lod_level() {
                continue;
            }
            let key = tile.key();
            if fallbacks.iter().any(|f| &f.key == key) {
                continue;
            }

            let state = tile.state();
            let opacity = probe.opacity(key, state);
            let fallback = Fallback {
                key: key.clone(),
                state,
                opacity,
                x: tile.x(),
                span: tile.span(),
            };

            match state {
                TileState::Empty => continue,
                TileState::Loading => {
                    if !self.spend(key, BudgetKind::Loading) {
                        trace!(tile = %key, "Loading fallback over budget");
                        continue;
                    }
                    fallbacks.push(fallback);
                }
                TileState::Complete if opacity < 1.0 => {
                    if !self.spend(key, BudgetKind::Fading) {
                        trace!(tile = %key, "Fading fallback over budget");
                        continue;
                    }
                    fallbacks.push(fallback);
                }
                TileState::Complete => {
                    fallbacks.push(fallback);
                    break;
                }
            }
        }
        fallbacks
    }

    fn spend(&mut self, key: &TileKey, kind: BudgetKind) -> bool {
        if self.accepted.contains(key) {
            return true;
        }
        let budget = match kind {
            BudgetKind::Loading => &mut self.loading_left,
            BudgetKind::Fading => &mut self.fading_left,
        };
        if *budget == 0 {
            return false;
        }
        *budget -= 1;
        self.accepted.insert(key.clone());
        true
    }
}

#[derive(Debug, Clone, Copy)]
enum BudgetKind {
    Loading,
    Fading,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockConfig;
    use crate::fallback::{FadeTracker, FullyOpaque};
    use crate::store::TileRequester;
    use crate::tile::SignalPayload;
    use std::time::{Duration, Instant};

    /// Requester that flips tiles to loading without fetching.
    struct MarkLoading;

    impl TileRequester<SignalPayload> for MarkLoading {
        fn request_tile_data(&mut self, tile: &mut Tile<SignalPayload>) {
            tile.begin_loading();
        }
    }

    fn store() -> BlockStore<SignalPayload> {
        BlockStore::new(BlockConfig::default())
    }

    fn load(store: &mut BlockStore<SignalPayload>, density: f64) {
        store.get_tiles("chr1", 0.0, 1024.0, density, Some(&mut MarkLoading), |_| {});
    }

    fn complete(store: &mut BlockStore<SignalPayload>, lod_level: u32) {
        let tile = store.tile_mut(&TileKey::new("chr1", lod_level, 0, 0)).unwrap();
        tile.complete(SignalPayload::new(vec![0.0; 1024]));
    }

    fn gap(store: &mut BlockStore<SignalPayload>) -> GapTile {
        let tile = store.get_tile("chr1", 0.0, 1.0, None).unwrap();
        GapTile::from_tile(tile, 1.0)
    }

    #[test]
    fn test_needs_fallback() {
        assert!(needs_fallback(TileState::Loading, 0.0));
        assert!(needs_fallback(TileState::Complete, 0.5));
        assert!(!needs_fallback(TileState::Complete, 1.0));
    }

    #[test]
    fn test_opaque_coarser_tile_stops_search() {
        let mut store = store();
        load(&mut store, 1.0);
        load(&mut store, 2.0);
        load(&mut store, 4.0);
        complete(&mut store, 1);
        complete(&mut store, 2);

        let mut resolver = FallbackResolver::new(FallbackConfig::default());
        let gap = gap(&mut store);
        let fallbacks = resolver.resolve(&mut store, &gap, &mut FullyOpaque);

        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].lod_level(), 1);
        assert_eq!(fallbacks[0].state, TileState::Complete);
    }

    #[test]
    fn test_loading_fallback_then_complete() {
        let mut store = store();
        load(&mut store, 1.0);
        load(&mut store, 2.0);
        load(&mut store, 4.0);
        complete(&mut store, 2);

        let mut resolver = FallbackResolver::new(FallbackConfig::default());
        let gap = gap(&mut store);
        let fallbacks = resolver.resolve(&mut store, &gap, &mut FullyOpaque);

        let levels: Vec<u32> = fallbacks.iter().map(Fallback::lod_level).collect();
        assert_eq!(levels, vec![1, 2]);
        assert_eq!(resolver.loading_budget_left(), 0);
    }

    #[test]
    fn test_loading_budget_is_frame_wide() {
        let mut store = store();
        for density in [1.0, 2.0, 4.0, 8.0] {
            load(&mut store, density);
        }

        let mut resolver = FallbackResolver::new(FallbackConfig::default());
        let gap = gap(&mut store);

        let first = resolver.resolve(&mut store, &gap, &mut FullyOpaque);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].state, TileState::Loading);

        // same tile again costs nothing; no new loading tiles are admitted
        let second = resolver.resolve(&mut store, &gap, &mut FullyOpaque);
        assert_eq!(second, first);

        resolver.begin_frame();
        assert_eq!(resolver.loading_budget_left(), 1);
    }

    #[test]
    fn test_fading_budget_caps_fading_tiles() {
        let mut store = store();
        for density in [1.0, 2.0, 4.0, 8.0] {
            load(&mut store, density);
        }
        complete(&mut store, 1);
        complete(&mut store, 2);
        complete(&mut store, 3);

        let config = FallbackConfig::default().with_loading_budget(0);
        let mut resolver = FallbackResolver::new(config);
        let mut fade = FadeTracker::new(Duration::from_secs(1), Instant::now());
        let gap = gap(&mut store);
        let fallbacks = resolver.resolve(&mut store, &gap, &mut fade);

        // one fading tile admitted; the rest are skipped until the search ends
        let fading: Vec<_> = fallbacks.iter().filter(|f| f.opacity < 1.0).collect();
        assert_eq!(fading.len(), 1);
        assert_eq!(fading[0].lod_level(), 1);
        assert_eq!(resolver.fading_budget_left(), 0);
    }

    #[test]
    fn test_stops_above_initialized_range() {
        let mut store = store();
        load(&mut store, 1.0);

        let mut resolver = FallbackResolver::new(FallbackConfig::default());
        let gap = gap(&mut store);
        assert!(resolver.resolve(&mut store, &gap, &mut FullyOpaque).is_empty());
        assert_eq!(store.block_count(), 1);
    }

    #[test]
    fn test_empty_coarse_tiles_are_skipped() {
        let mut store = store();
        load(&mut store, 1.0);
        store.get_tiles("chr1", 0.0, 1024.0, 2.0, None, |_| {});
        load(&mut store, 4.0);
        complete(&mut store, 2);

        let mut resolver = FallbackResolver::new(FallbackConfig::default());
        let gap = gap(&mut store);
        let fallbacks = resolver.resolve(&mut store, &gap, &mut FullyOpaque);

        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].lod_level(), 2);
    }
}
