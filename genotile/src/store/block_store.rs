//! Lazily populated, multi-resolution store of blocks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{trace, warn};

use super::{Block, LodMap};
use crate::config::BlockConfig;
use crate::tile::{BlockKey, Tile, TileKey, TilePayload, TileState, MAX_LOD_LEVEL};

/// Issues data requests for empty tiles.
///
/// Implemented by the fetch coordinator; the store only calls it for tiles
/// that are `Empty`.
pub trait TileRequester<P> {
    fn request_tile_data(&mut self, tile: &mut Tile<P>);
}

/// Most tiles a single `get_tiles` call visits; longer ranges are cut short.
pub const MAX_TILES_PER_LOOKUP: u64 = 1 << 16;

type LodLevels<P> = BTreeMap<u32, HashMap<u64, Block<P>>>;

/// Blocks of tiles, addressed by `(set, lod level, block index, row)`.
///
/// Blocks are created on first lookup and never removed; tile metadata and
/// payloads outlive any GPU texture built from them.
pub struct BlockStore<P> {
    config: BlockConfig,
    lod_map: LodMap,
    maximum_x: Option<u64>,
    sets: HashMap<Arc<str>, LodLevels<P>>,
    clock: u64,
}

impl<P: TilePayload> BlockStore<P> {
    pub fn new(config: BlockConfig) -> Self {
        Self {
            config,
            lod_map: LodMap::Identity,
            maximum_x: None,
            sets: HashMap::new(),
            clock: 0,
        }
    }

    pub fn with_lod_map(mut self, lod_map: LodMap) -> Self {
        self.lod_map = lod_map;
        self
    }

    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    pub fn lod_map(&self) -> &LodMap {
        &self.lod_map
    }

    pub fn set_lod_map(&mut self, lod_map: LodMap) {
        self.lod_map = lod_map;
    }

    /// Exclusive upper bound for `get_tiles` ranges (the contig length).
    pub fn set_maximum_x(&mut self, maximum_x: u64) {
        self.maximum_x = Some(maximum_x);
    }

    pub fn maximum_x(&self) -> Option<u64> {
        self.maximum_x
    }

    /// Quantize a density (bases per sample) to the LOD level this store uses.
    pub fn lod_level_for_density(&self, density: f64) -> u32 {
        let raw = density.max(1.0).log2().floor();
        let level = if raw >= MAX_LOD_LEVEL as f64 {
            MAX_LOD_LEVEL
        } else {
            raw as u32
        };
        let stride = self.config.lod_stride();
        self.lod_map.map(level - level % stride).min(MAX_LOD_LEVEL)
    }

    /// Visit every tile covering `[x0, x1)` at the LOD for `density`.
    ///
    /// Missing blocks are created. With a `requester`, every `Empty` tile is
    /// handed to it before being visited. Empty or inverted ranges visit
    /// nothing, and at most [`MAX_TILES_PER_LOOKUP`] tiles are visited from
    /// the start of the range. Returns the number of tiles visited.
    pub fn get_tiles<F>(
        &mut self,
        set_id: &str,
        x0: f64,
        x1: f64,
        density: f64,
        mut requester: Option<&mut dyn TileRequester<P>>,
        mut visit: F,
    ) -> usize
    where
        F: FnMut(&Tile<P>),
    {
        let x0 = x0.max(0.0);
        let mut x1 = x1.max(0.0);
        if let Some(maximum_x) = self.maximum_x {
            x1 = x1.min(maximum_x as f64);
        }
        if !(x1 > x0) {
            return 0;
        }

        let lod_level = self.lod_level_for_density(density);
        let scale = (1u64 << lod_level) as f64;
        let lod_x0 = (x0 / scale).floor() as u64;
        let lod_x1 = (x1 / scale).ceil() as u64;
        if lod_x1 <= lod_x0 {
            return 0;
        }

        let config = self.config;
        let tile_width = config.tile_width() as u64;
        let rows_per_block = config.rows_per_block() as u64;
        let first_tile = lod_x0 / tile_width;
        let mut last_tile = (lod_x1 - 1) / tile_width;
        if last_tile - first_tile >= MAX_TILES_PER_LOOKUP {
            warn!(
                set = set_id,
                lod_level,
                requested = last_tile - first_tile + 1,
                limit = MAX_TILES_PER_LOOKUP,
                "Tile range too long, truncating"
            );
            last_tile = first_tile + MAX_TILES_PER_LOOKUP - 1;
        }

        let set_key = self.set_key(set_id);
        let blocks = self
            .sets
            .entry(Arc::clone(&set_key))
            .or_default()
            .entry(lod_level)
            .or_default();

        let mut visited = 0;
        for tile_index in first_tile..=last_tile {
            let block_index = tile_index / rows_per_block;
            let row = (tile_index % rows_per_block) as usize;
            let block = blocks.entry(block_index).or_insert_with(|| {
                trace!(set = %set_key, lod_level, block_index, "Creating block");
                Block::new(BlockKey::new(Arc::clone(&set_key), lod_level, block_index), &config)
            });
            let tile = block.row_at(row);
            if let Some(requester) = requester.as_deref_mut() {
                if tile.state() == TileState::Empty {
                    requester.request_tile_data(tile);
                }
            }
            visit(&*tile);
            visited += 1;
        }
        visited
    }

    /// The tile containing `x` at the LOD for `density`.
    ///
    /// Returns `None` when that LOD lies above every level initialized so far.
    pub fn get_tile(
        &mut self,
        set_id: &str,
        x: f64,
        density: f64,
        requester: Option<&mut dyn TileRequester<P>>,
    ) -> Option<&Tile<P>> {
        let lod_level = self.lod_level_for_density(density);
        let scale = (1u64 << lod_level) as f64;
        let lod_x = (x.max(0.0) / scale).floor() as u64;
        self.get_tile_from_lod_x(set_id, lod_level as i64, lod_x, requester)
    }

    /// The tile containing `lod_x` at an explicit LOD level.
    ///
    /// Returns `None` without creating anything if `lod_level` is negative or
    /// above the highest level initialized for the set. Within range, the
    /// containing block is created on demand.
    pub fn get_tile_from_lod_x(
        &mut self,
        set_id: &str,
        lod_level: i64,
        lod_x: u64,
        requester: Option<&mut dyn TileRequester<P>>,
    ) -> Option<&Tile<P>> {
        let highest = self.highest_lod(set_id)?;
        let lod_level = u32::try_from(lod_level).ok()?;
        if lod_level > highest {
            return None;
        }

        let config = self.config;
        let tile_index = lod_x / config.tile_width() as u64;
        let block_index = tile_index / config.rows_per_block() as u64;
        let row = (tile_index % config.rows_per_block() as u64) as usize;

        let set_key = self.set_key(set_id);
        let block = self
            .sets
            .entry(Arc::clone(&set_key))
            .or_default()
            .entry(lod_level)
            .or_default()
            .entry(block_index)
            .or_insert_with(|| {
                Block::new(BlockKey::new(set_key, lod_level, block_index), &config)
            });
        let tile = block.row_at(row);
        if let Some(requester) = requester {
            if tile.state() == TileState::Empty {
                requester.request_tile_data(tile);
            }
        }
        Some(&*tile)
    }

    /// Whether `density` quantizes to a level no higher than any initialized one.
    pub fn is_within_initialized_lod_range(&self, set_id: &str, density: f64) -> bool {
        self.highest_lod(set_id)
            .is_some_and(|highest| self.lod_level_for_density(density) <= highest)
    }

    /// Highest LOD level holding at least one block.
    pub fn highest_lod(&self, set_id: &str) -> Option<u32> {
        self.sets
            .get(set_id)?
            .iter()
            .rev()
            .find(|(_, blocks)| !blocks.is_empty())
            .map(|(level, _)| *level)
    }

    pub fn tile(&self, key: &TileKey) -> Option<&Tile<P>> {
        self.block(&key.block)?.row(key.row_index)
    }

    pub fn tile_mut(&mut self, key: &TileKey) -> Option<&mut Tile<P>> {
        self.block_mut(&key.block)?.row_mut(key.row_index)
    }

    pub fn block(&self, key: &BlockKey) -> Option<&Block<P>> {
        self.sets
            .get(&*key.set_id)?
            .get(&key.lod_level)?
            .get(&key.block_index)
    }

    pub fn block_mut(&mut self, key: &BlockKey) -> Option<&mut Block<P>> {
        self.sets
            .get_mut(&*key.set_id)?
            .get_mut(&key.lod_level)?
            .get_mut(&key.block_index)
    }

    /// Stamp a tile and its block with the next logical time.
    pub fn mark_last_used(&mut self, key: &TileKey) -> bool {
        self.clock += 1;
        let tick = self.clock;
        match self.block_mut(&key.block) {
            Some(block) => {
                block.set_last_used(tick);
                if let Some(tile) = block.row_mut(key.row_index) {
                    tile.set_last_used(tick);
                }
                true
            }
            None => false,
        }
    }

    /// Stamp a whole block with the next logical time.
    pub fn mark_block_used(&mut self, key: &BlockKey) -> bool {
        self.clock += 1;
        let tick = self.clock;
        match self.block_mut(key) {
            Some(block) => {
                block.set_last_used(tick);
                true
            }
            None => false,
        }
    }

    pub fn block_count(&self) -> usize {
        self.sets
            .values()
            .flat_map(|levels| levels.values())
            .map(|blocks| blocks.len())
            .sum()
    }

    /// Iterate every block of every set.
    pub fn blocks(&self) -> impl Iterator<Item = &Block<P>> {
        self.sets
            .values()
            .flat_map(|levels| levels.values())
            .flat_map(|blocks| blocks.values())
    }

    pub fn set_ids(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(|id| &**id)
    }

    /// Drop every block of a set.
    pub fn clear_set(&mut self, set_id: &str) -> bool {
        self.sets.remove(set_id).is_some()
    }

    fn set_key(&self, set_id: &str) -> Arc<str> {
        match self.sets.get_key_value(set_id) {
            Some((key, _)) => Arc::clone(key),
            None => Arc::from(set_id),
        }
    }
}
