//! Fixed-capacity containers of tiles.

use crate::config::BlockConfig;
use crate::tile::{BlockKey, Tile, TilePayload, TileState};

/// A run of `rows_per_block` consecutive tiles at one LOD level.
///
/// All rows are created up front as `Empty`; the row count never changes.
/// A block maps onto one GPU texture of `tile_width × rows_per_block` texels.
#[derive(Debug)]
pub struct Block<P> {
    key: BlockKey,
    rows: Vec<Tile<P>>,
    last_used: u64,
}

impl<P: TilePayload> Block<P> {
    pub(crate) fn new(key: BlockKey, config: &BlockConfig) -> Self {
        let tile_width = config.tile_width() as u64;
        let first_lod_x = key.block_index.saturating_mul(config.block_lod_span());
        let rows = (0..config.rows_per_block())
            .map(|row| {
                let lod_x = first_lod_x.saturating_add(row as u64 * tile_width);
                Tile::new(key.tile(row), lod_x, tile_width)
            })
            .collect();
        Self {
            key,
            rows,
            last_used: 0,
        }
    }

    pub fn key(&self) -> &BlockKey {
        &self.key
    }

    pub fn rows(&self) -> &[Tile<P>] {
        &self.rows
    }

    pub fn row(&self, row_index: u32) -> Option<&Tile<P>> {
        self.rows.get(row_index as usize)
    }

    pub fn row_mut(&mut self, row_index: u32) -> Option<&mut Tile<P>> {
        self.rows.get_mut(row_index as usize)
    }

    pub(crate) fn row_at(&mut self, row_index: usize) -> &mut Tile<P> {
        &mut self.rows[row_index]
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Logical time the block was last drawn (0 = never).
    pub fn last_used(&self) -> u64 {
        self.last_used
    }

    pub(crate) fn set_last_used(&mut self, tick: u64) {
        self.last_used = tick;
    }

    pub fn complete_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|tile| tile.state() == TileState::Complete)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::SignalPayload;

    #[test]
    fn test_rows_are_contiguous() {
        let config = BlockConfig::default()
            .with_tile_width(16)
            .with_rows_per_block(4);
        let block: Block<SignalPayload> = Block::new(BlockKey::new("chr1", 2, 3), &config);

        assert_eq!(block.row_count(), 4);
        // block 3 starts at lod_x 3 * 16 * 4
        let starts: Vec<u64> = block.rows().iter().map(|t| t.lod_x()).collect();
        assert_eq!(starts, vec![192, 208, 224, 240]);
        assert_eq!(block.row(1).map(|t| t.x()), Some(208 * 4));
        assert!(block.rows().iter().all(|t| t.state() == TileState::Empty));
        assert_eq!(block.complete_rows(), 0);
        assert_eq!(block.last_used(), 0);
    }

    #[test]
    fn test_row_out_of_range() {
        let block: Block<SignalPayload> = Block::new(BlockKey::new("chr1", 0, 0), &BlockConfig::default());
        assert!(block.row(8).is_none());
    }
}
