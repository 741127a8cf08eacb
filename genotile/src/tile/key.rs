//! Tile addressing.

use std::fmt;
use std::sync::Arc;

/// Highest quantized LOD level a store will address.
///
/// Keeps `lod_x << lod_level` inside `u64` for any genome-scale coordinate.
pub const MAX_LOD_LEVEL: u32 = 52;

/// Identifies one block: a set (contig/data source), a LOD level and the
/// block's position along the lod-space axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub set_id: Arc<str>,
    pub lod_level: u32,
    pub block_index: u64,
}

impl BlockKey {
    pub fn new(set_id: impl Into<Arc<str>>, lod_level: u32, block_index: u64) -> Self {
        Self {
            set_id: set_id.into(),
            lod_level,
            block_index,
        }
    }

    /// Key of one row inside this block.
    pub fn tile(&self, row_index: u32) -> TileKey {
        TileKey {
            block: self.clone(),
            row_index,
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/L{}/B{}", self.set_id, self.lod_level, self.block_index)
    }
}

/// Identifies one tile: its block plus the row it occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub block: BlockKey,
    pub row_index: u32,
}

impl TileKey {
    pub fn new(
        set_id: impl Into<Arc<str>>,
        lod_level: u32,
        block_index: u64,
        row_index: u32,
    ) -> Self {
        BlockKey::new(set_id, lod_level, block_index).tile(row_index)
    }

    pub fn set_id(&self) -> &str {
        &self.block.set_id
    }

    pub fn lod_level(&self) -> u32 {
        self.block.lod_level
    }

    pub fn block_index(&self) -> u64 {
        self.block.block_index
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/R{}", self.block, self.row_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_key_display() {
        let key = TileKey::new("chr1", 3, 12, 5);
        assert_eq!(key.to_string(), "chr1/L3/B12/R5");
    }

    #[test]
    fn test_block_tile_shares_block() {
        let block = BlockKey::new("chrX", 0, 1);
        let key = block.tile(7);
        assert_eq!(key.block, block);
        assert_eq!(key.set_id(), "chrX");
        assert_eq!(key.lod_level(), 0);
        assert_eq!(key.block_index(), 1);
    }

    #[test]
    fn test_keys_ordered_by_block_then_row() {
        let a = TileKey::new("chr1", 0, 0, 7);
        let b = TileKey::new("chr1", 0, 1, 0);
        assert!(a < b);
    }
}
