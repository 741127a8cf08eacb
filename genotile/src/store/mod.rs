//! Block storage.
//!
//! The store quantizes `(x, density)` requests to LOD space and hands out
//! tiles from lazily created, fixed-capacity blocks:
//!
//! ```text
//! density ──log2──▶ lod level ──stride/LodMap──▶ level
//! [x0, x1) ──÷2^level──▶ [lod_x0, lod_x1) ──÷tile_width──▶ tile indices
//! tile index ──÷rows──▶ (block index, row)
//! ```

mod block;
mod block_store;
mod lod_map;

pub use block::Block;
pub use block_store::{BlockStore, TileRequester, MAX_TILES_PER_LOOKUP};
pub use lod_map::LodMap;
