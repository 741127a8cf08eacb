//! Tiles: the unit of cached data.
//!
//! A tile covers a fixed number of samples at one LOD level and lives in a
//! single row of a block. Its payload is filled asynchronously by the fetch
//! coordinator; interested parties either subscribe to its state or attach
//! a one-shot completion listener.

mod entry;
mod key;
mod listeners;
mod payload;

pub use entry::{wait_for_all_complete, wait_for_complete, Tile, TileState};
pub use key::{BlockKey, TileKey, MAX_LOD_LEVEL};
pub use listeners::ListenerId;
pub use payload::{MinMax, SequencePayload, SignalPayload, TexelFormat, TilePayload};
