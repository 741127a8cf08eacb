//! GPU texture residency for tile blocks.
//!
//! Each block of the store maps to one texture; each tile is one texel row.
//! The renderer's graphics API is hidden behind [`GpuDevice`] so the
//! manager can run against [`HeadlessDevice`] in tests.
//!
//! ```text
//! ┌──────────────┐  get_texture   ┌──────────────────────┐
//! │   Renderer   │ ─────────────▶ │ TextureBlockManager  │
//! └──────────────┘                │                      │
//!                                 │  listener per        │
//!        ┌──────────────┐  rows   │  loading row         │
//!        │  BlockStore  │ ◀────── │                      │
//!        └──────────────┘         └──────────┬───────────┘
//!                                            │ create / update / delete
//!                                            ▼
//!                                 ┌──────────────────────┐
//!                                 │   dyn GpuDevice      │
//!                                 └──────────────────────┘
//! ```
//!
//! Textures are released least-recently-used first once more than
//! `max_textures` are resident. Tile payloads stay in the store, so a
//! released block can be re-textured without fetching again.

mod device;
mod error;
mod manager;

pub use device::{
    DeviceCapabilities, DeviceCounters, FilterMode, GpuDevice, HeadlessDevice, HeadlessTexture,
    TextureDescriptor, TextureHandle, TextureRegion,
};
pub use error::GpuError;
pub use manager::{TextureBlockManager, TextureStats};
