//! Genotile - multi-resolution tile cache for genome browser tracks
//!
//! Track data is split into fixed-width tiles at power-of-two levels of
//! detail. Tiles live in blocks that map one-to-one onto GPU textures, are
//! fetched asynchronously from a pluggable [`fetch::TileSource`], and are
//! drawn with coarser fallbacks while they load.
//!
//! # Modules
//!
//! - [`tile`] - tile keys, states, payloads and completion notification
//! - [`store`] - the LOD/block/tile hierarchy and interval lookups
//! - [`fetch`] - data sources and the fetch coordinator
//! - [`engine`] - per-source cache combining store and fetcher
//! - [`registry`] - named engines shared across tracks
//! - [`texture`] - GPU texture residency for blocks
//! - [`fallback`] - coarser stand-ins for tiles that are not ready
//! - [`approx`] - range cache with approximate hits
//! - [`sampler`] - density and height quantization
//! - [`config`] - tunables and the INI config file
//! - [`logging`] - subscriber setup for binaries
//! - [`testing`] - scripted source for deterministic tests

pub mod approx;
pub mod config;
pub mod engine;
pub mod fallback;
pub mod fetch;
pub mod logging;
pub mod registry;
pub mod sampler;
pub mod store;
pub mod testing;
pub mod texture;
pub mod tile;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
