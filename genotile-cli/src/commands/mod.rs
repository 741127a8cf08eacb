//! CLI command implementations.
//!
//! - [`config`] - Configuration management (show, init, path)
//! - [`simulate`] - Synthetic pan/zoom session against a headless device

pub mod config;
pub mod simulate;
