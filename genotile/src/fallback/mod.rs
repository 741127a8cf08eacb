//! Render-time fallback.
//!
//! While a tile loads or fades in, coarser tiles covering the same spot are
//! drawn behind it. [`FallbackResolver`] chooses them under small per-frame
//! budgets; an [`OpacityProbe`] such as [`FadeTracker`] says how opaque each
//! candidate is.

mod fade;
mod resolver;

pub use fade::{FadeTracker, FullyOpaque, OpacityProbe};
pub use resolver::{needs_fallback, Fallback, FallbackResolver, GapTile};
