//! Tile opacity.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::tile::{TileKey, TileState};

/// Reports how opaque a tile is drawn this frame.
///
/// # Implementors
///
/// - `FadeTracker` - fades tiles in from the first frame they are complete
/// - `FullyOpaque` - testing: complete tiles are opaque immediately
pub trait OpacityProbe {
    /// Opacity in `[0, 1]`. Tiles that are not complete are 0.
    fn opacity(&mut self, key: &TileKey, state: TileState) -> f32;
}

/// Fades each tile from 0 to 1 over `fade_duration`, starting the first
/// time it is probed while complete.
#[derive(Debug)]
pub struct FadeTracker {
    fade_duration: Duration,
    now: Instant,
    first_complete: HashMap<TileKey, Instant>,
}

impl FadeTracker {
    pub fn new(fade_duration: Duration, now: Instant) -> Self {
        Self {
            fade_duration,
            now,
            first_complete: HashMap::new(),
        }
    }

    /// Move the frame clock.
    pub fn advance(&mut self, now: Instant) {
        self.now = now;
    }

    /// Stop tracking a tile; it fades in again next time it is seen.
    pub fn forget(&mut self, key: &TileKey) -> bool {
        self.first_complete.remove(key).is_some()
    }

    /// Keep only the tiles `keep` accepts; dropped tiles fade in again.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&TileKey) -> bool,
    {
        self.first_complete.retain(|key, _| keep(key));
    }

    pub fn tracked(&self) -> usize {
        self.first_complete.len()
    }
}

impl OpacityProbe for FadeTracker {
    fn opacity(&mut self, key: &TileKey, state: TileState) -> f32 {
        if state != TileState::Complete {
            return 0.0;
        }
        if self.fade_duration.is_zero() {
            return 1.0;
        }
        let seen = *self
            .first_complete
            .entry(key.clone())
            .or_insert(self.now);
        let elapsed = self.now.saturating_duration_since(seen);
        (elapsed.as_secs_f32() / self.fade_duration.as_secs_f32()).min(1.0)
    }
}

/// Testing probe: complete tiles are fully opaque.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullyOpaque;

impl OpacityProbe for FullyOpaque {
    fn opacity(&mut self, _key: &TileKey, state: TileState) -> f32 {
        if state == TileState::Complete {
            1.0
        } else {
            0.0
        }
    }
}
