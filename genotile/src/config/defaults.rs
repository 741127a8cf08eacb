//! Default values, limits and clamping helpers.

// =============================================================================
// Blocks
// =============================================================================

/// Samples per tile (texture width).
pub const DEFAULT_TILE_WIDTH: u32 = 1024;
pub const MIN_TILE_WIDTH: u32 = 16;
pub const MAX_TILE_WIDTH: u32 = 16384;

/// Tiles per block (texture height).
pub const DEFAULT_ROWS_PER_BLOCK: u32 = 8;
pub const MIN_ROWS_PER_BLOCK: u32 = 1;
pub const MAX_ROWS_PER_BLOCK: u32 = 4096;

/// Quantized LOD levels are snapped down to a multiple of this.
pub const DEFAULT_LOD_STRIDE: u32 = 1;
pub const MIN_LOD_STRIDE: u32 = 1;
pub const MAX_LOD_STRIDE: u32 = 16;

// =============================================================================
// Textures
// =============================================================================

/// Block textures kept resident before eviction starts.
pub const DEFAULT_MAX_TEXTURES: usize = 512;
pub const MIN_MAX_TEXTURES: usize = 1;

// =============================================================================
// Fallback
// =============================================================================

/// Coarser density steps tried per gap.
pub const DEFAULT_FALLBACK_MAX_STEPS: u32 = 30;
pub const MAX_FALLBACK_STEPS: u32 = 30;

/// Loading tiles that may stand in as fallbacks per frame.
pub const DEFAULT_LOADING_BUDGET: usize = 1;

/// Still-fading tiles that may stand in as fallbacks per frame.
pub const DEFAULT_FADING_BUDGET: usize = 1;

/// Fade-in time for newly completed tiles.
pub const DEFAULT_FADE_DURATION_MS: u64 = 250;

// =============================================================================
// Range cache
// =============================================================================

/// Samples per range-cache tile.
pub const DEFAULT_RANGE_TILE_SIZE: u64 = 1024;

/// Minimum spacing between evaluated `RangeCache::get` calls.
pub const DEFAULT_THROTTLE_INTERVAL_MS: u64 = 250;

// =============================================================================
// Logging
// =============================================================================

pub const DEFAULT_LOG_FILE: &str = "genotile.log";

// =============================================================================
// Clamping
// =============================================================================

/// Clamp `value` into `[min, max]`, warning when it had to move.
pub(crate) fn clamp_setting<T>(name: &str, value: T, min: T, max: T) -> T
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    if value < min {
        tracing::warn!(setting = name, requested = %value, min = %min, "Setting below minimum, clamping");
        min
    } else if value > max {
        tracing::warn!(setting = name, requested = %value, max = %max, "Setting above maximum, clamping");
        max
    } else {
        value
    }
}
