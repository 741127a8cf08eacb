//! Engine tunables.
//!
//! Every struct has `Default` values matching the original browser and
//! builder-style `with_*` setters. Setters clamp into the supported range.

use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use crate::sampler::{Sampler, DEFAULT_LINEAR_STEP};

/// Block geometry.
///
/// Fields are only reachable through the clamping setters, so every value
/// is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockConfig {
    tile_width: u32,
    rows_per_block: u32,
    lod_stride: u32,
}

impl BlockConfig {
    /// Samples per tile; also the width of a block texture.
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Tiles per block; also the height of a block texture.
    pub fn rows_per_block(&self) -> u32 {
        self.rows_per_block
    }

    /// Quantized LOD levels are snapped down to multiples of this.
    pub fn lod_stride(&self) -> u32 {
        self.lod_stride
    }

    pub fn with_tile_width(mut self, tile_width: u32) -> Self {
        self.tile_width = clamp_setting("tile_width", tile_width, MIN_TILE_WIDTH, MAX_TILE_WIDTH);
        self
    }

    pub fn with_rows_per_block(mut self, rows: u32) -> Self {
        self.rows_per_block =
            clamp_setting("rows_per_block", rows, MIN_ROWS_PER_BLOCK, MAX_ROWS_PER_BLOCK);
        self
    }

    pub fn with_lod_stride(mut self, stride: u32) -> Self {
        self.lod_stride = clamp_setting("lod_stride", stride, MIN_LOD_STRIDE, MAX_LOD_STRIDE);
        self
    }

    /// Samples covered by one block in lod space.
    pub fn block_lod_span(&self) -> u64 {
        self.tile_width as u64 * self.rows_per_block as u64
    }
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_WIDTH,
            rows_per_block: DEFAULT_ROWS_PER_BLOCK,
            lod_stride: DEFAULT_LOD_STRIDE,
        }
    }
}

/// GPU texture residency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureConfig {
    /// Block textures kept before the least recently used is released.
    pub max_textures: usize,
}

impl TextureConfig {
    pub fn with_max_textures(mut self, max_textures: usize) -> Self {
        self.max_textures =
            clamp_setting("max_textures", max_textures, MIN_MAX_TEXTURES, usize::MAX);
        self
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            max_textures: DEFAULT_MAX_TEXTURES,
        }
    }
}

/// Render-time fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackConfig {
    /// Coarser density steps (`2^1 ..= 2^max_steps`) tried per gap.
    pub max_steps: u32,
    /// Loading tiles accepted as fallbacks per frame.
    pub loading_budget: usize,
    /// Fading tiles accepted as fallbacks per frame.
    pub fading_budget: usize,
    /// Time a completed tile takes to become fully opaque.
    pub fade_duration: Duration,
}

impl FallbackConfig {
    pub fn with_max_steps(mut self, steps: u32) -> Self {
        self.max_steps = clamp_setting("max_steps", steps, 1, MAX_FALLBACK_STEPS);
        self
    }

    pub fn with_loading_budget(mut self, budget: usize) -> Self {
        self.loading_budget = budget;
        self
    }

    pub fn with_fading_budget(mut self, budget: usize) -> Self {
        self.fading_budget = budget;
        self
    }

    pub fn with_fade_duration(mut self, duration: Duration) -> Self {
        self.fade_duration = duration;
        self
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_FALLBACK_MAX_STEPS,
            loading_budget: DEFAULT_LOADING_BUDGET,
            fading_budget: DEFAULT_FADING_BUDGET,
            fade_duration: Duration::from_millis(DEFAULT_FADE_DURATION_MS),
        }
    }
}

/// Exact + approximate range cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCacheConfig {
    /// Samples per cached tile.
    pub tile_size: u64,
    /// Minimum spacing between evaluated `get` calls.
    pub throttle_interval: Duration,
    /// Quantizer for the sampling rate.
    pub x_sampler: Sampler,
    /// Quantizer for the track height.
    pub y_sampler: Sampler,
}

impl RangeCacheConfig {
    pub fn with_tile_size(mut self, tile_size: u64) -> Self {
        self.tile_size = clamp_setting("tile_size", tile_size, 1, u64::MAX);
        self
    }

    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    pub fn with_x_sampler(mut self, sampler: Sampler) -> Self {
        self.x_sampler = sampler;
        self
    }

    pub fn with_y_sampler(mut self, sampler: Sampler) -> Self {
        self.y_sampler = sampler;
        self
    }

    /// Height buckets in fixed steps instead of collapsing height.
    pub fn with_linear_height(self) -> Self {
        self.with_y_sampler(Sampler::linear(DEFAULT_LINEAR_STEP, DEFAULT_LINEAR_STEP))
    }
}

impl Default for RangeCacheConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_RANGE_TILE_SIZE,
            throttle_interval: Duration::from_millis(DEFAULT_THROTTLE_INTERVAL_MS),
            x_sampler: Sampler::default(),
            y_sampler: Sampler::fixed(0),
        }
    }
}

/// All engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineConfig {
    pub blocks: BlockConfig,
    pub textures: TextureConfig,
    pub fallback: FallbackConfig,
    pub range_cache: RangeCacheConfig,
}

impl EngineConfig {
    pub fn with_blocks(mut self, blocks: BlockConfig) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_textures(mut self, textures: TextureConfig) -> Self {
        self.textures = textures;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_range_cache(mut self, range_cache: RangeCacheConfig) -> Self {
        self.range_cache = range_cache;
        self
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory for the log file; `None` uses the config directory.
    pub directory: Option<PathBuf>,
    /// Log file name.
    pub file: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: None,
            file: DEFAULT_LOG_FILE.to_string(),
            filter: None,
        }
    }
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigFile {
    pub engine: EngineConfig,
    pub logging: LoggingSettings,
}
