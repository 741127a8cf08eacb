//! Engine configuration.
//!
//! [`EngineConfig`] groups the tunables for blocks, textures, fallback and the
//! range cache. [`ConfigFile`] reads and writes them (plus logging settings)
//! as `~/.genotile/config.ini`.

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    BlockConfig, ConfigFile, EngineConfig, FallbackConfig, LoggingSettings, RangeCacheConfig,
    TextureConfig,
};
