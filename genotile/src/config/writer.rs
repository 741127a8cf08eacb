//! INI serialization logic for converting `ConfigFile` → INI string.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let engine = &config.engine;
    let log_directory = config
        .logging
        .directory
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let log_filter = config.logging.filter.as_deref().unwrap_or("");

    format!(
        r#"[blocks]
; Samples per tile; also the width of each block texture (16-16384)
tile_width = {}
; Tiles per block; also the height of each block texture (1-4096)
rows_per_block = {}
; Quantized LOD levels are snapped down to a multiple of this (1-16)
lod_stride = {}

[textures]
; Block textures kept on the GPU before the least recently used one is released
max_textures = {}

[fallback]
; Coarser zoom levels tried when a tile is still loading (1-30)
max_steps = {}
; Loading tiles that may be drawn as stand-ins per frame
loading_budget = {}
; Fading-in tiles that may be drawn as stand-ins per frame
fading_budget = {}
; Fade-in time for newly loaded tiles
fade_duration_ms = {}

[range_cache]
; Samples per range-cache tile
tile_size = {}
; Minimum spacing between range-cache lookups
throttle_interval_ms = {}

[logging]
; Log directory (empty = ~/.genotile)
directory = {}
; Log file name
file = {}
; Filter used when RUST_LOG is unset (empty = info)
filter = {}
"#,
        engine.blocks.tile_width(),
        engine.blocks.rows_per_block(),
        engine.blocks.lod_stride(),
        engine.textures.max_textures,
        engine.fallback.max_steps,
        engine.fallback.loading_budget,
        engine.fallback.fading_budget,
        engine.fallback.fade_duration.as_millis(),
        engine.range_cache.tile_size,
        engine.range_cache.throttle_interval.as_millis(),
        log_directory,
        config.logging.file,
        log_filter,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ini::Ini;

    #[test]
    fn test_default_output_parses() {
        let text = to_config_string(&ConfigFile::default());
        let ini = Ini::load_from_str(&text).unwrap();

        assert_eq!(ini.get_from(Some("blocks"), "tile_width"), Some("1024"));
        assert_eq!(ini.get_from(Some("textures"), "max_textures"), Some("512"));
        assert_eq!(ini.get_from(Some("fallback"), "fade_duration_ms"), Some("250"));
        assert_eq!(ini.get_from(Some("logging"), "file"), Some("genotile.log"));
    }
}
