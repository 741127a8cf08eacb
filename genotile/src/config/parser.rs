//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
/// Numeric values outside the supported range are clamped by the builders.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();
    let engine = &mut config.engine;

    // [blocks] section
    if let Some(section) = ini.section(Some("blocks")) {
        if let Some(v) = section.get("tile_width") {
            engine.blocks = engine.blocks.with_tile_width(parse_number("blocks", "tile_width", v)?);
        }
        if let Some(v) = section.get("rows_per_block") {
            engine.blocks = engine
                .blocks
                .with_rows_per_block(parse_number("blocks", "rows_per_block", v)?);
        }
        if let Some(v) = section.get("lod_stride") {
            engine.blocks = engine.blocks.with_lod_stride(parse_number("blocks", "lod_stride", v)?);
        }
    }

    // [textures] section
    if let Some(section) = ini.section(Some("textures")) {
        if let Some(v) = section.get("max_textures") {
            engine.textures = engine
                .textures
                .with_max_textures(parse_number("textures", "max_textures", v)?);
        }
    }

    // [fallback] section
    if let Some(section) = ini.section(Some("fallback")) {
        if let Some(v) = section.get("max_steps") {
            engine.fallback = engine
                .fallback
                .with_max_steps(parse_number("fallback", "max_steps", v)?);
        }
        if let Some(v) = section.get("loading_budget") {
            engine.fallback = engine
                .fallback
                .with_loading_budget(parse_number("fallback", "loading_budget", v)?);
        }
        if let Some(v) = section.get("fading_budget") {
            engine.fallback = engine
                .fallback
                .with_fading_budget(parse_number("fallback", "fading_budget", v)?);
        }
        if let Some(v) = section.get("fade_duration_ms") {
            engine.fallback = engine
                .fallback
                .with_fade_duration(parse_millis("fallback", "fade_duration_ms", v)?);
        }
    }

    // [range_cache] section
    if let Some(section) = ini.section(Some("range_cache")) {
        if let Some(v) = section.get("tile_size") {
            engine.range_cache = engine
                .range_cache
                .with_tile_size(parse_number("range_cache", "tile_size", v)?);
        }
        if let Some(v) = section.get("throttle_interval_ms") {
            engine.range_cache = engine
                .range_cache
                .with_throttle_interval(parse_millis("range_cache", "throttle_interval_ms", v)?);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = Some(expand_tilde(v));
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
        if let Some(v) = section.get("filter") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.filter = Some(v.to_string());
            }
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a positive integer".to_string(),
        })
}

fn parse_millis(section: &str, key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a whole number of milliseconds".to_string(),
        })
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    fn parse(text: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(text).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_is_default() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_overlays_present_keys_only() {
        let config = parse("[blocks]\nrows_per_block = 16\n[textures]\nmax_textures = 32\n").unwrap();
        assert_eq!(config.engine.blocks.rows_per_block(), 16);
        assert_eq!(config.engine.blocks.tile_width(), DEFAULT_TILE_WIDTH);
        assert_eq!(config.engine.textures.max_textures, 32);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = parse("[blocks]\ntile_width = 4\n[fallback]\nmax_steps = 64\n").unwrap();
        assert_eq!(config.engine.blocks.tile_width(), MIN_TILE_WIDTH);
        assert_eq!(config.engine.fallback.max_steps, MAX_FALLBACK_STEPS);
    }

    #[test]
    fn test_durations_in_millis() {
        let config =
            parse("[fallback]\nfade_duration_ms = 0\n[range_cache]\nthrottle_interval_ms = 40\n")
                .unwrap();
        assert_eq!(config.engine.fallback.fade_duration, Duration::ZERO);
        assert_eq!(
            config.engine.range_cache.throttle_interval,
            Duration::from_millis(40)
        );
    }

    #[test]
    fn test_invalid_duration() {
        let err = parse("[range_cache]\nthrottle_interval_ms = -1\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref section, ref key, .. }
                if section == "range_cache" && key == "throttle_interval_ms"
        ));
    }

    #[test]
    fn test_logging_section() {
        let config = parse("[logging]\ndirectory = /tmp/gt\nfile = run.log\nfilter = debug\n").unwrap();
        assert_eq!(config.logging.directory, Some(PathBuf::from("/tmp/gt")));
        assert_eq!(config.logging.file, "run.log");
        assert_eq!(config.logging.filter.as_deref(), Some("debug"));
    }

    #[test]
    fn test_empty_logging_values_keep_defaults() {
        let config = parse("[logging]\ndirectory =\nfile =\n").unwrap();
        assert_eq!(config.logging, ConfigFile::default().logging);
    }
}
