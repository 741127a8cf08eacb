//! CLI runner for common setup.
//!
//! Loads the config file and initializes logging for commands that run the
//! engine.

use std::path::{Path, PathBuf};

use tracing::info;

use genotile::config::{config_file_path, ConfigFile};
use genotile::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Filter used when neither `RUST_LOG` nor the config file sets one.
const CLI_DEFAULT_FILTER: &str = "warn";

/// Keeps logging alive and holds the loaded configuration.
pub struct CliRunner {
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    config_path: PathBuf,
}

impl CliRunner {
    /// Load config from `config_path` (or the default path) and start logging.
    ///
    /// `verbose` raises the filter to `debug` regardless of the config file.
    /// With `stdout_enabled` false, log events go only to the log file.
    pub fn new(
        config_path: Option<&Path>,
        verbose: bool,
        stdout_enabled: bool,
    ) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let filter = if verbose {
            Some("debug")
        } else {
            Some(config.logging.filter.as_deref().unwrap_or(CLI_DEFAULT_FILTER))
        };
        let logging_guard = init_logging(
            &config.log_directory(),
            &config.logging.file,
            filter,
            stdout_enabled,
        )
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("genotile v{}", genotile::VERSION);
        info!(config = %self.config_path.display(), "genotile CLI: {} command", command);
    }
}
