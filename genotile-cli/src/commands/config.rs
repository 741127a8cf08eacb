//! Configuration management CLI commands.

use std::path::Path;

use clap::Subcommand;
use console::style;

use genotile::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    let origin = if path.exists() {
        path.display().to_string()
    } else {
        "built-in defaults".to_string()
    };
    println!("{} {}", style("# effective configuration from").dim(), style(origin).dim());
    print!("{}", config.to_ini_string());
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    println!("{} {}", style("Wrote").green().bold(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        run(ConfigCommands::Init { force: false }, Some(&path)).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[textures]\nmax_textures = 8\n").unwrap();

        let result = run(ConfigCommands::Init { force: false }, Some(&path));
        assert!(matches!(result, Err(CliError::Config(_))));

        run(ConfigCommands::Init { force: true }, Some(&path)).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_show_reports_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[textures]\nmax_textures = lots\n").unwrap();

        let result = run(ConfigCommands::Show, Some(&path));
        assert!(matches!(result, Err(CliError::ConfigFile(_))));
    }
}
