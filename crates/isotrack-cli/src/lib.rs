//! Command-line front end for isotrack.
//!
//! - `isotrack run` runs the archiver until Ctrl-C
//! - `isotrack search <pattern>` lists archived jobs
//! - `isotrack restore <pattern>` copies archived jobs back into intake
//! - `isotrack check-config` validates the configuration file

pub mod commands;
pub mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use isotrack::{ArchiverConfig, Database};

#[derive(Debug, Parser)]
#[command(name = "isotrack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON or YAML).
    #[arg(long, short = 'c', env = "ISOTRACK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database file; overrides `database_path` from the configuration.
    #[arg(long, env = "ISOTRACK_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = logging::LogFormat::Text, global = true)]
    pub log_format: logging::LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the archiver until interrupted.
    Run(commands::run::RunArgs),
    /// Search archived jobs by file name.
    Search(commands::search::SearchArgs),
    /// Copy archived jobs back into the intake folder.
    Restore(commands::restore::RestoreArgs),
    /// Validate the configuration file and print the effective settings.
    CheckConfig(commands::check_config::CheckConfigArgs),
}

/// `~/.isotrack/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".isotrack").join("config.json"))
}

impl Cli {
    pub fn config_path(&self) -> Result<PathBuf> {
        self.config
            .clone()
            .or_else(default_config_path)
            .context("No configuration file given and the home directory is unknown")
    }

    pub fn load_config(&self) -> Result<ArchiverConfig> {
        let path = self.config_path()?;
        let mut config = isotrack::load_config(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        if let Some(database) = &self.database {
            config.database_path = Some(database.clone());
        }
        Ok(config)
    }
}

pub fn open_database(config: &ArchiverConfig) -> Result<Database> {
    let path = config
        .resolved_database_path()
        .context("No database path configured and the home directory is unknown")?;
    Database::open_with_timeout(&path, config.busy_timeout())
        .with_context(|| format!("Failed to open database at {}", path.display()))
}
