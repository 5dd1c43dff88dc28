use anyhow::{bail, Result};
use clap::Args;
use log::warn;

use isotrack::restore_matching;

use crate::{open_database, Cli};

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Substring of the file names to restore.
    pub pattern: String,
}

pub fn execute(args: &RestoreArgs, cli: &Cli) -> Result<()> {
    if args.pattern.trim().is_empty() {
        bail!("Refusing to restore with an empty pattern");
    }

    let config = cli.load_config()?;
    let db = open_database(&config)?;
    let report = restore_matching(&db, &args.pattern, &config.intake_directory)?;

    for path in &report.restored {
        println!("restored {}", path.display());
    }
    for path in &report.missing {
        warn!("Not found in archive: {}", path.display());
    }
    println!(
        "Restored {} file(s), {} missing from the archive",
        report.restored.len(),
        report.missing.len()
    );
    Ok(())
}
