use anyhow::Result;
use clap::Args;

use crate::Cli;

#[derive(Debug, Args)]
pub struct CheckConfigArgs {
    /// Also report stage directories that do not exist.
    #[arg(long)]
    pub check_dirs: bool,
}

pub fn execute(args: &CheckConfigArgs, cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if let Some(db) = config.resolved_database_path() {
        println!("database: {}", db.display());
    }

    if args.check_dirs {
        let missing: Vec<_> = config
            .directories()
            .into_iter()
            .filter(|(_, dir)| !dir.is_dir())
            .collect();
        for (key, dir) in &missing {
            println!("missing {}: {}", key, dir.display());
        }
        if missing.is_empty() {
            println!("all stage directories exist");
        }
    }

    println!("configuration OK");
    Ok(())
}
