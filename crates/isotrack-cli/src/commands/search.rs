use anyhow::Result;
use clap::Args;

use isotrack::db::record_repo;
use isotrack::FileRecord;

use crate::{open_database, Cli};

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Substring of the file name; empty matches everything.
    #[arg(default_value = "")]
    pub pattern: String,

    /// Print records as a JSON array.
    #[arg(long)]
    pub json: bool,
}

fn print_table(records: &[FileRecord]) {
    println!(
        "{:<6} {:<32} {:<19} {:<19} {:<19} {:<9} {:<16} {:<8} {:<10}",
        "ID", "FILE", "INTAKE", "MACHINE", "ARCHIVED", "CYCLE", "MATERIAL", "THICK", "CNC TIME"
    );
    for r in records {
        println!(
            "{:<6} {:<32} {:<19} {:<19} {:<19} {:<9} {:<16} {:<8} {:<10}",
            r.id.unwrap_or_default(),
            r.file_name,
            r.entered_intake_at,
            r.entered_machine_at.as_deref().unwrap_or("-"),
            r.archived_at.as_deref().unwrap_or("-"),
            r.cycle_duration.as_deref().unwrap_or("-"),
            r.material,
            r.thickness,
            r.cnc_time
        );
    }
    println!("{} record(s)", records.len());
}

pub fn execute(args: &SearchArgs, cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    let db = open_database(&config)?;
    let records = record_repo::search(&db, &args.pattern)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_table(&records);
    }
    Ok(())
}
